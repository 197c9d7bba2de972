//! 基于 CDP 的宿主页面实现
//!
//! 每个能力都是一段在题目页内执行的脚本，脚本总是返回一个值。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::host_document::{HostDocument, HostEvent, ProblemLinks, Replacement};
use super::js_executor::{js_literal, JsExecutor};
use crate::services::key_bindings;

/// 暂存区容器 id
pub const STAGING_ID: &str = "cfx-nav-staging";
/// 切题通知事件名
pub const SWAP_EVENT: &str = "cfx-problem-swapped";

const MUTATION_POLL: Duration = Duration::from_millis(100);

/// MathJax v2 / v3 兼容的排版函数
const TYPESET_FN: &str = r#"
    const typeset = (c) => {
        try {
            const mj = window.MathJax;
            if (!mj) return;
            if (mj.Hub && mj.Hub.Queue) {
                mj.Hub.Queue(["Typeset", mj.Hub, c]);
            } else if (mj.typesetPromise) {
                mj.typesetPromise([c]).catch(() => {});
            }
        } catch (_) {}
    };
"#;

/// 取当前题面（忽略正在移除的旧节点）
const LIVE_STATEMENT_FN: &str = r#"
    const liveStatement = () => {
        const container = document.querySelector('#pageContent');
        if (!container) return null;
        return Array.from(container.querySelectorAll('.problem-statement'))
            .find((ps) => !ps.closest('[data-cfx-leaving]')) || null;
    };
"#;

/// 题目页
pub struct CdpDocument {
    executor: JsExecutor,
}

#[derive(Deserialize)]
struct Inbox {
    attached: bool,
    #[serde(default)]
    events: Vec<HostEvent>,
}

impl CdpDocument {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    async fn eval_bool(&self, js_code: String) -> Result<bool> {
        self.executor.eval_as::<bool>(js_code).await
    }

    async fn mutation_count(&self) -> Result<u64> {
        let js_code = r#"
            (() => {
                if (!window.__cfxNavObserver) {
                    window.__cfxNavMutations = 0;
                    window.__cfxNavObserver = new MutationObserver(() => { window.__cfxNavMutations += 1; });
                    window.__cfxNavObserver.observe(document.documentElement, { childList: true, subtree: true });
                }
                return window.__cfxNavMutations || 0;
            })()
        "#;
        self.executor.eval_as::<u64>(js_code).await
    }
}

#[async_trait]
impl HostDocument for CdpDocument {
    async fn current_url(&self) -> Result<String> {
        self.executor.eval_as::<String>("location.href").await
    }

    async fn problem_links(&self) -> Result<ProblemLinks> {
        let js_code = r#"
            (() => {
                const hrefs = (scope) => Array.from(scope.querySelectorAll('a[href*="/problem/"]'))
                    .map((a) => a.getAttribute('href') || '');
                const sidebar = document.querySelector('#sidebar');
                return {
                    navigation: sidebar ? hrefs(sidebar) : [],
                    document: hrefs(document),
                };
            })()
        "#;
        self.executor.eval_as::<ProblemLinks>(js_code).await
    }

    async fn wait_for_mutation(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let baseline = self.mutation_count().await?;
        while Instant::now() < deadline {
            sleep(MUTATION_POLL.min(deadline.saturating_duration_since(Instant::now()))).await;
            if self.mutation_count().await? > baseline {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn end_mutation_watch(&self) -> Result<()> {
        let js_code = r#"
            (() => {
                try { if (window.__cfxNavObserver) window.__cfxNavObserver.disconnect(); } catch (_) {}
                window.__cfxNavObserver = null;
                return true;
            })()
        "#;
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn stage_node(&self, node_id: &str, markup: &str) -> Result<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const id = {id};
                let host = document.getElementById({staging});
                if (!host) {{
                    host = document.createElement('div');
                    host.id = {staging};
                    host.setAttribute('aria-hidden', 'true');
                    host.inert = true;
                    host.style.cssText = 'position:absolute;left:-99999px;top:auto;width:1px;height:1px;overflow:hidden;visibility:hidden;';
                    (document.body || document.documentElement).appendChild(host);
                }}
                if (host.querySelector('[data-cfx-node="' + id + '"]')) return true;
                const tpl = document.createElement('template');
                tpl.innerHTML = {markup}.trim();
                const node = tpl.content.firstElementChild;
                if (!node) return false;
                node.setAttribute('data-cfx-node', id);
                host.appendChild(node);
                return true;
            }})()
            "#,
            id = js_literal(node_id),
            staging = js_literal(STAGING_ID),
            markup = js_literal(markup),
        );
        self.eval_bool(js_code).await
    }

    async fn warm_node(&self, node_id: &str) -> Result<()> {
        let js_code = format!(
            r#"
            (async () => {{
                {typeset}
                const node = document.querySelector('[data-cfx-node="' + {id} + '"]');
                if (!node) return false;
                await Promise.all(Array.from(node.querySelectorAll('img')).map((img) => {{
                    try {{
                        if (img.decode) return img.decode().catch(() => {{}});
                        if (!img.complete) {{
                            return new Promise((res) => {{
                                img.addEventListener('load', res, {{ once: true }});
                                img.addEventListener('error', res, {{ once: true }});
                            }});
                        }}
                    }} catch (_) {{}}
                    return Promise.resolve();
                }}));
                if (!node.isConnected) return false;
                typeset(node);
                return true;
            }})()
            "#,
            typeset = TYPESET_FN,
            id = js_literal(node_id),
        );
        let warmed = self.eval_bool(js_code).await?;
        debug!("预热节点 {}: {}", node_id, warmed);
        Ok(())
    }

    async fn replace_statement(&self, replacement: Replacement<'_>) -> Result<bool> {
        let (staged, markup, node_id) = match replacement {
            Replacement::Staged { node_id } => (true, "", node_id),
            Replacement::Markup { markup, node_id } => (false, markup, node_id),
        };
        let js_code = format!(
            r#"
            (() => {{
                const container = document.querySelector('#pageContent');
                if (!container) return false;
                const id = {id};
                let node = null;
                if ({staged}) {{
                    node = document.querySelector('#' + {staging} + ' [data-cfx-node="' + id + '"]');
                }} else {{
                    const tpl = document.createElement('template');
                    tpl.innerHTML = {markup}.trim();
                    node = tpl.content.firstElementChild;
                    if (node) node.setAttribute('data-cfx-node', id);
                }}
                if (!node) return false;
                const existing = container.querySelector('.problemindexholder:not([data-cfx-leaving])')
                    || container.querySelector('.problem-statement:not([data-cfx-leaving])');
                let h = 0;
                try {{ h = container.getBoundingClientRect().height; }} catch (_) {{}}
                if (h) container.style.minHeight = h + 'px';
                const settle = (fn) => (window.requestAnimationFrame ? requestAnimationFrame(fn) : setTimeout(fn, 0));
                if (existing) {{
                    existing.setAttribute('data-cfx-leaving', '');
                    existing.insertAdjacentElement('afterend', node);
                    settle(() => {{
                        try {{ existing.remove(); }} catch (_) {{}}
                        container.style.minHeight = '';
                    }});
                }} else {{
                    container.appendChild(node);
                    settle(() => {{ container.style.minHeight = ''; }});
                }}
                return true;
            }})()
            "#,
            id = js_literal(node_id),
            staged = staged,
            staging = js_literal(STAGING_ID),
            markup = js_literal(markup),
        );
        self.eval_bool(js_code).await
    }

    async fn replace_page_content(&self, markup: &str) -> Result<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const container = document.querySelector('#pageContent');
                if (!container) return false;
                container.innerHTML = {markup};
                return true;
            }})()
            "#,
            markup = js_literal(markup),
        );
        self.eval_bool(js_code).await
    }

    async fn rendered_title(&self) -> Result<Option<String>> {
        let js_code = format!(
            r#"
            (() => {{
                {live}
                const ps = liveStatement();
                const el = ps ? ps.querySelector('.header .title') : null;
                return el ? (el.textContent || '').trim() : '';
            }})()
            "#,
            live = LIVE_STATEMENT_FN,
        );
        let title = self.executor.eval_as::<String>(js_code).await?;
        Ok(Some(title).filter(|t| !t.is_empty()))
    }

    async fn statement_text_len(&self) -> Result<usize> {
        let js_code = format!(
            r#"
            (() => {{
                {live}
                const ps = liveStatement();
                if (!ps) return 0;
                return (ps.textContent || '').replace(/\s+/g, ' ').trim().length;
            }})()
            "#,
            live = LIVE_STATEMENT_FN,
        );
        self.executor.eval_as::<usize>(js_code).await
    }

    async fn push_history(&self, url: &str) -> Result<()> {
        let js_code = format!(
            "(() => {{ history.pushState({{ cfx: 'problem-swap', url: {url} }}, '', {url}); return true; }})()",
            url = js_literal(url),
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        let js_code = format!("(() => {{ document.title = {}; return true; }})()", js_literal(title));
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn schedule_typeset(&self, node_id: Option<&str>) -> Result<()> {
        let target = match node_id {
            Some(id) => format!("document.querySelector('[data-cfx-node=\"' + {} + '\"]')", js_literal(id)),
            None => "null".to_string(),
        };
        let js_code = format!(
            r#"
            (() => {{
                {typeset}
                const c = {target} || document.querySelector('#pageContent') || document.body;
                const run = () => typeset(c);
                if (window.requestAnimationFrame) {{
                    requestAnimationFrame(() => setTimeout(run, 0));
                }} else {{
                    setTimeout(run, 0);
                }}
                return true;
            }})()
            "#,
            typeset = TYPESET_FN,
            target = target,
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        self.executor.eval("(() => { window.scrollTo(0, 0); return true; })()").await?;
        Ok(())
    }

    async fn emit_swapped(&self, url: &str) -> Result<()> {
        let js_code = format!(
            "(() => {{ document.dispatchEvent(new CustomEvent({event}, {{ detail: {{ url: {url} }} }})); return true; }})()",
            event = js_literal(SWAP_EVENT),
            url = js_literal(url),
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let js_code = format!("(() => {{ location.href = {}; return true; }})()", js_literal(url));
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.executor.eval("(() => { location.reload(); return true; })()").await?;
        Ok(())
    }

    async fn attach(&self) -> Result<()> {
        let bindings = serde_json::to_string(&key_bindings::page_bindings())?;
        let js_code = format!(
            r#"
            (() => {{
                if (window.__cfxNavInbox) return true;
                window.__cfxNavInbox = [];
                window.__cfxNavKeys = false;
                window.__cfxNavBounds = {{ previous: false, next: false }};
                const bindings = {bindings};
                window.addEventListener('keydown', (e) => {{
                    if (!window.__cfxNavKeys) return;
                    const hit = bindings.find((b) => b.key === e.key && (!b.ctrl || e.ctrlKey));
                    if (!hit) return;
                    const t = e.target;
                    const tag = t && t.tagName ? t.tagName.toLowerCase() : '';
                    const editable = tag === 'input' || tag === 'textarea' || !!(t && t.isContentEditable);
                    const defaultPrevented = e.defaultPrevented;
                    if (!editable && !defaultPrevented && window.__cfxNavBounds[hit.direction]) e.preventDefault();
                    window.__cfxNavInbox.push({{
                        type: 'key', key: e.key, ctrl: e.ctrlKey,
                        editableTarget: editable, defaultPrevented: defaultPrevented,
                    }});
                }}, {{ passive: false }});
                window.addEventListener('popstate', (e) => {{
                    const swapEntry = !!(e && e.state && e.state.cfx === 'problem-swap');
                    window.__cfxNavInbox.push({{ type: 'popState', swapEntry: swapEntry }});
                }});
                return true;
            }})()
            "#,
            bindings = bindings,
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn enable_navigation(&self) -> Result<()> {
        self.executor.eval("(() => { window.__cfxNavKeys = true; return true; })()").await?;
        Ok(())
    }

    async fn publish_bounds(&self, has_previous: bool, has_next: bool) -> Result<()> {
        let js_code = format!(
            "(() => {{ window.__cfxNavBounds = {{ previous: {}, next: {} }}; return true; }})()",
            has_previous, has_next
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn drain_events(&self) -> Result<Option<Vec<HostEvent>>> {
        let js_code = r#"
            (() => {
                if (!window.__cfxNavInbox) return { attached: false, events: [] };
                return { attached: true, events: window.__cfxNavInbox.splice(0) };
            })()
        "#;
        let inbox = self.executor.eval_as::<Inbox>(js_code).await?;
        Ok(inbox.attached.then_some(inbox.events))
    }
}

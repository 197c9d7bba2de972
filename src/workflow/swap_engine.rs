//! 切题状态机
//!
//! `Idle → Resolving → Swapping → Validating → {Committed | Recovering} → Idle`
//!
//! 优先级：预备节点 → 批量题面 → 单题页面 → 整页跳转。
//! 任何一步失败都退化为整页跳转，[`SwapEngine::swap_to`] 本身从不返回错误。

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::NavSettings;
use crate::error::NavError;
use crate::infrastructure::{HostDocument, Replacement};
use crate::models::{ContestRef, Direction, NavigationState, ProblemIndex, StatementEntry};
use crate::services::markup;
use crate::services::{CaptchaGuard, NodePreparer, PageCache, StatementCache};
use crate::utils::logging::truncate_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Idle,
    Resolving,
    Swapping,
    Validating,
    Recovering,
    Committed,
}

/// 成功切题时实际走的路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPath {
    /// 直接移入预备节点
    Prepared,
    /// 现场用批量题面构建
    Statement,
    /// 校验失败后用单题页面恢复
    Recovered,
    /// 批量题面中没有该题，直接用单题页面
    PageFetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Committed { index: ProblemIndex, path: SwapPath },
    /// 放弃原地切换，已交给浏览器整页跳转
    FullNavigation { reason: String },
    /// 上一次切换还没结束，本次请求被忽略
    Busy,
}

impl SwapOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SwapOutcome::Committed { .. })
    }
}

/// 切题引擎
///
/// 同一时间只处理一个切换请求，重叠的请求直接返回 [`SwapOutcome::Busy`]。
pub struct SwapEngine {
    contest: ContestRef,
    host: Arc<dyn HostDocument>,
    statements: Arc<StatementCache>,
    pages: Arc<PageCache>,
    preparer: Arc<NodePreparer>,
    guard: Arc<CaptchaGuard>,
    state: Arc<Mutex<NavigationState>>,
    settings: NavSettings,
    phase: Mutex<SwapPhase>,
    in_flight: tokio::sync::Mutex<()>,
}

impl SwapEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contest: ContestRef,
        host: Arc<dyn HostDocument>,
        statements: Arc<StatementCache>,
        pages: Arc<PageCache>,
        preparer: Arc<NodePreparer>,
        guard: Arc<CaptchaGuard>,
        state: Arc<Mutex<NavigationState>>,
        settings: NavSettings,
    ) -> Self {
        Self {
            contest,
            host,
            statements,
            pages,
            preparer,
            guard,
            state,
            settings,
            phase: Mutex::new(SwapPhase::Idle),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> SwapPhase {
        *self.phase.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    fn set_phase(&self, phase: SwapPhase) {
        *self.phase.lock() = phase;
    }

    /// 切换到 `url` 对应的题目
    pub async fn swap_to(&self, url: &str) -> SwapOutcome {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            debug!("上一次切换尚未结束，忽略: {}", url);
            return SwapOutcome::Busy;
        };

        let outcome = if self.guard.is_active() {
            self.full_navigation(url, "验证码冷却中").await
        } else {
            match self.try_swap(url).await {
                Ok((index, path)) => {
                    self.commit(&index, url).await;
                    info!("[题目 {}] ✓ 切换完成 ({:?})", index, path);
                    SwapOutcome::Committed { index, path }
                }
                Err(e) => {
                    let reason = if NavError::is_captcha(&e) {
                        "切换途中遇到验证码".to_string()
                    } else {
                        format!("{:#}", e)
                    };
                    warn!("⚠️ 原地切换失败，改为整页跳转: {}", reason);
                    self.full_navigation(url, &reason).await
                }
            }
        };

        self.set_phase(SwapPhase::Idle);
        outcome
    }

    /// 题号必须能从 URL 中取出且属于当前比赛；顺序已确定时还必须在顺序里
    fn resolve(&self, url: &str) -> Result<ProblemIndex, NavError> {
        let (contest, index) =
            ContestRef::from_problem_url(url).ok_or_else(|| NavError::SwapFailure(format!("不是题目页地址: {}", url)))?;
        if contest.base_path != self.contest.base_path {
            return Err(NavError::SwapFailure(format!("不属于当前比赛: {}", url)));
        }

        let state = self.state.lock();
        if state.is_initialized() && state.order().position(&index).is_none() {
            return Err(NavError::SwapFailure(format!("题号 {} 不在题目顺序中", index)));
        }
        Ok(index)
    }

    async fn try_swap(&self, url: &str) -> Result<(ProblemIndex, SwapPath)> {
        self.set_phase(SwapPhase::Resolving);
        let index = self.resolve(url)?;
        debug!("[题目 {}] 开始切换", index);

        // 尽力而为，失败也继续
        self.statements.ensure().await;

        let Some(entry) = self.statements.get(&index) else {
            self.set_phase(SwapPhase::Swapping);
            self.swap_from_page(url, true).await?;
            return Ok((index, SwapPath::PageFetch));
        };

        self.set_phase(SwapPhase::Swapping);
        let path = self.swap_from_statement(url, &index, &entry).await?;

        self.set_phase(SwapPhase::Validating);
        if let Err(mismatch) = self.validate(&index).await {
            debug!("[题目 {}] {}，使用单题页面恢复", index, mismatch);
            self.set_phase(SwapPhase::Recovering);
            self.swap_from_page(url, false).await?;
            return Ok((index, SwapPath::Recovered));
        }
        Ok((index, path))
    }

    async fn swap_from_statement(&self, url: &str, index: &ProblemIndex, entry: &StatementEntry) -> Result<SwapPath> {
        let mut swapped = None;
        if let Some(node) = self.preparer.prepare(index).await {
            let replaced = self
                .host
                .replace_statement(Replacement::Staged { node_id: &node.node_id })
                .await?;
            // 没移进正文的节点仍留在暂存区，下次还能用
            if replaced {
                self.preparer.consume(&node);
                swapped = Some((node.node_id.clone(), SwapPath::Prepared));
            }
        }

        let (node_id, path) = match swapped {
            Some(swapped) => swapped,
            None => {
                let fragment = markup::statement_fragment(&entry.markup)
                    .ok_or_else(|| NavError::SwapFailure("缓存的题面里没有题面容器".to_string()))?;
                let node_id = self.preparer.next_node_id();
                let replaced = self
                    .host
                    .replace_statement(Replacement::Markup {
                        markup: &fragment,
                        node_id: &node_id,
                    })
                    .await?;
                if !replaced {
                    return Err(NavError::SwapFailure("页面上找不到题面容器".to_string()).into());
                }
                (node_id, SwapPath::Statement)
            }
        };

        self.host.push_history(url).await?;
        self.host.set_title(&entry.title).await?;
        self.host.schedule_typeset(Some(&node_id)).await?;
        Ok(path)
    }

    /// 用单题页面替换；恢复时不再写历史记录（上一步已经写过）
    async fn swap_from_page(&self, url: &str, push_history: bool) -> Result<()> {
        let page = self.pages.fetch_page(url).await?;

        let mut node_id = None;
        if let Some(fragment) = markup::statement_fragment(&page.markup) {
            let id = self.preparer.next_node_id();
            let replaced = self
                .host
                .replace_statement(Replacement::Markup {
                    markup: &fragment,
                    node_id: &id,
                })
                .await?;
            if replaced {
                node_id = Some(id);
            }
        }
        if node_id.is_none() && !self.host.replace_page_content(&page.markup).await? {
            return Err(NavError::SwapFailure("页面上找不到主内容区域".to_string()).into());
        }

        if push_history {
            self.host.push_history(url).await?;
        }
        self.host.set_title(&page.title).await?;
        self.host.schedule_typeset(node_id.as_deref()).await?;
        Ok(())
    }

    /// 渲染出的标题题号必须与目标一致，题面文本必须超过最小长度
    async fn validate(&self, index: &ProblemIndex) -> Result<(), NavError> {
        let rendered = self.host.rendered_title().await.ok().flatten();
        let title_matches = rendered
            .as_deref()
            .and_then(markup::index_from_title)
            .is_some_and(|rendered| rendered.matches(index));
        let text_len = self.host.statement_text_len().await.unwrap_or(0);

        if title_matches && text_len > self.settings.min_statement_chars {
            return Ok(());
        }
        Err(NavError::ValidationMismatch {
            expected: index.to_string(),
            rendered: rendered.map(|t| truncate_text(&t, 60)),
        })
    }

    /// 提交：更新位置、广播通知、排版、回到顶部、预备新的邻居
    ///
    /// 这一步的宿主错误只记录日志，页面内容已经是新题了。
    async fn commit(&self, index: &ProblemIndex, url: &str) {
        self.set_phase(SwapPhase::Committed);

        let rendered_index = self
            .host
            .rendered_title()
            .await
            .ok()
            .flatten()
            .and_then(|title| markup::index_from_title(&title));
        {
            let mut state = self.state.lock();
            let moved = rendered_index
                .as_ref()
                .and_then(|rendered| state.move_to(rendered))
                .or_else(|| state.move_to(index));
            if moved.is_none() {
                debug!("[题目 {}] 顺序尚未确定，位置保持不变", index);
            }
        }

        if let Err(e) = self.host.emit_swapped(url).await {
            warn!("⚠️ 发送切题通知失败: {:#}", e);
        }
        if let Err(e) = self.host.schedule_typeset(None).await {
            debug!("排版失败（忽略）: {:#}", e);
        }
        if let Err(e) = self.host.scroll_to_top().await {
            debug!("滚动失败（忽略）: {:#}", e);
        }
        self.publish_bounds().await;
        self.prepare_neighbors().await;
    }

    /// 把两个方向上能否移动告诉页面
    pub async fn publish_bounds(&self) {
        let (has_previous, has_next) = {
            let state = self.state.lock();
            (
                state.neighbor(Direction::Previous).is_some(),
                state.neighbor(Direction::Next).is_some(),
            )
        };
        if let Err(e) = self.host.publish_bounds(has_previous, has_next).await {
            debug!("同步边界失败（忽略）: {:#}", e);
        }
    }

    /// 为当前位置的前后两题准备节点
    pub async fn prepare_neighbors(&self) {
        let neighbors = self.state.lock().neighbors();
        for neighbor in neighbors {
            self.preparer.prepare(&neighbor).await;
        }
    }

    async fn full_navigation(&self, url: &str, reason: &str) -> SwapOutcome {
        info!("↪ 整页跳转: {} ({})", truncate_text(url, 80), reason);
        if let Err(e) = self.host.navigate(url).await {
            warn!("⚠️ 整页跳转失败: {:#}", e);
        }
        SwapOutcome::FullNavigation {
            reason: reason.to_string(),
        }
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::sleep;

use cf_instant_nav::config::NavSettings;
use cf_instant_nav::error::FetchError;
use cf_instant_nav::infrastructure::{Clock, Fetcher, HostDocument, HostEvent, ProblemLinks, Replacement};
use cf_instant_nav::models::{ContestRef, ProblemIndex};
use cf_instant_nav::orchestrator::NavigationController;
use cf_instant_nav::services::{markup, CaptchaGuard};

pub const ORIGIN: &str = "https://codeforces.com";
pub const BASE: &str = "/contest/1850";

pub const PROBLEMS: [(&str, &str, &str); 3] = [
    (
        "A",
        "A. To My Critics",
        "Suneet has three digits a, b, and c. Since math is not his strongest point, he asks you to determine if you can choose any two digits to make a sum greater or equal to 10.",
    ),
    (
        "B",
        "B. Ten Words of Wisdom",
        "In the game show Ten Words of Wisdom, there are n participants numbered from 1 to n, each of whom submits one response.",
    ),
    (
        "C",
        "C. Word on the Paper",
        "On an 8 by 8 grid of dots, a word consisting of lowercase Latin letters is written vertically in one column, from top to bottom.",
    ),
];

pub fn idx(s: &str) -> ProblemIndex {
    ProblemIndex::parse(s).unwrap()
}

pub fn problem_url(index: &str) -> String {
    format!("{}{}/problem/{}", ORIGIN, BASE, index)
}

pub fn problems_url() -> String {
    format!("{}{}/problems", ORIGIN, BASE)
}

pub fn api_url() -> String {
    format!("{}/api/contest.standings?contestId=1850&from=1&count=1", ORIGIN)
}

fn problem(index: &str) -> (&'static str, &'static str, &'static str) {
    *PROBLEMS.iter().find(|p| p.0 == index).unwrap()
}

pub fn title_of(index: &str) -> &'static str {
    problem(index).1
}

/// 一道题的完整题面容器
pub fn holder(index: &str, title: &str, body: &str) -> String {
    format!(
        r#"<div class="problemindexholder" problemindex="{index}"><div class="ttypography"><div class="problem-statement"><div class="header"><div class="title">{title}</div><div class="time-limit">time limit per test 1 second</div></div><div><p>{body}</p></div></div></div></div>"#
    )
}

pub fn holder_of(index: &str) -> String {
    let (index, title, body) = problem(index);
    holder(index, title, body)
}

/// 批量题面页
pub fn problems_page() -> String {
    let holders: String = PROBLEMS.iter().map(|(i, t, b)| holder(i, t, b)).collect();
    format!(
        r#"<html><head><title>Problems - Codeforces</title></head><body><div id="pageContent">{holders}</div></body></html>"#
    )
}

/// 单题页面，`content` 放进 `#pageContent`
pub fn problem_page_with(index: &str, content: &str) -> String {
    format!(
        r#"<html><head><title>Problem - {index} - Codeforces</title></head><body><div id="sidebar"></div><div id="pageContent">{content}</div></body></html>"#
    )
}

pub fn problem_page(index: &str) -> String {
    problem_page_with(index, &holder_of(index))
}

pub fn captcha_page() -> String {
    r#"<html><head><title>Verification</title></head><body><form method="post"><img src="/captcha.png"><input name="captcha" type="text"></form></body></html>"#.to_string()
}

pub fn api_json(indices: &[&str]) -> String {
    let problems: Vec<String> = indices
        .iter()
        .map(|i| format!(r#"{{"contestId":1850,"index":"{}","name":"x"}}"#, i))
        .collect();
    format!(
        r#"{{"status":"OK","result":{{"contest":{{"id":1850}},"problems":[{}],"rows":[]}}}}"#,
        problems.join(",")
    )
}

pub fn hrefs(indices: &[&str]) -> Vec<String> {
    indices.iter().map(|i| format!("{}/problem/{}", BASE, i)).collect()
}

// ========== 假页面 ==========

#[derive(Default)]
pub struct HostState {
    pub url: String,
    pub title: String,
    /// 当前显示的题面容器；None 表示页面上没有题面
    pub statement: Option<String>,
    pub page_content: String,
    pub links: ProblemLinks,
    /// 延迟一段时间后出现的链接
    pub late_links: Option<(Duration, ProblemLinks)>,
    pub watch_ended: usize,
    pub staged: HashMap<String, String>,
    pub staged_total: usize,
    pub reject_staging: bool,
    /// 暂存节点无法移入正文（例如被页面脚本移走）
    pub refuse_staged_swap: bool,
    pub warmed: Vec<String>,
    pub history: Vec<String>,
    pub swapped_events: Vec<String>,
    pub navigations: Vec<String>,
    pub reloads: usize,
    pub typesets: usize,
    pub scrolls: usize,
    pub attached: bool,
    pub navigation_enabled: bool,
    pub bounds: (bool, bool),
    pub inbox: Vec<HostEvent>,
}

/// 内存中的题目页
pub struct FakeHost {
    pub state: Mutex<HostState>,
}

impl FakeHost {
    /// 停在某道题上的页面
    pub fn on_problem(index: &str) -> Self {
        Self {
            state: Mutex::new(HostState {
                url: problem_url(index),
                title: format!("Problem - {} - Codeforces", index),
                statement: Some(holder_of(index)),
                page_content: holder_of(index),
                ..Default::default()
            }),
        }
    }

    pub fn with_sidebar(self, indices: &[&str]) -> Self {
        self.state.lock().links.navigation = hrefs(indices);
        self
    }

    pub fn with_document_links(self, indices: &[&str]) -> Self {
        self.state.lock().links.document = hrefs(indices);
        self
    }

    pub fn with_late_sidebar(self, delay: Duration, indices: &[&str]) -> Self {
        let links = ProblemLinks {
            navigation: hrefs(indices),
            document: Vec::new(),
        };
        self.state.lock().late_links = Some((delay, links));
        self
    }

    pub fn rejecting_staging(self) -> Self {
        self.state.lock().reject_staging = true;
        self
    }

    pub fn refusing_staged_swaps(self) -> Self {
        self.state.lock().refuse_staged_swap = true;
        self
    }

    pub fn rendered_index(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .statement
            .as_deref()
            .and_then(markup::statement_title)
            .and_then(|t| markup::index_from_title(&t))
            .map(|i| i.to_string())
    }

    pub fn push_event(&self, event: HostEvent) {
        self.state.lock().inbox.push(event);
    }
}

#[async_trait]
impl HostDocument for FakeHost {
    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn problem_links(&self) -> Result<ProblemLinks> {
        Ok(self.state.lock().links.clone())
    }

    async fn wait_for_mutation(&self, timeout: Duration) -> Result<bool> {
        let late = self.state.lock().late_links.take();
        match late {
            Some((delay, links)) if delay <= timeout => {
                sleep(delay).await;
                self.state.lock().links = links;
                Ok(true)
            }
            other => {
                self.state.lock().late_links = other;
                sleep(timeout).await;
                Ok(false)
            }
        }
    }

    async fn end_mutation_watch(&self) -> Result<()> {
        self.state.lock().watch_ended += 1;
        Ok(())
    }

    async fn stage_node(&self, node_id: &str, markup: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.reject_staging {
            return Ok(false);
        }
        state.staged.insert(node_id.to_string(), markup.to_string());
        state.staged_total += 1;
        Ok(true)
    }

    async fn warm_node(&self, node_id: &str) -> Result<()> {
        self.state.lock().warmed.push(node_id.to_string());
        Ok(())
    }

    async fn replace_statement(&self, replacement: Replacement<'_>) -> Result<bool> {
        let mut state = self.state.lock();
        if state.statement.is_none() {
            return Ok(false);
        }
        let incoming = match replacement {
            Replacement::Staged { .. } if state.refuse_staged_swap => None,
            Replacement::Staged { node_id } => state.staged.remove(node_id),
            Replacement::Markup { markup, .. } => Some(markup.to_string()),
        };
        match incoming {
            Some(markup) => {
                state.statement = Some(markup);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_page_content(&self, markup: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.page_content = markup.to_string();
        state.statement = markup::statement_fragment(markup);
        Ok(true)
    }

    async fn rendered_title(&self) -> Result<Option<String>> {
        Ok(self.state.lock().statement.as_deref().and_then(markup::statement_title))
    }

    async fn statement_text_len(&self) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .statement
            .as_deref()
            .map(markup::statement_text_len)
            .unwrap_or(0))
    }

    async fn push_history(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.history.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        self.state.lock().title = title.to_string();
        Ok(())
    }

    async fn schedule_typeset(&self, _node_id: Option<&str>) -> Result<()> {
        self.state.lock().typesets += 1;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        self.state.lock().scrolls += 1;
        Ok(())
    }

    async fn emit_swapped(&self, url: &str) -> Result<()> {
        self.state.lock().swapped_events.push(url.to_string());
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.state.lock().navigations.push(url.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.state.lock().reloads += 1;
        Ok(())
    }

    async fn attach(&self) -> Result<()> {
        self.state.lock().attached = true;
        Ok(())
    }

    async fn enable_navigation(&self) -> Result<()> {
        self.state.lock().navigation_enabled = true;
        Ok(())
    }

    async fn publish_bounds(&self, has_previous: bool, has_next: bool) -> Result<()> {
        self.state.lock().bounds = (has_previous, has_next);
        Ok(())
    }

    async fn drain_events(&self) -> Result<Option<Vec<HostEvent>>> {
        let mut state = self.state.lock();
        if !state.attached {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut state.inbox)))
    }
}

// ========== 假请求器 ==========

/// URL -> 响应文本，记录每一次请求
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.responses.lock().insert(url.into(), body.into());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.calls.lock().push(url.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let body = self.responses.lock().get(url).cloned();
        match body {
            Some(body) => Ok(body),
            None => Err(FetchError::BadStatus {
                url: url.to_string(),
                status: 404,
            }
            .into()),
        }
    }
}

// ========== 可控时钟 ==========

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

// ========== 组装 ==========

pub fn settings() -> NavSettings {
    NavSettings {
        captcha_cooldown: Duration::from_secs(300),
        mutation_watch: Duration::from_millis(150),
        min_statement_chars: 30,
        prefetch_delay: Duration::ZERO,
    }
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub fetcher: Arc<FakeFetcher>,
    pub clock: Arc<ManualClock>,
    pub guard: Arc<CaptchaGuard>,
    pub controller: NavigationController,
}

pub fn harness(host: FakeHost, fetcher: FakeFetcher) -> Harness {
    let start_url = host.state.lock().url.clone();
    let (contest, start_index) = ContestRef::from_problem_url(&start_url).unwrap();

    let host = Arc::new(host);
    let fetcher = Arc::new(fetcher);
    let clock = Arc::new(ManualClock::new());
    let settings = settings();
    let guard = Arc::new(CaptchaGuard::new(clock.clone(), settings.captcha_cooldown));
    let controller = NavigationController::new(
        contest,
        start_index,
        host.clone(),
        fetcher.clone(),
        guard.clone(),
        settings,
    );

    Harness {
        host,
        fetcher,
        clock,
        guard,
        controller,
    }
}

/// 常见场景：侧边栏列出 A B C，批量题面与单题页面都可用
pub fn contest_harness(start: &str) -> Harness {
    let fetcher = FakeFetcher::new()
        .respond(problems_url(), problems_page())
        .respond(problem_url("A"), problem_page("A"))
        .respond(problem_url("B"), problem_page("B"))
        .respond(problem_url("C"), problem_page("C"));
    harness(FakeHost::on_problem(start).with_sidebar(&["A", "B", "C", "A"]), fetcher)
}

//! 导航控制器
//!
//! 一个页面会话一个控制器：组装缓存与引擎，发现题目顺序，
//! 把按键和浏览器前进/后退翻译成切题请求。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::NavSettings;
use crate::error::NavError;
use crate::infrastructure::{Fetcher, HostDocument, HostEvent, KeyPress};
use crate::models::{ContestRef, Direction, NavigationState, Order, ProblemIndex};
use crate::services::{gesture_for, CaptchaGuard, NodePreparer, PageCache, ProblemDiscovery, StatementCache};
use crate::workflow::{SwapEngine, SwapOutcome};

/// 一个事件被处理后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// 不是导航相关的事件，或导航尚未启用
    Ignored,
    /// 已在顺序的首/尾，什么也没做
    Boundary,
    Swap(SwapOutcome),
    /// 回到了切题产生的历史记录，已整页重新加载
    Reload,
}

pub struct NavigationController {
    contest: ContestRef,
    start_index: ProblemIndex,
    host: Arc<dyn HostDocument>,
    discovery: ProblemDiscovery,
    statements: Arc<StatementCache>,
    pages: Arc<PageCache>,
    preparer: Arc<NodePreparer>,
    guard: Arc<CaptchaGuard>,
    state: Arc<Mutex<NavigationState>>,
    engine: SwapEngine,
    settings: NavSettings,
    enabled: AtomicBool,
    /// 本会话是否已经原地切过题
    swapped: AtomicBool,
}

impl NavigationController {
    /// 组装一个页面会话所需的全部服务
    ///
    /// `guard` 跨页面会话共享，其余状态随会话创建和销毁。
    pub fn new(
        contest: ContestRef,
        start_index: ProblemIndex,
        host: Arc<dyn HostDocument>,
        fetcher: Arc<dyn Fetcher>,
        guard: Arc<CaptchaGuard>,
        settings: NavSettings,
    ) -> Self {
        let statements = Arc::new(StatementCache::new(&contest, fetcher.clone(), guard.clone()));
        let pages = Arc::new(PageCache::new(fetcher.clone(), guard.clone()));
        let preparer = Arc::new(NodePreparer::new(host.clone(), statements.clone()));
        let state = Arc::new(Mutex::new(NavigationState::default()));
        let discovery = ProblemDiscovery::new(contest.clone(), fetcher, guard.clone());
        let engine = SwapEngine::new(
            contest.clone(),
            host.clone(),
            statements.clone(),
            pages.clone(),
            preparer.clone(),
            guard.clone(),
            state.clone(),
            settings.clone(),
        );

        Self {
            contest,
            start_index,
            host,
            discovery,
            statements,
            pages,
            preparer,
            guard,
            state,
            engine,
            settings,
            enabled: AtomicBool::new(false),
            swapped: AtomicBool::new(false),
        }
    }

    pub fn contest(&self) -> &ContestRef {
        &self.contest
    }

    pub fn engine(&self) -> &SwapEngine {
        &self.engine
    }

    pub fn statements(&self) -> &Arc<StatementCache> {
        &self.statements
    }

    pub fn pages(&self) -> &Arc<PageCache> {
        &self.pages
    }

    pub fn preparer(&self) -> &Arc<NodePreparer> {
        &self.preparer
    }

    pub fn guard(&self) -> &Arc<CaptchaGuard> {
        &self.guard
    }

    pub fn state(&self) -> &Arc<Mutex<NavigationState>> {
        &self.state
    }

    /// 导航是否已启用
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 发现题目顺序并启用导航
    ///
    /// 页面链接为空时，网络发现（与批量题面并行）和页面变化观察同时进行，
    /// 谁先给出非空顺序就用谁。都没有结果时退回批量题面的顺序。
    pub async fn initialize(&self) -> Result<Order, NavError> {
        if let Err(e) = self.host.attach().await {
            warn!("⚠️ 安装页面监听失败: {:#}", e);
        }

        let mut order = self.discovery.from_current_page(self.host.as_ref()).await;
        if order.is_empty() {
            order = self.discover_in_background().await;
        }
        if order.is_empty() {
            self.statements.ensure().await;
            order = self.statements.order();
            if !order.is_empty() {
                debug!("使用批量题面的顺序");
            }
        }
        if order.is_empty() {
            info!("未能发现题目顺序，快速切题保持关闭");
            return Err(NavError::DiscoveryExhausted);
        }

        info!(
            "✓ 发现 {} 道题: {}",
            order.len(),
            order.as_slice().iter().map(|i| i.as_str()).collect::<Vec<_>>().join(" ")
        );
        if !self.start_with_order(order.clone()).await {
            return Err(NavError::DiscoveryExhausted);
        }
        Ok(order)
    }

    async fn discover_in_background(&self) -> Order {
        let watch = self.discovery.watch_for_order(self.host.as_ref(), self.settings.mutation_watch);
        let network = async {
            let (order, _) = tokio::join!(self.discovery.discover_remote(), self.statements.ensure());
            order
        };
        tokio::pin!(watch);
        tokio::pin!(network);

        let order = tokio::select! {
            found = &mut watch => match found {
                Some(order) => order,
                None => network.await,
            },
            remote = &mut network => {
                if remote.is_empty() {
                    watch.await.unwrap_or_default()
                } else {
                    remote
                }
            }
        };

        // 网络先返回时观察还没结束
        if let Err(e) = self.host.end_mutation_watch().await {
            debug!("停止观察失败（忽略）: {:#}", e);
        }
        order
    }

    /// 用已知顺序初始化状态：预取邻居、预备节点、启用按键
    ///
    /// 当前题号不在顺序中时返回 false，导航保持关闭。
    pub async fn start_with_order(&self, order: Order) -> bool {
        if !self.state.lock().initialize(order, &self.start_index) {
            warn!("⚠️ 当前题目 {} 不在题目顺序中，快速切题保持关闭", self.start_index);
            return false;
        }

        self.prefetch_neighbors().await;
        self.engine.prepare_neighbors().await;
        self.engine.publish_bounds().await;
        if let Err(e) = self.host.enable_navigation().await {
            warn!("⚠️ 启用按键监听失败: {:#}", e);
        }
        self.enabled.store(true, Ordering::Release);
        info!("[题目 {}] ✓ 快速切题已启用", self.start_index);
        true
    }

    /// 批量题面为空时，逐个拉取邻居的单题页面
    async fn prefetch_neighbors(&self) {
        if !self.statements.is_empty() || self.guard.is_active() {
            return;
        }
        let neighbors = self.state.lock().neighbors();
        for neighbor in neighbors {
            if !self.settings.prefetch_delay.is_zero() {
                sleep(self.settings.prefetch_delay).await;
            }
            if self.guard.is_active() {
                break;
            }
            let url = self.contest.problem_url(&neighbor);
            match self.pages.fetch_page(&url).await {
                Ok(_) => debug!("[题目 {}] 已预取页面", neighbor),
                Err(e) => debug!("[题目 {}] 预取失败（忽略）: {:#}", neighbor, e),
            }
        }
    }

    pub async fn handle_event(&self, event: HostEvent) -> ControllerAction {
        match event {
            HostEvent::Key(press) => self.handle_key(&press).await,
            HostEvent::PopState { swap_entry } => self.handle_pop_state(swap_entry).await,
        }
    }

    pub async fn handle_key(&self, press: &KeyPress) -> ControllerAction {
        match gesture_for(press) {
            Some(direction) => self.go(direction).await,
            None => ControllerAction::Ignored,
        }
    }

    /// 向某个方向移动一题，边界处什么也不做
    pub async fn go(&self, direction: Direction) -> ControllerAction {
        if !self.is_enabled() {
            return ControllerAction::Ignored;
        }
        let target = self.state.lock().neighbor(direction).cloned();
        let Some(target) = target else {
            debug!("已在边界，忽略 {:?}", direction);
            return ControllerAction::Boundary;
        };
        let url = self.contest.problem_url(&target);
        let outcome = self.engine.swap_to(&url).await;
        if outcome.is_committed() {
            self.swapped.store(true, Ordering::Release);
        }
        ControllerAction::Swap(outcome)
    }

    /// 回到切题写入的历史记录时整页重新加载，避免状态与内容不一致
    ///
    /// 切过题之后回到最初那条记录同样要重新加载，此时页面上显示的已经不是它了。
    pub async fn handle_pop_state(&self, swap_entry: bool) -> ControllerAction {
        if !swap_entry && !self.swapped.load(Ordering::Acquire) {
            return ControllerAction::Ignored;
        }
        info!("↩ 历史导航回到切题记录，重新加载页面");
        if let Err(e) = self.host.reload().await {
            warn!("⚠️ 重新加载失败: {:#}", e);
        }
        ControllerAction::Reload
    }
}

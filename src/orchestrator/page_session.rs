//! 页面会话运行器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：启动日志、连接浏览器、创建 JsExecutor / 宿主页面 / 请求器
//! 2. **会话管理**：每次文档加载创建一个 [`NavigationController`]，页面重新加载后重建
//! 3. **事件分发**：轮询页面收件箱，把事件交给控制器
//! 4. **资源管理**：唯一持有 Browser 的模块；验证码冷却跨会话共享
//! 5. **统计**：每个会话结束时输出切题统计

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::{Config, FetchMode};
use crate::infrastructure::{CdpDocument, Fetcher, HostDocument, HttpFetcher, JsExecutor, PageFetcher, SystemClock};
use crate::models::{load_preferences, ContestRef};
use crate::orchestrator::navigation_controller::{ControllerAction, NavigationController};
use crate::services::CaptchaGuard;
use crate::utils::logging::{log_session_start, log_session_summary, log_startup, SessionStats};
use crate::workflow::SwapOutcome;

/// 一次文档加载对应的会话
struct PageSession {
    id: usize,
    controller: NavigationController,
    stats: SessionStats,
}

impl PageSession {
    fn record(&mut self, action: &ControllerAction) {
        match action {
            ControllerAction::Swap(SwapOutcome::Committed { .. }) => self.stats.committed += 1,
            ControllerAction::Swap(SwapOutcome::FullNavigation { .. }) => self.stats.full_navigations += 1,
            ControllerAction::Swap(SwapOutcome::Busy) => self.stats.ignored_busy += 1,
            ControllerAction::Reload => self.stats.reloads += 1,
            ControllerAction::Ignored | ControllerAction::Boundary => {}
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    host: Arc<dyn HostDocument>,
    fetcher: Arc<dyn Fetcher>,
    guard: Arc<CaptchaGuard>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        // 连接浏览器
        let (browser, page) =
            browser::connect_to_browser_and_page(config.browser_debug_port, &config.target_url_pattern).await?;

        // 创建 JsExecutor（持有 page）
        let executor = JsExecutor::new(page);
        let host: Arc<dyn HostDocument> = Arc::new(CdpDocument::new(executor.clone()));
        let fetcher: Arc<dyn Fetcher> = match config.fetch_mode {
            FetchMode::Page => Arc::new(PageFetcher::new(executor.clone())),
            FetchMode::Http => Arc::new(HttpFetcher::new(config.session_cookie.as_deref())?),
        };
        let guard = Arc::new(CaptchaGuard::new(Arc::new(SystemClock), config.nav.captcha_cooldown));

        Ok(Self {
            config,
            _browser: browser,
            host,
            fetcher,
            guard,
        })
    }

    /// 运行应用主逻辑，直到 Ctrl+C
    pub async fn run(&self) -> Result<()> {
        tokio::select! {
            result = self.event_loop() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("👋 收到 Ctrl+C，程序退出");
                Ok(())
            }
        }
    }

    async fn event_loop(&self) -> Result<()> {
        let mut session: Option<PageSession> = None;
        let mut session_count = 0;

        loop {
            sleep(self.config.poll_interval()).await;

            let events = match self.host.drain_events().await {
                Ok(events) => events,
                Err(e) => {
                    // 页面正在跳转时脚本会失败，下一轮再试
                    debug!("读取页面事件失败: {:#}", e);
                    continue;
                }
            };

            let Some(events) = events else {
                // 收件箱不见了：页面已重新加载或整页跳转
                if let Some(finished) = session.take() {
                    log_session_summary(finished.id, &finished.stats);
                }
                session = self.bootstrap(&mut session_count).await;
                continue;
            };

            let Some(active) = session.as_mut() else {
                continue;
            };
            for event in events {
                let action = active.controller.handle_event(event).await;
                active.record(&action);
                if matches!(action, ControllerAction::Swap(_)) {
                    // 切换期间积压的按键作废
                    if let Ok(Some(stale)) = self.host.drain_events().await {
                        if !stale.is_empty() {
                            debug!("丢弃切换期间的 {} 个事件", stale.len());
                        }
                    }
                    break;
                }
            }
        }
    }

    /// 为新文档建立会话；不是题目页或偏好关闭时返回 None
    async fn bootstrap(&self, session_count: &mut usize) -> Option<PageSession> {
        let url = match self.host.current_url().await {
            Ok(url) => url,
            Err(e) => {
                debug!("读取页面地址失败: {:#}", e);
                return None;
            }
        };
        if let Err(e) = self.host.attach().await {
            debug!("页面尚未就绪: {:#}", e);
            return None;
        }

        *session_count += 1;
        log_session_start(*session_count, &url);

        let Some((contest, index)) = ContestRef::from_problem_url(&url) else {
            info!("不是题目页，等待下一次跳转");
            return None;
        };

        let preferences = load_preferences(Path::new(&self.config.preferences_file)).await;
        if !preferences.instant_nav {
            info!("偏好设置已关闭快速切题");
            return None;
        }

        let controller = NavigationController::new(
            contest,
            index,
            self.host.clone(),
            self.fetcher.clone(),
            self.guard.clone(),
            self.config.nav.clone(),
        );
        if let Err(e) = controller.initialize().await {
            warn!("⚠️ 本页不启用快速切题: {}", e);
        }

        Some(PageSession {
            id: *session_count,
            controller,
            stats: SessionStats::default(),
        })
    }
}

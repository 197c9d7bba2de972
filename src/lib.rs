//! # CF Instant Nav
//!
//! 在 Codeforces 题目页之间原地快速切换的 Rust 应用程序
//!
//! 程序通过调试端口附加到用户已经打开的题目标签页，按左右方向键（或 Ctrl+H / Ctrl+L）
//! 时不重新加载页面，而是把下一题的题面直接换进来。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page、HTTP 客户端、时钟），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `HostDocument` - 宿主页面能力（替换题面、写历史、排版……），`CdpDocument` 为真实实现
//! - `Fetcher` - 带登录态的请求能力（页面内 fetch 或 reqwest）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ProblemDiscovery` - 题目顺序发现
//! - `StatementCache` / `PageCache` - 批量题面与单题页面缓存
//! - `NodePreparer` - 屏幕外预备节点
//! - `CaptchaGuard` - 验证码熔断
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次切题"的完整流程
//! - `SwapEngine` - 解析 → 替换 → 校验 → 恢复 → 提交，失败时整页跳转
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/navigation_controller` - 一个页面一个控制器，处理按键与历史导航
//! - `orchestrator/page_session` - 管理浏览器与页面会话
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::{Config, NavSettings};
pub use error::{AppError, AppResult, NavError};
pub use infrastructure::{HostDocument, JsExecutor};
pub use models::{ContestRef, Order, ProblemIndex};
pub use orchestrator::{App, ControllerAction, NavigationController};
pub use workflow::{SwapEngine, SwapOutcome, SwapPath};

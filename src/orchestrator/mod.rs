//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话管理和事件调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `page_session` - 页面会话运行器
//! - 管理应用生命周期（初始化、运行、退出）
//! - 管理浏览器资源（Browser、JsExecutor）
//! - 检测文档重新加载，为每次加载创建新的控制器
//! - 输出每个会话的统计信息
//!
//! ### `navigation_controller` - 导航控制器
//! - 组装缓存、预备器与切题引擎
//! - 发现题目顺序，预取并预备邻居
//! - 把按键 / 前进后退翻译成切题请求
//!
//! ## 层次关系
//!
//! ```text
//! page_session (处理文档加载)
//!     ↓
//! navigation_controller (处理按键与历史导航)
//!     ↓
//! workflow::SwapEngine (处理一次切题)
//!     ↓
//! services (能力层：发现 / 缓存 / 预备 / 验证码)
//!     ↓
//! infrastructure (基础设施：JsExecutor / HostDocument / Fetcher)
//! ```

pub mod navigation_controller;
pub mod page_session;

// 重新导出主要类型
pub use navigation_controller::{ControllerAction, NavigationController};
pub use page_session::App;

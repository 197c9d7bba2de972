//! 业务能力层
//!
//! 每个服务只描述"我能做什么"：解析、缓存、发现、预备节点。
//! 切题流程上的判断放在 `workflow`。

pub mod captcha_guard;
pub mod discovery;
pub mod key_bindings;
pub mod markup;
pub mod node_preparer;
pub mod page_cache;
pub mod statement_cache;

pub use captcha_guard::CaptchaGuard;
pub use discovery::ProblemDiscovery;
pub use key_bindings::{gesture_for, page_bindings, PageBinding};
pub use node_preparer::{NodePreparer, PreparedNode};
pub use page_cache::PageCache;
pub use statement_cache::StatementCache;

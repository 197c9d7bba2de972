//! 基础设施层
//!
//! 持有稀缺资源（Page、HTTP 客户端、时钟），只暴露能力。

pub mod cdp_document;
pub mod clock;
pub mod fetcher;
pub mod host_document;
pub mod js_executor;

pub use cdp_document::CdpDocument;
pub use clock::{Clock, SystemClock};
pub use fetcher::{Fetcher, HttpFetcher, PageFetcher};
pub use host_document::{HostDocument, HostEvent, KeyPress, ProblemLinks, Replacement};
pub use js_executor::JsExecutor;

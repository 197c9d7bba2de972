//! 流程层（Workflow Layer）
//!
//! 定义"一次切题"的完整流程：解析目标 → 替换 → 校验 → 恢复 → 提交。
//! 只组合 services 提供的能力，不持有浏览器资源。

pub mod swap_engine;

pub use swap_engine::{SwapEngine, SwapOutcome, SwapPath, SwapPhase};

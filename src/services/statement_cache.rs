//! 批量题面缓存
//!
//! 只对比赛的 `/problems` 页发起一次请求，拆分成每道题一个条目。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::captcha_guard::CaptchaGuard;
use super::markup;
use crate::infrastructure::Fetcher;
use crate::models::{ContestRef, Order, ProblemIndex, StatementEntry};

#[derive(Default)]
struct Entries {
    order: Vec<ProblemIndex>,
    by_key: HashMap<String, Arc<StatementEntry>>,
}

/// 题号 -> 题面
///
/// 条目只写一次；`attempt` 与"是否有内容"分开记录，空结果不会引发重复请求。
pub struct StatementCache {
    source_url: String,
    fetcher: Arc<dyn Fetcher>,
    guard: Arc<CaptchaGuard>,
    entries: RwLock<Entries>,
    attempt: OnceCell<bool>,
}

impl StatementCache {
    pub fn new(contest: &ContestRef, fetcher: Arc<dyn Fetcher>, guard: Arc<CaptchaGuard>) -> Self {
        Self {
            source_url: contest.problems_url(),
            fetcher,
            guard,
            entries: RwLock::new(Entries::default()),
            attempt: OnceCell::new(),
        }
    }

    /// 写入一个条目；同一题号已存在时忽略并返回 false
    pub fn insert(&self, entry: StatementEntry) -> bool {
        let key = entry.index.key();
        let mut entries = self.entries.write();
        if entries.by_key.contains_key(&key) {
            return false;
        }
        entries.order.push(entry.index.clone());
        entries.by_key.insert(key, Arc::new(entry));
        true
    }

    pub fn get(&self, index: &ProblemIndex) -> Option<Arc<StatementEntry>> {
        self.entries.read().by_key.get(&index.key()).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按批量页中出现的顺序
    pub fn order(&self) -> Order {
        Order::from_indices(self.entries.read().order.iter().cloned())
    }

    /// 是否已经尝试过批量请求
    pub fn is_attempted(&self) -> bool {
        self.attempt.initialized()
    }

    /// 确保批量题面已加载，返回缓存是否有内容
    ///
    /// 并发调用共享同一次请求；验证码冷却期间不发请求，也不消耗这次机会。
    pub async fn ensure(&self) -> bool {
        if !self.is_empty() {
            return true;
        }
        if !self.attempt.initialized() && self.guard.is_active() {
            debug!("验证码冷却中，跳过批量题面请求");
            return false;
        }
        self.attempt.get_or_init(|| self.fill()).await;
        !self.is_empty()
    }

    async fn fill(&self) -> bool {
        debug!("拉取批量题面: {}", self.source_url);
        let html = match self.fetcher.fetch_text(&self.source_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("⚠️ 批量题面请求失败: {:#}", e);
                return false;
            }
        };
        if self.guard.inspect(&self.source_url, &html).is_err() {
            return false;
        }

        let mut added = 0;
        for entry in markup::extract_statements(&html) {
            if self.insert(entry) {
                added += 1;
            }
        }
        info!("✓ 批量题面已缓存 {} 道题", added);
        added > 0
    }
}

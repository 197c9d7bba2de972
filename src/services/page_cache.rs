//! 单题页面缓存
//!
//! 批量题面里没有目标题时的最后手段。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use super::captcha_guard::CaptchaGuard;
use super::markup;
use crate::error::NavError;
use crate::infrastructure::Fetcher;
use crate::models::PageEntry;

type Slot = Arc<OnceCell<Arc<PageEntry>>>;

/// URL -> 页面主体
///
/// 每个 URL 一个槽位，同一 URL 的并发请求只会发出一次；失败不留下条目。
pub struct PageCache {
    fetcher: Arc<dyn Fetcher>,
    guard: Arc<CaptchaGuard>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl PageCache {
    pub fn new(fetcher: Arc<dyn Fetcher>, guard: Arc<CaptchaGuard>) -> Self {
        Self {
            fetcher,
            guard,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<PageEntry>> {
        self.slots.lock().get(url).and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// 已缓存的条目数
    pub fn len(&self) -> usize {
        self.slots.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取缓存，没有时带登录态请求并解析
    ///
    /// 响应是验证码时进入冷却、不缓存，返回 [`NavError::CaptchaChallenge`]。
    pub async fn fetch_page(&self, url: &str) -> Result<Arc<PageEntry>> {
        let slot = self.slots.lock().entry(url.to_string()).or_default().clone();
        if let Some(entry) = slot.get() {
            return Ok(entry.clone());
        }
        if self.guard.is_active() {
            return Err(NavError::CaptchaChallenge { url: url.to_string() }.into());
        }

        let entry = slot
            .get_or_try_init(|| async {
                debug!("拉取题目页: {}", url);
                let html = self
                    .fetcher
                    .fetch_text(url)
                    .await
                    .with_context(|| format!("拉取题目页失败: {}", url))?;
                self.guard.inspect(url, &html)?;
                let page = markup::parse_page(&html);
                Ok::<_, anyhow::Error>(Arc::new(PageEntry {
                    url: url.to_string(),
                    markup: page.content,
                    title: page.title,
                }))
            })
            .await?;
        Ok(entry.clone())
    }
}

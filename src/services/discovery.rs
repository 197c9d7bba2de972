//! 题目顺序发现
//!
//! 按代价从低到高尝试：当前页面上的链接、结构化列表接口、比赛的列表页面。
//! 网络相关的策略都受验证码冷却控制。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::captcha_guard::CaptchaGuard;
use super::markup;
use crate::infrastructure::{Fetcher, HostDocument};
use crate::models::{ContestRef, Order, ProblemIndex};

/// 列表接口响应（只取需要的字段）
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    problems: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    index: Option<String>,
}

/// 解析列表接口的 JSON，状态不是 OK 时返回空顺序
pub fn parse_listing_api(body: &str) -> Result<Order> {
    let response: ApiResponse = serde_json::from_str(body).context("列表接口返回的不是合法 JSON")?;
    if response.status != "OK" {
        return Ok(Order::default());
    }
    let problems = response.result.map(|r| r.problems).unwrap_or_default();
    Ok(Order::from_indices(
        problems
            .into_iter()
            .filter_map(|p| p.index)
            .filter_map(|index| ProblemIndex::parse(&index)),
    ))
}

/// 当前比赛的题目顺序发现
pub struct ProblemDiscovery {
    contest: ContestRef,
    fetcher: Arc<dyn Fetcher>,
    guard: Arc<CaptchaGuard>,
}

impl ProblemDiscovery {
    pub fn new(contest: ContestRef, fetcher: Arc<dyn Fetcher>, guard: Arc<CaptchaGuard>) -> Self {
        Self { contest, fetcher, guard }
    }

    /// 当前页面上的链接：先看导航区域，没有再看整个文档
    pub async fn from_current_page(&self, host: &dyn HostDocument) -> Order {
        let links = match host.problem_links().await {
            Ok(links) => links,
            Err(e) => {
                debug!("读取页面链接失败: {:#}", e);
                return Order::default();
            }
        };

        let from_navigation = markup::indices_from_hrefs(&self.contest, &links.navigation);
        if !from_navigation.is_empty() {
            return from_navigation;
        }
        markup::indices_from_hrefs(&self.contest, &links.document)
    }

    /// 结构化列表接口；gym 没有该接口
    pub async fn from_listing_api(&self) -> Result<Order> {
        let Some(url) = self.contest.listing_api_url() else {
            return Ok(Order::default());
        };
        let body = self.fetcher.fetch_text(&url).await?;
        self.guard.inspect(&url, &body)?;
        parse_listing_api(&body)
    }

    /// 依次拉取比赛首页、题目列表页、排行榜页
    ///
    /// 任何一页是验证码都立即停止。
    pub async fn from_listing_pages(&self) -> Order {
        let pages = [
            self.contest.root_url(),
            self.contest.problems_url(),
            self.contest.standings_url(),
        ];

        for url in pages {
            let html = match self.fetcher.fetch_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!("列表页请求失败 ({}): {:#}", url, e);
                    continue;
                }
            };
            if self.guard.inspect(&url, &html).is_err() {
                return Order::default();
            }
            let order = markup::listing_indices(&html, &self.contest);
            if !order.is_empty() {
                debug!("从 {} 发现 {} 道题", url, order.len());
                return order;
            }
        }
        Order::default()
    }

    /// 网络发现：先接口后页面，冷却期间直接放弃
    pub async fn discover_remote(&self) -> Order {
        if self.guard.is_active() {
            debug!("验证码冷却中，跳过网络发现");
            return Order::default();
        }

        match self.from_listing_api().await {
            Ok(order) if !order.is_empty() => {
                info!("✓ 列表接口返回 {} 道题", order.len());
                return order;
            }
            Ok(_) => debug!("列表接口没有可用题目"),
            Err(e) => warn!("⚠️ 列表接口失败: {:#}", e),
        }

        if self.guard.is_active() {
            return Order::default();
        }
        self.from_listing_pages().await
    }

    /// 在窗口期内观察页面结构变化，每次变化后重新扫描链接
    ///
    /// 找到非空顺序或窗口结束时停止观察。
    pub async fn watch_for_order(&self, host: &dyn HostDocument, window: Duration) -> Option<Order> {
        let deadline = Instant::now() + window;
        let mut found = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match host.wait_for_mutation(remaining).await {
                Ok(true) => {
                    let order = self.from_current_page(host).await;
                    if !order.is_empty() {
                        debug!("页面变化后发现 {} 道题", order.len());
                        found = Some(order);
                        break;
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    debug!("观察页面变化失败: {:#}", e);
                    break;
                }
            }
        }

        if let Err(e) = host.end_mutation_watch().await {
            debug!("停止观察失败（忽略）: {:#}", e);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_api() {
        let body = r#"{"status":"OK","result":{"contest":{"id":1850},"problems":[
            {"contestId":1850,"index":"A","name":"To My Critics"},
            {"contestId":1850,"name":"no index"},
            {"contestId":1850,"index":"B","name":"Ten Words of Wisdom"},
            {"contestId":1850,"index":"a","name":"duplicate"}
        ],"rows":[]}}"#;
        let order = parse_listing_api(body).unwrap();
        let names: Vec<&str> = order.as_slice().iter().map(|i| i.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_listing_api_failed_status() {
        let body = r#"{"status":"FAILED","comment":"contestId: Contest with id 1 has not started"}"#;
        assert!(parse_listing_api(body).unwrap().is_empty());
        assert!(parse_listing_api("<html>").is_err());
    }
}

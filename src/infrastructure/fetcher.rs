//! 网络请求能力
//!
//! 题目页、批量题面页和列表接口都只需要"按 URL 取回文本"。

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use serde::Deserialize;
use tracing::debug;

use super::js_executor::{js_literal, JsExecutor};
use crate::error::FetchError;

/// 带登录态的 GET 请求
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// 在题目页内执行 fetch，自动携带浏览器里的会话 Cookie
pub struct PageFetcher {
    executor: JsExecutor,
}

#[derive(Deserialize)]
struct FetchReply {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    body: String,
    #[serde(default)]
    error: Option<String>,
}

impl PageFetcher {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let js_code = format!(
            r#"
            (async () => {{
                try {{
                    const res = await fetch({url}, {{ credentials: "include" }});
                    const body = await res.text();
                    return {{ status: res.status, body: body }};
                }} catch (err) {{
                    return {{ error: String(err && err.message ? err.message : err) }};
                }}
            }})()
            "#,
            url = js_literal(url),
        );

        debug!("页面内请求: {}", url);
        let reply: FetchReply = self.executor.eval_as(js_code).await?;

        if let Some(message) = reply.error {
            return Err(FetchError::ScriptFailed {
                url: url.to_string(),
                message,
            }
            .into());
        }
        if !(200..300).contains(&reply.status) {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: reply.status,
            }
            .into());
        }
        Ok(reply.body)
    }
}

/// 直接使用 reqwest 请求，Cookie 由配置提供
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(session_cookie: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"));
        if let Some(cookie) = session_cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("HTTP 请求: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::request_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| FetchError::request_failed(url, e))?;
        Ok(body)
    }
}

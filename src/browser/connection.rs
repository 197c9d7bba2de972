use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppError, BrowserError};

/// 连接到浏览器并找到题目标签页
///
/// 只附加到已经打开的标签页，不新建页面：题目页需要用户自己的登录会话。
pub async fn connect_to_browser_and_page(port: u16, url_pattern: &str) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(port, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = find_page(&browser, url_pattern).await?;
    Ok((browser, page))
}

/// 查找 URL 包含 `url_pattern` 的第一个标签页
pub async fn find_page(browser: &Browser, url_pattern: &str) -> Result<Page> {
    let pages = browser.pages().await.map_err(AppError::from)?;
    debug!("获取到 {} 个页面", pages.len());

    for page in pages {
        if let Ok(Some(url)) = page.url().await {
            debug!("检查页面: {}", url);
            if url.contains(url_pattern) {
                info!("✓ 找到目标页面: {}", url);
                return Ok(page);
            }
        }
    }

    Err(BrowserError::PageNotFound {
        pattern: url_pattern.to_string(),
    }
    .into())
}

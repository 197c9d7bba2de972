/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则默认 `info`，详细模式下为 `debug`。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目快速切换");
    info!("🔌 浏览器调试端口: {}", config.browser_debug_port);
    info!("🔍 标签页匹配: {}", config.target_url_pattern);
    info!("🌐 请求方式: {:?}", config.fetch_mode);
    info!(
        "⏱ 验证码冷却: {} 秒 / 观察窗口: {} 毫秒",
        config.nav.captcha_cooldown.as_secs(),
        config.nav.mutation_watch.as_millis()
    );
    info!("{}", "=".repeat(60));
}

/// 记录新的页面会话
pub fn log_session_start(session: usize, url: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📄 页面会话 #{}: {}", session, truncate_text(url, 80));
    info!("{}", "─".repeat(60));
}

/// 页面会话内的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub committed: usize,
    pub full_navigations: usize,
    pub ignored_busy: usize,
    pub reloads: usize,
}

/// 打印会话统计信息
pub fn log_session_summary(session: usize, stats: &SessionStats) {
    info!("{}", "─".repeat(60));
    info!(
        "📊 会话 #{} 结束 ({})",
        session,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 原地切换: {}", stats.committed);
    info!("↪ 整页跳转: {}", stats.full_navigations);
    if stats.ignored_busy > 0 {
        info!("⏳ 忙碌时忽略: {}", stats.ignored_busy);
    }
    if stats.reloads > 0 {
        info!("↩ 重新加载: {}", stats.reloads);
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

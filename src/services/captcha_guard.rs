//! 验证码熔断
//!
//! 一旦在任何响应里识别出验证码，在冷却期内所有依赖网络的策略都让位给整页跳转。
//! 冷却只会随时间结束，没有手动清除的入口。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;

use crate::error::NavError;
use crate::infrastructure::Clock;

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)captcha|enter the code|verification").expect("验证码标题正则"))
}

fn captcha_input() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| Selector::parse(r#"input[name="captcha"]"#).expect("选择器字面量"))
}

fn title_selector() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| Selector::parse("title").expect("选择器字面量"))
}

const BODY_PHRASES: [&str; 2] = ["captcha", "enter the code from the picture"];

/// 判断一个已解析的文档是否是验证码页面
///
/// 依次检查：标题、原始文本、验证码输入框。
pub fn classify(doc: &Html, raw_text: &str) -> bool {
    let title: String = doc
        .select(title_selector())
        .next()
        .map(|t| t.text().collect())
        .unwrap_or_default();
    if title_regex().is_match(&title) {
        return true;
    }

    let body = raw_text.to_lowercase();
    if BODY_PHRASES.iter().any(|phrase| body.contains(phrase)) {
        return true;
    }

    doc.select(captcha_input()).next().is_some()
}

/// 解析原始响应后判断
pub fn classify_text(raw_text: &str) -> bool {
    classify(&Html::parse_document(raw_text), raw_text)
}

/// 验证码冷却（全局共享）
pub struct CaptchaGuard {
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    until: Mutex<Option<DateTime<Utc>>>,
}

impl CaptchaGuard {
    pub fn new(clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            clock,
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::minutes(5)),
            until: Mutex::new(None),
        }
    }

    /// 冷却是否仍在生效
    pub fn is_active(&self) -> bool {
        match *self.until.lock() {
            Some(until) => self.clock.now() < until,
            None => false,
        }
    }

    /// 冷却结束时间
    pub fn until(&self) -> Option<DateTime<Utc>> {
        *self.until.lock()
    }

    /// 进入冷却；已有更晚的结束时间时保持不变
    pub fn trip(&self) -> DateTime<Utc> {
        // 冷却时长极大时封顶，不能溢出
        let candidate = self
            .clock
            .now()
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut until = self.until.lock();
        let next = match *until {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        };
        *until = Some(next);
        next
    }

    /// 检查一次响应；是验证码时进入冷却并返回错误，调用方不得缓存内容
    pub fn inspect(&self, url: &str, raw_text: &str) -> Result<(), NavError> {
        if !classify_text(raw_text) {
            return Ok(());
        }
        let until = self.trip();
        warn!("🛑 检测到验证码 ({})，网络策略暂停至 {}", url, until.format("%H:%M:%S"));
        Err(NavError::CaptchaChallenge { url: url.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn guard() -> (Arc<FixedClock>, CaptchaGuard) {
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let guard = CaptchaGuard::new(clock.clone(), Duration::from_secs(300));
        (clock, guard)
    }

    #[test]
    fn test_classify_by_title() {
        assert!(classify_text("<html><head><title>Verification</title></head><body></body></html>"));
        assert!(classify_text("<title>Please Enter the Code</title>"));
    }

    #[test]
    fn test_classify_by_body_and_input() {
        assert!(classify_text("<p>Enter the code from the picture</p>"));
        assert!(classify_text(r#"<form><input name="captcha"></form>"#));
    }

    #[test]
    fn test_regular_page_is_not_a_challenge() {
        let html = r#"<html><head><title>Problem - A - Codeforces</title></head>
            <body><div id="pageContent"><div class="problem-statement">A. Watermelon</div></div></body></html>"#;
        assert!(!classify_text(html));
    }

    #[test]
    fn test_trip_sets_five_minute_window() {
        let (clock, guard) = guard();
        assert!(!guard.is_active());

        let start = clock.now();
        let until = guard.trip();
        assert_eq!(until - start, chrono::Duration::minutes(5));
        assert!(guard.is_active());

        *clock.0.lock() = start + chrono::Duration::minutes(4);
        assert!(guard.is_active());
        *clock.0.lock() = start + chrono::Duration::minutes(5);
        assert!(!guard.is_active());
    }

    #[test]
    fn test_trip_never_shortens_window() {
        let (clock, guard) = guard();
        let first = guard.trip();
        let earlier = clock.now() - chrono::Duration::minutes(1);
        *clock.0.lock() = earlier;
        assert_eq!(guard.trip(), first);
    }

    #[test]
    fn test_huge_cooldown_saturates_instead_of_overflowing() {
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        // 约三百万年，超出 DateTime 的表示范围
        let guard = CaptchaGuard::new(clock, Duration::from_secs(100_000_000_000_000));

        assert_eq!(guard.trip(), DateTime::<Utc>::MAX_UTC);
        assert!(guard.is_active());
        assert!(guard.inspect("u", "<title>CAPTCHA</title>").is_err());
    }

    #[test]
    fn test_inspect_reports_challenge() {
        let (_, guard) = guard();
        assert!(guard.inspect("u", "<title>ok</title>").is_ok());
        assert!(matches!(
            guard.inspect("u", "<title>CAPTCHA</title>"),
            Err(NavError::CaptchaChallenge { .. })
        ));
        assert!(guard.is_active());
    }
}

use std::time::Duration;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 用于定位题目标签页的 URL 片段
    pub target_url_pattern: String,
    /// 偏好设置文件（TOML）
    pub preferences_file: String,
    /// 网络请求方式
    pub fetch_mode: FetchMode,
    /// `http` 模式下附带的 Cookie
    pub session_cookie: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 页面事件轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 导航引擎参数
    pub nav: NavSettings,
}

/// 网络请求方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// 在页面内调用 fetch，自动携带登录会话
    Page,
    /// 由 reqwest 直接请求，需要手动提供 Cookie
    Http,
}

impl std::str::FromStr for FetchMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(FetchMode::Page),
            "http" => Ok(FetchMode::Http),
            _ => Err(()),
        }
    }
}

/// 导航引擎参数
///
/// 原先写死的常量都放在这里，测试时可以按需缩短。
#[derive(Clone, Debug)]
pub struct NavSettings {
    /// 验证码冷却时长
    pub captcha_cooldown: Duration,
    /// 被动观察 DOM 变化的时长
    pub mutation_watch: Duration,
    /// 题面可见文本的最小长度
    pub min_statement_chars: usize,
    /// 邻居预取前的延迟
    pub prefetch_delay: Duration,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            captcha_cooldown: Duration::from_secs(5 * 60),
            mutation_watch: Duration::from_millis(4000),
            min_statement_chars: 30,
            prefetch_delay: Duration::ZERO,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 2001,
            target_url_pattern: "/problem/".to_string(),
            preferences_file: "preferences.toml".to_string(),
            fetch_mode: FetchMode::Page,
            session_cookie: None,
            verbose_logging: false,
            poll_interval_ms: 50,
            nav: NavSettings::default(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，解析失败的变量回退到默认值
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 宽松模式：无法解析的变量保持默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::read(&EnvReader { lookup, strict: false }).unwrap_or_default()
    }

    /// 严格模式：任何一个变量无法解析都返回错误
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::read(&EnvReader { lookup, strict: true })
    }

    fn read<F>(vars: &EnvReader<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = vars.parse("BROWSER_DEBUG_PORT", "u16")? {
            config.browser_debug_port = port;
        }
        if let Some(pattern) = vars.text("TARGET_URL_PATTERN") {
            config.target_url_pattern = pattern;
        }
        if let Some(file) = vars.text("PREFERENCES_FILE") {
            config.preferences_file = file;
        }
        if let Some(mode) = vars.parse("FETCH_MODE", "page | http")? {
            config.fetch_mode = mode;
        }
        config.session_cookie = vars.text("SESSION_COOKIE").filter(|v| !v.is_empty());
        if let Some(verbose) = vars.parse("VERBOSE_LOGGING", "bool")? {
            config.verbose_logging = verbose;
        }
        if let Some(ms) = vars.parse("POLL_INTERVAL_MS", "u64")? {
            config.poll_interval_ms = ms;
        }
        if let Some(secs) = vars.parse("CAPTCHA_COOLDOWN_SECS", "u64")? {
            config.nav.captcha_cooldown = Duration::from_secs(secs);
        }
        if let Some(ms) = vars.parse("MUTATION_WATCH_MS", "u64")? {
            config.nav.mutation_watch = Duration::from_millis(ms);
        }
        if let Some(chars) = vars.parse("MIN_STATEMENT_CHARS", "usize")? {
            config.nav.min_statement_chars = chars;
        }
        if let Some(ms) = vars.parse("PREFETCH_DELAY_MS", "u64")? {
            config.nav.prefetch_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// 轮询间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// 变量来源；宽松模式下解析失败视为未设置
struct EnvReader<F> {
    lookup: F,
    strict: bool,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, var_name: &str) -> Option<String> {
        (self.lookup)(var_name)
    }

    fn parse<T: std::str::FromStr>(&self, var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.text(var_name) else {
            return Ok(None);
        };
        match parse_var(var_name, &value, expected_type) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) if self.strict => Err(e),
            Err(_) => Ok(None),
        }
    }
}

fn parse_var<T: std::str::FromStr>(var_name: &str, value: &str, expected_type: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvVarParseFailed {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected_type: expected_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::try_from_lookup(|_| None).unwrap();
        assert_eq!(config.browser_debug_port, 2001);
        assert_eq!(config.fetch_mode, FetchMode::Page);
        assert_eq!(config.nav.captcha_cooldown, Duration::from_secs(300));
        assert_eq!(config.nav.mutation_watch, Duration::from_millis(4000));
        assert_eq!(config.nav.min_statement_chars, 30);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::try_from_lookup(lookup_from(&[
            ("BROWSER_DEBUG_PORT", "9222"),
            ("FETCH_MODE", "HTTP"),
            ("CAPTCHA_COOLDOWN_SECS", "60"),
            ("SESSION_COOKIE", "JSESSIONID=abc"),
        ]))
        .unwrap();
        assert_eq!(config.browser_debug_port, 9222);
        assert_eq!(config.fetch_mode, FetchMode::Http);
        assert_eq!(config.nav.captcha_cooldown, Duration::from_secs(60));
        assert_eq!(config.session_cookie.as_deref(), Some("JSESSIONID=abc"));
    }

    #[test]
    fn test_bad_value_reports_variable() {
        let err = Config::try_from_lookup(lookup_from(&[("POLL_INTERVAL_MS", "fast")])).unwrap_err();
        match err {
            ConfigError::EnvVarParseFailed { var_name, value, .. } => {
                assert_eq!(var_name, "POLL_INTERVAL_MS");
                assert_eq!(value, "fast");
            }
        }
    }

    #[test]
    fn test_lenient_mode_keeps_defaults_for_bad_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("POLL_INTERVAL_MS", "fast"),
            ("FETCH_MODE", "carrier-pigeon"),
            ("MIN_STATEMENT_CHARS", "12"),
            ("TARGET_URL_PATTERN", "/gym/"),
        ]));
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.fetch_mode, FetchMode::Page);
        assert_eq!(config.nav.min_statement_chars, 12);
        assert_eq!(config.target_url_pattern, "/gym/");
    }

    #[test]
    fn test_bad_fetch_mode_is_rejected_in_strict_mode() {
        let err = Config::try_from_lookup(lookup_from(&[("FETCH_MODE", "carrier-pigeon")])).unwrap_err();
        let ConfigError::EnvVarParseFailed { var_name, expected_type, .. } = err;
        assert_eq!(var_name, "FETCH_MODE");
        assert_eq!(expected_type, "page | http");
    }
}

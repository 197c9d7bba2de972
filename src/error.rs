use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 网络请求错误
    #[error("请求错误: {0}")]
    Fetch(#[from] FetchError),
    /// 导航引擎错误
    #[error("导航错误: {0}")]
    Nav(#[from] NavError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 没有找到匹配的标签页
    #[error("没有找到 URL 包含 '{pattern}' 的标签页")]
    PageNotFound { pattern: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 网络请求错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 请求发送失败
    #[error("请求失败 ({url}): {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 非 2xx 状态码
    #[error("请求 {url} 返回状态码 {status}")]
    BadStatus { url: String, status: u16 },
    /// 页面内 fetch 抛出异常
    #[error("页面内请求失败 ({url}): {message}")]
    ScriptFailed { url: String, message: String },
}

/// 导航引擎错误
///
/// 这些错误都不会传到用户面前：要么退化为整页跳转，要么让功能静默失效。
#[derive(Debug, Error)]
pub enum NavError {
    /// 所有发现策略都没有得到题目顺序
    #[error("未能发现比赛的题目顺序")]
    DiscoveryExhausted,
    /// 响应被识别为验证码页面
    #[error("检测到验证码挑战: {url}")]
    CaptchaChallenge { url: String },
    /// 替换后的内容与目标题目不符
    #[error("渲染校验失败: 期望 {expected}, 实际 {rendered:?}")]
    ValidationMismatch {
        expected: String,
        rendered: Option<String>,
    },
    /// 解析或替换过程中的其他故障
    #[error("无感切换失败: {0}")]
    SwapFailure(String),
}

impl NavError {
    /// 判断一个 anyhow 错误是否来自验证码
    pub fn is_captcha(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<NavError>(), Some(NavError::CaptchaChallenge { .. }))
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(port: u16, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }
}

impl FetchError {
    /// 创建请求失败错误
    pub fn request_failed(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        FetchError::RequestFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

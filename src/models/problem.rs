//! 比赛与题号

use std::fmt::{self, Display};
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

/// 题号，例如 "A"、"B1"
///
/// 比较时不区分大小写，`key()` 返回统一的大写形式用作缓存键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProblemIndex(String);

impl ProblemIndex {
    /// 校验并创建题号，只接受字母和数字
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// 从任意 URL 中取出 `/problem/<index>` 部分
    pub fn from_url(url: &str) -> Option<Self> {
        problem_path_regex()
            .captures(url)
            .and_then(|cap| cap.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 缓存键（大写）
    pub fn key(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// 不区分大小写的比较
    pub fn matches(&self, other: &ProblemIndex) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Display for ProblemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn problem_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/problem/([A-Za-z0-9]+)").expect("题号正则"))
}

fn contest_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(contest|gym)/(\d+)/problem/([A-Za-z0-9]+)").expect("比赛路径正则"))
}

/// 比赛类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContestKind {
    Contest,
    Gym,
}

impl ContestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContestKind::Contest => "contest",
            ContestKind::Gym => "gym",
        }
    }

    /// 是否提供结构化的题目列表接口
    pub fn has_listing_api(self) -> bool {
        matches!(self, ContestKind::Contest)
    }
}

/// 当前正在浏览的比赛
///
/// 页面加载后就不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRef {
    pub kind: ContestKind,
    pub id: String,
    /// 形如 `/contest/1850`
    pub base_path: String,
    /// 形如 `https://codeforces.com`
    pub origin: String,
}

impl ContestRef {
    /// 从题目页 URL 解析比赛信息，同时返回 URL 中的题号
    pub fn from_problem_url(url: &str) -> Option<(Self, ProblemIndex)> {
        let parsed = Url::parse(url).ok()?;
        let caps = contest_path_regex().captures(parsed.path())?;
        let kind = match &caps[1] {
            "contest" => ContestKind::Contest,
            _ => ContestKind::Gym,
        };
        let id = caps[2].to_string();
        let index = ProblemIndex(caps[3].to_string());
        let origin = parsed.origin().ascii_serialization();

        Some((
            Self {
                kind,
                base_path: format!("/{}/{}", kind.as_str(), id),
                id,
                origin,
            },
            index,
        ))
    }

    /// 判断一个 URL 是否是题目页
    pub fn is_problem_url(url: &str) -> bool {
        Self::from_problem_url(url).is_some()
    }

    pub fn problem_url(&self, index: &ProblemIndex) -> String {
        format!("{}{}/problem/{}", self.origin, self.base_path, index.as_str())
    }

    pub fn root_url(&self) -> String {
        format!("{}{}", self.origin, self.base_path)
    }

    pub fn problems_url(&self) -> String {
        format!("{}{}/problems", self.origin, self.base_path)
    }

    pub fn standings_url(&self) -> String {
        format!("{}{}/standings", self.origin, self.base_path)
    }

    /// 结构化题目列表接口，gym 没有
    pub fn listing_api_url(&self) -> Option<String> {
        if !self.kind.has_listing_api() {
            return None;
        }
        Some(format!(
            "{}/api/contest.standings?contestId={}&from=1&count=1",
            self.origin, self.id
        ))
    }

    /// 从链接 href 中取题号，要求路径属于本比赛
    ///
    /// 同时接受绝对地址、协议相对地址和根路径地址。
    pub fn index_from_href(&self, href: &str) -> Option<ProblemIndex> {
        let path = strip_origin(href.trim());
        let rest = path.strip_prefix(&self.base_path)?.strip_prefix("/problem/")?;
        let token: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
        ProblemIndex::parse(&token)
    }
}

fn strip_origin(href: &str) -> &str {
    let without_scheme = if let Some(rest) = href.strip_prefix("https:") {
        rest
    } else if let Some(rest) = href.strip_prefix("http:") {
        rest
    } else {
        href
    };
    match without_scheme.strip_prefix("//") {
        Some(host_and_path) => host_and_path.find('/').map(|i| &host_and_path[i..]).unwrap_or(""),
        None => without_scheme,
    }
}

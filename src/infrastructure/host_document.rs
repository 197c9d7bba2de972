//! 宿主页面抽象
//!
//! 引擎对题目页的所有读写都经过 [`HostDocument`]。真实实现是
//! [`CdpDocument`](super::CdpDocument)，测试里用内存假页面代替。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 页面上扫描到的题目链接
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProblemLinks {
    /// 导航区域（侧边栏）里的 href，按文档顺序
    pub navigation: Vec<String>,
    /// 整个文档里的 href，按文档顺序
    pub document: Vec<String>,
}

/// 替换题面时使用的新节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement<'a> {
    /// 已经在暂存区里的节点
    Staged { node_id: &'a str },
    /// 现场从片段构建，并打上 `node_id` 标记
    Markup { markup: &'a str, node_id: &'a str },
}

/// 页面内按键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    /// 焦点在输入框或可编辑区域
    #[serde(default)]
    pub editable_target: bool,
    #[serde(default)]
    pub default_prevented: bool,
}

impl KeyPress {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: false,
            editable_target: false,
            default_prevented: false,
        }
    }

    pub fn with_ctrl(key: &str) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }
}

/// 页面侧排队等待处理的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    Key(KeyPress),
    /// 浏览器前进/后退；`swap_entry` 表示目标是切题时写入的历史记录
    #[serde(rename_all = "camelCase")]
    PopState { swap_entry: bool },
}

/// 宿主页面能力
///
/// 所有方法都只是"能力"，不包含切题流程上的判断。
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// 当前地址
    async fn current_url(&self) -> Result<String>;

    /// 扫描题目链接
    async fn problem_links(&self) -> Result<ProblemLinks>;

    /// 等待一次结构变化，超时返回 false
    async fn wait_for_mutation(&self, timeout: Duration) -> Result<bool>;

    /// 停止观察结构变化
    async fn end_mutation_watch(&self) -> Result<()>;

    /// 把片段放进屏幕外的暂存区
    async fn stage_node(&self, node_id: &str, markup: &str) -> Result<bool>;

    /// 预热暂存节点：等待图片解码并排版公式；节点已不存在时什么也不做
    async fn warm_node(&self, node_id: &str) -> Result<()>;

    /// 平滑替换当前题面，找不到容器或新节点时返回 false
    async fn replace_statement(&self, replacement: Replacement<'_>) -> Result<bool>;

    /// 整体替换主内容区域
    async fn replace_page_content(&self, markup: &str) -> Result<bool>;

    /// 当前显示的题目标题
    async fn rendered_title(&self) -> Result<Option<String>>;

    /// 当前题面的可见文本长度（空白已折叠）
    async fn statement_text_len(&self) -> Result<usize>;

    async fn push_history(&self, url: &str) -> Result<()>;

    async fn set_title(&self, title: &str) -> Result<()>;

    /// 安排公式排版；`node_id` 为空时排版整个内容区
    async fn schedule_typeset(&self, node_id: Option<&str>) -> Result<()>;

    async fn scroll_to_top(&self) -> Result<()>;

    /// 广播切题通知，供页面上的其他功能重新布局
    async fn emit_swapped(&self, url: &str) -> Result<()>;

    /// 整页跳转
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// 安装事件收件箱（按键与 popstate 监听）
    async fn attach(&self) -> Result<()>;

    /// 开始接收导航按键
    async fn enable_navigation(&self) -> Result<()>;

    /// 告诉页面两个方向上是否还能移动，用于决定是否拦截按键默认行为
    async fn publish_bounds(&self, has_previous: bool, has_next: bool) -> Result<()>;

    /// 取出排队的事件；收件箱不存在（页面已重新加载）时返回 None
    async fn drain_events(&self) -> Result<Option<Vec<HostEvent>>>;
}

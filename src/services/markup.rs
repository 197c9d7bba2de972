//! 题目页 HTML 解析
//!
//! 只做纯解析，不发请求也不碰宿主页面。`scraper::Html` 不是 `Send`，
//! 所以这里的函数都同步返回拥有所有权的结果。

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{ContestRef, Order, ProblemIndex, StatementEntry};

/// 页面没有 `<title>` 时使用的标题
pub const DEFAULT_TITLE: &str = "Codeforces";

macro_rules! cached_selector {
    ($name:ident, $css:expr) => {
        fn $name() -> &'static Selector {
            static CELL: OnceLock<Selector> = OnceLock::new();
            CELL.get_or_init(|| Selector::parse($css).expect("选择器字面量"))
        }
    };
}

cached_selector!(problems_table_links, r#"table.problems a[href*="/problem/"]"#);
cached_selector!(problem_links, r#"a[href*="/problem/"]"#);
cached_selector!(statement_titles, ".problem-statement .header .title");
cached_selector!(holders, ".problemindexholder");
cached_selector!(statements, ".problem-statement");
cached_selector!(header_title, ".header .title");
cached_selector!(page_content, "#pageContent");
cached_selector!(document_title, "title");

/// 标题开头的题号，后面紧跟空白或分隔符
fn title_index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9]+)[\s.:\-]").expect("标题题号正则"))
}

/// 列表页题面标题，题号后是 `.` 或 `:`
fn listing_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9]+)\s*[.:]").expect("列表标题正则"))
}

/// 从标题文本中取题号，例如 "B. Two Arrays" -> "B"
pub fn index_from_title(title: &str) -> Option<ProblemIndex> {
    title_index_regex()
        .captures(title.trim())
        .and_then(|cap| ProblemIndex::parse(&cap[1]))
}

/// 按文档顺序从一组 href 中取本比赛的题号
pub fn indices_from_hrefs<'a>(contest: &ContestRef, hrefs: impl IntoIterator<Item = &'a String>) -> Order {
    Order::from_indices(hrefs.into_iter().filter_map(|href| contest.index_from_href(href)))
}

/// 解析比赛首页 / 题目列表页 / 排行榜页中的题号
///
/// 依次尝试：题目表格中的链接、任意本比赛链接、题面标题。
pub fn listing_indices(html: &str, contest: &ContestRef) -> Order {
    let doc = Html::parse_document(html);

    let from_table = Order::from_indices(
        doc.select(problems_table_links())
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| ProblemIndex::from_url(href)),
    );
    if !from_table.is_empty() {
        return from_table;
    }

    let from_links = Order::from_indices(
        doc.select(problem_links())
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| contest.index_from_href(href)),
    );
    if !from_links.is_empty() {
        return from_links;
    }

    Order::from_indices(doc.select(statement_titles()).filter_map(|title| {
        let text = collapsed_text(title);
        listing_title_regex()
            .captures(&text)
            .and_then(|cap| ProblemIndex::parse(&cap[1]))
    }))
}

/// 解析批量题面页
///
/// 优先取完整的 `.problemindexholder`，没有时退回到 `.problem-statement`。
/// 标题取不到题号的条目直接跳过，同一题号只保留第一次出现。
pub fn extract_statements(html: &str) -> Vec<StatementEntry> {
    let doc = Html::parse_document(html);

    let mut entries: Vec<StatementEntry> = doc
        .select(holders())
        .filter_map(|holder| entry_from(holder, statement_titles()))
        .collect();

    if entries.is_empty() {
        entries = doc
            .select(statements())
            .filter_map(|block| entry_from(block, header_title()))
            .collect();
    }

    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert(e.index.key()));
    entries
}

fn entry_from(container: ElementRef<'_>, title_selector: &Selector) -> Option<StatementEntry> {
    let title = container.select(title_selector).next().map(collapsed_text)?;
    let index = index_from_title(&title)?;
    Some(StatementEntry {
        index,
        markup: container.html(),
        title,
    })
}

/// 单独拉取的题目页
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: String,
    /// `#pageContent` 的 inner HTML；没有该区域时为整个响应
    pub content: String,
}

pub fn parse_page(html: &str) -> ParsedPage {
    let doc = Html::parse_document(html);
    let title = doc
        .select(document_title())
        .next()
        .map(collapsed_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let content = doc
        .select(page_content())
        .next()
        .map(|el| el.inner_html())
        .unwrap_or_else(|| html.to_string());
    ParsedPage { title, content }
}

/// 从片段中取出可替换的题面节点（outer HTML）
pub fn statement_fragment(markup: &str) -> Option<String> {
    let frag = Html::parse_fragment(markup);
    frag.select(holders())
        .next()
        .or_else(|| frag.select(statements()).next())
        .map(|el| el.html())
}

/// 片段中第一个题面的标题
pub fn statement_title(markup: &str) -> Option<String> {
    let frag = Html::parse_fragment(markup);
    frag.select(statement_titles()).next().map(collapsed_text)
}

/// 片段中第一个题面的可见文本长度（空白折叠后）
pub fn statement_text_len(markup: &str) -> usize {
    let frag = Html::parse_fragment(markup);
    frag.select(statements())
        .next()
        .map(|el| collapsed_text(el).chars().count())
        .unwrap_or(0)
}

/// 元素文本，连续空白折叠为一个空格并去掉首尾空白
pub fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|chunk| chunk.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

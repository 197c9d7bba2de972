use serde::{Deserialize, Serialize};

use super::problem::ProblemIndex;

/// 批量页面中某一道题的题面片段
///
/// 插入缓存后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementEntry {
    pub index: ProblemIndex,
    /// 完整的题面容器（outer HTML）
    pub markup: String,
    pub title: String,
}

/// 单独拉取的题目页主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub url: String,
    /// `#pageContent` 的 inner HTML
    pub markup: String,
    pub title: String,
}

/// 可导航的题目顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order(Vec<ProblemIndex>);

impl Order {
    /// 去重（先出现的保留）后构造
    pub fn from_indices(indices: impl IntoIterator<Item = ProblemIndex>) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self(indices.into_iter().filter(|idx| seen.insert(idx.key())).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, position: usize) -> Option<&ProblemIndex> {
        self.0.get(position)
    }

    /// 不区分大小写地查找位置
    pub fn position(&self, index: &ProblemIndex) -> Option<usize> {
        self.0.iter().position(|idx| idx.matches(index))
    }

    pub fn as_slice(&self) -> &[ProblemIndex] {
        &self.0
    }
}

/// 导航方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Next,
    Previous,
}

/// 当前页面的导航状态，每次页面加载创建一次
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    order: Order,
    current: usize,
    initialized: bool,
}

impl NavigationState {
    /// 用发现的顺序初始化；当前题号不在顺序里时返回 false，状态保持未初始化
    pub fn initialize(&mut self, order: Order, current: &ProblemIndex) -> bool {
        if self.initialized {
            return false;
        }
        match order.position(current) {
            Some(position) => {
                self.order = order;
                self.current = position;
                self.initialized = true;
                true
            }
            None => false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn current_position(&self) -> Option<usize> {
        self.initialized.then_some(self.current)
    }

    pub fn current_index(&self) -> Option<&ProblemIndex> {
        self.current_position().and_then(|p| self.order.get(p))
    }

    /// 移动到 `index` 所在的位置，不在顺序里则不变
    pub fn move_to(&mut self, index: &ProblemIndex) -> Option<usize> {
        if !self.initialized {
            return None;
        }
        let position = self.order.position(index)?;
        self.current = position;
        Some(position)
    }

    /// 某个方向上的邻居，边界处为 None
    pub fn neighbor(&self, direction: Direction) -> Option<&ProblemIndex> {
        let current = self.current_position()?;
        match direction {
            Direction::Next => self.order.get(current + 1),
            Direction::Previous => current.checked_sub(1).and_then(|p| self.order.get(p)),
        }
    }

    /// 前后两个邻居（先下一题，后上一题）
    pub fn neighbors(&self) -> Vec<ProblemIndex> {
        [Direction::Next, Direction::Previous]
            .into_iter()
            .filter_map(|d| self.neighbor(d).cloned())
            .collect()
    }
}

//! 预备节点
//!
//! 把缓存的题面放进屏幕外暂存区并预热（图片解码、公式排版），
//! 下一次切题时直接把节点移进正文。预热只是为了更快，不影响正确性。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use super::markup;
use super::statement_cache::StatementCache;
use crate::infrastructure::HostDocument;
use crate::models::ProblemIndex;

/// 已暂存的替换节点
#[derive(Debug, PartialEq, Eq)]
pub struct PreparedNode {
    pub index: ProblemIndex,
    /// 页面上 `data-cfx-node` 的值
    pub node_id: String,
}

type Slot = Arc<OnceCell<Arc<PreparedNode>>>;

/// 每个题号最多一个预备节点，被切题消费时移除
pub struct NodePreparer {
    host: Arc<dyn HostDocument>,
    statements: Arc<StatementCache>,
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
}

impl NodePreparer {
    pub fn new(host: Arc<dyn HostDocument>, statements: Arc<StatementCache>) -> Self {
        Self {
            host,
            statements,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成本页面内唯一的节点标记
    pub fn next_node_id(&self) -> String {
        format!("cfx-node-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// 取得（或构建）题号对应的预备节点
    ///
    /// 节点放进暂存区后立即返回，预热在后台进行。题面缓存里没有该题时返回 None。
    pub async fn prepare(&self, index: &ProblemIndex) -> Option<Arc<PreparedNode>> {
        let slot = self.slots.lock().entry(index.key()).or_default().clone();
        match slot.get_or_try_init(|| self.build(index)).await {
            Ok(node) => Some(node.clone()),
            Err(e) => {
                debug!("[题目 {}] 无法预备节点: {:#}", index, e);
                None
            }
        }
    }

    async fn build(&self, index: &ProblemIndex) -> Result<Arc<PreparedNode>> {
        let entry = self
            .statements
            .get(index)
            .ok_or_else(|| anyhow!("题面缓存中没有该题"))?;
        let fragment = markup::statement_fragment(&entry.markup).ok_or_else(|| anyhow!("题面片段中没有题面容器"))?;

        let node_id = self.next_node_id();
        if !self.host.stage_node(&node_id, &fragment).await? {
            return Err(anyhow!("暂存区拒绝了片段"));
        }

        let host = self.host.clone();
        let warm_id = node_id.clone();
        tokio::spawn(async move {
            if let Err(e) = host.warm_node(&warm_id).await {
                debug!("预热节点 {} 失败（忽略）: {:#}", warm_id, e);
            }
        });

        debug!("[题目 {}] ✓ 已预备节点 {}", index, node_id);
        Ok(Arc::new(PreparedNode {
            index: index.clone(),
            node_id,
        }))
    }

    /// 查看已经就绪的节点，不移除
    pub fn peek(&self, index: &ProblemIndex) -> Option<Arc<PreparedNode>> {
        self.slots.lock().get(&index.key()).and_then(|slot| slot.get().cloned())
    }

    pub fn is_prepared(&self, index: &ProblemIndex) -> bool {
        self.peek(index).is_some()
    }

    /// 节点已被移入正文：从暂存表中移除（只在仍是同一个节点时）
    pub fn consume(&self, node: &Arc<PreparedNode>) -> bool {
        let mut slots = self.slots.lock();
        let key = node.index.key();
        let same = slots
            .get(&key)
            .and_then(|slot| slot.get())
            .is_some_and(|staged| Arc::ptr_eq(staged, node));
        if same {
            slots.remove(&key);
        }
        same
    }

    /// 当前暂存的题号
    pub fn prepared_indices(&self) -> Vec<ProblemIndex> {
        self.slots
            .lock()
            .values()
            .filter_map(|slot| slot.get().map(|node| node.index.clone()))
            .collect()
    }
}

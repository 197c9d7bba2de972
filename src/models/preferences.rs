use serde::{Deserialize, Serialize};

/// 用户偏好
///
/// 只读取一次；未设置的键按启用处理。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// 是否启用无感切题
    #[serde(default = "enabled_by_default")]
    pub instant_nav: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self { instant_nav: true }
    }
}

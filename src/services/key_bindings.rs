//! 按键到导航方向的映射

use phf::phf_map;
use serde::Serialize;

use crate::infrastructure::KeyPress;
use crate::models::Direction;

/// 直接按下即生效的键
static PLAIN_KEYS: phf::Map<&'static str, Direction> = phf_map! {
    "ArrowRight" => Direction::Next,
    "ArrowLeft" => Direction::Previous,
};

/// 需要配合 Ctrl 的键
static CHORD_KEYS: phf::Map<&'static str, Direction> = phf_map! {
    "l" => Direction::Next,
    "h" => Direction::Previous,
};

/// 下发给页面的绑定描述，页面据此决定要不要拦截默认行为
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageBinding {
    pub key: &'static str,
    pub ctrl: bool,
    pub direction: Direction,
}

/// 把一次按键翻译成导航方向
///
/// 焦点在输入区域或默认行为已被其他脚本阻止时不处理。
pub fn gesture_for(key: &KeyPress) -> Option<Direction> {
    if key.editable_target || key.default_prevented {
        return None;
    }
    if let Some(direction) = PLAIN_KEYS.get(key.key.as_str()) {
        return Some(*direction);
    }
    if key.ctrl {
        return CHORD_KEYS.get(key.key.as_str()).copied();
    }
    None
}

pub fn page_bindings() -> Vec<PageBinding> {
    let plain = PLAIN_KEYS.entries().map(|(key, direction)| PageBinding {
        key: *key,
        ctrl: false,
        direction: *direction,
    });
    let chords = CHORD_KEYS.entries().map(|(key, direction)| PageBinding {
        key: *key,
        ctrl: true,
        direction: *direction,
    });
    plain.chain(chords).collect()
}

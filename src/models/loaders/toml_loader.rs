use crate::models::preferences::Preferences;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件读取偏好设置
///
/// 文件不存在时返回默认值；内容无法解析时返回错误。
pub async fn load_preferences_file(path: &Path) -> Result<Preferences> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        tracing::debug!("偏好文件不存在，使用默认值: {}", path.display());
        return Ok(Preferences::default());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取偏好文件: {}", path.display()))?;

    let prefs: Preferences = toml::from_str(&content)
        .with_context(|| format!("无法解析偏好文件: {}", path.display()))?;

    Ok(prefs)
}

/// 读取偏好设置，任何失败都回退到默认（启用）
pub async fn load_preferences(path: &Path) -> Preferences {
    match load_preferences_file(path).await {
        Ok(prefs) => prefs,
        Err(e) => {
            tracing::warn!("读取偏好失败，按默认启用处理: {:#}", e);
            Preferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cf_instant_nav_{}_{}.toml", name, std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_enabled() {
        let path = std::env::temp_dir().join("cf_instant_nav_definitely_missing.toml");
        let prefs = tokio_test::block_on(load_preferences(&path));
        assert!(prefs.instant_nav);
    }

    #[test]
    fn test_explicit_disable() {
        let path = temp_file("disabled", "instant_nav = false\n");
        let prefs = tokio_test::block_on(load_preferences(&path));
        assert!(!prefs.instant_nav);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_key_is_enabled() {
        let path = temp_file("empty", "# nothing here\n");
        let prefs = tokio_test::block_on(load_preferences(&path));
        assert!(prefs.instant_nav);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let path = temp_file("garbage", "instant_nav = maybe\n");
        assert!(tokio_test::block_on(load_preferences_file(&path)).is_err());
        assert!(tokio_test::block_on(load_preferences(&path)).instant_nav);
        let _ = std::fs::remove_file(path);
    }
}

// ==========================================
// 出库扫码匹配系统 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新(带校验)、快照
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::scan_settings::ScanSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 配置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: Option<String>, // None 表示使用默认值
}

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询所有已知配置键(未设置的值为 None)
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        let stored = self.config_manager.list_global()?;
        Ok(config_keys::ALL
            .iter()
            .map(|key| ConfigItem {
                key: key.to_string(),
                value: stored.get(*key).cloned(),
            })
            .collect())
    }

    /// 查询单个配置
    pub fn get_config(&self, key: &str) -> ApiResult<ConfigItem> {
        if !config_keys::ALL.contains(&key) {
            return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
        }
        Ok(ConfigItem {
            key: key.to_string(),
            value: self.config_manager.get_global_config_value(key)?,
        })
    }

    /// 更新配置
    ///
    /// # 错误
    /// - `InvalidInput`: 未知键或值格式错误
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        let key = key.trim();
        let value = value.trim();
        ScanSettings::validate(key, value).map_err(ApiError::InvalidInput)?;
        self.config_manager.set_global_config_value(key, value)?;
        Ok(())
    }

    /// 删除配置(恢复默认)
    pub fn reset_config(&self, key: &str) -> ApiResult<bool> {
        Ok(self.config_manager.remove_global_config_value(key)?)
    }

    /// 当前生效的扫码参数
    pub fn effective_settings(&self) -> ApiResult<ScanSettings> {
        Ok(ScanSettings::load(&self.config_manager)?)
    }

    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        Ok(self.config_manager.get_config_snapshot()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn api() -> ConfigApi {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let manager = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
        ConfigApi::new(Arc::new(manager))
    }

    #[test]
    fn test_update_validates_value() {
        let api = api();
        assert!(matches!(
            api.update_config(config_keys::SCAN_DEBOUNCE_MS, "fast"),
            Err(ApiError::InvalidInput(_))
        ));
        api.update_config(config_keys::SCAN_DEBOUNCE_MS, " 250 ").unwrap();

        let item = api.get_config(config_keys::SCAN_DEBOUNCE_MS).unwrap();
        assert_eq!(item.value.as_deref(), Some("250"));
        assert_eq!(
            api.effective_settings().unwrap().debounce,
            std::time::Duration::from_millis(250)
        );
    }

    #[test]
    fn test_list_includes_unset_keys() {
        let api = api();
        let items = api.list_configs().unwrap();
        assert_eq!(items.len(), config_keys::ALL.len());
        assert!(items.iter().all(|i| i.value.is_none()));
        assert!(api.get_config("nope").is_err());
    }
}

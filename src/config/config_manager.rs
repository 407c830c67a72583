// ==========================================
// 出库扫码匹配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取配置值，带默认值
    pub fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 的配置值(UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;

        tracing::info!("配置已更新: key={}, value={}", key, value);
        Ok(())
    }

    /// 删除 global scope 的配置值(恢复默认)
    pub fn remove_global_config_value(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
        )?;
        Ok(affected > 0)
    }

    /// 全部 global 配置(按 key 排序)
    pub fn list_global(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let config_map = self.list_global()?;
        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 完成通知
    pub const NOTIFIER_TIMEOUT_MS: &str = "notifier.timeout_ms";

    // 扫码输入
    pub const SCAN_DEBOUNCE_MS: &str = "scan.debounce_ms";
    pub const SCAN_IGNORE_TRACKING_LABELS: &str = "scan.ignore_tracking_labels";

    // 匹配优先级
    pub const MATCH_STRATEGY: &str = "match.strategy";
    pub const MATCH_SKU_PREFERENCE: &str = "match.sku_preference";
    pub const MATCH_PINNED: &str = "match.pinned"; // JSON 数组

    // 面单
    pub const LABEL_DIR: &str = "label.dir";
    pub const LABEL_PRINT_COMMAND: &str = "label.print_command"; // JSON 数组 argv

    pub const ALL: [&str; 8] = [
        NOTIFIER_TIMEOUT_MS,
        SCAN_DEBOUNCE_MS,
        SCAN_IGNORE_TRACKING_LABELS,
        MATCH_STRATEGY,
        MATCH_SKU_PREFERENCE,
        MATCH_PINNED,
        LABEL_DIR,
        LABEL_PRINT_COMMAND,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_set_get_and_overwrite() {
        let config = manager();
        assert_eq!(
            config.get_global_config_value(config_keys::SCAN_DEBOUNCE_MS).unwrap(),
            None
        );

        config
            .set_global_config_value(config_keys::SCAN_DEBOUNCE_MS, "300")
            .unwrap();
        config
            .set_global_config_value(config_keys::SCAN_DEBOUNCE_MS, "200")
            .unwrap();
        assert_eq!(
            config
                .get_config_or_default(config_keys::SCAN_DEBOUNCE_MS, "500")
                .unwrap(),
            "200"
        );
    }

    #[test]
    fn test_snapshot_and_remove() {
        let config = manager();
        config
            .set_global_config_value(config_keys::MATCH_STRATEGY, "LARGE_FIRST")
            .unwrap();

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("match.strategy").map(String::as_str), Some("LARGE_FIRST"));

        assert!(config.remove_global_config_value(config_keys::MATCH_STRATEGY).unwrap());
        assert!(config.list_global().unwrap().is_empty());
    }
}

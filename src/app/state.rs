// ==========================================
// 出库扫码匹配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享资源和API实例
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ApiError, ApiResult, ConfigApi, ScanApi};
use crate::config::config_manager::ConfigManager;
use crate::config::scan_settings::ScanSettings;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::notifier::{CompletionNotifier, LabelPrintNotifier};
use crate::repository::line_store::ShipmentLineStore;

/// 应用状态
///
/// 持有共享数据库连接; 扫码会话按需创建
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径(":memory:" 用于测试)
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("无法打开数据库: {}", e)))?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone())?);
        let config_api = Arc::new(ConfigApi::new(config_manager));

        Ok(Self {
            db_path,
            conn,
            config_api,
        })
    }

    /// 当前生效的扫码参数
    pub fn settings(&self) -> ApiResult<ScanSettings> {
        self.config_api.effective_settings()
    }

    /// 按配置构建面单打印通知者
    pub fn build_notifier(settings: &ScanSettings) -> Arc<dyn CompletionNotifier> {
        Arc::new(LabelPrintNotifier::new(
            settings.label_dir.clone(),
            settings.print_command.clone(),
        ))
    }

    /// 从数据集文件开始新的扫码会话(覆盖上次进度)
    pub fn start_session(
        &self,
        dataset: &Path,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> ApiResult<ScanApi> {
        let settings = self.settings()?;
        ScanApi::from_dataset(dataset, self.conn.clone(), notifier, &settings)
    }

    /// 从数据库恢复上次的扫码会话
    pub fn resume_session(&self, notifier: Arc<dyn CompletionNotifier>) -> ApiResult<ScanApi> {
        let settings = self.settings()?;
        ScanApi::resume(self.conn.clone(), notifier, &settings)
    }

    /// 数据库中是否存在可恢复的进度
    pub fn has_saved_session(&self) -> ApiResult<bool> {
        Ok(ShipmentLineStore::new(self.conn.clone()).count()? > 0)
    }
}

/// 默认数据库路径
///
/// 优先使用环境变量 SHIPMENT_SCAN_DB_PATH,否则位于用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SHIPMENT_SCAN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./shipment_scan.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("shipment-scan-matcher");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("shipment_scan.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::notifier::NoOpNotifier;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_resume_without_saved_session() {
        let state = AppState::new(":memory:".to_string()).unwrap();
        assert!(!state.has_saved_session().unwrap());
        assert!(matches!(
            state.resume_session(Arc::new(NoOpNotifier)),
            Err(ApiError::DatasetNotLoaded)
        ));
    }
}

// ==========================================
// 出库扫码匹配系统 - 应用层
// ==========================================
// 职责: 组装数据库、配置与扫码会话
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};

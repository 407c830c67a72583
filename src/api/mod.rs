// ==========================================
// 出库扫码匹配系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行入口调用
// ==========================================

pub mod config_api;
pub mod error;
pub mod scan_api;

// 重导出核心类型
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use scan_api::{ScanApi, ScanDisposition};

// ==========================================
// 出库扫码匹配系统 - 数据仓储层
// ==========================================
// 职责: 发货单内存仓储 + SQLite 状态回写/扫码日志
// 红线: Repository 不含匹配/状态机逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod line_store;
pub mod order_repo;
pub mod scan_log_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use line_store::ShipmentLineStore;
pub use order_repo::{OrderRepository, RepositoryStats};
pub use scan_log_repo::ScanLogRepository;

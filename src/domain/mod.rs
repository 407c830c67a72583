// ==========================================
// 出库扫码匹配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod scan_log;
pub mod shipment;
pub mod types;

// 重导出核心类型
pub use scan_log::ScanLogEntry;
pub use shipment::{
    LineChange, LineItem, OrderRow, PendingSummaryRow, Shipment, ShipmentProgress,
};
pub use types::{PriorityStrategy, ScanResultKind, ShipmentState, SkuPreference};

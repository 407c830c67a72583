// ==========================================
// 出库扫码匹配系统 - 引擎层
// ==========================================
// 职责: 候选匹配 + 发货状态机 + 完成通知边界
// 红线: Engine 不拼 SQL,不读写文件
// ==========================================

pub mod error;
pub mod fulfillment;
pub mod matcher;
pub mod notifier;
pub mod scan_filter;

// 重导出核心引擎
pub use error::{ScanError, ScanResult};
pub use fulfillment::{FulfillmentEngine, ScanOutcome, ScanReport, DEFAULT_NOTIFY_TIMEOUT};
pub use matcher::{compare_tracking_no, MatchEngine, MatchPolicy};
pub use notifier::{
    notify_with_timeout, CompletionNotifier, LabelPrintNotifier, NoOpNotifier, NotifyError,
};
pub use scan_filter::{sanitize_barcode, IgnoreReason, ScanFilter};

// ==========================================
// 出库扫码匹配系统 - 核心库
// ==========================================
// 商品条码 → 发货单逆向匹配
// 技术栈: Rust + SQLite + tokio
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 发货单仓储与状态存储
pub mod repository;

// 引擎层 - 匹配与发货状态机
pub mod engine;

// 导入层 - 数据集文件
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 资源组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{PriorityStrategy, ScanResultKind, ShipmentState, SkuPreference};

// 领域实体
pub use domain::{LineChange, LineItem, OrderRow, ScanLogEntry, Shipment, ShipmentProgress};

// 仓储
pub use repository::{OrderRepository, RepositoryError};

// 引擎
pub use engine::{
    CompletionNotifier, FulfillmentEngine, MatchEngine, MatchPolicy, NotifyError, ScanError,
    ScanOutcome, ScanReport,
};

// API
pub use api::{ApiError, ScanApi, ScanDisposition};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "出库扫码匹配系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

// ==========================================
// 出库扫码匹配系统 - 扫码引擎错误类型
// ==========================================
// UnknownBarcode / NoPendingShipment: 操作员可见
// OverScan / LineItemNotFound: 内部一致性错误,扫码被拒绝且不修改状态
// Notifier: 外部通知失败,发货单停留在 Completed,可重试
// ==========================================

use crate::domain::types::ScanResultKind;
use crate::engine::notifier::NotifyError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("条码为空")]
    EmptyBarcode,

    #[error("条码不存在: {0}")]
    UnknownBarcode(String),

    #[error("没有待处理的发货单: barcode={0}")]
    NoPendingShipment(String),

    #[error("扫描数量超出: tracking_no={tracking_no}, barcode={barcode}")]
    OverScan { tracking_no: String, barcode: String },

    #[error("发货单无此条码: tracking_no={tracking_no}, barcode={barcode}")]
    LineItemNotFound { tracking_no: String, barcode: String },

    #[error("发货单不存在: tracking_no={0}")]
    ShipmentNotFound(String),

    #[error("发货单已使用: tracking_no={0}")]
    AlreadyUsed(String),

    #[error("发货单未扫满: tracking_no={tracking_no}, remaining={remaining}")]
    NotComplete { tracking_no: String, remaining: u32 },

    #[error("完成通知失败: tracking_no={tracking_no}: {source}")]
    Notifier {
        tracking_no: String,
        #[source]
        source: NotifyError,
    },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ScanError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UnknownBarcode(barcode) => ScanError::UnknownBarcode(barcode),
            RepositoryError::ShipmentNotFound(tracking_no) => ScanError::ShipmentNotFound(tracking_no),
            RepositoryError::LineItemNotFound {
                tracking_no,
                barcode,
            } => ScanError::LineItemNotFound {
                tracking_no,
                barcode,
            },
            RepositoryError::OverScan {
                tracking_no,
                barcode,
                ..
            } => ScanError::OverScan {
                tracking_no,
                barcode,
            },
            RepositoryError::AlreadyUsed(tracking_no) => ScanError::AlreadyUsed(tracking_no),
            RepositoryError::NotComplete {
                tracking_no,
                remaining,
            } => ScanError::NotComplete {
                tracking_no,
                remaining,
            },
            other => ScanError::Repository(other),
        }
    }
}

impl ScanError {
    /// 内部一致性错误(匹配引擎与仓储不同步)
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ScanError::OverScan { .. }
                | ScanError::LineItemNotFound { .. }
                | ScanError::Repository(_)
        )
    }

    /// 扫码日志分类
    pub fn result_kind(&self) -> ScanResultKind {
        match self {
            ScanError::EmptyBarcode | ScanError::UnknownBarcode(_) => ScanResultKind::NotFound,
            ScanError::NoPendingShipment(_) | ScanError::AlreadyUsed(_) => {
                ScanResultKind::AlreadyUsed
            }
            _ => ScanResultKind::Error,
        }
    }
}

/// Result 类型别名
pub type ScanResult<T> = Result<T, ScanError>;

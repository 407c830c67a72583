// ==========================================
// 出库扫码匹配系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 发货单数据错误 =====
    #[error("条码不存在: {0}")]
    UnknownBarcode(String),

    #[error("发货单不存在: tracking_no={0}")]
    ShipmentNotFound(String),

    #[error("发货单无此条码: tracking_no={tracking_no}, barcode={barcode}")]
    LineItemNotFound { tracking_no: String, barcode: String },

    #[error("扫描数量超出: tracking_no={tracking_no}, barcode={barcode}, required_qty={required_qty}")]
    OverScan {
        tracking_no: String,
        barcode: String,
        required_qty: u32,
    },

    #[error("发货单已使用: tracking_no={0}")]
    AlreadyUsed(String),

    #[error("发货单未扫满: tracking_no={tracking_no}, remaining={remaining}")]
    NotComplete { tracking_no: String, remaining: u32 },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ===== 数据库错误 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

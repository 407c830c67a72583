// ==========================================
// 出库扫码匹配系统 - API层错误类型
// ==========================================
// 职责: 汇总各层错误,转换为操作员可读的错误消息
// ==========================================

use crate::engine::error::ScanError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 扫码错误(操作员可见)
    // ==========================================
    #[error(transparent)]
    Scan(ScanError),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据集未加载")]
    DatasetNotLoaded,

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 发货单状态错误归入扫码错误
            RepositoryError::UnknownBarcode(_)
            | RepositoryError::ShipmentNotFound(_)
            | RepositoryError::LineItemNotFound { .. }
            | RepositoryError::OverScan { .. }
            | RepositoryError::AlreadyUsed(_)
            | RepositoryError::NotComplete { .. } => ApiError::Scan(ScanError::from(err)),

            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ScanError 转换
// ==========================================
impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Repository(inner) => ApiError::from(inner),
            other => ApiError::Scan(other),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(inner) => ApiError::from(inner),
            ImportError::MissingColumns { .. }
            | ImportError::TypeConversionError { .. }
            | ImportError::EmptyField { .. }
            | ImportError::EmptyDataset(_) => ApiError::ValidationError(err.to_string()),
            ImportError::Other(inner) => ApiError::Other(inner),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

impl ApiError {
    /// 扫码错误(非系统故障)
    pub fn as_scan_error(&self) -> Option<&ScanError> {
        match self {
            ApiError::Scan(err) => Some(err),
            _ => None,
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_state_errors_become_scan_errors() {
        let err = ApiError::from(RepositoryError::AlreadyUsed("T1".to_string()));
        assert!(matches!(
            err.as_scan_error(),
            Some(ScanError::AlreadyUsed(t)) if t == "T1"
        ));

        let err = ApiError::from(RepositoryError::LockError("poisoned".to_string()));
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
    }

    #[test]
    fn test_import_validation_errors() {
        let err = ApiError::from(ImportError::EmptyDataset("a.csv".to_string()));
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = ApiError::from(ImportError::Repository(RepositoryError::ValidationError(
            "dup".to_string(),
        )));
        assert!(matches!(err, ApiError::ValidationError(msg) if msg == "dup"));
    }
}

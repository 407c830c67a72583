// ==========================================
// 出库扫码匹配系统 - 完成通知边界
// ==========================================
// 职责: 定义发货单完成通知 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外部协作方(自动录入/面单打印)实现
// ==========================================
// 约束:
// - 调用必须可安全重试(仓储计数在通知前已落定)
// - 成功/失败必须明确区分
// - 调用方以超时包裹,超时即失败
// ==========================================

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 通知失败原因
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotifyError {
    #[error("外部协作方拒绝: {0}")]
    Rejected(String),

    #[error("通知超时: {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("面单 PDF 不存在: {0}")]
    LabelMissing(String),

    #[error("外部命令执行失败: {0}")]
    Io(String),
}

// ==========================================
// 完成通知 Trait
// ==========================================

/// 发货单完成通知者
///
/// # 参数
/// - `tracking_no`: 完成的发货单号
/// - `barcodes`: 该发货单的条码(按明细行顺序)
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify_completion(
        &self,
        tracking_no: &str,
        barcodes: &[String],
    ) -> Result<(), NotifyError>;
}

/// 带超时的通知调用
pub async fn notify_with_timeout(
    notifier: &dyn CompletionNotifier,
    timeout: Duration,
    tracking_no: &str,
    barcodes: &[String],
) -> Result<(), NotifyError> {
    match tokio::time::timeout(timeout, notifier.notify_completion(tracking_no, barcodes)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// 空操作通知者
///
/// 用于无外部协作方的场景（如单元测试、纯计数模式）
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl CompletionNotifier for NoOpNotifier {
    async fn notify_completion(
        &self,
        tracking_no: &str,
        barcodes: &[String],
    ) -> Result<(), NotifyError> {
        tracing::debug!(
            "NoOpNotifier: 跳过完成通知 - tracking_no={}, barcodes={:?}",
            tracking_no,
            barcodes
        );
        Ok(())
    }
}

// ==========================================
// LabelPrintNotifier - 面单打印通知者
// ==========================================
// 约定: 面单文件名为 {tracking_no}.pdf
// 未配置打印命令时只校验文件存在
#[derive(Debug, Clone)]
pub struct LabelPrintNotifier {
    label_dir: PathBuf,
    print_command: Vec<String>,
}

impl LabelPrintNotifier {
    /// # 参数
    /// - `label_dir`: 面单 PDF 目录
    /// - `print_command`: 打印命令 argv,PDF 路径追加为最后一个参数
    pub fn new(label_dir: impl Into<PathBuf>, print_command: Vec<String>) -> Self {
        Self {
            label_dir: label_dir.into(),
            print_command,
        }
    }

    pub fn label_dir(&self) -> &Path {
        &self.label_dir
    }

    /// 面单路径
    pub fn label_path(&self, tracking_no: &str) -> PathBuf {
        self.label_dir.join(format!("{}.pdf", tracking_no))
    }
}

#[async_trait]
impl CompletionNotifier for LabelPrintNotifier {
    async fn notify_completion(
        &self,
        tracking_no: &str,
        _barcodes: &[String],
    ) -> Result<(), NotifyError> {
        if tracking_no.is_empty()
            || tracking_no.contains(['/', '\\'])
            || tracking_no.contains("..")
        {
            return Err(NotifyError::Rejected(format!(
                "非法的 tracking_no: {}",
                tracking_no
            )));
        }

        let path = self.label_path(tracking_no);
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(NotifyError::LabelMissing(path.display().to_string()));
        }

        let Some((program, args)) = self.print_command.split_first() else {
            tracing::info!("面单已定位(未配置打印命令): {}", path.display());
            return Ok(());
        };

        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(&path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| NotifyError::Io(e.to_string()))?;

        if !status.success() {
            return Err(NotifyError::Rejected(format!(
                "打印命令退出码: {:?}",
                status.code()
            )));
        }

        tracing::info!("面单已发送打印: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowNotifier;

    #[async_trait]
    impl CompletionNotifier for SlowNotifier {
        async fn notify_completion(&self, _: &str, _: &[String]) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timeout_reports_failure() {
        let result =
            notify_with_timeout(&SlowNotifier, Duration::from_millis(20), "T1", &[]).await;
        assert_eq!(result, Err(NotifyError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn test_label_missing() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = LabelPrintNotifier::new(dir.path(), Vec::new());
        let result = notifier.notify_completion("T1", &[]).await;
        assert!(matches!(result, Err(NotifyError::LabelMissing(_))));
    }

    #[tokio::test]
    async fn test_label_found_without_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("T1.pdf"), b"%PDF-1.4").unwrap();
        let notifier = LabelPrintNotifier::new(dir.path(), Vec::new());
        assert_eq!(notifier.notify_completion("T1", &[]).await, Ok(()));
    }

    #[tokio::test]
    async fn test_label_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = LabelPrintNotifier::new(dir.path(), Vec::new());
        assert!(matches!(
            notifier.notify_completion("../T1", &[]).await,
            Err(NotifyError::Rejected(_))
        ));
    }
}

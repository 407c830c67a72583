// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、数据集文件、可控的完成通知者
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use shipment_scan_matcher::config::ScanSettings;
use shipment_scan_matcher::engine::{CompletionNotifier, NotifyError};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// 创建临时测试数据库路径
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 标准表头
pub const STANDARD_HEADER: &str = "tracking_no,barcode,product_name,option_name,qty";

/// 示例数据集: T1 单品, T2 两条明细
pub const SAMPLE_ROWS: &[&str] = &[
    "T1,A,Apple,Red,1",
    "T2,A,Apple,Red,1",
    "T2,B,Banana,,2",
];

/// 在临时目录写入 CSV 数据集
pub fn write_dataset(dir: &TempDir, file_name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(file_name);
    let mut content = String::from(header);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).expect("写入数据集失败");
    path
}

/// 写入示例数据集
pub fn write_sample_dataset(dir: &TempDir) -> PathBuf {
    write_dataset(dir, "orders.csv", STANDARD_HEADER, SAMPLE_ROWS)
}

/// 测试用扫码参数: 关闭防抖,其余为默认值
pub fn test_settings(label_dir: &Path) -> ScanSettings {
    ScanSettings {
        debounce: Duration::ZERO,
        notify_timeout: Duration::from_millis(500),
        label_dir: label_dir.to_path_buf(),
        ..ScanSettings::default()
    }
}

// ==========================================
// RecordingNotifier - 记录通知并可注入失败
// ==========================================

#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failures_left: AtomicUsize,
}

impl RecordingNotifier {
    /// 前 `n` 次调用返回失败
    pub fn failing(n: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(n),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notified_tracking_nos(&self) -> Vec<String> {
        self.calls().into_iter().map(|(t, _)| t).collect()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify_completion(
        &self,
        tracking_no: &str,
        barcodes: &[String],
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((tracking_no.to_string(), barcodes.to_vec()));

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(NotifyError::Rejected("打印机离线".to_string()));
        }
        Ok(())
    }
}

// ==========================================
// 出库扫码匹配系统 - 扫码日志领域模型
// ==========================================
// 红线: 每次扫码(成功/拒绝/忽略)都必须记录
// 对齐: scan_log 表
// ==========================================

use crate::domain::types::ScanResultKind;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub log_id: String,              // UUID
    pub scanned_at: NaiveDateTime,   // 本地时间
    pub barcode: String,             // 清洗后的输入
    pub tracking_no: Option<String>, // 命中的发货单(未命中为 None)
    pub result: ScanResultKind,
    pub message: String,
}

impl ScanLogEntry {
    /// 以当前时间创建日志
    pub fn now(
        barcode: impl Into<String>,
        tracking_no: Option<String>,
        result: ScanResultKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            log_id: uuid::Uuid::new_v4().to_string(),
            scanned_at: Local::now().naive_local(),
            barcode: barcode.into(),
            tracking_no,
            result,
            message: message.into(),
        }
    }
}

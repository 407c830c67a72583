// ==========================================
// 出库扫码匹配系统 - 扫码输入过滤
// ==========================================
// 职责: 在进入匹配引擎之前剔除无效输入
// 1) 同一条码在防抖窗口内重复出现(扫码枪双击)
// 2) 面单号扫码(不是商品条码)
//    已加载的面单号 → TrackingLabel
//    未知的 12~13 位数字 → LabelLike (也可能是漏录的商品条码,按 warn 记录)
// ==========================================
// 被过滤的输入不是错误,不修改任何状态
// ==========================================

use crate::repository::order_repo::OrderRepository;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// 忽略原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IgnoreReason {
    DoubleScan,    // 防抖窗口内重复
    TrackingLabel, // 已加载的面单号
    LabelLike,     // 形如面单号的未知输入
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::DoubleScan => write!(f, "重复扫码已忽略"),
            IgnoreReason::TrackingLabel => write!(f, "面单号扫码已忽略"),
            IgnoreReason::LabelLike => write!(f, "未知条码或面单号,已忽略"),
        }
    }
}

/// 清洗扫码枪输入(去除首尾空白与回车换行)
pub fn sanitize_barcode(raw: &str) -> String {
    raw.trim().replace(['\r', '\n'], "")
}

/// 是否形如面单号(12~13 位纯数字)
fn looks_like_tracking_no(value: &str) -> bool {
    (value.len() == 12 || value.len() == 13) && value.bytes().all(|c| c.is_ascii_digit())
}

#[derive(Debug)]
pub struct ScanFilter {
    debounce: Duration,
    ignore_tracking_labels: bool,
    last_accepted: Option<(String, Instant)>,
}

impl ScanFilter {
    /// # 参数
    /// - `debounce`: 防抖窗口,零表示关闭
    /// - `ignore_tracking_labels`: 是否忽略面单号扫码
    pub fn new(debounce: Duration, ignore_tracking_labels: bool) -> Self {
        Self {
            debounce,
            ignore_tracking_labels,
            last_accepted: None,
        }
    }

    /// 检查输入是否应被忽略
    ///
    /// 返回 None 表示放行,放行的条码记为最近一次扫码
    pub fn check(
        &mut self,
        barcode: &str,
        repo: &OrderRepository,
        now: Instant,
    ) -> Option<IgnoreReason> {
        if !self.debounce.is_zero() {
            if let Some((last, at)) = &self.last_accepted {
                if last == barcode && now.saturating_duration_since(*at) < self.debounce {
                    return Some(IgnoreReason::DoubleScan);
                }
            }
        }

        if self.ignore_tracking_labels && !repo.is_known_barcode(barcode) {
            if repo.contains_tracking_no(barcode) {
                return Some(IgnoreReason::TrackingLabel);
            }
            if looks_like_tracking_no(barcode) {
                tracing::warn!(
                    "unknown or tracking label: barcode={} 不在数据集中,按面单号忽略",
                    barcode
                );
                return Some(IgnoreReason::LabelLike);
            }
        }

        self.last_accepted = Some((barcode.to_string(), now));
        None
    }
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shipment::{LineItem, Shipment};

    fn repo() -> OrderRepository {
        OrderRepository::from_shipments(vec![
            Shipment::new("T-001", vec![LineItem::new("8801234567890", "", "", 2)]),
            Shipment::new("123456789012", vec![LineItem::new("A", "", "", 1)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_barcode("  A12\r\n"), "A12");
    }

    #[test]
    fn test_double_scan_within_window() {
        let repo = repo();
        let mut filter = ScanFilter::new(Duration::from_millis(500), true);
        let t0 = Instant::now();

        assert_eq!(filter.check("A", &repo, t0), None);
        assert_eq!(
            filter.check("A", &repo, t0 + Duration::from_millis(100)),
            Some(IgnoreReason::DoubleScan)
        );
        assert_eq!(filter.check("A", &repo, t0 + Duration::from_millis(600)), None);
    }

    #[test]
    fn test_zero_debounce_disables_guard() {
        let repo = repo();
        let mut filter = ScanFilter::new(Duration::ZERO, true);
        let t0 = Instant::now();
        assert_eq!(filter.check("A", &repo, t0), None);
        assert_eq!(filter.check("A", &repo, t0), None);
    }

    #[test]
    fn test_tracking_label_ignored() {
        let repo = repo();
        let mut filter = ScanFilter::new(Duration::ZERO, true);
        let now = Instant::now();

        // 已加载的面单号
        assert_eq!(
            filter.check("T-001", &repo, now),
            Some(IgnoreReason::TrackingLabel)
        );
        // 13 位数字但是已知商品条码 → 放行
        assert_eq!(filter.check("8801234567890", &repo, now), None);
        // 未知的 12 位数字: 与已加载面单号区分
        assert_eq!(
            filter.check("999999999999", &repo, now),
            Some(IgnoreReason::LabelLike)
        );
        assert_eq!(
            filter.check("123456789012", &repo, now),
            Some(IgnoreReason::TrackingLabel)
        );
        // 其它长度的未知输入交给匹配引擎报 UnknownBarcode
        assert_eq!(filter.check("99999", &repo, now), None);
    }

    #[test]
    fn test_tracking_label_filter_can_be_disabled() {
        let repo = repo();
        let mut filter = ScanFilter::new(Duration::ZERO, false);
        assert_eq!(filter.check("T-001", &repo, Instant::now()), None);
    }
}

// ==========================================
// 出库扫码匹配系统 - 候选匹配引擎
// ==========================================
// 职责: 扫码条码 → 选出唯一的目标发货单
// 输入: 条码 + 发货单仓储(只读)
// 输出: 按优先级排序的候选发货单
// ==========================================
// 候选条件: 未使用 且 该条码行 scanned_qty < required_qty
// 排序键:
// 1) 固定(pinned)发货单优先
// 2) SKU 种类偏好 (SingleFirst / ComboFirst, 默认不参与)
// 3) total_qty (SmallFirst 升序 / LargeFirst 降序)
// 4) tracking_no 升序
// ==========================================

use crate::domain::shipment::Shipment;
use crate::domain::types::{PriorityStrategy, SkuPreference};
use crate::engine::error::{ScanError, ScanResult};
use crate::repository::order_repo::OrderRepository;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// 匹配策略
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub strategy: PriorityStrategy,
    #[serde(default)]
    pub sku_preference: SkuPreference,
    pub pinned: BTreeSet<String>,
}

// ==========================================
// MatchEngine - 候选匹配引擎
// ==========================================
// 只读,可安全重试
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    policy: MatchPolicy,
}

impl MatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: MatchPolicy) {
        self.policy = policy;
    }

    /// 选出扫码对应的发货单
    ///
    /// # 错误
    /// - `UnknownBarcode`: 数据集中没有任何行包含该条码
    /// - `NoPendingShipment`: 所有含该条码的发货单均已使用或该行已扫满
    pub fn select_candidate<'a>(
        &self,
        repo: &'a OrderRepository,
        barcode: &str,
    ) -> ScanResult<&'a Shipment> {
        let ranked = self.rank_candidates(repo, barcode)?;
        ranked
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::NoPendingShipment(barcode.to_string()))
    }

    /// 全部候选(已排序),用于诊断/界面展示
    pub fn rank_candidates<'a>(
        &self,
        repo: &'a OrderRepository,
        barcode: &str,
    ) -> ScanResult<Vec<&'a Shipment>> {
        let owners = repo.find_shipments_by_barcode(barcode)?;

        let mut candidates: Vec<&Shipment> = owners
            .into_iter()
            .filter(|s| is_eligible(s, barcode))
            .collect();

        if candidates.is_empty() {
            return Err(ScanError::NoPendingShipment(barcode.to_string()));
        }

        candidates.sort_by(|a, b| self.compare(a, b));

        tracing::debug!(
            barcode,
            strategy = %self.policy.strategy,
            sku_preference = %self.policy.sku_preference,
            candidates = ?candidates.iter().map(|s| s.tracking_no()).collect::<Vec<_>>(),
            "候选排序完成"
        );

        Ok(candidates)
    }

    /// Ordering::Less 表示 a 优先于 b
    fn compare(&self, a: &Shipment, b: &Shipment) -> Ordering {
        // 1. 固定发货单优先
        let pinned_a = self.policy.pinned.contains(a.tracking_no());
        let pinned_b = self.policy.pinned.contains(b.tracking_no());
        match pinned_b.cmp(&pinned_a) {
            Ordering::Equal => {}
            other => return other,
        }

        // 2. SKU 种类
        let is_single = |s: &Shipment| s.sku_count() == 1;
        let by_sku = match self.policy.sku_preference {
            SkuPreference::None => Ordering::Equal,
            SkuPreference::SingleFirst => is_single(b).cmp(&is_single(a)),
            SkuPreference::ComboFirst => is_single(a).cmp(&is_single(b)),
        };
        if by_sku != Ordering::Equal {
            return by_sku;
        }

        // 3. 总数量
        let by_qty = match self.policy.strategy {
            PriorityStrategy::SmallFirst => a.total_qty().cmp(&b.total_qty()),
            PriorityStrategy::LargeFirst => b.total_qty().cmp(&a.total_qty()),
        };
        if by_qty != Ordering::Equal {
            return by_qty;
        }

        // 4. tracking_no 升序
        compare_tracking_no(a.tracking_no(), b.tracking_no())
    }
}

/// 候选条件: 未使用且该条码行未扫满
fn is_eligible(shipment: &Shipment, barcode: &str) -> bool {
    !shipment.is_used()
        && shipment
            .line(barcode)
            .map(|line| !line.is_full())
            .unwrap_or(false)
}

/// tracking_no 比较
///
/// 两者均为纯数字时按数值比较(忽略前导零),否则按字典序
pub fn compare_tracking_no(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());

    if numeric(a) && numeric(b) {
        let ta = a.trim_start_matches('0');
        let tb = b.trim_start_matches('0');
        return ta
            .len()
            .cmp(&tb.len())
            .then_with(|| ta.cmp(tb))
            .then_with(|| a.cmp(b));
    }
    a.cmp(b)
}

// ==========================================
// 出库扫码匹配系统 - 领域类型定义
// ==========================================
// 发货单状态、扫码结果类型、候选优先级策略
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 发货单状态 (Shipment State)
// ==========================================
// Pending/Filling 由计数派生; Completed 与 Used 必须区分:
// 完成后的外部通知可能独立失败
// 红线: Used 为终态,不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentState {
    Pending,   // 未扫描任何数量
    Filling,   // 部分扫描
    Completed, // 全部扫满,尚未确认通知
    Used,      // 通知成功,已使用(终态)
}

impl ShipmentState {
    /// 是否已进入终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentState::Used)
    }

    /// 是否仍可接收扫码
    pub fn accepts_scans(&self) -> bool {
        matches!(self, ShipmentState::Pending | ShipmentState::Filling)
    }
}

impl fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentState::Pending => write!(f, "PENDING"),
            ShipmentState::Filling => write!(f, "FILLING"),
            ShipmentState::Completed => write!(f, "COMPLETED"),
            ShipmentState::Used => write!(f, "USED"),
        }
    }
}

// ==========================================
// 扫码结果类型 (Scan Result Kind)
// ==========================================
// 用途: 扫码日志分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanResultKind {
    Success,      // 计数成功(含完成)
    NotFound,     // 条码不存在
    AlreadyUsed,  // 所属发货单均已完成
    Ignored,      // 重复扫码/面单号扫码
    Error,        // 内部一致性错误或通知失败
}

impl fmt::Display for ScanResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanResultKind::Success => write!(f, "SUCCESS"),
            ScanResultKind::NotFound => write!(f, "NOT_FOUND"),
            ScanResultKind::AlreadyUsed => write!(f, "ALREADY_USED"),
            ScanResultKind::Ignored => write!(f, "IGNORED"),
            ScanResultKind::Error => write!(f, "ERROR"),
        }
    }
}

// ==========================================
// 候选优先级策略 (Priority Strategy)
// ==========================================
// SmallFirst: 单品 → 小组合 → 大组合 (默认)
// LargeFirst: 大批量优先
// 两者同数量时均按 tracking_no 升序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityStrategy {
    #[default]
    SmallFirst,
    LargeFirst,
}

impl fmt::Display for PriorityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityStrategy::SmallFirst => write!(f, "SMALL_FIRST"),
            PriorityStrategy::LargeFirst => write!(f, "LARGE_FIRST"),
        }
    }
}

impl FromStr for PriorityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SMALL_FIRST" => Ok(PriorityStrategy::SmallFirst),
            "LARGE_FIRST" => Ok(PriorityStrategy::LargeFirst),
            other => Err(format!("未知的优先级策略: {}", other)),
        }
    }
}

// ==========================================
// SKU 种类偏好 (Sku Preference)
// ==========================================
// 位于固定发货单之后、总数量之前的排序步骤
// SingleFirst: 单品(sku_count == 1)优先
// ComboFirst: 组合(sku_count > 1)优先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkuPreference {
    #[default]
    None,
    SingleFirst,
    ComboFirst,
}

impl fmt::Display for SkuPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkuPreference::None => write!(f, "NONE"),
            SkuPreference::SingleFirst => write!(f, "SINGLE_FIRST"),
            SkuPreference::ComboFirst => write!(f, "COMBO_FIRST"),
        }
    }
}

impl FromStr for SkuPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(SkuPreference::None),
            "SINGLE_FIRST" => Ok(SkuPreference::SingleFirst),
            "COMBO_FIRST" => Ok(SkuPreference::ComboFirst),
            other => Err(format!("未知的 SKU 偏好: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_matches_serde() {
        let json = serde_json::to_string(&ShipmentState::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(ShipmentState::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn test_only_pending_and_filling_accept_scans() {
        assert!(ShipmentState::Pending.accepts_scans());
        assert!(ShipmentState::Filling.accepts_scans());
        assert!(!ShipmentState::Completed.accepts_scans());
        assert!(!ShipmentState::Used.accepts_scans());
        assert!(ShipmentState::Used.is_terminal());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "large_first".parse::<PriorityStrategy>().unwrap(),
            PriorityStrategy::LargeFirst
        );
        assert_eq!(PriorityStrategy::default(), PriorityStrategy::SmallFirst);
        assert!("random".parse::<PriorityStrategy>().is_err());
    }

    #[test]
    fn test_sku_preference_parse() {
        assert_eq!(
            "combo_first".parse::<SkuPreference>().unwrap(),
            SkuPreference::ComboFirst
        );
        assert_eq!(SkuPreference::default(), SkuPreference::None);
        assert_eq!(SkuPreference::SingleFirst.to_string(), "SINGLE_FIRST");
        assert!("mixed".parse::<SkuPreference>().is_err());
    }
}

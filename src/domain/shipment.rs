// ==========================================
// 出库扫码匹配系统 - 发货单领域模型
// ==========================================
// LineItem: 发货单内一个商品需求行
// Shipment: 以 tracking_no 标识的发货单(单品/组合)
// ==========================================
// 红线: scanned_qty ≤ required_qty
// 红线: Used ⇒ 全部行扫满
// ==========================================

use crate::domain::types::ShipmentState;
use serde::{Deserialize, Serialize};

// ==========================================
// LineItem - 发货单明细行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    barcode: String,
    product_name: String,
    option_name: String,
    required_qty: u32,
    scanned_qty: u32,
}

impl LineItem {
    /// 新建明细行(未扫描)
    pub fn new(
        barcode: impl Into<String>,
        product_name: impl Into<String>,
        option_name: impl Into<String>,
        required_qty: u32,
    ) -> Self {
        Self::with_progress(barcode, product_name, option_name, required_qty, 0)
    }

    /// 按已有扫描进度恢复明细行
    ///
    /// scanned_qty 超过 required_qty 时截断
    pub fn with_progress(
        barcode: impl Into<String>,
        product_name: impl Into<String>,
        option_name: impl Into<String>,
        required_qty: u32,
        scanned_qty: u32,
    ) -> Self {
        Self {
            barcode: barcode.into(),
            product_name: product_name.into(),
            option_name: option_name.into(),
            required_qty,
            scanned_qty: scanned_qty.min(required_qty),
        }
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn option_name(&self) -> &str {
        &self.option_name
    }

    pub fn required_qty(&self) -> u32 {
        self.required_qty
    }

    pub fn scanned_qty(&self) -> u32 {
        self.scanned_qty
    }

    /// 剩余待扫数量
    pub fn remaining(&self) -> u32 {
        self.required_qty - self.scanned_qty
    }

    /// 是否已扫满
    pub fn is_full(&self) -> bool {
        self.scanned_qty == self.required_qty
    }

    /// 扫描数量 +1,已满时返回 false 且不修改
    pub(crate) fn increment(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.scanned_qty += 1;
        true
    }

    /// 合并同一发货单内重复条码的行
    ///
    /// 数量溢出时返回 None 且不修改
    pub(crate) fn absorb(&mut self, other: &LineItem) -> Option<()> {
        let required_qty = self.required_qty.checked_add(other.required_qty)?;
        let scanned_qty = self.scanned_qty.checked_add(other.scanned_qty)?;
        self.required_qty = required_qty;
        self.scanned_qty = scanned_qty.min(required_qty);
        Some(())
    }

    /// 强制扫满(仅用于恢复已使用的发货单)
    pub(crate) fn fill(&mut self) {
        self.scanned_qty = self.required_qty;
    }
}

// ==========================================
// Shipment - 发货单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shipment {
    tracking_no: String,
    lines: Vec<LineItem>,
    state: ShipmentState,
}

impl Shipment {
    /// 由明细行构建发货单,状态按计数派生(不会直接得到 Used)
    pub fn new(tracking_no: impl Into<String>, lines: Vec<LineItem>) -> Self {
        let mut shipment = Self {
            tracking_no: tracking_no.into(),
            lines,
            state: ShipmentState::Pending,
        };
        shipment.refresh_state();
        shipment
    }

    pub fn tracking_no(&self) -> &str {
        &self.tracking_no
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn state(&self) -> ShipmentState {
        self.state
    }

    pub fn is_used(&self) -> bool {
        self.state == ShipmentState::Used
    }

    /// 按条码查找明细行
    pub fn line(&self, barcode: &str) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.barcode == barcode)
    }

    /// 总需求数量(候选排序依据)
    ///
    /// 仓储加载时已校验合计不溢出 u32
    pub fn total_qty(&self) -> u32 {
        self.lines.iter().map(|l| l.required_qty).sum()
    }

    pub fn total_scanned(&self) -> u32 {
        self.lines.iter().map(|l| l.scanned_qty).sum()
    }

    pub fn remaining(&self) -> u32 {
        self.lines.iter().map(|l| l.remaining()).sum()
    }

    /// 全部行是否扫满
    pub fn is_complete(&self) -> bool {
        self.lines.iter().all(|l| l.is_full())
    }

    /// SKU 种类数
    pub fn sku_count(&self) -> usize {
        self.lines.len()
    }

    /// 按行顺序的条码列表(通知外部协作方用)
    pub fn barcodes(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.barcode.clone()).collect()
    }

    /// 进度快照
    pub fn progress(&self) -> ShipmentProgress {
        ShipmentProgress {
            tracking_no: self.tracking_no.clone(),
            state: self.state,
            total_qty: self.total_qty(),
            total_scanned: self.total_scanned(),
            remaining: self.remaining(),
        }
    }

    /// 当前所有行的持久化视图
    pub fn line_changes(&self) -> Vec<LineChange> {
        self.lines
            .iter()
            .map(|l| LineChange::of(self, l))
            .collect()
    }

    pub(crate) fn line_mut(&mut self, barcode: &str) -> Option<&mut LineItem> {
        self.lines.iter_mut().find(|l| l.barcode == barcode)
    }

    /// 按计数重新派生状态; Used 不受影响
    pub(crate) fn refresh_state(&mut self) {
        if self.state == ShipmentState::Used {
            return;
        }
        self.state = if self.is_complete() {
            ShipmentState::Completed
        } else if self.total_scanned() > 0 {
            ShipmentState::Filling
        } else {
            ShipmentState::Pending
        };
    }

    /// Completed → Used
    pub(crate) fn finalize(&mut self) {
        debug_assert!(self.is_complete());
        self.state = ShipmentState::Used;
    }

    /// 恢复上次运行中已使用的发货单
    pub(crate) fn restore_used(&mut self) {
        for line in &mut self.lines {
            line.fill();
        }
        self.state = ShipmentState::Used;
    }
}

// ==========================================
// OrderRow - 数据集原始行
// ==========================================
// 用途: 导入管道中间产物(文件解析 → 字段映射 → 此结构)
// 一行对应一个 LineItem,按 tracking_no 分组成 Shipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub tracking_no: String,
    pub barcode: String,
    pub product_name: String,
    pub option_name: String,
    pub qty: u32,
    pub scanned_qty: u32,
    pub used: bool,
    pub row_number: usize, // 原始文件行号
}

// ==========================================
// LineChange - 待回写的行状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub tracking_no: String,
    pub barcode: String,
    pub scanned_qty: u32,
    pub used: bool,
}

impl LineChange {
    pub fn of(shipment: &Shipment, line: &LineItem) -> Self {
        Self {
            tracking_no: shipment.tracking_no.clone(),
            barcode: line.barcode.clone(),
            scanned_qty: line.scanned_qty,
            used: shipment.is_used(),
        }
    }
}

// ==========================================
// ShipmentProgress - 发货单进度
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentProgress {
    pub tracking_no: String,
    pub state: ShipmentState,
    pub total_qty: u32,
    pub total_scanned: u32,
    pub remaining: u32,
}

// ==========================================
// PendingSummaryRow - 按条码汇总的剩余数量
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummaryRow {
    pub barcode: String,
    pub product_name: String,
    pub option_name: String,
    pub required_qty: u32,
    pub scanned_qty: u32,
    pub remaining: u32,
}

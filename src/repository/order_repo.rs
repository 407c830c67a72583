// ==========================================
// 出库扫码匹配系统 - 发货单内存仓储
// ==========================================
// 职责: 发货单/明细行的唯一事实来源
// 索引: barcode → 发货单, tracking_no → 发货单
// ==========================================
// 红线: 索引加载后只读,不删除任何发货单
// 红线: 计数与 Used 只由状态机通过 apply_scan/mark_used 修改
// ==========================================

use crate::domain::shipment::{
    LineChange, LineItem, OrderRow, PendingSummaryRow, Shipment,
};
use crate::domain::types::ShipmentState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ==========================================
// OrderRepository - 发货单仓储
// ==========================================
#[derive(Debug, Default)]
pub struct OrderRepository {
    shipments: Vec<Shipment>,
    by_tracking_no: HashMap<String, usize>,
    by_barcode: HashMap<String, Vec<usize>>,
}

/// 各状态发货单计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub shipments: usize,
    pub pending: usize,
    pub filling: usize,
    pub completed: usize,
    pub used: usize,
}

impl OrderRepository {
    // ==========================================
    // 加载
    // ==========================================

    /// 由已构建的发货单创建仓储
    ///
    /// 校验: tracking_no 唯一、每单至少一行、数量为正、单内条码不重复、
    /// 单内合计与同条码跨单合计不超过 u32
    pub fn from_shipments(shipments: Vec<Shipment>) -> RepositoryResult<Self> {
        let mut repo = Self::default();
        let mut barcode_totals: HashMap<String, u32> = HashMap::new();

        for shipment in shipments {
            validate_shipment(&shipment)?;

            for line in shipment.lines() {
                let total = barcode_totals.entry(line.barcode().to_string()).or_insert(0);
                *total = total.checked_add(line.required_qty()).ok_or_else(|| {
                    RepositoryError::ValidationError(format!(
                        "条码合计数量溢出: barcode={}, tracking_no={}",
                        line.barcode(),
                        shipment.tracking_no()
                    ))
                })?;
            }

            let idx = repo.shipments.len();
            if repo
                .by_tracking_no
                .insert(shipment.tracking_no().to_string(), idx)
                .is_some()
            {
                return Err(RepositoryError::ValidationError(format!(
                    "tracking_no 重复: {}",
                    shipment.tracking_no()
                )));
            }

            for line in shipment.lines() {
                repo.by_barcode
                    .entry(line.barcode().to_string())
                    .or_default()
                    .push(idx);
            }

            repo.shipments.push(shipment);
        }

        tracing::info!(
            "发货单仓储已加载: shipments={}, barcodes={}",
            repo.shipments.len(),
            repo.by_barcode.len()
        );

        Ok(repo)
    }

    /// 由数据集行创建仓储
    ///
    /// - 按 tracking_no 分组,保持首次出现顺序
    /// - 同一发货单内重复条码的行合并(数量相加)
    /// - 任一行 used=true 的发货单恢复为 Used(计数强制扫满)
    pub fn from_rows(rows: Vec<OrderRow>) -> RepositoryResult<Self> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (Vec<LineItem>, bool)> = HashMap::new();

        for row in rows {
            if row.tracking_no.trim().is_empty() {
                return Err(RepositoryError::ValidationError(format!(
                    "行 {}: tracking_no 为空",
                    row.row_number
                )));
            }
            if row.barcode.trim().is_empty() {
                return Err(RepositoryError::ValidationError(format!(
                    "行 {}: barcode 为空",
                    row.row_number
                )));
            }
            if row.qty == 0 {
                return Err(RepositoryError::ValidationError(format!(
                    "行 {}: qty 必须为正整数 (tracking_no={})",
                    row.row_number, row.tracking_no
                )));
            }

            let entry = groups.entry(row.tracking_no.clone()).or_insert_with(|| {
                order.push(row.tracking_no.clone());
                (Vec::new(), false)
            });

            let line = LineItem::with_progress(
                row.barcode.as_str(),
                row.product_name.as_str(),
                row.option_name.as_str(),
                row.qty,
                row.scanned_qty,
            );
            match entry.0.iter_mut().find(|l| l.barcode() == row.barcode) {
                Some(existing) => {
                    tracing::warn!(
                        "发货单内条码重复,已合并: tracking_no={}, barcode={}, row={}",
                        row.tracking_no,
                        row.barcode,
                        row.row_number
                    );
                    existing.absorb(&line).ok_or_else(|| {
                        RepositoryError::ValidationError(format!(
                            "行 {}: 合并后数量溢出 (tracking_no={}, barcode={})",
                            row.row_number, row.tracking_no, row.barcode
                        ))
                    })?;
                }
                None => entry.0.push(line),
            }
            entry.1 |= row.used;
        }

        let mut shipments = Vec::with_capacity(order.len());
        for tracking_no in order {
            let Some((lines, used)) = groups.remove(&tracking_no) else {
                continue;
            };
            let mut shipment = Shipment::new(tracking_no, lines);
            if used {
                if !shipment.is_complete() {
                    tracing::warn!(
                        "发货单标记为已使用但未扫满,按已使用恢复: tracking_no={}, remaining={}",
                        shipment.tracking_no(),
                        shipment.remaining()
                    );
                }
                shipment.restore_used();
            }
            shipments.push(shipment);
        }

        Self::from_shipments(shipments)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按条码反查发货单(不区分状态)
    pub fn find_shipments_by_barcode(&self, barcode: &str) -> RepositoryResult<Vec<&Shipment>> {
        match self.by_barcode.get(barcode) {
            Some(indexes) if !indexes.is_empty() => {
                Ok(indexes.iter().map(|&i| &self.shipments[i]).collect())
            }
            _ => Err(RepositoryError::UnknownBarcode(barcode.to_string())),
        }
    }

    pub fn shipment(&self, tracking_no: &str) -> Option<&Shipment> {
        self.by_tracking_no
            .get(tracking_no)
            .map(|&i| &self.shipments[i])
    }

    /// 全部发货单(加载顺序)
    pub fn shipments(&self) -> &[Shipment] {
        &self.shipments
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }

    pub fn contains_tracking_no(&self, tracking_no: &str) -> bool {
        self.by_tracking_no.contains_key(tracking_no)
    }

    pub fn is_known_barcode(&self, barcode: &str) -> bool {
        self.by_barcode.contains_key(barcode)
    }

    /// 已扫满但尚未确认通知的发货单
    pub fn completed_unfinalized(&self) -> Vec<&Shipment> {
        self.shipments
            .iter()
            .filter(|s| s.state() == ShipmentState::Completed)
            .collect()
    }

    /// 按 (条码, 商品名, 选项名) 汇总未使用发货单的剩余数量
    pub fn pending_summary(&self) -> Vec<PendingSummaryRow> {
        let mut grouped: BTreeMap<(String, String, String), PendingSummaryRow> = BTreeMap::new();

        for shipment in self.shipments.iter().filter(|s| !s.is_used()) {
            for line in shipment.lines() {
                let key = (
                    line.barcode().to_string(),
                    line.product_name().to_string(),
                    line.option_name().to_string(),
                );
                let row = grouped.entry(key).or_insert_with(|| PendingSummaryRow {
                    barcode: line.barcode().to_string(),
                    product_name: line.product_name().to_string(),
                    option_name: line.option_name().to_string(),
                    required_qty: 0,
                    scanned_qty: 0,
                    remaining: 0,
                });
                // 同条码合计在加载时已校验
                row.required_qty = row.required_qty.saturating_add(line.required_qty());
                row.scanned_qty = row.scanned_qty.saturating_add(line.scanned_qty());
                row.remaining = row.remaining.saturating_add(line.remaining());
            }
        }

        grouped.into_values().filter(|r| r.remaining > 0).collect()
    }

    pub fn stats(&self) -> RepositoryStats {
        let mut stats = RepositoryStats {
            shipments: self.shipments.len(),
            ..Default::default()
        };
        for shipment in &self.shipments {
            match shipment.state() {
                ShipmentState::Pending => stats.pending += 1,
                ShipmentState::Filling => stats.filling += 1,
                ShipmentState::Completed => stats.completed += 1,
                ShipmentState::Used => stats.used += 1,
            }
        }
        stats
    }

    /// 全部行的持久化视图
    pub fn all_line_changes(&self) -> Vec<LineChange> {
        self.shipments.iter().flat_map(|s| s.line_changes()).collect()
    }

    // ==========================================
    // 写入(仅状态机调用)
    // ==========================================

    /// 对指定发货单的指定条码行计数 +1
    ///
    /// 失败时不修改任何状态
    pub fn apply_scan(&mut self, tracking_no: &str, barcode: &str) -> RepositoryResult<LineItem> {
        let shipment = self.shipment_mut(tracking_no)?;

        if shipment.is_used() {
            return Err(RepositoryError::AlreadyUsed(tracking_no.to_string()));
        }

        let line = shipment
            .line_mut(barcode)
            .ok_or_else(|| RepositoryError::LineItemNotFound {
                tracking_no: tracking_no.to_string(),
                barcode: barcode.to_string(),
            })?;

        if !line.increment() {
            return Err(RepositoryError::OverScan {
                tracking_no: tracking_no.to_string(),
                barcode: barcode.to_string(),
                required_qty: line.required_qty(),
            });
        }
        let updated = line.clone();

        shipment.refresh_state();
        Ok(updated)
    }

    /// Completed → Used
    pub fn mark_used(&mut self, tracking_no: &str) -> RepositoryResult<()> {
        let shipment = self.shipment_mut(tracking_no)?;

        match shipment.state() {
            ShipmentState::Used => Err(RepositoryError::AlreadyUsed(tracking_no.to_string())),
            ShipmentState::Completed => {
                shipment.finalize();
                Ok(())
            }
            ShipmentState::Pending | ShipmentState::Filling => Err(RepositoryError::NotComplete {
                tracking_no: tracking_no.to_string(),
                remaining: shipment.remaining(),
            }),
        }
    }

    fn shipment_mut(&mut self, tracking_no: &str) -> RepositoryResult<&mut Shipment> {
        let idx = *self
            .by_tracking_no
            .get(tracking_no)
            .ok_or_else(|| RepositoryError::ShipmentNotFound(tracking_no.to_string()))?;
        Ok(&mut self.shipments[idx])
    }
}

fn validate_shipment(shipment: &Shipment) -> RepositoryResult<()> {
    if shipment.lines().is_empty() {
        return Err(RepositoryError::ValidationError(format!(
            "发货单无明细行: {}",
            shipment.tracking_no()
        )));
    }

    let mut total: u32 = 0;
    let mut seen: Vec<&str> = Vec::with_capacity(shipment.lines().len());
    for line in shipment.lines() {
        total = total.checked_add(line.required_qty()).ok_or_else(|| {
            RepositoryError::ValidationError(format!(
                "发货单合计数量溢出: tracking_no={}",
                shipment.tracking_no()
            ))
        })?;
        if line.required_qty() == 0 {
            return Err(RepositoryError::ValidationError(format!(
                "required_qty 必须为正: tracking_no={}, barcode={}",
                shipment.tracking_no(),
                line.barcode()
            )));
        }
        if seen.contains(&line.barcode()) {
            return Err(RepositoryError::ValidationError(format!(
                "发货单内条码重复: tracking_no={}, barcode={}",
                shipment.tracking_no(),
                line.barcode()
            )));
        }
        seen.push(line.barcode());
    }
    Ok(())
}

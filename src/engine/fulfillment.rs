// ==========================================
// 出库扫码匹配系统 - 发货状态机
// ==========================================
// 职责: 扫码 → 选单 → 计数 → 完成判定 → 通知 → Used
// ==========================================
// 状态: Pending → Filling → Completed → Used
// - Pending/Filling 由计数派生
// - Completed: 全部行扫满,等待通知确认
// - Used: 终态,不再参与匹配
// ==========================================
// 红线: 被拒绝的扫码不修改任何计数
// 红线: 通知失败时发货单停留在 Completed,计数不回滚
// ==========================================

use crate::domain::shipment::{LineChange, LineItem, ShipmentProgress};
use crate::domain::types::ShipmentState;
use crate::engine::error::{ScanError, ScanResult};
use crate::engine::matcher::{MatchEngine, MatchPolicy};
use crate::engine::notifier::{notify_with_timeout, CompletionNotifier, NotifyError};
use crate::repository::order_repo::OrderRepository;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// 默认通知超时
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// 单次扫码结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// 计数成功,发货单仍在扫描中
    Accepted,
    /// 扫满且通知确认,已变为 Used
    Finalized,
    /// 扫满但通知失败,停留在 Completed
    CompletionPending { error: NotifyError },
}

impl ScanOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, ScanOutcome::Finalized)
    }
}

/// 扫码报告
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub barcode: String,
    pub tracking_no: String,
    pub line: LineItem,
    pub progress: ShipmentProgress,
    pub outcome: ScanOutcome,
    /// 需要回写存储的行
    pub changes: Vec<LineChange>,
}

// ==========================================
// FulfillmentEngine - 发货状态机
// ==========================================
pub struct FulfillmentEngine {
    repo: OrderRepository,
    matcher: MatchEngine,
    notifier: Arc<dyn CompletionNotifier>,
    notify_timeout: Duration,
}

impl FulfillmentEngine {
    /// # 参数
    /// - `repo`: 已加载的发货单仓储(由状态机独占)
    /// - `matcher`: 候选匹配引擎
    /// - `notifier`: 完成通知者
    /// - `notify_timeout`: 单次通知超时
    pub fn new(
        repo: OrderRepository,
        matcher: MatchEngine,
        notifier: Arc<dyn CompletionNotifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            matcher,
            notifier,
            notify_timeout,
        }
    }

    pub fn repository(&self) -> &OrderRepository {
        &self.repo
    }

    pub fn matcher(&self) -> &MatchEngine {
        &self.matcher
    }

    pub fn set_policy(&mut self, policy: MatchPolicy) {
        self.matcher.set_policy(policy);
    }

    pub fn notify_timeout(&self) -> Duration {
        self.notify_timeout
    }

    /// 已扫满但通知未确认的发货单号
    pub fn pending_completions(&self) -> Vec<String> {
        self.repo
            .completed_unfinalized()
            .iter()
            .map(|s| s.tracking_no().to_string())
            .collect()
    }

    // ==========================================
    // 扫码处理
    // ==========================================

    /// 处理一次扫码
    ///
    /// # 返回
    /// - `Ok(report)`: 计数已生效; 通知失败体现在 `report.outcome`
    /// - `Err`: 扫码被拒绝,仓储未修改
    pub async fn process_scan(&mut self, barcode: &str) -> ScanResult<ScanReport> {
        if barcode.is_empty() {
            return Err(ScanError::EmptyBarcode);
        }

        let tracking_no = self
            .matcher
            .select_candidate(&self.repo, barcode)?
            .tracking_no()
            .to_string();

        let line = self.repo.apply_scan(&tracking_no, barcode).map_err(|e| {
            let err = ScanError::from(e);
            if err.is_internal() {
                tracing::error!(
                    "匹配结果与仓储不一致,扫码已拒绝: tracking_no={}, barcode={}, error={}",
                    tracking_no,
                    barcode,
                    err
                );
            }
            err
        })?;

        let state = self.state_of(&tracking_no)?;
        tracing::info!(
            "扫码计数: barcode={}, tracking_no={}, scanned={}/{}, state={}",
            barcode,
            tracking_no,
            line.scanned_qty(),
            line.required_qty(),
            state
        );

        let outcome = if state == ShipmentState::Completed {
            tracing::info!("发货单已扫满: tracking_no={}", tracking_no);
            match self.finalize(&tracking_no).await {
                Ok(()) => ScanOutcome::Finalized,
                Err(error) => ScanOutcome::CompletionPending { error },
            }
        } else {
            ScanOutcome::Accepted
        };

        let shipment = self
            .repo
            .shipment(&tracking_no)
            .ok_or_else(|| ScanError::ShipmentNotFound(tracking_no.clone()))?;

        // 变为 Used 时整单所有行都要回写
        let changes = if outcome.is_finalized() {
            shipment.line_changes()
        } else {
            vec![LineChange::of(shipment, &line)]
        };

        Ok(ScanReport {
            barcode: barcode.to_string(),
            tracking_no,
            line,
            progress: shipment.progress(),
            outcome,
            changes,
        })
    }

    /// 重新发送完成通知(不重新扫码)
    ///
    /// # 错误
    /// - `AlreadyUsed`: 已确认过
    /// - `NotComplete`: 尚未扫满
    /// - `Notifier`: 通知再次失败,发货单仍为 Completed
    pub async fn retry_completion(&mut self, tracking_no: &str) -> ScanResult<Vec<LineChange>> {
        let shipment = self
            .repo
            .shipment(tracking_no)
            .ok_or_else(|| ScanError::ShipmentNotFound(tracking_no.to_string()))?;

        match shipment.state() {
            ShipmentState::Used => return Err(ScanError::AlreadyUsed(tracking_no.to_string())),
            ShipmentState::Pending | ShipmentState::Filling => {
                return Err(ScanError::NotComplete {
                    tracking_no: tracking_no.to_string(),
                    remaining: shipment.remaining(),
                })
            }
            ShipmentState::Completed => {}
        }

        tracing::info!("重试完成通知: tracking_no={}", tracking_no);
        self.finalize(tracking_no)
            .await
            .map_err(|source| ScanError::Notifier {
                tracking_no: tracking_no.to_string(),
                source,
            })?;

        let shipment = self
            .repo
            .shipment(tracking_no)
            .ok_or_else(|| ScanError::ShipmentNotFound(tracking_no.to_string()))?;
        Ok(shipment.line_changes())
    }

    /// 通知 → mark_used
    ///
    /// 通知失败返回 Err 且不修改状态; mark_used 失败属于内部错误,按通知失败处理
    async fn finalize(&mut self, tracking_no: &str) -> Result<(), NotifyError> {
        let barcodes = match self.repo.shipment(tracking_no) {
            Some(s) => s.barcodes(),
            None => return Err(NotifyError::Rejected(format!("发货单不存在: {}", tracking_no))),
        };

        if let Err(e) = notify_with_timeout(
            self.notifier.as_ref(),
            self.notify_timeout,
            tracking_no,
            &barcodes,
        )
        .await
        {
            tracing::warn!(
                "完成通知失败,发货单保持 Completed: tracking_no={}, error={}",
                tracking_no,
                e
            );
            return Err(e);
        }

        if let Err(e) = self.repo.mark_used(tracking_no) {
            tracing::error!(
                "通知已确认但无法标记 Used: tracking_no={}, error={}",
                tracking_no,
                e
            );
            return Err(NotifyError::Rejected(e.to_string()));
        }

        tracing::info!("发货单已完成出库: tracking_no={}", tracking_no);
        Ok(())
    }

    fn state_of(&self, tracking_no: &str) -> ScanResult<ShipmentState> {
        self.repo
            .shipment(tracking_no)
            .map(|s| s.state())
            .ok_or_else(|| ScanError::ShipmentNotFound(tracking_no.to_string()))
    }
}

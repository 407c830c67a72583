// ==========================================
// 出库扫码匹配系统 - 扫码 API
// ==========================================
// 职责: 扫码入口(串行化 + 过滤 + 状态机 + 回写 + 日志)
// ==========================================
// 临界区: 过滤 → 选单 → 计数 → 通知 → 回写 作为一个整体
// 由 tokio::sync::Mutex 串行化,保证单消费者语义
// 回写失败的发货单记入 unsaved,下次成功回写时一并写入(绝对值)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::scan_settings::ScanSettings;
use crate::domain::scan_log::ScanLogEntry;
use crate::domain::shipment::{LineChange, PendingSummaryRow, ShipmentProgress};
use crate::domain::types::ScanResultKind;
use crate::engine::fulfillment::{FulfillmentEngine, ScanOutcome, ScanReport};
use crate::engine::matcher::{MatchEngine, MatchPolicy};
use crate::engine::notifier::CompletionNotifier;
use crate::engine::scan_filter::{sanitize_barcode, IgnoreReason, ScanFilter};
use crate::importer::{dataset_loader, dataset_writer};
use crate::repository::error::RepositoryError;
use crate::repository::line_store::ShipmentLineStore;
use crate::repository::order_repo::{OrderRepository, RepositoryStats};
use crate::repository::scan_log_repo::ScanLogRepository;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

/// 扫码处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "disposition", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanDisposition {
    /// 被过滤(重复/面单号),未修改任何状态
    Ignored { barcode: String, reason: IgnoreReason },
    /// 已计数
    Processed(ScanReport),
    /// 已计数,但状态回写失败; 内存中的计数与通知结果有效
    Unsaved {
        report: ScanReport,
        persist_error: String,
    },
}

impl ScanDisposition {
    /// 计数生效时的扫码报告
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanDisposition::Ignored { .. } => None,
            ScanDisposition::Processed(report) | ScanDisposition::Unsaved { report, .. } => {
                Some(report)
            }
        }
    }
}

struct ScanSession {
    engine: FulfillmentEngine,
    filter: ScanFilter,
    unsaved: BTreeSet<String>,
}

// ==========================================
// ScanApi - 扫码 API
// ==========================================
pub struct ScanApi {
    session: AsyncMutex<ScanSession>,
    line_store: ShipmentLineStore,
    scan_log: ScanLogRepository,
}

impl ScanApi {
    /// 由已构建的仓储创建
    ///
    /// 不写 shipment_line; 调用方负责初次落库
    pub fn new(
        repo: OrderRepository,
        conn: Arc<Mutex<Connection>>,
        notifier: Arc<dyn CompletionNotifier>,
        settings: &ScanSettings,
    ) -> Self {
        let engine = FulfillmentEngine::new(
            repo,
            MatchEngine::new(settings.policy.clone()),
            notifier,
            settings.notify_timeout,
        );
        let filter = ScanFilter::new(settings.debounce, settings.ignore_tracking_labels);

        Self {
            session: AsyncMutex::new(ScanSession {
                engine,
                filter,
                unsaved: BTreeSet::new(),
            }),
            line_store: ShipmentLineStore::new(conn.clone()),
            scan_log: ScanLogRepository::new(conn),
        }
    }

    /// 从数据集文件加载,并整体替换 shipment_line
    pub fn from_dataset<P: AsRef<Path>>(
        dataset: P,
        conn: Arc<Mutex<Connection>>,
        notifier: Arc<dyn CompletionNotifier>,
        settings: &ScanSettings,
    ) -> ApiResult<Self> {
        let repo = dataset_loader::load_repository(dataset)?;
        let api = Self::new(repo, conn, notifier, settings);
        api.persist_all_blocking()?;
        Ok(api)
    }

    /// 从 shipment_line 恢复上次运行的进度
    pub fn resume(
        conn: Arc<Mutex<Connection>>,
        notifier: Arc<dyn CompletionNotifier>,
        settings: &ScanSettings,
    ) -> ApiResult<Self> {
        let rows = ShipmentLineStore::new(conn.clone()).load_rows()?;
        if rows.is_empty() {
            return Err(ApiError::DatasetNotLoaded);
        }

        let repo = OrderRepository::from_rows(rows)?;
        let stats = repo.stats();
        tracing::info!(
            "已恢复上次进度: shipments={}, used={}, completed={}",
            stats.shipments,
            stats.used,
            stats.completed
        );
        Ok(Self::new(repo, conn, notifier, settings))
    }

    fn persist_all_blocking(&self) -> ApiResult<()> {
        let session = self
            .session
            .try_lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        self.line_store.replace_all(session.engine.repository())?;
        Ok(())
    }

    // ==========================================
    // 扫码
    // ==========================================

    /// 处理一次扫码输入
    ///
    /// # 返回
    /// - `Ok(Ignored)`: 重复扫码或面单号扫码
    /// - `Ok(Processed)`: 计数已生效(含通知失败的情况)
    /// - `Ok(Unsaved)`: 计数已生效,但状态回写失败
    /// - `Err(ApiError::Scan)`: 扫码被拒绝,状态未修改
    pub async fn process_scan(&self, raw: &str) -> ApiResult<ScanDisposition> {
        let barcode = sanitize_barcode(raw);
        let mut session = self.session.lock().await;
        let ScanSession {
            engine,
            filter,
            unsaved,
        } = &mut *session;

        if !barcode.is_empty() {
            if let Some(reason) = filter.check(&barcode, engine.repository(), Instant::now()) {
                tracing::info!("扫码已忽略: barcode={}, reason={}", barcode, reason);
                self.append_log(ScanLogEntry::now(
                    barcode.as_str(),
                    None,
                    ScanResultKind::Ignored,
                    reason.to_string(),
                ));
                return Ok(ScanDisposition::Ignored { barcode, reason });
            }
        }

        match engine.process_scan(&barcode).await {
            Ok(report) => {
                let persist_error = self
                    .persist_changes(engine, unsaved, &report.tracking_no, &report.changes)
                    .err();

                let (mut kind, mut message) = match &report.outcome {
                    ScanOutcome::Accepted => (
                        ScanResultKind::Success,
                        format!("计数成功 (剩余: {})", report.progress.remaining),
                    ),
                    ScanOutcome::Finalized => {
                        (ScanResultKind::Success, "发货单完成出库".to_string())
                    }
                    ScanOutcome::CompletionPending { error } => {
                        (ScanResultKind::Error, format!("已扫满,完成通知失败: {}", error))
                    }
                };
                if let Some(err) = &persist_error {
                    kind = ScanResultKind::Error;
                    message = format!("{}; 状态回写失败: {}", message, err);
                }
                self.append_log(ScanLogEntry::now(
                    barcode.as_str(),
                    Some(report.tracking_no.clone()),
                    kind,
                    message,
                ));

                Ok(match persist_error {
                    None => ScanDisposition::Processed(report),
                    Some(persist_error) => ScanDisposition::Unsaved {
                        report,
                        persist_error: persist_error.to_string(),
                    },
                })
            }
            Err(e) => {
                tracing::warn!("扫码被拒绝: barcode={}, error={}", barcode, e);
                self.append_log(ScanLogEntry::now(
                    barcode.as_str(),
                    None,
                    e.result_kind(),
                    e.to_string(),
                ));
                Err(e.into())
            }
        }
    }

    /// 重新发送完成通知
    ///
    /// 通知成功但回写失败时返回 Err; 发货单在内存中已为 Used,下次回写时补写
    pub async fn retry_completion(&self, tracking_no: &str) -> ApiResult<ShipmentProgress> {
        let mut session = self.session.lock().await;

        match session.engine.retry_completion(tracking_no).await {
            Ok(_) => {
                let persisted = self.line_store.mark_used(tracking_no).map_err(|e| {
                    tracing::error!("已使用状态回写失败: tracking_no={}, error={}", tracking_no, e);
                    session.unsaved.insert(tracking_no.to_string());
                    e
                });
                self.append_log(ScanLogEntry::now(
                    "",
                    Some(tracking_no.to_string()),
                    if persisted.is_ok() {
                        ScanResultKind::Success
                    } else {
                        ScanResultKind::Error
                    },
                    match &persisted {
                        Ok(_) => "重试完成通知成功".to_string(),
                        Err(e) => format!("重试完成通知成功; 状态回写失败: {}", e),
                    },
                ));
                persisted?;
                session
                    .engine
                    .repository()
                    .shipment(tracking_no)
                    .map(|s| s.progress())
                    .ok_or_else(|| ApiError::NotFound(format!("发货单(id={})不存在", tracking_no)))
            }
            Err(e) => {
                self.append_log(ScanLogEntry::now(
                    "",
                    Some(tracking_no.to_string()),
                    e.result_kind(),
                    e.to_string(),
                ));
                Err(e.into())
            }
        }
    }

    /// 补写此前回写失败的发货单
    ///
    /// # 返回
    /// - 写入的行数
    pub async fn flush_unsaved(&self) -> ApiResult<usize> {
        let mut session = self.session.lock().await;
        let ScanSession {
            engine, unsaved, ..
        } = &mut *session;
        if unsaved.is_empty() {
            return Ok(0);
        }
        Ok(self.persist_changes(engine, unsaved, "", &[])?)
    }

    /// 回写本次变更及此前未保存的发货单
    ///
    /// 失败时把 `tracking_no` 记入 unsaved
    fn persist_changes(
        &self,
        engine: &FulfillmentEngine,
        unsaved: &mut BTreeSet<String>,
        tracking_no: &str,
        changes: &[LineChange],
    ) -> Result<usize, RepositoryError> {
        let mut pending = changes.to_vec();
        for earlier in unsaved.iter().filter(|t| t.as_str() != tracking_no) {
            if let Some(shipment) = engine.repository().shipment(earlier) {
                pending.extend(shipment.line_changes());
            }
        }

        match self.line_store.update_lines(&pending) {
            Ok(count) => {
                if !unsaved.is_empty() {
                    tracing::info!("已补写未保存的发货单: {:?}", unsaved);
                    unsaved.clear();
                }
                Ok(count)
            }
            Err(e) => {
                tracing::error!("扫码状态回写失败: tracking_no={}, error={}", tracking_no, e);
                if !tracking_no.is_empty() {
                    unsaved.insert(tracking_no.to_string());
                }
                Err(e)
            }
        }
    }

    /// 回写失败、等待补写的发货单号
    pub async fn unsaved_shipments(&self) -> Vec<String> {
        self.session.lock().await.unsaved.iter().cloned().collect()
    }

    /// 扫码日志写入失败不影响扫码结果
    fn append_log(&self, entry: ScanLogEntry) {
        if let Err(e) = self.scan_log.insert(&entry) {
            tracing::warn!("扫码日志写入失败: barcode={}, error={}", entry.barcode, e);
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn pending_summary(&self) -> Vec<PendingSummaryRow> {
        self.session.lock().await.engine.repository().pending_summary()
    }

    pub async fn progress(&self, tracking_no: &str) -> ApiResult<ShipmentProgress> {
        self.session
            .lock()
            .await
            .engine
            .repository()
            .shipment(tracking_no)
            .map(|s| s.progress())
            .ok_or_else(|| ApiError::NotFound(format!("发货单(id={})不存在", tracking_no)))
    }

    pub async fn stats(&self) -> RepositoryStats {
        self.session.lock().await.engine.repository().stats()
    }

    /// 已扫满但通知未确认的发货单号
    pub async fn pending_completions(&self) -> Vec<String> {
        self.session.lock().await.engine.pending_completions()
    }

    pub async fn recent_logs(&self, limit: usize) -> ApiResult<Vec<ScanLogEntry>> {
        Ok(self.scan_log.list_recent(limit)?)
    }

    /// 某张发货单的全部扫码日志
    pub async fn logs_for_shipment(&self, tracking_no: &str) -> ApiResult<Vec<ScanLogEntry>> {
        Ok(self.scan_log.list_by_tracking_no(tracking_no)?)
    }

    // ==========================================
    // 管理
    // ==========================================

    pub async fn set_policy(&self, policy: MatchPolicy) {
        tracing::info!(
            "匹配策略已更新: strategy={}, sku_preference={}, pinned={:?}",
            policy.strategy,
            policy.sku_preference,
            policy.pinned
        );
        self.session.lock().await.engine.set_policy(policy);
    }

    /// 导出当前进度为 CSV
    pub async fn export_csv(&self, output: &Path) -> ApiResult<usize> {
        let session = self.session.lock().await;
        Ok(dataset_writer::export_csv(session.engine.repository(), output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::shipment::{LineItem, Shipment};
    use crate::engine::error::ScanError;
    use crate::engine::notifier::NoOpNotifier;
    use std::time::Duration;

    fn api(shipments: Vec<Shipment>) -> (ScanApi, Arc<Mutex<Connection>>) {
        crate::logging::init_test();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let settings = ScanSettings {
            debounce: Duration::from_secs(60),
            ..ScanSettings::default()
        };
        let repo = OrderRepository::from_shipments(shipments).unwrap();
        let api = ScanApi::new(repo, conn.clone(), Arc::new(NoOpNotifier), &settings);
        api.persist_all_blocking().unwrap();
        (api, conn)
    }

    #[tokio::test]
    async fn test_double_scan_is_ignored_and_logged() {
        let (api, _) = api(vec![Shipment::new("T1", vec![LineItem::new("A", "", "", 2)])]);

        let first = api.process_scan("A\r\n").await.unwrap();
        assert!(matches!(first, ScanDisposition::Processed(_)));

        let second = api.process_scan("A").await.unwrap();
        assert!(matches!(
            second,
            ScanDisposition::Ignored {
                reason: IgnoreReason::DoubleScan,
                ..
            }
        ));
        assert_eq!(api.progress("T1").await.unwrap().total_scanned, 1);

        let logs = api.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].result, ScanResultKind::Ignored);
    }

    #[tokio::test]
    async fn test_rejected_scan_logged_as_not_found() {
        let (api, _) = api(vec![Shipment::new("T1", vec![LineItem::new("A", "", "", 1)])]);

        let err = api.process_scan("ZZZ").await.unwrap_err();
        assert!(matches!(
            err.as_scan_error(),
            Some(ScanError::UnknownBarcode(_))
        ));

        let logs = api.recent_logs(1).await.unwrap();
        assert_eq!(logs[0].result, ScanResultKind::NotFound);
    }

    #[tokio::test]
    async fn test_completion_persisted() {
        let (api, conn) = api(vec![Shipment::new("T1", vec![LineItem::new("A", "", "", 1)])]);

        api.process_scan("A").await.unwrap();

        let rows = ShipmentLineStore::new(conn).load_rows().unwrap();
        assert!(rows[0].used);
        assert_eq!(rows[0].scanned_qty, 1);
        assert_eq!(api.stats().await.used, 1);
    }

    fn set_line_table_online(conn: &Arc<Mutex<Connection>>, online: bool) {
        let sql = if online {
            "ALTER TABLE shipment_line_offline RENAME TO shipment_line"
        } else {
            "ALTER TABLE shipment_line RENAME TO shipment_line_offline"
        };
        conn.lock().unwrap().execute(sql, []).unwrap();
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_report_and_log() {
        let (api, conn) = api(vec![
            Shipment::new("T1", vec![LineItem::new("A", "", "", 1)]),
            Shipment::new("T2", vec![LineItem::new("B", "", "", 1)]),
        ]);

        set_line_table_online(&conn, false);
        let disposition = api.process_scan("A").await.unwrap();
        match &disposition {
            ScanDisposition::Unsaved {
                report,
                persist_error,
            } => {
                assert_eq!(report.tracking_no, "T1");
                assert!(report.outcome.is_finalized());
                assert!(!persist_error.is_empty());
            }
            other => panic!("应为 Unsaved, 实际: {:?}", other),
        }
        assert_eq!(disposition.report().unwrap().tracking_no, "T1");
        assert_eq!(api.unsaved_shipments().await, vec!["T1".to_string()]);

        let logs = api.logs_for_shipment("T1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].result, ScanResultKind::Error);
        assert_eq!(logs[0].barcode, "A");

        // 恢复后,下一次回写补写 T1
        set_line_table_online(&conn, true);
        let next = api.process_scan("B").await.unwrap();
        assert!(matches!(next, ScanDisposition::Processed(_)));
        assert!(api.unsaved_shipments().await.is_empty());

        let rows = ShipmentLineStore::new(conn).load_rows().unwrap();
        assert!(rows.iter().all(|r| r.used && r.scanned_qty == 1));
    }

    #[tokio::test]
    async fn test_flush_unsaved_after_recovery() {
        let (api, conn) = api(vec![Shipment::new("T1", vec![LineItem::new("A", "", "", 2)])]);

        set_line_table_online(&conn, false);
        assert!(matches!(
            api.process_scan("A").await.unwrap(),
            ScanDisposition::Unsaved { .. }
        ));
        assert!(api.flush_unsaved().await.is_err());

        set_line_table_online(&conn, true);
        assert_eq!(api.flush_unsaved().await.unwrap(), 1);
        assert_eq!(api.flush_unsaved().await.unwrap(), 0);

        let rows = ShipmentLineStore::new(conn).load_rows().unwrap();
        assert_eq!(rows[0].scanned_qty, 1);
        assert!(!rows[0].used);
    }
}

// ==========================================
// 出库扫码匹配系统 - 扫码日志仓储
// ==========================================

use crate::domain::scan_log::ScanLogEntry;
use crate::domain::types::ScanResultKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ==========================================
// ScanLogRepository - 扫码日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ScanLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScanLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入扫码日志
    ///
    /// # 返回
    /// - `Ok(log_id)`: 成功插入
    pub fn insert(&self, entry: &ScanLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO scan_log (log_id, scanned_at, barcode, tracking_no, result, message)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.log_id,
                entry.scanned_at.format(TS_FORMAT).to_string(),
                entry.barcode,
                entry.tracking_no,
                entry.result.to_string(),
                entry.message,
            ],
        )?;

        Ok(entry.log_id.clone())
    }

    /// 最近的日志(新 → 旧)
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ScanLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, scanned_at, barcode, tracking_no, result, message
            FROM scan_log
            ORDER BY scanned_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let entries = stmt
            .query_map(params![limit as i64], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// 某发货单的全部日志(旧 → 新)
    pub fn list_by_tracking_no(&self, tracking_no: &str) -> RepositoryResult<Vec<ScanLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, scanned_at, barcode, tracking_no, result, message
            FROM scan_log
            WHERE tracking_no = ?1
            ORDER BY scanned_at, rowid
            "#,
        )?;

        let entries = stmt
            .query_map(params![tracking_no], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ScanLogEntry> {
    let ts: String = row.get(1)?;
    let result: String = row.get(4)?;
    Ok(ScanLogEntry {
        log_id: row.get(0)?,
        scanned_at: NaiveDateTime::parse_from_str(&ts, TS_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        barcode: row.get(2)?,
        tracking_no: row.get(3)?,
        result: parse_result_kind(&result),
        message: row.get(5)?,
    })
}

fn parse_result_kind(value: &str) -> ScanResultKind {
    match value {
        "SUCCESS" => ScanResultKind::Success,
        "NOT_FOUND" => ScanResultKind::NotFound,
        "ALREADY_USED" => ScanResultKind::AlreadyUsed,
        "IGNORED" => ScanResultKind::Ignored,
        _ => ScanResultKind::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn test_insert_and_query() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = ScanLogRepository::new(Arc::new(Mutex::new(conn)));

        repo.insert(&ScanLogEntry::now(
            "A",
            Some("T1".to_string()),
            ScanResultKind::Success,
            "ok",
        ))
        .unwrap();
        repo.insert(&ScanLogEntry::now("Z", None, ScanResultKind::NotFound, "unknown"))
            .unwrap();

        let recent = repo.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].barcode, "Z");
        assert_eq!(recent[0].result, ScanResultKind::NotFound);

        let t1 = repo.list_by_tracking_no("T1").unwrap();
        assert_eq!(t1.len(), 1);
        assert_eq!(t1[0].result, ScanResultKind::Success);
    }
}

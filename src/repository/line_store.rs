// ==========================================
// 出库扫码匹配系统 - 发货明细状态存储
// ==========================================
// 职责: shipment_line 表读写(回写 scanned_qty/used, 断点续扫)
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::shipment::{LineChange, OrderRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct ShipmentLineStore {
    conn: Arc<Mutex<Connection>>,
}

impl ShipmentLineStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 以内存仓储的当前内容整体替换 shipment_line
    ///
    /// # 返回
    /// - `Ok(rows)`: 写入行数
    pub fn replace_all(&self, repo: &OrderRepository) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM shipment_line", [])?;

        let mut seq: i64 = 0;
        for shipment in repo.shipments() {
            for line in shipment.lines() {
                tx.execute(
                    r#"
                    INSERT INTO shipment_line (
                        tracking_no, barcode, line_seq, product_name, option_name,
                        qty, scanned_qty, used
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        shipment.tracking_no(),
                        line.barcode(),
                        seq,
                        line.product_name(),
                        line.option_name(),
                        line.required_qty(),
                        line.scanned_qty(),
                        shipment.is_used(),
                    ],
                )?;
                seq += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(seq as usize)
    }

    /// 回写变更行的 scanned_qty/used
    pub fn update_lines(&self, changes: &[LineChange]) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        for change in changes {
            let affected = tx.execute(
                r#"
                UPDATE shipment_line
                SET scanned_qty = ?1, used = ?2, updated_at = datetime('now')
                WHERE tracking_no = ?3 AND barcode = ?4
                "#,
                params![
                    change.scanned_qty,
                    change.used,
                    change.tracking_no,
                    change.barcode
                ],
            )?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "shipment_line".to_string(),
                    id: format!("{}/{}", change.tracking_no, change.barcode),
                });
            }
            count += affected;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// 标记整张发货单为已使用
    pub fn mark_used(&self, tracking_no: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE shipment_line
            SET used = 1, scanned_qty = qty, updated_at = datetime('now')
            WHERE tracking_no = ?1
            "#,
            params![tracking_no],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "shipment_line".to_string(),
                id: tracking_no.to_string(),
            });
        }
        Ok(affected)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 读取全部行(按写入顺序),用于断点续扫
    pub fn load_rows(&self) -> RepositoryResult<Vec<OrderRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT tracking_no, barcode, product_name, option_name, qty, scanned_qty, used, line_seq
            FROM shipment_line
            ORDER BY line_seq
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                let seq: i64 = row.get(7)?;
                Ok(OrderRow {
                    tracking_no: row.get(0)?,
                    barcode: row.get(1)?,
                    product_name: row.get(2)?,
                    option_name: row.get(3)?,
                    qty: row.get(4)?,
                    scanned_qty: row.get(5)?,
                    used: row.get(6)?,
                    row_number: seq as usize + 1,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM shipment_line", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ShipmentLineStore {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ShipmentLineStore::new(Arc::new(Mutex::new(conn)))
    }

    fn row(tracking_no: &str, barcode: &str, qty: u32) -> OrderRow {
        OrderRow {
            tracking_no: tracking_no.to_string(),
            barcode: barcode.to_string(),
            product_name: "P".to_string(),
            option_name: "O".to_string(),
            qty,
            scanned_qty: 0,
            used: false,
            row_number: 0,
        }
    }

    #[test]
    fn test_replace_and_reload_keeps_progress() {
        let store = setup();
        let mut repo =
            OrderRepository::from_rows(vec![row("T2", "A", 2), row("T1", "B", 1)]).unwrap();
        assert_eq!(store.replace_all(&repo).unwrap(), 2);

        repo.apply_scan("T1", "B").unwrap();
        repo.mark_used("T1").unwrap();
        let changes = repo.shipment("T1").unwrap().line_changes();
        assert_eq!(store.update_lines(&changes).unwrap(), 1);

        let rows = store.load_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tracking_no, "T2");
        assert_eq!(rows[1].scanned_qty, 1);
        assert!(rows[1].used);

        let restored = OrderRepository::from_rows(rows).unwrap();
        assert!(restored.shipment("T1").unwrap().is_used());
    }

    #[test]
    fn test_mark_used_fills_all_lines() {
        let store = setup();
        let repo =
            OrderRepository::from_rows(vec![row("T1", "A", 2), row("T1", "B", 1)]).unwrap();
        store.replace_all(&repo).unwrap();

        assert_eq!(store.mark_used("T1").unwrap(), 2);
        let rows = store.load_rows().unwrap();
        assert!(rows.iter().all(|r| r.used && r.scanned_qty == r.qty));
        assert!(store.mark_used("T9").is_err());
    }

    #[test]
    fn test_update_unknown_line_fails() {
        let store = setup();
        let change = LineChange {
            tracking_no: "T9".to_string(),
            barcode: "X".to_string(),
            scanned_qty: 1,
            used: false,
        };
        assert!(matches!(
            store.update_lines(&[change]),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}

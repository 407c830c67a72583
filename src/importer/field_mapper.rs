// ==========================================
// 出库扫码匹配系统 - 字段映射器实现
// ==========================================
// 职责: 源列名 → 标准字段映射 + 类型转换
// 标准字段: tracking_no, barcode, product_name, option_name, qty
// 可选字段: scanned_qty, used (上次运行回写的进度)
// ==========================================

use crate::domain::shipment::OrderRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRecord;
use std::collections::HashMap;

/// 必需的标准字段
pub const REQUIRED_FIELDS: [&str; 5] = ["tracking_no", "barcode", "product_name", "option_name", "qty"];

pub struct FieldMapper;

impl FieldMapper {
    /// 列名别名(按优先级)
    fn aliases(key: &str) -> &'static [&'static str] {
        match key {
            "tracking_no" => &["tracking_no", "송장번호"],
            "barcode" => &["barcode", "바코드"],
            "product_name" => &["product_name", "상품명"],
            "option_name" => &["option_name", "옵션명"],
            // 상품수량 优先, 주문수량 仅在前者缺失时使用
            "qty" => &["qty", "상품수량", "주문수량"],
            "scanned_qty" => &["scanned_qty", "스캔수량"],
            "used" => &["used"],
            _ => &[],
        }
    }

    /// 校验表头是否覆盖全部必需字段
    pub fn check_headers(&self, headers: &[String]) -> ImportResult<()> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|key| {
                !Self::aliases(key)
                    .iter()
                    .any(|alias| headers.iter().any(|h| h == alias))
            })
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MissingColumns {
                missing,
                available: headers.to_vec(),
            })
        }
    }

    /// 原始记录 → OrderRow
    pub fn map_to_order_row(&self, record: &RawRecord) -> ImportResult<OrderRow> {
        let row = &record.fields;
        let row_number = record.row_number;

        let tracking_no = self.require_string(row, "tracking_no", row_number)?;
        let barcode = self.require_string(row, "barcode", row_number)?;
        let qty = match self.parse_count(row, "qty", row_number)? {
            Some(q) if q > 0 => q,
            Some(_) | None => {
                return Err(ImportError::TypeConversionError {
                    row: row_number,
                    field: "qty".to_string(),
                    message: "必须为正整数".to_string(),
                })
            }
        };

        let mut scanned_qty = self.parse_count(row, "scanned_qty", row_number)?.unwrap_or(0);
        if scanned_qty > qty {
            tracing::warn!(
                "scanned_qty 超过 qty,已截断: row={}, tracking_no={}, barcode={}, scanned={}, qty={}",
                row_number,
                tracking_no,
                barcode,
                scanned_qty,
                qty
            );
            scanned_qty = qty;
        }

        Ok(OrderRow {
            tracking_no,
            barcode,
            product_name: self.get_string(row, "product_name").unwrap_or_default(),
            option_name: self.get_string(row, "option_name").unwrap_or_default(),
            qty,
            scanned_qty,
            used: self.parse_flag(row, "used", row_number)?,
            row_number,
        })
    }

    /// 提取字符串字段; 空串视为缺失
    fn get_string(&self, row: &HashMap<String, String>, key: &str) -> Option<String> {
        for alias in Self::aliases(key) {
            if let Some(v) = row.get(*alias) {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }

    fn require_string(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<String> {
        self.get_string(row, key).ok_or_else(|| ImportError::EmptyField {
            row: row_number,
            field: key.to_string(),
        })
    }

    /// 解析非负整数; 接受 "2.0" 这类整数值的小数写法
    fn parse_count(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<Option<u32>> {
        let Some(value) = self.get_string(row, key) else {
            return Ok(None);
        };

        if let Ok(n) = value.parse::<u32>() {
            return Ok(Some(n));
        }

        let err = || ImportError::TypeConversionError {
            row: row_number,
            field: key.to_string(),
            message: format!("无法解析为非负整数: {}", value),
        };
        let f = value.parse::<f64>().map_err(|_| err())?;
        if f.fract() != 0.0 || f < 0.0 || f > u32::MAX as f64 {
            return Err(err());
        }
        Ok(Some(f as u32))
    }

    /// 解析标记字段(1/0/true/false),缺失为 false
    fn parse_flag(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<bool> {
        let Some(value) = self.get_string(row, key) else {
            return Ok(false);
        };
        match value.to_lowercase().as_str() {
            "1" | "1.0" | "true" => Ok(true),
            "0" | "0.0" | "false" => Ok(false),
            _ => Err(ImportError::TypeConversionError {
                row: row_number,
                field: key.to_string(),
                message: format!("无法解析为标记 (1/0/true/false): {}", value),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            row_number: 2,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_korean_headers_map() {
        let rec = record(&[
            ("송장번호", "684012345678"),
            ("바코드", "8801"),
            ("상품명", "텀블러"),
            ("옵션명", "블랙"),
            ("상품수량", "2.0"),
            ("주문수량", "5"),
        ]);

        let row = FieldMapper.map_to_order_row(&rec).unwrap();
        assert_eq!(row.tracking_no, "684012345678");
        assert_eq!(row.barcode, "8801");
        assert_eq!(row.product_name, "텀블러");
        assert_eq!(row.qty, 2);
        assert_eq!(row.scanned_qty, 0);
        assert!(!row.used);
    }

    #[test]
    fn test_order_qty_fallback() {
        let rec = record(&[("tracking_no", "T1"), ("barcode", "A"), ("주문수량", "3")]);
        assert_eq!(FieldMapper.map_to_order_row(&rec).unwrap().qty, 3);
    }

    #[test]
    fn test_invalid_qty_rejected() {
        for bad in ["0", "-1", "1.5", "abc"] {
            let rec = record(&[("tracking_no", "T1"), ("barcode", "A"), ("qty", bad)]);
            assert!(
                matches!(
                    FieldMapper.map_to_order_row(&rec),
                    Err(ImportError::TypeConversionError { .. })
                ),
                "qty={}",
                bad
            );
        }
    }

    #[test]
    fn test_progress_fields() {
        let rec = record(&[
            ("tracking_no", "T1"),
            ("barcode", "A"),
            ("qty", "2"),
            ("scanned_qty", "5"),
            ("used", "TRUE"),
        ]);
        let row = FieldMapper.map_to_order_row(&rec).unwrap();
        assert_eq!(row.scanned_qty, 2);
        assert!(row.used);
    }

    #[test]
    fn test_empty_barcode_rejected() {
        let rec = record(&[("tracking_no", "T1"), ("barcode", " "), ("qty", "1")]);
        assert!(matches!(
            FieldMapper.map_to_order_row(&rec),
            Err(ImportError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_missing_columns() {
        let headers = vec!["송장번호".to_string(), "바코드".to_string(), "상품명".to_string()];
        match FieldMapper.check_headers(&headers) {
            Err(ImportError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["option_name".to_string(), "qty".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let full: Vec<String> = REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect();
        assert!(FieldMapper.check_headers(&full).is_ok());
    }
}

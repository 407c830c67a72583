// ==========================================
// 出库扫码匹配系统 - 数据集回写
// ==========================================
// 输出: CSV,每个明细行一行,附带 scanned_qty/used
// 默认文件名: {原文件名}_matched.csv
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::repository::order_repo::OrderRepository;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    tracking_no: &'a str,
    barcode: &'a str,
    product_name: &'a str,
    option_name: &'a str,
    qty: u32,
    scanned_qty: u32,
    used: u8,
}

/// 默认导出路径(与输入同目录)
pub fn default_export_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    input.with_file_name(format!("{}_matched.csv", stem))
}

/// 导出全部明细行
///
/// # 返回
/// - `Ok(rows)`: 写入行数
pub fn export_csv(repo: &OrderRepository, output: &Path) -> ImportResult<usize> {
    let mut writer = csv::Writer::from_path(output)
        .map_err(|e| ImportError::FileWriteError(format!("{}: {}", output.display(), e)))?;

    let mut count = 0;
    for shipment in repo.shipments() {
        for line in shipment.lines() {
            writer.serialize(ExportRow {
                tracking_no: shipment.tracking_no(),
                barcode: line.barcode(),
                product_name: line.product_name(),
                option_name: line.option_name(),
                qty: line.required_qty(),
                scanned_qty: line.scanned_qty(),
                used: u8::from(shipment.is_used()),
            })?;
            count += 1;
        }
    }

    writer
        .flush()
        .map_err(|e| ImportError::FileWriteError(e.to_string()))?;

    tracing::info!("数据集已导出: file={}, rows={}", output.display(), count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::dataset_loader::load_repository;

    #[test]
    fn test_default_export_path() {
        assert_eq!(
            default_export_path(Path::new("/data/orders.xlsx")),
            PathBuf::from("/data/orders_matched.csv")
        );
    }

    #[test]
    fn test_export_then_reload_keeps_progress() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("orders.csv");
        std::fs::write(
            &input,
            "송장번호,바코드,상품명,옵션명,상품수량\nT1,A,P,,1\nT2,A,P,,1\nT2,B,Q,,2\n",
        )
        .unwrap();

        let mut repo = load_repository(&input).unwrap();
        repo.apply_scan("T1", "A").unwrap();
        repo.mark_used("T1").unwrap();
        repo.apply_scan("T2", "B").unwrap();

        let output = default_export_path(&input);
        assert_eq!(export_csv(&repo, &output).unwrap(), 3);

        let reloaded = load_repository(&output).unwrap();
        assert!(reloaded.shipment("T1").unwrap().is_used());
        assert_eq!(reloaded.shipment("T2").unwrap().line("B").unwrap().scanned_qty(), 1);
    }
}

// ==========================================
// 数据集导入/导出集成测试
// ==========================================

mod test_helpers;

use shipment_scan_matcher::importer::{
    default_export_path, export_csv, load_repository, load_rows, ImportError,
};
use shipment_scan_matcher::ShipmentState;
use tempfile::TempDir;
use test_helpers::*;

#[test]
fn test_load_korean_headers() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(
        &dir,
        "주문.csv",
        "송장번호,바코드,상품명,옵션명,상품수량,주문수량",
        &["600000000001,8800000000001,녹차,100g,2,9", "600000000002,8800000000001,녹차,100g,1,9"],
    );

    let rows = load_rows(&path).unwrap();
    assert_eq!(rows.len(), 2);
    // 상품수량 优先于 주문수량
    assert_eq!(rows[0].qty, 2);
    assert_eq!(rows[0].tracking_no, "600000000001");
    assert_eq!(rows[0].option_name, "100g");
    assert_eq!(rows[0].row_number, 2);
}

#[test]
fn test_order_qty_fallback() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(
        &dir,
        "fallback.csv",
        "송장번호,바코드,상품명,옵션명,주문수량",
        &["T1,A,Apple,,3"],
    );

    let repo = load_repository(&path).unwrap();
    assert_eq!(repo.shipment("T1").unwrap().total_qty(), 3);
}

#[test]
fn test_missing_columns_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, "bad.csv", "tracking_no,barcode,qty", &["T1,A,1"]);

    match load_rows(&path) {
        Err(ImportError::MissingColumns { missing, .. }) => {
            assert!(missing.contains(&"product_name".to_string()));
            assert!(missing.contains(&"option_name".to_string()));
        }
        other => panic!("应为 MissingColumns, 实际: {:?}", other),
    }
}

#[test]
fn test_header_only_file_is_empty_dataset() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, "empty.csv", STANDARD_HEADER, &[]);
    assert!(matches!(load_rows(&path), Err(ImportError::EmptyDataset(_))));
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, "orders.txt", STANDARD_HEADER, SAMPLE_ROWS);
    assert!(matches!(
        load_rows(&path),
        Err(ImportError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_export_then_reload_keeps_progress() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(
        &dir,
        "orders.csv",
        "tracking_no,barcode,product_name,option_name,qty,scanned_qty,used",
        &["T1,A,Apple,Red,1,1,1", "T2,A,Apple,Red,1,0,0", "T2,B,Banana,,2,1,0"],
    );

    let repo = load_repository(&path).unwrap();
    assert_eq!(repo.shipment("T1").unwrap().state(), ShipmentState::Used);
    assert_eq!(repo.shipment("T2").unwrap().state(), ShipmentState::Filling);

    let output = default_export_path(&path);
    assert!(output.ends_with("orders_matched.csv"));
    assert_eq!(export_csv(&repo, &output).unwrap(), 3);

    let reloaded = load_repository(&output).unwrap();
    let t2 = reloaded.shipment("T2").unwrap();
    assert_eq!(t2.total_scanned(), 1);
    assert_eq!(t2.line("B").unwrap().scanned_qty(), 1);
    assert!(reloaded.shipment("T1").unwrap().is_used());
}

// ==========================================
// 出库扫码匹配系统 - 数据集加载器
// ==========================================
// 流程:
// 1) 文件解析 (CSV/Excel)
// 2) 表头校验 (别名)
// 3) 字段映射与类型转换 → OrderRow
// 4) 按 tracking_no 分组 → OrderRepository
// ==========================================

use crate::domain::shipment::OrderRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::repository::order_repo::OrderRepository;
use std::path::Path;

/// 读取数据集文件为行
pub fn load_rows<P: AsRef<Path>>(file_path: P) -> ImportResult<Vec<OrderRow>> {
    let path = file_path.as_ref();
    let table = UniversalFileParser.parse(path)?;

    let mapper = FieldMapper;
    mapper.check_headers(&table.headers)?;

    let rows = table
        .records
        .iter()
        .map(|record| mapper.map_to_order_row(record))
        .collect::<ImportResult<Vec<_>>>()?;

    if rows.is_empty() {
        return Err(ImportError::EmptyDataset(path.display().to_string()));
    }

    tracing::info!("数据集已读取: file={}, rows={}", path.display(), rows.len());
    Ok(rows)
}

/// 读取数据集文件并构建仓储
pub fn load_repository<P: AsRef<Path>>(file_path: P) -> ImportResult<OrderRepository> {
    let rows = load_rows(file_path)?;
    Ok(OrderRepository::from_rows(rows)?)
}

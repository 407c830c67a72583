// ==========================================
// 出库扫码匹配系统 - 导入层
// ==========================================
// 职责: 数据集文件 ↔ 发货单仓储
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

pub mod dataset_loader;
pub mod dataset_writer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

// 重导出核心类型
pub use dataset_loader::{load_repository, load_rows};
pub use dataset_writer::{default_export_path, export_csv};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapper, REQUIRED_FIELDS};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, RawTable, UniversalFileParser};

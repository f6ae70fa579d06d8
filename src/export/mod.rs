pub mod csv_export;
pub mod xlsx_export;

use std::path::Path;

use crate::error::ExportError;
use crate::models::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Writes the table to `path`; the extension selects the format.
pub fn export_table(table: &Table, path: &Path) -> Result<(), ExportError> {
    match ExportFormat::from_path(path) {
        Some(ExportFormat::Xlsx) => xlsx_export::export_to_xlsx(table, path),
        Some(ExportFormat::Csv) => csv_export::export_to_csv(table, path),
        None => Err(ExportError::UnsupportedFormat(path.display().to_string())),
    }
}

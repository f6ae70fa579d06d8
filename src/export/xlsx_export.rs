use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};

use crate::error::ExportError;
use crate::models::{Cell, Table};

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

impl From<XlsxError> for ExportError {
    fn from(e: XlsxError) -> Self {
        ExportError::Xlsx(e.to_string())
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn header_format() -> Format {
    Format::new().set_bold().set_align(FormatAlign::Center)
}

fn header_fill_format() -> Format {
    header_format().set_background_color(Color::RGB(0xF2F2F2))
}

/// Header row, then one row per record in table order. Dates are written as
/// `YYYY-MM-DD` text; empty cells are left blank.
fn write_table_sheet(ws: &mut Worksheet, table: &Table) -> Result<(), ExportError> {
    let hfmt = header_fill_format();
    for (c, h) in table.columns.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, h, &hfmt)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let col = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    ws.write_string(r, col, s)?;
                }
                Cell::Number(n) => {
                    ws.write_number(r, col, *n)?;
                }
                Cell::Bool(b) => {
                    ws.write_boolean(r, col, *b)?;
                }
                Cell::Date(_) => {
                    ws.write_string(r, col, cell.to_string())?;
                }
            }
        }
    }
    if !table.columns.is_empty() {
        ws.set_freeze_panes(1, 0)?;
    }
    Ok(())
}

fn build_workbook(table: &Table, sheet_name: &str) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name(sheet_name)?;
    write_table_sheet(ws, table)?;
    Ok(workbook)
}

/// Serializes the table to xlsx bytes, for callers that stream the artifact.
pub fn to_xlsx_bytes(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(table, DEFAULT_SHEET_NAME)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn export_to_xlsx(table: &Table, path: &Path) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let mut workbook = build_workbook(table, DEFAULT_SHEET_NAME)?;
    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::read_table_from_bytes;
    use chrono::NaiveDate;

    fn sample() -> Table {
        let mut t = Table::new(vec![
            "正規化顧客名".into(),
            "顧客名".into(),
            "日付".into(),
            "件数".into(),
            "済".into(),
        ]);
        t.push_row(vec![
            Cell::text("田中太郎"),
            Cell::text("田中"),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
            Cell::Number(3.0),
            Cell::Bool(true),
        ]);
        t.push_row(vec![
            Cell::text("山本"),
            Cell::text("山本"),
            Cell::Empty,
            Cell::Number(1.5),
            Cell::Bool(false),
        ]);
        t
    }

    #[test]
    fn xlsx_round_trip_preserves_cells_and_order() {
        let t = sample();
        let bytes = to_xlsx_bytes(&t).unwrap();
        let back = read_table_from_bytes("out.xlsx", bytes).unwrap();
        assert_eq!(back.columns, t.columns);
        assert_eq!(back.len(), 2);
        // dates come back as their ISO text
        assert_eq!(back.rows[0][2], Cell::text("2024-01-10"));
        assert_eq!(back.rows[0][3], Cell::Number(3.0));
        assert_eq!(back.rows[0][4], Cell::Bool(true));
        assert_eq!(back.rows[1][0], Cell::text("山本"));
        assert_eq!(back.rows[1][2], Cell::Empty);
        assert_eq!(back.rows[1][3], Cell::Number(1.5));
    }

    #[test]
    fn write_xlsx_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("正規化後_顧客データ.xlsx");
        export_to_xlsx(&sample(), &out).unwrap();
        let meta = std::fs::metadata(&out).unwrap();
        assert!(meta.len() > 0);
    }
}

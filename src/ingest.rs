//! Reads uploaded spreadsheets into [`Table`]s.
//!
//! Excel workbooks go through `calamine` (first worksheet only), CSV through `csv`.
//! Header cells that are blank become `Unnamed: N` and repeated headers get a `.1`,
//! `.2`, ... suffix so every column name in a table is unique.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xls, Xlsb, Xlsx};
use log::info;

use crate::error::TableError;
use crate::models::{Cell, SourceTable, Table};
use crate::normalize::parse_date_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Xlsx,
    Xls,
    Xlsb,
    Csv,
}

impl UploadFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "xlsb" => Some(Self::Xlsb),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

fn read_error(source_name: &str, reason: impl std::fmt::Display) -> TableError {
    TableError::Read {
        source_name: source_name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses an upload held in memory; `source_name` supplies the extension.
pub fn read_table_from_bytes(source_name: &str, bytes: Vec<u8>) -> Result<Table, TableError> {
    let format = UploadFormat::from_name(source_name)
        .ok_or_else(|| TableError::UnsupportedFormat(source_name.to_string()))?;
    match format {
        UploadFormat::Xlsx => read_workbook::<Xlsx<_>>(source_name, bytes),
        UploadFormat::Xls => read_workbook::<Xls<_>>(source_name, bytes),
        UploadFormat::Xlsb => read_workbook::<Xlsb<_>>(source_name, bytes),
        UploadFormat::Csv => read_csv(source_name, bytes.as_slice()),
    }
}

pub fn read_table(path: &Path) -> Result<Table, TableError> {
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| read_error(&name, e))?;
    read_table_from_bytes(&name, bytes)
}

/// Reads every upload in order. Any unreadable file aborts the batch.
pub fn read_sources(paths: &[PathBuf]) -> Result<Vec<SourceTable>, TableError> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let table = read_table(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("Uploaded {}: {} rows, {} columns", name, table.len(), table.columns.len());
        out.push(SourceTable { name, table });
    }
    Ok(out)
}

fn read_workbook<R>(source_name: &str, bytes: Vec<u8>) -> Result<Table, TableError>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let mut workbook = R::new(Cursor::new(bytes)).map_err(|e| read_error(source_name, e))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| read_error(source_name, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| read_error(source_name, e))?;

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| data_to_cell(c).to_string().trim().to_string())
        .collect();
    let mut table = Table::new(finalize_headers(headers));
    for row in rows_iter {
        let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn data_to_cell(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Cell::Date(ndt.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_date_str(s) {
            Some(date) => Cell::Date(date),
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

fn read_csv<R: Read>(source_name: &str, mut reader: R) -> Result<Table, TableError> {
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|e| read_error(source_name, e))?;
    let body = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&raw[..]);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| read_error(source_name, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(finalize_headers(headers));
    for record in rdr.records() {
        let record = record.map_err(|e| read_error(source_name, e))?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(v.to_string())
                }
            })
            .collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn finalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, h) in raw.into_iter().enumerate() {
        let base = if h.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            h
        };
        let mut name = base.clone();
        let mut n = 1;
        while out.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_upload_with_bom_and_blank_rows() {
        let text = "\u{feff}顧客名,日付,アクション\n田中,2024-01-10,訪問\n,,\n山本,,電話\n";
        let t = read_table_from_bytes("a.csv", text.as_bytes().to_vec()).unwrap();
        assert_eq!(t.columns, vec!["顧客名", "日付", "アクション"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows[1][0], Cell::text("山本"));
        assert_eq!(t.rows[1][1], Cell::Empty);
    }

    #[test]
    fn csv_short_rows_are_padded() {
        let text = "a,b,c\n1\n1,2,3\n";
        let t = read_table_from_bytes("x.CSV", text.as_bytes().to_vec()).unwrap();
        assert_eq!(t.rows[0], vec![Cell::text("1"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn headers_are_made_unique() {
        let h = finalize_headers(vec!["a".into(), "".into(), "a".into(), "a".into()]);
        assert_eq!(h, vec!["a", "Unnamed: 1", "a.1", "a.2"]);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_table_from_bytes("notes.txt", Vec::new()).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_workbook_is_a_read_error() {
        let err = read_table_from_bytes("broken.xlsx", b"not a zip".to_vec()).unwrap_err();
        assert!(matches!(err, TableError::Read { .. }));
    }
}

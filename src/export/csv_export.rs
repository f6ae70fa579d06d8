use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::error::ExportError;
use crate::export::xlsx_export::ensure_parent_dir;
use crate::models::Table;
use crate::orchestrator::summary::RunSummary;

// Excel only detects UTF-8 in CSV files that start with a BOM.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn csv_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Csv(e.to_string())
}

pub fn write_csv<W: Write>(table: &Table, out: W) -> Result<(), ExportError> {
    let mut w = WriterBuilder::new().from_writer(out);
    w.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        w.write_record(row.iter().map(|c| c.to_string()))
            .map_err(csv_err)?;
    }
    w.flush()?;
    Ok(())
}

pub fn export_to_csv(table: &Table, path: &Path) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    let mut buf_writer = BufWriter::with_capacity(512 * 1024, file);
    buf_writer.write_all(UTF8_BOM)?;
    write_csv(table, buf_writer)
}

fn write_summary<W: Write>(w: &mut Writer<W>, summary: &RunSummary) -> Result<(), ExportError> {
    w.write_record(["Metric", "Value"]).map_err(csv_err)?;
    for (k, v) in summary.rows() {
        w.write_record([k.as_str(), v.as_str()]).map_err(csv_err)?;
    }
    Ok(())
}

pub fn export_summary_csv(path: &Path, summary: &RunSummary) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    let mut buf_writer = BufWriter::new(file);
    buf_writer.write_all(UTF8_BOM)?;
    let mut w = WriterBuilder::new().from_writer(buf_writer);
    write_summary(&mut w, summary)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::read_table;
    use crate::models::Cell;
    use chrono::NaiveDate;

    #[test]
    fn csv_export_reads_back_as_text() {
        let mut t = Table::new(vec!["正規化顧客名".into(), "日付".into(), "メモ".into()]);
        t.push_row(vec![
            Cell::text("田中太郎"),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
            Cell::text("a, \"b\""),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_to_csv(&t, &path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(UTF8_BOM));

        let back = read_table(&path).unwrap();
        assert_eq!(back.columns, t.columns);
        assert_eq!(
            back.rows[0],
            vec![
                Cell::text("田中太郎"),
                Cell::text("2024-01-10"),
                Cell::text("a, \"b\"")
            ]
        );
    }

    #[test]
    fn in_memory_writer_has_no_bom() {
        let mut t = Table::new(vec!["a".into()]);
        t.push_row(vec![Cell::Number(2.0)]);
        let mut buf = Vec::new();
        write_csv(&t, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a\n2\n");
    }
}

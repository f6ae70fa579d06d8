use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of an uploaded or exported table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Blank strings count as empty, like a spreadsheet reader would report them.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed display form, or `None` for empty cells.
    pub fn as_key(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A rectangular table: a header row plus data rows of the same width.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A parsed upload together with the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub name: String,
    pub table: Table,
}

/// Result of coercing a record's date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercedDate {
    Date(NaiveDate),
    Unparseable,
    Missing,
}

impl CoercedDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            CoercedDate::Date(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub canonical_name: String,
    pub date: CoercedDate,
    /// Original cells, aligned with `NormalizedTable::columns`.
    pub cells: Vec<Cell>,
}

/// Where the canonical-name column is placed in exported views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalPlacement {
    #[default]
    First,
    Last,
}

/// Column labels the stages look up by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub name: String,
    pub date: String,
    pub action: String,
    pub canonical: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            name: "顧客名".into(),
            date: "日付".into(),
            action: "アクション".into(),
            canonical: "正規化顧客名".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub mapping: ColumnMapping,
    pub placement: CanonicalPlacement,
    pub records: Vec<NormalizedRecord>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Same columns and settings, different record set.
    pub fn with_records(&self, records: Vec<NormalizedRecord>) -> Self {
        Self {
            columns: self.columns.clone(),
            mapping: self.mapping.clone(),
            placement: self.placement,
            records,
        }
    }

    /// Flattens into an exportable table with the canonical column placed per `placement`
    /// and parsed dates written back as dates.
    pub fn to_table(&self) -> Table {
        let date_idx = self.column_index(&self.mapping.date);
        let mut columns = self.columns.clone();
        match self.placement {
            CanonicalPlacement::First => columns.insert(0, self.mapping.canonical.clone()),
            CanonicalPlacement::Last => columns.push(self.mapping.canonical.clone()),
        }
        let mut out = Table::new(columns);
        for rec in &self.records {
            let mut cells = rec.cells.clone();
            if let (Some(i), CoercedDate::Date(d)) = (date_idx, rec.date) {
                if let Some(c) = cells.get_mut(i) {
                    *c = Cell::Date(d);
                }
            }
            let canonical = Cell::Text(rec.canonical_name.clone());
            match self.placement {
                CanonicalPlacement::First => cells.insert(0, canonical),
                CanonicalPlacement::Last => cells.push(canonical),
            }
            out.push_row(cells);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_display_and_keys() {
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
        assert_eq!(Cell::text("  visit ").as_key().as_deref(), Some("visit"));
        assert_eq!(Cell::text("   ").as_key(), None);
        assert!(Cell::Empty.is_empty());
        let d = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(Cell::Date(d).to_string(), "2024-01-10");
    }

    #[test]
    fn push_row_pads_to_header_width() {
        let mut t = Table::new(vec!["a".into(), "b".into(), "c".into()]);
        t.push_row(vec![Cell::text("x")]);
        assert_eq!(t.rows[0], vec![Cell::text("x"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn to_table_honors_placement() {
        let mapping = ColumnMapping::default();
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut nt = NormalizedTable {
            columns: vec![mapping.name.clone(), mapping.date.clone()],
            mapping: mapping.clone(),
            placement: CanonicalPlacement::First,
            records: vec![NormalizedRecord {
                canonical_name: "田中太郎".into(),
                date: CoercedDate::Date(d),
                cells: vec![Cell::text("田中"), Cell::text("2024/02/01")],
            }],
        };
        let first = nt.to_table();
        assert_eq!(first.columns[0], mapping.canonical);
        assert_eq!(first.rows[0][0], Cell::text("田中太郎"));
        assert_eq!(first.rows[0][2], Cell::Date(d));

        nt.placement = CanonicalPlacement::Last;
        let last = nt.to_table();
        assert_eq!(last.columns.last(), Some(&mapping.canonical));
        assert_eq!(last.rows[0][0], Cell::text("田中"));
    }
}

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::models::{Cell, SourceTable, Table};

/// How differing column sets across uploads are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Union of all columns in first-seen order; absent cells are empty.
    #[default]
    Union,
    /// Every upload must carry the same column set as the first one.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub table: Table,
    /// (upload name, row count) in upload order.
    pub sources: Vec<(String, usize)>,
}

/// Concatenates uploads in order. Rows are neither reordered nor deduplicated.
pub fn merge_tables(
    sources: Vec<SourceTable>,
    policy: MergePolicy,
) -> Result<MergedTable, TableError> {
    let mut columns: Vec<String> = Vec::new();
    match policy {
        MergePolicy::Union => {
            for src in &sources {
                for c in &src.table.columns {
                    if !columns.contains(c) {
                        columns.push(c.clone());
                    }
                }
            }
        }
        MergePolicy::Strict => {
            if let Some(first) = sources.first() {
                columns = first.table.columns.clone();
                let expected: BTreeSet<&String> = columns.iter().collect();
                for src in sources.iter().skip(1) {
                    let found: BTreeSet<&String> = src.table.columns.iter().collect();
                    if found != expected {
                        return Err(TableError::SchemaMismatch {
                            source_name: src.name.clone(),
                            expected: columns.clone(),
                            found: src.table.columns.clone(),
                        });
                    }
                }
            }
        }
    }

    let total_rows: usize = sources.iter().map(|s| s.table.len()).sum();
    let mut table = Table::new(columns);
    table.rows.reserve(total_rows);
    let mut counts = Vec::with_capacity(sources.len());
    for src in sources {
        // position of each source column in the merged header
        let positions: Vec<Option<usize>> = src
            .table
            .columns
            .iter()
            .map(|c| table.column_index(c))
            .collect();
        let n = src.table.rows.len();
        for row in src.table.rows {
            let mut merged = vec![Cell::Empty; table.columns.len()];
            for (cell, pos) in row.into_iter().zip(&positions) {
                if let Some(p) = pos {
                    merged[*p] = cell;
                }
            }
            table.rows.push(merged);
        }
        debug!("merged {} rows from {}", n, src.name);
        counts.push((src.name, n));
    }
    Ok(MergedTable {
        table,
        sources: counts,
    })
}

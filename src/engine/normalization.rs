use std::collections::BTreeSet;

use log::{debug, info};
use rayon::prelude::*;

use crate::dictionary::NormalizationDictionary;
use crate::error::TableError;
use crate::matching::{MatchOptions, NameResolver, Resolution};
use crate::models::{
    CanonicalPlacement, CoercedDate, ColumnMapping, NormalizedRecord, NormalizedTable, Table,
};
use crate::normalize::coerce_date;

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub mapping: ColumnMapping,
    pub placement: CanonicalPlacement,
    pub matching: MatchOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub empty: usize,
    pub dictionary: usize,
    pub fuzzy: usize,
    pub unmatched: usize,
    pub unparseable_dates: usize,
}

#[derive(Debug, Clone)]
pub struct NormalizationOutput {
    pub table: NormalizedTable,
    /// Distinct whitespace-normalized names that neither hit the dictionary nor
    /// reached the fuzzy threshold.
    pub unmatched: BTreeSet<String>,
    pub stats: ResolutionStats,
}

/// Resolves every record's customer name and coerces its date.
///
/// Fails without producing anything when the name column is absent. A canonical
/// column already present in the input (e.g. a re-uploaded export) is dropped and
/// recomputed.
pub fn normalize_table(
    mut table: Table,
    dictionary: &NormalizationDictionary,
    opts: &NormalizeOptions,
) -> Result<NormalizationOutput, TableError> {
    let mapping = &opts.mapping;
    if let Some(stale) = table.column_index(&mapping.canonical) {
        debug!("dropping existing '{}' column before normalization", mapping.canonical);
        table.columns.remove(stale);
        for row in &mut table.rows {
            if stale < row.len() {
                row.remove(stale);
            }
        }
    }
    let name_idx = table
        .column_index(&mapping.name)
        .ok_or_else(|| TableError::MissingColumn {
            column: mapping.name.clone(),
        })?;
    let date_idx = table.column_index(&mapping.date);

    let resolver = NameResolver::new(dictionary, opts.matching);
    let resolved: Vec<(NormalizedRecord, String, Resolution)> = table
        .rows
        .into_par_iter()
        .map(|cells| {
            let observed = cells.get(name_idx).and_then(|c| c.as_key());
            let r = resolver.resolve(observed.as_deref());
            let date = coerce_date(date_idx.and_then(|i| cells.get(i)));
            (
                NormalizedRecord {
                    canonical_name: r.canonical,
                    date,
                    cells,
                },
                r.normalized,
                r.resolution,
            )
        })
        .collect();

    let mut stats = ResolutionStats::default();
    let mut unmatched = BTreeSet::new();
    let mut records = Vec::with_capacity(resolved.len());
    for (rec, normalized, resolution) in resolved {
        match resolution {
            Resolution::Empty => stats.empty += 1,
            Resolution::Dictionary => stats.dictionary += 1,
            Resolution::Fuzzy { .. } => stats.fuzzy += 1,
            Resolution::Unmatched { .. } => {
                stats.unmatched += 1;
                unmatched.insert(normalized);
            }
        }
        if rec.date == CoercedDate::Unparseable {
            stats.unparseable_dates += 1;
        }
        records.push(rec);
    }
    info!(
        "Normalized {} records ({} scorer, threshold {}): {} dictionary, {} fuzzy, {} unmatched, {} empty",
        records.len(),
        resolver.options().scorer.as_str(),
        resolver.options().threshold,
        stats.dictionary,
        stats.fuzzy,
        stats.unmatched,
        stats.empty
    );

    Ok(NormalizationOutput {
        table: NormalizedTable {
            columns: table.columns,
            mapping: mapping.clone(),
            placement: opts.placement,
            records,
        },
        unmatched,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::merge::{MergePolicy, merge_tables};
    use crate::models::{Cell, SourceTable};
    use chrono::NaiveDate;

    fn names_table(names: &[Option<&str>]) -> Table {
        let m = ColumnMapping::default();
        let mut t = Table::new(vec![m.name.clone(), m.date.clone()]);
        for n in names {
            let c = n.map(Cell::text).unwrap_or(Cell::Empty);
            t.push_row(vec![c, Cell::text("2024-01-10")]);
        }
        t
    }

    fn dict() -> NormalizationDictionary {
        NormalizationDictionary::from_pairs([("田中", "田中太郎")])
    }

    #[test]
    fn unmatched_names_are_reported() {
        let t = names_table(&[Some("田中"), Some("田中　太郎"), Some("山本"), None]);
        let out = normalize_table(t, &dict(), &NormalizeOptions::default()).unwrap();
        let canon: Vec<&str> = out
            .table
            .records
            .iter()
            .map(|r| r.canonical_name.as_str())
            .collect();
        assert_eq!(canon, vec!["田中太郎", "田中太郎", "山本", ""]);
        assert_eq!(out.unmatched, BTreeSet::from(["山本".to_string()]));
        assert_eq!(out.stats.dictionary, 1);
        assert_eq!(out.stats.fuzzy, 1);
        assert_eq!(out.stats.empty, 1);
    }

    #[test]
    fn missing_name_column_is_fatal() {
        let t = Table::new(vec!["名前".into()]);
        let err = normalize_table(t, &dict(), &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn { ref column } if column == "顧客名"));
    }

    #[test]
    fn dates_are_coerced_with_sentinel() {
        let m = ColumnMapping::default();
        let mut t = Table::new(vec![m.name.clone(), m.date.clone()]);
        t.push_row(vec![Cell::text("田中"), Cell::text("2024/03/05")]);
        t.push_row(vec![Cell::text("田中"), Cell::text("来週")]);
        t.push_row(vec![Cell::text("田中"), Cell::Empty]);
        let out = normalize_table(t, &dict(), &NormalizeOptions::default()).unwrap();
        let dates: Vec<CoercedDate> = out.table.records.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                CoercedDate::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
                CoercedDate::Unparseable,
                CoercedDate::Missing
            ]
        );
        assert_eq!(out.stats.unparseable_dates, 1);
        // the record is still present
        assert_eq!(out.table.len(), 3);
    }

    #[test]
    fn existing_canonical_column_is_recomputed() {
        let m = ColumnMapping::default();
        let mut t = Table::new(vec![m.canonical.clone(), m.name.clone()]);
        t.push_row(vec![Cell::text("古い値"), Cell::text("田中")]);
        let out = normalize_table(t, &dict(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.table.columns, vec![m.name.clone()]);
        assert_eq!(out.table.records[0].canonical_name, "田中太郎");
        assert_eq!(out.table.to_table().columns, vec![m.canonical, m.name]);
    }

    #[test]
    fn merge_then_normalize_matches_normalize_then_concat() {
        let a = names_table(&[Some("田中"), Some("山本")]);
        let b = names_table(&[Some("佐藤"), Some("田中　太郎")]);
        let opts = NormalizeOptions::default();

        let merged = merge_tables(
            vec![
                SourceTable { name: "a".into(), table: a.clone() },
                SourceTable { name: "b".into(), table: b.clone() },
            ],
            MergePolicy::Union,
        )
        .unwrap();
        let together = normalize_table(merged.table, &dict(), &opts).unwrap();

        let mut separate = normalize_table(a, &dict(), &opts).unwrap().table.records;
        separate.extend(normalize_table(b, &dict(), &opts).unwrap().table.records);
        assert_eq!(together.table.records, separate);
    }
}

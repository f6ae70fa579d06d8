use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{NormalizedRecord, NormalizedTable};

/// Inclusive on both ends; an open end does not constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start.is_none_or(|s| d >= s) && self.end.is_none_or(|e| d <= e)
    }
}

/// Predicates applied conjunctively. `None` means "not constrained", so
/// `FilterCriteria::default()` keeps every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub names: Option<BTreeSet<String>>,
    pub date_range: Option<DateRange>,
    pub actions: Option<BTreeSet<String>>,
}

impl FilterCriteria {
    /// Explicit selection of every observed canonical name, the observed date span,
    /// and every observed action: what a selection UI pre-populates.
    pub fn observed(table: &NormalizedTable) -> Self {
        let date_range = observed_span(table).map(|(s, e)| DateRange::between(s, e));
        Self {
            names: Some(observed_names(table)),
            date_range,
            actions: Some(observed_actions(table)),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.names.is_none() && self.date_range.is_none() && self.actions.is_none()
    }

    fn accepts(&self, rec: &NormalizedRecord, action_idx: Option<usize>) -> bool {
        if let Some(names) = &self.names {
            if !names.contains(&rec.canonical_name) {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            // unparseable or missing dates never fall inside a range
            match rec.date.date() {
                Some(d) if range.contains(d) => {}
                _ => return false,
            }
        }
        if let Some(actions) = &self.actions {
            let action = action_idx
                .and_then(|i| rec.cells.get(i))
                .and_then(|c| c.as_key());
            match action {
                Some(a) if actions.contains(&a) => {}
                _ => return false,
            }
        }
        true
    }
}

pub fn observed_names(table: &NormalizedTable) -> BTreeSet<String> {
    table
        .records
        .iter()
        .map(|r| r.canonical_name.clone())
        .collect()
}

/// Non-empty action values in the table.
pub fn observed_actions(table: &NormalizedTable) -> BTreeSet<String> {
    let Some(idx) = table.column_index(&table.mapping.action) else {
        return BTreeSet::new();
    };
    table
        .records
        .iter()
        .filter_map(|r| r.cells.get(idx).and_then(|c| c.as_key()))
        .collect()
}

/// Earliest and latest parseable dates, if any.
pub fn observed_span(table: &NormalizedTable) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = table.records.iter().filter_map(|r| r.date.date());
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// Keeps records satisfying every active predicate, in their original order.
pub fn filter_table(table: &NormalizedTable, criteria: &FilterCriteria) -> NormalizedTable {
    if criteria.is_unrestricted() {
        return table.clone();
    }
    let action_idx = table.column_index(&table.mapping.action);
    let kept = table
        .records
        .iter()
        .filter(|r| criteria.accepts(r, action_idx))
        .cloned()
        .collect();
    table.with_records(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalPlacement, Cell, CoercedDate, ColumnMapping};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(name: &str, date: CoercedDate, action: &str) -> NormalizedRecord {
        let action = if action.is_empty() {
            Cell::Empty
        } else {
            Cell::text(action)
        };
        NormalizedRecord {
            canonical_name: name.into(),
            date,
            cells: vec![Cell::text(name), Cell::Empty, action],
        }
    }

    fn table(records: Vec<NormalizedRecord>) -> NormalizedTable {
        let m = ColumnMapping::default();
        NormalizedTable {
            columns: vec![m.name.clone(), m.date.clone(), m.action.clone()],
            mapping: m,
            placement: CanonicalPlacement::First,
            records,
        }
    }

    fn sample() -> NormalizedTable {
        table(vec![
            rec("X", CoercedDate::Date(d(2024, 1, 10)), "visit"),
            rec("Y", CoercedDate::Date(d(2024, 2, 1)), "call"),
        ])
    }

    #[test]
    fn conjunctive_predicates() {
        let t = sample();
        let criteria = FilterCriteria {
            names: Some(BTreeSet::from(["X".to_string()])),
            date_range: Some(DateRange::between(d(2024, 1, 1), d(2024, 1, 31))),
            actions: Some(BTreeSet::from(["visit".to_string()])),
        };
        let out = filter_table(&t, &criteria);
        assert_eq!(out.records, vec![t.records[0].clone()]);
    }

    #[test]
    fn default_criteria_is_a_noop() {
        let mut t = sample();
        t.records.push(rec("Z", CoercedDate::Unparseable, ""));
        let out = filter_table(&t, &FilterCriteria::default());
        assert_eq!(out, t);
    }

    #[test]
    fn observed_criteria_keep_fully_populated_tables() {
        let t = sample();
        let criteria = FilterCriteria::observed(&t);
        assert_eq!(
            criteria.date_range,
            Some(DateRange::between(d(2024, 1, 10), d(2024, 2, 1)))
        );
        assert_eq!(filter_table(&t, &criteria), t);
    }

    #[test]
    fn range_is_inclusive_and_excludes_unparseable() {
        let t = table(vec![
            rec("X", CoercedDate::Date(d(2024, 1, 1)), "visit"),
            rec("X", CoercedDate::Date(d(2024, 1, 31)), "visit"),
            rec("X", CoercedDate::Date(d(2024, 2, 1)), "visit"),
            rec("X", CoercedDate::Unparseable, "visit"),
            rec("X", CoercedDate::Missing, "visit"),
        ]);
        let criteria = FilterCriteria {
            date_range: Some(DateRange::between(d(2024, 1, 1), d(2024, 1, 31))),
            ..Default::default()
        };
        let out = filter_table(&t, &criteria);
        assert_eq!(out.len(), 2);

        let open = FilterCriteria {
            date_range: Some(DateRange {
                start: Some(d(2024, 1, 31)),
                end: None,
            }),
            ..Default::default()
        };
        assert_eq!(filter_table(&t, &open).len(), 2);
    }

    #[test]
    fn action_filter_drops_blank_actions_and_keeps_order() {
        let t = table(vec![
            rec("A", CoercedDate::Missing, "call"),
            rec("B", CoercedDate::Missing, ""),
            rec("C", CoercedDate::Missing, "visit"),
            rec("D", CoercedDate::Missing, "call"),
        ]);
        let criteria = FilterCriteria {
            actions: Some(BTreeSet::from(["call".to_string(), "visit".to_string()])),
            ..Default::default()
        };
        let names: Vec<String> = filter_table(&t, &criteria)
            .records
            .into_iter()
            .map(|r| r.canonical_name)
            .collect();
        assert_eq!(names, vec!["A", "C", "D"]);
        assert_eq!(
            observed_actions(&t),
            BTreeSet::from(["call".to_string(), "visit".to_string()])
        );
    }

    #[test]
    fn empty_table_has_no_span() {
        let t = table(Vec::new());
        assert_eq!(observed_span(&t), None);
        assert_eq!(FilterCriteria::observed(&t).date_range, None);
    }
}

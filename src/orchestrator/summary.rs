//! Run summary reporting.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dictionary::DictionaryStatus;
use crate::engine::ResolutionStats;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dictionary_status: DictionaryStatus,
    pub dictionary_version: u64,
    pub standard_names: usize,

    /// (upload name, rows) in merge order.
    pub sources: Vec<(String, usize)>,
    pub total_rows: usize,
    pub stats: ResolutionStats,
    pub unmatched: BTreeSet<String>,
    pub filtered_rows: usize,

    pub normalized_path: PathBuf,
    pub filtered_path: PathBuf,

    pub load_time: Duration,
    pub normalize_time: Duration,
    pub export_time: Duration,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: DateTime<Utc>,
    pub duration_secs: f64,
}

impl RunSummary {
    pub fn files_merged(&self) -> usize {
        self.sources.len()
    }

    /// Flattened `(metric, value)` pairs for reports.
    pub fn rows(&self) -> Vec<(String, String)> {
        let dict = match &self.dictionary_status {
            DictionaryStatus::Loaded { entries } => format!("loaded ({} variants)", entries),
            DictionaryStatus::Unavailable { reason } => format!("unavailable: {}", reason),
        };
        let mut out = vec![
            ("dictionary".to_string(), dict),
            ("dictionary_version".into(), self.dictionary_version.to_string()),
            ("standard_names".into(), self.standard_names.to_string()),
            ("files_merged".into(), self.files_merged().to_string()),
        ];
        for (name, n) in &self.sources {
            out.push((format!("rows[{}]", name), n.to_string()));
        }
        out.extend([
            ("total_rows".to_string(), self.total_rows.to_string()),
            ("dictionary_hits".into(), self.stats.dictionary.to_string()),
            ("fuzzy_hits".into(), self.stats.fuzzy.to_string()),
            ("unmatched_rows".into(), self.stats.unmatched.to_string()),
            ("empty_names".into(), self.stats.empty.to_string()),
            ("unparseable_dates".into(), self.stats.unparseable_dates.to_string()),
            ("unmatched_names".into(), self.unmatched.len().to_string()),
            ("filtered_rows".into(), self.filtered_rows.to_string()),
            ("normalized_output".into(), self.normalized_path.display().to_string()),
            ("filtered_output".into(), self.filtered_path.display().to_string()),
            ("load_ms".into(), self.load_time.as_millis().to_string()),
            ("normalize_ms".into(), self.normalize_time.as_millis().to_string()),
            ("export_ms".into(), self.export_time.as_millis().to_string()),
            ("started_utc".into(), self.started_utc.to_rfc3339()),
            ("ended_utc".into(), self.ended_utc.to_rfc3339()),
            ("duration_secs".into(), format!("{:.3}", self.duration_secs)),
        ]);
        out
    }
}

/// Builder for RunSummary to simplify summary creation.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    dictionary_status: DictionaryStatus,
    dictionary_version: u64,
    standard_names: usize,
    sources: Vec<(String, usize)>,
    total_rows: usize,
    stats: ResolutionStats,
    unmatched: BTreeSet<String>,
    filtered_rows: usize,
    normalized_path: PathBuf,
    filtered_path: PathBuf,
    load_time: Duration,
    normalize_time: Duration,
    export_time: Duration,
    started_utc: DateTime<Utc>,
}

impl SummaryBuilder {
    pub fn new(started_utc: DateTime<Utc>) -> Self {
        Self {
            dictionary_status: DictionaryStatus::Unavailable {
                reason: "not loaded".into(),
            },
            dictionary_version: 0,
            standard_names: 0,
            sources: Vec::new(),
            total_rows: 0,
            stats: ResolutionStats::default(),
            unmatched: BTreeSet::new(),
            filtered_rows: 0,
            normalized_path: PathBuf::new(),
            filtered_path: PathBuf::new(),
            load_time: Duration::ZERO,
            normalize_time: Duration::ZERO,
            export_time: Duration::ZERO,
            started_utc,
        }
    }

    pub fn with_dictionary(mut self, status: DictionaryStatus, version: u64, standard_names: usize) -> Self {
        self.dictionary_status = status;
        self.dictionary_version = version;
        self.standard_names = standard_names;
        self
    }

    pub fn with_sources(mut self, sources: Vec<(String, usize)>) -> Self {
        self.total_rows = sources.iter().map(|(_, n)| n).sum();
        self.sources = sources;
        self
    }

    pub fn with_normalization(mut self, stats: ResolutionStats, unmatched: BTreeSet<String>) -> Self {
        self.stats = stats;
        self.unmatched = unmatched;
        self
    }

    pub fn with_outputs(mut self, normalized: PathBuf, filtered: PathBuf, filtered_rows: usize) -> Self {
        self.normalized_path = normalized;
        self.filtered_path = filtered;
        self.filtered_rows = filtered_rows;
        self
    }

    pub fn with_timings(mut self, load: Duration, normalize: Duration, export: Duration) -> Self {
        self.load_time = load;
        self.normalize_time = normalize;
        self.export_time = export;
        self
    }

    /// Stamps the end time and builds the summary.
    pub fn finish(self, ended_utc: DateTime<Utc>) -> RunSummary {
        let duration_secs = (ended_utc - self.started_utc).num_milliseconds() as f64 / 1000.0;
        RunSummary {
            dictionary_status: self.dictionary_status,
            dictionary_version: self.dictionary_version,
            standard_names: self.standard_names,
            sources: self.sources,
            total_rows: self.total_rows,
            stats: self.stats,
            unmatched: self.unmatched,
            filtered_rows: self.filtered_rows,
            normalized_path: self.normalized_path,
            filtered_path: self.filtered_path,
            load_time: self.load_time,
            normalize_time: self.normalize_time,
            export_time: self.export_time,
            started_utc: self.started_utc,
            ended_utc,
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_totals_rows_and_duration() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(1500);
        let s = SummaryBuilder::new(start)
            .with_dictionary(DictionaryStatus::Loaded { entries: 3 }, 2, 2)
            .with_sources(vec![("a.xlsx".into(), 4), ("b.xlsx".into(), 6)])
            .with_normalization(
                ResolutionStats::default(),
                BTreeSet::from(["山本".to_string()]),
            )
            .finish(end);
        assert_eq!(s.total_rows, 10);
        assert_eq!(s.files_merged(), 2);
        assert!((s.duration_secs - 1.5).abs() < 1e-9);
        let rows = s.rows();
        assert!(rows.contains(&("rows[b.xlsx]".to_string(), "6".to_string())));
        assert!(rows.contains(&("unmatched_names".to_string(), "1".to_string())));
        assert!(rows.contains(&("dictionary".to_string(), "loaded (3 variants)".to_string())));
    }
}

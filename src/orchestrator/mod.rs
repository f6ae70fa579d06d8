//! Batch workflow: dictionary, ingest, merge, normalize, export, filter, export.

pub mod summary;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::config::AppConfig;
use crate::dictionary::{DictionaryStore, NormalizationDictionary, global_store};
use crate::engine::{
    FilterCriteria, NormalizationOutput, filter_table, merge_tables, normalize_table,
};
use crate::export::csv_export::export_summary_csv;
use crate::export::export_table;
use crate::ingest::read_sources;
use crate::models::{NormalizedTable, SourceTable};

use summary::{RunSummary, SummaryBuilder};

/// In-memory result of one batch, before anything is written.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub sources: Vec<(String, usize)>,
    pub normalized: NormalizationOutput,
    pub criteria: FilterCriteria,
    pub filtered: NormalizedTable,
}

/// Merges, normalizes and filters already-read uploads.
pub fn run_pipeline(
    cfg: &AppConfig,
    sources: Vec<SourceTable>,
    dictionary: &NormalizationDictionary,
) -> Result<PipelineOutput> {
    let merged = merge_tables(sources, cfg.merge.policy).context("merging uploads")?;
    info!(
        "Merged {} file(s) into {} rows",
        merged.sources.len(),
        merged.table.len()
    );
    let normalized = normalize_table(merged.table, dictionary, &cfg.normalize_options())
        .context("normalizing customer names")?;
    if !normalized.unmatched.is_empty() {
        let names: Vec<&str> = normalized.unmatched.iter().map(String::as_str).collect();
        warn!(
            "{} name(s) could not be normalized: {}",
            names.len(),
            names.join(", ")
        );
    }

    let criteria = cfg.filter.to_criteria();
    let filtered = filter_table(&normalized.table, &criteria);
    info!(
        "Filter kept {} of {} rows",
        filtered.len(),
        normalized.table.len()
    );
    Ok(PipelineOutput {
        sources: merged.sources,
        normalized,
        criteria,
        filtered,
    })
}

/// Runs one batch against the process-wide dictionary store.
pub fn run(cfg: &AppConfig, uploads: &[PathBuf]) -> Result<RunSummary> {
    run_with_store(cfg, uploads, global_store())
}

pub fn run_with_store(
    cfg: &AppConfig,
    uploads: &[PathBuf],
    store: &DictionaryStore,
) -> Result<RunSummary> {
    if uploads.is_empty() {
        bail!("no upload files given");
    }
    let builder = SummaryBuilder::new(chrono::Utc::now());

    let t_load = Instant::now();
    let snapshot = store.reload(&cfg.dictionary.path);
    let sources = read_sources(uploads).context("reading uploads")?;
    let load_time = t_load.elapsed();

    let t_norm = Instant::now();
    let out = run_pipeline(cfg, sources, &snapshot.dictionary)?;
    let normalize_time = t_norm.elapsed();

    let t_export = Instant::now();
    let normalized_path = cfg.export.normalized_path();
    export_table(&out.normalized.table.to_table(), &normalized_path)
        .with_context(|| format!("writing {}", normalized_path.display()))?;
    let filtered_path = cfg.export.filtered_path();
    export_table(&out.filtered.to_table(), &filtered_path)
        .with_context(|| format!("writing {}", filtered_path.display()))?;
    let export_time = t_export.elapsed();

    let filtered_rows = out.filtered.len();
    let summary = builder
        .with_dictionary(
            snapshot.status.clone(),
            snapshot.version,
            snapshot.dictionary.standard_names().len(),
        )
        .with_sources(out.sources)
        .with_normalization(out.normalized.stats, out.normalized.unmatched)
        .with_outputs(normalized_path, filtered_path, filtered_rows)
        .with_timings(load_time, normalize_time, export_time)
        .finish(chrono::Utc::now());

    if let Some(path) = cfg.export.summary_path() {
        export_summary_csv(&path, &summary)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }
    log_summary(&summary);
    Ok(summary)
}

pub fn log_summary(summary: &RunSummary) {
    info!(
        "Run complete in {:.3}s: {} file(s), {} rows, {} unmatched name(s), {} filtered rows",
        summary.duration_secs,
        summary.files_merged(),
        summary.total_rows,
        summary.unmatched.len(),
        summary.filtered_rows
    );
    info!("Normalized output: {}", summary.normalized_path.display());
    info!("Filtered output: {}", summary.filtered_path.display());
}

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use crate::config::{
    AppConfig, DEFAULT_DICTIONARY_PATH, DEFAULT_FILTERED_FILE, DEFAULT_NORMALIZED_FILE,
    DictionaryConfig, ExportConfig, FilterConfig, MergeConfig,
};
use crate::engine::MergePolicy;
use crate::error::ConfigError;
use crate::matching::{DEFAULT_SCORE_THRESHOLD, MatchOptions, Scorer};
use crate::models::{CanonicalPlacement, ColumnMapping};
use crate::normalize::parse_date_str;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum PlacementOpt {
    First,
    Last,
}

impl From<PlacementOpt> for CanonicalPlacement {
    fn from(p: PlacementOpt) -> Self {
        match p {
            PlacementOpt::First => CanonicalPlacement::First,
            PlacementOpt::Last => CanonicalPlacement::Last,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum ScorerOpt {
    #[value(name = "wratio")]
    WRatio,
    Levenshtein,
    #[value(name = "jaro-winkler")]
    JaroWinkler,
}

impl From<ScorerOpt> for Scorer {
    fn from(s: ScorerOpt) -> Self {
        match s {
            ScorerOpt::WRatio => Scorer::WRatio,
            ScorerOpt::Levenshtein => Scorer::Levenshtein,
            ScorerOpt::JaroWinkler => Scorer::JaroWinkler,
        }
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date_str(s).ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", s))
}

#[derive(Parser, Debug)]
#[command(
    name = "customer_normalizer",
    version,
    about = "Normalize customer names across uploaded spreadsheets and filter the unified history",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Upload files (.xlsx, .xls, .xlsb, .csv), merged in the order given
    #[arg(value_name = "UPLOAD", required_unless_present = "write_env_template")]
    pub uploads: Vec<PathBuf>,

    /// Normalization dictionary (.csv, .yaml, .json) (env: CUSTNORM_DICTIONARY)
    #[arg(long, env = "CUSTNORM_DICTIONARY", default_value = DEFAULT_DICTIONARY_PATH)]
    pub dictionary: PathBuf,

    /// Output directory (env: CUSTNORM_OUT_DIR)
    #[arg(long = "out-dir", env = "CUSTNORM_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,
    /// File name for the full normalized table
    #[arg(long = "normalized-file", default_value = DEFAULT_NORMALIZED_FILE)]
    pub normalized_file: String,
    /// File name for the filtered table
    #[arg(long = "filtered-file", default_value = DEFAULT_FILTERED_FILE)]
    pub filtered_file: String,
    /// Also write a Metric,Value run summary CSV with this file name
    #[arg(long = "summary-file")]
    pub summary_file: Option<String>,

    /// Keep only these canonical customer names (repeatable)
    #[arg(long = "customer", value_name = "NAME")]
    pub customers: Vec<String>,
    /// Keep only these actions (repeatable)
    #[arg(long = "action", value_name = "ACTION")]
    pub actions: Vec<String>,
    /// Earliest date kept (inclusive)
    #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,
    /// Latest date kept (inclusive)
    #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    /// Where the canonical name column goes in exported tables
    #[arg(long = "canonical-column", default_value_t = PlacementOpt::First, value_enum)]
    pub canonical_column: PlacementOpt,
    /// Similarity scorer for the fuzzy fallback (env: CUSTNORM_SCORER)
    #[arg(long, env = "CUSTNORM_SCORER", default_value_t = ScorerOpt::WRatio, value_enum)]
    pub scorer: ScorerOpt,
    /// Minimum fuzzy score (0-100) to accept a standard name (env: CUSTNORM_THRESHOLD)
    #[arg(long, env = "CUSTNORM_THRESHOLD", default_value_t = DEFAULT_SCORE_THRESHOLD)]
    pub threshold: f64,
    /// Fold full-width letters and digits before scoring
    #[arg(long = "fold-width", env = "CUSTNORM_FOLD_WIDTH")]
    pub fold_width: bool,
    /// Fail when uploads do not share the same columns
    #[arg(long = "strict-schema", env = "CUSTNORM_STRICT_SCHEMA")]
    pub strict_schema: bool,

    /// Customer name column label
    #[arg(long = "name-column", env = "CUSTNORM_NAME_COLUMN", default_value = "顧客名")]
    pub name_column: String,
    /// Date column label
    #[arg(long = "date-column", env = "CUSTNORM_DATE_COLUMN", default_value = "日付")]
    pub date_column: String,
    /// Action column label
    #[arg(long = "action-column", env = "CUSTNORM_ACTION_COLUMN", default_value = "アクション")]
    pub action_column: String,
    /// Label of the added canonical name column
    #[arg(
        long = "canonical-label",
        env = "CUSTNORM_CANONICAL_COLUMN",
        default_value = "正規化顧客名"
    )]
    pub canonical_label: String,

    /// Write a commented .env template to this path and exit
    #[arg(long = "write-env-template", value_name = "PATH")]
    pub write_env_template: Option<PathBuf>,
}

impl Cli {
    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let cfg = AppConfig {
            dictionary: DictionaryConfig {
                path: self.dictionary.clone(),
            },
            columns: ColumnMapping {
                name: self.name_column.trim().to_string(),
                date: self.date_column.trim().to_string(),
                action: self.action_column.trim().to_string(),
                canonical: self.canonical_label.trim().to_string(),
            },
            matching: MatchOptions {
                scorer: self.scorer.into(),
                threshold: self.threshold,
                fold_width: self.fold_width,
            },
            merge: MergeConfig {
                policy: if self.strict_schema {
                    MergePolicy::Strict
                } else {
                    MergePolicy::Union
                },
            },
            filter: FilterConfig {
                customers: self.customers.clone(),
                actions: self.actions.clone(),
                from: self.from,
                to: self.to,
            },
            export: ExportConfig {
                out_dir: self.out_dir.clone(),
                normalized_file: self.normalized_file.clone(),
                filtered_file: self.filtered_file.clone(),
                summary_file: self.summary_file.clone(),
                placement: self.canonical_column.into(),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

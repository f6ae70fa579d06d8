use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{DateRange, FilterCriteria, MergePolicy, NormalizeOptions};
use crate::error::ConfigError;
use crate::export::ExportFormat;
use crate::matching::MatchOptions;
use crate::models::{CanonicalPlacement, ColumnMapping};

pub const DEFAULT_DICTIONARY_PATH: &str = "normalization.csv";
pub const DEFAULT_NORMALIZED_FILE: &str = "正規化後_顧客データ.xlsx";
pub const DEFAULT_FILTERED_FILE: &str = "フィルタ結果_履歴.xlsx";

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct DictionaryConfig {
    pub path: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DICTIONARY_PATH),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct MergeConfig {
    pub policy: MergePolicy,
}

/// Filter selections. An empty list or absent bound leaves that predicate off.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub customers: Vec<String>,
    pub actions: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FilterConfig {
    pub fn to_criteria(&self) -> FilterCriteria {
        let set = |v: &[String]| -> Option<BTreeSet<String>> {
            let s: BTreeSet<String> = v
                .iter()
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect();
            (!s.is_empty()).then_some(s)
        };
        let date_range = (self.from.is_some() || self.to.is_some()).then_some(DateRange {
            start: self.from,
            end: self.to,
        });
        FilterCriteria {
            names: set(&self.customers),
            date_range,
            actions: set(&self.actions),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
    pub normalized_file: String,
    pub filtered_file: String,
    pub summary_file: Option<String>,
    #[serde(default)]
    pub placement: CanonicalPlacement,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            normalized_file: DEFAULT_NORMALIZED_FILE.into(),
            filtered_file: DEFAULT_FILTERED_FILE.into(),
            summary_file: None,
            placement: CanonicalPlacement::First,
        }
    }
}

impl ExportConfig {
    pub fn normalized_path(&self) -> PathBuf {
        self.out_dir.join(&self.normalized_file)
    }

    pub fn filtered_path(&self) -> PathBuf {
        self.out_dir.join(&self.filtered_file)
    }

    pub fn summary_path(&self) -> Option<PathBuf> {
        self.summary_file.as_ref().map(|f| self.out_dir.join(f))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub matching: MatchOptions,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            mapping: self.columns.clone(),
            placement: self.export.placement,
            matching: self.matching,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dictionary.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "dictionary.path",
            });
        }

        let labels = [
            ("columns.name", &self.columns.name),
            ("columns.date", &self.columns.date),
            ("columns.action", &self.columns.action),
            ("columns.canonical", &self.columns.canonical),
        ];
        let mut seen = BTreeSet::new();
        for (field, label) in labels {
            if label.trim().is_empty() {
                return Err(ConfigError::MissingField { field });
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' is used for more than one column", label),
                });
            }
        }

        let t = self.matching.threshold;
        if !(0.0..=100.0).contains(&t) {
            return Err(ConfigError::InvalidValue {
                field: "matching.threshold",
                reason: format!("{} not in 0..=100", t),
            });
        }

        if let (Some(from), Some(to)) = (self.filter.from, self.filter.to) {
            if from > to {
                return Err(ConfigError::InvalidValue {
                    field: "filter.from",
                    reason: format!("{} is after {}", from, to),
                });
            }
        }

        let outputs = [
            ("export.normalized_file", Some(&self.export.normalized_file)),
            ("export.filtered_file", Some(&self.export.filtered_file)),
            ("export.summary_file", self.export.summary_file.as_ref()),
        ];
        let mut names = BTreeSet::new();
        for (field, file) in outputs {
            let Some(file) = file else { continue };
            if file.trim().is_empty() {
                return Err(ConfigError::MissingField { field });
            }
            if !names.insert(file.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' would overwrite another output", file),
                });
            }
        }
        for &(field, file) in &outputs[..2] {
            if let Some(file) = file {
                if ExportFormat::from_path(Path::new(file.as_str())).is_none() {
                    return Err(ConfigError::InvalidValue {
                        field,
                        reason: format!("unsupported extension: {} (use .xlsx or .csv)", file),
                    });
                }
            }
        }
        if let Some(summary) = &self.export.summary_file {
            if !summary.to_ascii_lowercase().ends_with(".csv") {
                return Err(ConfigError::InvalidValue {
                    field: "export.summary_file",
                    reason: format!("{} must be a .csv file", summary),
                });
            }
        }
        Ok(())
    }
}

//! Normalization dictionary: variant spelling -> canonical customer name.
//!
//! A dictionary is immutable once built. The process-wide [`DictionaryStore`] hands out
//! `Arc` snapshots; reloading builds a fresh snapshot and swaps the pointer, so readers
//! never see a half-loaded dictionary.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use log::{info, warn};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::DictionaryError;
use crate::normalize::normalize_whitespace;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationDictionary {
    entries: HashMap<String, String>,
    standard_names: BTreeSet<String>,
}

impl NormalizationDictionary {
    /// Builds a dictionary from (variant, canonical) pairs. Variants are whitespace
    /// normalized; blank variants are skipped; a later duplicate replaces an earlier one.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for (variant, canonical) in pairs {
            let key = normalize_whitespace(variant.as_ref());
            if key.is_empty() {
                continue;
            }
            entries.insert(key, canonical.as_ref().trim().to_string());
        }
        let standard_names = entries
            .values()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect();
        Self {
            entries,
            standard_names,
        }
    }

    pub fn get(&self, variant: &str) -> Option<&str> {
        self.entries.get(variant).map(String::as_str)
    }

    /// Distinct canonical names, in sorted order.
    pub fn standard_names(&self) -> &BTreeSet<String> {
        &self.standard_names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryFormat {
    Csv,
    Yaml,
    Json,
}

impl DictionaryFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DictRow {
    variant: String,
    normalized: String,
}

/// Parses dictionary text in the given format.
pub fn parse_dictionary(
    format: DictionaryFormat,
    text: &str,
) -> Result<NormalizationDictionary, DictionaryError> {
    let text = text.trim_start_matches('\u{feff}');
    match format {
        DictionaryFormat::Csv => {
            let mut rdr = csv::ReaderBuilder::new()
                .trim(csv::Trim::Headers)
                .from_reader(text.as_bytes());
            let mut pairs = Vec::new();
            for row in rdr.deserialize::<DictRow>() {
                let row = row?;
                pairs.push((row.variant, row.normalized));
            }
            Ok(NormalizationDictionary::from_pairs(pairs))
        }
        DictionaryFormat::Yaml => {
            if text.trim().is_empty() {
                return Ok(NormalizationDictionary::default());
            }
            let YamlEntries(entries) = serde_yaml::from_str(text)
                .map_err(|e| DictionaryError::Document(e.to_string()))?;
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                match (yaml_scalar(&k), yaml_scalar(&v)) {
                    (Some(k), Some(v)) => pairs.push((k, v)),
                    _ => warn!("skipping non-scalar dictionary entry {:?}: {:?}", k, v),
                }
            }
            Ok(NormalizationDictionary::from_pairs(pairs))
        }
        DictionaryFormat::Json => {
            let doc: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| DictionaryError::Document(e.to_string()))?;
            let serde_json::Value::Object(map) = doc else {
                return Err(DictionaryError::Document(
                    "top level must be an object of variant to canonical name".into(),
                ));
            };
            let mut pairs = Vec::with_capacity(map.len());
            for (k, v) in map {
                match json_scalar(&v) {
                    Some(v) => pairs.push((k, v)),
                    None => warn!("skipping non-scalar dictionary entry {:?}: {}", k, v),
                }
            }
            Ok(NormalizationDictionary::from_pairs(pairs))
        }
    }
}

/// Top-level YAML mapping read entry by entry, in document order. Unlike
/// `serde_yaml::Mapping` this keeps repeated keys, so the last one wins in `from_pairs`.
struct YamlEntries(Vec<(serde_yaml::Value, serde_yaml::Value)>);

impl<'de> Deserialize<'de> for YamlEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = YamlEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of variant to canonical name")
            }

            fn visit_unit<E: de::Error>(self) -> Result<YamlEntries, E> {
                Ok(YamlEntries(Vec::new()))
            }

            fn visit_none<E: de::Error>(self) -> Result<YamlEntries, E> {
                Ok(YamlEntries(Vec::new()))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<YamlEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(YamlEntries(entries))
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}

fn yaml_scalar(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_scalar(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Loads a dictionary file; the extension selects the parser.
pub fn load_dictionary(path: &Path) -> Result<NormalizationDictionary, DictionaryError> {
    let format = DictionaryFormat::from_path(path)
        .ok_or_else(|| DictionaryError::UnsupportedFormat(path.display().to_string()))?;
    if !path.exists() {
        return Err(DictionaryError::NotFound(path.display().to_string()));
    }
    let text = fs::read_to_string(path)?;
    parse_dictionary(format, &text)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictionaryStatus {
    Loaded { entries: usize },
    Unavailable { reason: String },
}

impl DictionaryStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, DictionaryStatus::Loaded { .. })
    }
}

/// Like [`load_dictionary`], but any failure degrades to an empty dictionary plus an
/// `Unavailable` status so the pipeline can continue with fuzzy-only resolution.
pub fn load_or_empty(path: &Path) -> (NormalizationDictionary, DictionaryStatus) {
    match load_dictionary(path) {
        Ok(d) => {
            info!(
                "Loaded normalization dictionary {}: {} variants, {} canonical names",
                path.display(),
                d.len(),
                d.standard_names().len()
            );
            let status = DictionaryStatus::Loaded { entries: d.len() };
            (d, status)
        }
        Err(e) => {
            warn!("Normalization dictionary unavailable ({}); continuing without it", e);
            (
                NormalizationDictionary::default(),
                DictionaryStatus::Unavailable {
                    reason: e.to_string(),
                },
            )
        }
    }
}

#[derive(Debug)]
pub struct DictionarySnapshot {
    pub version: u64,
    pub source: Option<PathBuf>,
    pub status: DictionaryStatus,
    pub dictionary: NormalizationDictionary,
}

#[derive(Debug)]
pub struct DictionaryStore {
    current: RwLock<Arc<DictionarySnapshot>>,
    next_version: AtomicU64,
}

impl Default for DictionaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryStore {
    /// Starts with an empty, unavailable dictionary at version 0.
    pub fn new() -> Self {
        let initial = DictionarySnapshot {
            version: 0,
            source: None,
            status: DictionaryStatus::Unavailable {
                reason: "not loaded".into(),
            },
            dictionary: NormalizationDictionary::default(),
        };
        Self {
            current: RwLock::new(Arc::new(initial)),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<DictionarySnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Installs a new snapshot and returns it. Existing readers keep their old `Arc`.
    pub fn replace(
        &self,
        dictionary: NormalizationDictionary,
        status: DictionaryStatus,
        source: Option<PathBuf>,
    ) -> Arc<DictionarySnapshot> {
        let snap = Arc::new(DictionarySnapshot {
            version: self.next_version.fetch_add(1, Ordering::SeqCst),
            source,
            status,
            dictionary,
        });
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snap);
        snap
    }

    pub fn reload(&self, path: &Path) -> Arc<DictionarySnapshot> {
        let (dictionary, status) = load_or_empty(path);
        self.replace(dictionary, status, Some(path.to_path_buf()))
    }
}

static STORE: OnceLock<DictionaryStore> = OnceLock::new();

/// Process-wide dictionary store.
pub fn global_store() -> &'static DictionaryStore {
    STORE.get_or_init(DictionaryStore::new)
}

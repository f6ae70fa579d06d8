use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary source not found: {0}")]
    NotFound(String),
    #[error("unsupported dictionary format: {0}")]
    UnsupportedFormat(String),
    #[error("dictionary io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dictionary csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("dictionary document error: {0}")]
    Document(String),
}

/// Batch-aborting conditions raised while reading, merging or normalizing uploads.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("required column '{column}' not found")]
    MissingColumn { column: String },
    #[error("schema mismatch in '{source_name}': expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        source_name: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("unsupported upload format: {0}")]
    UnsupportedFormat(String),
    #[error("unable to read '{source_name}': {reason}")]
    Read { source_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export error: {0}")]
    Csv(String),
    #[error("xlsx export error: {0}")]
    Xlsx(String),
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),
}

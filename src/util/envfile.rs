use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped; surrounding
/// quotes are removed from values.
pub fn parse_env_str(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = s.split_once('=') {
            let key = key.trim();
            let mut val = val.trim();
            if val.len() >= 2
                && ((val.starts_with('"') && val.ends_with('"'))
                    || (val.starts_with('\'') && val.ends_with('\'')))
            {
                val = &val[1..val.len() - 1];
            }
            map.insert(key.to_string(), val.to_string());
        } else {
            warn!("ignoring .env line {} without '=': {}", idx + 1, line);
        }
    }
    map
}

/// Parse a .env file, if present. Does not modify the process environment.
pub fn parse_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_env_str(&content))
}

/// Load `.env` from the working directory into the process environment. Variables
/// already set are left alone. Returns how many were applied.
pub fn load_dotenv_if_present() -> Result<usize> {
    let map = parse_env_file(Path::new(".env"))?;
    let mut applied = 0;
    for (k, v) in map {
        if std::env::var_os(&k).is_none() {
            unsafe {
                std::env::set_var(&k, &v);
            }
            applied += 1;
        }
    }
    Ok(applied)
}

/// Generate a .env.template file with placeholder values and comments.
pub fn write_env_template(path: &Path) -> Result<()> {
    let mut f = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let template = r#"# customer_normalizer environment template
# Copy this file to .env and edit values as needed.
# Variables already present in the environment take precedence.

# Normalization dictionary (.csv with variant,normalized columns, or .yaml/.json mapping)
CUSTNORM_DICTIONARY=normalization.csv

# Directory for the exported workbooks
#CUSTNORM_OUT_DIR=.

# Fuzzy fallback: wratio | levenshtein | jaro-winkler, threshold 0-100
#CUSTNORM_SCORER=wratio
#CUSTNORM_THRESHOLD=80
#CUSTNORM_FOLD_WIDTH=false

# Reject uploads whose columns differ from the first file
#CUSTNORM_STRICT_SCHEMA=false

# Column labels
#CUSTNORM_NAME_COLUMN=顧客名
#CUSTNORM_DATE_COLUMN=日付
#CUSTNORM_ACTION_COLUMN=アクション
#CUSTNORM_CANONICAL_COLUMN=正規化顧客名

# Logging: RUST_LOG filter, CUSTNORM_TRACING=1 for the tracing formatter
#RUST_LOG=info
#CUSTNORM_TRACING=0
"#;
    f.write_all(template.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_comments_and_bad_lines() {
        let map = parse_env_str(
            "# comment\nCUSTNORM_DICTIONARY=\"dict.yaml\"\n\nCUSTNORM_THRESHOLD = 85\nnot a pair\nX='a=b'\n",
        );
        assert_eq!(map.get("CUSTNORM_DICTIONARY").map(String::as_str), Some("dict.yaml"));
        assert_eq!(map.get("CUSTNORM_THRESHOLD").map(String::as_str), Some("85"));
        assert_eq!(map.get("X").map(String::as_str), Some("a=b"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn template_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env.template");
        write_env_template(&path).unwrap();
        let map = parse_env_file(&path).unwrap();
        assert_eq!(
            map.get("CUSTNORM_DICTIONARY").map(String::as_str),
            Some("normalization.csv")
        );
        assert!(parse_env_file(&dir.path().join("missing.env")).unwrap().is_empty());
    }
}

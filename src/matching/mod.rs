use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dictionary::NormalizationDictionary;
use crate::normalize::{fold_width, normalize_whitespace};

// Shared helper functions (similarity scoring)
mod helpers;
use helpers::{sim_jaro_winkler_pct, sim_levenshtein_pct, weighted_ratio};

/// Minimum similarity score for a fuzzy candidate to be accepted.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 80.0;

// Absorbs float noise when a score lands exactly on the threshold.
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Weighted blend of plain, token and partial Indel ratios.
    #[default]
    WRatio,
    Levenshtein,
    JaroWinkler,
}

impl Scorer {
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Scorer::WRatio => weighted_ratio(a, b),
            Scorer::Levenshtein => sim_levenshtein_pct(a, b),
            Scorer::JaroWinkler => sim_jaro_winkler_pct(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scorer::WRatio => "wratio",
            Scorer::Levenshtein => "levenshtein",
            Scorer::JaroWinkler => "jaro_winkler",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub scorer: Scorer,
    pub threshold: f64,
    /// Fold full-width Latin/digits before scoring.
    pub fold_width: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            scorer: Scorer::WRatio,
            threshold: DEFAULT_SCORE_THRESHOLD,
            fold_width: false,
        }
    }
}

/// How an observed name reached its canonical form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Missing or blank input; canonical is the empty string.
    Empty,
    Dictionary,
    Fuzzy { score: f64 },
    /// Passed through unchanged. Carries the best score seen, if any candidate existed.
    Unmatched { best_score: Option<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub normalized: String,
    pub canonical: String,
    pub resolution: Resolution,
}

/// Resolves observed names against one dictionary snapshot.
///
/// Candidates come from the dictionary's standard-name set, which is ordered, so
/// when several candidates share the top score the lexicographically smallest wins.
pub struct NameResolver<'a> {
    dictionary: &'a NormalizationDictionary,
    opts: MatchOptions,
    // (comparison key, canonical candidate), in standard-name order
    candidates: Vec<(String, &'a str)>,
}

impl<'a> NameResolver<'a> {
    pub fn new(dictionary: &'a NormalizationDictionary, opts: MatchOptions) -> Self {
        Self::with_candidates(
            dictionary,
            dictionary.standard_names().iter().map(String::as_str),
            opts,
        )
    }

    /// Resolver whose fuzzy candidates come from `standard_names` instead of the
    /// dictionary's own canonical values. Candidates are deduplicated and sorted.
    pub fn with_candidates<I>(
        dictionary: &'a NormalizationDictionary,
        standard_names: I,
        opts: MatchOptions,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ordered: BTreeSet<&'a str> = standard_names.into_iter().collect();
        let candidates = ordered
            .into_iter()
            .map(|c| {
                let key = if opts.fold_width {
                    fold_width(c)
                } else {
                    c.to_string()
                };
                (key, c)
            })
            .collect();
        Self {
            dictionary,
            opts,
            candidates,
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.opts
    }

    pub fn resolve(&self, observed: Option<&str>) -> Resolved {
        let normalized = observed.map(normalize_whitespace).unwrap_or_default();
        if normalized.is_empty() {
            return Resolved {
                normalized,
                canonical: String::new(),
                resolution: Resolution::Empty,
            };
        }

        if let Some(canonical) = self.dictionary.get(&normalized) {
            return Resolved {
                canonical: canonical.to_string(),
                normalized,
                resolution: Resolution::Dictionary,
            };
        }

        match self.best_candidate(&normalized) {
            Some((candidate, score)) if score + SCORE_EPSILON >= self.opts.threshold => Resolved {
                canonical: candidate.to_string(),
                normalized,
                resolution: Resolution::Fuzzy { score },
            },
            best => Resolved {
                canonical: normalized.clone(),
                normalized,
                resolution: Resolution::Unmatched {
                    best_score: best.map(|(_, s)| s),
                },
            },
        }
    }

    /// Highest-scoring candidate; ties keep the earlier (smaller) candidate.
    fn best_candidate(&self, normalized: &str) -> Option<(&'a str, f64)> {
        let probe = if self.opts.fold_width {
            fold_width(normalized)
        } else {
            normalized.to_string()
        };
        let mut best: Option<(&'a str, f64)> = None;
        for (key, candidate) in &self.candidates {
            let score = self.opts.scorer.score(&probe, key);
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((*candidate, score));
                if score >= 100.0 {
                    break;
                }
            }
        }
        best
    }
}

/// Resolves one name with default matching options. The fuzzy candidates are the
/// dictionary's standard names; use [`NameResolver::with_candidates`] to supply a
/// different set.
pub fn resolve(observed: Option<&str>, dictionary: &NormalizationDictionary) -> String {
    NameResolver::new(dictionary, MatchOptions::default())
        .resolve(observed)
        .canonical
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, &str)]) -> NormalizationDictionary {
        NormalizationDictionary::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn dictionary_hit_short_circuits_fuzzy() {
        // "田中太郎" would score 100 against itself, but the dictionary says otherwise
        let d = dict(&[("田中太郎", "田中 太郎 (本店)"), ("山田", "山田花子")]);
        let r = NameResolver::new(&d, MatchOptions::default());
        let out = r.resolve(Some("田中太郎"));
        assert_eq!(out.canonical, "田中 太郎 (本店)");
        assert_eq!(out.resolution, Resolution::Dictionary);
        assert_eq!(resolve(Some("山田"), &d), "山田花子");
    }

    #[test]
    fn empty_and_missing_names_resolve_to_empty_string() {
        let d = dict(&[("田中", "田中太郎")]);
        assert_eq!(resolve(None, &d), "");
        assert_eq!(resolve(Some(""), &d), "");
        let r = NameResolver::new(&d, MatchOptions::default()).resolve(Some("　 "));
        assert_eq!(r.canonical, "");
        assert_eq!(r.resolution, Resolution::Empty);
    }

    #[test]
    fn whitespace_is_normalized_before_lookup() {
        let d = dict(&[("田中 太郎", "田中太郎")]);
        assert_eq!(resolve(Some("　田中　太郎 "), &d), "田中太郎");
        for s in ["  山本 ", "田中　太郎", "\u{3000}x\u{3000}"] {
            assert_eq!(
                resolve(Some(s), &d),
                resolve(Some(&normalize_whitespace(s)), &d)
            );
        }
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let d = dict(&[("田中", "田中太郎")]);
        let r = NameResolver::new(&d, MatchOptions::default()).resolve(Some("田中　太郎"));
        assert_eq!(r.canonical, "田中太郎");
        assert!(matches!(r.resolution, Resolution::Fuzzy { score } if score >= 80.0));
    }

    #[test]
    fn below_threshold_passes_through_normalized() {
        let d = dict(&[("田中", "田中太郎")]);
        let r = NameResolver::new(&d, MatchOptions::default()).resolve(Some(" 山本 "));
        assert_eq!(r.canonical, "山本");
        assert!(matches!(
            r.resolution,
            Resolution::Unmatched { best_score: Some(s) } if s < 80.0
        ));
    }

    #[test]
    fn empty_standard_set_passes_through() {
        let d = NormalizationDictionary::default();
        let r = NameResolver::new(&d, MatchOptions::default()).resolve(Some("佐藤　一郎"));
        assert_eq!(r.canonical, "佐藤 一郎");
        assert_eq!(r.resolution, Resolution::Unmatched { best_score: None });
    }

    #[test]
    fn ties_pick_lexicographically_smallest_candidate() {
        // "abcx" is one edit from both candidates
        let d = dict(&[("v1", "abcy"), ("v2", "abcz")]);
        let opts = MatchOptions {
            scorer: Scorer::Levenshtein,
            threshold: 70.0,
            fold_width: false,
        };
        let r = NameResolver::new(&d, opts);
        for _ in 0..3 {
            assert_eq!(r.resolve(Some("abcx")).canonical, "abcy");
        }
    }

    fn levenshtein_at(threshold: f64) -> MatchOptions {
        MatchOptions {
            scorer: Scorer::Levenshtein,
            threshold,
            fold_width: false,
        }
    }

    #[test]
    fn score_equal_to_threshold_is_accepted() {
        // one edit over five characters: exactly 80
        let d = dict(&[("x", "田中太郎")]);
        let r = NameResolver::new(&d, levenshtein_at(80.0)).resolve(Some("田中 太郎"));
        assert_eq!(r.canonical, "田中太郎");
        assert_eq!(r.resolution, Resolution::Fuzzy { score: 80.0 });

        let r = NameResolver::new(&d, levenshtein_at(80.0001)).resolve(Some("田中 太郎"));
        assert_eq!(r.canonical, "田中 太郎");
        assert_eq!(r.resolution, Resolution::Unmatched { best_score: Some(80.0) });
    }

    #[test]
    fn explicit_standard_names_with_empty_dictionary() {
        let empty = NormalizationDictionary::default();
        let r = NameResolver::with_candidates(
            &empty,
            ["田中太郎", "山田花子", "田中太郎"],
            MatchOptions::default(),
        );
        assert_eq!(r.options().threshold, DEFAULT_SCORE_THRESHOLD);
        assert_eq!(r.resolve(Some("田中　太郎")).canonical, "田中太郎");
        let out = r.resolve(Some("山本"));
        assert_eq!(out.canonical, "山本");
        assert!(matches!(out.resolution, Resolution::Unmatched { best_score: Some(_) }));
    }

    #[test]
    fn threshold_is_configurable() {
        let d = dict(&[("x", "Johnson")]);
        let strict = MatchOptions {
            threshold: 99.0,
            ..MatchOptions::default()
        };
        assert_eq!(
            NameResolver::new(&d, strict).resolve(Some("Jonson")).canonical,
            "Jonson"
        );
        assert_eq!(
            NameResolver::new(&d, MatchOptions::default())
                .resolve(Some("Jonson"))
                .canonical,
            "Johnson"
        );
    }

    #[test]
    fn fold_width_only_affects_scoring() {
        let d = dict(&[("x", "ABC商事")]);
        let opts = MatchOptions {
            scorer: Scorer::Levenshtein,
            threshold: 80.0,
            fold_width: true,
        };
        let r = NameResolver::new(&d, opts).resolve(Some("ＡＢＣ商事"));
        assert_eq!(r.canonical, "ABC商事");
        assert_eq!(r.normalized, "ＡＢＣ商事");

        let plain = MatchOptions {
            fold_width: false,
            ..opts
        };
        let r = NameResolver::new(&d, plain).resolve(Some("ＡＢＣ商事"));
        assert_eq!(r.canonical, "ＡＢＣ商事");
    }
}

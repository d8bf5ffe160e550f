//! Output tree comparison
//!
//! Compares two flattened parameter trees key by key. Exact mode compares the
//! stored strings; fuzzy mode compares whitespace-separated numeric tokens
//! with absolute and relative tolerances.

use std::fmt;

use crate::domain::parameter_tree::ParameterTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    #[default]
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    pub mode: CompareMode,
    pub relative: f64,
    pub absolute: f64,
    /// Magnitudes below this count as zero on both sides.
    pub zero_threshold: f64,
    /// Key prefixes excluded from the comparison
    pub exclude: Vec<String>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            mode: CompareMode::Exact,
            relative: 1e-2,
            absolute: 1.5e-7,
            zero_threshold: 0.0,
            exclude: Vec::new(),
        }
    }
}

impl CompareOptions {
    fn is_excluded(&self, key: &str) -> bool {
        self.exclude.iter().any(|prefix| {
            key == prefix
                || key
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DifferenceKind {
    MissingInActual,
    MissingInReference,
    ValueMismatch { actual: String, reference: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub key: String,
    pub kind: DifferenceKind,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DifferenceKind::MissingInActual => write!(f, "{}: missing in actual output", self.key),
            DifferenceKind::MissingInReference => {
                write!(f, "{}: missing in reference", self.key)
            }
            DifferenceKind::ValueMismatch { actual, reference } => write!(
                f,
                "{}: '{}' differs from reference '{}'",
                self.key, actual, reference
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Keys compared after exclusion
    pub compared: usize,
    pub differences: Vec<Difference>,
}

impl ComparisonReport {
    pub fn is_match(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Compare `actual` against `reference`.
pub fn compare_trees(
    actual: &ParameterTree,
    reference: &ParameterTree,
    options: &CompareOptions,
) -> ComparisonReport {
    let actual = actual.flatten();
    let reference = reference.flatten();
    let mut report = ComparisonReport::default();

    for (key, expected) in &reference {
        if options.is_excluded(key) {
            continue;
        }
        report.compared += 1;
        match actual.get(key) {
            None => report.differences.push(Difference {
                key: key.clone(),
                kind: DifferenceKind::MissingInActual,
            }),
            Some(value) if !values_match(value, expected, options) => {
                report.differences.push(Difference {
                    key: key.clone(),
                    kind: DifferenceKind::ValueMismatch {
                        actual: value.clone(),
                        reference: expected.clone(),
                    },
                })
            }
            Some(_) => {}
        }
    }
    for key in actual.keys() {
        if !reference.contains_key(key) && !options.is_excluded(key) {
            report.compared += 1;
            report.differences.push(Difference {
                key: key.clone(),
                kind: DifferenceKind::MissingInReference,
            });
        }
    }
    report.differences.sort_by(|a, b| a.key.cmp(&b.key));
    report
}

fn values_match(actual: &str, reference: &str, options: &CompareOptions) -> bool {
    match options.mode {
        CompareMode::Exact => actual == reference,
        CompareMode::Fuzzy => {
            let a: Vec<&str> = actual.split_whitespace().collect();
            let r: Vec<&str> = reference.split_whitespace().collect();
            a == r
                || (a.len() == r.len()
                    && a.iter().zip(&r).all(|(a, r)| tokens_match(a, r, options)))
        }
    }
}

fn tokens_match(actual: &str, reference: &str, options: &CompareOptions) -> bool {
    match (actual.parse::<f64>(), reference.parse::<f64>()) {
        (Ok(a), Ok(r)) => numbers_match(a, r, options),
        _ => actual == reference,
    }
}

fn numbers_match(a: f64, r: f64, options: &CompareOptions) -> bool {
    if a.abs() < options.zero_threshold && r.abs() < options.zero_threshold {
        return true;
    }
    if (a - r).abs() <= options.absolute {
        return true;
    }
    r != 0.0 && ((a / r).abs() - 1.0).abs() <= options.relative
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> ParameterTree {
        ParameterTree::parse(text).unwrap()
    }

    fn fuzzy() -> CompareOptions {
        CompareOptions {
            mode: CompareMode::Fuzzy,
            ..CompareOptions::default()
        }
    }

    #[test]
    fn test_exact_reports_every_kind_of_difference() {
        let actual = tree("a = 1\nb.c = 2\nonly = x\n");
        let reference = tree("a = 1\nb.c = 2.0\nmissing = y\n");

        let report = compare_trees(&actual, &reference, &CompareOptions::default());

        assert_eq!(report.compared, 4);
        let keys: Vec<_> = report.differences.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b.c", "missing", "only"]);
    }

    #[test]
    fn test_fuzzy_accepts_relative_and_absolute_tolerance() {
        let actual = tree("err = 1.005 1e-9\nname = yasp\n");
        let reference = tree("err = 1.0 0\nname = yasp\n");
        assert!(compare_trees(&actual, &reference, &fuzzy()).is_match());

        let off = tree("err = 1.1 0\nname = yasp\n");
        assert!(!compare_trees(&off, &reference, &fuzzy()).is_match());
    }

    #[test]
    fn test_fuzzy_zero_threshold_and_non_numeric_tokens() {
        let mut options = fuzzy();
        options.zero_threshold = 1e-3;
        let actual = tree("x = 0.0004 ok\n");
        let reference = tree("x = -0.0008 ok\n");
        assert!(compare_trees(&actual, &reference, &options).is_match());

        let words = tree("x = 0.0004 ko\n");
        assert!(!compare_trees(&words, &reference, &options).is_match());
    }

    #[test]
    fn test_exclude_skips_key_prefixes_only_at_segment_boundaries() {
        let actual = tree("time.total = 3\ntimer = 1\n");
        let reference = tree("time.total = 5\ntimer = 2\n");
        let options = CompareOptions {
            exclude: vec!["time".to_string()],
            ..CompareOptions::default()
        };

        let report = compare_trees(&actual, &reference, &options);

        assert_eq!(report.compared, 1);
        assert_eq!(report.differences[0].key, "timer");
    }
}

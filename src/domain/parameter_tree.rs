//! Hierarchical parameter storage
//!
//! Keys are dot-separated paths (`yaspgrid.cells`); every node holds string
//! values and named subgroups. The text form is the INI dialect used by the
//! test harness:
//!
//! ```text
//! # comment
//! __name = test
//! [ yaspgrid ]
//! extension = 1.0 1.0
//! cells = 4 4          # trailing comment
//! coordinates.x = 0 0.5 1
//! label = "say \"hi\"\nbye"  # \\, \" and \n are escapes inside double quotes
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::ParamError;

static SECTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\s*([^\]]*?)\s*\]$").unwrap());

static EMPTY: ParameterTree = ParameterTree {
    values: BTreeMap::new(),
    subs: BTreeMap::new(),
};

/// Types that can be read from a parameter value.
pub trait FromParam: Sized {
    /// Description used in error messages.
    const EXPECTED: &'static str;

    fn from_param(raw: &str) -> Option<Self>;
}

macro_rules! from_param_via_parse {
    ($($ty:ty => $expected:expr),* $(,)?) => {
        $(
            impl FromParam for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_param(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }
            }
        )*
    };
}

from_param_via_parse! {
    i32 => "an integer",
    i64 => "an integer",
    u32 => "a non-negative integer",
    u64 => "a non-negative integer",
    usize => "a non-negative integer",
    f32 => "a number",
    f64 => "a number",
}

impl FromParam for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_param(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl FromParam for String {
    const EXPECTED: &'static str = "a string";

    fn from_param(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl<T: FromParam> FromParam for Vec<T> {
    const EXPECTED: &'static str = "a whitespace-separated list";

    fn from_param(raw: &str) -> Option<Self> {
        raw.split_whitespace().map(T::from_param).collect()
    }
}

/// A node of the parameter hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTree {
    values: BTreeMap<String, String>,
    subs: BTreeMap<String, ParameterTree>,
}

impl ParameterTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI content.
    ///
    /// Section headers set a prefix for the following keys; dotted keys
    /// open subgroups relative to that prefix. Later assignments win.
    pub fn parse(content: &str) -> Result<Self, ParamError> {
        let mut tree = Self::new();
        let mut prefix = String::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_trailing_comment(raw);
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                let caps = SECTION_REGEX.captures(line).ok_or_else(|| ParamError::Syntax {
                    line: line_no,
                    message: format!("malformed group header '{}'", line),
                })?;
                prefix = caps[1].to_string();
                if !prefix.is_empty() && split_key(&prefix).is_none() {
                    return Err(ParamError::Syntax {
                        line: line_no,
                        message: format!("invalid group name '{}'", prefix),
                    });
                }
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ParamError::Syntax {
                line: line_no,
                message: format!("expected 'key = value', found '{}'", line),
            })?;
            let key = key.trim();
            let full_key = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            };
            tree.set(&full_key, strip_quotes(value))
                .map_err(|_| ParamError::Syntax {
                    line: line_no,
                    message: format!("invalid key '{}'", key),
                })?;
        }

        Ok(tree)
    }

    /// True if a value is stored under `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// True if a subgroup exists under `key`.
    pub fn has_sub(&self, key: &str) -> bool {
        self.find_sub(key).is_some()
    }

    /// Subgroup under `key`; an empty tree if there is none.
    pub fn sub(&self, key: &str) -> &ParameterTree {
        self.find_sub(key).unwrap_or(&EMPTY)
    }

    /// Raw string value, failing with `MissingKey` if absent.
    pub fn get_str(&self, key: &str) -> Result<&str, ParamError> {
        self.lookup(key).ok_or_else(|| ParamError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Typed value, failing if absent or unparsable.
    pub fn get<T: FromParam>(&self, key: &str) -> Result<T, ParamError> {
        let raw = self.get_str(key)?;
        T::from_param(raw).ok_or_else(|| ParamError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: T::EXPECTED.to_string(),
        })
    }

    /// Typed value or `default` when absent. A present but unparsable value
    /// is still an error.
    pub fn get_or<T: FromParam>(&self, key: &str, default: T) -> Result<T, ParamError> {
        if self.has_key(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// List value with exactly `len` entries.
    pub fn get_vec<T: FromParam>(&self, key: &str, len: usize) -> Result<Vec<T>, ParamError> {
        let values: Vec<T> = self.get(key)?;
        if values.len() != len {
            return Err(ParamError::InvalidValue {
                key: key.to_string(),
                value: self.get_str(key)?.to_string(),
                expected: format!("{} values", len),
            });
        }
        Ok(values)
    }

    /// Store `value` under `key`, creating intermediate groups.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ParamError> {
        let segments = split_key(key).ok_or_else(|| ParamError::InvalidKey {
            key: key.to_string(),
        })?;
        let (leaf, groups) = segments
            .split_last()
            .ok_or_else(|| ParamError::InvalidKey {
                key: key.to_string(),
            })?;
        let mut node = self;
        for group in groups {
            node = node.subs.entry(group.to_string()).or_default();
        }
        node.values.insert(leaf.to_string(), value.into());
        Ok(())
    }

    /// True if neither values nor subgroups are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.subs.iter().all(|(_, s)| s.is_empty())
    }

    /// Values stored directly on this node.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Direct subgroups of this node.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &ParameterTree)> {
        self.subs.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// All values keyed by their fully qualified path, sorted.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        self.flatten_into("", &mut out);
        out
    }

    /// Fully qualified keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.flatten().into_keys().collect()
    }

    /// Serialize as flat `key = "value"` lines that `parse` reads back unchanged.
    pub fn report(&self) -> String {
        self.flatten()
            .iter()
            .map(|(k, v)| format!("{} = \"{}\"\n", k, escape(v)))
            .collect()
    }

    fn flatten_into(&self, prefix: &str, out: &mut BTreeMap<String, String>) {
        let qualify = |key: &str| {
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            }
        };
        for (k, v) in &self.values {
            out.insert(qualify(k), v.clone());
        }
        for (k, sub) in &self.subs {
            sub.flatten_into(&qualify(k), out);
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        let segments = split_key(key)?;
        let (leaf, groups) = segments.split_last()?;
        let mut node = self;
        for group in groups {
            node = node.subs.get(*group)?;
        }
        node.values.get(*leaf).map(String::as_str)
    }

    fn find_sub(&self, key: &str) -> Option<&ParameterTree> {
        let segments = split_key(key)?;
        let mut node = self;
        for group in segments {
            node = node.subs.get(group)?;
        }
        Some(node)
    }
}

/// Split a dotted key; `None` if any segment is empty or holds characters
/// the text form reserves.
fn split_key(key: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').map(str::trim).collect();
    let reserved = |c: char| matches!(c, '=' | '#' | '[' | ']' | '"' | '\'') || c.is_control();
    if segments.iter().any(|s| s.is_empty() || s.contains(reserved)) {
        return None;
    }
    Some(segments)
}

/// Strip a `#` comment that is not inside quotes, then surrounding whitespace.
fn strip_trailing_comment(line: &str) -> &str {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escaped = false;

    for (i, b) in line.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_double_quote => escaped = true,
            b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
            b'"' if !in_single_quote => in_double_quote = !in_double_quote,
            b'#' if !in_single_quote && !in_double_quote => return line[..i].trim(),
            _ => {}
        }
    }
    line.trim()
}

/// Strip one pair of matching surrounding quotes, resolving escapes inside
/// double quotes.
fn strip_quotes(value: &str) -> String {
    let s = value.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return unescape(&s[1..s.len() - 1]);
    }
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape`]; unknown sequences keep their backslash.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

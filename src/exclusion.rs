//! Exclusion policy: which directories and files are left out of the mirror.
//!
//! A policy has three parts, any of which may be empty:
//!
//! ```json
//! {
//!     "directories": ["hidden"],
//!     "files": ["thumbs.db", "desktop.ini"],
//!     "regex": ["/.*\\.json$/", "^~\\$"]
//! }
//! ```
//!
//! Literal names are compared case-insensitively against the entry name. Regex
//! patterns are tested against the bare entry name of both directories and
//! files; a match excludes the entry. Patterns may carry PHP-style delimiters
//! and trailing flags (`/draft/i`), which is how the settings form has always
//! documented them.
//!
//! A pattern that does not compile never aborts the policy. Compilation
//! returns it as a [`PolicyError`] and the pattern simply never matches.

use regex::{Regex, RegexBuilder};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid exclusion pattern {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Which name list a candidate is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Exclusion policy as written in settings.
///
/// Missing keys and keys whose value is not an array of strings deserialize
/// to empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExclusionSpec {
    #[serde(default, deserialize_with = "lenient_list")]
    pub directories: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub files: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub regex: Vec<String>,
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    })
}

impl ExclusionSpec {
    /// Parse the JSON object form. Anything other than an object is an error.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("exclusions must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Compile into a matcher, returning every pattern that failed.
    pub fn compile(&self) -> (ExclusionPolicy, Vec<PolicyError>) {
        let mut patterns = Vec::with_capacity(self.regex.len());
        let mut errors = Vec::new();

        for raw in &self.regex {
            match compile_pattern(raw) {
                Ok(re) => patterns.push(re),
                Err(err) => {
                    tracing::warn!("{err}");
                    errors.push(err);
                }
            }
        }

        let policy = ExclusionPolicy {
            directories: self.directories.iter().map(|d| d.to_lowercase()).collect(),
            files: self.files.iter().map(|f| f.to_lowercase()).collect(),
            patterns,
        };
        (policy, errors)
    }
}

/// Compiled exclusion policy.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    directories: HashSet<String>,
    files: HashSet<String>,
    patterns: Vec<Regex>,
}

impl ExclusionPolicy {
    /// A policy that excludes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// True when `name` is excluded by a literal entry for its kind or by any
    /// pattern.
    pub fn is_excluded(&self, name: &str, kind: EntryKind) -> bool {
        self.literal_match(name, kind) || self.pattern_match(name)
    }

    fn literal_match(&self, name: &str, kind: EntryKind) -> bool {
        let set = match kind {
            EntryKind::Directory => &self.directories,
            EntryKind::File => &self.files,
        };
        !set.is_empty() && set.contains(&name.to_lowercase())
    }

    fn pattern_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }

    /// Number of patterns that compiled.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Compile one pattern, accepting `/body/flags` delimited form.
fn compile_pattern(raw: &str) -> Result<Regex, PolicyError> {
    let (body, flags) = split_delimiters(raw);
    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'u' => builder.unicode(true),
            other => {
                return Err(PolicyError::InvalidRegex {
                    pattern: raw.to_string(),
                    message: format!("unsupported flag '{other}'"),
                });
            }
        };
    }
    builder.build().map_err(|e| PolicyError::InvalidRegex {
        pattern: raw.to_string(),
        message: e.to_string(),
    })
}

/// Split `/body/flags` into `(body, flags)`. Undelimited input is returned
/// whole with no flags.
fn split_delimiters(raw: &str) -> (&str, &str) {
    let Some(rest) = raw.strip_prefix('/') else {
        return (raw, "");
    };
    match rest.rfind('/') {
        Some(end) if rest[end + 1..].chars().all(|c| c.is_ascii_alphabetic()) => {
            (&rest[..end], &rest[end + 1..])
        }
        _ => (raw, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(json: &str) -> (ExclusionPolicy, Vec<PolicyError>) {
        ExclusionSpec::from_json(json).unwrap().compile()
    }

    // =========================================================================
    // Literal lists
    // =========================================================================

    #[test]
    fn literal_directory_case_insensitive() {
        let (p, _) = policy(r#"{"directories": ["Hidden"]}"#);
        assert!(p.is_excluded("hidden", EntryKind::Directory));
        assert!(p.is_excluded("HIDDEN", EntryKind::Directory));
        assert!(!p.is_excluded("hidden2", EntryKind::Directory));
    }

    #[test]
    fn literal_lists_are_kind_specific() {
        let (p, _) = policy(r#"{"directories": ["drafts"], "files": ["thumbs.db"]}"#);
        assert!(!p.is_excluded("drafts", EntryKind::File));
        assert!(!p.is_excluded("thumbs.db", EntryKind::Directory));
        assert!(p.is_excluded("Thumbs.db", EntryKind::File));
    }

    #[test]
    fn empty_policy_excludes_nothing() {
        let p = ExclusionPolicy::none();
        assert!(!p.is_excluded("anything", EntryKind::Directory));
        assert!(!p.is_excluded("anything.pdf", EntryKind::File));
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    #[test]
    fn delimited_pattern_applies_to_both_kinds() {
        let (p, errors) = policy(r#"{"regex": ["/.*\\.json$/"]}"#);
        assert!(errors.is_empty());
        assert!(p.is_excluded("data.json", EntryKind::File));
        assert!(p.is_excluded("weird.json", EntryKind::Directory));
        assert!(!p.is_excluded("data.jsonl", EntryKind::File));
    }

    #[test]
    fn undelimited_pattern_used_verbatim() {
        let (p, _) = policy(r#"{"regex": ["^~\\$"]}"#);
        assert!(p.is_excluded("~$lock.docx", EntryKind::File));
        assert!(!p.is_excluded("lock.docx", EntryKind::File));
    }

    #[test]
    fn case_insensitive_flag() {
        let (p, _) = policy(r#"{"regex": ["/^draft/i"]}"#);
        assert!(p.is_excluded("DRAFT-2023", EntryKind::Directory));
    }

    #[test]
    fn invalid_pattern_reported_and_skipped() {
        let (p, errors) = policy(r#"{"regex": ["/([unclosed/", "/\\.tmp$/"]}"#);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            PolicyError::InvalidRegex { pattern, .. } if pattern == "/([unclosed/"
        ));
        assert_eq!(p.pattern_count(), 1);
        assert!(p.is_excluded("cache.tmp", EntryKind::File));
        assert!(!p.is_excluded("([unclosed", EntryKind::File));
    }

    #[test]
    fn unsupported_flag_is_policy_error() {
        let (_, errors) = policy(r#"{"regex": ["/abc/q"]}"#);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn split_delimiters_forms() {
        assert_eq!(split_delimiters("/abc/"), ("abc", ""));
        assert_eq!(split_delimiters("/abc/im"), ("abc", "im"));
        assert_eq!(split_delimiters("/a/b/"), ("a/b", ""));
        assert_eq!(split_delimiters("abc"), ("abc", ""));
        assert_eq!(split_delimiters("/abc"), ("/abc", ""));
    }

    // =========================================================================
    // ExclusionSpec parsing
    // =========================================================================

    #[test]
    fn missing_keys_default_to_empty() {
        let spec = ExclusionSpec::from_json("{}").unwrap();
        assert_eq!(spec, ExclusionSpec::default());
    }

    #[test]
    fn non_array_values_treated_as_empty() {
        let spec = ExclusionSpec::from_json(r#"{"directories": "hidden", "files": null}"#).unwrap();
        assert!(spec.directories.is_empty());
        assert!(spec.files.is_empty());
    }

    #[test]
    fn malformed_json_is_error() {
        assert!(ExclusionSpec::from_json("{\"directories\": [").is_err());
        assert!(ExclusionSpec::from_json("[]").is_err());
    }
}

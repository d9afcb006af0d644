//! Display names, slugs, icon classes, and size labels.
//!
//! Everything the listing shows about an entry that can be derived from its
//! name alone lives here, so the rules are shared by the sync walk (page
//! titles, slugs) and the renderer (entry titles, icons, sizes).
//!
//! ## Titles
//!
//! Underscores and dashes become spaces and every word gets a capital first
//! letter. The remainder of each word is left alone, so acronyms survive:
//! - `annual_report-2023` → "Annual Report 2023"
//! - `HR_policies` → "HR Policies"
//! - `meeting_notes.pdf` → "Meeting Notes" (file extension dropped)
//!
//! ## Icons
//!
//! Directories take their icon class from the user-supplied [`IconMap`]
//! (exact, case-sensitive name match) and fall back to [`FOLDER_ICON`].
//! Files are classified by lowercased extension through a fixed table.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Icon class for directories without a custom entry.
pub const FOLDER_ICON: &str = "fas fa-folder";

/// Icon class for files whose extension is not in the table.
pub const FILE_ICON: &str = "fas fa-file";

const FILE_ICONS: &[(&str, &str)] = &[
    ("pdf", "fa-file-pdf"),
    ("doc", "fa-file-word"),
    ("docx", "fa-file-word"),
    ("jpg", "fa-file-image"),
    ("jpeg", "fa-file-image"),
    ("png", "fa-file-image"),
    ("txt", "fa-file-text"),
    ("xls", "fa-file-excel"),
    ("xlsx", "fa-file-excel"),
    ("ppt", "fa-file-powerpoint"),
    ("pptx", "fa-file-powerpoint"),
    ("csv", "fa-file-csv"),
    ("zip", "fa-file-zipper"),
];

const SIZE_UNITS: &[&str] = &["B", "kB", "MB", "GB", "TB"];

const MAX_SLUG_LEN: usize = 80;

/// Turn a raw directory name into a display title.
pub fn titleize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a file name into a display title, dropping the last extension.
///
/// `quarterly_report.final.pdf` → "Quarterly Report.final"
pub fn titleize_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    titleize(&stem)
}

/// Turn a metadata key into a label.
///
/// camelCase keys are split at each lower→upper boundary (`creationDate` →
/// "Creation Date"); snake_case keys go through [`titleize`].
pub fn titleize_key(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if prev_lower && c.is_uppercase() {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }
    titleize(&spaced)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build a URL-safe slug from a title.
///
/// - Lowercases ASCII letters
/// - Replaces anything that is not alphanumeric with a dash
/// - Collapses runs of dashes and strips them from both ends
/// - Truncates to [`MAX_SLUG_LEN`] at the last dash before the limit
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Icon class for a file, keyed by its lowercased extension.
pub fn file_icon_class(filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    FILE_ICONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, icon)| format!("fas {icon}"))
        .unwrap_or_else(|| FILE_ICON.to_string())
}

/// Format a byte count with two decimals.
///
/// The unit is picked from the number of decimal digits in `bytes`, not by
/// dividing until the value drops below 1024, so `1000` renders as
/// `"0.98kB"`.
pub fn format_filesize(bytes: u64) -> String {
    let digits = bytes.to_string().len();
    let factor = ((digits - 1) / 3).min(SIZE_UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(factor as i32);
    format!("{:.2}{}", value, SIZE_UNITS[factor])
}

/// User-supplied directory name → icon class mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct IconMap(BTreeMap<String, String>);

impl IconMap {
    /// Parse the JSON object form, e.g. `{"Archive": "fas fa-box-archive"}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Icon class for a directory name, falling back to [`FOLDER_ICON`].
    pub fn folder_icon(&self, dir_name: &str) -> &str {
        self.0
            .get(dir_name)
            .map(String::as_str)
            .unwrap_or(FOLDER_ICON)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

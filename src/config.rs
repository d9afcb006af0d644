//! Settings file.
//!
//! All administrative operations read one TOML file, `dirmapper.toml` by
//! default. The document root is the only required key; everything else has
//! a default.
//!
//! ## Configuration Options
//!
//! ```toml
//! root_directory = "/srv/docs"   # Directory tree to mirror (required)
//! store = "pages.json"           # Page store, relative to this file
//! skip_empty = false             # No pages for directories with nothing to list
//! disable_breadcrumbs = false
//! date_format = "%B %-d, %Y"     # strftime format for metadata dates
//! file_url_base = "/files"       # URL that serves root_directory
//! folder_icons = '{"Archive": "fas fa-box-archive"}'
//! exclusions = '{"directories": ["private"], "files": ["thumbs.db"], "regex": ["/\\.tmp$/"]}'
//! ```
//!
//! `folder_icons` and `exclusions` are JSON objects stored as strings, the
//! form the settings form has always accepted. Blank values mean `{}`.
//! A value that is not a valid JSON object never aborts an operation: on
//! update the previous value is kept, and on load the built-in default is
//! used. Both cases produce a warning.
//!
//! Unknown keys are rejected to catch typos early.

use crate::exclusion::{ExclusionPolicy, ExclusionSpec};
use crate::naming::IconMap;
use crate::render::{DEFAULT_DATE_FORMAT, DEFAULT_FILE_URL_BASE, ListingOptions};
use crate::scan;
use crate::sync::SyncOptions;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default settings file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "dirmapper.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Invalid root directory '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },
    #[error("Invalid JSON for {key}: {message}")]
    InvalidJson { key: &'static str, message: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub root_directory: String,
    pub store: String,
    pub skip_empty: bool,
    pub disable_breadcrumbs: bool,
    pub date_format: String,
    pub file_url_base: String,
    /// JSON object: directory name → icon class
    pub folder_icons: String,
    /// JSON object with `directories`, `files` and `regex` lists
    pub exclusions: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_directory: String::new(),
            store: "pages.json".to_string(),
            skip_empty: false,
            disable_breadcrumbs: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            file_url_base: DEFAULT_FILE_URL_BASE.to_string(),
            folder_icons: "{}".to_string(),
            exclusions: "{}".to_string(),
        }
    }
}

/// New values for some settings. `None` leaves a setting as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub root_directory: Option<String>,
    pub store: Option<String>,
    pub skip_empty: Option<bool>,
    pub disable_breadcrumbs: Option<bool>,
    pub date_format: Option<String>,
    pub file_url_base: Option<String>,
    pub folder_icons: Option<String>,
    pub exclusions: Option<String>,
}

/// Settings turned into what a sync pass needs.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub options: SyncOptions,
    pub store_path: PathBuf,
    pub warnings: Vec<String>,
}

impl Settings {
    /// Reject values no operation can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.trim().is_empty() {
            return Err(ConfigError::Validation("store must not be empty".into()));
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(ConfigError::Validation(format!(
                "date_format '{}' is not a valid strftime format",
                self.date_format
            )));
        }
        Ok(())
    }

    /// Merge an update. Returns a warning for each value that was refused.
    pub fn apply(&mut self, update: SettingsUpdate) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(root) = update.root_directory {
            self.root_directory = root;
        }
        if let Some(store) = update.store {
            if store.trim().is_empty() {
                warnings.push("store must not be empty; keeping previous value".to_string());
            } else {
                self.store = store;
            }
        }
        if let Some(skip) = update.skip_empty {
            self.skip_empty = skip;
        }
        if let Some(disable) = update.disable_breadcrumbs {
            self.disable_breadcrumbs = disable;
        }
        if let Some(format) = update.date_format {
            if is_valid_date_format(&format) {
                self.date_format = format;
            } else {
                warnings.push(format!(
                    "date_format '{format}' is not a valid strftime format; keeping previous value"
                ));
            }
        }
        if let Some(base) = update.file_url_base {
            self.file_url_base = base;
        }
        if let Some(raw) = update.folder_icons {
            match normalize_json("folder_icons", &raw, |s| IconMap::from_json(s).map(drop)) {
                Ok(json) => self.folder_icons = json,
                Err(err) => warnings.push(format!("{err}; keeping previous value")),
            }
        }
        if let Some(raw) = update.exclusions {
            match normalize_json("exclusions", &raw, |s| ExclusionSpec::from_json(s).map(drop)) {
                Ok(json) => self.exclusions = json,
                Err(err) => warnings.push(format!("{err}; keeping previous value")),
            }
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        warnings
    }

    /// Absolute location of the page store.
    pub fn store_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.store)
    }

    /// Canonical root directory. Relative paths are taken from `config_dir`.
    pub fn root_path(&self, config_dir: &Path) -> Result<PathBuf, ConfigError> {
        let raw = self.root_directory.trim();
        if raw.is_empty() {
            return Err(ConfigError::InvalidRoot {
                path: String::new(),
                reason: "root_directory is not set".into(),
            });
        }
        scan::resolve_root(&config_dir.join(raw)).map_err(|e| ConfigError::InvalidRoot {
            path: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Build sync options. Only a missing or unusable root is fatal; bad
    /// icon or exclusion JSON and bad patterns become warnings.
    pub fn resolve(&self, config_dir: &Path) -> Result<Resolved, ConfigError> {
        let root = self.root_path(config_dir)?;
        let mut warnings = Vec::new();

        let icons = match IconMap::from_json(blank_as_empty_object(&self.folder_icons)) {
            Ok(icons) => icons,
            Err(e) => {
                let warning = format!("Invalid JSON for folder_icons: {e}; using no custom icons");
                tracing::warn!("{warning}");
                warnings.push(warning);
                IconMap::default()
            }
        };

        let policy = match ExclusionSpec::from_json(blank_as_empty_object(&self.exclusions)) {
            Ok(spec) => {
                let (policy, errors) = spec.compile();
                warnings.extend(errors.iter().map(|e| e.to_string()));
                policy
            }
            Err(e) => {
                let warning = format!("Invalid JSON for exclusions: {e}; excluding nothing");
                tracing::warn!("{warning}");
                warnings.push(warning);
                ExclusionPolicy::none()
            }
        };

        Ok(Resolved {
            options: SyncOptions {
                root,
                skip_empty: self.skip_empty,
                policy,
                listing: ListingOptions {
                    disable_breadcrumbs: self.disable_breadcrumbs,
                    icons,
                    date_format: self.date_format.clone(),
                    file_url_base: self.file_url_base.clone(),
                },
            },
            store_path: self.store_path(config_dir),
            warnings,
        })
    }
}

fn blank_as_empty_object(raw: &str) -> &str {
    match raw.trim() {
        "" => "{}",
        trimmed => trimmed,
    }
}

fn normalize_json(
    key: &'static str,
    raw: &str,
    check: impl Fn(&str) -> Result<(), serde_json::Error>,
) -> Result<String, ConfigError> {
    let json = blank_as_empty_object(raw);
    check(json).map_err(|e| ConfigError::InvalidJson {
        key,
        message: e.to_string(),
    })?;
    Ok(json.to_string())
}

fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Directory that relative paths in the settings file are resolved against.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    settings.validate()?;
    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content)?;
    tracing::debug!(path = %path.display(), "settings saved");
    Ok(())
}

/// Returns a fully-commented stock settings file with all keys and defaults.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# dirmapper settings
# ==================
# Only root_directory is required. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory tree to mirror. Relative paths are taken from this file's
# directory. Each subdirectory becomes a page; the root itself has none.
root_directory = ""

# Page store file, relative to this file's directory.
store = "pages.json"

# Give no page to directories with nothing to list after exclusions.
skip_empty = false

# Leave the " / Parent / Child" trail out of listings.
disable_breadcrumbs = false

# strftime format for dates found in document metadata.
date_format = "%B %-d, %Y"

# URL prefix under which root_directory is served. File links are this
# prefix followed by the file's path relative to the root.
file_url_base = "/files"

# ---------------------------------------------------------------------------
# JSON-valued settings
# ---------------------------------------------------------------------------

# Directory name (exact, case-sensitive) -> icon class.
# Example: '{"Archive": "fas fa-box-archive", "Forms": "fas fa-pen"}'
folder_icons = '{}'

# Entries left out of the mirror. Names are matched case-insensitively;
# regex patterns are tested against bare entry names and may be written
# with delimiters and flags, like "/^draft/i".
# Example: '{"directories": ["private"], "files": ["thumbs.db"], "regex": ["/\\.tmp$/"]}'
exclusions = '{}'
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::EntryKind;
    use tempfile::TempDir;

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let settings: Settings = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "root_directory = \"/srv/docs\"\nskip_empty = true\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.root_directory, "/srv/docs");
        assert!(settings.skip_empty);
        assert_eq!(settings.store, "pages.json");
        assert_eq!(settings.date_format, DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "skip_emtpy = true\n").unwrap();
        assert!(matches!(load_settings(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_date_format_rejected_on_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "date_format = \"%Q\"\n").unwrap();
        assert!(matches!(load_settings(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn save_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        let settings = Settings {
            root_directory: "docs".into(),
            exclusions: r#"{"regex": ["/\\.tmp$/"]}"#.into(),
            folder_icons: r#"{"Archive": "fas fa-box-archive"}"#.into(),
            ..Settings::default()
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    // =========================================================================
    // Updates
    // =========================================================================

    #[test]
    fn update_sets_given_fields_only() {
        let mut settings = Settings::default();
        let warnings = settings.apply(SettingsUpdate {
            root_directory: Some("/srv/docs".into()),
            skip_empty: Some(true),
            ..SettingsUpdate::default()
        });
        assert!(warnings.is_empty());
        assert_eq!(settings.root_directory, "/srv/docs");
        assert!(settings.skip_empty);
        assert!(!settings.disable_breadcrumbs);
    }

    #[test]
    fn update_blank_json_becomes_empty_object() {
        let mut settings = Settings {
            folder_icons: r#"{"A": "fas fa-a"}"#.into(),
            ..Settings::default()
        };
        let warnings = settings.apply(SettingsUpdate {
            folder_icons: Some("  ".into()),
            exclusions: Some(String::new()),
            ..SettingsUpdate::default()
        });
        assert!(warnings.is_empty());
        assert_eq!(settings.folder_icons, "{}");
        assert_eq!(settings.exclusions, "{}");
    }

    #[test]
    fn update_malformed_json_keeps_previous() {
        let previous = r#"{"directories": ["private"]}"#;
        let mut settings = Settings {
            exclusions: previous.into(),
            ..Settings::default()
        };
        let warnings = settings.apply(SettingsUpdate {
            exclusions: Some(r#"{"directories": ["#.into()),
            folder_icons: Some("[1, 2]".into()),
            ..SettingsUpdate::default()
        });
        assert_eq!(warnings.len(), 2);
        assert_eq!(settings.exclusions, previous);
        assert_eq!(settings.folder_icons, "{}");
    }

    #[test]
    fn update_invalid_date_format_keeps_previous() {
        let mut settings = Settings::default();
        let warnings = settings.apply(SettingsUpdate {
            date_format: Some("%Q".into()),
            ..SettingsUpdate::default()
        });
        assert_eq!(warnings.len(), 1);
        assert_eq!(settings.date_format, DEFAULT_DATE_FORMAT);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn resolve_requires_root() {
        let tmp = TempDir::new().unwrap();
        let result = Settings::default().resolve(tmp.path());
        assert!(matches!(result, Err(ConfigError::InvalidRoot { .. })));
    }

    #[test]
    fn resolve_rejects_missing_root() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            root_directory: "does-not-exist".into(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.resolve(tmp.path()),
            Err(ConfigError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn resolve_relative_paths_from_config_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        let settings = Settings {
            root_directory: "docs".into(),
            skip_empty: true,
            ..Settings::default()
        };

        let resolved = settings.resolve(tmp.path()).unwrap();
        assert_eq!(
            resolved.options.root,
            dunce::canonicalize(tmp.path().join("docs")).unwrap()
        );
        assert_eq!(resolved.store_path, tmp.path().join("pages.json"));
        assert!(resolved.options.skip_empty);
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn resolve_compiles_policy_and_icons() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            root_directory: tmp.path().to_string_lossy().into_owned(),
            folder_icons: r#"{"Archive": "fas fa-box-archive"}"#.into(),
            exclusions: r#"{"directories": ["private"], "regex": ["/([bad/"]}"#.into(),
            ..Settings::default()
        };

        let resolved = settings.resolve(tmp.path()).unwrap();
        let opts = &resolved.options;
        assert!(opts.policy.is_excluded("Private", EntryKind::Directory));
        assert_eq!(opts.listing.icons.folder_icon("Archive"), "fas fa-box-archive");
        // The bad pattern is a warning, not an error
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn resolve_malformed_json_falls_back_with_warning() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            root_directory: tmp.path().to_string_lossy().into_owned(),
            folder_icons: "{oops".into(),
            exclusions: "\"hidden\"".into(),
            ..Settings::default()
        };

        let resolved = settings.resolve(tmp.path()).unwrap();
        assert_eq!(resolved.warnings.len(), 2);
        assert!(resolved.options.listing.icons.is_empty());
        assert!(!resolved.options.policy.is_excluded("hidden", EntryKind::Directory));
    }

    #[test]
    fn config_dir_of_bare_file_name_is_cwd() {
        assert_eq!(config_dir(Path::new("dirmapper.toml")), PathBuf::from("."));
        assert_eq!(config_dir(Path::new("/etc/dirmapper.toml")), PathBuf::from("/etc"));
    }
}

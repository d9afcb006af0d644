//! Administrative operations, each one run under the store lock.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`regenerate`] | One sync pass over the configured root |
//! | [`delete_all_pages`] | Remove every page mirroring the root |
//! | [`update_settings`] | Save new settings, then regenerate |
//! | [`find_directory_page`] | Look up the page for one directory |
//!
//! Opening the [`JsonPageStore`] takes its exclusive lock, and the store is
//! dropped (releasing the lock) when the operation returns.

use crate::config::{self, Settings, SettingsUpdate};
use crate::scan::path_key;
use crate::store::{JsonPageStore, PageStore};
use crate::sync::{self, SyncError, SyncReport};
use crate::types::Page;
use std::path::{Path, PathBuf};

/// Result of an operation that walked the root.
#[derive(Debug)]
pub struct Outcome {
    pub root: PathBuf,
    pub report: SyncReport,
}

/// Run a sync pass with `settings`. Paths are resolved from `config_dir`.
pub fn regenerate(settings: &Settings, config_dir: &Path) -> Result<Outcome, SyncError> {
    let resolved = settings.resolve(config_dir)?;
    let mut store = JsonPageStore::open(&resolved.store_path)?;
    let mut report = sync::sync(&mut store, &resolved.options)?;

    // Settings problems come first in the report
    let mut warnings = resolved.warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    Ok(Outcome {
        root: resolved.options.root,
        report,
    })
}

/// Delete every page mirroring the configured root, regardless of exclusions.
pub fn delete_all_pages(settings: &Settings, config_dir: &Path) -> Result<Outcome, SyncError> {
    let root = settings.root_path(config_dir)?;
    let mut store = JsonPageStore::open(&settings.store_path(config_dir))?;
    let report = sync::delete_all(&mut store, &root)?;
    Ok(Outcome { root, report })
}

/// Apply `update` to the settings file at `config_path`, save it, then
/// regenerate with the saved settings.
///
/// Refused values (malformed JSON, bad date format) keep their previous
/// setting and are reported as warnings. The file is saved even when the
/// regeneration that follows fails.
pub fn update_settings(
    config_path: &Path,
    update: SettingsUpdate,
) -> Result<(Settings, Outcome), SyncError> {
    let mut settings = config::load_settings(config_path)?;
    let mut warnings = settings.apply(update);
    config::save_settings(config_path, &settings)?;
    tracing::info!(path = %config_path.display(), "settings saved");

    let mut outcome = regenerate(&settings, &config::config_dir(config_path))?;
    warnings.append(&mut outcome.report.warnings);
    outcome.report.warnings = warnings;
    Ok((settings, outcome))
}

/// Page for `dir`, given relative to the root or as an absolute path.
pub fn find_directory_page(
    settings: &Settings,
    config_dir: &Path,
    dir: &Path,
) -> Result<Option<Page>, SyncError> {
    let root = settings.root_path(config_dir)?;
    let candidate = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    };
    // A directory that has since vanished can still have a page
    let key = path_key(&dunce::canonicalize(&candidate).unwrap_or(candidate));

    let store = JsonPageStore::open(&settings.store_path(config_dir))?;
    Ok(store
        .find_by_path(&key)
        .and_then(|id| store.get(id))
        .cloned())
}

/// Open the configured store for read-only display.
pub fn open_store(settings: &Settings, config_dir: &Path) -> Result<JsonPageStore, SyncError> {
    Ok(JsonPageStore::open(&settings.store_path(config_dir))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{add_path, build_tree, page_titles};
    use std::fs;
    use tempfile::TempDir;

    /// Settings file in its own directory pointing at `root`.
    fn write_settings(root: &Path, extra: &str) -> (TempDir, PathBuf) {
        let cfg = TempDir::new().unwrap();
        let path = cfg.path().join(config::CONFIG_FILE);
        let root = toml::Value::String(root.to_string_lossy().into_owned());
        fs::write(&path, format!("root_directory = {root}\n{extra}")).unwrap();
        (cfg, path)
    }

    fn load(path: &Path) -> Settings {
        config::load_settings(path).unwrap()
    }

    #[test]
    fn regenerate_persists_pages() {
        let docs = build_tree(&["Policies/HR/handbook.pdf"]);
        let (cfg, path) = write_settings(docs.path(), "");

        let outcome = regenerate(&load(&path), cfg.path()).unwrap();
        assert_eq!(outcome.report.created.len(), 2);

        let store = JsonPageStore::open(&cfg.path().join("pages.json")).unwrap();
        assert_eq!(page_titles(&store), vec!["HR", "Policies"]);
    }

    #[test]
    fn regenerate_invalid_root_is_fatal() {
        let cfg = TempDir::new().unwrap();
        let result = regenerate(&Settings::default(), cfg.path());
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn regenerate_reports_settings_warnings_first() {
        let docs = build_tree(&["A/x.txt"]);
        let (cfg, path) = write_settings(docs.path(), "folder_icons = '{broken'\n");

        let outcome = regenerate(&load(&path), cfg.path()).unwrap();
        assert_eq!(outcome.report.warnings.len(), 1);
        assert!(outcome.report.warnings[0].contains("folder_icons"));
    }

    #[test]
    fn regenerate_fails_while_store_locked() {
        let docs = build_tree(&["A/x.txt"]);
        let (cfg, path) = write_settings(docs.path(), "");
        let _held = JsonPageStore::open(&cfg.path().join("pages.json")).unwrap();

        let result = regenerate(&load(&path), cfg.path());
        assert!(matches!(
            result,
            Err(SyncError::Store(crate::store::StoreError::Locked(_)))
        ));
    }

    #[test]
    fn update_settings_saves_then_regenerates() {
        let docs = build_tree(&["keep/a.txt", "private/b.txt"]);
        let (cfg, path) = write_settings(docs.path(), "");
        regenerate(&load(&path), cfg.path()).unwrap();

        let (settings, outcome) = update_settings(
            &path,
            SettingsUpdate {
                exclusions: Some(r#"{"directories": ["private"]}"#.into()),
                ..SettingsUpdate::default()
            },
        )
        .unwrap();

        assert_eq!(load(&path), settings);
        assert_eq!(outcome.report.deleted.len(), 1);
        let store = open_store(&settings, cfg.path()).unwrap();
        assert_eq!(page_titles(&store), vec!["Keep"]);
    }

    #[test]
    fn update_settings_keeps_previous_on_bad_json() {
        let docs = build_tree(&["A/x.txt"]);
        let (cfg, path) = write_settings(docs.path(), "exclusions = '{\"files\": [\"x.txt\"]}'\n");

        let (settings, outcome) = update_settings(
            &path,
            SettingsUpdate {
                exclusions: Some("{nope".into()),
                ..SettingsUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(settings.exclusions, r#"{"files": ["x.txt"]}"#);
        assert_eq!(outcome.report.warnings.len(), 1);
        assert!(cfg.path().join("pages.json").exists());
    }

    #[test]
    fn delete_all_pages_ignores_exclusions() {
        let docs = build_tree(&["A/x.txt", "B/C/"]);
        let (cfg, path) = write_settings(docs.path(), "");
        regenerate(&load(&path), cfg.path()).unwrap();

        let excluding = Settings {
            exclusions: r#"{"directories": ["B"]}"#.into(),
            ..load(&path)
        };
        add_path(docs.path(), "D/y.txt");
        let outcome = delete_all_pages(&excluding, cfg.path()).unwrap();
        assert_eq!(outcome.report.deleted.len(), 3);
        assert!(open_store(&excluding, cfg.path()).unwrap().is_empty());
    }

    #[test]
    fn find_directory_page_by_relative_path() {
        let docs = build_tree(&["Policies/HR/handbook.pdf"]);
        let (cfg, path) = write_settings(docs.path(), "");
        let settings = load(&path);
        regenerate(&settings, cfg.path()).unwrap();

        let page = find_directory_page(&settings, cfg.path(), Path::new("Policies/HR"))
            .unwrap()
            .unwrap();
        assert_eq!(page.title, "HR");
        assert!(page.content.contains("handbook.pdf"));

        assert!(find_directory_page(&settings, cfg.path(), Path::new("Nope")).unwrap().is_none());
    }
}

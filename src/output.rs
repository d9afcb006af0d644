//! CLI output formatting for all administrative operations.
//!
//! # Information-First Display
//!
//! Pages are shown by title and positional index, with the directory they
//! mirror as an indented `Source:` line. Paths under the root are shown
//! relative to it, so the output reads as a content inventory.
//!
//! # Output Format
//!
//! ## Regenerate
//!
//! ```text
//! Created
//!     Policies/HR
//! Updated
//!     Policies
//! Skipped
//!     Drafts: empty
//! Warnings
//!     invalid exclusion pattern "/([bad/": regex parse error
//!
//! Synced 2 pages: 1 created, 1 updated, 0 unchanged, 0 deleted
//! ```
//!
//! ## Pages
//!
//! ```text
//! 001 Policies → /policies/
//!     Source: Policies/
//!     001 HR → /policies/hr/
//!         Source: Policies/HR/
//! 002 Legacy → /legacy/
//!
//! 3 pages
//! ```
//!
//! # Architecture
//!
//! Each operation has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::Settings;
use crate::store::PageStore;
use crate::sync::SyncReport;
use crate::types::{Page, PageId};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Show `path` relative to `root` when it lies under it.
fn display_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => path.display().to_string(),
    }
}

fn section(lines: &mut Vec<String>, heading: &str, items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    lines.push(heading.to_string());
    lines.extend(items.into_iter().map(|item| format!("{}{}", indent(1), item)));
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Regenerate / delete
// ============================================================================

/// Format the outcome of a sync pass.
pub fn format_sync_report(report: &SyncReport, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let rel = |p: &Path| display_path(p, root);

    section(&mut lines, "Created", report.created.iter().map(|p| rel(p)).collect());
    section(&mut lines, "Updated", report.updated.iter().map(|p| rel(p)).collect());
    section(
        &mut lines,
        "Deleted",
        report.deleted.iter().map(|d| rel(Path::new(d))).collect(),
    );
    section(
        &mut lines,
        "Skipped",
        report
            .skipped
            .iter()
            .map(|s| format!("{}: {}", rel(&s.path), s.reason))
            .collect(),
    );
    section(&mut lines, "Warnings", report.warnings.clone());

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let touched = report.created.len() + report.updated.len() + report.unchanged;
    lines.push(format!(
        "Synced {}: {} created, {} updated, {} unchanged, {} deleted",
        plural(touched, "page"),
        report.created.len(),
        report.updated.len(),
        report.unchanged,
        report.deleted.len()
    ));
    lines
}

pub fn print_sync_report(report: &SyncReport, root: &Path) {
    for line in format_sync_report(report, root) {
        println!("{}", line);
    }
}

/// Format the outcome of a teardown.
pub fn format_teardown_report(report: &SyncReport, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    section(
        &mut lines,
        "Deleted",
        report
            .deleted
            .iter()
            .map(|d| display_path(Path::new(d), root))
            .collect(),
    );
    section(&mut lines, "Warnings", report.warnings.clone());
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("Deleted {}", plural(report.deleted.len(), "page")));
    lines
}

pub fn print_teardown_report(report: &SyncReport, root: &Path) {
    for line in format_teardown_report(report, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Pages
// ============================================================================

/// Format the page hierarchy, siblings ordered by title.
///
/// `root` shortens `Source:` lines; pass `None` to show absolute paths.
pub fn format_page_tree<S: PageStore + ?Sized>(store: &S, root: Option<&Path>) -> Vec<String> {
    let pages = store.pages();
    let mut children: BTreeMap<Option<PageId>, Vec<&Page>> = BTreeMap::new();
    for &page in &pages {
        // A dangling parent link is shown at the top level
        let parent = page.parent.filter(|id| store.get(*id).is_some());
        children.entry(parent).or_default().push(page);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    }

    let mut lines = Vec::new();
    push_subtree(store, &children, None, 0, root, &mut lines);
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(plural(pages.len(), "page"));
    lines
}

fn push_subtree<S: PageStore + ?Sized>(
    store: &S,
    children: &BTreeMap<Option<PageId>, Vec<&Page>>,
    parent: Option<PageId>,
    depth: usize,
    root: Option<&Path>,
    lines: &mut Vec<String>,
) {
    let Some(siblings) = children.get(&parent) else {
        return;
    };
    for (i, page) in siblings.iter().enumerate() {
        let permalink = store.permalink(page.id).unwrap_or_default();
        lines.push(format!(
            "{}{} {} → {}",
            indent(depth),
            format_index(i + 1),
            page.title,
            permalink
        ));
        if let Some(dir) = &page.directory_path {
            let shown = match root {
                Some(root) => format!("{}/", display_path(Path::new(dir), root)),
                None => dir.clone(),
            };
            lines.push(format!("{}Source: {}", indent(depth + 1), shown));
        }
        push_subtree(store, children, Some(page.id), depth + 1, root, lines);
    }
}

pub fn print_page_tree<S: PageStore + ?Sized>(store: &S, root: Option<&Path>) {
    for line in format_page_tree(store, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Format the effective settings, one `key = value` per line.
pub fn format_settings(settings: &Settings, source: &Path) -> Vec<String> {
    let root = if settings.root_directory.is_empty() {
        "(not set)".to_string()
    } else {
        settings.root_directory.clone()
    };
    vec![
        format!("Settings: {}", source.display()),
        format!("{}root_directory = {}", indent(1), root),
        format!("{}store = {}", indent(1), settings.store),
        format!("{}skip_empty = {}", indent(1), settings.skip_empty),
        format!("{}disable_breadcrumbs = {}", indent(1), settings.disable_breadcrumbs),
        format!("{}date_format = {}", indent(1), settings.date_format),
        format!("{}file_url_base = {}", indent(1), settings.file_url_base),
        format!("{}folder_icons = {}", indent(1), settings.folder_icons),
        format!("{}exclusions = {}", indent(1), settings.exclusions),
    ]
}

pub fn print_settings(settings: &Settings, source: &Path) {
    for line in format_settings(settings, source) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPageStore;
    use crate::sync::Skipped;
    use crate::types::NewPage;

    fn page(
        store: &mut MemoryPageStore,
        title: &str,
        parent: Option<PageId>,
        path: &str,
    ) -> PageId {
        store
            .create(NewPage {
                title: title.into(),
                parent,
                directory_path: path.into(),
            })
            .unwrap()
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn display_path_relative_to_root() {
        let root = Path::new("/srv/docs");
        assert_eq!(display_path(Path::new("/srv/docs/HR/Leave"), root), "HR/Leave");
        assert_eq!(display_path(Path::new("/elsewhere"), root), "/elsewhere");
        assert_eq!(display_path(root, root), "/srv/docs");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "page"), "1 page");
        assert_eq!(plural(0, "page"), "0 pages");
    }

    // =========================================================================
    // Reports
    // =========================================================================

    #[test]
    fn sync_report_sections() {
        let root = Path::new("/srv/docs");
        let report = SyncReport {
            created: vec![root.join("Policies").join("HR")],
            updated: vec![root.join("Policies")],
            unchanged: 2,
            deleted: vec!["/srv/docs/Old".into()],
            skipped: vec![Skipped {
                path: root.join("Drafts"),
                reason: "empty".into(),
            }],
            warnings: vec!["something odd".into()],
        };

        let lines = format_sync_report(&report, root);
        assert_eq!(
            lines,
            vec![
                "Created",
                "    Policies/HR",
                "Updated",
                "    Policies",
                "Deleted",
                "    Old",
                "Skipped",
                "    Drafts: empty",
                "Warnings",
                "    something odd",
                "",
                "Synced 4 pages: 1 created, 1 updated, 2 unchanged, 1 deleted",
            ]
        );
    }

    #[test]
    fn empty_sync_report_is_summary_only() {
        let lines = format_sync_report(&SyncReport::default(), Path::new("/r"));
        assert_eq!(lines, vec!["Synced 0 pages: 0 created, 0 updated, 0 unchanged, 0 deleted"]);
    }

    #[test]
    fn teardown_report_lists_deleted() {
        let report = SyncReport {
            deleted: vec!["/r/A".into(), "/r/A/B".into()],
            ..SyncReport::default()
        };
        let lines = format_teardown_report(&report, Path::new("/r"));
        assert_eq!(lines, vec!["Deleted", "    A", "    A/B", "", "Deleted 2 pages"]);
    }

    // =========================================================================
    // Page tree
    // =========================================================================

    #[test]
    fn page_tree_nests_children() {
        let mut store = MemoryPageStore::new();
        let policies = page(&mut store, "Policies", None, "/r/Policies");
        page(&mut store, "HR", Some(policies), "/r/Policies/HR");
        store.insert_legacy("Legacy", None).unwrap();

        let lines = format_page_tree(&store, Some(Path::new("/r")));
        assert_eq!(
            lines,
            vec![
                "001 Legacy → /legacy/",
                "002 Policies → /policies/",
                "    Source: Policies/",
                "    001 HR → /policies/hr/",
                "        Source: Policies/HR/",
                "",
                "3 pages",
            ]
        );
    }

    #[test]
    fn page_tree_empty_store() {
        let lines = format_page_tree(&MemoryPageStore::new(), None);
        assert_eq!(lines, vec!["0 pages"]);
    }

    #[test]
    fn settings_listing_marks_unset_root() {
        let lines = format_settings(&Settings::default(), Path::new("dirmapper.toml"));
        assert_eq!(lines[0], "Settings: dirmapper.toml");
        assert_eq!(lines[1], "    root_directory = (not set)");
        assert!(lines.contains(&"    skip_empty = false".to_string()));
    }
}

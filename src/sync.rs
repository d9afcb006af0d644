//! Directory-to-page reconciliation.
//!
//! One pass walks the tree under the root depth-first and brings the page
//! store in line with it:
//!
//! 1. **Decide** per directory with [`plan_node`], a pure function of the
//!    directory's exclusion, emptiness and existing page.
//! 2. **Structure**: create, adopt or re-parent the page, then recurse into
//!    child directories in name order.
//! 3. **Sweep**: delete pages under the root that this pass did not keep.
//!    That covers directories that vanished, became excluded, or became
//!    empty under skip-empty.
//! 4. **Content**: render and store the listing of every kept page. This
//!    runs last so that each link, including one made through a directory
//!    alias anywhere in the tree, points at a page that exists once the
//!    pass is done.
//!
//! The root directory has no page of its own; its children are top-level
//! pages.
//!
//! Failures below the root are per entry. An unreadable directory or a
//! rejected write is recorded in the [`SyncReport`] and its siblings carry
//! on. Only an unreadable root and a failed flush abort the pass.

use crate::config::ConfigError;
use crate::exclusion::{EntryKind, ExclusionPolicy};
use crate::naming::titleize;
use crate::render::{ListingOptions, render_listing};
use crate::scan::{self, DirectoryNode, ScanError, path_key};
use crate::store::{PageStore, StoreError};
use crate::types::{NewPage, Page, PageId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

/// Everything a pass needs to know, fixed for its duration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Canonical root directory
    pub root: PathBuf,
    pub skip_empty: bool,
    pub policy: ExclusionPolicy,
    pub listing: ListingOptions,
}

/// An entry the pass did not mirror, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// What a pass or teardown did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<PathBuf>,
    /// Pages whose listing content changed
    pub updated: Vec<PathBuf>,
    pub unchanged: usize,
    /// Labels of deleted pages, cascaded descendants included
    pub deleted: Vec<String>,
    pub skipped: Vec<Skipped>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(path = %path.display(), "skipped: {reason}");
        self.skipped.push(Skipped {
            path: path.to_path_buf(),
            reason,
        });
    }
}

// ============================================================================
// Decision step
// ============================================================================

/// Facts about one directory gathered before deciding what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFacts {
    pub excluded: bool,
    /// No non-excluded child directories and no non-excluded files
    pub is_empty: bool,
    pub existing: Option<PageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePlan {
    /// Excluded: no page, subtree not descended
    Prune,
    /// Empty under skip-empty with a page that must go
    Remove(PageId),
    /// Empty under skip-empty and nothing to remove
    Ignore,
    Create,
    Reuse(PageId),
}

pub fn plan_node(facts: &NodeFacts, skip_empty: bool) -> NodePlan {
    if facts.excluded {
        return NodePlan::Prune;
    }
    if skip_empty && facts.is_empty {
        return match facts.existing {
            Some(id) => NodePlan::Remove(id),
            None => NodePlan::Ignore,
        };
    }
    match facts.existing {
        Some(id) => NodePlan::Reuse(id),
        None => NodePlan::Create,
    }
}

/// True when nothing in `node` survives the policy.
pub fn is_effectively_empty(node: &DirectoryNode, policy: &ExclusionPolicy) -> bool {
    node.entries
        .iter()
        .all(|e| policy.is_excluded(&e.name, e.kind))
}

// ============================================================================
// Sync pass
// ============================================================================

/// Run one reconciliation pass of `opts.root` against `store`, then flush.
pub fn sync<S: PageStore + ?Sized>(
    store: &mut S,
    opts: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    tracing::info!(root = %opts.root.display(), skip_empty = opts.skip_empty, "sync started");

    let root_node = scan::read_node(&opts.root, &opts.root)?;
    let mut pass = Pass {
        store,
        opts,
        report: SyncReport::default(),
        kept: HashSet::new(),
        protected: Vec::new(),
        pending: Vec::new(),
    };

    pass.note_skipped(&root_node);
    for entry in root_node.dirs() {
        pass.visit(&entry.path, &entry.name, None);
    }
    pass.sweep();
    pass.render_pending();

    let Pass { store, report, .. } = pass;
    store.flush()?;

    tracing::info!(
        created = report.created.len(),
        updated = report.updated.len(),
        unchanged = report.unchanged,
        deleted = report.deleted.len(),
        warnings = report.warnings.len(),
        "sync finished"
    );
    Ok(report)
}

struct Pass<'a, S: PageStore + ?Sized> {
    store: &'a mut S,
    opts: &'a SyncOptions,
    report: SyncReport,
    /// Pages that correspond to a directory seen this pass
    kept: HashSet<PageId>,
    /// Directories that could not be read; their pages are left alone
    protected: Vec<PathBuf>,
    /// Kept pages waiting for their listing, children before parents
    pending: Vec<PendingListing>,
}

struct PendingListing {
    id: PageId,
    node: DirectoryNode,
    created: bool,
}

impl<S: PageStore + ?Sized> Pass<'_, S> {
    fn visit(&mut self, path: &Path, name: &str, parent: Option<PageId>) {
        if self.opts.policy.is_excluded(name, EntryKind::Directory) {
            tracing::debug!(path = %path.display(), "excluded");
            return;
        }

        let node = match scan::read_node(path, &self.opts.root) {
            Ok(node) => node,
            Err(err) => {
                self.report.warn(err.to_string());
                self.report.skip(path, "unreadable");
                self.protected.push(path.to_path_buf());
                return;
            }
        };
        self.note_skipped(&node);

        let key = path_key(path);
        let title = titleize(name);
        let by_path = self.store.find_by_path(&key);
        let legacy = match by_path {
            Some(_) => None,
            None => self.store.find_by_title_and_parent(&title, parent),
        };
        let facts = NodeFacts {
            excluded: false,
            is_empty: is_effectively_empty(&node, &self.opts.policy),
            existing: by_path.or(legacy),
        };

        let plan = plan_node(&facts, self.opts.skip_empty);
        tracing::debug!(path = %path.display(), ?plan, "planned");

        let page_id = match plan {
            NodePlan::Prune => return,
            NodePlan::Ignore => {
                self.report.skip(path, "empty");
                return;
            }
            NodePlan::Remove(id) => {
                self.delete(id);
                self.report.skip(path, "empty");
                return;
            }
            NodePlan::Create => {
                let new_page = NewPage {
                    title,
                    parent,
                    directory_path: key,
                };
                match self.store.create(new_page) {
                    Ok(id) => {
                        self.report.created.push(path.to_path_buf());
                        id
                    }
                    Err(err) => {
                        self.report.warn(format!(
                            "Cannot create page for {}: {err}",
                            path.display()
                        ));
                        self.report.skip(path, "page not created");
                        return;
                    }
                }
            }
            NodePlan::Reuse(id) => {
                if legacy.is_some()
                    && let Err(err) = self.store.attach_path(id, &key)
                {
                    self.report.warn(format!(
                        "Cannot adopt page {id} for {}: {err}",
                        path.display()
                    ));
                }
                self.reparent(id, parent, path);
                id
            }
        };
        self.kept.insert(page_id);

        for entry in node.dirs() {
            self.visit(&entry.path, &entry.name, Some(page_id));
        }

        self.pending.push(PendingListing {
            id: page_id,
            node,
            created: plan == NodePlan::Create,
        });
    }

    fn render_pending(&mut self) {
        for listing in std::mem::take(&mut self.pending) {
            if self.store.get(listing.id).is_none() {
                continue;
            }
            let content =
                render_listing(&listing.node, Some(listing.id), self.opts, &*self.store);
            self.store_content(listing.id, content, &listing.node.path, listing.created);
        }
    }

    fn reparent(&mut self, id: PageId, parent: Option<PageId>, path: &Path) {
        let current = self.store.get(id).and_then(|p| p.parent);
        if current == parent {
            return;
        }
        tracing::debug!(path = %path.display(), page = %id, "re-parenting");
        if let Err(err) = self.store.set_parent(id, parent) {
            self.report.warn(format!(
                "Cannot move page {id} for {}: {err}",
                path.display()
            ));
        }
    }

    fn store_content(&mut self, id: PageId, content: String, path: &Path, created: bool) {
        let unchanged = self.store.get(id).is_some_and(|p| p.content == content);
        if unchanged && !created {
            self.report.unchanged += 1;
            return;
        }
        match self.store.update_content(id, content) {
            Ok(()) if !created => self.report.updated.push(path.to_path_buf()),
            Ok(()) => {}
            Err(err) => {
                self.report.warn(format!(
                    "Cannot update page {id} for {}: {err}",
                    path.display()
                ));
            }
        }
    }

    fn delete(&mut self, id: PageId) {
        let removed = delete_page(self.store, id, &mut self.report);
        for page in removed {
            self.kept.remove(&page.id);
        }
    }

    fn note_skipped(&mut self, node: &DirectoryNode) {
        for skipped in &node.skipped {
            self.report.warn(format!(
                "Skipping {}: {}",
                skipped.path.display(),
                skipped.reason
            ));
            self.report.skip(&skipped.path, skipped.reason.to_string());
        }
    }

    /// Delete every page under the root that was not kept.
    fn sweep(&mut self) {
        let stale: Vec<PageId> = self
            .store
            .pages()
            .iter()
            .filter(|p| !self.kept.contains(&p.id))
            .filter(|p| {
                p.directory_path.as_deref().is_some_and(|dir| {
                    let dir = Path::new(dir);
                    dir.starts_with(&self.opts.root)
                        && !self.protected.iter().any(|prot| dir.starts_with(prot))
                })
            })
            .map(|p| p.id)
            .collect();

        for id in stale {
            // An earlier cascade may already have removed it
            if self.store.get(id).is_some() {
                tracing::debug!(page = %id, "sweeping stale page");
                self.delete(id);
            }
        }
    }
}

fn delete_page<S: PageStore + ?Sized>(
    store: &mut S,
    id: PageId,
    report: &mut SyncReport,
) -> Vec<Page> {
    match store.delete(id) {
        Ok(removed) => {
            report.deleted.extend(removed.iter().map(page_label));
            removed
        }
        Err(err) => {
            report.warn(format!("Cannot delete page {id}: {err}"));
            Vec::new()
        }
    }
}

fn page_label(page: &Page) -> String {
    page.directory_path.clone().unwrap_or_else(|| page.title.clone())
}

// ============================================================================
// Teardown
// ============================================================================

/// Delete every page that mirrors a directory under `root`, ignoring the
/// exclusion policy, then flush.
///
/// Directories are matched by path first and by title and parent for pages
/// that predate the path key. Pages under `root` whose directory no longer
/// exists are removed as well.
pub fn delete_all<S: PageStore + ?Sized>(
    store: &mut S,
    root: &Path,
) -> Result<SyncReport, SyncError> {
    tracing::info!(root = %root.display(), "deleting all pages");
    let mut report = SyncReport::default();
    let mut found: HashMap<PathBuf, PageId> = HashMap::new();
    let mut doomed = Vec::new();

    for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                report.warn(format!("Cannot walk {}: {err}", root.display()));
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        let parent = path.parent().and_then(|p| found.get(p).copied());
        let id = store
            .find_by_path(&path_key(path))
            .or_else(|| store.find_by_title_and_parent(&titleize(&name), parent));
        if let Some(id) = id {
            found.insert(path.to_path_buf(), id);
            doomed.push(id);
        }
    }

    for id in doomed {
        if store.get(id).is_some() {
            delete_page(store, id, &mut report);
        }
    }

    let leftover: Vec<PageId> = store
        .pages()
        .iter()
        .filter(|p| {
            p.directory_path
                .as_deref()
                .is_some_and(|d| Path::new(d).starts_with(root))
        })
        .map(|p| p.id)
        .collect();
    for id in leftover {
        if store.get(id).is_some() {
            delete_page(store, id, &mut report);
        }
    }

    store.flush()?;
    tracing::info!(deleted = report.deleted.len(), "teardown finished");
    Ok(report)
}

//! Shared test utilities for the dirmapper test suite.
//!
//! Fixture trees are built in code rather than copied from disk, so each
//! test states the exact layout it depends on.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = build_tree(&["A/", "B/report.pdf"]);
//! let mut store = MemoryPageStore::new();
//! sync(&mut store, &options(tmp.path())).unwrap();
//!
//! assert_page_tree(&store, &[("B", None)]);
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

use crate::exclusion::ExclusionPolicy;
use crate::render::ListingOptions;
use crate::scan::resolve_root;
use crate::store::{MemoryPageStore, PageStore, StoreError};
use crate::sync::SyncOptions;
use crate::types::{NewPage, Page, PageId};

/// Minimal PDF header with an Info dictionary and a page tree.
pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Title (Quarterly Report) /Author (Jane Doe) \
/CreationDate (D:20230115093000Z) >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 3 >>\nendobj\n";

// =========================================================================
// Fixture setup
// =========================================================================

/// Create a temp tree from relative paths. A trailing `/` makes a directory;
/// anything else is a small file (parents created as needed).
pub fn build_tree(paths: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for rel in paths {
        add_path(tmp.path(), rel);
    }
    tmp
}

/// Add one entry to an existing tree, same rules as [`build_tree`].
pub fn add_path(root: &Path, rel: &str) {
    let full = root.join(rel.trim_end_matches('/'));
    if rel.ends_with('/') {
        fs::create_dir_all(&full).unwrap();
    } else {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let content: &[u8] = if rel.ends_with(".pdf") { SAMPLE_PDF } else { b"content" };
        fs::write(&full, content).unwrap();
    }
}

/// Sync options for `root` with no exclusions and skip-empty off.
pub fn options(root: &Path) -> SyncOptions {
    SyncOptions {
        root: resolve_root(root).unwrap(),
        skip_empty: false,
        policy: ExclusionPolicy::none(),
        listing: ListingOptions::default(),
    }
}

// =========================================================================
// Page lookups
// =========================================================================

/// Find the page with `title`. Panics with the available titles if absent.
pub fn find_page<'a, S: PageStore + ?Sized>(store: &'a S, title: &str) -> &'a Page {
    let pages = store.pages();
    match pages.iter().copied().find(|p| p.title == title) {
        Some(page) => page,
        None => {
            let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
            panic!("page {title:?} not found; have {titles:?}");
        }
    }
}

/// All page titles, sorted.
pub fn page_titles<S: PageStore + ?Sized>(store: &S) -> Vec<String> {
    let mut titles: Vec<String> = store.pages().iter().map(|p| p.title.clone()).collect();
    titles.sort();
    titles
}

/// Assert the exact set of `(title, parent title)` pairs in the store.
pub fn assert_page_tree<S: PageStore + ?Sized>(store: &S, expected: &[(&str, Option<&str>)]) {
    let pages = store.pages();
    let mut actual: Vec<(String, Option<String>)> = pages
        .iter()
        .map(|p| {
            let parent = p
                .parent
                .and_then(|id| store.get(id))
                .map(|parent| parent.title.clone());
            (p.title.clone(), parent)
        })
        .collect();
    actual.sort();

    let mut expected: Vec<(String, Option<String>)> = expected
        .iter()
        .map(|(t, p)| (t.to_string(), p.map(String::from)))
        .collect();
    expected.sort();

    assert_eq!(actual, expected, "page tree mismatch");
}

// =========================================================================
// Failure injection
// =========================================================================

/// Memory store that rejects creation of pages with the given titles.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub inner: MemoryPageStore,
    pub reject: HashSet<String>,
}

impl FailingStore {
    pub fn rejecting(titles: &[&str]) -> Self {
        Self {
            inner: MemoryPageStore::new(),
            reject: titles.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl PageStore for FailingStore {
    fn find_by_path(&self, path: &str) -> Option<PageId> {
        self.inner.find_by_path(path)
    }

    fn find_by_title_and_parent(&self, title: &str, parent: Option<PageId>) -> Option<PageId> {
        self.inner.find_by_title_and_parent(title, parent)
    }

    fn get(&self, id: PageId) -> Option<&Page> {
        self.inner.get(id)
    }

    fn pages(&self) -> Vec<&Page> {
        self.inner.pages()
    }

    fn create(&mut self, page: NewPage) -> Result<PageId, StoreError> {
        if self.reject.contains(&page.title) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("write rejected for '{}'", page.title),
            )));
        }
        self.inner.create(page)
    }

    fn attach_path(&mut self, id: PageId, directory_path: &str) -> Result<(), StoreError> {
        self.inner.attach_path(id, directory_path)
    }

    fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<(), StoreError> {
        self.inner.set_parent(id, parent)
    }

    fn update_content(&mut self, id: PageId, content: String) -> Result<(), StoreError> {
        self.inner.update_content(id, content)
    }

    fn delete(&mut self, id: PageId) -> Result<Vec<Page>, StoreError> {
        self.inner.delete(id)
    }

    fn permalink(&self, id: PageId) -> Option<String> {
        self.inner.permalink(id)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.inner.flush()
    }
}

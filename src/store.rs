//! Hierarchical page repository.
//!
//! The sync engine talks to pages only through the [`PageStore`] trait, so the
//! backing repository can be swapped without touching the walk. Two backends
//! ship with the crate:
//!
//! - [`MemoryPageStore`]: pages in a `BTreeMap`, nothing persisted. Used by
//!   tests and as the working table of the JSON store.
//! - [`JsonPageStore`]: a [`MemoryPageStore`] loaded from and flushed to a
//!   single JSON document.
//!
//! # Keys
//!
//! `directory_path` is the authoritative join key between a page and the
//! directory it mirrors; at most one page carries a given path. Lookup by
//! title and parent exists only to adopt pages written before the path key
//! was recorded, since two differently named directories can titleize to the
//! same string.
//!
//! # Storage format
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_id": 4,
//!   "pages": [
//!     { "id": 1, "title": "Policies", "slug": "policies",
//!       "status": "published", "content": "<div …>",
//!       "directory_path": "/srv/docs/policies" }
//!   ]
//! }
//! ```
//!
//! The document is written to a temporary sibling and renamed into place.
//! Opening a JSON store takes an exclusive advisory lock on `<store>.lock`
//! for the lifetime of the value, so two sync passes can never interleave on
//! one store. A second opener fails with [`StoreError::Locked`].

use crate::naming::slugify;
use crate::types::{NewPage, Page, PageId, PageStatus};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the JSON document. Bump when the page shape changes.
const DOCUMENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parent page {0} does not exist")]
    UnknownParent(PageId),
    #[error("A page already exists for {0}")]
    DuplicatePath(String),
    #[error("Page {0} does not exist")]
    NotFound(PageId),
    #[error("Page {page} cannot be moved under {parent}: it would become its own ancestor")]
    Cycle { page: PageId, parent: PageId },
    #[error("Page store {path} is unreadable: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("Page store {0} is locked by another process")]
    Locked(PathBuf),
}

/// Operations the sync engine needs from a page repository.
pub trait PageStore {
    /// Page whose `directory_path` equals `path` exactly.
    fn find_by_path(&self, path: &str) -> Option<PageId>;

    /// First page with this title under `parent` that has no directory path.
    fn find_by_title_and_parent(&self, title: &str, parent: Option<PageId>) -> Option<PageId>;

    fn get(&self, id: PageId) -> Option<&Page>;

    /// All pages in id order.
    fn pages(&self) -> Vec<&Page>;

    fn create(&mut self, page: NewPage) -> Result<PageId, StoreError>;

    /// Record the directory path of a page that was created without one.
    fn attach_path(&mut self, id: PageId, directory_path: &str) -> Result<(), StoreError>;

    fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<(), StoreError>;

    fn update_content(&mut self, id: PageId, content: String) -> Result<(), StoreError>;

    /// Remove a page and all of its descendants, parents first. Returns the
    /// removed pages.
    fn delete(&mut self, id: PageId) -> Result<Vec<Page>, StoreError>;

    /// Site-relative URL of a page, e.g. `/policies/hr/`.
    fn permalink(&self, id: PageId) -> Option<String>;

    /// Persist pending changes.
    fn flush(&mut self) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone)]
pub struct MemoryPageStore {
    pages: BTreeMap<PageId, Page>,
    next_id: u64,
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn from_document(doc: StoreDocument) -> Self {
        let max_id = doc.pages.iter().map(|p| p.id.0).max().unwrap_or(0);
        Self {
            next_id: doc.next_id.max(max_id + 1),
            pages: doc.pages.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            version: DOCUMENT_VERSION,
            next_id: self.next_id,
            pages: self.pages.values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Insert a page without a directory path, the shape older stores hold.
    pub fn insert_legacy(
        &mut self,
        title: &str,
        parent: Option<PageId>,
    ) -> Result<PageId, StoreError> {
        self.insert(title, parent, None)
    }

    fn insert(
        &mut self,
        title: &str,
        parent: Option<PageId>,
        directory_path: Option<String>,
    ) -> Result<PageId, StoreError> {
        if let Some(parent) = parent
            && !self.pages.contains_key(&parent)
        {
            return Err(StoreError::UnknownParent(parent));
        }
        if let Some(path) = &directory_path
            && self.find_by_path(path).is_some()
        {
            return Err(StoreError::DuplicatePath(path.clone()));
        }

        let id = PageId(self.next_id);
        self.next_id += 1;
        let slug = self.unique_slug(title, parent, id);
        self.pages.insert(
            id,
            Page {
                id,
                title: title.to_string(),
                slug,
                parent,
                status: PageStatus::Published,
                content: String::new(),
                directory_path,
            },
        );
        Ok(id)
    }

    /// Slug for `title` that no sibling under `parent` already uses.
    fn unique_slug(&self, title: &str, parent: Option<PageId>, id: PageId) -> String {
        let base = match slugify(title) {
            s if s.is_empty() => format!("page-{}", id.0),
            s => s,
        };
        let taken = |candidate: &str| {
            self.pages
                .values()
                .any(|p| p.parent == parent && p.id != id && p.slug == candidate)
        };
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut Page, StoreError> {
        self.pages.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    /// `id` followed by every descendant, parents before children.
    fn subtree(&self, id: PageId) -> Vec<PageId> {
        let mut ids = vec![id];
        let mut i = 0;
        while i < ids.len() {
            let current = ids[i];
            ids.extend(
                self.pages
                    .values()
                    .filter(|p| p.parent == Some(current))
                    .map(|p| p.id),
            );
            i += 1;
        }
        ids
    }
}

impl PageStore for MemoryPageStore {
    fn find_by_path(&self, path: &str) -> Option<PageId> {
        self.pages
            .values()
            .find(|p| p.directory_path.as_deref() == Some(path))
            .map(|p| p.id)
    }

    fn find_by_title_and_parent(&self, title: &str, parent: Option<PageId>) -> Option<PageId> {
        self.pages
            .values()
            .find(|p| p.directory_path.is_none() && p.parent == parent && p.title == title)
            .map(|p| p.id)
    }

    fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    fn pages(&self) -> Vec<&Page> {
        self.pages.values().collect()
    }

    fn create(&mut self, page: NewPage) -> Result<PageId, StoreError> {
        self.insert(&page.title, page.parent, Some(page.directory_path))
    }

    fn attach_path(&mut self, id: PageId, directory_path: &str) -> Result<(), StoreError> {
        if let Some(owner) = self.find_by_path(directory_path)
            && owner != id
        {
            return Err(StoreError::DuplicatePath(directory_path.to_string()));
        }
        self.page_mut(id)?.directory_path = Some(directory_path.to_string());
        Ok(())
    }

    fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<(), StoreError> {
        if !self.pages.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if let Some(parent) = parent {
            if !self.pages.contains_key(&parent) {
                return Err(StoreError::UnknownParent(parent));
            }
            if self.subtree(id).contains(&parent) {
                return Err(StoreError::Cycle { page: id, parent });
            }
        }
        let title = self.page_mut(id)?.title.clone();
        let slug = self.unique_slug(&title, parent, id);
        let page = self.page_mut(id)?;
        page.parent = parent;
        page.slug = slug;
        Ok(())
    }

    fn update_content(&mut self, id: PageId, content: String) -> Result<(), StoreError> {
        self.page_mut(id)?.content = content;
        Ok(())
    }

    fn delete(&mut self, id: PageId) -> Result<Vec<Page>, StoreError> {
        if !self.pages.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        Ok(self
            .subtree(id)
            .into_iter()
            .filter_map(|page_id| self.pages.remove(&page_id))
            .collect())
    }

    fn permalink(&self, id: PageId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(page_id) = current {
            let page = self.pages.get(&page_id)?;
            segments.push(page.slug.as_str());
            current = page.parent;
            // Parent links are acyclic by construction; bail out on a
            // hand-edited store that says otherwise.
            if segments.len() > self.pages.len() {
                return None;
            }
        }
        segments.reverse();
        Some(format!("/{}/", segments.join("/")))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// JSON file store
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    next_id: u64,
    pages: Vec<Page>,
}

/// Page store persisted as one JSON document.
#[derive(Debug)]
pub struct JsonPageStore {
    path: PathBuf,
    table: MemoryPageStore,
    dirty: bool,
    // Held for the lifetime of the store; the OS releases it on drop.
    _lock: File,
}

impl JsonPageStore {
    /// Lock and load the store at `path`. A missing file is an empty store.
    ///
    /// A file that exists but cannot be parsed, or was written by another
    /// format version, is reported as [`StoreError::Corrupt`] rather than
    /// replaced, since replacing it would orphan every page it lists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let lock = acquire_lock(path)?;

        let table = match fs::read_to_string(path) {
            Ok(content) => {
                let doc: StoreDocument =
                    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                if doc.version != DOCUMENT_VERSION {
                    return Err(StoreError::Corrupt {
                        path: path.to_path_buf(),
                        message: format!(
                            "format version {} (expected {DOCUMENT_VERSION})",
                            doc.version
                        ),
                    });
                }
                MemoryPageStore::from_document(doc)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => MemoryPageStore::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), pages = table.len(), "page store opened");
        Ok(Self {
            path: path.to_path_buf(),
            table,
            dirty: false,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn mark<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

fn acquire_lock(store_path: &Path) -> Result<File, StoreError> {
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(store_path))?;
    FileExt::try_lock_exclusive(&lock).map_err(|_| StoreError::Locked(store_path.to_path_buf()))?;
    Ok(lock)
}

impl PageStore for JsonPageStore {
    fn find_by_path(&self, path: &str) -> Option<PageId> {
        self.table.find_by_path(path)
    }

    fn find_by_title_and_parent(&self, title: &str, parent: Option<PageId>) -> Option<PageId> {
        self.table.find_by_title_and_parent(title, parent)
    }

    fn get(&self, id: PageId) -> Option<&Page> {
        self.table.get(id)
    }

    fn pages(&self) -> Vec<&Page> {
        self.table.pages()
    }

    fn create(&mut self, page: NewPage) -> Result<PageId, StoreError> {
        let result = self.table.create(page);
        self.mark(result)
    }

    fn attach_path(&mut self, id: PageId, directory_path: &str) -> Result<(), StoreError> {
        let result = self.table.attach_path(id, directory_path);
        self.mark(result)
    }

    fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<(), StoreError> {
        let result = self.table.set_parent(id, parent);
        self.mark(result)
    }

    fn update_content(&mut self, id: PageId, content: String) -> Result<(), StoreError> {
        if self.table.get(id).is_some_and(|p| p.content == content) {
            return Ok(());
        }
        let result = self.table.update_content(id, content);
        self.mark(result)
    }

    fn delete(&mut self, id: PageId) -> Result<Vec<Page>, StoreError> {
        let result = self.table.delete(id);
        self.mark(result)
    }

    fn permalink(&self, id: PageId) -> Option<String> {
        self.table.permalink(id)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.table.to_document())?;
        let mut temp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        temp_name.push(format!(".{}.tmp", std::process::id()));
        let temp_path = self.path.with_file_name(temp_name);
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        self.dirty = false;
        tracing::debug!(
            path = %self.path.display(),
            pages = self.table.len(),
            "page store flushed"
        );
        Ok(())
    }
}

//! Page records shared by the store, the sync engine and the renderer.
//!
//! These are the persisted shapes: [`crate::store::JsonPageStore`] writes
//! them verbatim into its JSON document, so field names are part of the
//! on-disk format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque page identity assigned by the store. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Published,
}

/// A published page mirroring one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// Titleized directory name
    pub title: String,
    /// URL segment derived from the title; unique among siblings
    pub slug: String,
    /// `None` for top-level pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PageId>,
    #[serde(default)]
    pub status: PageStatus,
    /// Rendered listing fragment
    #[serde(default)]
    pub content: String,
    /// Canonical absolute path of the directory this page represents.
    /// `None` only for pages written before the path key existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
}

/// Fields needed to create a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub title: String,
    pub parent: Option<PageId>,
    pub directory_path: String,
}

//! # dirmapper
//!
//! Mirrors a directory tree of documents into a hierarchy of published
//! listing pages. Every subdirectory of the configured root gets one page
//! whose content is an HTML listing of that directory: subdirectories link
//! to their own pages, files link to where the root is served, and PDFs
//! show the title, author and date found in their header.
//!
//! # How a Sync Works
//!
//! ```text
//! 1. Resolve   dirmapper.toml  →  SyncOptions      (root, exclusions, icons)
//! 2. Walk      root/           →  DirectoryNode    (one level at a time)
//! 3. Reconcile node + store    →  create / reuse / remove pages
//! 4. Sweep     store           →  delete pages whose directory is gone
//! ```
//!
//! A pass is idempotent: running it twice over an unchanged tree leaves
//! every page untouched. Pages are matched to directories by canonical path,
//! so renaming a directory creates a new page and the old one is swept.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`sync`] | The reconciliation pass and full teardown |
//! | [`scan`] | Reads one directory level, classifying and sorting entries |
//! | [`exclusion`] | Name lists and regex patterns that hide entries |
//! | [`store`] | `PageStore` trait, in-memory store and locked JSON file store |
//! | [`render`] | Maud listing markup: breadcrumbs, folder links, file rows |
//! | [`metadata`] | Title, author and date from the first kilobyte of a PDF |
//! | [`naming`] | Titles, slugs, icon classes and file size labels |
//! | [`config`] | `dirmapper.toml` loading, validation and updates |
//! | [`admin`] | Operations behind the CLI commands |
//! | [`output`] | CLI output formatting for reports and the page tree |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`types`] | Page records shared by the store and the sync pass |
//!
//! # Design Decisions
//!
//! ## Filesystem as Source of Truth
//!
//! Nothing about a page is edited by hand. Titles come from directory names,
//! order from byte-wise name sorting, and content from the listing renderer.
//! Regenerating is always safe.
//!
//! ## One Writer at a Time
//!
//! The JSON store takes an exclusive advisory lock for as long as it is
//! open. A second `regenerate` started while one is running fails with a
//! clear error instead of interleaving writes.

pub mod admin;
pub mod config;
pub mod exclusion;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod render;
pub mod scan;
pub mod store;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

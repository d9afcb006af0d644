//! Directory enumeration.
//!
//! The sync walk reads one directory at a time into a [`DirectoryNode`]:
//! its canonical path, its name, and its entries sorted by name in byte
//! order. Nodes are transient and recomputed on every pass.
//!
//! ## What is enumerated
//!
//! ```text
//! docs/                    # root, resolved with dunce::canonicalize
//! ├── .git/                # hidden: never enumerated
//! ├── HR/                  # Directory entry
//! │   └── handbook.pdf     # File entry (read when HR is visited)
//! ├── archive -> /mnt/old  # symlink leaving the root: skipped
//! └── report.pdf           # File entry
//! ```
//!
//! Hidden names (leading `.`) are dropped, matching shell-glob semantics.
//! A symlink whose target leaves the root, or contains the directory the
//! link sits in, is returned in [`DirectoryNode::skipped`] with a
//! [`SkipReason`]. Other symlinks are listed with their canonical
//! [`Entry::link_target`].
//!
//! A symlinked directory is an alias: the walk never descends into it, and
//! its listing row points at the page of the directory it resolves to.
//! Only real directories are visited, so every node path is canonical and
//! each directory under the root is mirrored exactly once.

use crate::exclusion::EntryKind;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One enumerated child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Byte length for files, zero for directories
    pub size: u64,
    /// Canonical target when the entry is a symlink
    pub link_target: Option<PathBuf>,
}

impl Entry {
    /// A symlink to a directory, listed but never walked.
    pub fn is_alias(&self) -> bool {
        self.kind == EntryKind::Directory && self.link_target.is_some()
    }

    /// Path of the directory or file this entry stands for.
    pub fn resolved_path(&self) -> &Path {
        self.link_target.as_deref().unwrap_or(&self.path)
    }
}

/// Why an entry was left out of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Symlink whose target is outside the root
    OutsideRoot(PathBuf),
    /// Symlink to the directory holding it, or to one of its ancestors
    Loop(PathBuf),
    /// Neither a regular file nor a directory (socket, fifo, device)
    Special,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutsideRoot(target) => {
                write!(f, "symlink target {} is outside the root", target.display())
            }
            SkipReason::Loop(target) => {
                write!(f, "symlink loops back to {}", target.display())
            }
            SkipReason::Special => write!(f, "not a regular file or directory"),
            SkipReason::Unreadable(message) => write!(f, "unreadable: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A directory and its immediate children.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub path: PathBuf,
    pub name: String,
    /// Directories and files interleaved, sorted by name
    pub entries: Vec<Entry>,
    pub skipped: Vec<SkippedEntry>,
}

impl DirectoryNode {
    /// Real subdirectories, the ones the walk descends into.
    pub fn dirs(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Directory && !e.is_alias())
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }
}

/// Resolve the configured root to a canonical directory path.
pub fn resolve_root(path: &Path) -> Result<PathBuf, ScanError> {
    let canonical = dunce::canonicalize(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(ScanError::NotADirectory(canonical));
    }
    Ok(canonical)
}

/// Read the directory at `path`, a canonical path under the canonical `root`.
pub fn read_node(path: &Path, root: &Path) -> Result<DirectoryNode, ScanError> {
    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for item in fs::read_dir(path).map_err(io_err)? {
        let item = item.map_err(io_err)?;
        let name = item.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let entry_path = path.join(&name);
        match classify(&entry_path, path, root) {
            Ok((kind, size, link_target)) => entries.push(Entry {
                name,
                path: entry_path,
                kind,
                size,
                link_target,
            }),
            Err(reason) => {
                tracing::debug!(path = %entry_path.display(), "skipped: {reason}");
                skipped.push(SkippedEntry {
                    path: entry_path,
                    reason,
                });
            }
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(DirectoryNode {
        path: path.to_path_buf(),
        name: node_name(path),
        entries,
        skipped,
    })
}

type Classified = (EntryKind, u64, Option<PathBuf>);

fn classify(path: &Path, dir: &Path, root: &Path) -> Result<Classified, SkipReason> {
    let unreadable = |e: io::Error| SkipReason::Unreadable(e.to_string());

    let link_target = if fs::symlink_metadata(path).map_err(unreadable)?.is_symlink() {
        let target = dunce::canonicalize(path).map_err(unreadable)?;
        if !target.starts_with(root) {
            return Err(SkipReason::OutsideRoot(target));
        }
        if dir.starts_with(&target) {
            return Err(SkipReason::Loop(target));
        }
        Some(target)
    } else {
        None
    };

    let meta = fs::metadata(path).map_err(unreadable)?;
    if meta.is_dir() {
        Ok((EntryKind::Directory, 0, link_target))
    } else if meta.is_file() {
        Ok((EntryKind::File, meta.len(), link_target))
    } else {
        Err(SkipReason::Special)
    }
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// String form of a path as stored in `Page::directory_path`.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `path` relative to `root` with `/` separators, or `None` outside the root.
pub fn relative_url_path(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

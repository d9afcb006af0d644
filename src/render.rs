//! Listing fragment for one directory page.
//!
//! Rendering is deterministic: the same node, options and store produce the
//! same bytes. All markup goes through maud, so entry names and scraped
//! metadata are escaped.
//!
//! ```html
//! <div class="directory-listing">
//!   <div class="breadcrumbs"> / <a href="/policies/">Policies</a> / <a href="/policies/hr/" class="current">HR</a></div>
//!   <div class="file-entries">
//!     <div class="file-entry">
//!       <div class="directory-icon"><i class="fas fa-folder fa-fw"></i></div>
//!       <a href="/policies/hr/leave/">Leave</a>
//!     </div>
//!     <div class="file-entry">
//!       <div class="file-icon"><i class="fas fa-file-pdf fa-fw"></i></div>
//!       <a class="file-download" href="/files/Policies/HR/handbook.pdf">Handbook</a>
//!       <div class="file-name">handbook.pdf <span class="file-size">(1.50kB)</span></div>
//!       <div class="pdf-info">Title:<b> Staff Handbook</b></div>
//!     </div>
//!   </div>
//! </div>
//! ```

use crate::exclusion::EntryKind;
use crate::metadata;
use crate::naming::{
    IconMap, file_icon_class, format_filesize, titleize, titleize_filename, titleize_key,
};
use crate::scan::{DirectoryNode, Entry, path_key, relative_url_path};
use crate::store::PageStore;
use crate::sync::SyncOptions;
use crate::types::PageId;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use maud::{Markup, html};
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";
pub const DEFAULT_FILE_URL_BASE: &str = "/files";

/// Presentation settings for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOptions {
    pub disable_breadcrumbs: bool,
    pub icons: IconMap,
    /// chrono strftime format for metadata timestamps
    pub date_format: String,
    /// URL prefix that maps onto the root directory
    pub file_url_base: String,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            disable_breadcrumbs: false,
            icons: IconMap::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            file_url_base: DEFAULT_FILE_URL_BASE.to_string(),
        }
    }
}

/// Render the listing for `node`, whose own page is `page`.
///
/// Child directories link to their pages, and a directory alias links to
/// the page of the directory it resolves to. A child without a page is shown
/// as plain text, or left out entirely when skip-empty is on, since under
/// skip-empty a missing page means the directory had nothing to show.
pub fn render_listing<S: PageStore + ?Sized>(
    node: &DirectoryNode,
    page: Option<PageId>,
    opts: &SyncOptions,
    store: &S,
) -> String {
    let entries: Vec<Markup> = node
        .entries
        .iter()
        .filter(|e| !opts.policy.is_excluded(&e.name, e.kind))
        .filter_map(|e| match e.kind {
            EntryKind::Directory => directory_entry(e, opts, store),
            EntryKind::File => Some(file_entry(e, opts)),
        })
        .collect();

    html! {
        div.directory-listing {
            @if !opts.listing.disable_breadcrumbs {
                (breadcrumbs(node, page, opts, store))
            }
            div.file-entries {
                @for entry in &entries {
                    (entry)
                }
            }
        }
    }
    .into_string()
}

fn breadcrumbs<S: PageStore + ?Sized>(
    node: &DirectoryNode,
    page: Option<PageId>,
    opts: &SyncOptions,
    store: &S,
) -> Markup {
    let segments = crumb_segments(&node.path, &opts.root);
    let last = segments.len().saturating_sub(1);

    html! {
        div.breadcrumbs {
            @for (i, (prefix, name)) in segments.iter().enumerate() {
                @let is_current = i == last;
                @let href = if is_current {
                    page.and_then(|id| store.permalink(id))
                } else {
                    store.find_by_path(&path_key(prefix)).and_then(|id| store.permalink(id))
                };
                " / "
                @if let Some(href) = href {
                    a href=(href) class=[is_current.then_some("current")] { (titleize(name)) }
                } @else if is_current {
                    span.current { (titleize(name)) }
                } @else {
                    (titleize(name))
                }
            }
        }
    }
}

/// Each ancestor of `path` below `root`, including `path` itself, paired
/// with its directory name.
fn crumb_segments(path: &Path, root: &Path) -> Vec<(PathBuf, String)> {
    let Ok(rel) = path.strip_prefix(root) else {
        return Vec::new();
    };
    let mut prefix = root.to_path_buf();
    rel.components()
        .map(|c| {
            prefix.push(c);
            (prefix.clone(), c.as_os_str().to_string_lossy().into_owned())
        })
        .collect()
}

fn directory_entry<S: PageStore + ?Sized>(
    entry: &Entry,
    opts: &SyncOptions,
    store: &S,
) -> Option<Markup> {
    // An alias links to the page of the directory it resolves to
    let link = store
        .find_by_path(&path_key(entry.resolved_path()))
        .and_then(|id| store.permalink(id));
    if link.is_none() && opts.skip_empty {
        return None;
    }
    let icon = opts.listing.icons.folder_icon(&entry.name);
    let title = titleize(&entry.name);

    Some(html! {
        div.file-entry {
            div.directory-icon { i class={ (icon) " fa-fw" } {} }
            @if let Some(href) = link {
                a href=(href) { (title) }
            } @else {
                (title)
            }
        }
    })
}

fn file_entry(entry: &Entry, opts: &SyncOptions) -> Markup {
    let href = file_url(&opts.listing.file_url_base, &entry.path, &opts.root)
        .unwrap_or_else(|| entry.name.clone());
    let mut info = metadata::extract(&entry.path);
    if info.creation_date.is_empty() {
        info.creation_date = metadata::modified_date(&entry.path).unwrap_or_default();
    }

    html! {
        div.file-entry {
            div.file-icon { i class={ (file_icon_class(&entry.name)) " fa-fw" } {} }
            a.file-download href=(href) { (titleize_filename(&entry.name)) }
            div.file-name {
                (entry.name) " "
                span.file-size { "(" (format_filesize(entry.size)) ")" }
            }
            @for (key, value) in info.fields() {
                @if !value.is_empty() {
                    div.pdf-info {
                        (titleize_key(key)) ":"
                        b { " " (display_value(value, &opts.listing.date_format)) }
                    }
                }
            }
        }
    }
}

/// Public URL of a file under the root.
pub fn file_url(base: &str, path: &Path, root: &Path) -> Option<String> {
    let rel = relative_url_path(path, root)?;
    Some(format!("{}/{rel}", base.trim_end_matches('/')))
}

fn display_value(value: &str, date_format: &str) -> String {
    format_date_value(value, date_format).unwrap_or_else(|| value.to_string())
}

/// Reformat `value` with `date_format` when it reads as a timestamp.
///
/// Recognised: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, and PDF dates
/// (`D:YYYYMMDDHHmmSS` with optional trailing offset). The offset of a PDF
/// date is dropped; the wall-clock time is formatted as written. Returns
/// `None` for anything else, or when `date_format` is not a valid strftime
/// string.
pub fn format_date_value(value: &str, date_format: &str) -> Option<String> {
    let value = value.trim();
    let naive = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| parse_pdf_date(value))?;

    let mut out = String::new();
    write!(out, "{}", naive.format(date_format)).ok()?;
    Some(out)
}

/// `D:YYYY[MM[DD[HH[mm[SS]]]]]` followed by an optional `Z` or `±HH'mm'`.
fn parse_pdf_date(value: &str) -> Option<NaiveDateTime> {
    let body = value.strip_prefix("D:")?;
    let digits: String = body.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() < 4 || digits.len() % 2 != 0 {
        return None;
    }
    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?;
    date.and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)
}

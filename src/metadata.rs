//! Best-effort document metadata from file headers.
//!
//! Only the first [`HEADER_LEN`] bytes of a file are read. Within them, each
//! field is looked up through a short list of textual markers; the first
//! marker that yields a non-empty value wins:
//!
//! | Field | Markers |
//! |-------|---------|
//! | title | XMP `<dc:title>`, Info `/Title (…)` |
//! | author | XMP `<dc:creator>`, Info `/Author (…)` |
//! | description | XMP `<dc:description>`, Info `/Subject (…)` |
//! | pages | linearization `/N 12`, page tree `/Type /Pages … /Count 12` |
//! | creation date | Info `/CreationDate (D:…)`, XMP `<xmp:CreateDate>` |
//!
//! This is a scraper, not a parser. Compressed object streams, encrypted
//! files and anything past the header are invisible to it, and that is fine:
//! a missing field is simply left empty. Extraction never fails. Unreadable
//! files and non-documents produce [`DocumentInfo::default`].
//!
//! Listings that want a date for every file fall back to [`modified_date`]
//! when the header carries none.

use chrono::{DateTime, Local};
use regex::bytes::Regex;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;

/// Number of leading bytes inspected per file.
pub const HEADER_LEN: usize = 1024;

static LINEARIZED_PAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/N\s+([0-9]+)").expect("static pattern"));

static PAGE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Count\s+([0-9]+)").expect("static pattern"));

/// Descriptive fields scraped from a document header. Empty string means
/// "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub description: String,
    pub pages: String,
    pub creation_date: String,
}

impl DocumentInfo {
    /// Fields in display order, keyed the way listings label them.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("title", self.title.as_str()),
            ("author", self.author.as_str()),
            ("description", self.description.as_str()),
            ("pages", self.pages.as_str()),
            ("creationDate", self.creation_date.as_str()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_empty())
    }
}

/// Extract metadata from the file at `path`.
pub fn extract(path: &Path) -> DocumentInfo {
    match read_header(path) {
        Ok(header) => parse_header(&header),
        Err(err) => {
            tracing::debug!(path = %path.display(), "metadata skipped: {err}");
            DocumentInfo::default()
        }
    }
}

/// Last-modified time of `path` in local time, as `YYYY-MM-DD HH:MM:SS`.
pub fn modified_date(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        DateTime::<Local>::from(modified)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Scrape fields from raw header bytes.
pub fn parse_header(header: &[u8]) -> DocumentInfo {
    let first = |candidates: [Option<String>; 2]| {
        candidates
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    };

    DocumentInfo {
        title: first([
            xml_element(header, "dc:title"),
            info_string(header, b"/Title"),
        ]),
        author: first([
            xml_element(header, "dc:creator"),
            info_string(header, b"/Author"),
        ]),
        description: first([
            xml_element(header, "dc:description"),
            info_string(header, b"/Subject"),
        ]),
        pages: first([linearized_page_count(header), page_tree_count(header)]),
        creation_date: first([
            info_string(header, b"/CreationDate"),
            xml_element(header, "xmp:CreateDate"),
        ]),
    }
}

// ---------------------------------------------------------------------------
// XMP
// ---------------------------------------------------------------------------

/// Text content of the first `<tag>…</tag>` element, nested markup removed.
fn xml_element(header: &[u8], tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = find(header, open.as_bytes())? + open.len();
    let len = find(&header[start..], close.as_bytes())?;
    let inner = decode_text(&header[start..start + len]);
    Some(strip_tags(&inner))
}

fn strip_tags(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

// ---------------------------------------------------------------------------
// Info dictionary
// ---------------------------------------------------------------------------

/// Value of the first `key (literal)` or `key <hex>` pair.
fn info_string(header: &[u8], key: &[u8]) -> Option<String> {
    let mut from = 0;
    while let Some(found) = find(&header[from..], key) {
        let after = from + found + key.len();
        from = after;

        // `/Title` must not match `/TitleFont`
        if header.get(after).is_some_and(u8::is_ascii_alphanumeric) {
            continue;
        }
        let value_start = skip_whitespace(header, after);
        let raw = match header.get(value_start) {
            Some(b'(') => literal_string(&header[value_start + 1..]),
            Some(b'<') if header.get(value_start + 1) != Some(&b'<') => {
                hex_string(&header[value_start + 1..])
            }
            _ => None,
        };
        if let Some(bytes) = raw {
            return Some(decode_text(&bytes));
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

/// Decode a PDF literal string body (after the opening parenthesis).
///
/// Handles balanced nested parentheses, the named escapes, and `\ddd`
/// octal escapes. Returns `None` when the string is cut off by the end of
/// the header.
fn literal_string(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        match b {
            b'\\' => {
                let next = *body.get(i + 1)?;
                i += 2;
                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'0'..=b'7' => {
                        let mut value = u32::from(next - b'0');
                        let mut digits = 1;
                        while digits < 3 {
                            match body.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push((value & 0xFF) as u8);
                    }
                    // Line continuation
                    b'\n' => {}
                    b'\r' => {
                        if body.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    other => out.push(other),
                }
                continue;
            }
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                if depth == 0 {
                    return Some(out);
                }
                depth -= 1;
                out.push(b);
            }
            _ => out.push(b),
        }
        i += 1;
    }
    None
}

/// Decode a PDF hex string body (after the opening angle bracket).
fn hex_string(body: &[u8]) -> Option<Vec<u8>> {
    let end = body.iter().position(|&b| b == b'>')?;
    let digits: Vec<u8> = body[..end]
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let nibble = |b: u8| (b as char).to_digit(16).unwrap_or(0) as u8;
    Some(
        digits
            .chunks(2)
            .map(|pair| {
                let hi = nibble(pair[0]);
                let lo = pair.get(1).map(|&b| nibble(b)).unwrap_or(0);
                (hi << 4) | lo
            })
            .collect(),
    )
}

/// Bytes to text: UTF-16BE when prefixed with a byte-order mark, UTF-8 when
/// valid, Latin-1 otherwise.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// ---------------------------------------------------------------------------
// Page count
// ---------------------------------------------------------------------------

fn linearized_page_count(header: &[u8]) -> Option<String> {
    let caps = LINEARIZED_PAGES.captures(header)?;
    Some(String::from_utf8_lossy(&caps[1]).into_owned())
}

fn page_tree_count(header: &[u8]) -> Option<String> {
    let start = find(header, b"/Type /Pages")?;
    let tail = &header[start..];
    let dict = match find(tail, b">>") {
        Some(end) => &tail[..end],
        None => tail,
    };
    let caps = PAGE_COUNT.captures(dict)?;
    let count: u64 = std::str::from_utf8(&caps[1]).ok()?.parse().ok()?;
    Some(count.to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

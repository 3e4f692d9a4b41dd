//! Virtual filesystem operations over the per-run file map.
//!
//! Paths are forward-slash strings with no real directory objects; listing
//! and searching work by prefix and substring matching. Content is measured
//! and windowed in characters, never bytes.

use std::collections::BTreeMap;

/// Characters returned by a read when no explicit limit is given.
pub const DEFAULT_READ_LIMIT: usize = 20_000;

/// Cap on entries returned by `list` and `search`.
pub const MAX_MATCHES: usize = 50;

/// Result of a read against the file map.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Content {
        text: String,
        offset: usize,
        total_chars: usize,
        truncated: bool,
    },
    NotFound,
}

/// Normalize a user-supplied path to the rooted form used as the map key.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Write or append. Creating a file and overwriting one are the same
/// operation; append on a missing path creates it.
pub fn write(files: &mut BTreeMap<String, String>, path: &str, content: &str, append: bool) {
    let key = normalize_path(path);
    if append {
        files.entry(key).or_default().push_str(content);
    } else {
        files.insert(key, content.to_string());
    }
}

/// Read a character window of `path`, starting at `offset` characters, at
/// most `limit` characters (defaulting to [`DEFAULT_READ_LIMIT`]).
///
/// An offset past the end yields empty, non-truncated content rather than an
/// error, so callers can page to the end without tracking length.
pub fn read(
    files: &BTreeMap<String, String>,
    path: &str,
    offset: usize,
    limit: Option<usize>,
) -> ReadOutcome {
    let key = normalize_path(path);
    let Some(content) = files.get(&key) else {
        return ReadOutcome::NotFound;
    };
    let limit = limit.unwrap_or(DEFAULT_READ_LIMIT);
    let total_chars = content.chars().count();

    // char-based slicing keeps multi-byte content intact
    let text: String = content.chars().skip(offset).take(limit).collect();
    let truncated = offset + text.chars().count() < total_chars;
    ReadOutcome::Content {
        text,
        offset,
        total_chars,
        truncated,
    }
}

/// Paths under `prefix` (normalized), in lexicographic order, capped at
/// [`MAX_MATCHES`]. An empty or `/` prefix lists everything.
pub fn list(files: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    let prefix = normalize_path(prefix);
    files
        .keys()
        .filter(|path| path.starts_with(&prefix))
        .take(MAX_MATCHES)
        .cloned()
        .collect()
}

/// Paths whose name contains `path_query` and, when given, whose content
/// contains `content_query`. Both matches are case-sensitive substrings.
pub fn search(
    files: &BTreeMap<String, String>,
    path_query: &str,
    content_query: Option<&str>,
) -> Vec<String> {
    files
        .iter()
        .filter(|(path, content)| {
            path.contains(path_query)
                && content_query.is_none_or(|query| content.contains(query))
        })
        .take(MAX_MATCHES)
        .map(|(path, _)| path.clone())
        .collect()
}

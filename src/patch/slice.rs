//! Line-window reads.

use std::path::PathBuf;

/// A read request: file path plus an optional `[offset, offset + limit)` line window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSlice {
    pub path: PathBuf,
    /// Leading lines to drop (0-indexed).
    pub offset: Option<usize>,
    /// Maximum number of lines to keep after `offset`.
    pub limit: Option<usize>,
}

impl FileSlice {
    /// Read the whole file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Borrow the `[offset, offset + limit)` line window of `content`.
///
/// Lines keep their `\n` terminators, so a window with no offset and no
/// limit is `content` itself. Out-of-range windows are empty or short.
pub fn slice_lines(content: &str, offset: Option<usize>, limit: Option<usize>) -> &str {
    let start: usize = content
        .split_inclusive('\n')
        .take(offset.unwrap_or(0))
        .map(str::len)
        .sum();
    let rest = &content[start..];

    match limit {
        Some(limit) => {
            let end: usize = rest.split_inclusive('\n').take(limit).map(str::len).sum();
            &rest[..end]
        }
        None => rest,
    }
}

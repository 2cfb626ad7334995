//! Exact-match text patch engine.
//!
//! Every operation works on the whole file: read it fully, transform in
//! memory, then persist once through [`crate::util::atomic::atomic_write`].
//! The original file is untouched until that single final write, so a crash
//! mid-sequence loses the edit but never leaves a half-applied file.
//!
//! Matching is exact literal substring comparison. A missing match is not
//! an error: the file is rewritten with identical content and the call
//! reports success.

pub mod ops;
pub mod slice;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EditAction, ToolError, ToolResult};

pub use ops::{EditOperation, EditSequence};
pub use slice::{FileSlice, slice_lines};

/// Outcome of a successful `edit` / `replace` / `multi_edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSummary {
    pub path: PathBuf,
    /// Operations that found at least one occurrence.
    pub applied: usize,
    /// Multi-edit entries dropped for missing fields.
    pub skipped: usize,
}

/// Stateless file patcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPatcher;

impl TextPatcher {
    pub fn new() -> Self {
        Self
    }

    /// Return the requested line window of a file.
    ///
    /// # Errors
    ///
    /// [`ToolError::FileNotFound`] if the path is not a regular file,
    /// [`ToolError::ReadFailed`] if it cannot be read as UTF-8 text.
    pub fn read(&self, request: &FileSlice) -> ToolResult<String> {
        ensure_file(&request.path)?;

        let content = std::fs::read_to_string(&request.path).map_err(|e| ToolError::ReadFailed {
            reason: e.to_string(),
        })?;

        Ok(slice_lines(&content, request.offset, request.limit).to_owned())
    }

    /// Apply a single edit and rewrite the file.
    ///
    /// # Errors
    ///
    /// [`ToolError::FileNotFound`] or [`ToolError::EditFailed`].
    pub fn edit(&self, path: &Path, op: &EditOperation) -> ToolResult<EditSummary> {
        rewrite(path, EditAction::Edit, &EditSequence::from(op.clone()))
    }

    /// Same semantics as [`TextPatcher::edit`], reported as a text replacement.
    ///
    /// # Errors
    ///
    /// [`ToolError::FileNotFound`] or [`ToolError::EditFailed`].
    pub fn replace(&self, path: &Path, op: &EditOperation) -> ToolResult<EditSummary> {
        rewrite(path, EditAction::Replace, &EditSequence::from(op.clone()))
    }

    /// Apply `edits` in order against progressively updated content, then
    /// write once.
    ///
    /// # Errors
    ///
    /// [`ToolError::FileNotFound`] or [`ToolError::EditFailed`].
    pub fn multi_edit(&self, path: &Path, edits: &EditSequence) -> ToolResult<EditSummary> {
        rewrite(path, EditAction::Edit, edits)
    }
}

fn ensure_file(path: &Path) -> ToolResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn rewrite(path: &Path, action: EditAction, edits: &EditSequence) -> ToolResult<EditSummary> {
    ensure_file(path)?;

    let original = std::fs::read_to_string(path).map_err(|e| ToolError::EditFailed {
        action,
        reason: e.to_string(),
    })?;

    let (updated, applied) = edits.apply(&original);
    debug!(
        path = %path.display(),
        applied,
        total = edits.len(),
        skipped = edits.skipped(),
        "edits applied in memory"
    );

    crate::util::atomic::atomic_write(path, &updated).map_err(|e| ToolError::EditFailed {
        action,
        reason: format!("{e:#}"),
    })?;

    Ok(EditSummary {
        path: path.to_path_buf(),
        applied,
        skipped: edits.skipped(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file.txt");
        std::fs::write(&path, content).expect("write");
        (dir, path)
    }

    fn contents(path: &Path) -> String {
        std::fs::read_to_string(path).expect("read")
    }

    #[test]
    fn test_edit_replaces_leftmost_only() {
        let (_dir, path) = fixture("alpha beta alpha\n");
        let summary = TextPatcher::new()
            .edit(&path, &EditOperation::new("alpha", "gamma"))
            .expect("edit");

        assert_eq!(summary.applied, 1);
        assert_eq!(contents(&path), "gamma beta alpha\n");
    }

    #[test]
    fn test_edit_replace_all_leaves_no_occurrence() {
        let (_dir, path) = fixture("x = 1; x = 2; x = 3;");
        TextPatcher::new()
            .edit(&path, &EditOperation::new("x", "y").with_replace_all(true))
            .expect("edit");

        let out = contents(&path);
        assert!(!out.contains('x'));
        assert_eq!(out, "y = 1; y = 2; y = 3;");
    }

    #[test]
    fn test_edit_without_match_is_bit_identical_success() {
        let original = "line one\r\nline two\n\tindented\n";
        let (_dir, path) = fixture(original);

        let summary = TextPatcher::new()
            .edit(&path, &EditOperation::new("absent", "x"))
            .expect("edit without match still succeeds");

        assert_eq!(summary.applied, 0);
        assert_eq!(contents(&path), original);
    }

    #[test]
    fn test_edit_is_idempotent_once_applied() {
        let (_dir, path) = fixture("version = 1\n");
        let patcher = TextPatcher::new();
        let op = EditOperation::new("version = 1", "version = 2");

        patcher.edit(&path, &op).expect("first edit");
        let second = patcher.edit(&path, &op).expect("second edit");

        assert_eq!(second.applied, 0);
        assert_eq!(contents(&path), "version = 2\n");
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.txt");
        let patcher = TextPatcher::new();
        let op = EditOperation::new("a", "b");

        assert!(matches!(patcher.edit(&missing, &op), Err(ToolError::FileNotFound { .. })));
        assert!(matches!(patcher.replace(&missing, &op), Err(ToolError::FileNotFound { .. })));
        assert!(matches!(
            patcher.multi_edit(&missing, &EditSequence::from(op)),
            Err(ToolError::FileNotFound { .. })
        ));
        assert!(matches!(
            patcher.read(&FileSlice::new(&missing)),
            Err(ToolError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_directory_is_file_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = TextPatcher::new().read(&FileSlice::new(dir.path()));
        assert!(matches!(result, Err(ToolError::FileNotFound { .. })));
    }

    #[test]
    fn test_multi_edit_compound_marker() {
        let (_dir, path) = fixture("fn old_name() {}\nold_name();\n");
        let edits = EditSequence::from_values(&[
            json!({"old_string": "old_name", "new_string": "__MARK__", "replace_all": true}),
            json!({"old_string": "__MARK__", "new_string": "new_name", "replace_all": true}),
        ]);

        let summary = TextPatcher::new().multi_edit(&path, &edits).expect("multi_edit");

        assert_eq!(summary.applied, 2);
        assert_eq!(contents(&path), "fn new_name() {}\nnew_name();\n");
    }

    #[test]
    fn test_multi_edit_skips_malformed_entries() {
        let (_dir, path) = fixture("a b c\n");
        let edits = EditSequence::from_values(&[
            json!({"old_string": "a", "new_string": "A"}),
            json!({"old_string": "b"}),
            json!({"old_string": "c", "new_string": "C"}),
        ]);

        let summary = TextPatcher::new().multi_edit(&path, &edits).expect("multi_edit");

        assert_eq!(summary.skipped, 1);
        assert_eq!(contents(&path), "A b C\n");
    }

    #[test]
    fn test_multi_edit_equals_sequential_edits() {
        let start = "foo bar foo\nbar baz\n";
        let e1 = EditOperation::new("foo", "bar").with_replace_all(true);
        let e2 = EditOperation::new("bar baz", "qux");
        let patcher = TextPatcher::new();

        let (_d1, one_shot) = fixture(start);
        patcher
            .multi_edit(&one_shot, &vec![e1.clone(), e2.clone()].into_iter().collect())
            .expect("multi_edit");

        let (_d2, stepwise) = fixture(start);
        patcher.edit(&stepwise, &e1).expect("edit 1");
        patcher.edit(&stepwise, &e2).expect("edit 2");

        assert_eq!(contents(&one_shot), contents(&stepwise));
    }

    #[test]
    fn test_read_window() {
        let (_dir, path) = fixture("a\nb\nc\nd\n");
        let patcher = TextPatcher::new();

        let full = patcher.read(&FileSlice::new(&path)).expect("read");
        assert_eq!(full, "a\nb\nc\nd\n");

        let window = patcher
            .read(&FileSlice::new(&path).with_offset(Some(1)).with_limit(Some(2)))
            .expect("read window");
        assert_eq!(window, "b\nc\n");

        let past_end = patcher
            .read(&FileSlice::new(&path).with_offset(Some(10)))
            .expect("read past end");
        assert_eq!(past_end, "");
    }

    #[test]
    fn test_non_utf8_read_is_read_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bin.dat");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).expect("write");

        let result = TextPatcher::new().read(&FileSlice::new(&path));
        assert!(matches!(result, Err(ToolError::ReadFailed { .. })));

        let result = TextPatcher::new().edit(&path, &EditOperation::new("a", "b"));
        assert!(matches!(result, Err(ToolError::EditFailed { .. })));
        // Untouched on failure.
        assert_eq!(std::fs::read(&path).expect("read"), vec![0xff, 0xfe, 0x00, 0x80]);
    }
}

//! Edit operations — exact literal substring replacement.
//!
//! An [`EditOperation`] never interprets its match target: no regex, no
//! whitespace normalization, no fuzzy fallback. Zero occurrences is a valid
//! outcome and leaves the content untouched.

use serde::Deserialize;
use serde_json::Value;

/// One `old_string` → `new_string` substitution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EditOperation {
    /// Text to find. Matched byte-for-byte.
    pub old_string: String,
    /// Replacement text. May be empty (deletes the match).
    pub new_string: String,
    /// Replace every non-overlapping occurrence instead of only the leftmost.
    #[serde(default)]
    pub replace_all: bool,
}

impl EditOperation {
    /// Create a first-occurrence edit.
    pub fn new(old_string: impl Into<String>, new_string: impl Into<String>) -> Self {
        Self {
            old_string: old_string.into(),
            new_string: new_string.into(),
            replace_all: false,
        }
    }

    /// Set whether every occurrence is replaced.
    #[must_use]
    pub fn with_replace_all(mut self, replace_all: bool) -> Self {
        self.replace_all = replace_all;
        self
    }

    /// Build an operation from a loosely-typed JSON edit entry.
    ///
    /// Returns `None` when `old_string` or `new_string` is missing, null,
    /// or not a string, and when `old_string` is empty. A non-boolean
    /// `replace_all` counts as `false`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let old_string = entry.get("old_string")?.as_str().filter(|s| !s.is_empty())?;
        let new_string = entry.get("new_string")?.as_str()?;
        let replace_all = entry
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(Self::new(old_string, new_string).with_replace_all(replace_all))
    }

    /// Apply this edit to `content`.
    ///
    /// Returns `Some(new_content)` if at least one occurrence was replaced,
    /// `None` if `old_string` does not occur (or is empty).
    pub fn apply(&self, content: &str) -> Option<String> {
        if self.old_string.is_empty() || !content.contains(self.old_string.as_str()) {
            return None;
        }

        if self.replace_all {
            Some(content.replace(self.old_string.as_str(), &self.new_string))
        } else {
            Some(content.replacen(self.old_string.as_str(), &self.new_string, 1))
        }
    }
}

/// Ordered edits applied to a single file, each seeing the previous result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSequence {
    ops: Vec<EditOperation>,
    skipped: usize,
}

impl EditSequence {
    /// Build a sequence from raw JSON edit entries, dropping malformed ones.
    pub fn from_values(values: &[Value]) -> Self {
        let ops: Vec<EditOperation> = values.iter().filter_map(EditOperation::from_value).collect();
        let skipped = values.len() - ops.len();
        Self { ops, skipped }
    }

    /// The well-formed operations, in application order.
    pub fn ops(&self) -> &[EditOperation] {
        &self.ops
    }

    /// Number of input entries dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Fold every operation over `content` in order.
    ///
    /// Returns the final content and how many operations matched.
    pub fn apply(&self, content: &str) -> (String, usize) {
        let mut current = content.to_owned();
        let mut applied = 0;
        for op in &self.ops {
            if let Some(next) = op.apply(&current) {
                current = next;
                applied += 1;
            }
        }
        (current, applied)
    }
}

impl FromIterator<EditOperation> for EditSequence {
    fn from_iter<I: IntoIterator<Item = EditOperation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
            skipped: 0,
        }
    }
}

impl From<EditOperation> for EditSequence {
    fn from(op: EditOperation) -> Self {
        std::iter::once(op).collect()
    }
}

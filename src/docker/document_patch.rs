//! Shadow copy of one source document
//!
//! Edits are recorded against the original line and column coordinates, so
//! the positions the parser reported stay valid no matter how many edits came
//! before. Rendering applies column edits, drops lines swallowed by
//! multi-line replacements and splices appended lines in after their anchor.

use super::diff::{unified_diff, FileLabel};
use crate::error::{SourcePosition, WdlError};
use crate::tree::loader::is_http;
use crate::tree::Document;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;

/// Result of one edit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The same edit was already recorded
    Unchanged,
    /// The range was already rewritten differently; nothing recorded.
    Conflict,
}

/// Span key of an edit: line, column, end line, end column.
type Origin = (u32, u32, u32, u32);

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnEdit {
    origin: Origin,
    /// 0-based char range of the first line being replaced
    start: usize,
    end: usize,
    text: String,
    /// Rest of the last line of a multi-line span
    tail: String,
}

impl ColumnEdit {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        if self.start == self.end {
            start < self.start && self.start < end
        } else if start == end {
            self.start < start && start < self.end
        } else {
            start < self.end && self.start < end
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LineSlot {
    edits: Vec<ColumnEdit>,
    appended: Vec<String>,
    dropped: bool,
}

/// Diff of one document plus its statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePatch {
    /// Path relative to the abspath root, `./` prefixed
    pub path: String,
    pub abspath: String,
    pub diff: String,
    pub lines_patched: usize,
    pub hunks: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentPatch {
    abspath: String,
    /// Original lines plus an empty sentinel line
    original: Vec<String>,
    slots: Vec<LineSlot>,
    trailing_newline: bool,
}

impl DocumentPatch {
    pub fn new(document: &Document) -> Self {
        Self::from_source(document.abspath(), &document.source_text)
    }

    pub fn from_source(abspath: &str, source_text: &str) -> Self {
        let mut original: Vec<String> = source_text.lines().map(str::to_string).collect();
        original.push(String::new());
        let slots = vec![LineSlot::default(); original.len()];
        DocumentPatch {
            abspath: abspath.to_string(),
            original,
            slots,
            trailing_newline: source_text.ends_with('\n'),
        }
    }

    /// Number of source lines, sentinel excluded
    pub fn line_count(&self) -> usize {
        self.original.len() - 1
    }

    /// Line `line` (1-based) as loaded
    pub fn original_line(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        if index >= self.line_count() {
            return None;
        }
        self.original.get(index).map(String::as_str)
    }

    fn check_line(&self, line: u32) -> Result<usize, WdlError> {
        match (line as usize).checked_sub(1) {
            Some(index) if index < self.slots.len() => Ok(index),
            _ => Err(WdlError::consistency(format!(
                "line {} out of range in {}",
                line, self.abspath
            ))),
        }
    }

    fn char_len(&self, index: usize) -> usize {
        self.original[index].chars().count()
    }

    fn add_edit(
        &mut self,
        pos: &SourcePosition,
        text: &str,
        exact_override: bool,
    ) -> Result<EditOutcome, WdlError> {
        if pos.end_line < pos.line || (pos.end_line == pos.line && pos.end_column < pos.column) {
            return Err(WdlError::consistency(format!("inverted span at {}", pos)));
        }
        let first = self.check_line(pos.line)?;
        let last = self.check_line(pos.end_line)?;
        let origin = (pos.line, pos.column, pos.end_line, pos.end_column);
        let start = (pos.column.max(1) as usize - 1).min(self.char_len(first));
        let end_column = pos.end_column.max(1) as usize - 1;

        if let Some(existing) = self.slots[first].edits.iter_mut().find(|e| e.origin == origin) {
            if existing.text == text {
                return Ok(EditOutcome::Unchanged);
            }
            if !exact_override {
                return Ok(EditOutcome::Conflict);
            }
            existing.text = text.to_string();
            return Ok(EditOutcome::Applied);
        }

        let end = if first == last {
            end_column.min(self.char_len(first))
        } else {
            self.char_len(first)
        };
        if self.slots[first].dropped || self.slots[first].edits.iter().any(|e| e.overlaps(start, end)) {
            return Ok(EditOutcome::Conflict);
        }

        let mut tail = String::new();
        if first != last {
            let swallowed = &self.slots[first + 1..=last];
            if swallowed.iter().any(|s| s.dropped || !s.appended.is_empty())
                || swallowed[..swallowed.len() - 1].iter().any(|s| !s.edits.is_empty())
                || self.slots[last].edits.iter().any(|e| e.start < end_column)
            {
                return Ok(EditOutcome::Conflict);
            }
            // edits behind the span on its last line stay in effect through the tail
            tail = render_from(&self.original[last], &self.slots[last].edits, end_column);
            for slot in &mut self.slots[first + 1..=last] {
                slot.dropped = true;
            }
        }

        let slot = &mut self.slots[first];
        slot.edits.push(ColumnEdit {
            origin,
            start,
            end,
            text: text.to_string(),
            tail,
        });
        slot.edits.sort_by_key(|e| (e.start, e.end));
        Ok(EditOutcome::Applied)
    }

    /// Replace the text covered by `pos`. Conflicts with any earlier edit of
    /// an overlapping range.
    pub fn replace_span(&mut self, pos: &SourcePosition, text: &str) -> Result<EditOutcome, WdlError> {
        self.add_edit(pos, text, false)
    }

    /// Like [`replace_span`](Self::replace_span), but an earlier edit of
    /// exactly the same range is overwritten
    pub fn set_span(&mut self, pos: &SourcePosition, text: &str) -> Result<EditOutcome, WdlError> {
        self.add_edit(pos, text, true)
    }

    /// Add a whole line after `after_line` (1-based). A line swallowed by a
    /// multi-line replacement forwards to the line that absorbed it.
    pub fn append_line(&mut self, after_line: u32, text: &str) -> Result<EditOutcome, WdlError> {
        let mut index = self.check_line(after_line)?;
        while self.slots[index].dropped && index > 0 {
            index -= 1;
        }
        let slot = &mut self.slots[index];
        if slot.appended.iter().any(|l| l == text) {
            return Ok(EditOutcome::Unchanged);
        }
        slot.appended.push(text.to_string());
        Ok(EditOutcome::Applied)
    }

    pub fn has_changes(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.dropped || !s.appended.is_empty() || !s.edits.is_empty())
    }

    /// Rendered document, one entry per line, sentinel excluded
    pub fn modified_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let count = self.line_count();
        for (index, (original, slot)) in self.original.iter().zip(&self.slots).enumerate() {
            if index < count && !slot.dropped {
                lines.extend(render(original, &slot.edits).split('\n').map(str::to_string));
            }
            for appended in &slot.appended {
                lines.extend(appended.split('\n').map(str::to_string));
            }
        }
        lines
    }

    /// Rendered document as text
    pub fn modified_text(&self) -> String {
        let mut text = self.modified_lines().join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }

    /// Unified diff against the original, `None` when nothing changed
    pub fn create_patch(&self, abspath_root: &str, context: usize) -> Option<FilePatch> {
        if !self.has_changes() {
            return None;
        }
        let original = &self.original[..self.line_count()];
        let modified = self.modified_lines();
        let path = relative_path(&self.abspath, abspath_root);
        let from_date = self.source_date();
        let to_date = Local::now().to_rfc3339();

        let diff = unified_diff(
            original,
            &modified,
            FileLabel {
                path: &path,
                date: &from_date,
                missing_newline: !self.trailing_newline,
            },
            FileLabel {
                path: &path,
                date: &to_date,
                missing_newline: !self.trailing_newline,
            },
            context,
        );
        if diff.text.is_empty() {
            return None;
        }
        let lines_patched = diff
            .text
            .lines()
            .filter(|l| l.starts_with('+') && !l.starts_with("+++ "))
            .count();
        Some(FilePatch {
            path,
            abspath: self.abspath.clone(),
            lines_patched,
            hunks: diff.hunks,
            diff: diff.text,
        })
    }

    /// Modification time of the source file, now for remote documents
    fn source_date(&self) -> String {
        if is_http(&self.abspath) {
            return Local::now().to_rfc3339();
        }
        fs::metadata(&self.abspath)
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).to_rfc3339())
            .unwrap_or_else(|_| Local::now().to_rfc3339())
    }
}

fn render(original: &str, edits: &[ColumnEdit]) -> String {
    render_from(original, edits, 0)
}

/// Render `original` from char `skip` on with `edits` applied
fn render_from(original: &str, edits: &[ColumnEdit], skip: usize) -> String {
    let chars: Vec<char> = original.chars().collect();
    let mut out = String::new();
    let mut cursor = skip.min(chars.len());
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.extend(&chars[cursor..edit.start.min(chars.len())]);
        out.push_str(&edit.text);
        out.push_str(&edit.tail);
        cursor = edit.end.min(chars.len()).max(cursor);
    }
    out.extend(&chars[cursor..]);
    out
}

fn strip_scheme(path: &str) -> &str {
    path.strip_prefix("https:/")
        .or_else(|| path.strip_prefix("http:/"))
        .unwrap_or(path)
}

/// Directory all `abspaths` share, one level above their common path. URLs
/// are reduced to `/host/path` first.
pub fn common_root<S: AsRef<str>>(abspaths: &[S]) -> String {
    let mut common: Option<Vec<&str>> = None;
    for path in abspaths {
        let parts: Vec<&str> = strip_scheme(path.as_ref())
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        common = Some(match common {
            None => parts,
            Some(prefix) => prefix
                .iter()
                .zip(&parts)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }
    let mut parts = common.unwrap_or_default();
    parts.pop();
    format!("/{}", parts.join("/"))
}

/// `abspath` relative to `root` as `./rest`; paths outside `root` are kept.
pub fn relative_path(abspath: &str, root: &str) -> String {
    let path = strip_scheme(abspath);
    let root = root.trim_end_matches('/');
    match path.strip_prefix(root) {
        Some(rest) if rest.starts_with('/') => format!(".{}", rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "task t {\n  input {\n    String d = \"img:1\"\n  }\n  runtime {\n    docker: d\n  }\n}\n";

    fn span(line: u32, column: u32, end_line: u32, end_column: u32) -> SourcePosition {
        SourcePosition::new("t.wdl".into(), "/w/t.wdl".into(), line, column, end_line, end_column)
    }

    #[test]
    fn test_replace_keeps_positions() {
        let mut patch = DocumentPatch::from_source("/w/t.wdl", SOURCE);
        assert_eq!(patch.replace_span(&span(6, 13, 6, 14), "img_docker").unwrap(), EditOutcome::Applied);
        assert_eq!(patch.replace_span(&span(3, 5, 3, 23), "String img_docker").unwrap(), EditOutcome::Applied);
        let lines = patch.modified_lines();
        assert_eq!(lines[5], "    docker: img_docker");
        assert_eq!(patch.original_line(6).unwrap(), "    docker: d");
        assert_eq!(lines[2], "    String img_docker");
        assert!(patch.has_changes());
        assert!(patch.modified_text().ends_with("}\n"));
    }

    #[test]
    fn test_conflicts_and_overrides() {
        let mut patch = DocumentPatch::from_source("/w/t.wdl", SOURCE);
        let pos = span(3, 5, 3, 23);
        patch.replace_span(&pos, "String a").unwrap();
        assert_eq!(patch.replace_span(&pos, "String a").unwrap(), EditOutcome::Unchanged);
        assert_eq!(patch.replace_span(&pos, "String b").unwrap(), EditOutcome::Conflict);
        assert_eq!(patch.replace_span(&span(3, 12, 3, 13), "x").unwrap(), EditOutcome::Conflict);
        assert_eq!(patch.set_span(&pos, "String b").unwrap(), EditOutcome::Applied);
        assert_eq!(patch.modified_lines()[2], "    String b");
        assert!(patch.replace_span(&span(40, 1, 40, 2), "x").is_err());
    }

    #[test]
    fn test_append_and_zero_width_edit() {
        let mut patch = DocumentPatch::from_source("/w/t.wdl", SOURCE);
        patch.append_line(3, "    String b_docker").unwrap();
        assert_eq!(patch.append_line(3, "    String b_docker").unwrap(), EditOutcome::Unchanged);
        patch.set_span(&span(1, 9, 1, 9), " # a").unwrap();
        assert_eq!(patch.set_span(&span(1, 9, 1, 9), " # a b").unwrap(), EditOutcome::Applied);
        let lines = patch.modified_lines();
        assert_eq!(lines[0], "task t { # a b");
        assert_eq!(lines[3], "    String b_docker");
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn test_multi_line_replacement_drops_lines() {
        let mut patch = DocumentPatch::from_source("/w/t.wdl", SOURCE);
        // `{ ... }` of the input section
        assert_eq!(
            patch.replace_span(&span(2, 9, 4, 4), "{\n    String x\n  }").unwrap(),
            EditOutcome::Applied
        );
        assert_eq!(patch.modified_lines().len(), 8);
        patch.append_line(4, "    # after").unwrap();
        let lines = patch.modified_lines();
        assert_eq!(&lines[1..5], &["  input {", "    String x", "  }", "    # after"]);
        assert_eq!(patch.replace_span(&span(3, 5, 3, 10), "y").unwrap(), EditOutcome::Conflict);
    }

    #[test]
    fn test_create_patch() {
        let mut patch = DocumentPatch::from_source("/w/sub/t.wdl", SOURCE);
        assert!(patch.create_patch("/w", 3).is_none());
        patch.replace_span(&span(6, 13, 6, 14), "img_docker").unwrap();
        let file = patch.create_patch("/w", 1).unwrap();
        assert_eq!(file.path, "./sub/t.wdl");
        assert_eq!(file.hunks, 1);
        assert_eq!(file.lines_patched, 1);
        assert!(file.diff.starts_with("--- ./sub/t.wdl\t"));
        assert!(file.diff.contains("@@ -5,3 +5,3 @@\n   runtime {\n-    docker: d\n+    docker: img_docker\n   }\n"));
    }

    #[test]
    fn test_patch_of_unterminated_source() {
        let mut patch = DocumentPatch::from_source("/w/t.wdl", SOURCE.trim_end_matches('\n'));
        patch.replace_span(&span(6, 13, 6, 14), "img_docker").unwrap();
        assert!(patch.modified_text().ends_with("  }\n}"));

        let file = patch.create_patch("/w", 3).unwrap();
        assert!(file.diff.ends_with("   }\n }\n\\ No newline at end of file\n"));
        assert_eq!(file.lines_patched, 1);
        assert!(patch.create_patch("/w", 1).unwrap().diff.ends_with("   }\n"));
    }

    #[test]
    fn test_common_root() {
        assert_eq!(common_root(&["/a/b/main.wdl", "/a/b/lib/x.wdl"]), "/a");
        assert_eq!(common_root(&["/a/b/main.wdl"]), "/a/b");
        assert_eq!(
            common_root(&["https://host/repo/main.wdl", "https://host/repo/tasks/t.wdl"]),
            "/host"
        );
        assert_eq!(relative_path("https://host/repo/main.wdl", "/host"), "./repo/main.wdl");
        assert_eq!(relative_path("/x/y.wdl", "/a"), "/x/y.wdl");
        assert_eq!(relative_path("/a/y.wdl", "/"), "./a/y.wdl");
    }
}

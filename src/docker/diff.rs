//! Line based unified diff
//!
//! Shortest edit script by Myers' algorithm, grouped into hunks the same way
//! `diff -u` does, so `patch -p1` applies the output

use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[i1..i2]` relates to `b[j1..j2]` as `tag` says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    pub tag: Tag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

impl OpCode {
    fn new(tag: Tag, i1: usize, i2: usize, j1: usize, j2: usize) -> Self {
        OpCode { tag, i1, i2, j1, j2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal,
    Delete,
    Insert,
}

/// Edit script turning `a` into `b`, in order
fn myers<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max + 1;
    let idx = |k: isize| (k + offset) as usize;
    let mut v = vec![0isize; 2 * (max as usize) + 3];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'outer: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n && y >= m {
                break 'outer;
            }
            k += 2;
        }
    }

    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[idx(prev_k)];
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            edits.push(Edit::Equal);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            edits.push(if x == prev_x { Edit::Insert } else { Edit::Delete });
        }
        x = prev_x;
        y = prev_y;
    }
    edits.reverse();
    edits
}

/// Opcodes turning `a` into `b`; a run of deletions and insertions between
/// two equal runs becomes one `Replace`.
pub fn opcodes<T: PartialEq>(a: &[T], b: &[T]) -> Vec<OpCode> {
    let mut codes = Vec::new();
    let (mut i, mut j) = (0, 0);
    let edits = myers(a, b);
    let mut iter = edits.iter().peekable();

    while let Some(edit) = iter.next() {
        let (i1, j1) = (i, j);
        if *edit == Edit::Equal {
            i += 1;
            j += 1;
            while iter.peek() == Some(&&Edit::Equal) {
                iter.next();
                i += 1;
                j += 1;
            }
            codes.push(OpCode::new(Tag::Equal, i1, i, j1, j));
            continue;
        }

        let mut step = |e: &Edit| match e {
            Edit::Delete => i += 1,
            Edit::Insert => j += 1,
            Edit::Equal => {}
        };
        step(edit);
        while let Some(next) = iter.peek() {
            if **next == Edit::Equal {
                break;
            }
            step(*next);
            iter.next();
        }
        let tag = match (i > i1, j > j1) {
            (true, true) => Tag::Replace,
            (true, false) => Tag::Delete,
            _ => Tag::Insert,
        };
        codes.push(OpCode::new(tag, i1, i, j1, j));
    }
    codes
}

/// Hunks with up to `context` lines of surrounding equal lines
pub fn grouped_opcodes(mut codes: Vec<OpCode>, context: usize) -> Vec<Vec<OpCode>> {
    if codes.is_empty() {
        codes.push(OpCode::new(Tag::Equal, 0, 1, 0, 1));
    }
    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.i1 = first.i1.max(first.i2.saturating_sub(context));
            first.j1 = first.j1.max(first.j2.saturating_sub(context));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.i2 = last.i2.min(last.i1 + context);
            last.j2 = last.j2.min(last.j1 + context);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == Tag::Equal && code.i2 - code.i1 > 2 * context {
            group.push(OpCode::new(
                Tag::Equal,
                code.i1,
                code.i2.min(code.i1 + context),
                code.j1,
                code.j2.min(code.j1 + context),
            ));
            groups.push(std::mem::take(&mut group));
            code.i1 = code.i1.max(code.i2.saturating_sub(context));
            code.j1 = code.j1.max(code.j2.saturating_sub(context));
        }
        group.push(code);
    }
    if !group.is_empty() && !(group.len() == 1 && group[0].tag == Tag::Equal) {
        groups.push(group);
    }
    groups
}

fn format_range(start: usize, stop: usize) -> String {
    let mut beginning = start + 1;
    let length = stop - start;
    if length == 1 {
        return beginning.to_string();
    }
    if length == 0 {
        beginning -= 1;
    }
    format!("{},{}", beginning, length)
}

/// File name and timestamp of one side of a diff
#[derive(Debug, Clone, Copy)]
pub struct FileLabel<'a> {
    pub path: &'a str,
    pub date: &'a str,
    /// The last line has no terminator
    pub missing_newline: bool,
}

const NO_NEWLINE: &str = "\\ No newline at end of file";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDiff {
    pub text: String,
    pub hunks: usize,
}

/// Unified diff of two line lists; lines carry no terminator. Empty text
/// when both sides are equal. A side whose last line lacks a newline gets
/// the `\ No newline at end of file` marker behind that line.
pub fn unified_diff(
    a: &[String],
    b: &[String],
    from: FileLabel<'_>,
    to: FileLabel<'_>,
    context: usize,
) -> UnifiedDiff {
    let groups = grouped_opcodes(opcodes(a, b), context);
    let mut text = String::new();
    if groups.is_empty() {
        return UnifiedDiff::default();
    }

    let header = |label: FileLabel<'_>| {
        if label.date.is_empty() {
            label.path.to_string()
        } else {
            format!("{}\t{}", label.path, label.date)
        }
    };
    let _ = writeln!(text, "--- {}", header(from));
    let _ = writeln!(text, "+++ {}", header(to));

    for group in &groups {
        let (first, last) = match (group.first(), group.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };
        let _ = writeln!(
            text,
            "@@ -{} +{} @@",
            format_range(first.i1, last.i2),
            format_range(first.j1, last.j2)
        );
        for code in group {
            if code.tag == Tag::Equal {
                for (i, line) in (code.i1..code.i2).zip(&a[code.i1..code.i2]) {
                    let _ = writeln!(text, " {}", line);
                    if i + 1 == a.len() && from.missing_newline {
                        let _ = writeln!(text, "{}", NO_NEWLINE);
                    }
                }
                continue;
            }
            if matches!(code.tag, Tag::Replace | Tag::Delete) {
                for (i, line) in (code.i1..code.i2).zip(&a[code.i1..code.i2]) {
                    let _ = writeln!(text, "-{}", line);
                    if i + 1 == a.len() && from.missing_newline {
                        let _ = writeln!(text, "{}", NO_NEWLINE);
                    }
                }
            }
            if matches!(code.tag, Tag::Replace | Tag::Insert) {
                for (j, line) in (code.j1..code.j2).zip(&b[code.j1..code.j2]) {
                    let _ = writeln!(text, "+{}", line);
                    if j + 1 == b.len() && to.missing_newline {
                        let _ = writeln!(text, "{}", NO_NEWLINE);
                    }
                }
            }
        }
    }

    UnifiedDiff {
        text,
        hunks: groups.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn label(path: &str) -> FileLabel<'_> {
        FileLabel {
            path,
            date: "",
            missing_newline: false,
        }
    }

    #[test]
    fn test_opcodes() {
        let a = lines("a\nb\nc\nd");
        let b = lines("a\nx\nc\nd\ne");
        assert_eq!(
            opcodes(&a, &b),
            vec![
                OpCode::new(Tag::Equal, 0, 1, 0, 1),
                OpCode::new(Tag::Replace, 1, 2, 1, 2),
                OpCode::new(Tag::Equal, 2, 4, 2, 4),
                OpCode::new(Tag::Insert, 4, 4, 4, 5),
            ]
        );
        assert!(opcodes::<String>(&[], &[]).is_empty());
        assert_eq!(
            opcodes(&a, &lines("a\nd")),
            vec![
                OpCode::new(Tag::Equal, 0, 1, 0, 1),
                OpCode::new(Tag::Delete, 1, 3, 1, 1),
                OpCode::new(Tag::Equal, 3, 4, 1, 2),
            ]
        );
    }

    #[test]
    fn test_unified_single_hunk() {
        let a = lines("version 1.0\ntask t {\n  runtime {\n    docker: \"img:1\"\n  }\n}");
        let mut b = a.clone();
        b[3] = "    docker: img_docker".to_string();
        let diff = unified_diff(&a, &b, label("./t.wdl"), label("./t.wdl"), 3);
        assert_eq!(diff.hunks, 1);
        assert_eq!(
            diff.text,
            "--- ./t.wdl\n+++ ./t.wdl\n@@ -1,6 +1,6 @@\n version 1.0\n task t {\n   runtime {\n-    docker: \"img:1\"\n+    docker: img_docker\n   }\n }\n"
        );
    }

    #[test]
    fn test_distant_changes_split_hunks() {
        let a: Vec<String> = (1..=20).map(|i| format!("line {}", i)).collect();
        let mut b = a.clone();
        b[1] = "changed 2".to_string();
        b.insert(18, "inserted".to_string());
        let diff = unified_diff(&a, &b, label("a"), label("b"), 2);
        assert_eq!(diff.hunks, 2);
        assert!(diff.text.contains("@@ -1,4 +1,4 @@\n"));
        assert!(diff.text.contains("@@ -17,4 +17,5 @@\n"));
    }

    #[test]
    fn test_no_changes_no_diff() {
        let a = lines("a\nb");
        assert_eq!(unified_diff(&a, &a, label("a"), label("a"), 3), UnifiedDiff::default());
    }

    #[test]
    fn test_dates_in_header() {
        let a = lines("a");
        let b = lines("b");
        let from = FileLabel {
            path: "./x.wdl",
            date: "2024-01-01T00:00:00+00:00",
            missing_newline: false,
        };
        let diff = unified_diff(&a, &b, from, from, 0);
        assert!(diff.text.starts_with("--- ./x.wdl\t2024-01-01T00:00:00+00:00\n+++ ./x.wdl\t"));
        assert!(diff.text.contains("@@ -1 +1 @@\n-a\n+b\n"));
    }

    #[test]
    fn test_missing_newline_marker() {
        let unterminated = |path: &'static str| FileLabel {
            missing_newline: true,
            ..label(path)
        };
        let a = lines("a\nb\nc");

        let mut b = a.clone();
        b[2] = "z".to_string();
        let diff = unified_diff(&a, &b, unterminated("x"), unterminated("x"), 1);
        assert!(diff
            .text
            .ends_with("@@ -2,2 +2,2 @@\n b\n-c\n\\ No newline at end of file\n+z\n\\ No newline at end of file\n"));

        let mut b = a.clone();
        b[0] = "z".to_string();
        let diff = unified_diff(&a, &b, unterminated("x"), unterminated("x"), 3);
        assert!(diff.text.ends_with(" c\n\\ No newline at end of file\n"));
        assert_eq!(diff.text.matches("No newline").count(), 1);

        let diff = unified_diff(&a, &b, unterminated("x"), unterminated("x"), 1);
        assert!(!diff.text.contains("No newline"));

        let diff = unified_diff(&a, &b, label("x"), label("x"), 3);
        assert!(!diff.text.contains("No newline"));
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range(0, 1), "1");
        assert_eq!(format_range(3, 3), "3,0");
        assert_eq!(format_range(2, 6), "3,4");
    }
}

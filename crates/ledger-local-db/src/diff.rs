//! Unified diffs between consecutive file versions.
//!
//! Lines are split on `\n` only, so a bare `\r` is ordinary line content and
//! every line of a diff ends in `\n`. Both sides are labelled
//! `"<path> (v<n>)"`. [`apply_unified_diff`] is the exact inverse: applying the
//! stored diff of version `k` to the content of version `k - 1` yields version
//! `k`.

use similar::{ChangeTag, DiffTag, TextDiff};
use std::ops::Range;

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";
const CONTEXT_RADIUS: usize = 3;

/// Header label for one side of a diff.
pub fn version_label(file_path: &str, version: i64) -> String {
    format!("{} (v{})", file_path, version)
}

/// Line-based unified diff from `old` (version `old_version`) to `new`
/// (version `old_version + 1`). Identical inputs produce an empty string.
pub fn unified_diff(file_path: &str, old_version: i64, old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();
    let diff = TextDiff::from_slices(old_lines.as_slice(), new_lines.as_slice());

    let mut out = String::new();
    for group in diff.grouped_ops(CONTEXT_RADIUS) {
        if group.iter().all(|op| op.tag() == DiffTag::Equal) {
            continue;
        }
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        if out.is_empty() {
            out.push_str(&format!("--- {}\n", version_label(file_path, old_version)));
            out.push_str(&format!("+++ {}\n", version_label(file_path, old_version + 1)));
        }
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            hunk_range(first.old_range().start..last.old_range().end),
            hunk_range(first.new_range().start..last.new_range().end),
        ));

        for op in &group {
            for change in diff.iter_changes(op) {
                out.push(match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                });
                let value = change.value();
                out.push_str(value);
                if !value.ends_with('\n') {
                    out.push('\n');
                    out.push_str(NO_NEWLINE_MARKER);
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// `start,len` in one-based hunk header form; an empty range names the line
/// it follows.
fn hunk_range(range: Range<usize>) -> String {
    match range.len() {
        0 => format!("{},0", range.start),
        1 => format!("{}", range.start + 1),
        len => format!("{},{}", range.start + 1, len),
    }
}

/// Apply a unified diff produced by [`unified_diff`] to `old`.
///
/// Context and removed lines are checked against `old`; any mismatch is a
/// [`crate::Error::Patch`].
pub fn apply_unified_diff(old: &str, diff: &str) -> crate::Result<String> {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let mut out = String::with_capacity(old.len());
    let mut cursor = 0usize;
    let mut in_hunk = false;
    // Last line emitted or consumed, so a no-newline marker can trim it
    let mut pending: Option<Pending> = None;

    for raw in diff.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);

        if line.starts_with("@@") {
            flush(&mut pending, &old_lines, &mut cursor, &mut out)?;
            let start = parse_old_start(line)?;
            if start < cursor || start > old_lines.len() {
                return Err(crate::Error::patch(format!("hunk out of range: {}", line)));
            }
            out.extend(old_lines[cursor..start].iter().copied());
            cursor = start;
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            // file headers before the first hunk
            if line.starts_with("---") || line.starts_with("+++") {
                continue;
            }
            return Err(crate::Error::patch(format!("unexpected line before hunk: {}", line)));
        }

        if line == NO_NEWLINE_MARKER {
            match pending.as_mut() {
                Some(p) => {
                    if p.text.ends_with('\n') {
                        p.text.pop();
                    }
                }
                None => return Err(crate::Error::patch("dangling no-newline marker")),
            }
            continue;
        }

        flush(&mut pending, &old_lines, &mut cursor, &mut out)?;
        let mut chars = line.chars();
        let kind = match chars.next() {
            Some(' ') => LineKind::Context,
            Some('-') => LineKind::Removed,
            Some('+') => LineKind::Added,
            _ => return Err(crate::Error::patch(format!("malformed hunk line: {}", line))),
        };
        let body = chars.as_str();
        pending = Some(Pending {
            kind,
            text: format!("{}\n", body),
        });
    }

    flush(&mut pending, &old_lines, &mut cursor, &mut out)?;
    out.extend(old_lines[cursor..].iter().copied());
    Ok(out)
}

#[derive(Clone, Copy)]
enum LineKind {
    Context,
    Removed,
    Added,
}

struct Pending {
    kind: LineKind,
    text: String,
}

fn flush(
    pending: &mut Option<Pending>,
    old_lines: &[&str],
    cursor: &mut usize,
    out: &mut String,
) -> crate::Result<()> {
    let Some(p) = pending.take() else {
        return Ok(());
    };

    match p.kind {
        LineKind::Added => out.push_str(&p.text),
        LineKind::Context | LineKind::Removed => {
            let expected = old_lines.get(*cursor).copied().ok_or_else(|| {
                crate::Error::patch(format!("diff runs past end of input at line {}", *cursor + 1))
            })?;
            if expected != p.text {
                return Err(crate::Error::patch(format!(
                    "line {} does not match diff: expected {:?}, found {:?}",
                    *cursor + 1,
                    p.text,
                    expected
                )));
            }
            if matches!(p.kind, LineKind::Context) {
                out.push_str(expected);
            }
            *cursor += 1;
        }
    }
    Ok(())
}

/// Zero-based index of the first old line a hunk touches.
///
/// `@@ -s,0 ...` inserts after line `s`; otherwise the hunk starts at `s`.
fn parse_old_start(header: &str) -> crate::Result<usize> {
    let bad = || crate::Error::patch(format!("malformed hunk header: {}", header));

    let range = header
        .split_whitespace()
        .find_map(|part| part.strip_prefix('-'))
        .ok_or_else(bad)?;
    let (start, len) = match range.split_once(',') {
        Some((s, l)) => (s, l.parse::<usize>().map_err(|_| bad())?),
        None => (range, 1),
    };
    let start = start.parse::<usize>().map_err(|_| bad())?;

    if len == 0 {
        Ok(start)
    } else {
        start.checked_sub(1).ok_or_else(bad)
    }
}

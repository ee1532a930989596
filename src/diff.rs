use std::fmt::Write as _;

use similar::{ChangeTag, DiffOp, TextDiff};

use crate::logging::{LineSpan, LineSpanKind};

pub fn render_diff(old: &str, new: &str, context: usize, colorize: bool) -> String {
    let diff = TextDiff::configure()
        .algorithm(similar::Algorithm::Myers)
        .diff_lines(old, new);

    let mut out = String::new();
    for (idx, group) in diff.grouped_ops(context).iter().enumerate() {
        if idx > 0 {
            out.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("- ", "\x1b[31m"),
                    ChangeTag::Insert => ("+ ", "\x1b[32m"),
                    ChangeTag::Equal => ("  ", ""),
                };
                let paint = colorize && !color.is_empty();
                if paint {
                    out.push_str(color);
                }
                let _ = write!(out, "{sign}{change}");
                if change.missing_newline() {
                    out.push('\n');
                }
                if paint {
                    out.push_str("\x1b[0m");
                }
            }
        }
    }
    out
}

pub fn print_diff(old: &str, new: &str, context: usize, colorize: bool) {
    print!("{}", render_diff(old, new, context, colorize));
}

/// Line runs that differ between two texts, for the edit log.
pub fn changed_spans(old: &str, new: &str) -> Vec<LineSpan> {
    let diff = TextDiff::from_lines(old, new);
    diff.ops()
        .iter()
        .filter_map(|op| match *op {
            DiffOp::Equal { .. } => None,
            DiffOp::Insert {
                new_index, new_len, ..
            } => Some(LineSpan {
                kind: LineSpanKind::Added,
                start: new_index + 1,
                len: new_len,
            }),
            DiffOp::Delete {
                old_index, old_len, ..
            } => Some(LineSpan {
                kind: LineSpanKind::Removed,
                start: old_index + 1,
                len: old_len,
            }),
            DiffOp::Replace {
                new_index, new_len, ..
            } => Some(LineSpan {
                kind: LineSpanKind::Changed,
                start: new_index + 1,
                len: new_len,
            }),
        })
        .collect()
}

/// Patch that turns `new` back into `old`.
pub fn undo_patch(old: &str, new: &str) -> String {
    diffy::create_patch(new, old).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cover_each_kind() {
        let old = "a\nb\nc\nd\n";
        let new = "a\nB\nc\nd\ne\n";
        let spans = changed_spans(old, new);
        assert_eq!(
            spans,
            vec![
                LineSpan {
                    kind: LineSpanKind::Changed,
                    start: 2,
                    len: 1
                },
                LineSpan {
                    kind: LineSpanKind::Added,
                    start: 5,
                    len: 1
                },
            ]
        );
        assert!(changed_spans(old, old).is_empty());
    }

    #[test]
    fn plain_diff_marks_lines() {
        let rendered = render_diff("x: 1\ny: 2\n", "x: 1\ny: 3\n", 1, false);
        assert_eq!(rendered, "  x: 1\n- y: 2\n+ y: 3\n");
    }

    #[test]
    fn undo_patch_restores_old_text() {
        let old = "key: 5  # keep me\nother: 1\n";
        let new = "key: 7  # keep me\nother: 1\n";
        let text = undo_patch(old, new);
        let patch = diffy::Patch::from_str(&text).expect("patch");
        assert_eq!(diffy::apply(new, &patch).expect("apply"), old);
    }
}

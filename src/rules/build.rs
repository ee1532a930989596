use super::{FrequencyGroup, GLOBAL_MARKER, GROUPS_MARKER, RuleDocument};
use crate::lines::LineSequence;

fn is_filler(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn marker_at(lines: &[String], marker: &str) -> Option<usize> {
    lines.iter().position(|line| line.trim() == marker)
}

/// A blank line goes between two groups unless they belong to the same
/// related run, or the next group already opens with a blank line.
fn needs_separator(group: &FrequencyGroup, next: &FrequencyGroup) -> bool {
    let same_run = group.is_related() && next.related.is_some_and(|run| run.index > 0);
    let opens_blank = next
        .preceding_comments
        .first()
        .is_some_and(|line| line.trim().is_empty());
    !(same_run || opens_blank)
}

fn render_global(out: &mut Vec<String>, doc: &RuleDocument, skeleton: &[String], at: usize) {
    out.push(skeleton[at].clone());
    let region = &skeleton[at + 1..];
    let (lead, tail) = match region.iter().rposition(|line| !is_filler(line)) {
        Some(last) => (
            region.iter().take_while(|line| is_filler(line)).count(),
            last + 1,
        ),
        // Only comments and blanks: filters go after the last comment.
        None => {
            let lead = region
                .iter()
                .rposition(|line| !line.trim().is_empty())
                .map_or(0, |last| last + 1);
            (lead, lead)
        }
    };
    out.extend(region[..lead].iter().cloned());

    // Comments between filters stay above the filter they precede.
    let body = &region[lead..tail];
    let mut attached: Vec<(&str, &[String])> = Vec::new();
    let mut pending = 0;
    for (idx, line) in body.iter().enumerate() {
        if !is_filler(line) {
            attached.push((line.trim(), &body[pending..idx]));
            pending = idx + 1;
        }
    }
    for filter in &doc.global_filters {
        if let Some(pos) = attached.iter().position(|(text, _)| *text == filter.as_str()) {
            let (_, filler) = attached.remove(pos);
            out.extend(filler.iter().cloned());
        }
        out.push(filter.clone());
    }
    out.extend(region[tail..].iter().cloned());
}

fn render_groups(out: &mut Vec<String>, doc: &RuleDocument) {
    for (position, group) in doc.groups.iter().enumerate() {
        out.extend(group.preceding_comments.iter().cloned());
        out.extend(group.body.lines());
        if let Some(next) = doc.groups.get(position + 1) {
            if needs_separator(group, next) {
                out.push(String::new());
            }
        }
    }
    out.extend(doc.trailing_comments.iter().cloned());
}

fn render(doc: &RuleDocument, skeleton: &[String], fresh: bool) -> Vec<String> {
    let global_at = marker_at(skeleton, GLOBAL_MARKER);
    let groups_at = marker_at(skeleton, GROUPS_MARKER);
    let mut out = Vec::new();

    let first_marker = match (global_at, groups_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(first) = first_marker {
        out.extend(skeleton[..first].iter().cloned());
    }

    match global_at {
        Some(at) => {
            let end = groups_at.filter(|&g| g > at).unwrap_or(skeleton.len());
            render_global(&mut out, doc, &skeleton[..end], at);
        }
        None if !doc.global_filters.is_empty() => {
            out.push(GLOBAL_MARKER.to_string());
            out.extend(doc.global_filters.iter().cloned());
            out.push(String::new());
        }
        None => {}
    }

    let markerless = first_marker.is_none() && !fresh && doc.global_filters.is_empty();
    match groups_at {
        Some(at) => out.push(skeleton[at].clone()),
        None if markerless => {}
        None => out.push(GROUPS_MARKER.to_string()),
    }

    render_groups(&mut out, doc);
    out
}

/// Writes a rule document back to text. With `original`, the text between
/// and around the section markers is reused and the original's line
/// terminator, byte order mark and final newline are kept.
pub fn build(doc: &RuleDocument, original: Option<&str>) -> String {
    match original {
        Some(text) => {
            let mut sequence = LineSequence::parse(text);
            let lines = render(doc, sequence.lines(), false);
            sequence.set_lines(lines);
            sequence.to_text()
        }
        None => LineSequence::from_lines(render(doc, &[], true)).to_text(),
    }
}

//! Indentation-aware lookups over a line sequence.
//!
//! Nothing here builds a document tree. Every query is a scan over lines that
//! relies on the fixed two-space step used by the served templates, and none
//! of them mutate their input. Callers re-run queries after every write.

use std::ops::Range;

/// Columns added per nesting level in the settings and schedule documents.
pub const INDENT_STEP: usize = 2;

/// Umbrella key whose children are addressable as sections by name.
pub const PRESETS_KEY: &str = "presets";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocatedLine {
    pub index: usize,
    pub indent: usize,
}

/// A key line and the block it owns. `end` is exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub indent: usize,
}

impl Span {
    pub fn header(&self) -> LocatedLine {
        LocatedLine {
            index: self.start,
            indent: self.indent,
        }
    }

    /// End of the block once trailing blank and comment lines are given back
    /// to whatever follows it.
    pub fn content_end(&self, lines: &[String]) -> usize {
        let mut end = self.end.min(lines.len());
        while end > self.start + 1 && is_blank_or_comment(&lines[end - 1]) {
            end -= 1;
        }
        end
    }

    pub fn child_indent(&self) -> usize {
        self.indent + INDENT_STEP
    }
}

/// The parts of a `key: value` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLine<'a> {
    pub indent: usize,
    pub key: &'a str,
    /// Byte range of the key token, quotes included.
    pub key_range: Range<usize>,
    /// Byte offset where the value text starts (after `:` and its padding).
    pub value_start: usize,
}

impl KeyLine<'_> {
    pub fn prefix<'l>(&self, line: &'l str) -> &'l str {
        &line[..self.value_start]
    }

    pub fn rest<'l>(&self, line: &'l str) -> &'l str {
        &line[self.value_start..]
    }
}

pub fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

pub fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

pub fn split_key_line(line: &str) -> Option<KeyLine<'_>> {
    let indent = indent_of(line);
    let body = &line[indent..];
    if body.is_empty() || body.starts_with('#') || body.starts_with('-') {
        return None;
    }

    let (key, key_len) = match body.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let close = body[1..].find(quote)?;
            let key = &body[1..1 + close];
            if !body[close + 2..].starts_with(':') {
                return None;
            }
            (key, close + 2)
        }
        _ => {
            let colon = body.match_indices(':').find_map(|(pos, _)| {
                let next = body[pos + 1..].chars().next();
                matches!(next, None | Some(' ') | Some('\t')).then_some(pos)
            })?;
            let key = body[..colon].trim_end();
            (key, key.len())
        }
    };
    if key.is_empty() {
        return None;
    }

    let key_range = indent..indent + key_len;
    let after_key = &body[key_len..];
    let colon_offset = after_key.find(':')?;
    let after_colon = indent + key_len + colon_offset + 1;
    let padding = line[after_colon..].len() - line[after_colon..].trim_start().len();
    Some(KeyLine {
        indent,
        key,
        key_range,
        value_start: after_colon + padding,
    })
}

pub fn key_token(line: &str) -> Option<&str> {
    split_key_line(line).map(|parsed| parsed.key)
}

/// Finds `key` exactly one indentation step below `parent_indent` inside
/// `(start, end)`. Gives up once the scan leaves the parent's scope.
pub fn find_child_key(
    lines: &[String],
    start: usize,
    end: usize,
    parent_indent: usize,
    key: &str,
) -> Option<usize> {
    let end = end.min(lines.len());
    for idx in start + 1..end {
        let line = &lines[idx];
        if is_blank_or_comment(line) {
            continue;
        }
        let indent = indent_of(line);
        if indent <= parent_indent {
            return None;
        }
        if indent == parent_indent + INDENT_STEP && key_token(line) == Some(key) {
            return Some(idx);
        }
    }
    None
}

pub fn find_top_level_key(lines: &[String], key: &str) -> Option<usize> {
    lines.iter().position(|line| {
        !is_blank_or_comment(line) && indent_of(line) == 0 && key_token(line) == Some(key)
    })
}

pub fn find_block_end(lines: &[String], start: usize, indent: usize, max_end: usize) -> usize {
    let max_end = max_end.min(lines.len());
    for idx in start + 1..max_end {
        let line = &lines[idx];
        if is_blank_or_comment(line) {
            continue;
        }
        if indent_of(line) <= indent {
            return idx;
        }
    }
    max_end
}

pub fn span_at(lines: &[String], start: usize, max_end: usize) -> Span {
    let indent = indent_of(&lines[start]);
    Span {
        start,
        end: find_block_end(lines, start, indent, max_end),
        indent,
    }
}

/// Walks a key path from the top level down, one indentation step at a time.
pub fn find_path(lines: &[String], path: &[&str]) -> Option<Span> {
    let (first, rest) = path.split_first()?;
    let start = find_top_level_key(lines, first)?;
    let mut span = span_at(lines, start, lines.len());
    for segment in rest {
        let idx = find_child_key(lines, span.start, span.end, span.indent, segment)?;
        span = span_at(lines, idx, span.end);
    }
    Some(span)
}

/// A top-level section, or a preset nested one level under `presets`.
pub fn find_section(lines: &[String], name: &str) -> Option<Span> {
    find_path(lines, &[name]).or_else(|| find_path(lines, &[PRESETS_KEY, name]))
}

/// Index of the key line that owns `index`, if it is nested at all.
pub fn parent_of(lines: &[String], index: usize) -> Option<usize> {
    let indent = indent_of(lines.get(index)?);
    if indent == 0 {
        return None;
    }
    (0..index).rev().find(|&idx| {
        let line = &lines[idx];
        !is_blank_or_comment(line) && indent_of(line) < indent
    })
}

/// Direct children of a span, in document order.
pub fn child_keys(lines: &[String], span: &Span) -> Vec<(usize, String)> {
    let end = span.end.min(lines.len());
    let mut children = Vec::new();
    for idx in span.start + 1..end {
        let line = &lines[idx];
        if is_blank_or_comment(line) || indent_of(line) != span.child_indent() {
            continue;
        }
        if let Some(key) = key_token(line) {
            children.push((idx, key.to_string()));
        }
    }
    children
}

pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

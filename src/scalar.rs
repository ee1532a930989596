//! In-place scalar edits that keep trailing comments and quoting style.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::navigator::{INDENT_STEP, Span, find_child_key, span_at, split_key_line};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Interprets a raw command-line value the way a form control would
    /// hand it over: `true`/`false` are toggles, digits are numbers.
    pub fn parse_loose(raw: &str) -> Self {
        match raw {
            "true" => return ScalarValue::Bool(true),
            "false" => return ScalarValue::Bool(false),
            _ => {}
        }
        if let Ok(int) = raw.parse::<i64>() {
            return ScalarValue::Int(int);
        }
        let numeric = raw.chars().any(|ch| ch.is_ascii_digit())
            && raw
                .chars()
                .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'));
        if numeric {
            if let Ok(float) = raw.parse::<f64>() {
                return ScalarValue::Float(float);
            }
        }
        ScalarValue::Str(raw.to_string())
    }

    pub fn render(&self, was_quoted: bool) -> String {
        match self {
            ScalarValue::Bool(value) => value.to_string(),
            ScalarValue::Int(value) => value.to_string(),
            ScalarValue::Float(value) => format!("{value:?}"),
            ScalarValue::Str(value) => {
                if was_quoted || needs_quotes(value) {
                    quote(value)
                } else {
                    value.clone()
                }
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Str(value.to_string())
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int(value)
    }
}

pub fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.contains([':', '#', '"', '\'', ' '])
}

pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

pub fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return inner.replace("\\\"", "\"").replace("\\\\", "\\");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    value.to_string()
}

/// Value text after a key, split from its trailing comment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueText<'a> {
    pub value: &'a str,
    /// Trailing comment including the whitespace that precedes it.
    pub comment: &'a str,
    pub quoted: bool,
}

pub fn split_value(rest: &str) -> ValueText<'_> {
    if let Some(close) = closing_quote(rest) {
        let remainder = &rest[close + 1..];
        let trailing = remainder.trim();
        if trailing.is_empty() || trailing.starts_with('#') {
            return ValueText {
                value: &rest[..=close],
                comment: if trailing.is_empty() { "" } else { remainder },
                quoted: true,
            };
        }
    }

    let hash = rest.char_indices().find_map(|(pos, ch)| {
        let standalone = pos == 0 || rest[..pos].ends_with([' ', '\t']);
        (ch == '#' && standalone).then_some(pos)
    });
    match hash {
        Some(pos) => {
            let value = rest[..pos].trim_end();
            ValueText {
                value,
                comment: &rest[value.len()..],
                quoted: false,
            }
        }
        None => ValueText {
            value: rest.trim_end(),
            comment: "",
            quoted: false,
        },
    }
}

fn closing_quote(rest: &str) -> Option<usize> {
    let quote = rest.chars().next().filter(|ch| matches!(ch, '"' | '\''))?;
    let bytes = rest.as_bytes();
    let mut idx = 1;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if quote == '"' && byte == b'\\' {
            idx += 2;
            continue;
        }
        if byte == quote as u8 {
            if quote == '\'' && bytes.get(idx + 1) == Some(&b'\'') {
                idx += 2;
                continue;
            }
            return Some(idx);
        }
        idx += 1;
    }
    None
}

/// Current scalar on a key line, unquoted. `None` for non key lines.
pub fn read_value(line: &str) -> Option<String> {
    let parsed = split_key_line(line)?;
    Some(unquote(split_value(parsed.rest(line)).value))
}

fn assemble(prefix: &str, value: &str, comment: &str) -> String {
    let mut line = prefix.to_string();
    if !value.is_empty() && !line.ends_with([' ', '\t']) {
        line.push(' ');
    }
    line.push_str(value);
    if !comment.is_empty() && !comment.starts_with([' ', '\t']) {
        line.push(' ');
    }
    line.push_str(comment);
    line
}

/// Rewrites the value on `lines[index]`, keeping its key, trailing comment and
/// quoting habit. Returns `false` when the line is not a `key: value` line.
pub fn replace_value(lines: &mut [String], index: usize, value: &ScalarValue) -> bool {
    let Some(quoted) = lines
        .get(index)
        .and_then(|line| split_key_line(line).map(|parsed| split_value(parsed.rest(line)).quoted))
    else {
        return false;
    };
    replace_raw(lines, index, &value.render(quoted))
}

/// Swaps the value text on a key line for already formatted `raw` text.
pub fn replace_raw(lines: &mut [String], index: usize, raw: &str) -> bool {
    let Some(line) = lines.get(index) else {
        return false;
    };
    let Some(parsed) = split_key_line(line) else {
        return false;
    };
    let parts = split_value(parsed.rest(line));
    let updated = assemble(parsed.prefix(line), raw, parts.comment);
    lines[index] = updated;
    true
}

/// Turns `key: {}` into `key:` so children can be appended beneath it.
pub fn open_empty_map(lines: &mut [String], index: usize) -> bool {
    let Some(line) = lines.get(index) else {
        return false;
    };
    let Some(parsed) = split_key_line(line) else {
        return false;
    };
    let parts = split_value(parsed.rest(line));
    if parts.value != "{}" {
        return false;
    }
    let prefix = parsed.prefix(line).trim_end();
    lines[index] = assemble(prefix, "", parts.comment);
    true
}

/// True when the key line carries no inline value (or an empty `{}`).
pub fn holds_block(line: &str) -> bool {
    split_key_line(line)
        .map(|parsed| matches!(split_value(parsed.rest(line)).value, "" | "{}"))
        .unwrap_or(false)
}

pub fn field_line(indent: usize, key: &str, value: Option<&ScalarValue>) -> String {
    let pad = " ".repeat(indent);
    match value {
        Some(value) => format!("{pad}{key}: {}", value.render(false)),
        None => format!("{pad}{key}:"),
    }
}

/// Adds a missing field at the end of the span's content. `field_path` is one
/// key or a `parent.child` pair; an existing parent block is reused. Nothing
/// is nested under a key that already carries an inline value.
pub fn insert_field(
    lines: &mut Vec<String>,
    span_start: usize,
    span_end: usize,
    indent: usize,
    field_path: &[&str],
    value: &ScalarValue,
) -> bool {
    if span_start >= lines.len() || !holds_block(&lines[span_start]) {
        return false;
    }
    let child_indent = indent + INDENT_STEP;
    let span = Span {
        start: span_start,
        end: span_end.min(lines.len()),
        indent,
    };
    match field_path {
        [key] => {
            if find_child_key(lines, span.start, span.end, indent, key).is_some() {
                return false;
            }
            let at = span.content_end(lines);
            open_empty_map(lines, span.start);
            lines.insert(at, field_line(child_indent, key, Some(value)));
            true
        }
        [parent, child] => {
            match find_child_key(lines, span.start, span.end, indent, parent) {
                Some(parent_idx) => {
                    if !holds_block(&lines[parent_idx]) {
                        return false;
                    }
                    let parent_span = span_at(lines, parent_idx, span.end);
                    if find_child_key(lines, parent_idx, parent_span.end, child_indent, child)
                        .is_some()
                    {
                        return false;
                    }
                    let at = parent_span.content_end(lines);
                    open_empty_map(lines, parent_idx);
                    lines.insert(
                        at,
                        field_line(child_indent + INDENT_STEP, child, Some(value)),
                    );
                }
                None => {
                    let at = span.content_end(lines);
                    open_empty_map(lines, span.start);
                    lines.insert(at, field_line(child_indent, parent, None));
                    lines.insert(
                        at + 1,
                        field_line(child_indent + INDENT_STEP, child, Some(value)),
                    );
                }
            }
            true
        }
        _ => false,
    }
}

//! Whole-block operations built from navigator queries and line splices.

use serde::{Deserialize, Serialize};

use crate::error::{EditOutcome, NoOpReason};
use crate::navigator::{
    INDENT_STEP, Span, child_keys, find_child_key, find_path, find_section, find_top_level_key,
    indent_of, is_blank_or_comment, parent_of, span_at, split_key_line,
};
use crate::scalar::{
    ScalarValue, field_line, holds_block, insert_field, needs_quotes, open_empty_map, quote, read_value,
    replace_raw, replace_value, split_value, unquote,
};

pub const COPY_SUFFIX: &str = " (copy)";
const NAME_FIELD: &str = "name";

/// A single-segment path is resolved as a section name (top level or under
/// `presets`); longer paths are walked from the top level.
pub fn locate(lines: &[String], path: &[&str]) -> Option<Span> {
    match path {
        [name] => find_section(lines, name),
        _ => find_path(lines, path),
    }
}

fn describe(path: &[&str]) -> String {
    path.join(".")
}

/// How a missing field is treated by [`set_field`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    /// Only rewrite an existing field; a missing one is a no-op.
    Replace,
    /// Insert the field (and at most one missing parent) when absent.
    Upsert,
}

pub fn set_field(
    lines: &mut Vec<String>,
    section: &[&str],
    field: &[&str],
    value: &ScalarValue,
    mode: SetMode,
) -> EditOutcome {
    let Some(mut current) = locate(lines, section) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(section)));
    };
    for (depth, segment) in field.iter().enumerate() {
        match find_child_key(lines, current.start, current.end, current.indent, segment) {
            Some(idx) => current = span_at(lines, idx, current.end),
            None => {
                let missing = &field[depth..];
                if mode == SetMode::Replace || missing.len() > 2 {
                    return EditOutcome::NoOp(NoOpReason::FieldNotFound(describe(field)));
                }
                if !holds_block(&lines[current.start]) {
                    let owner = if depth == 0 { section } else { &field[..depth] };
                    return EditOutcome::NoOp(NoOpReason::Incompatible(format!(
                        "{} holds a value, not a block",
                        describe(owner)
                    )));
                }
                let inserted = insert_field(
                    lines,
                    current.start,
                    current.end,
                    current.indent,
                    missing,
                    value,
                );
                return if inserted {
                    EditOutcome::Applied
                } else {
                    EditOutcome::NoOp(NoOpReason::FieldNotFound(describe(field)))
                };
            }
        }
    }

    if field.is_empty() || current.content_end(lines) > current.start + 1 {
        return EditOutcome::NoOp(NoOpReason::NotAScalar(describe(field)));
    }
    let header = &lines[current.start];
    let is_flow = split_key_line(header)
        .map(|parsed| split_value(parsed.rest(header)).value.starts_with(['[', '{']))
        .unwrap_or(true);
    if is_flow {
        return EditOutcome::NoOp(NoOpReason::NotAScalar(describe(field)));
    }

    let before = lines[current.start].clone();
    replace_value(lines, current.start, value);
    if lines[current.start] == before {
        EditOutcome::NoOp(NoOpReason::Unchanged)
    } else {
        EditOutcome::Applied
    }
}

fn rename_key(line: &str, new_key: &str) -> Option<String> {
    let parsed = split_key_line(line)?;
    let key = if needs_quotes(new_key) {
        quote(new_key)
    } else {
        new_key.to_string()
    };
    Some(format!(
        "{}{}{}",
        &line[..parsed.key_range.start],
        key,
        &line[parsed.key_range.end..]
    ))
}

fn sibling_exists(lines: &[String], span: &Span, key: &str) -> bool {
    match parent_of(lines, span.start) {
        Some(parent) => {
            let parent_span = span_at(lines, parent, lines.len());
            find_child_key(lines, parent, parent_span.end, parent_span.indent, key).is_some()
        }
        None => find_top_level_key(lines, key).is_some(),
    }
}

/// Copies a block under a new key right after the original. A direct `name`
/// child gets a suffix so the two entries stay distinguishable.
pub fn duplicate_section(lines: &mut Vec<String>, path: &[&str], new_key: &str) -> EditOutcome {
    let Some(span) = locate(lines, path) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(path)));
    };
    if sibling_exists(lines, &span, new_key) {
        return EditOutcome::NoOp(NoOpReason::KeyExists(new_key.to_string()));
    }

    let end = span.content_end(lines);
    let mut copy: Vec<String> = lines[span.start..end].to_vec();
    let Some(renamed) = rename_key(&copy[0], new_key) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(path)));
    };
    copy[0] = renamed;

    if let Some(name_idx) = find_child_key(&copy, 0, copy.len(), span.indent, NAME_FIELD) {
        if let Some(current) = read_value(&copy[name_idx]) {
            let suffixed = ScalarValue::Str(format!("{current}{COPY_SUFFIX}"));
            replace_value(&mut copy, name_idx, &suffixed);
        }
    }

    lines.splice(end..end, copy);
    EditOutcome::Applied
}

/// References to remove when a keyed block is deleted: every child of
/// `container` may hold `list_field`, a list naming the deleted key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cascade {
    pub container: Vec<String>,
    pub list_field: String,
}

pub fn delete_section(
    lines: &mut Vec<String>,
    path: &[&str],
    cascade: Option<&Cascade>,
) -> EditOutcome {
    let Some(span) = locate(lines, path) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(path)));
    };
    let Some(key) = split_key_line(&lines[span.start]).map(|parsed| parsed.key.to_string()) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(path)));
    };
    let end = span.content_end(lines);
    lines.drain(span.start..end);

    if let Some(cascade) = cascade {
        remove_references(lines, cascade, &key);
    }
    EditOutcome::Applied
}

/// Removes `key` from `<container>.*.<list_field>`. Returns how many lists changed.
pub fn remove_references(lines: &mut Vec<String>, cascade: &Cascade, key: &str) -> usize {
    let container: Vec<&str> = cascade.container.iter().map(String::as_str).collect();
    let Some(container_span) = find_path(lines, &container) else {
        return 0;
    };
    let owners: Vec<String> = child_keys(lines, &container_span)
        .into_iter()
        .map(|(_, name)| name)
        .collect();

    let mut touched = 0;
    for owner in owners {
        let mut path = container.clone();
        path.push(&owner);
        path.push(&cascade.list_field);
        if list_remove(lines, &path, key).is_applied() {
            touched += 1;
        }
    }
    touched
}

/// A value for a synthesized field: a scalar, or an inline list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    /// `key` or `parent.child`.
    pub field: String,
    pub value: FieldValue,
}

impl TemplateField {
    pub fn new(field: &str, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

impl From<ScalarValue> for FieldValue {
    fn from(value: ScalarValue) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Scalar(value.into())
    }
}

fn render_field(indent: usize, key: &str, value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(scalar) => field_line(indent, key, Some(scalar)),
        FieldValue::List(items) => {
            let tokens: Vec<String> = items.iter().map(|item| item.render(false)).collect();
            format!(
                "{}{key}: {}",
                " ".repeat(indent),
                format_inline(&tokens, false, ", ")
            )
        }
    }
}

fn template_lines(indent: usize, key: &str, fields: &[TemplateField]) -> Vec<String> {
    if fields.is_empty() {
        return vec![format!("{}{key}: {{}}", " ".repeat(indent))];
    }
    let child = indent + INDENT_STEP;
    let mut out = vec![field_line(indent, key, None)];
    let mut open_parent: Option<&str> = None;
    for field in fields {
        match field.field.split_once('.') {
            Some((parent, leaf)) => {
                if open_parent != Some(parent) {
                    out.push(field_line(child, parent, None));
                    open_parent = Some(parent);
                }
                out.push(render_field(child + INDENT_STEP, leaf, &field.value));
            }
            None => {
                open_parent = None;
                out.push(render_field(child, &field.field, &field.value));
            }
        }
    }
    out
}

/// Appends `key:` with template fields at the end of the parent block.
pub fn insert_block(
    lines: &mut Vec<String>,
    parent: &[&str],
    key: &str,
    fields: &[TemplateField],
) -> EditOutcome {
    let Some(span) = locate(lines, parent) else {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(describe(parent)));
    };
    if find_child_key(lines, span.start, span.end, span.indent, key).is_some() {
        return EditOutcome::NoOp(NoOpReason::KeyExists(key.to_string()));
    }
    let header = &lines[span.start];
    let opens_block = split_key_line(header)
        .map(|parsed| matches!(split_value(parsed.rest(header)).value, "" | "{}"))
        .unwrap_or(false);
    if !opens_block {
        return EditOutcome::NoOp(NoOpReason::NotAScalar(describe(parent)));
    }

    let at = span.content_end(lines);
    open_empty_map(lines, span.start);
    let block = template_lines(span.child_indent(), key, fields);
    lines.splice(at..at, block);
    EditOutcome::Applied
}

/// A list field, in whichever shape the document author chose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListField {
    /// `key: [a, b]` on one line.
    Inline {
        line: usize,
        tokens: Vec<String>,
        padded: bool,
        separator: String,
    },
    /// `key:` followed by `- item` lines.
    Block {
        header: usize,
        item_indent: usize,
        items: Vec<BlockItem>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockItem {
    pub line: usize,
    pub token: String,
}

impl ListField {
    pub fn values(&self) -> Vec<String> {
        match self {
            ListField::Inline { tokens, .. } => tokens.iter().map(|t| unquote(t)).collect(),
            ListField::Block { items, .. } => items.iter().map(|i| unquote(&i.token)).collect(),
        }
    }

    fn tokens(&self) -> Vec<&str> {
        match self {
            ListField::Inline { tokens, .. } => tokens.iter().map(String::as_str).collect(),
            ListField::Block { items, .. } => items.iter().map(|i| i.token.as_str()).collect(),
        }
    }
}

fn format_inline(tokens: &[String], padded: bool, separator: &str) -> String {
    if tokens.is_empty() {
        return "[]".to_string();
    }
    let pad = if padded { " " } else { "" };
    format!("[{pad}{}{pad}]", tokens.join(separator))
}

pub fn detect_list(lines: &[String], span: &Span) -> Option<ListField> {
    let header = lines.get(span.start)?;
    let parsed = split_key_line(header)?;
    let value = split_value(parsed.rest(header)).value;

    if value.starts_with('[') && value.ends_with(']') {
        let inner = &value[1..value.len() - 1];
        let separator = if inner.contains(", ") || !inner.contains(',') {
            ", "
        } else {
            ","
        };
        let tokens = inner
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        return Some(ListField::Inline {
            line: span.start,
            tokens,
            padded: inner.starts_with(' ') && !inner.trim().is_empty(),
            separator: separator.to_string(),
        });
    }
    if !value.is_empty() {
        return None;
    }

    let mut items = Vec::new();
    let mut item_indent = None;
    for idx in span.start + 1..span.end.min(lines.len()) {
        let line = &lines[idx];
        if is_blank_or_comment(line) {
            continue;
        }
        let trimmed = line.trim_start();
        let Some(after_dash) = trimmed.strip_prefix('-') else {
            return None;
        };
        if !(after_dash.is_empty() || after_dash.starts_with(' ')) {
            return None;
        }
        item_indent.get_or_insert(indent_of(line));
        let token = split_value(after_dash.trim_start()).value.to_string();
        items.push(BlockItem { line: idx, token });
    }
    Some(ListField::Block {
        header: span.start,
        item_indent: item_indent.unwrap_or(span.child_indent()),
        items,
    })
}

fn locate_list(lines: &[String], path: &[&str]) -> Result<(Span, ListField), NoOpReason> {
    let span = locate(lines, path).ok_or_else(|| NoOpReason::FieldNotFound(describe(path)))?;
    let list = detect_list(lines, &span).ok_or_else(|| NoOpReason::NotAList(describe(path)))?;
    Ok((span, list))
}

fn render_item(existing: &[&str], item: &str) -> String {
    let all_quoted = !existing.is_empty() && existing.iter().all(|t| t.starts_with('"'));
    if all_quoted || needs_quotes(item) {
        quote(item)
    } else {
        item.to_string()
    }
}

pub fn list_add(lines: &mut Vec<String>, path: &[&str], item: &str) -> EditOutcome {
    let (span, list) = match locate_list(lines, path) {
        Ok(found) => found,
        Err(reason) => return EditOutcome::NoOp(reason),
    };
    if list.values().iter().any(|value| value == item) {
        return EditOutcome::NoOp(NoOpReason::ItemPresent(item.to_string()));
    }
    let token = render_item(&list.tokens(), item);
    match list {
        ListField::Inline {
            line,
            mut tokens,
            padded,
            separator,
        } => {
            tokens.push(token);
            replace_raw(lines, line, &format_inline(&tokens, padded, &separator));
        }
        ListField::Block {
            header,
            item_indent,
            items,
        } => {
            let at = items
                .last()
                .map(|last| last.line + 1)
                .unwrap_or_else(|| span.content_end(lines).max(header + 1));
            lines.insert(at, format!("{}- {token}", " ".repeat(item_indent)));
        }
    }
    EditOutcome::Applied
}

pub fn list_remove(lines: &mut Vec<String>, path: &[&str], item: &str) -> EditOutcome {
    let (_, list) = match locate_list(lines, path) {
        Ok(found) => found,
        Err(reason) => return EditOutcome::NoOp(reason),
    };
    if !list.values().iter().any(|value| value == item) {
        return EditOutcome::NoOp(NoOpReason::ItemAbsent(item.to_string()));
    }
    match list {
        ListField::Inline {
            line,
            tokens,
            padded,
            separator,
        } => {
            let kept: Vec<String> = tokens.into_iter().filter(|t| unquote(t) != item).collect();
            replace_raw(lines, line, &format_inline(&kept, padded, &separator));
        }
        ListField::Block { items, .. } => {
            for entry in items.iter().rev().filter(|entry| unquote(&entry.token) == item) {
                lines.remove(entry.line);
            }
        }
    }
    EditOutcome::Applied
}

/// Moves the item at `from` to position `to`. Block items keep their own
/// trailing comments; comment lines between items stay where they are.
pub fn list_move(lines: &mut Vec<String>, path: &[&str], from: usize, to: usize) -> EditOutcome {
    let (_, list) = match locate_list(lines, path) {
        Ok(found) => found,
        Err(reason) => return EditOutcome::NoOp(reason),
    };
    let len = list.tokens().len();
    for idx in [from, to] {
        if idx >= len {
            return EditOutcome::NoOp(NoOpReason::IndexOutOfRange(idx));
        }
    }
    if from == to {
        return EditOutcome::NoOp(NoOpReason::Unchanged);
    }
    match list {
        ListField::Inline {
            line,
            mut tokens,
            padded,
            separator,
        } => {
            let moved = tokens.remove(from);
            tokens.insert(to, moved);
            replace_raw(lines, line, &format_inline(&tokens, padded, &separator));
        }
        ListField::Block { items, .. } => {
            let slots: Vec<usize> = items.iter().map(|entry| entry.line).collect();
            let mut texts: Vec<String> = slots.iter().map(|&slot| lines[slot].clone()).collect();
            let moved = texts.remove(from);
            texts.insert(to, moved);
            for (slot, text) in slots.into_iter().zip(texts) {
                lines[slot] = text;
            }
        }
    }
    EditOutcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const TIMELINE: &str = "\
custom:
  default:
    collect: true
  periods:
    # morning window
    morning:
      name: \"Morning\"  # shown in the UI
      start: \"08:00\"
      end: \"09:00\"

    evening:
      start: \"20:00\"
      end: \"22:00\"
  day_plans:
    workday:
      periods: [morning, evening]
    weekend:
      periods:
        - morning  # lazy start
        - evening
  week_map:
    1: workday
";

    #[test]
    fn set_replaces_existing_field() {
        let mut doc = lines(TIMELINE);
        let outcome = set_field(
            &mut doc,
            &["custom", "periods", "evening"],
            &["end"],
            &"23:00".into(),
            SetMode::Replace,
        );
        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(doc[12], "      end: \"23:00\"");
    }

    #[test]
    fn replace_mode_leaves_missing_field_alone() {
        let mut doc = lines(TIMELINE);
        let before = doc.clone();
        let outcome = set_field(
            &mut doc,
            &["custom", "periods", "evening"],
            &["name"],
            &"Evening".into(),
            SetMode::Replace,
        );
        assert!(matches!(outcome, EditOutcome::NoOp(NoOpReason::FieldNotFound(_))));
        assert_eq!(doc, before);
    }

    #[test]
    fn upsert_inserts_missing_field() {
        let mut doc = lines(TIMELINE);
        let outcome = set_field(
            &mut doc,
            &["custom", "periods", "evening"],
            &["once", "push"],
            &true.into(),
            SetMode::Upsert,
        );
        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(doc[13], "      once:");
        assert_eq!(doc[14], "        push: true");
        assert_eq!(doc[15], "  day_plans:");
    }

    #[test]
    fn upsert_never_nests_under_a_scalar() {
        let mut doc = lines("app:\n  port: 8080\n");
        let before = doc.clone();
        let outcome = set_field(
            &mut doc,
            &["app"],
            &["port", "extra"],
            &ScalarValue::Int(1),
            SetMode::Upsert,
        );
        assert_eq!(
            outcome,
            EditOutcome::NoOp(NoOpReason::Incompatible("port holds a value, not a block".into()))
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn set_refuses_blocks() {
        let mut doc = lines(TIMELINE);
        let outcome = set_field(&mut doc, &["custom"], &["periods"], &ScalarValue::Int(1), SetMode::Replace);
        assert!(matches!(outcome, EditOutcome::NoOp(NoOpReason::NotAScalar(_))));
    }

    #[test]
    fn duplicate_renames_and_suffixes_name() {
        let mut doc = lines(TIMELINE);
        let outcome = duplicate_section(&mut doc, &["custom", "periods", "morning"], "morning_2");
        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(doc[9], "    morning_2:");
        assert_eq!(doc[10], "      name: \"Morning (copy)\"  # shown in the UI");
        assert_eq!(doc[13], "");
        assert_eq!(doc[14], "    evening:");
    }

    #[test]
    fn duplicate_refuses_existing_key() {
        let mut doc = lines(TIMELINE);
        let before = doc.clone();
        let outcome = duplicate_section(&mut doc, &["custom", "periods", "morning"], "evening");
        assert_eq!(outcome, EditOutcome::NoOp(NoOpReason::KeyExists("evening".into())));
        assert_eq!(doc, before);
    }

    #[test]
    fn delete_cascades_into_both_list_shapes() {
        let mut doc = lines(TIMELINE);
        let cascade = Cascade {
            container: vec!["custom".into(), "day_plans".into()],
            list_field: "periods".into(),
        };
        let outcome = delete_section(&mut doc, &["custom", "periods", "morning"], Some(&cascade));
        assert_eq!(outcome, EditOutcome::Applied);
        let text = doc.join("\n");
        assert!(!text.contains("morning:"));
        assert!(text.contains("      periods: [evening]"));
        assert!(!text.contains("- morning"));
        assert!(text.contains("        - evening"));
        // The comment above the deleted block stays with the document.
        assert!(text.contains("    # morning window"));
    }

    #[test]
    fn delete_missing_section_is_noop() {
        let mut doc = lines(TIMELINE);
        let before = doc.clone();
        let outcome = delete_section(&mut doc, &["custom", "periods", "noon"], None);
        assert!(!outcome.is_applied());
        assert_eq!(doc, before);
    }

    #[test]
    fn inline_list_keeps_style() {
        let mut doc = lines("plan:\n  periods: [ \"a\",\"b\" ]  # keep");
        assert!(list_add(&mut doc, &["plan", "periods"], "c").is_applied());
        assert_eq!(doc[1], "  periods: [ \"a\",\"b\",\"c\" ]  # keep");
        assert!(list_remove(&mut doc, &["plan", "periods"], "a").is_applied());
        assert_eq!(doc[1], "  periods: [ \"b\",\"c\" ]  # keep");
        assert!(list_move(&mut doc, &["plan", "periods"], 1, 0).is_applied());
        assert_eq!(doc[1], "  periods: [ \"c\",\"b\" ]  # keep");
    }

    #[test]
    fn block_list_add_move_remove() {
        let mut doc = lines(TIMELINE);
        let path = ["custom", "day_plans", "weekend", "periods"];
        assert!(list_add(&mut doc, &path, "noon").is_applied());
        assert_eq!(doc[20], "        - noon");
        assert!(list_move(&mut doc, &path, 0, 2).is_applied());
        assert_eq!(doc[18], "        - evening");
        assert_eq!(doc[19], "        - noon");
        assert_eq!(doc[20], "        - morning  # lazy start");
        assert_eq!(
            list_add(&mut doc, &path, "noon"),
            EditOutcome::NoOp(NoOpReason::ItemPresent("noon".into()))
        );
    }

    #[test]
    fn empty_lists_grow() {
        let mut doc = lines("plan:\n  periods: []\nother:\n  periods:\nend: 1");
        assert!(list_add(&mut doc, &["plan", "periods"], "a").is_applied());
        assert_eq!(doc[1], "  periods: [a]");
        assert!(list_add(&mut doc, &["other", "periods"], "b").is_applied());
        assert_eq!(doc[4], "    - b");
        assert_eq!(doc[5], "end: 1");
    }

    #[test]
    fn insert_block_from_template() {
        let mut doc = lines("custom:\n  periods: {}\n  week_map:\n    1: daily");
        let fields = vec![
            TemplateField::new("name", "Noon"),
            TemplateField::new("start", "12:00"),
            TemplateField::new("once.push", true),
        ];
        let outcome = insert_block(&mut doc, &["custom", "periods"], "noon", &fields);
        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(
            doc,
            lines(
                "custom:\n  periods:\n    noon:\n      name: Noon\n      start: \"12:00\"\n      once:\n        push: true\n  week_map:\n    1: daily"
            )
        );
    }
}

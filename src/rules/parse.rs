use std::mem;
use std::sync::LazyLock;

use regex::Regex;

use super::{
    AliasItem, FrequencyGroup, GLOBAL_MARKER, GROUPS_MARKER, GroupBody, RelatedRun, RuleDocument,
};
use crate::lines::LineSequence;

static ALIAS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<keyword>.+?)\s*=>\s*(?P<alias>.+)$").expect("alias pattern compiles")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    None,
    Global,
    Groups,
}

enum LineKind<'a> {
    GlobalMarker,
    GroupsMarker,
    Blank,
    Comment,
    Label(&'a str),
    Alias(AliasItem),
    Keyword(&'a str),
}

fn classify(trimmed: &str) -> LineKind<'_> {
    if trimmed == GLOBAL_MARKER {
        return LineKind::GlobalMarker;
    }
    if trimmed == GROUPS_MARKER {
        return LineKind::GroupsMarker;
    }
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('#') {
        return LineKind::Comment;
    }
    if trimmed.len() > 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        return LineKind::Label(&trimmed[1..trimmed.len() - 1]);
    }
    if let Some(caps) = ALIAS_LINE.captures(trimmed) {
        return LineKind::Alias(AliasItem::new(&caps["keyword"], &caps["alias"]));
    }
    LineKind::Keyword(trimmed)
}

/// True when `keyword` reads back as a bare keyword line.
pub(super) fn reads_as_keyword(keyword: &str) -> bool {
    matches!(classify(keyword), LineKind::Keyword(read) if read == keyword)
}

pub(super) fn reads_as_label(label: &str) -> bool {
    let line = format!("[{label}]");
    matches!(classify(&line), LineKind::Label(read) if read == label)
}

pub(super) fn reads_as_alias(item: &AliasItem) -> bool {
    matches!(classify(&item.to_line()), LineKind::Alias(read) if read == *item)
}

/// Filter lines are kept verbatim unless they look like a marker, a comment
/// or a blank.
pub(super) fn reads_as_filter(filter: &str) -> bool {
    filter.trim() == filter
        && matches!(
            classify(filter),
            LineKind::Keyword(_) | LineKind::Label(_) | LineKind::Alias(_)
        )
}

struct ParserState {
    section: Section,
    current: Option<FrequencyGroup>,
    related_buffer: Vec<FrequencyGroup>,
    pending_comments: Vec<String>,
    last_line_was_alias: bool,
    groups: Vec<FrequencyGroup>,
    global_filters: Vec<String>,
}

impl ParserState {
    fn new(section: Section) -> Self {
        Self {
            section,
            current: None,
            related_buffer: Vec::new(),
            pending_comments: Vec::new(),
            last_line_was_alias: false,
            groups: Vec::new(),
            global_filters: Vec::new(),
        }
    }

    fn close_current(&mut self) {
        if let Some(group) = self.current.take() {
            self.related_buffer.push(group);
        }
    }

    fn flush(&mut self) {
        let count = self.related_buffer.len();
        for (index, mut group) in self.related_buffer.drain(..).enumerate() {
            group.related = (count >= 2).then_some(RelatedRun { index, count });
            self.groups.push(group);
        }
    }

    fn start(&mut self, body: GroupBody) {
        self.close_current();
        self.current = Some(FrequencyGroup {
            body,
            preceding_comments: mem::take(&mut self.pending_comments),
            related: None,
        });
    }

    fn step(mut self, line: &str) -> Self {
        let kind = classify(line.trim());
        match kind {
            LineKind::GlobalMarker | LineKind::GroupsMarker => {
                self.close_current();
                self.flush();
                self.last_line_was_alias = false;
                self.section = if matches!(kind, LineKind::GlobalMarker) {
                    Section::Global
                } else {
                    Section::Groups
                };
            }
            _ => match self.section {
                Section::None => {}
                Section::Global => {
                    if let LineKind::Keyword(_) | LineKind::Label(_) | LineKind::Alias(_) = kind {
                        self.global_filters.push(line.trim().to_string());
                    }
                }
                Section::Groups => self.step_groups(line, kind),
            },
        }
        self
    }

    fn step_groups(&mut self, line: &str, kind: LineKind<'_>) {
        match kind {
            LineKind::Comment => self.pending_comments.push(line.to_string()),
            LineKind::Blank => {
                self.close_current();
                self.flush();
                self.last_line_was_alias = false;
                self.pending_comments.push(line.to_string());
            }
            LineKind::Label(label) => {
                self.start(GroupBody::GroupName {
                    label: label.to_string(),
                    keywords: Vec::new(),
                });
                self.last_line_was_alias = false;
            }
            LineKind::Alias(item) => {
                let continued = self.last_line_was_alias && self.extend_alias_run(&item);
                if !continued {
                    self.start(GroupBody::Alias { item });
                }
                self.last_line_was_alias = true;
            }
            LineKind::Keyword(keyword) => {
                let appended = match self.current.as_mut().map(|group| &mut group.body) {
                    Some(GroupBody::GroupName { keywords, .. } | GroupBody::Plain { keywords }) => {
                        keywords.push(keyword.to_string());
                        true
                    }
                    _ => false,
                };
                if !appended {
                    self.start(GroupBody::Plain {
                        keywords: vec![keyword.to_string()],
                    });
                }
                self.last_line_was_alias = false;
            }
            LineKind::GlobalMarker | LineKind::GroupsMarker => {}
        }
    }

    /// Appends to an open alias run, upgrading a lone alias to a group.
    fn extend_alias_run(&mut self, item: &AliasItem) -> bool {
        let Some(group) = self.current.as_mut() else {
            return false;
        };
        match &mut group.body {
            GroupBody::AliasGroup { items } => {
                items.push(item.clone());
                true
            }
            GroupBody::Alias { item: first } => {
                let first = first.clone();
                group.body = GroupBody::AliasGroup {
                    items: vec![first, item.clone()],
                };
                true
            }
            _ => false,
        }
    }

    fn finish(mut self) -> RuleDocument {
        self.close_current();
        self.flush();
        RuleDocument {
            global_filters: self.global_filters,
            groups: self.groups,
            trailing_comments: self.pending_comments,
        }
    }
}

/// Reads rule text into typed groups. A document without either section
/// marker is read as word groups throughout.
pub fn parse(text: &str) -> RuleDocument {
    let sequence = LineSequence::parse(text);
    let lines = sequence.lines();
    let has_markers = lines.iter().any(|line| {
        let trimmed = line.trim();
        trimmed == GLOBAL_MARKER || trimmed == GROUPS_MARKER
    });
    let initial = ParserState::new(if has_markers {
        Section::None
    } else {
        Section::Groups
    });
    lines
        .iter()
        .fold(initial, |state, line| state.step(line))
        .finish()
}

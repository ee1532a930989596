//! The keyword rule document: a global filter list followed by word groups.
//!
//! ```text
//! [GLOBAL_FILTER]
//! spam
//!
//! [WORD_GROUPS]
//! # comments stay with the group below them
//! [Display Label]
//! keyword
//!
//! /regex/ => Alias
//! ```

mod build;
mod edit;
mod parse;

use serde::{Deserialize, Serialize};

pub use build::build;
pub use edit::{GroupKind, RuleEdit, apply_edit};
pub use parse::parse;

pub const GLOBAL_MARKER: &str = "[GLOBAL_FILTER]";
pub const GROUPS_MARKER: &str = "[WORD_GROUPS]";
pub const ALIAS_SEPARATOR: &str = "=>";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasItem {
    pub keyword: String,
    pub alias: String,
}

impl AliasItem {
    pub fn new(keyword: &str, alias: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            alias: alias.to_string(),
        }
    }

    pub fn to_line(&self) -> String {
        format!("{} {ALIAS_SEPARATOR} {}", self.keyword, self.alias)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupBody {
    /// `[label]` followed by keyword lines.
    GroupName { label: String, keywords: Vec<String> },
    /// A lone `keyword => alias` line.
    Alias { item: AliasItem },
    /// Consecutive `keyword => alias` lines.
    AliasGroup { items: Vec<AliasItem> },
    /// Bare keyword lines.
    Plain { keywords: Vec<String> },
}

impl GroupBody {
    pub fn kind(&self) -> GroupKind {
        match self {
            GroupBody::GroupName { .. } => GroupKind::GroupName,
            GroupBody::Alias { .. } => GroupKind::Alias,
            GroupBody::AliasGroup { .. } => GroupKind::AliasGroup,
            GroupBody::Plain { .. } => GroupKind::Plain,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GroupBody::GroupName { keywords, .. } | GroupBody::Plain { keywords } => {
                keywords.is_empty()
            }
            GroupBody::Alias { .. } => false,
            GroupBody::AliasGroup { items } => items.is_empty(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            GroupBody::GroupName { label, keywords } => std::iter::once(format!("[{label}]"))
                .chain(keywords.iter().cloned())
                .collect(),
            GroupBody::Alias { item } => vec![item.to_line()],
            GroupBody::AliasGroup { items } => items.iter().map(AliasItem::to_line).collect(),
            GroupBody::Plain { keywords } => keywords.clone(),
        }
    }
}

/// Position of a group inside a run of groups written without a blank line
/// between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RelatedRun {
    pub index: usize,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrequencyGroup {
    #[serde(flatten)]
    pub body: GroupBody,
    /// Comment and blank lines directly above the group, verbatim.
    pub preceding_comments: Vec<String>,
    pub related: Option<RelatedRun>,
}

impl FrequencyGroup {
    pub fn new(body: GroupBody) -> Self {
        Self {
            body,
            preceding_comments: Vec::new(),
            related: None,
        }
    }

    pub fn is_related(&self) -> bool {
        self.related.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RuleDocument {
    pub global_filters: Vec<String>,
    pub groups: Vec<FrequencyGroup>,
    /// Comment and blank lines after the last group.
    pub trailing_comments: Vec<String>,
}

impl RuleDocument {
    /// Same filters and the same group bodies in the same order. Comments and
    /// run markers are not compared.
    pub fn same_content(&self, other: &RuleDocument) -> bool {
        self.global_filters == other.global_filters
            && self.groups.len() == other.groups.len()
            && self
                .groups
                .iter()
                .zip(&other.groups)
                .all(|(left, right)| left.body == right.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Keyword rules for the daily digest
[GLOBAL_FILTER]
# dropped everywhere
spam
ads

# --- groups below ---
[WORD_GROUPS]
# comment A
foo
bar

/x|y/ => Z
/a/ => A

[Chips]
nvidia
amd
[Phones]
apple
# trailing note
";

    #[test]
    fn rebuild_is_byte_identical_for_canonical_text() {
        let doc = parse(SAMPLE);
        assert_eq!(build(&doc, Some(SAMPLE)), SAMPLE);
    }

    #[test]
    fn round_trip_preserves_structure() {
        let doc = parse(SAMPLE);
        let rebuilt = build(&doc, Some(SAMPLE));
        assert_eq!(parse(&rebuilt), doc);
    }

    #[test]
    fn removing_last_keywords_drops_group_and_its_comment() {
        let text = "[GLOBAL_FILTER]\nspam\n\n[WORD_GROUPS]\n# comment A\nfoo\nbar\n\n/x|y/ => Z\n";
        let mut doc = parse(text);
        assert!(
            apply_edit(
                &mut doc,
                &RuleEdit::RemoveKeyword {
                    group: 0,
                    keyword: "foo".into()
                }
            )
            .is_applied()
        );
        assert!(
            apply_edit(
                &mut doc,
                &RuleEdit::RemoveKeyword {
                    group: 0,
                    keyword: "bar".into()
                }
            )
            .is_applied()
        );
        assert_eq!(doc.groups.len(), 1);
        let rebuilt = build(&doc, Some(text));
        assert!(!rebuilt.contains("# comment A"));
        assert!(rebuilt.contains("\n/x|y/ => Z\n"));
        assert!(rebuilt.starts_with("[GLOBAL_FILTER]\nspam\n\n[WORD_GROUPS]\n"));
    }
}

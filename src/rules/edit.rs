use std::mem;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::parse::{reads_as_alias, reads_as_filter, reads_as_keyword, reads_as_label};
use super::{AliasItem, FrequencyGroup, GroupBody, RelatedRun, RuleDocument};
use crate::error::{EditOutcome, NoOpReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    GroupName,
    Alias,
    AliasGroup,
    Plain,
}

impl GroupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupKind::GroupName => "group_name",
            GroupKind::Alias => "alias",
            GroupKind::AliasGroup => "alias_group",
            GroupKind::Plain => "plain",
        }
    }
}

/// A structural change to a rule document, addressed by group position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleEdit {
    AddKeyword {
        group: usize,
        keyword: String,
    },
    /// Removes a keyword or an alias item keyed by it. A group left empty is
    /// deleted with its preceding comments.
    RemoveKeyword {
        group: usize,
        keyword: String,
    },
    RenameKeyword {
        group: usize,
        from: String,
        to: String,
    },
    /// An empty label turns a labelled group into a plain one; a label on a
    /// plain group names it.
    SetLabel {
        group: usize,
        label: String,
    },
    AddAlias {
        group: usize,
        keyword: String,
        alias: String,
    },
    SetAlias {
        group: usize,
        keyword: String,
        alias: String,
    },
    /// A new group, optionally seeded with content. Plain and alias groups
    /// without content exist only in memory; nothing is written for them.
    AddGroup {
        kind: GroupKind,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        aliases: Vec<AliasItem>,
        #[serde(default)]
        at: Option<usize>,
    },
    DeleteGroup {
        group: usize,
    },
    MoveGroup {
        from: usize,
        to: usize,
    },
    MergeGroups {
        into: usize,
        from: usize,
    },
    SplitGroup {
        group: usize,
        at: usize,
    },
    AddFilter {
        filter: String,
    },
    RemoveFilter {
        filter: String,
    },
}

impl RuleEdit {
    pub fn name(&self) -> &'static str {
        match self {
            RuleEdit::AddKeyword { .. } => "add_keyword",
            RuleEdit::RemoveKeyword { .. } => "remove_keyword",
            RuleEdit::RenameKeyword { .. } => "rename_keyword",
            RuleEdit::SetLabel { .. } => "set_label",
            RuleEdit::AddAlias { .. } => "add_alias",
            RuleEdit::SetAlias { .. } => "set_alias",
            RuleEdit::AddGroup { .. } => "add_group",
            RuleEdit::DeleteGroup { .. } => "delete_group",
            RuleEdit::MoveGroup { .. } => "move_group",
            RuleEdit::MergeGroups { .. } => "merge_groups",
            RuleEdit::SplitGroup { .. } => "split_group",
            RuleEdit::AddFilter { .. } => "add_filter",
            RuleEdit::RemoveFilter { .. } => "remove_filter",
        }
    }
}

/// A group with the related run it belonged to before the edit.
struct Tagged {
    group: FrequencyGroup,
    run: Option<usize>,
}

impl Tagged {
    fn detached(group: FrequencyGroup) -> Self {
        Self { group, run: None }
    }
}

fn detach(groups: Vec<FrequencyGroup>) -> Vec<Tagged> {
    let mut run = 0;
    let mut previous_related = false;
    groups
        .into_iter()
        .map(|group| {
            let tag = group.related.map(|position| {
                if position.index == 0 || !previous_related {
                    run += 1;
                }
                run
            });
            previous_related = tag.is_some();
            Tagged { group, run: tag }
        })
        .collect()
}

/// Two neighbours that would be read back as a single group when written
/// without a blank line between them.
fn fuses(previous: &GroupBody, next: &GroupBody) -> bool {
    match next {
        GroupBody::Plain { .. } => matches!(
            previous,
            GroupBody::GroupName { .. } | GroupBody::Plain { .. }
        ),
        GroupBody::Alias { .. } | GroupBody::AliasGroup { .. } => matches!(
            previous,
            GroupBody::Alias { .. } | GroupBody::AliasGroup { .. }
        ),
        GroupBody::GroupName { .. } => false,
    }
}

fn attach(tagged: Vec<Tagged>) -> Vec<FrequencyGroup> {
    let mut runs: Vec<Vec<FrequencyGroup>> = Vec::new();
    let mut last_run = None;
    for Tagged { group, run } in tagged {
        let joins = run.is_some()
            && run == last_run
            && runs
                .last()
                .and_then(|chunk| chunk.last())
                .is_some_and(|previous| !fuses(&previous.body, &group.body));
        if joins {
            if let Some(chunk) = runs.last_mut() {
                chunk.push(group);
            }
        } else {
            runs.push(vec![group]);
        }
        last_run = run;
    }
    runs.into_iter()
        .flat_map(|chunk| {
            let count = chunk.len();
            chunk.into_iter().enumerate().map(move |(index, mut group)| {
                group.related = (count >= 2).then_some(RelatedRun { index, count });
                group
            })
        })
        .collect()
}

/// A lone item in an alias group is written as a plain alias.
fn normalize(group: &mut FrequencyGroup) {
    if let GroupBody::AliasGroup { items } = &group.body {
        if let [item] = items.as_slice() {
            group.body = GroupBody::Alias { item: item.clone() };
        }
    }
}

fn keywords_mut(body: &mut GroupBody) -> Option<&mut Vec<String>> {
    match body {
        GroupBody::GroupName { keywords, .. } | GroupBody::Plain { keywords } => Some(keywords),
        _ => None,
    }
}

/// Alias items of the group, upgrading a lone alias to a group.
fn alias_items_mut(body: &mut GroupBody) -> Option<&mut Vec<AliasItem>> {
    if let GroupBody::Alias { item } = body {
        let item = item.clone();
        *body = GroupBody::AliasGroup { items: vec![item] };
    }
    match body {
        GroupBody::AliasGroup { items } => Some(items),
        _ => None,
    }
}

fn incompatible(detail: &str) -> EditOutcome {
    EditOutcome::NoOp(NoOpReason::Incompatible(detail.to_string()))
}

fn noop(reason: NoOpReason) -> EditOutcome {
    EditOutcome::NoOp(reason)
}

fn unreadable(kind: &str, text: &str) -> EditOutcome {
    EditOutcome::NoOp(NoOpReason::Incompatible(format!(
        "{text:?} would not read back as a {kind}"
    )))
}

/// Applies one edit. The document is untouched when the outcome is a no-op.
pub fn apply_edit(doc: &mut RuleDocument, edit: &RuleEdit) -> EditOutcome {
    let original = doc.groups.clone();
    let mut groups = detach(mem::take(&mut doc.groups));
    let outcome = dispatch(&mut groups, &mut doc.global_filters, edit)
        .unwrap_or_else(EditOutcome::NoOp);
    if outcome.is_applied() {
        for tagged in &mut groups {
            normalize(&mut tagged.group);
        }
        doc.groups = attach(groups);
    } else {
        doc.groups = original;
    }
    outcome
}

fn add_filter(filters: &mut Vec<String>, filter: &str) -> EditOutcome {
    let filter = filter.trim();
    if filter.is_empty() {
        return incompatible("an empty filter cannot be added");
    }
    if !reads_as_filter(filter) {
        return unreadable("filter", filter);
    }
    if filters.iter().any(|existing| existing == filter) {
        return noop(NoOpReason::ItemPresent(filter.to_string()));
    }
    filters.push(filter.to_string());
    EditOutcome::Applied
}

fn remove_filter(filters: &mut Vec<String>, filter: &str) -> EditOutcome {
    let before = filters.len();
    filters.retain(|existing| existing != filter.trim());
    if filters.len() == before {
        return noop(NoOpReason::ItemAbsent(filter.to_string()));
    }
    EditOutcome::Applied
}

fn existing(index: usize, groups: &[Tagged]) -> Result<usize, NoOpReason> {
    if index < groups.len() {
        Ok(index)
    } else {
        Err(NoOpReason::GroupNotFound(index))
    }
}

fn dispatch(
    groups: &mut Vec<Tagged>,
    filters: &mut Vec<String>,
    edit: &RuleEdit,
) -> Result<EditOutcome, NoOpReason> {
    let outcome = match edit {
        RuleEdit::AddKeyword { group, keyword } => {
            let index = existing(*group, groups)?;
            add_keyword(&mut groups[index].group.body, keyword)
        }
        RuleEdit::RemoveKeyword { group, keyword } => {
            let index = existing(*group, groups)?;
            let outcome = remove_keyword(&mut groups[index].group.body, keyword);
            if outcome.is_applied() && groups[index].group.body.is_empty() {
                groups.remove(index);
            }
            outcome
        }
        RuleEdit::RenameKeyword { group, from, to } => {
            let index = existing(*group, groups)?;
            rename_keyword(&mut groups[index].group.body, from, to)
        }
        RuleEdit::SetLabel { group, label } => {
            let index = existing(*group, groups)?;
            set_label(&mut groups[index], label)
        }
        RuleEdit::AddAlias {
            group,
            keyword,
            alias,
        } => {
            let index = existing(*group, groups)?;
            add_alias(&mut groups[index].group.body, keyword, alias)
        }
        RuleEdit::SetAlias {
            group,
            keyword,
            alias,
        } => {
            let index = existing(*group, groups)?;
            set_alias(&mut groups[index].group.body, keyword, alias)
        }
        RuleEdit::AddGroup {
            kind,
            label,
            keywords,
            aliases,
            at,
        } => add_group(groups, *kind, label.as_deref(), keywords, aliases, *at),
        RuleEdit::DeleteGroup { group } => {
            let index = existing(*group, groups)?;
            groups.remove(index);
            EditOutcome::Applied
        }
        RuleEdit::MoveGroup { from, to } => {
            let from = existing(*from, groups)?;
            if *to >= groups.len() {
                return Err(NoOpReason::IndexOutOfRange(*to));
            }
            if from == *to {
                return Err(NoOpReason::Unchanged);
            }
            let mut moved = groups.remove(from);
            moved.run = None;
            groups.insert(*to, moved);
            EditOutcome::Applied
        }
        RuleEdit::MergeGroups { into, from } => {
            let into = existing(*into, groups)?;
            let from = existing(*from, groups)?;
            merge_groups(groups, into, from)
        }
        RuleEdit::SplitGroup { group, at } => {
            let index = existing(*group, groups)?;
            split_group(groups, index, *at)
        }
        RuleEdit::AddFilter { filter } => add_filter(filters, filter),
        RuleEdit::RemoveFilter { filter } => remove_filter(filters, filter),
    };
    Ok(outcome)
}

fn add_keyword(body: &mut GroupBody, keyword: &str) -> EditOutcome {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return incompatible("an empty keyword cannot be added");
    }
    if !reads_as_keyword(keyword) {
        return unreadable("keyword", keyword);
    }
    let Some(keywords) = keywords_mut(body) else {
        return incompatible("alias groups take keyword => alias items");
    };
    if keywords.iter().any(|existing| existing == keyword) {
        return noop(NoOpReason::ItemPresent(keyword.to_string()));
    }
    keywords.push(keyword.to_string());
    EditOutcome::Applied
}

fn remove_keyword(body: &mut GroupBody, keyword: &str) -> EditOutcome {
    let removed = if let Some(keywords) = keywords_mut(body) {
        let before = keywords.len();
        keywords.retain(|existing| existing != keyword);
        keywords.len() != before
    } else if let Some(items) = alias_items_mut(body) {
        let before = items.len();
        items.retain(|item| item.keyword != keyword);
        items.len() != before
    } else {
        false
    };
    if removed {
        EditOutcome::Applied
    } else {
        noop(NoOpReason::ItemAbsent(keyword.to_string()))
    }
}

fn rename_keyword(body: &mut GroupBody, from: &str, to: &str) -> EditOutcome {
    let to = to.trim();
    if to.is_empty() {
        return incompatible("an empty keyword cannot be added");
    }
    if from == to {
        return noop(NoOpReason::Unchanged);
    }
    if let Some(keywords) = keywords_mut(body) {
        if !reads_as_keyword(to) {
            return unreadable("keyword", to);
        }
        if keywords.iter().any(|existing| existing == to) {
            return noop(NoOpReason::ItemPresent(to.to_string()));
        }
        return match keywords.iter_mut().find(|existing| existing.as_str() == from) {
            Some(slot) => {
                *slot = to.to_string();
                EditOutcome::Applied
            }
            None => noop(NoOpReason::ItemAbsent(from.to_string())),
        };
    }
    let Some(items) = alias_items_mut(body) else {
        return noop(NoOpReason::ItemAbsent(from.to_string()));
    };
    if items.iter().any(|item| item.keyword == to) {
        return noop(NoOpReason::ItemPresent(to.to_string()));
    }
    match items.iter_mut().find(|item| item.keyword == from) {
        Some(item) => {
            let renamed = AliasItem::new(to, &item.alias);
            if !reads_as_alias(&renamed) {
                return unreadable("keyword => alias line", &renamed.to_line());
            }
            *item = renamed;
            EditOutcome::Applied
        }
        None => noop(NoOpReason::ItemAbsent(from.to_string())),
    }
}

fn set_label(tagged: &mut Tagged, label: &str) -> EditOutcome {
    let label = label.trim();
    if !label.is_empty() && !reads_as_label(label) {
        return unreadable("label", label);
    }
    let body = &mut tagged.group.body;
    match body {
        GroupBody::GroupName { label: current, .. } if current.as_str() == label => {
            noop(NoOpReason::Unchanged)
        }
        GroupBody::GroupName { keywords, .. } if label.is_empty() => {
            *body = GroupBody::Plain {
                keywords: mem::take(keywords),
            };
            // A plain group would be read into a labelled neighbour above it.
            tagged.run = None;
            EditOutcome::Applied
        }
        GroupBody::GroupName { label: current, .. } => {
            *current = label.to_string();
            EditOutcome::Applied
        }
        GroupBody::Plain { .. } if label.is_empty() => noop(NoOpReason::Unchanged),
        GroupBody::Plain { keywords } => {
            *body = GroupBody::GroupName {
                label: label.to_string(),
                keywords: mem::take(keywords),
            };
            EditOutcome::Applied
        }
        GroupBody::Alias { .. } | GroupBody::AliasGroup { .. } => {
            incompatible("alias groups have no label")
        }
    }
}

fn add_alias(body: &mut GroupBody, keyword: &str, alias: &str) -> EditOutcome {
    let (keyword, alias) = (keyword.trim(), alias.trim());
    if keyword.is_empty() || alias.is_empty() {
        return incompatible("an alias needs both a keyword and a target");
    }
    let item = AliasItem::new(keyword, alias);
    if !reads_as_alias(&item) {
        return unreadable("keyword => alias line", &item.to_line());
    }
    let Some(items) = alias_items_mut(body) else {
        return incompatible("keyword groups take bare keywords");
    };
    if items.iter().any(|existing| existing.keyword == keyword) {
        return noop(NoOpReason::ItemPresent(keyword.to_string()));
    }
    items.push(item);
    EditOutcome::Applied
}

fn set_alias(body: &mut GroupBody, keyword: &str, alias: &str) -> EditOutcome {
    let alias = alias.trim();
    if alias.is_empty() {
        return incompatible("an alias needs a target");
    }
    let Some(items) = alias_items_mut(body) else {
        return incompatible("keyword groups take bare keywords");
    };
    match items.iter_mut().find(|item| item.keyword == keyword) {
        Some(item) if item.alias == alias => noop(NoOpReason::Unchanged),
        Some(item) => {
            let updated = AliasItem::new(&item.keyword, alias);
            if !reads_as_alias(&updated) {
                return unreadable("keyword => alias line", &updated.to_line());
            }
            *item = updated;
            EditOutcome::Applied
        }
        None => noop(NoOpReason::ItemAbsent(keyword.to_string())),
    }
}

fn seeded_keywords(keywords: &[String]) -> Result<Vec<String>, EditOutcome> {
    let mut seeded: Vec<String> = Vec::new();
    for keyword in keywords.iter().map(|keyword| keyword.trim()) {
        if keyword.is_empty() || seeded.iter().any(|existing| existing == keyword) {
            continue;
        }
        if !reads_as_keyword(keyword) {
            return Err(unreadable("keyword", keyword));
        }
        seeded.push(keyword.to_string());
    }
    Ok(seeded)
}

fn seeded_aliases(aliases: &[AliasItem]) -> Result<Vec<AliasItem>, EditOutcome> {
    let mut seeded: Vec<AliasItem> = Vec::new();
    for alias in aliases {
        let item = AliasItem::new(alias.keyword.trim(), alias.alias.trim());
        if seeded.iter().any(|existing| existing.keyword == item.keyword) {
            continue;
        }
        if !reads_as_alias(&item) {
            return Err(unreadable("keyword => alias line", &item.to_line()));
        }
        seeded.push(item);
    }
    Ok(seeded)
}

fn add_group(
    groups: &mut Vec<Tagged>,
    kind: GroupKind,
    label: Option<&str>,
    keywords: &[String],
    aliases: &[AliasItem],
    at: Option<usize>,
) -> EditOutcome {
    let at = at.unwrap_or(groups.len());
    if at > groups.len() {
        return noop(NoOpReason::IndexOutOfRange(at));
    }
    let body = match kind {
        GroupKind::GroupName | GroupKind::Plain => {
            if !aliases.is_empty() {
                return incompatible("keyword groups take bare keywords");
            }
            let keywords = match seeded_keywords(keywords) {
                Ok(keywords) => keywords,
                Err(outcome) => return outcome,
            };
            if kind == GroupKind::Plain {
                GroupBody::Plain { keywords }
            } else {
                match label.map(str::trim).filter(|label| !label.is_empty()) {
                    Some(label) if reads_as_label(label) => GroupBody::GroupName {
                        label: label.to_string(),
                        keywords,
                    },
                    Some(label) => return unreadable("label", label),
                    None => return incompatible("a named group needs a label"),
                }
            }
        }
        GroupKind::Alias | GroupKind::AliasGroup => {
            if !keywords.is_empty() {
                return incompatible("alias groups take keyword => alias items");
            }
            match seeded_aliases(aliases) {
                Ok(items) => GroupBody::AliasGroup { items },
                Err(outcome) => return outcome,
            }
        }
    };
    groups.insert(at, Tagged::detached(FrequencyGroup::new(body)));
    EditOutcome::Applied
}

fn merge_groups(groups: &mut Vec<Tagged>, into: usize, from: usize) -> EditOutcome {
    if into == from {
        return noop(NoOpReason::Unchanged);
    }
    let source = groups[from].group.clone();
    let target = &mut groups[into].group;
    let merged = match &source.body {
        GroupBody::GroupName { keywords: extra, .. } | GroupBody::Plain { keywords: extra } => {
            match keywords_mut(&mut target.body) {
                Some(keywords) => {
                    for keyword in extra {
                        if !keywords.contains(keyword) {
                            keywords.push(keyword.clone());
                        }
                    }
                    true
                }
                None => false,
            }
        }
        GroupBody::Alias { item } => merge_items(&mut target.body, std::slice::from_ref(item)),
        GroupBody::AliasGroup { items } => merge_items(&mut target.body, items),
    };
    if !merged {
        return incompatible("keyword groups and alias groups cannot be merged");
    }
    target.preceding_comments.extend(
        source
            .preceding_comments
            .into_iter()
            .filter(|line| !line.trim().is_empty()),
    );
    groups.remove(from);
    EditOutcome::Applied
}

fn merge_items(body: &mut GroupBody, extra: &[AliasItem]) -> bool {
    let Some(items) = alias_items_mut(body) else {
        return false;
    };
    for item in extra {
        if !items.iter().any(|existing| existing.keyword == item.keyword) {
            items.push(item.clone());
        }
    }
    true
}

fn split_group(groups: &mut Vec<Tagged>, index: usize, at: usize) -> EditOutcome {
    let body = &mut groups[index].group.body;
    let second = match body {
        GroupBody::GroupName { keywords, .. } | GroupBody::Plain { keywords } => {
            if at == 0 || at >= keywords.len() {
                return noop(NoOpReason::IndexOutOfRange(at));
            }
            GroupBody::Plain {
                keywords: keywords.split_off(at),
            }
        }
        GroupBody::AliasGroup { items } => {
            if at == 0 || at >= items.len() {
                return noop(NoOpReason::IndexOutOfRange(at));
            }
            GroupBody::AliasGroup {
                items: items.split_off(at),
            }
        }
        GroupBody::Alias { .. } => return incompatible("a single alias cannot be split"),
    };
    groups.insert(index + 1, Tagged::detached(FrequencyGroup::new(second)));
    EditOutcome::Applied
}

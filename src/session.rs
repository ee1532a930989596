//! An editing session over one document. The text is the only source of
//! truth; the parsed read model is a cache that every committed write drops.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::diff::changed_spans;
use crate::error::{DocumentError, EditOutcome, NoOpReason};
use crate::lines::LineSequence;
use crate::logging::{EditLog, LineSpan};
use crate::navigator::split_path;
use crate::remote::{FetchTicket, FetchTracker};
use crate::rules::{RuleDocument, RuleEdit, apply_edit, build, parse};
use crate::scalar::ScalarValue;
use crate::schedule::{self, ScheduleDocument};
use crate::sections::{
    Cascade, SetMode, TemplateField, delete_section, duplicate_section, insert_block,
    list_add, list_move, list_remove, set_field,
};
use crate::store::Debouncer;

/// A full-document reader used for read queries only.
pub trait ReadModel: Clone + Sized {
    fn read(text: &str) -> Result<Self, String>;
}

/// Settings or schedule text read through `serde_yaml`.
#[derive(Clone, Debug, PartialEq)]
pub struct YamlView(pub Value);

impl YamlView {
    /// Looks up a dotted path; numeric segments also match integer keys.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        split_path(dotted)
            .into_iter()
            .try_fold(&self.0, |node, segment| {
                node.get(segment).or_else(|| {
                    let number = segment.parse::<i64>().ok()?;
                    node.get(Value::from(number))
                })
            })
    }

    pub fn contains(&self, dotted: &str) -> bool {
        self.get(dotted).is_some()
    }

    pub fn schedule(&self) -> Result<ScheduleDocument, serde_yaml::Error> {
        ScheduleDocument::from_value(&self.0)
    }
}

impl ReadModel for YamlView {
    fn read(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text)
            .map(YamlView)
            .map_err(|err| err.to_string())
    }
}

impl ReadModel for RuleDocument {
    fn read(text: &str) -> Result<Self, String> {
        Ok(parse(text))
    }
}

/// A line-level edit on an indented document, as a form or plan submits it.
/// Paths are dotted key paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentEdit {
    /// Rewrite an existing scalar; a missing field is a no-op.
    Set {
        section: String,
        field: String,
        value: ScalarValue,
    },
    /// Rewrite a scalar, inserting it when absent.
    Upsert {
        section: String,
        field: String,
        value: ScalarValue,
    },
    Duplicate {
        section: String,
        new_key: String,
    },
    Delete {
        section: String,
        #[serde(default)]
        cascade: Option<Cascade>,
    },
    ListAdd {
        path: String,
        item: String,
    },
    ListRemove {
        path: String,
        item: String,
    },
    ListMove {
        path: String,
        from: usize,
        to: usize,
    },
    InsertBlock {
        parent: String,
        key: String,
        #[serde(default)]
        fields: Vec<TemplateField>,
    },
    DeletePeriod {
        preset: String,
        period: String,
    },
    AddPeriod {
        preset: String,
        key: String,
        name: String,
        start: String,
        end: String,
    },
    AddDayPlan {
        preset: String,
        key: String,
    },
    DeleteDayPlan {
        preset: String,
        key: String,
    },
    AssignDay {
        preset: String,
        weekday: u8,
        plan: String,
    },
}

impl DocumentEdit {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentEdit::Set { .. } => "set",
            DocumentEdit::Upsert { .. } => "upsert",
            DocumentEdit::Duplicate { .. } => "duplicate",
            DocumentEdit::Delete { .. } => "delete",
            DocumentEdit::ListAdd { .. } => "list_add",
            DocumentEdit::ListRemove { .. } => "list_remove",
            DocumentEdit::ListMove { .. } => "list_move",
            DocumentEdit::InsertBlock { .. } => "insert_block",
            DocumentEdit::DeletePeriod { .. } => "delete_period",
            DocumentEdit::AddPeriod { .. } => "add_period",
            DocumentEdit::AddDayPlan { .. } => "add_day_plan",
            DocumentEdit::DeleteDayPlan { .. } => "delete_day_plan",
            DocumentEdit::AssignDay { .. } => "assign_day",
        }
    }

    pub fn apply(&self, lines: &mut Vec<String>) -> EditOutcome {
        match self {
            DocumentEdit::Set {
                section,
                field,
                value,
            } => set_field(
                lines,
                &split_path(section),
                &split_path(field),
                value,
                SetMode::Replace,
            ),
            DocumentEdit::Upsert {
                section,
                field,
                value,
            } => set_field(
                lines,
                &split_path(section),
                &split_path(field),
                value,
                SetMode::Upsert,
            ),
            DocumentEdit::Duplicate { section, new_key } => {
                duplicate_section(lines, &split_path(section), new_key)
            }
            DocumentEdit::Delete { section, cascade } => {
                delete_section(lines, &split_path(section), cascade.as_ref())
            }
            DocumentEdit::ListAdd { path, item } => list_add(lines, &split_path(path), item),
            DocumentEdit::ListRemove { path, item } => list_remove(lines, &split_path(path), item),
            DocumentEdit::ListMove { path, from, to } => {
                list_move(lines, &split_path(path), *from, *to)
            }
            DocumentEdit::InsertBlock {
                parent,
                key,
                fields,
            } => insert_block(lines, &split_path(parent), key, fields),
            DocumentEdit::DeletePeriod { preset, period } => {
                schedule::delete_period(lines, preset, period)
            }
            DocumentEdit::AddPeriod {
                preset,
                key,
                name,
                start,
                end,
            } => schedule::add_period(lines, preset, key, name, start, end),
            DocumentEdit::AddDayPlan { preset, key } => schedule::add_day_plan(lines, preset, key),
            DocumentEdit::DeleteDayPlan { preset, key } => {
                schedule::delete_day_plan(lines, preset, key)
            }
            DocumentEdit::AssignDay {
                preset,
                weekday,
                plan,
            } => schedule::assign_day(lines, preset, *weekday, plan),
        }
    }
}

#[derive(Debug)]
pub struct EditSession<M> {
    name: String,
    text: LineSequence,
    /// Last successful parse; `fresh` says whether it matches `text`.
    cache: Option<M>,
    fresh: bool,
    revision: u64,
    log: Option<EditLog>,
}

impl<M: ReadModel> EditSession<M> {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: LineSequence::parse(text),
            cache: None,
            fresh: false,
            revision: 0,
            log: None,
        }
    }

    pub fn with_log(mut self, log: EditLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> String {
        self.text.to_text()
    }

    pub fn lines(&self) -> &[String] {
        self.text.lines()
    }

    /// Bumped on every committed write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The read model for the current text, parsed on first use after a write.
    pub fn model(&mut self) -> Result<&M, DocumentError> {
        if !self.fresh || self.cache.is_none() {
            let parsed = M::read(&self.text.to_text()).map_err(|message| {
                DocumentError::Malformed {
                    document: self.name.clone(),
                    message,
                }
            })?;
            self.cache = Some(parsed);
            self.fresh = true;
        }
        self.cache.as_ref().ok_or_else(|| DocumentError::Malformed {
            document: self.name.clone(),
            message: "no parse available".to_string(),
        })
    }

    /// The most recent successful parse, even if the text moved on since.
    pub fn last_good(&self) -> Option<&M> {
        self.cache.as_ref()
    }

    /// Runs a line edit on a scratch copy and commits it only when applied.
    /// An edit that would turn readable text unreadable is refused.
    pub fn apply_lines<F>(&mut self, operation: &str, edit: F) -> EditOutcome
    where
        F: FnOnce(&mut Vec<String>) -> EditOutcome,
    {
        let mut scratch = self.text.lines().to_vec();
        let outcome = edit(&mut scratch);
        if !outcome.is_applied() {
            self.record(operation, &outcome, &[]);
            return outcome;
        }
        let mut next = self.text.clone();
        next.set_lines(scratch);
        let checked = if self.model().is_ok() {
            match M::read(&next.to_text()) {
                Ok(parsed) => Some(parsed),
                Err(message) => {
                    return self.refuse(
                        operation,
                        format!("the edit would leave {} unreadable: {message}", self.name),
                    );
                }
            }
        } else {
            None
        };
        self.commit(operation, &outcome, next);
        if let Some(parsed) = checked {
            self.cache = Some(parsed);
            self.fresh = true;
        }
        outcome
    }

    /// Swaps in new text after checking that it parses. Malformed text is
    /// rejected and the current text stays.
    pub fn replace_text(&mut self, text: &str) -> Result<(), DocumentError> {
        let parsed = M::read(text).map_err(|message| DocumentError::Malformed {
            document: self.name.clone(),
            message,
        })?;
        self.commit("replace", &EditOutcome::Applied, LineSequence::parse(text));
        self.cache = Some(parsed);
        self.fresh = true;
        Ok(())
    }

    /// Applies a fetch result if `ticket` is still the latest one issued.
    /// Returns whether the text was replaced.
    pub fn load_fetched(
        &mut self,
        tracker: &FetchTracker,
        ticket: FetchTicket,
        fetched: Result<String, DocumentError>,
    ) -> Result<bool, DocumentError> {
        if !tracker.is_current(ticket) {
            return Ok(false);
        }
        self.replace_text(&fetched?)?;
        Ok(true)
    }

    pub fn schedule_save(&self, debouncer: &mut Debouncer) {
        debouncer.schedule(&self.name, &self.text.to_text());
    }

    fn commit(&mut self, operation: &str, outcome: &EditOutcome, next: LineSequence) {
        let before = self.text.to_text();
        let after = next.to_text();
        self.text = next;
        self.fresh = false;
        self.revision += 1;
        self.record(operation, outcome, &changed_spans(&before, &after));
    }

    fn refuse(&self, operation: &str, detail: String) -> EditOutcome {
        let outcome = EditOutcome::NoOp(NoOpReason::Incompatible(detail));
        self.record(operation, &outcome, &[]);
        outcome
    }

    fn record(&self, operation: &str, outcome: &EditOutcome, spans: &[LineSpan]) {
        if let Some(log) = &self.log {
            if let Err(err) = log.record(&self.name, operation, outcome, spans) {
                eprintln!("warning: edit log unavailable: {err:#}");
            }
        }
    }
}

impl EditSession<YamlView> {
    pub fn apply(&mut self, edit: &DocumentEdit) -> EditOutcome {
        self.apply_lines(edit.name(), |lines| edit.apply(lines))
    }
}

impl EditSession<RuleDocument> {
    /// Parses, edits the typed groups, and rebuilds over the current text.
    /// The rebuilt text must read back to the edited groups, so a group with
    /// nothing to write is refused here.
    pub fn apply_rule(&mut self, edit: &RuleEdit) -> Result<EditOutcome, DocumentError> {
        let mut doc = self.model()?.clone();
        let outcome = apply_edit(&mut doc, edit);
        let operation = edit.name();
        if !outcome.is_applied() {
            self.record(operation, &outcome, &[]);
            return Ok(outcome);
        }
        let rebuilt = build(&doc, Some(&self.text.to_text()));
        let reread = parse(&rebuilt);
        if !reread.same_content(&doc) {
            return Ok(self.refuse(
                operation,
                "the edited rules would not read back the same; empty groups are not written"
                    .to_string(),
            ));
        }
        self.commit(operation, &outcome, LineSequence::parse(&rebuilt));
        self.cache = Some(reread);
        self.fresh = true;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GroupKind;
    use crate::store::{DocumentStore, MemoryStore};
    use std::time::Duration;
    use tempfile::tempdir;

    const SETTINGS: &str = "\
# app settings
app:
  name: \"Digest\"  # shown in title
  port: 8080
";

    #[test]
    fn set_commits_and_invalidates_cache() {
        let mut session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        assert_eq!(
            session.model().expect("model").get("app.port"),
            Some(&Value::from(8080))
        );
        let edit = DocumentEdit::Set {
            section: "app".into(),
            field: "port".into(),
            value: ScalarValue::Int(9090),
        };
        assert!(session.apply(&edit).is_applied());
        assert_eq!(session.revision(), 1);
        assert_eq!(
            session.model().expect("model").get("app.port"),
            Some(&Value::from(9090))
        );
        assert!(session.text().starts_with("# app settings\n"));
    }

    #[test]
    fn missing_field_leaves_text_identical() {
        let mut session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        let edit = DocumentEdit::Set {
            section: "app".into(),
            field: "debug.verbose".into(),
            value: ScalarValue::Bool(true),
        };
        assert_eq!(
            session.apply(&edit),
            EditOutcome::NoOp(NoOpReason::FieldNotFound("debug.verbose".into()))
        );
        assert_eq!(session.text(), SETTINGS);
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn malformed_replacement_keeps_old_text() {
        let mut session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        let err = session
            .replace_text("app: [unclosed\n")
            .expect_err("malformed");
        assert!(matches!(err, DocumentError::Malformed { .. }));
        assert_eq!(session.text(), SETTINGS);
    }

    #[test]
    fn stale_fetch_is_ignored() {
        let mut session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        let mut tracker = FetchTracker::new();
        let stale = tracker.issue();
        let latest = tracker.issue();
        let applied = session
            .load_fetched(&tracker, stale, Ok("app: {}\n".into()))
            .expect("load");
        assert!(!applied);
        assert_eq!(session.text(), SETTINGS);

        let failed = session.load_fetched(
            &tracker,
            latest,
            Err(DocumentError::Fetch {
                location: "https://example.invalid/config.yaml".into(),
                message: "timeout".into(),
            }),
        );
        assert!(failed.is_err());
        assert_eq!(session.text(), SETTINGS);

        assert!(session
            .load_fetched(&tracker, latest, Ok("app: {}\n".into()))
            .expect("load"));
        assert_eq!(session.text(), "app: {}\n");
    }

    #[test]
    fn rule_edits_rebuild_over_original_text() {
        let text = "[WORD_GROUPS]\n# chips\n[Chips]\nnvidia\n";
        let mut session: EditSession<RuleDocument> = EditSession::new("rules", text);
        let edit = RuleEdit::AddKeyword {
            group: 0,
            keyword: "amd".into(),
        };
        assert!(session.apply_rule(&edit).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\n# chips\n[Chips]\nnvidia\namd\n");
        assert_eq!(session.model().expect("model").groups.len(), 1);
    }

    #[test]
    fn seeded_group_takes_keywords_after_reparse() {
        let mut session: EditSession<RuleDocument> =
            EditSession::new("rules", "[WORD_GROUPS]\nfoo\n");
        let add = RuleEdit::AddGroup {
            kind: GroupKind::Plain,
            label: None,
            keywords: vec!["amd".into()],
            aliases: Vec::new(),
            at: None,
        };
        assert!(session.apply_rule(&add).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\nfoo\n\namd\n");
        let keyword = RuleEdit::AddKeyword {
            group: 1,
            keyword: "intel".into(),
        };
        assert!(session.apply_rule(&keyword).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\nfoo\n\namd\nintel\n");
        assert_eq!(session.model().expect("model").groups.len(), 2);
    }

    #[test]
    fn empty_plain_group_is_not_written() {
        let text = "[WORD_GROUPS]\nfoo\n";
        let mut session: EditSession<RuleDocument> = EditSession::new("rules", text);
        let add = RuleEdit::AddGroup {
            kind: GroupKind::Plain,
            label: None,
            keywords: Vec::new(),
            aliases: Vec::new(),
            at: None,
        };
        let outcome = session.apply_rule(&add).expect("apply");
        assert!(matches!(
            outcome,
            EditOutcome::NoOp(NoOpReason::Incompatible(_))
        ));
        assert_eq!(session.text(), text);
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn labelled_group_persists_before_its_first_keyword() {
        let mut session: EditSession<RuleDocument> =
            EditSession::new("rules", "[WORD_GROUPS]\nfoo\n");
        let add = RuleEdit::AddGroup {
            kind: GroupKind::GroupName,
            label: Some("新闻".into()),
            keywords: Vec::new(),
            aliases: Vec::new(),
            at: None,
        };
        assert!(session.apply_rule(&add).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\nfoo\n\n[新闻]\n");
        let keyword = RuleEdit::AddKeyword {
            group: 1,
            keyword: "华为".into(),
        };
        assert!(session.apply_rule(&keyword).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\nfoo\n\n[新闻]\n华为\n");
    }

    #[test]
    fn split_and_merge_survive_reparse() {
        let text = "[WORD_GROUPS]\n[Chips]\nnvidia\namd\nintel\n";
        let mut session: EditSession<RuleDocument> = EditSession::new("rules", text);
        let split = RuleEdit::SplitGroup { group: 0, at: 2 };
        assert!(session.apply_rule(&split).expect("apply").is_applied());
        assert_eq!(session.text(), "[WORD_GROUPS]\n[Chips]\nnvidia\namd\n\nintel\n");
        assert_eq!(session.model().expect("model").groups.len(), 2);
        let merge = RuleEdit::MergeGroups { into: 0, from: 1 };
        assert!(session.apply_rule(&merge).expect("apply").is_applied());
        assert_eq!(session.text(), text);
    }

    #[test]
    fn cjk_keywords_round_trip_and_bad_text_is_refused() {
        let text = "[WORD_GROUPS]\n# 科技\n[人工智能]\nAI\n大模型\n";
        let mut session: EditSession<RuleDocument> = EditSession::new("rules", text);
        let rename = RuleEdit::RenameKeyword {
            group: 0,
            from: "大模型".into(),
            to: "大语言模型".into(),
        };
        assert!(session.apply_rule(&rename).expect("apply").is_applied());
        let renamed = "[WORD_GROUPS]\n# 科技\n[人工智能]\nAI\n大语言模型\n";
        assert_eq!(session.text(), renamed);
        for edit in [
            RuleEdit::AddKeyword {
                group: 0,
                keyword: "# 注释".into(),
            },
            RuleEdit::SetLabel {
                group: 0,
                label: "GLOBAL_FILTER".into(),
            },
        ] {
            assert!(!session.apply_rule(&edit).expect("apply").is_applied());
        }
        assert_eq!(session.text(), renamed);
        assert_eq!(session.revision(), 1);
    }

    #[test]
    fn non_ascii_settings_keys_are_editable() {
        let text = "标题: 每日新闻\napp:\n  端口: 8080\n";
        let mut session: EditSession<YamlView> = EditSession::new("settings", text);
        let edit = DocumentEdit::Set {
            section: "app".into(),
            field: "端口".into(),
            value: ScalarValue::Int(9090),
        };
        assert!(session.apply(&edit).is_applied());
        assert_eq!(session.text(), "标题: 每日新闻\napp:\n  端口: 9090\n");
        assert_eq!(
            session.model().expect("model").get("标题"),
            Some(&Value::from("每日新闻"))
        );
    }

    #[test]
    fn upsert_through_a_scalar_keeps_the_document_readable() {
        let text = "app:\n  port: 8080\n";
        let mut session: EditSession<YamlView> = EditSession::new("settings", text);
        let edit = DocumentEdit::Upsert {
            section: "app".into(),
            field: "port.extra".into(),
            value: ScalarValue::Int(1),
        };
        assert!(matches!(
            session.apply(&edit),
            EditOutcome::NoOp(NoOpReason::Incompatible(_))
        ));
        assert_eq!(session.text(), text);
        assert!(session.model().is_ok());
    }

    #[test]
    fn line_edits_that_break_parsing_are_refused() {
        let mut session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        let outcome = session.apply_lines("raw", |lines| {
            lines.push("  extra: [unclosed".to_string());
            EditOutcome::Applied
        });
        assert!(matches!(
            outcome,
            EditOutcome::NoOp(NoOpReason::Incompatible(_))
        ));
        assert_eq!(session.text(), SETTINGS);
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn edits_are_logged_including_no_ops() {
        let temp = tempdir().expect("temp dir");
        let log = EditLog::new(temp.path());
        let mut session: EditSession<YamlView> =
            EditSession::new("settings", SETTINGS).with_log(log.clone());
        session.apply(&DocumentEdit::Set {
            section: "app".into(),
            field: "port".into(),
            value: ScalarValue::Int(1),
        });
        session.apply(&DocumentEdit::Set {
            section: "missing".into(),
            field: "port".into(),
            value: ScalarValue::Int(1),
        });
        let entries = log.read_all().expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, "set");
        assert_eq!(entries[0].outcome, "applied");
        assert_eq!(entries[1].outcome, "no-op");
    }

    #[test]
    fn save_is_debounced_through_the_store() {
        let session: EditSession<YamlView> = EditSession::new("settings", SETTINGS);
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let mut store = MemoryStore::new();
        session.schedule_save(&mut debouncer);
        assert_eq!(debouncer.flush_due(&mut store), 1);
        assert_eq!(
            store.load("settings").expect("load").as_deref(),
            Some(SETTINGS)
        );
    }

    #[test]
    fn edits_deserialize_from_plans() {
        let edit: DocumentEdit = serde_yaml::from_str(
            "op: insert_block\nparent: custom.periods\nkey: lunch\nfields:\n  - field: start\n    value: \"12:00\"\n",
        )
        .expect("edit");
        assert_eq!(edit.name(), "insert_block");
    }
}

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use is_terminal::IsTerminal;

use confkeep::config::{Config, DocumentKind, load_config};
use confkeep::diff::print_diff;
use confkeep::files::{WriteOptions, read_document, write_document};
use confkeep::logging::{EditLog, describe_spans};
use confkeep::plan::{load_plan, run_plan};
use confkeep::remote::{FetchTracker, source_for};
use confkeep::rules::{ALIAS_SEPARATOR, AliasItem, GroupBody, GroupKind, RuleDocument, RuleEdit};
use confkeep::scalar::ScalarValue;
use confkeep::schedule::{ScheduleDocument, resolve, validate};
use confkeep::sections::Cascade;
use confkeep::session::{DocumentEdit, EditSession, ReadModel, YamlView};
use confkeep::store::{Debouncer, JsonFileStore};
use confkeep::{DocumentError, EditOutcome};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Set(cmd) => handle_set(cmd)?,
        Command::Duplicate(cmd) => handle_duplicate(cmd)?,
        Command::Delete(cmd) => handle_delete(cmd)?,
        Command::List(cmd) => handle_list(cmd)?,
        Command::AddPeriod(cmd) => handle_add_period(cmd)?,
        Command::Rules(cmd) => handle_rules(cmd)?,
        Command::Plan(cmd) => handle_plan(cmd)?,
        Command::Check(cmd) => handle_check(cmd)?,
        Command::Pull(cmd) => handle_pull(cmd)?,
        Command::Log(cmd) => handle_log(cmd)?,
    }

    Ok(())
}

fn handle_set(cmd: SetCommand) -> Result<()> {
    let value = if cmd.string {
        ScalarValue::Str(cmd.value.clone())
    } else {
        ScalarValue::parse_loose(&cmd.value)
    };
    let edit = if cmd.upsert {
        DocumentEdit::Upsert {
            section: cmd.section.clone(),
            field: cmd.field.clone(),
            value,
        }
    } else {
        DocumentEdit::Set {
            section: cmd.section.clone(),
            field: cmd.field.clone(),
            value,
        }
    };
    edit_document(
        "set",
        &cmd.common,
        cmd.document,
        &[edit],
        &[format!("field: {}.{}", cmd.section, cmd.field)],
    )
}

fn handle_duplicate(cmd: DuplicateCommand) -> Result<()> {
    let edit = DocumentEdit::Duplicate {
        section: cmd.section.clone(),
        new_key: cmd.new_key.clone(),
    };
    edit_document(
        "duplicate",
        &cmd.common,
        cmd.document,
        &[edit],
        &[format!("copy: {} -> {}", cmd.section, cmd.new_key)],
    )
}

fn handle_delete(cmd: DeleteCommand) -> Result<()> {
    let cascade = match (&cmd.cascade_container, &cmd.cascade_field) {
        (Some(container), Some(list_field)) => Some(Cascade {
            container: container.split('.').map(str::to_string).collect(),
            list_field: list_field.clone(),
        }),
        _ => None,
    };
    let mut details = vec![format!("section: {}", cmd.section)];
    if let Some(cascade) = &cascade {
        details.push(format!(
            "cascade: {}.*.{}",
            cascade.container.join("."),
            cascade.list_field
        ));
    }
    let edit = DocumentEdit::Delete {
        section: cmd.section.clone(),
        cascade,
    };
    edit_document("delete", &cmd.common, cmd.document, &[edit], &details)
}

fn handle_list(cmd: ListCommand) -> Result<()> {
    let edit = match cmd.action {
        ListAction::Add { path, item } => DocumentEdit::ListAdd { path, item },
        ListAction::Remove { path, item } => DocumentEdit::ListRemove { path, item },
        ListAction::Move { path, from, to } => DocumentEdit::ListMove { path, from, to },
    };
    let label = format!("list {}", edit.name().trim_start_matches("list_"));
    edit_document(&label, &cmd.common, cmd.document, &[edit], &[])
}

fn handle_add_period(cmd: AddPeriodCommand) -> Result<()> {
    let workspace = Workspace::open(&cmd.common)?;
    let preset = cmd
        .preset
        .clone()
        .unwrap_or_else(|| workspace.config.preset.clone());
    let mut edits = vec![DocumentEdit::AddPeriod {
        preset: preset.clone(),
        key: cmd.key.clone(),
        name: cmd.name.clone(),
        start: cmd.start.clone(),
        end: cmd.end.clone(),
    }];
    let base = if preset == confkeep::schedule::CUSTOM_KEY {
        preset.clone()
    } else {
        format!("{}.{preset}", confkeep::navigator::PRESETS_KEY)
    };
    edits.extend(cmd.day_plans.iter().map(|plan| DocumentEdit::ListAdd {
        path: format!("{base}.day_plans.{plan}.periods"),
        item: cmd.key.clone(),
    }));
    edit_document(
        "add-period",
        &cmd.common,
        DocumentKind::Schedule,
        &edits,
        &[format!(
            "period: {} ({} {}-{}) in {preset}",
            cmd.key, cmd.name, cmd.start, cmd.end
        )],
    )
}

fn handle_rules(cmd: RulesCommand) -> Result<()> {
    let RulesCommand { common, action } = cmd;
    let workspace = Workspace::open(&common)?;
    let path = workspace.document_path(&common, DocumentKind::Rules);
    let old = read_document(&path)?;

    let edit = match action.into_edit() {
        Ok(edit) => edit,
        Err(json) => {
            let doc = confkeep::rules::parse(&old);
            print_rules(&doc, json)?;
            return Ok(());
        }
    };

    print_command_summary("rules", &common, &path, &[format!("edit: {}", edit.name())]);
    let mut session: EditSession<RuleDocument> =
        workspace.session(&common, DocumentKind::Rules, &old);
    let mut stats = CommandStats::default();
    let outcome = session.apply_rule(&edit)?;
    report_outcome(edit.name(), &outcome, common.apply, &mut stats);
    workspace.finish(&common, DocumentKind::Rules, &path, &old, &session.text())?;
    stats.print("rules");
    Ok(())
}

fn handle_plan(cmd: PlanCommand) -> Result<()> {
    let PlanCommand { common, plan } = cmd;
    let workspace = Workspace::open(&common)?;
    let edit_plan = load_plan(&plan)?;
    if edit_plan.steps.is_empty() {
        bail!("plan {} does not contain any steps", plan.display());
    }
    let path = match &edit_plan.path {
        Some(path) => path.clone(),
        None => workspace.document_path(&common, edit_plan.document),
    };
    print_command_summary(
        "plan",
        &common,
        &path,
        &[format!(
            "plan={} ({} steps)",
            plan.display(),
            edit_plan.steps.len()
        )],
    );
    let old = read_document(&path)?;
    let log = common.apply.then(|| workspace.log.clone());
    let outcome = run_plan(&edit_plan, &old, log)?;

    let mut stats = CommandStats::default();
    let total = outcome.steps.len();
    for (idx, step) in outcome.steps.iter().enumerate() {
        println!("=== Plan Step {}/{total}: {} ===", idx + 1, step.operation);
        report_outcome(&step.operation, &step.outcome, common.apply, &mut stats);
    }
    workspace.finish(&common, edit_plan.document, &path, &old, &outcome.text)?;
    stats.print("plan");
    Ok(())
}

fn handle_check(cmd: CheckCommand) -> Result<()> {
    let workspace = Workspace::open(&cmd.common)?;
    let path = workspace.document_path(&cmd.common, cmd.document);
    let text = read_document(&path)?;

    match cmd.document {
        DocumentKind::Rules => {
            let doc = confkeep::rules::parse(&text);
            println!(
                "{}: {} groups, {} global filters",
                path.display(),
                doc.groups.len(),
                doc.global_filters.len()
            );
            return Ok(());
        }
        DocumentKind::Settings => {
            YamlView::read(&text).map_err(|message| DocumentError::Malformed {
                document: path.display().to_string(),
                message,
            })?;
            println!("{}: ok", path.display());
            return Ok(());
        }
        DocumentKind::Schedule => {}
    }

    let view = YamlView::read(&text).map_err(|message| DocumentError::Malformed {
        document: path.display().to_string(),
        message,
    })?;
    let schedule: ScheduleDocument = view
        .schedule()
        .with_context(|| format!("decoding schedule {}", path.display()))?;
    let preset = cmd
        .preset
        .clone()
        .unwrap_or_else(|| workspace.config.preset.clone());
    let timelines = if cmd.all {
        schedule.timelines()
    } else {
        vec![(preset.clone(), schedule.timeline(&preset)?)]
    };

    let mut problems = 0usize;
    for (name, timeline) in &timelines {
        let issues = validate(timeline);
        if issues.is_empty() {
            println!("{name}: ok");
            continue;
        }
        println!("{name}: {} issue(s)", issues.len());
        for issue in &issues {
            println!("  - {issue}");
        }
        problems += issues.len();
    }

    if let (Some(weekday), Some(at)) = (cmd.weekday, &cmd.at) {
        let timeline = schedule.timeline(&preset)?;
        let resolved = resolve(timeline, weekday, at)?;
        println!(
            "{preset} at day {weekday} {at}: plan={} period={} collect={} analyze={} push={} report={} ai={}",
            resolved.day_plan,
            resolved.period_key.as_deref().unwrap_or("-"),
            resolved.collect,
            resolved.analyze,
            resolved.push,
            resolved.report_mode,
            resolved.ai_mode
        );
        if resolved.once_analyze || resolved.once_push {
            println!(
                "  once: analyze={} push={}",
                resolved.once_analyze, resolved.once_push
            );
        }
    }

    if problems > 0 {
        bail!("{problems} schedule issue(s) found in {}", path.display());
    }
    Ok(())
}

fn handle_pull(cmd: PullCommand) -> Result<()> {
    let workspace = Workspace::open(&cmd.common)?;
    let path = workspace.document_path(&cmd.common, cmd.document);
    let location = match cmd
        .from
        .as_deref()
        .or_else(|| workspace.config.sources.get(cmd.document))
    {
        Some(location) => location.to_string(),
        None => bail!(
            "no source configured for {}; pass --from",
            cmd.document.as_str()
        ),
    };
    print_command_summary("pull", &cmd.common, &path, &[format!("source: {location}")]);

    let old = read_document(&path)?;
    let mut tracker = FetchTracker::new();
    let ticket = tracker.issue();
    let fetched = source_for(&location, workspace.config.fetch_timeout()).fetch(&location);

    let mut stats = CommandStats::default();
    let pulled = match cmd.document {
        DocumentKind::Rules => {
            let mut session: EditSession<RuleDocument> =
                workspace.session(&cmd.common, cmd.document, &old);
            session
                .load_fetched(&tracker, ticket, fetched)
                .map(|_| session.text())
        }
        DocumentKind::Settings | DocumentKind::Schedule => {
            let mut session: EditSession<YamlView> =
                workspace.session(&cmd.common, cmd.document, &old);
            session
                .load_fetched(&tracker, ticket, fetched)
                .map(|_| session.text())
        }
    };
    let new = match pulled {
        Ok(text) => text,
        Err(err) => {
            eprintln!("warning: {err}; keeping {}", path.display());
            stats.skipped += 1;
            stats.print("pull");
            return Ok(());
        }
    };
    report_outcome("replace", &EditOutcome::Applied, cmd.common.apply, &mut stats);
    workspace.finish(&cmd.common, cmd.document, &path, &old, &new)?;
    stats.print("pull");
    Ok(())
}

fn handle_log(cmd: LogCommand) -> Result<()> {
    let config = load_config(cmd.config.as_deref())?;
    let entries = EditLog::new(config.log_dir()).read_recent(cmd.tail)?;
    if entries.is_empty() {
        println!("edit log is empty.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "[{}] {:<9} {:<16} {:<8} {}",
            entry.timestamp,
            entry.document,
            entry.operation,
            entry.outcome,
            entry.reason.as_deref().unwrap_or("")
        );
        if !entry.spans.is_empty() {
            println!("    lines: {}", describe_spans(&entry.spans));
        }
    }
    Ok(())
}

/// Runs line edits against a settings or schedule document.
fn edit_document(
    command: &str,
    common: &CommonArgs,
    kind: DocumentKind,
    edits: &[DocumentEdit],
    details: &[String],
) -> Result<()> {
    if kind == DocumentKind::Rules {
        bail!("{command} works on settings or schedule documents; use `confkeep rules` for rules");
    }
    let workspace = Workspace::open(common)?;
    let path = workspace.document_path(common, kind);
    print_command_summary(command, common, &path, details);

    let old = read_document(&path)?;
    let mut session: EditSession<YamlView> = workspace.session(common, kind, &old);
    if let Err(err) = session.model() {
        eprintln!("warning: {err}");
    }
    let mut stats = CommandStats::default();
    for edit in edits {
        let outcome = session.apply(edit);
        report_outcome(edit.name(), &outcome, common.apply, &mut stats);
    }
    workspace.finish(common, kind, &path, &old, &session.text())?;
    stats.print(command);
    Ok(())
}

struct Workspace {
    config: Config,
    log: EditLog,
}

impl Workspace {
    fn open(common: &CommonArgs) -> Result<Self> {
        let config = load_config(common.config.as_deref())?;
        let log = EditLog::new(config.log_dir());
        Ok(Self { config, log })
    }

    fn document_path(&self, common: &CommonArgs, kind: DocumentKind) -> PathBuf {
        common
            .file
            .clone()
            .unwrap_or_else(|| self.config.document_path(kind))
    }

    /// Edits are only logged when they will reach the file.
    fn session<M: ReadModel>(
        &self,
        common: &CommonArgs,
        kind: DocumentKind,
        text: &str,
    ) -> EditSession<M> {
        let session = EditSession::new(kind.as_str(), text);
        if common.apply {
            session.with_log(self.log.clone())
        } else {
            session
        }
    }

    /// Previews the change and writes it when `--apply` is set.
    fn finish(
        &self,
        common: &CommonArgs,
        kind: DocumentKind,
        path: &Path,
        old: &str,
        new: &str,
    ) -> Result<()> {
        if old == new {
            println!("{}: no changes", path.display());
            return Ok(());
        }
        println!("--- {}", path.display());
        print_diff(old, new, common.context, common.color.should_color());
        if !common.apply {
            println!("dry-run: rerun with --apply to write {}", path.display());
            return Ok(());
        }
        let options = WriteOptions {
            no_backup: common.no_backup || !self.config.backup,
            undo_log: common.undo_log.as_deref(),
        };
        let report = write_document(path, old, new, &options)?;
        println!("wrote {}", path.display());
        if let Some(backup) = &report.backup {
            println!("backup: {}", backup.display());
        }
        if let Some(patch) = &report.undo_patch {
            println!("undo patch: {}", patch.display());
        }
        self.persist(kind, new);
        Ok(())
    }

    fn persist(&self, kind: DocumentKind, text: &str) {
        let Some(store_path) = self.config.store_path() else {
            return;
        };
        let mut store = JsonFileStore::new(store_path);
        let mut debouncer = Debouncer::new(self.config.debounce());
        debouncer.schedule(kind.as_str(), text);
        debouncer.flush_all(&mut store);
    }
}

#[derive(Debug, Default)]
struct CommandStats {
    applied: usize,
    skipped: usize,
    dry_run: usize,
    no_op: usize,
}

impl CommandStats {
    fn print(&self, label: &str) {
        let total = self.applied + self.skipped + self.dry_run + self.no_op;
        if total == 0 {
            return;
        }
        println!(
            "{label} summary: applied={}, skipped={}, dry-run={}, no-op={}",
            self.applied, self.skipped, self.dry_run, self.no_op
        );
    }
}

fn report_outcome(operation: &str, outcome: &EditOutcome, apply: bool, stats: &mut CommandStats) {
    match outcome {
        EditOutcome::Applied if apply => stats.applied += 1,
        EditOutcome::Applied => stats.dry_run += 1,
        EditOutcome::NoOp(_) => stats.no_op += 1,
    }
    println!("{operation}: {outcome}");
}

fn print_command_summary(command: &str, common: &CommonArgs, path: &Path, details: &[String]) {
    println!("command: {command}");
    println!("mode: {}", if common.apply { "apply" } else { "dry-run" });
    println!("document: {}", path.display());
    println!("context lines: {}", common.context);
    if common.no_backup {
        println!("backups disabled");
    }
    if let Some(log) = &common.undo_log {
        println!("undo log dir: {}", log.display());
    }
    for detail in details {
        println!("{detail}");
    }
    println!("---");
}

fn print_rules(doc: &RuleDocument, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(doc)?);
        return Ok(());
    }
    if !doc.global_filters.is_empty() {
        println!("global filters: {}", doc.global_filters.join(", "));
    }
    for (idx, group) in doc.groups.iter().enumerate() {
        let summary = match &group.body {
            GroupBody::GroupName { label, keywords } => format!("[{label}] {}", keywords.join(", ")),
            GroupBody::Alias { item } => item.to_line(),
            GroupBody::AliasGroup { items } => items
                .iter()
                .map(AliasItem::to_line)
                .collect::<Vec<_>>()
                .join("; "),
            GroupBody::Plain { keywords } => keywords.join(", "),
        };
        let related = group
            .related
            .map(|run| format!(" (related {}/{})", run.index + 1, run.count))
            .unwrap_or_default();
        println!("{idx:>3} {:<11} {summary}{related}", group.body.kind().as_str());
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "confkeep",
    version,
    about = "Format-preserving edits for settings, schedule and keyword rule documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rewrite one scalar field in place.
    Set(SetCommand),
    /// Copy a keyed section under a new key.
    Duplicate(DuplicateCommand),
    /// Remove a keyed section, optionally dropping references to it.
    Delete(DeleteCommand),
    /// Add, remove or reorder list items.
    List(ListCommand),
    /// Add a schedule period and attach it to day plans.
    AddPeriod(AddPeriodCommand),
    /// Show or edit the keyword rule document.
    Rules(RulesCommand),
    /// Apply a YAML/JSON plan of edits to one document.
    Plan(PlanCommand),
    /// Validate a document and optionally resolve the schedule at a time.
    Check(CheckCommand),
    /// Replace a document with text fetched from a file or URL.
    Pull(PullCommand),
    /// Show recent edit log entries.
    Log(LogCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Edit this file instead of the configured document.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    file: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    apply: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    no_backup: bool,
    #[arg(long, default_value_t = 3)]
    context: usize,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
    #[arg(long = "undo-log", value_name = "DIR", value_hint = ValueHint::DirPath)]
    undo_log: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SetCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "settings")]
    document: DocumentKind,
    /// Dotted section path, e.g. `app` or `custom.periods.morning`.
    section: String,
    /// Dotted field path below the section.
    field: String,
    #[arg(allow_hyphen_values = true)]
    value: String,
    /// Insert the field when it is missing.
    #[arg(long, action = ArgAction::SetTrue)]
    upsert: bool,
    /// Keep the value as a string even if it looks like a number or bool.
    #[arg(long, action = ArgAction::SetTrue)]
    string: bool,
}

#[derive(Debug, Args)]
struct DuplicateCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "settings")]
    document: DocumentKind,
    section: String,
    new_key: String,
}

#[derive(Debug, Args)]
struct DeleteCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "settings")]
    document: DocumentKind,
    section: String,
    /// Dotted path whose children hold lists naming the deleted key.
    #[arg(long, value_name = "PATH", requires = "cascade_field")]
    cascade_container: Option<String>,
    #[arg(long, value_name = "FIELD", requires = "cascade_container")]
    cascade_field: Option<String>,
}

#[derive(Debug, Args)]
struct ListCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "settings")]
    document: DocumentKind,
    #[command(subcommand)]
    action: ListAction,
}

#[derive(Debug, Subcommand)]
enum ListAction {
    Add { path: String, item: String },
    Remove { path: String, item: String },
    Move { path: String, from: usize, to: usize },
}

#[derive(Debug, Args)]
struct AddPeriodCommand {
    #[command(flatten)]
    common: CommonArgs,
    /// Preset name or `custom`; defaults to the configured preset.
    #[arg(long)]
    preset: Option<String>,
    key: String,
    #[arg(long)]
    name: String,
    #[arg(long, value_name = "HH:MM")]
    start: String,
    #[arg(long, value_name = "HH:MM")]
    end: String,
    /// Day plans that should include the new period.
    #[arg(long = "day-plan", value_name = "PLAN")]
    day_plans: Vec<String>,
}

#[derive(Debug, Args)]
struct RulesCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    action: RuleAction,
}

#[derive(Debug, Subcommand)]
enum RuleAction {
    /// Print the parsed groups.
    Show {
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    AddKeyword { group: usize, keyword: String },
    /// Remove a keyword or the alias line keyed by it.
    RemoveKeyword { group: usize, keyword: String },
    RenameKeyword { group: usize, from: String, to: String },
    /// Set a group label; an empty label makes the group plain.
    SetLabel { group: usize, label: String },
    AddAlias { group: usize, keyword: String, alias: String },
    SetAlias { group: usize, keyword: String, alias: String },
    /// Add a group. Plain and alias groups need at least one entry.
    AddGroup {
        #[arg(long, value_enum)]
        kind: GroupKind,
        #[arg(long)]
        label: Option<String>,
        #[arg(long = "keyword", value_name = "KEYWORD")]
        keywords: Vec<String>,
        #[arg(long = "alias", value_name = "KEYWORD => ALIAS", value_parser = parse_alias)]
        aliases: Vec<AliasItem>,
        #[arg(long)]
        at: Option<usize>,
    },
    DeleteGroup { group: usize },
    MoveGroup { from: usize, to: usize },
    MergeGroups { into: usize, from: usize },
    SplitGroup { group: usize, at: usize },
    AddFilter { filter: String },
    RemoveFilter { filter: String },
}

impl RuleAction {
    /// The edit to run, or `Err(json)` for `show`.
    fn into_edit(self) -> Result<RuleEdit, bool> {
        Ok(match self {
            RuleAction::Show { json } => return Err(json),
            RuleAction::AddKeyword { group, keyword } => RuleEdit::AddKeyword { group, keyword },
            RuleAction::RemoveKeyword { group, keyword } => {
                RuleEdit::RemoveKeyword { group, keyword }
            }
            RuleAction::RenameKeyword { group, from, to } => {
                RuleEdit::RenameKeyword { group, from, to }
            }
            RuleAction::SetLabel { group, label } => RuleEdit::SetLabel { group, label },
            RuleAction::AddAlias {
                group,
                keyword,
                alias,
            } => RuleEdit::AddAlias {
                group,
                keyword,
                alias,
            },
            RuleAction::SetAlias {
                group,
                keyword,
                alias,
            } => RuleEdit::SetAlias {
                group,
                keyword,
                alias,
            },
            RuleAction::AddGroup {
                kind,
                label,
                keywords,
                aliases,
                at,
            } => RuleEdit::AddGroup {
                kind,
                label,
                keywords,
                aliases,
                at,
            },
            RuleAction::DeleteGroup { group } => RuleEdit::DeleteGroup { group },
            RuleAction::MoveGroup { from, to } => RuleEdit::MoveGroup { from, to },
            RuleAction::MergeGroups { into, from } => RuleEdit::MergeGroups { into, from },
            RuleAction::SplitGroup { group, at } => RuleEdit::SplitGroup { group, at },
            RuleAction::AddFilter { filter } => RuleEdit::AddFilter { filter },
            RuleAction::RemoveFilter { filter } => RuleEdit::RemoveFilter { filter },
        })
    }
}

fn parse_alias(raw: &str) -> Result<AliasItem, String> {
    let (keyword, alias) = raw
        .split_once(ALIAS_SEPARATOR)
        .ok_or_else(|| format!("expected `keyword {ALIAS_SEPARATOR} alias`, got {raw:?}"))?;
    Ok(AliasItem::new(keyword.trim(), alias.trim()))
}

#[derive(Debug, Args)]
struct PlanCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "PLAN", value_hint = ValueHint::FilePath)]
    plan: PathBuf,
}

#[derive(Debug, Args)]
struct CheckCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "schedule")]
    document: DocumentKind,
    #[arg(long)]
    preset: Option<String>,
    /// Check every preset and the custom block.
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,
    /// Day of week, 1 (Monday) to 7 (Sunday).
    #[arg(long, requires = "at")]
    weekday: Option<u8>,
    #[arg(long, value_name = "HH:MM", requires = "weekday")]
    at: Option<String>,
}

#[derive(Debug, Args)]
struct PullCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_enum, default_value = "rules")]
    document: DocumentKind,
    /// File path or http(s) URL; defaults to the configured source.
    #[arg(long, value_name = "LOCATION")]
    from: Option<String>,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 20)]
    tail: usize,
}

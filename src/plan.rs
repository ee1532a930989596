use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::config::{DocumentKind, is_json};
use crate::error::EditOutcome;
use crate::logging::EditLog;
use crate::rules::{RuleDocument, RuleEdit};
use crate::session::{DocumentEdit, EditSession, YamlView};

/// A list of edits applied in order to one document.
#[derive(Debug, Deserialize)]
pub struct EditPlan {
    pub document: DocumentKind,
    /// Overrides the document path from the config.
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlanStep {
    Document(DocumentEdit),
    Rule(RuleEdit),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub operation: String,
    pub outcome: EditOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRun {
    pub text: String,
    pub steps: Vec<StepReport>,
}

impl PlanRun {
    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome.is_applied())
            .count()
    }
}

pub fn load_plan(path: &Path) -> Result<EditPlan> {
    let data = fs::read(path).with_context(|| format!("reading plan {}", path.display()))?;
    let plan = if is_json(path) {
        serde_json::from_slice(&data)
            .with_context(|| format!("parsing plan {}", path.display()))?
    } else {
        serde_yaml::from_slice(&data)
            .with_context(|| format!("parsing plan {}", path.display()))?
    };
    Ok(plan)
}

/// Runs every step through one session over `text`. Later steps see the
/// result of earlier ones; no-op steps leave the text alone.
pub fn run_plan(plan: &EditPlan, text: &str, log: Option<EditLog>) -> Result<PlanRun> {
    if plan.steps.is_empty() {
        bail!("plan does not contain any steps");
    }
    let name = plan.document.as_str();
    let mut steps = Vec::with_capacity(plan.steps.len());
    match plan.document {
        DocumentKind::Rules => {
            let mut session: EditSession<RuleDocument> = attach(EditSession::new(name, text), log);
            for (idx, step) in plan.steps.iter().enumerate() {
                let PlanStep::Rule(edit) = step else {
                    bail!("step {} is not a rule edit", idx + 1);
                };
                let outcome = session.apply_rule(edit)?;
                steps.push(StepReport {
                    operation: edit.name().to_string(),
                    outcome,
                });
            }
            Ok(PlanRun {
                text: session.text(),
                steps,
            })
        }
        DocumentKind::Settings | DocumentKind::Schedule => {
            let mut session: EditSession<YamlView> = attach(EditSession::new(name, text), log);
            for (idx, step) in plan.steps.iter().enumerate() {
                let PlanStep::Document(edit) = step else {
                    bail!("step {} is a rule edit but the plan targets {name}", idx + 1);
                };
                let outcome = session.apply(edit);
                steps.push(StepReport {
                    operation: edit.name().to_string(),
                    outcome,
                });
            }
            Ok(PlanRun {
                text: session.text(),
                steps,
            })
        }
    }
}

fn attach<M: crate::session::ReadModel>(
    session: EditSession<M>,
    log: Option<EditLog>,
) -> EditSession<M> {
    match log {
        Some(log) => session.with_log(log),
        None => session,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoOpReason;
    use tempfile::tempdir;

    const SCHEDULE: &str = "\
custom:
  default:
    collect: true
  periods:
    morning:
      name: Morning
      start: \"07:00\"
      end: \"09:00\"
  day_plans:
    weekday:
      periods: [morning]
  week_map:
    1: weekday
";

    #[test]
    fn yaml_plan_runs_schedule_steps_in_order() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("plan.yaml");
        fs::write(
            &path,
            "document: schedule\nsteps:\n  - op: add_period\n    preset: custom\n    key: lunch\n    name: Lunch\n    start: \"12:00\"\n    end: \"13:00\"\n  - op: list_add\n    path: custom.day_plans.weekday.periods\n    item: lunch\n  - op: delete_period\n    preset: custom\n    period: nope\n",
        )
        .expect("seed");
        let plan = load_plan(&path).expect("plan");
        let run = run_plan(&plan, SCHEDULE, None).expect("run");
        assert_eq!(run.applied(), 2);
        assert_eq!(
            run.steps[2].outcome,
            EditOutcome::NoOp(NoOpReason::SectionNotFound("custom.periods.nope".into()))
        );
        assert!(run.text.contains("periods: [morning, lunch]"));
        assert!(run.text.contains("    lunch:\n      name: Lunch\n"));
    }

    #[test]
    fn json_plan_runs_rule_steps() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("plan.json");
        fs::write(
            &path,
            r#"{"document": "rules", "steps": [
                {"op": "add_filter", "filter": "ads"},
                {"op": "add_keyword", "group": 0, "keyword": "amd"}
            ]}"#,
        )
        .expect("seed");
        let plan = load_plan(&path).expect("plan");
        let run = run_plan(&plan, "[WORD_GROUPS]\nnvidia\n", None).expect("run");
        assert_eq!(run.applied(), 2);
        assert_eq!(run.steps[0].operation, "add_filter");
        assert_eq!(
            run.text,
            "[GLOBAL_FILTER]\nads\n\n[WORD_GROUPS]\nnvidia\namd\n"
        );
    }

    #[test]
    fn mismatched_steps_are_rejected() {
        let plan = EditPlan {
            document: DocumentKind::Settings,
            path: None,
            steps: vec![PlanStep::Rule(RuleEdit::DeleteGroup { group: 0 })],
        };
        assert!(run_plan(&plan, "a: 1\n", None).is_err());
    }
}

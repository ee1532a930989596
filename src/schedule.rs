//! Timeline schedules: named periods, the day plans that list them, and a
//! weekday map choosing one plan per day (1 = Monday ... 7 = Sunday).
//!
//! Reads go through `serde_yaml`; the edit helpers at the bottom go through
//! the line-level section operations so comments survive.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::error::{EditOutcome, NoOpReason};
use crate::navigator::{PRESETS_KEY, child_keys, find_child_key, find_path};
use crate::scalar::{ScalarValue, read_value};
use crate::sections::{
    Cascade, FieldValue, SetMode, TemplateField, delete_section, insert_block, set_field,
};

pub const CUSTOM_KEY: &str = "custom";
pub const PERIODS_KEY: &str = "periods";
pub const DAY_PLANS_KEY: &str = "day_plans";
pub const WEEK_MAP_KEY: &str = "week_map";
const FOLLOW_REPORT: &str = "follow_report";
const MINUTES_PER_DAY: u16 = 24 * 60;

static HHMM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("time pattern compiles"));

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    #[default]
    ErrorOnOverlap,
    LastWins,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    #[serde(default)]
    pub policy: OverlapPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Behaviour overrides (`collect`, `push`, `once`, ...).
    #[serde(flatten)]
    pub overrides: Mapping,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub periods: Vec<String>,
}

/// `periods:` with every item removed reads as null.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub default: Option<Mapping>,
    #[serde(default)]
    pub periods: Option<BTreeMap<String, Period>>,
    #[serde(default)]
    pub day_plans: Option<BTreeMap<String, DayPlan>>,
    #[serde(default)]
    pub week_map: Option<BTreeMap<u8, String>>,
    #[serde(default)]
    pub overlap: Overlap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub presets: BTreeMap<String, Timeline>,
    #[serde(default)]
    pub custom: Option<Timeline>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ScheduleIssue {
    #[error("unknown preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },
    #[error("timeline is missing required key: {key}")]
    MissingKey { key: String },
    #[error("week_map has no entry for day {day}")]
    UnmappedDay { day: u8 },
    #[error("week_map[{day}] refers to unknown day plan: {plan}")]
    UnknownDayPlan { day: u8, plan: String },
    #[error("day plan '{plan}' refers to unknown period: {period}")]
    UnknownPeriod { plan: String, period: String },
    #[error("period '{period}' needs both start and end")]
    MissingBounds { period: String },
    #[error("{field} is '{value}', expected HH:MM")]
    BadTime { field: String, value: String },
    #[error("{field} is out of range: '{value}'")]
    TimeOutOfRange { field: String, value: String },
    #[error("period '{period}' starts and ends at {at}")]
    EmptyRange { period: String, at: String },
    #[error("day plan '{plan}': '{first}' overlaps '{second}'")]
    Overlap {
        plan: String,
        first: String,
        second: String,
    },
    #[error("periods {} overlap at {at}", .periods.join(", "))]
    ActiveOverlap { periods: Vec<String>, at: String },
}

/// What the schedule asks for at one moment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedSchedule {
    pub period_key: Option<String>,
    pub period_name: Option<String>,
    pub day_plan: String,
    pub collect: bool,
    pub analyze: bool,
    pub push: bool,
    pub report_mode: String,
    pub ai_mode: String,
    pub once_analyze: bool,
    pub once_push: bool,
}

impl ScheduleDocument {
    pub fn from_value(value: &Value) -> Result<Self, serde_yaml::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value.clone())
    }

    /// The timeline for `preset`, where `custom` names the custom block.
    pub fn timeline(&self, preset: &str) -> Result<&Timeline, ScheduleIssue> {
        let found = if preset == CUSTOM_KEY {
            self.custom.as_ref()
        } else {
            self.presets.get(preset)
        };
        found.ok_or_else(|| ScheduleIssue::UnknownPreset {
            name: preset.to_string(),
            available: self
                .presets
                .keys()
                .map(String::as_str)
                .chain([CUSTOM_KEY])
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Every named timeline, presets first.
    pub fn timelines(&self) -> Vec<(String, &Timeline)> {
        let mut all: Vec<(String, &Timeline)> = self
            .presets
            .iter()
            .map(|(name, timeline)| (name.clone(), timeline))
            .collect();
        if let Some(custom) = &self.custom {
            all.push((CUSTOM_KEY.to_string(), custom));
        }
        all
    }
}

/// Minutes since midnight for a valid `HH:MM` string.
pub fn minutes(value: &str) -> Option<u16> {
    if !HHMM.is_match(value) {
        return None;
    }
    let (hours, mins) = value.split_once(':')?;
    let (hours, mins): (u16, u16) = (hours.parse().ok()?, mins.parse().ok()?);
    (hours <= 23 && mins <= 59).then_some(hours * 60 + mins)
}

fn check_time(field: String, value: &str) -> Option<ScheduleIssue> {
    if !HHMM.is_match(value) {
        return Some(ScheduleIssue::BadTime {
            field,
            value: value.to_string(),
        });
    }
    minutes(value).is_none().then(|| ScheduleIssue::TimeOutOfRange {
        field,
        value: value.to_string(),
    })
}

/// True when `now` falls inside `[start, end]`; a start after the end wraps
/// past midnight.
pub fn in_range(now: u16, start: u16, end: u16) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

fn segments(start: u16, end: u16) -> Vec<(u16, u16)> {
    if start <= end {
        vec![(start, end)]
    } else {
        vec![(start, MINUTES_PER_DAY - 1), (0, end)]
    }
}

pub fn ranges_overlap(first: (u16, u16), second: (u16, u16)) -> bool {
    let a = segments(first.0, first.1);
    let b = segments(second.0, second.1);
    a.iter()
        .any(|&(a_start, a_end)| b.iter().any(|&(b_start, b_end)| a_start <= b_end && b_start <= a_end))
}

fn period_bounds(period: &Period) -> Option<(u16, u16)> {
    Some((minutes(period.start.as_deref()?)?, minutes(period.end.as_deref()?)?))
}

/// Collects every problem with a timeline instead of stopping at the first.
pub fn validate(timeline: &Timeline) -> Vec<ScheduleIssue> {
    let mut issues = Vec::new();
    let missing = |key: &str| ScheduleIssue::MissingKey {
        key: key.to_string(),
    };
    if timeline.default.is_none() {
        issues.push(missing("default"));
    }
    if timeline.day_plans.is_none() {
        issues.push(missing(DAY_PLANS_KEY));
    }
    let Some(week_map) = &timeline.week_map else {
        issues.push(missing(WEEK_MAP_KEY));
        return issues;
    };
    let empty_plans = BTreeMap::new();
    let day_plans = timeline.day_plans.as_ref().unwrap_or(&empty_plans);
    let empty_periods = BTreeMap::new();
    let periods = timeline.periods.as_ref().unwrap_or(&empty_periods);

    for day in 1..=7u8 {
        if !week_map.contains_key(&day) {
            issues.push(ScheduleIssue::UnmappedDay { day });
        }
    }
    issues.extend(dangling_references(timeline));

    for (key, period) in periods {
        let (Some(start), Some(end)) = (&period.start, &period.end) else {
            issues.push(ScheduleIssue::MissingBounds {
                period: key.clone(),
            });
            continue;
        };
        let bad_start = check_time(format!("{key}.start"), start);
        let bad_end = check_time(format!("{key}.end"), end);
        let well_formed = bad_start.is_none() && bad_end.is_none();
        issues.extend(bad_start.into_iter().chain(bad_end));
        if well_formed && start == end {
            issues.push(ScheduleIssue::EmptyRange {
                period: key.clone(),
                at: start.clone(),
            });
        }
    }

    if timeline.overlap.policy == OverlapPolicy::ErrorOnOverlap {
        for (plan_key, plan) in day_plans {
            let ranges: Vec<(&String, (u16, u16))> = plan
                .periods
                .iter()
                .filter_map(|key| Some((key, period_bounds(periods.get(key)?)?)))
                .collect();
            for (i, (first, first_range)) in ranges.iter().enumerate() {
                for (second, second_range) in &ranges[i + 1..] {
                    if ranges_overlap(*first_range, *second_range) {
                        issues.push(ScheduleIssue::Overlap {
                            plan: plan_key.clone(),
                            first: (*first).clone(),
                            second: (*second).clone(),
                        });
                    }
                }
            }
        }
    }
    issues
}

/// References from `week_map` to day plans and from day plans to periods
/// that point at nothing.
pub fn dangling_references(timeline: &Timeline) -> Vec<ScheduleIssue> {
    let mut issues = Vec::new();
    let empty_plans = BTreeMap::new();
    let day_plans = timeline.day_plans.as_ref().unwrap_or(&empty_plans);
    if let Some(week_map) = &timeline.week_map {
        for (day, plan) in week_map {
            if !day_plans.contains_key(plan) {
                issues.push(ScheduleIssue::UnknownDayPlan {
                    day: *day,
                    plan: plan.clone(),
                });
            }
        }
    }
    for (plan_key, plan) in day_plans {
        for period in &plan.periods {
            let known = timeline
                .periods
                .as_ref()
                .is_some_and(|periods| periods.contains_key(period));
            if !known {
                issues.push(ScheduleIssue::UnknownPeriod {
                    plan: plan_key.clone(),
                    period: period.clone(),
                });
            }
        }
    }
    issues
}

fn active_period<'t>(
    timeline: &'t Timeline,
    plan: &DayPlan,
    now: u16,
    at: &str,
) -> Result<Option<&'t String>, ScheduleIssue> {
    let Some(periods) = &timeline.periods else {
        return Ok(None);
    };
    let candidates: Vec<&String> = plan
        .periods
        .iter()
        .filter_map(|key| periods.get_key_value(key))
        .filter(|(_, period)| {
            period_bounds(period).is_some_and(|(start, end)| in_range(now, start, end))
        })
        .map(|(key, _)| key)
        .collect();
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        [.., last] => match timeline.overlap.policy {
            OverlapPolicy::ErrorOnOverlap => Err(ScheduleIssue::ActiveOverlap {
                periods: candidates.iter().map(|key| key.to_string()).collect(),
                at: at.to_string(),
            }),
            OverlapPolicy::LastWins => Ok(Some(*last)),
        },
    }
}

/// `default` overlaid with the period's fields; `once` is merged key by key.
fn merge_behavior(timeline: &Timeline, period: Option<&Period>) -> Mapping {
    let mut base = timeline.default.clone().unwrap_or_default();
    let Some(period) = period else {
        return base;
    };
    let mut once = base
        .get("once")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();
    if let Some(extra) = period.overrides.get("once").and_then(Value::as_mapping) {
        once.extend(extra.clone());
    }
    base.extend(period.overrides.clone());
    if !once.is_empty() {
        base.insert(Value::from("once"), Value::Mapping(once));
    }
    base
}

fn flag(map: &Mapping, key: &str, fallback: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(fallback)
}

fn text(map: &Mapping, key: &str, fallback: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// Works out the behaviour for `weekday` (1..=7) at `at` (`HH:MM`).
pub fn resolve(timeline: &Timeline, weekday: u8, at: &str) -> Result<ResolvedSchedule, ScheduleIssue> {
    let now = match minutes(at) {
        Some(now) => now,
        None => {
            return Err(ScheduleIssue::BadTime {
                field: "time".to_string(),
                value: at.to_string(),
            });
        }
    };
    let plan_key = timeline
        .week_map
        .as_ref()
        .and_then(|week_map| week_map.get(&weekday))
        .ok_or(ScheduleIssue::UnmappedDay { day: weekday })?;
    let plan = timeline
        .day_plans
        .as_ref()
        .and_then(|plans| plans.get(plan_key))
        .ok_or_else(|| ScheduleIssue::UnknownDayPlan {
            day: weekday,
            plan: plan_key.clone(),
        })?;

    let period_key = active_period(timeline, plan, now, at)?;
    let period = period_key.and_then(|key| timeline.periods.as_ref()?.get(key));
    let merged = merge_behavior(timeline, period);

    let report_mode = text(&merged, "report_mode", "current");
    let ai_mode = match text(&merged, "ai_mode", FOLLOW_REPORT) {
        mode if mode == FOLLOW_REPORT => report_mode.clone(),
        mode => mode,
    };
    let once = merged
        .get("once")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();

    Ok(ResolvedSchedule {
        period_key: period_key.cloned(),
        period_name: period.and_then(|period| period.name.clone()),
        day_plan: plan_key.clone(),
        collect: flag(&merged, "collect", true),
        analyze: flag(&merged, "analyze", false),
        push: flag(&merged, "push", false),
        report_mode,
        ai_mode,
        once_analyze: flag(&once, "analyze", false),
        once_push: flag(&once, "push", false),
    })
}

/// Key path of a timeline block inside the schedule document.
pub fn timeline_path(preset: &str) -> Vec<&str> {
    if preset == CUSTOM_KEY {
        vec![CUSTOM_KEY]
    } else {
        vec![PRESETS_KEY, preset]
    }
}

fn with<'a>(base: &[&'a str], tail: &[&'a str]) -> Vec<&'a str> {
    base.iter().chain(tail).copied().collect()
}

/// Deletes a period and drops it from every day plan of the same timeline.
pub fn delete_period(lines: &mut Vec<String>, preset: &str, period: &str) -> EditOutcome {
    let base = timeline_path(preset);
    let cascade = Cascade {
        container: with(&base, &[DAY_PLANS_KEY])
            .into_iter()
            .map(str::to_string)
            .collect(),
        list_field: PERIODS_KEY.to_string(),
    };
    delete_section(lines, &with(&base, &[PERIODS_KEY, period]), Some(&cascade))
}

pub fn add_period(
    lines: &mut Vec<String>,
    preset: &str,
    key: &str,
    name: &str,
    start: &str,
    end: &str,
) -> EditOutcome {
    for value in [start, end] {
        if minutes(value).is_none() {
            return EditOutcome::NoOp(NoOpReason::Incompatible(format!(
                "'{value}' is not a valid HH:MM time"
            )));
        }
    }
    if start == end {
        return EditOutcome::NoOp(NoOpReason::Incompatible(format!(
            "period '{key}' cannot start and end at {start}"
        )));
    }
    let fields = [
        TemplateField::new("name", name),
        TemplateField::new("start", start),
        TemplateField::new("end", end),
    ];
    insert_block(lines, &with(&timeline_path(preset), &[PERIODS_KEY]), key, &fields)
}

pub fn add_day_plan(lines: &mut Vec<String>, preset: &str, key: &str) -> EditOutcome {
    let fields = [TemplateField::new(PERIODS_KEY, FieldValue::List(Vec::new()))];
    insert_block(lines, &with(&timeline_path(preset), &[DAY_PLANS_KEY]), key, &fields)
}

fn week_map_entries(lines: &[String], preset: &str) -> Vec<(String, String)> {
    let Some(span) = find_path(lines, &with(&timeline_path(preset), &[WEEK_MAP_KEY])) else {
        return Vec::new();
    };
    child_keys(lines, &span)
        .into_iter()
        .filter_map(|(idx, day)| Some((day, read_value(&lines[idx])?)))
        .collect()
}

/// Removes a day plan unless a weekday still uses it.
pub fn delete_day_plan(lines: &mut Vec<String>, preset: &str, key: &str) -> EditOutcome {
    if week_map_entries(lines, preset)
        .iter()
        .any(|(_, plan)| plan == key)
    {
        return EditOutcome::NoOp(NoOpReason::StillReferenced(key.to_string()));
    }
    delete_section(lines, &with(&timeline_path(preset), &[DAY_PLANS_KEY, key]), None)
}

/// Points `weekday` at an existing day plan.
pub fn assign_day(lines: &mut Vec<String>, preset: &str, weekday: u8, plan: &str) -> EditOutcome {
    if !(1..=7).contains(&weekday) {
        return EditOutcome::NoOp(NoOpReason::IndexOutOfRange(usize::from(weekday)));
    }
    let base = timeline_path(preset);
    let plans_exist = find_path(lines, &with(&base, &[DAY_PLANS_KEY])).is_some_and(|span| {
        find_child_key(lines, span.start, span.end, span.indent, plan).is_some()
    });
    if !plans_exist {
        return EditOutcome::NoOp(NoOpReason::SectionNotFound(plan.to_string()));
    }
    let day = weekday.to_string();
    set_field(
        lines,
        &with(&base, &[WEEK_MAP_KEY]),
        &[day.as_str()],
        &ScalarValue::Str(plan.to_string()),
        SetMode::Upsert,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn load(text: &str) -> ScheduleDocument {
        let value: Value = serde_yaml::from_str(text).expect("yaml");
        ScheduleDocument::from_value(&value).expect("schedule")
    }

    const SCHEDULE: &str = "\
presets:
  always_on:
    default:
      collect: true
      push: true
      report_mode: current
    periods: {}
    day_plans:
      all_day:
        periods: []
    week_map:
      1: all_day
      2: all_day
      3: all_day
      4: all_day
      5: all_day
      6: all_day
      7: all_day
custom:
  default:
    collect: true
    analyze: false
    push: false
    report_mode: current
    ai_mode: follow_report
    once:
      analyze: false
      push: false
  periods:
    # before work
    morning:
      name: \"Morning brief\"
      start: \"07:00\"
      end: \"09:00\"
      push: true
      report_mode: daily
      once:
        push: true
    night:
      start: \"22:00\"
      end: \"06:00\"
      collect: false
  day_plans:
    workday:
      periods: [morning, night]
    weekend:
      periods:
        - night
  week_map:
    1: workday
    2: workday
    3: workday
    4: workday
    5: workday
    6: weekend
    7: weekend
";

    #[test]
    fn valid_schedule_has_no_issues() {
        let doc = load(SCHEDULE);
        for (name, timeline) in doc.timelines() {
            assert!(validate(timeline).is_empty(), "{name}: {:?}", validate(timeline));
        }
    }

    #[test]
    fn unknown_preset_lists_choices() {
        let doc = load(SCHEDULE);
        let err = doc.timeline("night_owl").expect_err("unknown");
        assert_eq!(
            err.to_string(),
            "unknown preset 'night_owl' (available: always_on, custom)"
        );
    }

    #[test]
    fn resolves_period_with_merged_once() {
        let doc = load(SCHEDULE);
        let timeline = doc.timeline("custom").expect("custom");
        let resolved = resolve(timeline, 2, "08:15").expect("resolve");
        assert_eq!(resolved.period_key.as_deref(), Some("morning"));
        assert_eq!(resolved.period_name.as_deref(), Some("Morning brief"));
        assert!(resolved.push);
        assert_eq!(resolved.report_mode, "daily");
        assert_eq!(resolved.ai_mode, "daily");
        assert!(resolved.once_push);
        assert!(!resolved.once_analyze);
    }

    #[test]
    fn cross_midnight_period_matches_early_morning() {
        let doc = load(SCHEDULE);
        let timeline = doc.timeline("custom").expect("custom");
        let resolved = resolve(timeline, 7, "03:30").expect("resolve");
        assert_eq!(resolved.day_plan, "weekend");
        assert_eq!(resolved.period_key.as_deref(), Some("night"));
        assert!(!resolved.collect);
        let idle = resolve(timeline, 7, "12:00").expect("resolve");
        assert_eq!(idle.period_key, None);
        assert!(idle.collect);
        assert_eq!(idle.ai_mode, "current");
    }

    #[test]
    fn overlap_is_reported_or_last_wins() {
        let mut timeline = load(SCHEDULE).custom.expect("custom");
        if let Some(periods) = timeline.periods.as_mut() {
            if let Some(night) = periods.get_mut("night") {
                night.start = Some("08:30".into());
            }
        }
        assert!(
            validate(&timeline)
                .iter()
                .any(|issue| matches!(issue, ScheduleIssue::Overlap { .. }))
        );
        assert!(matches!(
            resolve(&timeline, 1, "08:45"),
            Err(ScheduleIssue::ActiveOverlap { .. })
        ));
        timeline.overlap.policy = OverlapPolicy::LastWins;
        assert!(validate(&timeline).is_empty());
        let resolved = resolve(&timeline, 1, "08:45").expect("resolve");
        assert_eq!(resolved.period_key.as_deref(), Some("night"));
    }

    #[test]
    fn validation_collects_every_issue() {
        let timeline: Timeline = serde_yaml::from_str(
            "default: {}\nperiods:\n  bad:\n    start: \"7:00\"\n    end: \"25:00\"\n  same:\n    start: \"10:00\"\n    end: \"10:00\"\nday_plans:\n  d:\n    periods: [ghost]\nweek_map:\n  1: d\n  2: missing\n",
        )
        .expect("timeline");
        let issues = validate(&timeline);
        assert!(issues.contains(&ScheduleIssue::UnmappedDay { day: 7 }));
        assert!(issues.contains(&ScheduleIssue::UnknownDayPlan {
            day: 2,
            plan: "missing".into()
        }));
        assert!(issues.contains(&ScheduleIssue::UnknownPeriod {
            plan: "d".into(),
            period: "ghost".into()
        }));
        assert!(issues.contains(&ScheduleIssue::BadTime {
            field: "bad.start".into(),
            value: "7:00".into()
        }));
        assert!(issues.contains(&ScheduleIssue::TimeOutOfRange {
            field: "bad.end".into(),
            value: "25:00".into()
        }));
        assert!(issues.contains(&ScheduleIssue::EmptyRange {
            period: "same".into(),
            at: "10:00".into()
        }));
    }

    #[test]
    fn deleting_period_cascades_into_both_list_styles() {
        let mut doc = lines(SCHEDULE);
        assert!(delete_period(&mut doc, "custom", "night").is_applied());
        let text = doc.join("\n");
        assert!(text.contains("      periods: [morning]"));
        assert!(!text.contains("- night"));
        assert!(text.contains("    # before work"));
        let timeline = load(&text).custom.expect("custom");
        assert!(dangling_references(&timeline).is_empty());
        assert!(!timeline.periods.expect("periods").contains_key("night"));
    }

    #[test]
    fn adds_period_into_empty_preset_map() {
        let mut doc = lines(SCHEDULE);
        assert!(add_period(&mut doc, "always_on", "lunch", "Lunch", "12:00", "13:00").is_applied());
        let text = doc.join("\n");
        assert!(text.contains(
            "    periods:\n      lunch:\n        name: Lunch\n        start: \"12:00\"\n        end: \"13:00\"\n    day_plans:"
        ));
        let timeline = load(&text).presets.remove("always_on").expect("preset");
        assert_eq!(
            timeline.periods.expect("periods")["lunch"].start.as_deref(),
            Some("12:00")
        );
    }

    #[test]
    fn rejects_invalid_period_times() {
        let mut doc = lines(SCHEDULE);
        let before = doc.clone();
        let outcome = add_period(&mut doc, "custom", "x", "X", "24:00", "01:00");
        assert!(matches!(outcome, EditOutcome::NoOp(NoOpReason::Incompatible(_))));
        assert_eq!(doc, before);
    }

    #[test]
    fn day_plan_lifecycle() {
        let mut doc = lines(SCHEDULE);
        assert!(add_day_plan(&mut doc, "custom", "holiday").is_applied());
        assert!(doc.join("\n").contains("    holiday:\n      periods: []"));
        assert!(assign_day(&mut doc, "custom", 6, "holiday").is_applied());
        assert_eq!(
            delete_day_plan(&mut doc, "custom", "holiday"),
            EditOutcome::NoOp(NoOpReason::StillReferenced("holiday".into()))
        );
        assert!(assign_day(&mut doc, "custom", 6, "weekend").is_applied());
        assert!(delete_day_plan(&mut doc, "custom", "holiday").is_applied());
        let timeline = load(&doc.join("\n")).custom.expect("custom");
        assert!(validate(&timeline).is_empty());
    }
}

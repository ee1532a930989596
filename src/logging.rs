use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::EditOutcome;

pub const DEFAULT_LOG_DIR: &str = ".confkeep";
const LOG_FILE: &str = "edit_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSpanKind {
    Added,
    Removed,
    Changed,
}

/// A run of lines touched by an edit, 1-based on the new text (on the old
/// text for removals).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub kind: LineSpanKind,
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    pub fn describe(&self) -> String {
        let end = self.start + self.len.saturating_sub(1);
        let range = if self.len <= 1 {
            format!("{}", self.start)
        } else {
            format!("{}-{end}", self.start)
        };
        let sign = match self.kind {
            LineSpanKind::Added => '+',
            LineSpanKind::Removed => '-',
            LineSpanKind::Changed => '~',
        };
        format!("{sign}{range}")
    }
}

pub fn describe_spans(spans: &[LineSpan]) -> String {
    if spans.is_empty() {
        return "-".to_string();
    }
    spans
        .iter()
        .map(LineSpan::describe)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLogEntry {
    pub timestamp: String,
    pub document: String,
    pub operation: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "lines", default)]
    pub spans: Vec<LineSpan>,
}

/// Append-only JSONL record of every edit request, kept to the last 500.
#[derive(Clone, Debug)]
pub struct EditLog {
    dir: PathBuf,
}

impl EditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn record(
        &self,
        document: &str,
        operation: &str,
        outcome: &EditOutcome,
        spans: &[LineSpan],
    ) -> Result<()> {
        let log_path = self.ensure_log_file()?;
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = EditLogEntry {
            timestamp,
            document: document.to_string(),
            operation: operation.to_string(),
            outcome: outcome.label().to_string(),
            reason: match outcome {
                EditOutcome::Applied => None,
                EditOutcome::NoOp(reason) => Some(reason.to_string()),
            },
            spans: spans.to_vec(),
        };
        let json = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .with_context(|| format!("opening {log_path:?}"))?;
        writeln!(file, "{json}")?;
        truncate_log(&log_path)?;
        Ok(())
    }

    pub fn read_recent(&self, tail: usize) -> Result<Vec<EditLogEntry>> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(tail);
        Ok(entries.split_off(skip))
    }

    pub fn read_all(&self) -> Result<Vec<EditLogEntry>> {
        let log_path = self.path();
        if !log_path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new()
            .read(true)
            .open(&log_path)
            .with_context(|| format!("reading {log_path:?}"))?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => eprintln!("warning: skipping unreadable log line: {err}"),
            }
        }
        Ok(entries)
    }

    fn ensure_log_file(&self) -> Result<PathBuf> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).with_context(|| format!("creating {:?}", self.dir))?;
        }
        Ok(self.path())
    }
}

fn truncate_log(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoOpReason;
    use tempfile::tempdir;

    #[test]
    fn records_and_reads_back() {
        let temp = tempdir().expect("temp dir");
        let log = EditLog::new(temp.path().join("logs"));
        let span = LineSpan {
            kind: LineSpanKind::Changed,
            start: 4,
            len: 1,
        };
        log.record("settings", "set", &EditOutcome::Applied, &[span])
            .expect("record");
        log.record(
            "settings",
            "set",
            &EditOutcome::NoOp(NoOpReason::FieldNotFound("app.port".into())),
            &[],
        )
        .expect("record");

        let entries = log.read_recent(10).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, "applied");
        assert_eq!(entries[0].spans, vec![span]);
        assert_eq!(entries[1].outcome, "no-op");
        assert_eq!(entries[1].reason.as_deref(), Some("field app.port not found"));
    }

    #[test]
    fn keeps_only_the_newest_entries() {
        let temp = tempdir().expect("temp dir");
        let log = EditLog::new(temp.path());
        for _ in 0..MAX_ENTRIES + 5 {
            log.record("rules", "add_keyword", &EditOutcome::Applied, &[])
                .expect("record");
        }
        assert_eq!(log.read_all().expect("read").len(), MAX_ENTRIES);
        assert_eq!(log.read_recent(3).expect("read").len(), 3);
    }

    #[test]
    fn span_descriptions() {
        let spans = [
            LineSpan {
                kind: LineSpanKind::Added,
                start: 3,
                len: 2,
            },
            LineSpan {
                kind: LineSpanKind::Removed,
                start: 9,
                len: 1,
            },
        ];
        assert_eq!(describe_spans(&spans), "+3-4,-9");
        assert_eq!(describe_spans(&[]), "-");
    }
}

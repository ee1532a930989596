use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{document} document is malformed: {message}")]
    Malformed { document: String, message: String },

    #[error("fetching {location} failed: {message}")]
    Fetch { location: String, message: String },

    #[error("store write for {key} failed: {message}")]
    Store { key: String, message: String },
}

/// Result of a write request. Missing targets never raise; they come back as
/// a no-op with the reason so the caller can tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied,
    NoOp(NoOpReason),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EditOutcome::Applied => "applied",
            EditOutcome::NoOp(_) => "no-op",
        }
    }
}

impl fmt::Display for EditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOutcome::Applied => f.write_str("applied"),
            EditOutcome::NoOp(reason) => write!(f, "no-op ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum NoOpReason {
    SectionNotFound(String),
    FieldNotFound(String),
    NotAScalar(String),
    NotAList(String),
    KeyExists(String),
    ItemPresent(String),
    ItemAbsent(String),
    IndexOutOfRange(usize),
    GroupNotFound(usize),
    Incompatible(String),
    StillReferenced(String),
    Unchanged,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoOpReason::SectionNotFound(path) => write!(f, "section {path} not found"),
            NoOpReason::FieldNotFound(path) => write!(f, "field {path} not found"),
            NoOpReason::NotAScalar(path) => write!(f, "{path} holds a block, not a scalar"),
            NoOpReason::NotAList(path) => write!(f, "{path} is not a list"),
            NoOpReason::KeyExists(key) => write!(f, "{key} already exists"),
            NoOpReason::ItemPresent(item) => write!(f, "{item} is already listed"),
            NoOpReason::ItemAbsent(item) => write!(f, "{item} is not listed"),
            NoOpReason::IndexOutOfRange(idx) => write!(f, "index {idx} is out of range"),
            NoOpReason::GroupNotFound(idx) => write!(f, "group {idx} does not exist"),
            NoOpReason::Incompatible(detail) => f.write_str(detail),
            NoOpReason::StillReferenced(key) => write!(f, "{key} is still referenced"),
            NoOpReason::Unchanged => f.write_str("value unchanged"),
        }
    }
}

//! Format-preserving edits for indented configuration documents and
//! keyword rule files. Every write touches only the lines it targets, so
//! comments, quoting, key order and line endings survive.

pub mod config;
pub mod diff;
pub mod error;
pub mod files;
pub mod lines;
pub mod logging;
pub mod navigator;
pub mod plan;
pub mod remote;
pub mod rules;
pub mod scalar;
pub mod schedule;
pub mod sections;
pub mod session;
pub mod store;

pub use error::{DocumentError, EditOutcome, NoOpReason};
pub use lines::{LineEnding, LineSequence};
pub use rules::{RuleDocument, RuleEdit};
pub use scalar::ScalarValue;
pub use session::{DocumentEdit, EditSession, ReadModel, YamlView};

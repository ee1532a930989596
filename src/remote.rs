//! Fetching a document from elsewhere. Every fetch carries a ticket; only the
//! most recently issued ticket may replace the live text.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DocumentError;

pub trait RemoteSource {
    fn fetch(&self, location: &str) -> Result<String, DocumentError>;
}

fn fetch_error(location: &str, message: impl Into<String>) -> DocumentError {
    DocumentError::Fetch {
        location: location.to_string(),
        message: message.into(),
    }
}

#[derive(Debug)]
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("confkeep/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl RemoteSource for HttpSource {
    fn fetch(&self, location: &str) -> Result<String, DocumentError> {
        let resp = self.agent.get(location).call().map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                fetch_error(location, format!("HTTP {code}: {}", body.trim()))
            }
            other => fetch_error(location, other.to_string()),
        })?;
        resp.into_string()
            .map_err(|err| fetch_error(location, format!("reading body: {err}")))
    }
}

/// Reads documents from disk, relative to `root` when one is set.
#[derive(Clone, Debug, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl RemoteSource for FileSource {
    fn fetch(&self, location: &str) -> Result<String, DocumentError> {
        let path = match &self.root {
            Some(root) => root.join(location),
            None => PathBuf::from(location),
        };
        fs::read_to_string(&path).map_err(|err| fetch_error(location, err.to_string()))
    }
}

/// Picks the source for a location: `http(s)://` goes over the network.
pub fn source_for(location: &str, timeout: Duration) -> Box<dyn RemoteSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpSource::new(timeout))
    } else {
        Box::new(FileSource::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
pub struct FetchTracker {
    latest: u64,
}

impl FetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fetch; any ticket handed out before this one goes stale.
    pub fn issue(&mut self) -> FetchTicket {
        self.latest += 1;
        FetchTicket(self.latest)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_latest_ticket_is_current() {
        let mut tracker = FetchTracker::new();
        let first = tracker.issue();
        assert!(tracker.is_current(first));
        let second = tracker.issue();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn file_source_reads_relative_to_root() {
        let temp = tempdir().expect("temp dir");
        fs::write(temp.path().join("rules.txt"), "foo\n").expect("seed");
        let source = FileSource::new(Some(temp.path().to_path_buf()));
        assert_eq!(source.fetch("rules.txt").expect("fetch"), "foo\n");
        assert!(matches!(
            source.fetch("missing.txt"),
            Err(DocumentError::Fetch { .. })
        ));
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::logging::DEFAULT_LOG_DIR;
use crate::schedule::CUSTOM_KEY;

pub const DEFAULT_CONFIG: &str = "confkeep.yaml";
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// The three documents an editing surface works on.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Settings,
    Rules,
    Schedule,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Settings => "settings",
            DocumentKind::Rules => "rules",
            DocumentKind::Schedule => "schedule",
        }
    }

    fn default_file(self) -> &'static str {
        match self {
            DocumentKind::Settings => "settings.yaml",
            DocumentKind::Rules => "rules.txt",
            DocumentKind::Schedule => "schedule.yaml",
        }
    }
}

/// Where `pull` fetches each document from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Sources {
    pub settings: Option<String>,
    pub rules: Option<String>,
    pub schedule: Option<String>,
}

impl Sources {
    pub fn get(&self, kind: DocumentKind) -> Option<&str> {
        match kind {
            DocumentKind::Settings => self.settings.as_deref(),
            DocumentKind::Rules => self.rules.as_deref(),
            DocumentKind::Schedule => self.schedule.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub settings: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub schedule: Option<PathBuf>,
    /// JSON key/value store mirroring the saved documents.
    pub store: Option<PathBuf>,
    pub debounce_ms: u64,
    pub log_dir: Option<PathBuf>,
    pub backup: bool,
    /// Timeline used by `check` and `add-period` when none is given.
    pub preset: String,
    pub fetch_timeout_secs: u64,
    pub sources: Sources,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: None,
            rules: None,
            schedule: None,
            store: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_dir: None,
            backup: true,
            preset: CUSTOM_KEY.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            sources: Sources::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Path of a document, relative paths taken from the config's directory.
    pub fn document_path(&self, kind: DocumentKind) -> PathBuf {
        let configured = match kind {
            DocumentKind::Settings => self.settings.as_deref(),
            DocumentKind::Rules => self.rules.as_deref(),
            DocumentKind::Schedule => self.schedule.as_deref(),
        };
        self.resolve(configured.unwrap_or_else(|| Path::new(kind.default_file())))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(
            self.log_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR)),
        )
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        self.store.as_deref().map(|path| self.resolve(path))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Loads `path`, or `confkeep.yaml` in the working directory when present.
/// With neither, every setting takes its default.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG);
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };
    let data = fs::read(&path).with_context(|| format!("reading config {}", path.display()))?;
    let mut config: Config = if is_json(&path) {
        serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?
    } else if data.iter().all(u8::is_ascii_whitespace) {
        Config::default()
    } else {
        serde_yaml::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?
    };
    config.base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(config)
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn yaml_config_resolves_relative_paths() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("confkeep.yaml");
        fs::write(
            &path,
            "rules: conf/frequency_words.txt\ndebounce_ms: 200\nbackup: false\npreset: office\n",
        )
        .expect("seed");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(
            config.document_path(DocumentKind::Rules),
            temp.path().join("conf/frequency_words.txt")
        );
        assert_eq!(
            config.document_path(DocumentKind::Schedule),
            temp.path().join("schedule.yaml")
        );
        assert_eq!(config.debounce(), Duration::from_millis(200));
        assert!(!config.backup);
        assert_eq!(config.preset, "office");
        assert_eq!(config.log_dir(), temp.path().join(DEFAULT_LOG_DIR));
    }

    #[test]
    fn json_config_is_picked_by_extension() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("confkeep.json");
        fs::write(
            &path,
            r#"{"store": "state.json", "sources": {"rules": "https://example.invalid/rules.txt"}}"#,
        )
        .expect("seed");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.store_path(), Some(temp.path().join("state.json")));
        assert_eq!(
            config.sources.get(DocumentKind::Rules),
            Some("https://example.invalid/rules.txt")
        );
        assert_eq!(config.sources.get(DocumentKind::Settings), None);
        assert!(config.backup);
    }

    #[test]
    fn bad_values_report_the_config_path() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("confkeep.yaml");
        fs::write(&path, "debounce_ms: soon\n").expect("seed");
        let err = load_config(Some(&path)).expect_err("bad value");
        assert!(format!("{err:#}").contains("parsing config"));
    }
}

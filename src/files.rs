use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::diff::undo_patch;

/// Reads a document; a missing file reads as empty text.
pub fn read_document(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
    }
}

#[derive(Clone, Debug, Default)]
pub struct WriteOptions<'a> {
    pub no_backup: bool,
    pub undo_log: Option<&'a Path>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub backup: Option<PathBuf>,
    pub undo_patch: Option<PathBuf>,
}

/// Replaces `path` with `new_text`, keeping a `.bak` copy of the old file and
/// an optional reverse patch.
pub fn write_document(
    path: &Path,
    old_text: &str,
    new_text: &str,
    options: &WriteOptions<'_>,
) -> Result<WriteReport> {
    let undo_patch = match options.undo_log {
        Some(dir) => Some(write_undo_patch(dir, path, old_text, new_text)?),
        None => None,
    };
    let backup = create_backup_if_needed(path, options.no_backup)?;
    write_via_temp(path, new_text.as_bytes())?;
    Ok(WriteReport { backup, undo_patch })
}

pub fn create_backup_if_needed(path: &Path, no_backup: bool) -> Result<Option<PathBuf>> {
    if no_backup || !path.exists() {
        return Ok(None);
    }

    let mut attempt = 0usize;
    loop {
        let candidate = backup_candidate(path, attempt);
        if !candidate.exists() {
            fs::copy(path, &candidate)
                .with_context(|| format!("creating backup {}", candidate.display()))?;
            return Ok(Some(candidate));
        }
        attempt += 1;
    }
}

fn backup_candidate(path: &Path, index: usize) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("confkeep_document");
    let suffix = if index == 0 {
        ".bak".to_string()
    } else {
        format!(".bak{index}")
    };
    path.with_file_name(format!("{name}{suffix}"))
}

pub fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    }
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".confkeep-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

fn write_undo_patch(dir: &Path, path: &Path, old_text: &str, new_text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating undo dir {}", dir.display()))?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let file_name = format!("{}_{}.patch", sanitize(&timestamp), sanitize_path(path));
    let patch_path = dir.join(file_name);
    fs::write(&patch_path, undo_patch(old_text, new_text))
        .with_context(|| format!("writing undo patch {}", patch_path.display()))?;
    Ok(patch_path)
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => ch,
        })
        .collect()
}

fn sanitize_path(path: &Path) -> String {
    sanitize(&path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_keeps_numbered_backups() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(&path, "a: 1\n").expect("seed");

        let first = write_document(&path, "a: 1\n", "a: 2\n", &WriteOptions::default())
            .expect("write");
        assert_eq!(first.backup, Some(temp.path().join("config.yaml.bak")));
        let second = write_document(&path, "a: 2\n", "a: 3\n", &WriteOptions::default())
            .expect("write");
        assert_eq!(second.backup, Some(temp.path().join("config.yaml.bak1")));
        assert_eq!(fs::read_to_string(&path).expect("read"), "a: 3\n");
        assert_eq!(
            fs::read_to_string(temp.path().join("config.yaml.bak")).expect("read"),
            "a: 1\n"
        );
    }

    #[test]
    fn undo_patch_lands_in_log_dir() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("rules.txt");
        let undo = temp.path().join("undo");
        let options = WriteOptions {
            no_backup: true,
            undo_log: Some(&undo),
        };
        let report = write_document(&path, "", "foo\n", &options).expect("write");
        assert_eq!(report.backup, None);
        let patch = report.undo_patch.expect("patch path");
        assert!(patch.starts_with(&undo));
        assert!(fs::read_to_string(patch).expect("read").contains("-foo"));
    }

    #[test]
    fn missing_document_reads_empty() {
        let temp = tempdir().expect("temp dir");
        assert_eq!(read_document(&temp.path().join("nope.yaml")).expect("read"), "");
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_path(Path::new("a/b:c.txt")), "a_b_c.txt");
    }
}

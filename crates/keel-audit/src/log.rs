// log.rs - Append-only JSONL audit log.
//
// Line N stores, in `previous_hash`, the SHA-256 of the raw text of line
// N-1 (the first line stores none). Hashing the stored text rather than a
// re-serialization keeps verification independent of field order.
//
//   {"action":"package_compiled", ..., "previous_hash":null}
//   {"action":"gate_evaluated",   ..., "previous_hash":"3f1c..."}

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

pub struct AuditLog {
    file: File,
    path: PathBuf,
    /// Hash of the tail line; the next event links to it.
    tail: Option<String>,
}

impl AuditLog {
    /// Open or create the log at `path`, creating parent directories. An
    /// existing log is continued from its last line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                std::fs::create_dir_all(dir).map_err(|source| AuditError::OpenFailed {
                    path: dir.to_path_buf(),
                    source,
                })?
            }
            _ => {}
        }

        let tail = if path.exists() {
            lines(&path)?.last().map(|line| hasher::hash_str(line))
        } else {
            None
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self { file, path, tail })
    }

    /// Link `event` to the tail and write it as one line.
    pub fn append(&mut self, event: &mut AuditEvent) -> Result<(), AuditError> {
        event.previous_hash = self.tail.clone();
        let line = serde_json::to_string(event)?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(&line);
        record.push('\n');
        self.file.write_all(record.as_bytes())?;
        self.file.flush()?;

        self.tail = Some(hasher::hash_str(&line));
        Ok(())
    }

    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        lines(path.as_ref())?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }

    /// Check every link. Returns the number of events verified, or an
    /// `IntegrityViolation` for the first line whose link is wrong.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let lines = lines(path.as_ref())?;
        let mut expected: Option<String> = None;

        for (index, line) in lines.iter().enumerate() {
            let event: AuditEvent = serde_json::from_str(line)?;
            if event.previous_hash != expected {
                let show = |h: Option<String>| h.unwrap_or_else(|| "none".to_string());
                return Err(AuditError::IntegrityViolation {
                    line: index + 1,
                    expected: show(expected),
                    actual: show(event.previous_hash),
                });
            }
            expected = Some(hasher::hash_str(line));
        }
        Ok(lines.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blank lines of the file, in order.
fn lines(path: &Path) -> Result<Vec<String>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            out.push(line);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditAction;

    fn write_events(path: &Path, actions: &[AuditAction]) {
        let mut log = AuditLog::open(path).unwrap();
        for action in actions {
            let mut event = AuditEvent::new("gate-evaluator", *action).with_project("payments-api");
            log.append(&mut event).unwrap();
        }
    }

    #[test]
    fn events_are_linked_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        write_events(&path, &[AuditAction::PackageCompiled, AuditAction::GateEvaluated]);

        let events = AuditLog::read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::PackageCompiled);
        assert!(events[0].previous_hash.is_none());
        let first_line = std::fs::read_to_string(&path).unwrap().lines().next().unwrap().to_string();
        assert_eq!(events[1].previous_hash, Some(hasher::hash_str(&first_line)));
    }

    #[test]
    fn reopened_log_continues_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".keel").join("audit.jsonl");
        write_events(&path, &[AuditAction::ActionChecked]);
        write_events(&path, &[AuditAction::NetworkChecked, AuditAction::DiffChecked]);

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 3);
    }

    #[test]
    fn edited_line_breaks_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        write_events(&path, &[AuditAction::ActionChecked; 3]);

        let content = std::fs::read_to_string(&path).unwrap();
        let edited = content.replacen("action_checked", "network_checked", 1);
        std::fs::write(&path, edited).unwrap();

        match AuditLog::verify_chain(&path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn missing_log_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AuditLog::verify_chain(dir.path().join("absent.jsonl")),
            Err(AuditError::OpenFailed { .. })
        ));
    }
}

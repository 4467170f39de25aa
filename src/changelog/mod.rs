//! Changelog
//!
//! Append-only record of a resource's commits, stored as JSON Lines in
//! `<resource>/changelog`. Line order is commit order. A final line without a
//! newline is a torn append: readers skip it and the next append cuts it off.

pub mod graph;

use crate::error::StorageError;
use crate::types::RevisionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub use graph::{Rejection, SupplantGraph};

/// File name of the changelog inside a resource directory.
pub const CHANGELOG_FILE_NAME: &str = "changelog";

/// One accepted commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub revision: RevisionId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub supplants: Vec<RevisionId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Changelog {
    path: PathBuf,
    sync: bool,
}

impl Changelog {
    pub fn new(resource_dir: &Path, sync: bool) -> Self {
        Self {
            path: resource_dir.join(CHANGELOG_FILE_NAME),
            sync,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one commit as a single line.
    ///
    /// Callers must hold the resource lock; the changelog itself does not check.
    pub fn append(&self, commit: &Commit) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(commit)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| StorageError::from_io(e, self.path.display()))?;
        self.truncate_torn_tail(&mut file)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&line)?;
        if self.sync {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Lazily iterate commits from the start of the file.
    pub fn iter(&self) -> Result<HistoryIter, StorageError> {
        let reader = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StorageError::IoError(e)),
        };
        Ok(HistoryIter {
            path: self.path.clone(),
            reader,
            line_no: 0,
        })
    }

    /// All commits, in order.
    pub fn load(&self) -> Result<Vec<Commit>, StorageError> {
        self.iter()?.collect()
    }

    /// Rebuild the supplant graph from disk.
    pub fn graph(&self) -> Result<SupplantGraph, StorageError> {
        let mut graph = SupplantGraph::new();
        for commit in self.iter()? {
            graph.push(&commit?);
        }
        Ok(graph)
    }

    fn truncate_torn_tail(&self, file: &mut File) -> Result<(), StorageError> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let mut content = Vec::with_capacity(len as usize);
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut content)?;
        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos as u64 + 1)
            .unwrap_or(0);
        tracing::warn!(
            path = %self.path.display(),
            dropped_bytes = len - keep,
            "Truncating torn changelog tail"
        );
        file.set_len(keep)?;
        Ok(())
    }
}

/// Restartable view over a changelog; each `iter()` starts from the top.
#[derive(Debug, Clone)]
pub struct History {
    changelog: Changelog,
}

impl History {
    pub(crate) fn new(changelog: Changelog) -> Self {
        Self { changelog }
    }

    pub fn iter(&self) -> Result<HistoryIter, StorageError> {
        self.changelog.iter()
    }
}

/// Streaming commit iterator.
#[derive(Debug)]
pub struct HistoryIter {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    line_no: usize,
}

impl Iterator for HistoryIter {
    type Item = Result<Commit, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            let mut line = Vec::new();
            let read = match reader.read_until(b'\n', &mut line) {
                Ok(n) => n,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(StorageError::IoError(e)));
                }
            };
            if read == 0 {
                self.reader = None;
                return None;
            }
            self.line_no += 1;
            if line.last() != Some(&b'\n') {
                tracing::warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    "Ignoring torn changelog tail"
                );
                self.reader = None;
                return None;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(serde_json::from_slice(&line).map_err(|e| {
                self.reader = None;
                StorageError::Corrupt {
                    path: self.path.clone(),
                    reason: format!("line {}: {}", self.line_no, e),
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identifier;
    use std::fs;
    use tempfile::TempDir;

    fn commit(supplants: &[RevisionId]) -> Commit {
        Commit {
            revision: Identifier::random(),
            content_type: Some("text/plain".to_string()),
            supplants: supplants.to_vec(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), true);
        assert!(log.load().unwrap().is_empty());
        assert!(log.graph().unwrap().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), true);
        let first = commit(&[]);
        let second = commit(&[first.revision]);
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        assert_eq!(log.load().unwrap(), vec![first.clone(), second.clone()]);
        let graph = log.graph().unwrap();
        assert_eq!(graph.head(), Some(second.revision));
        assert_eq!(graph.leaves(), vec![second.revision]);
    }

    #[test]
    fn test_record_format() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), false);
        let c = commit(&[]);
        log.append(&c).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["revision"], c.revision.to_string());
        assert_eq!(value["type"], "text/plain");
        assert_eq!(value["supplants"], serde_json::json!([]));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_history_is_restartable() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), false);
        log.append(&commit(&[])).unwrap();
        let history = History::new(log.clone());

        let first: Vec<_> = history.iter().unwrap().map(Result::unwrap).collect();
        let second: Vec<_> = history.iter().unwrap().map(Result::unwrap).collect();
        assert_eq!(first, second);

        log.append(&commit(&[first[0].revision])).unwrap();
        assert_eq!(history.iter().unwrap().count(), 2);
    }

    #[test]
    fn test_torn_tail_ignored_then_truncated() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), false);
        let first = commit(&[]);
        log.append(&first).unwrap();

        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(br#"{"revision":"abc"#).unwrap();
        drop(file);

        assert_eq!(log.load().unwrap(), vec![first.clone()]);

        let second = commit(&[first.revision]);
        log.append(&second).unwrap();
        assert_eq!(log.load().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_malformed_line_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let log = Changelog::new(temp.path(), false);
        fs::write(log.path(), b"not json\n").unwrap();
        assert!(matches!(log.load(), Err(StorageError::Corrupt { .. })));
    }
}

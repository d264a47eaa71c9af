use crate::storage::ExecutionResult;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{error, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Bounded, write-through log of execution results.
///
/// A single lock covers append, eviction and the snapshot write, so concurrent
/// connections can never interleave a truncation with a persist.
pub struct HistoryLedger {
    path: PathBuf,
    max_entries: usize,
    entries: Mutex<VecDeque<ExecutionResult>>,
}

impl HistoryLedger {
    pub fn new(path: PathBuf, max_entries: usize) -> Self {
        Self {
            path,
            max_entries: max_entries.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Start from the snapshot at `path`. A missing or unreadable snapshot
    /// starts empty.
    pub fn resume(path: PathBuf, max_entries: usize) -> Self {
        let mut ledger = Self::new(path, max_entries);
        if ledger.path.exists() {
            match load_snapshot(&ledger.path) {
                Ok(entries) => {
                    let mut entries: VecDeque<ExecutionResult> = entries.into();
                    while entries.len() > ledger.max_entries {
                        entries.pop_front();
                    }
                    ledger.entries = Mutex::new(entries);
                }
                Err(e) => warn!(path = %ledger.path.display(), "Ignoring unreadable history: {:#}", e),
            }
        }
        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, result: ExecutionResult) {
        let mut entries = self.entries.lock().await;
        entries.push_back(result);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        if let Err(e) = self.persist(&entries) {
            error!(path = %self.path.display(), "Failed to save command history: {:#}", e);
        }
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<ExecutionResult> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    // Whole-file rewrite through a temp file so readers never see a torn snapshot
    fn persist(&self, entries: &VecDeque<ExecutionResult>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir).context("Failed to create temp file")?;
        serde_json::to_writer_pretty(&mut tmp, entries).context("Failed to encode history")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

pub fn load_snapshot(path: &Path) -> Result<Vec<ExecutionResult>> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let entries = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn result(n: usize) -> ExecutionResult {
        ExecutionResult::success(format!("echo {}", n), format!("{}\n", n))
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_limit() {
        let dir = TempDir::new().unwrap();
        let ledger = HistoryLedger::new(dir.path().join("history.json"), 5);
        for n in 0..8 {
            ledger.record(result(n)).await;
            assert!(ledger.len().await <= 5);
        }
        let commands: Vec<String> = ledger.snapshot().await.into_iter().map(|r| r.command).collect();
        assert_eq!(commands, ["echo 3", "echo 4", "echo 5", "echo 6", "echo 7"]);
    }

    #[tokio::test]
    async fn default_limit_keeps_exactly_one_thousand() {
        let dir = TempDir::new().unwrap();
        let ledger = HistoryLedger::new(dir.path().join("history.json"), DEFAULT_MAX_ENTRIES);
        for n in 0..1003 {
            ledger.record(result(n)).await;
        }
        let entries = ledger.snapshot().await;
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].command, "echo 3");
        assert_eq!(entries[999].command, "echo 1002");
    }

    #[tokio::test]
    async fn snapshot_on_disk_matches_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("history.json");
        let ledger = HistoryLedger::new(path.clone(), 3);
        for n in 0..4 {
            ledger.record(result(n)).await;
        }
        ledger.record(ExecutionResult::failure("sleep 99", "Command timed out")).await;
        assert_eq!(load_snapshot(&path).unwrap(), ledger.snapshot().await);
    }

    #[tokio::test]
    async fn write_fault_keeps_memory_copy() {
        let dir = TempDir::new().unwrap();
        // A directory squatting on the target path makes every rename fail
        let path = dir.path().join("history.json");
        fs::create_dir(&path).unwrap();
        let ledger = HistoryLedger::new(path, 10);
        ledger.record(result(1)).await;
        ledger.record(result(2)).await;
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_records_are_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let ledger = Arc::new(HistoryLedger::new(path.clone(), 50));
        let mut handles = Vec::new();
        for n in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.record(result(n)).await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ledger.len().await, 20);
        assert_eq!(load_snapshot(&path).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn resume_loads_and_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let ledger = HistoryLedger::new(path.clone(), 10);
        for n in 0..6 {
            ledger.record(result(n)).await;
        }
        let resumed = HistoryLedger::resume(path, 4);
        let commands: Vec<String> = resumed.snapshot().await.into_iter().map(|r| r.command).collect();
        assert_eq!(commands, ["echo 2", "echo 3", "echo 4", "echo 5"]);
    }

    #[tokio::test]
    async fn resume_ignores_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").unwrap();
        let resumed = HistoryLedger::resume(path, 4);
        assert_eq!(resumed.len().await, 0);
    }
}

//! Bounded undo journal for organize runs.
//!
//! Each organize run that moved at least one file is stored as one
//! [`Transaction`] in its own slot file, `undo_000.json`, `undo_001.json`, ...
//! The lowest index is always the newest transaction, so a plain name sort
//! yields newest-first order without opening any file. Writing a new
//! transaction evicts the oldest one once the journal is full and shifts the
//! remaining slots up by one before storing the new one at index 0.
//!
//! Undoing pops the newest transaction and replays its moves backwards.

use crate::file_organizer::OperationRecord;
use crate::platform;
use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Number of transactions retained by default.
pub const MAX_UNDO: usize = 10;

static SLOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^undo_(\d{3,})\.json$").expect("valid slot name regex"));

/// Errors raised by the undo journal.
#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("journal I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal record {} is unreadable: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("failed to serialize journal record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid journal directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to move {} back to {}: {source}", from.display(), to.display())]
    RestoreFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One organize run: every move it made, in the order it made them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Local time the run finished.
    pub timestamp: NaiveDateTime,
    pub operations: Vec<OperationRecord>,
}

impl Transaction {
    pub fn new(operations: Vec<OperationRecord>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            operations,
        }
    }
}

/// Outcome of [`UndoJournal::undo_last`].
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Records whose file was moved back.
    pub restored: Vec<OperationRecord>,
    /// `to` paths that no longer existed and were skipped.
    pub skipped: Vec<PathBuf>,
    /// Files that occupied an original location and were renamed aside.
    pub backups: Vec<PathBuf>,
}

impl UndoReport {
    /// True when every record was restored.
    pub fn is_complete_success(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// On-disk journal of the most recent organize runs.
#[derive(Debug, Clone)]
pub struct UndoJournal {
    dir: PathBuf,
    capacity: usize,
}

impl UndoJournal {
    /// Journal stored in `dir`, holding up to [`MAX_UNDO`] transactions.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_capacity(dir, MAX_UNDO)
    }

    /// Journal holding up to `capacity` transactions (at least one).
    pub fn with_capacity(dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            dir: dir.into(),
            capacity: capacity.max(1),
        }
    }

    /// Journal in the per-user application directory.
    pub fn open_default() -> Self {
        Self::new(platform::undo_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("undo_{:03}.json", index))
    }

    /// Occupied slots, keyed by index (newest first when iterated).
    fn slots(&self) -> Result<BTreeMap<u32, PathBuf>, UndoError> {
        let mut slots = BTreeMap::new();
        if !self.dir.is_dir() {
            return Ok(slots);
        }

        let pattern = format!(
            "{}/undo_*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );

        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Ignoring unreadable journal entry: {}", e);
                    continue;
                }
            };
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(index) = SLOT_NAME
                .captures(name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
            {
                slots.insert(index, path);
            }
        }
        Ok(slots)
    }

    /// Number of stored transactions.
    pub fn len(&self) -> Result<usize, UndoError> {
        Ok(self.slots()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, UndoError> {
        Ok(self.slots()?.is_empty())
    }

    /// Wraps `operations` in a new transaction and writes it.
    pub fn record(&self, operations: Vec<OperationRecord>) -> Result<Transaction, UndoError> {
        let transaction = Transaction::new(operations);
        self.write(&transaction)?;
        Ok(transaction)
    }

    /// Stores `transaction` as the newest entry (index 0).
    ///
    /// When the journal is full the highest index is deleted first and is
    /// gone for good. If slot 0 is occupied, the contiguous run of slots
    /// starting at 0 is renamed `i -> i + 1`, oldest first, so no rename
    /// lands on an occupied name. A slot 0 left free by [`pop_latest`] is
    /// filled without shifting.
    ///
    /// [`pop_latest`]: UndoJournal::pop_latest
    pub fn write(&self, transaction: &Transaction) -> Result<PathBuf, UndoError> {
        // Serialized up front: a record that cannot be encoded leaves the
        // existing slots untouched.
        let content = serde_json::to_vec_pretty(transaction)?;

        fs::create_dir_all(&self.dir).map_err(|source| UndoError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut slots = self.slots()?;
        while slots.len() >= self.capacity {
            let Some((index, path)) = slots.pop_last() else {
                break;
            };
            fs::remove_file(&path).map_err(|source| UndoError::Io {
                path: path.clone(),
                source,
            })?;
            warn!("Undo journal full, discarded transaction at slot {}", index);
        }

        if slots.contains_key(&0) {
            let mut run_end = 0;
            while slots.contains_key(&(run_end + 1)) {
                run_end += 1;
            }
            for index in (0..=run_end).rev() {
                let from = self.slot_path(index);
                let to = self.slot_path(index + 1);
                fs::rename(&from, &to).map_err(|source| UndoError::Io { path: from, source })?;
            }
        }

        let path = self.slot_path(0);
        write_atomically(&content, &path)?;
        info!(
            "Recorded {} operations in {}",
            transaction.operations.len(),
            path.display()
        );
        Ok(path)
    }

    /// Newest stored transaction with its slot.
    fn latest(&self) -> Result<Option<(u32, PathBuf)>, UndoError> {
        Ok(self.slots()?.into_iter().next())
    }

    /// Reads the newest transaction without removing it.
    pub fn peek_latest(&self) -> Result<Option<Transaction>, UndoError> {
        match self.latest()? {
            Some((_, path)) => read_transaction(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Deletes the newest transaction. Remaining slots keep their indices.
    ///
    /// Returns false when the journal was empty.
    pub fn pop_latest(&self) -> Result<bool, UndoError> {
        match self.latest()? {
            Some((index, path)) => {
                fs::remove_file(&path).map_err(|source| UndoError::Io { path, source })?;
                debug!("Removed undo slot {}", index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All stored transactions, newest first, with their slot index.
    pub fn list(&self) -> Result<Vec<(u32, Transaction)>, UndoError> {
        self.slots()?
            .into_iter()
            .map(|(index, path)| read_transaction(&path).map(|t| (index, t)))
            .collect()
    }

    /// Deletes every stored transaction and returns how many there were.
    pub fn clear(&self) -> Result<usize, UndoError> {
        let slots = self.slots()?;
        for path in slots.values() {
            fs::remove_file(path).map_err(|source| UndoError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(slots.len())
    }

    /// Reverses the newest transaction and removes it from the journal.
    ///
    /// Records are replayed last-to-first. A record whose file is no longer
    /// at `to` is skipped. Missing parent directories of `from` are
    /// recreated; a file that has since appeared at `from` is renamed aside
    /// with a `.bak.<timestamp>` suffix.
    ///
    /// # Errors
    ///
    /// [`UndoError::NothingToUndo`] if the journal is empty. If a move back
    /// fails the transaction stays in the journal.
    pub fn undo_last(&self) -> Result<UndoReport, UndoError> {
        let Some((index, path)) = self.latest()? else {
            return Err(UndoError::NothingToUndo);
        };
        let transaction = read_transaction(&path)?;
        info!(
            "Undoing {} operations from {}",
            transaction.operations.len(),
            transaction.timestamp
        );

        let mut report = UndoReport::default();
        for operation in transaction.operations.iter().rev() {
            if !exists(&operation.to) {
                warn!(
                    "Skipping {}: no longer at its organized location",
                    operation.to.display()
                );
                report.skipped.push(operation.to.clone());
                continue;
            }

            if let Some(parent) = operation.from.parent() {
                fs::create_dir_all(parent).map_err(|source| UndoError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            if exists(&operation.from) {
                let backup = backup_path(&operation.from);
                fs::rename(&operation.from, &backup).map_err(|source| {
                    UndoError::RestoreFailed {
                        from: operation.from.clone(),
                        to: backup.clone(),
                        source,
                    }
                })?;
                warn!(
                    "{} was occupied, moved it to {}",
                    operation.from.display(),
                    backup.display()
                );
                report.backups.push(backup);
            }

            fs::rename(&operation.to, &operation.from).map_err(|source| {
                UndoError::RestoreFailed {
                    from: operation.to.clone(),
                    to: operation.from.clone(),
                    source,
                }
            })?;
            debug!(
                "Restored {} -> {}",
                operation.to.display(),
                operation.from.display()
            );
            report.restored.push(operation.clone());
        }

        self.pop_latest()?;
        debug!("Consumed undo slot {}", index);

        Ok(report)
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Example: `notes.txt` becomes `notes.txt.bak.20261017-143052`.
fn backup_path(original: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let file_name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    original.with_file_name(format!("{}.bak.{}", file_name, timestamp))
}

fn read_transaction(path: &Path) -> Result<Transaction, UndoError> {
    let content = fs::read_to_string(path).map_err(|source| UndoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| UndoError::CorruptRecord {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Writes to a sibling temp file and renames it over `path`.
fn write_atomically(content: &[u8], path: &Path) -> Result<(), UndoError> {
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|source| UndoError::Io {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| UndoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

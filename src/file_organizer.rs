/// Classification engine: sorts the files of one directory into category folders.
///
/// Only the immediate entries of the target directory are considered. Each
/// regular file is classified by its lowercase extension, its destination is
/// resolved against existing files, and the file is moved. Every completed
/// move is returned as an [`OperationRecord`] and the batch is written to the
/// undo journal as one transaction.
use crate::config::OrganizeConfig;
use crate::conflict::{self, ConflictError};
use crate::platform;
use crate::undo::{UndoError, UndoJournal, UndoReport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A single completed move.
///
/// `from` is where the file was before organizing, `to` is where it ended up
/// after conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A move that [`FileOrganizer::plan`] predicts, without touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub category: String,
    /// Destination before conflict resolution.
    pub destination: PathBuf,
    /// True if something already exists at `destination`.
    pub collides: bool,
}

/// Errors that can occur during file organization operations.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error("target directory {} does not exist or is not a directory", path.display())]
    InvalidTargetDir { path: PathBuf },

    #[error("failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("undo journal error: {0}")]
    Journal(#[from] UndoError),
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// A file selected for organizing.
struct Candidate {
    path: PathBuf,
    name: OsString,
    category: String,
}

/// Moves files into category folders and journals each batch.
#[derive(Debug, Clone)]
pub struct FileOrganizer {
    journal: UndoJournal,
}

impl FileOrganizer {
    pub fn new(journal: UndoJournal) -> Self {
        Self { journal }
    }

    pub fn journal(&self) -> &UndoJournal {
        &self.journal
    }

    /// Organizes `config.target_dir` and returns the moves performed.
    ///
    /// A non-empty batch is recorded as one undo transaction; an empty batch
    /// records nothing.
    ///
    /// # Errors
    ///
    /// A failed directory creation, overwrite deletion or move aborts the
    /// batch. Moves completed before the failure are not rolled back; they
    /// are still journaled so they can be undone.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyfolder::config::{validate_rules, CategoryRule, ConflictPolicy, ExclusionSet, Mode, OrganizeConfig};
    /// use tidyfolder::{FileOrganizer, UndoJournal};
    ///
    /// let rules = validate_rules(&[CategoryRule::new("Images", &[".jpg"])], &ExclusionSet::default()).unwrap();
    /// let config = OrganizeConfig::new("/home/me/Desktop", rules, Mode::Move, ConflictPolicy::Rename);
    /// let organizer = FileOrganizer::new(UndoJournal::open_default());
    ///
    /// match organizer.organize(&config) {
    ///     Ok(moves) => println!("Moved {} files", moves.len()),
    ///     Err(e) => eprintln!("Organization failed: {}", e),
    /// }
    /// ```
    pub fn organize(&self, config: &OrganizeConfig) -> OrganizeResult<Vec<OperationRecord>> {
        self.organize_with(config, |_| {})
    }

    /// Like [`organize`](Self::organize), calling `on_move` after each move.
    pub fn organize_with<F>(
        &self,
        config: &OrganizeConfig,
        mut on_move: F,
    ) -> OrganizeResult<Vec<OperationRecord>>
    where
        F: FnMut(&OperationRecord),
    {
        let config = &with_absolute_target(config)?;
        let candidates = collect_candidates(config)?;
        info!(
            "Organizing {} files in {} (mode: {}, on conflict: {})",
            candidates.len(),
            config.target_dir.display(),
            config.mode,
            config.conflict_policy
        );

        let mut operations = Vec::with_capacity(candidates.len());
        let mut outcome = Ok(());
        for candidate in &candidates {
            match move_candidate(config, candidate) {
                Ok(operation) => {
                    on_move(&operation);
                    operations.push(operation);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        if operations.is_empty() {
            return outcome.map(|()| operations);
        }

        match (outcome, self.journal.record(operations.clone())) {
            (Ok(()), Ok(_)) => Ok(operations),
            (Ok(()), Err(journal_error)) => Err(journal_error.into()),
            (Err(move_error), Ok(_)) => Err(move_error),
            (Err(move_error), Err(journal_error)) => {
                error!(
                    "Could not journal the {} moves completed before the failure: {}",
                    operations.len(),
                    journal_error
                );
                Err(move_error)
            }
        }
    }

    /// Reports what [`organize`](Self::organize) would do, without changes.
    pub fn plan(config: &OrganizeConfig) -> OrganizeResult<Vec<PlannedMove>> {
        let config = &with_absolute_target(config)?;
        let root = config.classification_root();
        let planned = collect_candidates(config)?
            .into_iter()
            .map(|candidate| {
                let destination = root.join(&candidate.category).join(&candidate.name);
                let collides = fs::symlink_metadata(&destination).is_ok();
                PlannedMove {
                    from: candidate.path,
                    category: candidate.category,
                    destination,
                    collides,
                }
            })
            .collect();
        Ok(planned)
    }

    /// Reverses the most recent organize run. See [`UndoJournal::undo_last`].
    pub fn undo_last(&self) -> Result<UndoReport, UndoError> {
        self.journal.undo_last()
    }
}

/// Counts moved files per category folder.
pub fn category_counts(operations: &[OperationRecord]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for operation in operations {
        let category = operation
            .to
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        *counts.entry(category).or_insert(0) += 1;
    }
    counts
}

/// Lowercase extension with its leading dot, or `""` when there is none.
pub fn normalized_extension(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => String::new(),
    }
}

/// Copy of `config` whose target directory is absolute, so every journaled
/// path stays valid whatever the working directory is at undo time.
fn with_absolute_target(config: &OrganizeConfig) -> OrganizeResult<OrganizeConfig> {
    let target_dir =
        std::path::absolute(&config.target_dir).map_err(|_| OrganizeError::InvalidTargetDir {
            path: config.target_dir.clone(),
        })?;
    Ok(OrganizeConfig {
        target_dir,
        ..config.clone()
    })
}

/// Lists the target's entries and keeps the ones that will be organized,
/// sorted by file name.
///
/// The listing is taken in full before anything moves, so folders created
/// while organizing are never revisited. Entries whose path is not valid
/// UTF-8 are skipped: the journal could not record them.
fn collect_candidates(config: &OrganizeConfig) -> OrganizeResult<Vec<Candidate>> {
    let target = &config.target_dir;
    if !target.is_dir() {
        return Err(OrganizeError::InvalidTargetDir {
            path: target.clone(),
        });
    }

    let entries = fs::read_dir(target).map_err(|source| OrganizeError::ReadDir {
        path: target.clone(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", target.display(), e);
                continue;
            }
        };
        let path = entry.path();

        if config.exclude_hidden && platform::is_hidden(&path) {
            debug!("Skipping hidden entry {}", path.display());
            continue;
        }

        // Follows symlinks: a link to a regular file is organized.
        let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        if path.to_str().is_none() {
            warn!("Skipping {}: name is not valid UTF-8", path.display());
            continue;
        }

        let extension = normalized_extension(&path);
        if config.exclusions.contains(&extension) {
            debug!("Skipping excluded {}", path.display());
            continue;
        }

        candidates.push(Candidate {
            category: config.rules.classify(&extension).to_string(),
            name: entry.file_name(),
            path,
        });
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

fn move_candidate(config: &OrganizeConfig, candidate: &Candidate) -> OrganizeResult<OperationRecord> {
    let category_dir = config.classification_root().join(&candidate.category);
    ensure_dir(&category_dir)?;

    let destination = conflict::resolve(&category_dir.join(&candidate.name), config.conflict_policy)?;

    fs::rename(&candidate.path, &destination).map_err(|source| OrganizeError::FileMoveFailure {
        from: candidate.path.clone(),
        to: destination.clone(),
        source,
    })?;
    debug!(
        "Moved {} -> {}",
        candidate.path.display(),
        destination.display()
    );

    Ok(OperationRecord {
        from: candidate.path.clone(),
        to: destination,
    })
}

/// Creates `dir` and any missing parents (the archive root included).
fn ensure_dir(dir: &Path) -> OrganizeResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| OrganizeError::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source,
    })
}

//! tidyfolder - sort the files of a directory into category folders
//!
//! This library classifies the immediate files of a directory by extension,
//! moves them into category folders (resolving name collisions by renaming
//! or overwriting), and records every run in a bounded undo journal so the
//! most recent runs can be reversed one at a time.

pub mod cli;
pub mod config;
pub mod conflict;
pub mod file_organizer;
pub mod logging;
pub mod output;
pub mod platform;
pub mod undo;

pub use config::{
    CategoryRule, ConfigError, ConflictPolicy, ExclusionSet, Mode, OrganizeConfig, RuleSet,
    Settings, validate_rules,
};
pub use file_organizer::{FileOrganizer, OperationRecord, OrganizeError, PlannedMove};
pub use undo::{Transaction, UndoError, UndoJournal, UndoReport};

pub use cli::{Cli, OrganizeCommand, run_cli};

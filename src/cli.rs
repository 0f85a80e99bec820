//! Command-line interface for tidyfolder.
//!
//! Settings come from the TOML settings file; `organize` flags override them
//! for a single run (or persistently with `--save`). The undo journal lives
//! in the per-user config directory unless `--journal-dir` is given.

use crate::config::{ConfigError, ConflictPolicy, Mode, Settings};
use crate::file_organizer::{FileOrganizer, OrganizeError, category_counts};
use crate::output::OutputFormatter;
use crate::platform;
use crate::undo::{UndoError, UndoJournal};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tidyfolder")]
#[command(author, version, long_about = None)]
#[command(about = "Sort the files of a directory into category folders by extension")]
pub struct Cli {
    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the undo journal
    #[arg(long, global = true, value_name = "DIR")]
    pub journal_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: OrganizeCommand,
}

/// Represents a CLI command to execute.
#[derive(Subcommand, Debug, Clone)]
pub enum OrganizeCommand {
    /// Sort the files of a directory into category folders
    Organize(OrganizeArgs),
    /// Reverse the most recent organize run
    Undo,
    /// Show the undo journal
    History {
        /// Delete every journal entry
        #[arg(long)]
        clear: bool,
    },
    /// Show where each extension will be sorted to
    Rules,
    /// Restore default settings
    Reset,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct OrganizeArgs {
    /// Directory to organize (defaults to the configured target)
    pub dir: Option<PathBuf>,

    /// Show what would be moved without changing anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// move: sort into an archive folder; inplace: sort inside the directory
    #[arg(long, value_name = "MODE")]
    pub mode: Option<Mode>,

    /// rename: add a numeric suffix; overwrite: replace the existing file
    #[arg(long, value_name = "POLICY")]
    pub on_conflict: Option<ConflictPolicy>,

    /// Archive folder name used in move mode
    #[arg(long, value_name = "NAME")]
    pub archive: Option<String>,

    /// Organize hidden files too
    #[arg(long)]
    pub include_hidden: bool,

    /// Persist the given options to the settings file
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error(transparent)]
    Undo(#[from] UndoError),
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(platform::settings_path)
    }

    fn journal(&self) -> UndoJournal {
        match &self.journal_dir {
            Some(dir) => UndoJournal::new(dir),
            None => UndoJournal::open_default(),
        }
    }
}

/// Runs the parsed command line.
pub fn run_cli(cli: &Cli) -> Result<(), CliError> {
    let settings_path = cli.settings_path();
    let organizer = FileOrganizer::new(cli.journal());

    match &cli.command {
        OrganizeCommand::Organize(args) => {
            let mut settings = Settings::load(&settings_path)?;
            apply_overrides(&mut settings, args);
            if args.save {
                settings.save(&settings_path)?;
            }
            if args.dry_run {
                organize_dry_run(&settings)
            } else {
                organize_directory(&organizer, &settings)
            }
        }
        OrganizeCommand::Undo => undo_organization(&organizer),
        OrganizeCommand::History { clear } => {
            if *clear {
                let removed = organizer.journal().clear()?;
                OutputFormatter::success(&format!("Removed {} journal entries", removed));
            } else {
                let journal = organizer.journal();
                OutputFormatter::history(&journal.list()?, journal.capacity());
            }
            Ok(())
        }
        OrganizeCommand::Rules => {
            let settings = Settings::load(&settings_path)?;
            OutputFormatter::header("Classification rules");
            for line in settings.rules_preview()? {
                println!("  {}", line);
            }
            Ok(())
        }
        OrganizeCommand::Reset => {
            Settings::reset(&settings_path)?;
            OutputFormatter::success(&format!(
                "Settings reset to defaults in {}",
                settings_path.display()
            ));
            Ok(())
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: &OrganizeArgs) {
    if let Some(dir) = &args.dir {
        settings.target_dir = Some(dir.clone());
    }
    if let Some(mode) = args.mode {
        settings.mode = Some(mode);
    }
    if let Some(policy) = args.on_conflict {
        settings.on_conflict = Some(policy);
    }
    if let Some(archive) = &args.archive {
        settings.archive_folder = archive.clone();
    }
    if args.include_hidden {
        settings.exclude_hidden = false;
    }
}

fn organize_directory(organizer: &FileOrganizer, settings: &Settings) -> Result<(), CliError> {
    let config = settings.to_organize_config()?;
    let base = config.target_dir.clone();
    OutputFormatter::info(&format!("Organizing contents of: {}", base.display()));

    let total = FileOrganizer::plan(&config)?.len();
    if total == 0 {
        OutputFormatter::info("No files to organize.");
        return Ok(());
    }

    let pb = OutputFormatter::organize_progress(total as u64);
    let result = organizer.organize_with(&config, |operation| {
        pb.set_message(OutputFormatter::moved(operation, &base));
        pb.inc(1);
    });
    pb.finish_and_clear();

    let operations = result?;
    OutputFormatter::summary_table(&category_counts(&operations), operations.len());
    OutputFormatter::success("Organization complete. Run 'tidyfolder undo' to revert.");
    Ok(())
}

fn organize_dry_run(settings: &Settings) -> Result<(), CliError> {
    let config = settings.to_organize_config()?;
    let base = &config.target_dir;
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", base.display()));

    let plan = FileOrganizer::plan(&config)?;
    if plan.is_empty() {
        OutputFormatter::info("No files found to organize.");
        return Ok(());
    }

    OutputFormatter::planned_moves(&plan, base);

    let mut counts = std::collections::HashMap::new();
    for planned in &plan {
        *counts.entry(planned.category.clone()).or_insert(0) += 1;
    }
    OutputFormatter::summary_table(&counts, plan.len());

    if plan.iter().any(|p| p.collides) {
        OutputFormatter::warning(&format!(
            "Existing files will be handled with the '{}' policy.",
            config.conflict_policy
        ));
    }
    OutputFormatter::dry_run_notice("No files were modified.");
    Ok(())
}

fn undo_organization(organizer: &FileOrganizer) -> Result<(), CliError> {
    OutputFormatter::info("Undoing previous organization...");

    match organizer.undo_last() {
        Ok(report) => {
            OutputFormatter::undo_report(&report);
            Ok(())
        }
        Err(UndoError::NothingToUndo) => {
            OutputFormatter::warning("Nothing to undo.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organize_flags() {
        let cli = Cli::try_parse_from([
            "tidyfolder",
            "organize",
            "/tmp/desk",
            "--mode",
            "inplace",
            "--on-conflict",
            "overwrite",
            "--dry-run",
            "-vv",
        ])
        .expect("valid command line");

        assert_eq!(cli.verbose, 2);
        match cli.command {
            OrganizeCommand::Organize(args) => {
                assert_eq!(args.dir, Some(PathBuf::from("/tmp/desk")));
                assert_eq!(args.mode, Some(Mode::InPlace));
                assert_eq!(args.on_conflict, Some(ConflictPolicy::Overwrite));
                assert!(args.dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = Cli::try_parse_from(["tidyfolder", "organize", "--on-conflict", "skip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_apply_to_settings() {
        let mut settings = Settings::default();
        let args = OrganizeArgs {
            dir: Some(PathBuf::from("/data")),
            mode: Some(Mode::Move),
            on_conflict: Some(ConflictPolicy::Rename),
            archive: Some("Sorted".to_string()),
            include_hidden: true,
            ..OrganizeArgs::default()
        };
        apply_overrides(&mut settings, &args);

        assert_eq!(settings.target_dir, Some(PathBuf::from("/data")));
        assert_eq!(settings.mode, Some(Mode::Move));
        assert_eq!(settings.archive_folder, "Sorted");
        assert!(!settings.exclude_hidden);
    }
}

//! Terminal output for the CLI: colored status lines, progress and tables.

use crate::file_organizer::{OperationRecord, PlannedMove};
use crate::undo::{Transaction, UndoReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;

/// Shows `path` relative to `base` when it lies inside it.
fn relative<'a>(path: &'a Path, base: &Path) -> std::path::Display<'a> {
    path.strip_prefix(base).unwrap_or(path).display()
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Formats every line the CLI prints.
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Progress bar sized to the number of files about to move.
    pub fn organize_progress(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// One line per dry-run move, flagging destinations that already exist.
    pub fn planned_moves(plan: &[PlannedMove], base: &Path) {
        for planned in plan {
            let marker = if planned.collides {
                " (exists)".yellow().to_string()
            } else {
                String::new()
            };
            println!(
                " - {} → {}{}",
                relative(&planned.from, base),
                relative(&planned.destination, base),
                marker
            );
        }
    }

    pub fn moved(operation: &OperationRecord, base: &Path) -> String {
        format!(
            "{} → {}",
            relative(&operation.from, base),
            relative(&operation.to, base)
        )
    }

    /// Files per category, sorted by category name.
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut categories: Vec<_> = category_counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let width = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Category".len());

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (category, count) in &categories {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(**count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    pub fn undo_report(report: &UndoReport) {
        Self::success(&format!(
            "Restored {} {}",
            report.restored.len(),
            plural(report.restored.len())
        ));
        if !report.skipped.is_empty() {
            Self::warning(&format!(
                "Skipped {} {} no longer at their organized location:",
                report.skipped.len(),
                plural(report.skipped.len())
            ));
            for path in &report.skipped {
                println!("    - {}", path.display());
            }
        }
        for backup in &report.backups {
            Self::warning(&format!(
                "An existing file was kept as {}",
                backup.display()
            ));
        }
    }

    /// Journal contents, newest first.
    pub fn history(entries: &[(u32, Transaction)], capacity: usize) {
        if entries.is_empty() {
            Self::info("Undo history is empty.");
            return;
        }
        Self::header(&format!(
            "Undo history ({} of {} entries, newest first)",
            entries.len(),
            capacity
        ));
        for (index, transaction) in entries {
            println!(
                "{:>3}. [{}] {} {}",
                index,
                transaction.timestamp.format("%Y-%m-%d %H:%M:%S"),
                transaction.operations.len(),
                plural(transaction.operations.len())
            );
        }
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

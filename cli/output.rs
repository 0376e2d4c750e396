use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use extractor_core::{
    FolderChoice, ProgressEvent, ProgressSink, RunStatus, RunSummary, TreeStats, UnitOutcome,
};
use serde::Serialize;
use std::io::{self, Write};

/// Prints one line per unit as extraction starts and finishes.
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if self.quiet {
            return;
        }
        match event {
            ProgressEvent::UnitStarted { unit, index, total } => {
                println!(
                    "{} [{}/{}] {}",
                    "→".blue(),
                    index,
                    total,
                    unit.cyan().bold()
                );
            }
            ProgressEvent::UnitCompleted {
                file_count,
                word_count,
                skipped,
                ..
            } => {
                let skipped_note = if *skipped > 0 {
                    format!(", {} skipped", skipped).yellow()
                } else {
                    "".normal()
                };
                println!(
                    "    {} file(s), {} word(s){}",
                    file_count.to_string().green(),
                    word_count,
                    skipped_note
                );
            }
            ProgressEvent::UnitCancelled { files_read, .. } => {
                println!(
                    "    {} after {} file(s), nothing written",
                    "cancelled".yellow().bold(),
                    files_read
                );
            }
        }
    }
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize JSON output")?;
    write_to_stdout(&content)
}

pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", " Extraction Summary ".green().bold().underline());
    println!("{:<20} {}", "Run ID:".green(), summary.run_id.to_string().cyan());
    println!(
        "{:<20} {}",
        "Output directory:".green(),
        summary.output_dir.display().to_string().blue()
    );
    println!(
        "{:<20} {}",
        "Files extracted:".green(),
        summary.files_extracted().to_string().cyan()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Unit").fg(Color::Green),
        Cell::new("Files").fg(Color::Green),
        Cell::new("Words").fg(Color::Green),
        Cell::new("Skipped").fg(Color::Green),
        Cell::new("Result").fg(Color::Green),
    ]);
    for report in &summary.units {
        let result = match &report.outcome {
            UnitOutcome::Written { path } => Cell::new(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )
            .fg(Color::Cyan),
            UnitOutcome::Empty => Cell::new("no files, nothing written").fg(Color::DarkGrey),
            UnitOutcome::Failed { error } => Cell::new(format!("failed: {}", error)).fg(Color::Red),
            UnitOutcome::Cancelled => Cell::new("cancelled").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&report.name).fg(Color::Cyan),
            Cell::new(report.file_count).set_alignment(CellAlignment::Right),
            Cell::new(report.word_count).set_alignment(CellAlignment::Right),
            Cell::new(report.skipped.len()).set_alignment(CellAlignment::Right),
            result,
        ]);
    }
    println!("{table}");

    println!("\n{}", " Skipped Files ".green().bold().underline());
    for (reason, count) in summary.skip_counts() {
        let count_str = if count > 0 {
            count.to_string().yellow()
        } else {
            count.to_string().dimmed()
        };
        println!("{:<22} {}", format!("{}:", reason).green(), count_str);
    }

    let status = match summary.status() {
        RunStatus::Success => "Completed successfully.".green().bold(),
        RunStatus::CompletedWithWarnings => "Completed with warnings.".yellow().bold(),
        RunStatus::IncompleteScan => "Completed, but some directories could not be read."
            .yellow()
            .bold(),
        RunStatus::Failed => "Completed, but some documents could not be written.".red().bold(),
        RunStatus::Cancelled => "Cancelled.".yellow().bold(),
    };
    println!("\n{}\n", status);
}

pub fn print_folder_choices(choices: &[FolderChoice]) {
    println!("{}", " Folders ".green().bold().underline());
    for (i, choice) in choices.iter().enumerate() {
        println!("{:>4}  {}", (i + 1).to_string().dimmed(), choice.label.cyan());
    }
}

pub fn print_tree_stats(stats: &TreeStats) {
    println!("\n{}", " Scan Statistics ".green().bold().underline());
    let rows = [
        ("Directories:", stats.directories),
        ("Files:", stats.files),
        ("Included:", stats.included),
        ("Excluded (name):", stats.excluded_by_name),
        ("Excluded (extension):", stats.excluded_by_extension),
        ("Excluded (size):", stats.excluded_by_size),
        ("Pruned directories:", stats.pruned_directories),
        ("Unreadable dirs:", stats.unreadable_directories),
    ];
    for (label, value) in rows {
        println!("{:<24} {}", label.green(), value.to_string().cyan());
    }
    println!();
}

fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

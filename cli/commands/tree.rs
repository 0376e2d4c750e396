use crate::cli_args::TreeArgs;
use crate::load_config_for_command;
use crate::output::{print_folder_choices, print_json, print_tree_stats};
use anyhow::{Context, Result};
use colored::*;
use extractor_core::{self as core, Config, FolderChoice, ScanWarning, TreeStats};
use log;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TreeReport<'a> {
    root: String,
    choices: &'a [FolderChoice],
    stats: TreeStats,
    warnings: &'a [ScanWarning],
}

pub fn handle_tree_command(args: TreeArgs) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config, Some(&args.rules))
        .context("Failed to load configuration for tree command")?;
    let rules = config.rule_set()?;
    let tree = core::build_tree(&project_root, &rules)?;
    let choices = core::folder_choices(&tree, args.depth)?;

    let report = TreeReport {
        root: tree.root_path().display().to_string(),
        choices: &choices,
        stats: tree.stats(),
        warnings: tree.warnings(),
    };

    if args.json {
        return print_json(&report);
    }

    println!("{} {}\n", "Project:".green().bold(), report.root.blue());
    print_folder_choices(report.choices);
    print_tree_stats(&report.stats);
    if !report.warnings.is_empty() {
        println!("{}", " Scan Warnings ".yellow().bold().underline());
        for warning in report.warnings {
            println!("- {}: {}", warning.path.display().to_string().cyan(), warning.message);
        }
        println!();
    }
    Ok(())
}

use crate::cli_args::{ExtractArgs, SelectionOpts};
use crate::load_config_for_command;
use crate::output::{ConsoleProgress, print_folder_choices, print_json, print_run_summary};
use anyhow::{Context, Result};
use colored::*;
use extractor_core::{self as core, AppError, CancelFlag, Config, RunOptions, SelectionSpec};
use log;
use std::io::{self, BufRead, Write};

pub fn handle_extract_command(args: ExtractArgs, quiet: bool) -> Result<i32> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config, Some(&args.rules))
        .context("Failed to load configuration for extract command")?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Received Ctrl+C, finishing the current file and stopping...");
        handler_flag.cancel();
    }) {
        log::warn!("Could not install Ctrl+C handler: {}", e);
    }

    let progress = ConsoleProgress::new(quiet || args.json);
    let summary = if args.selection.pick {
        let rules = config.rule_set()?;
        let tree = core::build_tree(&project_root, &rules)?;
        let choices = core::folder_choices(&tree, args.selection.depth)?;
        print_folder_choices(&choices);
        let picked = read_picks(choices.len())?
            .into_iter()
            .map(|i| choices[i].value.clone())
            .collect();
        let units = core::resolve(&tree, &SelectionSpec::Picked(picked))?;
        let options = RunOptions {
            output_dir: config.output_dir(tree.root_path()),
            file_count_warning: config.output.file_count_warning,
            cancel,
        };
        core::run_units(&tree, &rules, &units, &options, &progress)
    } else {
        let spec = selection_spec(&args.selection);
        log::debug!("Selection from flags: {:?}", spec);
        core::run_extraction(&project_root, &config, &spec, &progress, cancel)?
    };

    if args.json {
        print_json(&summary)?;
    } else if !quiet {
        print_run_summary(&summary);
    }
    for report in summary.failed_units() {
        log::error!("Unit '{}' produced no document", report.name);
    }
    Ok(summary.exit_code())
}

fn selection_spec(opts: &SelectionOpts) -> SelectionSpec {
    if opts.all || (opts.select_folders.is_empty() && !opts.select_root) {
        return SelectionSpec::Everything;
    }
    if opts.select_folders.is_empty() {
        return SelectionSpec::RootFilesOnly;
    }
    SelectionSpec::Folders {
        paths: opts.select_folders.clone(),
        include_root_files: opts.select_root,
    }
}

/// Reads 1-based choice numbers (comma or space separated) from stdin.
fn read_picks(choice_count: usize) -> Result<Vec<usize>> {
    print!(
        "\n{} ",
        "Enter folder numbers to extract (e.g. 1,3 4):".green().bold()
    );
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read selection from stdin")?;
    parse_picks(&line, choice_count).map_err(anyhow::Error::from)
}

fn parse_picks(line: &str, choice_count: usize) -> Result<Vec<usize>, AppError> {
    let mut picks = Vec::new();
    for token in line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let number: usize = token.parse().map_err(|_| {
            AppError::InvalidArgument(format!("'{}' is not a choice number", token))
        })?;
        if number == 0 || number > choice_count {
            return Err(AppError::Selection(format!(
                "Choice {} is out of range (1-{})",
                number, choice_count
            )));
        }
        if !picks.contains(&(number - 1)) {
            picks.push(number - 1);
        }
    }
    Ok(picks)
}

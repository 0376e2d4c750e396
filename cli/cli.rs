mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, ProjectConfigOpts, RuleOverrideOpts};
use extractor_core::{AppError, Config};

const EXIT_CONFIG: i32 = 1;
const EXIT_IO: i32 = 2;
const EXIT_SELECTION: i32 = 3;

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);
    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(code) => {
            log::info!("Application finished with code {}.", code);
            code
        }
        Err(e) => {
            let exit_code = match e.downcast_ref::<AppError>() {
                Some(AppError::Config(_)) | Some(AppError::TomlParse(_)) => EXIT_CONFIG,
                Some(AppError::InvalidArgument(_)) => EXIT_CONFIG,
                Some(AppError::Selection(_)) => EXIT_SELECTION,
                Some(AppError::Cancelled) => extractor_core::run::EXIT_CANCELLED,
                Some(AppError::Io(_))
                | Some(AppError::FileRead { .. })
                | Some(AppError::FileWrite { .. })
                | Some(AppError::DirCreation { .. })
                | Some(AppError::NotADirectory { .. }) => EXIT_IO,
                Some(_) => EXIT_IO,
                None => EXIT_CONFIG,
            };

            if !quiet || exit_code == EXIT_CONFIG || exit_code == EXIT_SELECTION {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

/// Dispatches the subcommand and returns the process exit code.
fn run_app(cli: Cli, quiet: bool) -> Result<i32> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(0);
    };
    match command {
        Commands::Extract(args) => {
            log::debug!("Executing 'extract' command...");
            commands::extract::handle_extract_command(args, quiet)
        }
        Commands::Tree(args) => {
            log::debug!("Executing 'tree' command...");
            commands::tree::handle_tree_command(args)?;
            Ok(0)
        }
        Commands::Config(args) => {
            log::debug!("Executing 'config' command...");
            commands::config::handle_config_command(args, quiet)?;
            Ok(0)
        }
    }
}

/// Loads the config file (if any) for `project_root` and applies flag overrides.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    overrides: Option<&RuleOverrideOpts>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(project_root, project_opts.config.as_ref())
        .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(opts) = overrides {
        if opts.exclude_large_files {
            config.rules.exclude_large_files = true;
        }
        if let Some(size) = &opts.max_size {
            config.rules.max_file_size = size.clone();
        }
        if let Some(dir) = &opts.output_dir {
            config.output.dir = dir.clone();
        }
    }
    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}

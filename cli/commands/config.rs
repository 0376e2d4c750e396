use crate::cli_args::ConfigArgs;
use crate::load_config_for_command;
use anyhow::{Context, Result};
use colored::*;
use extractor_core::Config;
use extractor_core::config::DEFAULT_CONFIG_FILENAME;
use log;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};

pub fn handle_config_command(args: ConfigArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;

    if args.save {
        let path = project_root.join(DEFAULT_CONFIG_FILENAME);
        let content = toml::to_string_pretty(&Config::default())
            .context("Failed to serialize default config to TOML")?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::warn!("Config file already exists: {}", path.display());
                if !quiet {
                    println!(
                        "{} {} already exists; leaving it untouched.",
                        "!".yellow().bold(),
                        path.display().to_string().blue()
                    );
                }
                return Ok(());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()));
            }
        };
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            println!(
                "{} Default config saved to: {}",
                "✓".green(),
                path.display().to_string().blue()
            );
        }
        return Ok(());
    }

    let config = load_config_for_command(&project_root, &args.project_config, None)
        .context("Failed to load configuration for config command")?;
    // Surface validation problems here rather than at the next extract.
    config.rule_set()?;
    let config_toml =
        toml::to_string_pretty(&config).context("Failed to serialize effective config to TOML")?;
    println!(
        "{}",
        "--- Effective Configuration ---".green().bold().underline()
    );
    println!("{}", config_toml);
    Ok(())
}

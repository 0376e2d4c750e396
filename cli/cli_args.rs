use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        visible_alias = "root",
        help = "Specify the project directory to scan (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Path to a TOML config file (default: <root>/.codebase-extractor.toml if present).",
        value_name = "CONFIG_FILE",
        help_heading = "Project Setup"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RuleOverrideOpts {
    #[arg(
        long,
        help = "Skip files larger than the size limit.",
        help_heading = "Rules"
    )]
    pub exclude_large_files: bool,

    #[arg(
        long,
        help = "Size limit used with --exclude-large-files (e.g. 512KiB, 2MB).",
        value_name = "SIZE",
        requires = "exclude_large_files",
        help_heading = "Rules"
    )]
    pub max_size: Option<String>,

    #[arg(
        long,
        help = "Write documents to this directory instead of the configured one.",
        value_name = "DIR",
        help_heading = "Rules"
    )]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectionOpts {
    #[arg(
        long,
        num_args = 1..,
        value_name = "FOLDER",
        help = "Extract these folders, relative to the project root.",
        conflicts_with_all = ["all", "pick"],
        help_heading = "Selection"
    )]
    pub select_folders: Vec<PathBuf>,

    #[arg(
        long,
        help = "Extract the files directly in the project root.",
        conflicts_with_all = ["all", "pick"],
        help_heading = "Selection"
    )]
    pub select_root: bool,

    #[arg(
        long,
        help = "Extract every top-level folder plus the root files [default].",
        conflicts_with = "pick",
        help_heading = "Selection"
    )]
    pub all: bool,

    #[arg(
        short,
        long,
        help = "Choose folders from a numbered list read from stdin.",
        help_heading = "Selection"
    )]
    pub pick: bool,

    #[arg(
        long,
        default_value_t = 3,
        value_name = "N",
        help = "Folder depth shown by --pick.",
        help_heading = "Selection"
    )]
    pub depth: usize,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bundle a project's source files into self-describing Markdown documents.",
    long_about = "codebase-extractor scans a project tree, filters it with configurable rules, \nand writes one Markdown document per selected folder (plus one for the root files).",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  codebase-extractor extract\n  codebase-extractor extract --select-folders src docs --select-root\n  codebase-extractor extract --pick --depth 2\n  codebase-extractor tree --depth 2\n  codebase-extractor config --save",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence progress output, informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "x",
        about = "Extract the selected folders into Markdown documents."
    )]
    Extract(ExtractArgs),

    #[command(
        visible_alias = "t",
        about = "Show the filtered folder tree and what the rules would include."
    )]
    Tree(TreeArgs),

    #[command(about = "Show the effective configuration or save the defaults.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub rules: RuleOverrideOpts,

    #[command(flatten)]
    pub selection: SelectionOpts,

    #[arg(long, help = "Print the run summary as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub rules: RuleOverrideOpts,

    #[arg(long, default_value_t = 3, value_name = "N", help = "Folder depth to show.")]
    pub depth: usize,

    #[arg(long, help = "Print choices and statistics as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        long,
        help = "Save the default configuration to <root>/.codebase-extractor.toml (never overwrites)."
    )]
    pub save: bool,
}

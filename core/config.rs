use crate::error::{AppError, Result};
use byte_unit::Byte;
use log;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_OUTPUT_DIR: &str = "CODEBASE_EXTRACTS";
pub const DEFAULT_CONFIG_FILENAME: &str = ".codebase-extractor.toml";
pub const DEFAULT_MAX_FILE_SIZE: &str = "1MiB";
pub const DEFAULT_FILE_COUNT_WARNING: usize = 1000;

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "__pycache__",
    "dist",
    "build",
    "target",
    ".next",
    ".git",
    ".svn",
    ".hg",
    ".vscode",
    ".idea",
    "venv",
    ".venv",
    ".dart_tool",
    ".gradle",
    "Pods",
    "DerivedData",
];

const DEFAULT_EXCLUDED_FILENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "composer.lock",
    ".env",
    "Podfile.lock",
];

const DEFAULT_ALLOWED_FILENAMES: &[&str] = &[
    "dockerfile",
    ".gitignore",
    ".htaccess",
    "makefile",
    ".dockerignore",
    ".env.example",
    "podfile",
    "gemfile",
    "jenkinsfile",
    "gradlew",
];

const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    // Web & general
    ".php", ".html", ".css", ".js", ".jsx", ".ts", ".tsx", ".vue", ".svelte", ".py", ".rb",
    ".java", ".c", ".cpp", ".cs", ".go", ".rs", ".json", ".xml", ".yaml", ".yml", ".toml",
    ".ini", ".conf", ".md", ".txt", ".rst", ".twig", ".blade", ".handlebars", ".mustache",
    ".ejs", ".sql", ".graphql", ".gql", ".tf",
    // Flutter / Dart
    ".dart", ".arb",
    // Android
    ".gradle", ".properties",
    // iOS
    ".plist", ".xcconfig",
    // Scripts
    ".sh", ".bat",
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
    #[serde(default = "default_excluded_filenames")]
    pub excluded_filenames: Vec<String>,
    #[serde(default = "default_allowed_filenames")]
    pub allowed_filenames: Vec<String>,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_false")]
    pub exclude_large_files: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_file_count_warning")]
    pub file_count_warning: usize,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_excluded_dirs() -> Vec<String> {
    to_strings(DEFAULT_EXCLUDED_DIRS)
}
fn default_excluded_filenames() -> Vec<String> {
    to_strings(DEFAULT_EXCLUDED_FILENAMES)
}
fn default_allowed_filenames() -> Vec<String> {
    to_strings(DEFAULT_ALLOWED_FILENAMES)
}
fn default_allowed_extensions() -> Vec<String> {
    to_strings(DEFAULT_ALLOWED_EXTENSIONS)
}
fn default_false() -> bool {
    false
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}
fn default_file_count_warning() -> usize {
    DEFAULT_FILE_COUNT_WARNING
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: default_excluded_dirs(),
            excluded_filenames: default_excluded_filenames(),
            allowed_filenames: default_allowed_filenames(),
            allowed_extensions: default_allowed_extensions(),
            exclude_large_files: default_false(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            file_count_warning: default_file_count_warning(),
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_to_resolve = match cli_project_root {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let canonical = path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize project root '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })?;
        if !canonical.is_dir() {
            return Err(AppError::NotADirectory { path: canonical });
        }
        Ok(canonical)
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&PathBuf>,
    ) -> Result<Option<PathBuf>> {
        match cli_config_file {
            Some(p) => {
                let path = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root.join(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<Config>(content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    /// Output directory, resolved against the project root when relative.
    pub fn output_dir(&self, project_root: &Path) -> PathBuf {
        if self.output.dir.is_absolute() {
            self.output.dir.clone()
        } else {
            project_root.join(&self.output.dir)
        }
    }

    /// Validates the rule lists and freezes them into a [`RuleSet`].
    ///
    /// The output directory's own name joins the excluded directories so a
    /// run never reads documents produced by an earlier run.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rule_set = RuleSet::from_config(&self.rules)?;
        if let Some(name) = self.output.dir.file_name().and_then(|n| n.to_str()) {
            rule_set = rule_set.exclude_dir(name);
        }
        Ok(rule_set)
    }
}

/// Immutable classification rules for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    excluded_dirs: BTreeSet<String>,
    excluded_filenames: BTreeSet<String>,
    allowed_filenames: BTreeSet<String>,
    allowed_extensions: BTreeSet<String>,
    max_file_size: Option<u64>,
}

impl Default for RuleSet {
    fn default() -> Self {
        // Stock lists are known to be valid.
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            excluded_filenames: DEFAULT_EXCLUDED_FILENAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_filenames: DEFAULT_ALLOWED_FILENAMES
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            max_file_size: None,
        }
    }
}

impl RuleSet {
    pub fn from_config(rules: &RulesConfig) -> Result<Self> {
        let excluded_dirs = collect_names("excluded_dirs", &rules.excluded_dirs, false)?;
        let excluded_filenames =
            collect_names("excluded_filenames", &rules.excluded_filenames, false)?;
        let allowed_filenames = collect_names("allowed_filenames", &rules.allowed_filenames, true)?;

        let mut allowed_extensions = BTreeSet::new();
        for ext in &rules.allowed_extensions {
            allowed_extensions.insert(normalize_extension(ext)?);
        }

        if allowed_extensions.is_empty() && allowed_filenames.is_empty() {
            return Err(AppError::Config(
                "allowed_extensions and allowed_filenames are both empty; no file could ever be included"
                    .to_string(),
            ));
        }

        for name in &excluded_filenames {
            if allowed_filenames.contains(&name.to_lowercase()) {
                log::warn!(
                    "'{}' is both allowed and excluded; the allow-list entry takes precedence",
                    name
                );
            }
        }

        let max_file_size = if rules.exclude_large_files {
            Some(parse_size(&rules.max_file_size)?)
        } else {
            None
        };

        Ok(Self {
            excluded_dirs,
            excluded_filenames,
            allowed_filenames,
            allowed_extensions,
            max_file_size,
        })
    }

    pub fn with_max_file_size(mut self, max_file_size: Option<u64>) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn exclude_dir(mut self, name: &str) -> Self {
        self.excluded_dirs.insert(name.to_string());
        self
    }

    pub fn allow_extension(mut self, ext: &str) -> Self {
        if let Ok(ext) = normalize_extension(ext) {
            self.allowed_extensions.insert(ext);
        }
        self
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.contains(name)
    }

    pub fn is_allowed_filename(&self, name: &str) -> bool {
        self.allowed_filenames.contains(&name.to_lowercase())
    }

    pub fn is_excluded_filename(&self, name: &str) -> bool {
        self.excluded_filenames.contains(name)
    }

    /// `extension` carries its leading dot, as produced by [`extension_of`].
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        !extension.is_empty() && self.allowed_extensions.contains(&extension.to_lowercase())
    }

    pub fn max_file_size(&self) -> Option<u64> {
        self.max_file_size
    }
}

/// Final extension of a file name with its leading dot, or an empty string.
///
/// Dotfiles such as `.gitignore` have no extension.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx..],
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    let byte_value = Byte::from_str(size_str.trim()).map_err(|e| {
        AppError::Config(format!(
            "Invalid max file size '{}': {}. Use a byte count or units like KB, MiB.",
            size_str, e
        ))
    })?;
    let bytes: u128 = byte_value.as_u128();
    let bytes: u64 = bytes.try_into().map_err(|_| {
        AppError::Config(format!("Max file size '{}' is too large", size_str))
    })?;
    if bytes == 0 {
        return Err(AppError::Config(
            "Max file size must be greater than 0 bytes".to_string(),
        ));
    }
    Ok(bytes)
}

fn collect_names(field: &str, names: &[String], lowercase: bool) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for raw in names {
        let name = raw.trim();
        if name.is_empty() {
            return Err(AppError::Config(format!("{} contains an empty entry", field)));
        }
        if name.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "{} entry '{}' must be a plain name, not a path",
                field, name
            )));
        }
        set.insert(if lowercase {
            name.to_lowercase()
        } else {
            name.to_string()
        });
    }
    Ok(set)
}

fn normalize_extension(raw: &str) -> Result<String> {
    let ext = raw.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(['/', '\\', '.']) {
        return Err(AppError::Config(format!(
            "allowed_extensions entry '{}' is not a valid extension",
            raw
        )));
    }
    Ok(format!(".{}", ext.to_lowercase()))
}

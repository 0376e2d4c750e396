use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("YAML Serialization Error: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory Creation Error: Path '{path}', Error: {source}")]
    DirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Selection Error: {0}")]
    Selection(String),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

impl AppError {
    /// Errors raised before any file is read: bad rules or a bad selection.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::TomlParse(_) | AppError::Selection(_)
        )
    }
}

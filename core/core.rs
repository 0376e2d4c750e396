//! Scan a project tree, classify its files, and bundle selected folders into
//! self-describing Markdown documents.

pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod gather;
pub mod output;
pub mod progress;
pub mod rules;
pub mod run;
pub mod selection;

pub use cancel::CancelFlag;
pub use config::{Config, OutputConfig, RuleSet, RulesConfig};
pub use error::{AppError, Result};
pub use extract::{ExtractionResult, Extractor, SkipReason, SkippedFile};
pub use gather::{NodeKind, ScanNode, ScanTree, ScanWarning, TreeStats, WarningKind, build_tree};
pub use output::{RunMetadata, write_document};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, RecordingSink};
pub use rules::{Verdict, classify};
pub use run::{RunOptions, RunStatus, RunSummary, UnitOutcome, UnitReport, run_extraction, run_units};
pub use selection::{
    FolderChoice, ProcessingUnit, SelectionChoice, SelectionSpec, folder_choices, resolve,
};

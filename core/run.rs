use crate::cancel::CancelFlag;
use crate::config::{Config, DEFAULT_FILE_COUNT_WARNING, RuleSet};
use crate::error::{AppError, Result};
use crate::extract::{Extractor, SkipReason, SkippedFile};
use crate::gather::{self, ScanTree, ScanWarning, TreeStats};
use crate::output::{self, RunMetadata};
use crate::progress::ProgressSink;
use crate::selection::{self, ProcessingUnit, SelectionSpec};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_UNIT_FAILED: i32 = 4;
pub const EXIT_INCOMPLETE_SCAN: i32 = 5;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Written { path: PathBuf },
    /// No file survived extraction; no document is written.
    Empty,
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: ProcessingUnit,
    pub name: String,
    pub outcome: UnitOutcome,
    pub file_count: usize,
    pub char_count: usize,
    pub word_count: usize,
    pub skipped: Vec<SkippedFile>,
}

impl UnitReport {
    fn without_result(unit: &ProcessingUnit, outcome: UnitOutcome) -> Self {
        Self {
            unit: unit.clone(),
            name: unit.name(),
            outcome,
            file_count: 0,
            char_count: 0,
            word_count: 0,
            skipped: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Every unit finished, but some files were skipped on a read error.
    CompletedWithWarnings,
    /// Every unit finished, but at least one directory could not be read,
    /// so the documents may be missing part of the tree.
    IncompleteScan,
    /// At least one unit could not write its document.
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::CompletedWithWarnings => EXIT_SUCCESS,
            RunStatus::IncompleteScan => EXIT_INCOMPLETE_SCAN,
            RunStatus::Failed => EXIT_UNIT_FAILED,
            RunStatus::Cancelled => EXIT_CANCELLED,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub units: Vec<UnitReport>,
    pub tree: TreeStats,
    pub scan_warnings: Vec<ScanWarning>,
}

impl RunSummary {
    pub fn files_extracted(&self) -> usize {
        self.units.iter().map(|u| u.file_count).sum()
    }

    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.units.iter().filter_map(|u| match &u.outcome {
            UnitOutcome::Written { path } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed { .. }))
    }

    /// Skipped files by reason. Name, extension and size exclusions are
    /// counted over the whole scanned tree; read-time skips over the
    /// processed units.
    pub fn skip_counts(&self) -> IndexMap<&'static str, usize> {
        let read_time = |reason: SkipReason| {
            self.units
                .iter()
                .flat_map(|u| &u.skipped)
                .filter(|s| s.reason == reason)
                .count()
        };
        let mut counts = IndexMap::new();
        counts.insert("name", self.tree.excluded_by_name);
        counts.insert("extension", self.tree.excluded_by_extension);
        counts.insert(
            "size",
            self.tree.excluded_by_size + read_time(SkipReason::TooLarge),
        );
        counts.insert(
            "read_failure",
            read_time(SkipReason::Unreadable) + read_time(SkipReason::NotText),
        );
        counts.insert("directory_permission", self.tree.unreadable_directories);
        counts
    }

    pub fn status(&self) -> RunStatus {
        if self
            .units
            .iter()
            .any(|u| u.outcome == UnitOutcome::Cancelled)
        {
            return RunStatus::Cancelled;
        }
        if self.failed_units().next().is_some() {
            return RunStatus::Failed;
        }
        if self.tree.unreadable_directories > 0 {
            return RunStatus::IncompleteScan;
        }
        let skipped_on_error = self
            .units
            .iter()
            .flat_map(|u| &u.skipped)
            .any(|s| s.reason != SkipReason::TooLarge);
        if skipped_on_error || !self.scan_warnings.is_empty() {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Success
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }
}

/// Knobs for [`run_units`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub file_count_warning: usize,
    pub cancel: CancelFlag,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_count_warning: DEFAULT_FILE_COUNT_WARNING,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Extracts and writes `units` one after another.
///
/// A unit that fails to write is recorded and the run moves on. The cancel
/// flag is honoured between units and between files; a cancelled unit
/// leaves no document behind.
pub fn run_units(
    tree: &ScanTree,
    rules: &RuleSet,
    units: &[ProcessingUnit],
    options: &RunOptions,
    progress: &dyn ProgressSink,
) -> RunSummary {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log::info!("Starting run {} with {} unit(s)", run_id, units.len());

    let extractor = Extractor::new(tree, rules)
        .with_progress(progress)
        .with_cancel(options.cancel.clone())
        .with_file_count_warning(options.file_count_warning);

    let total = units.len();
    let mut reports = Vec::with_capacity(total);
    for (i, unit) in units.iter().enumerate() {
        if options.cancel.is_cancelled() {
            reports.push(UnitReport::without_result(unit, UnitOutcome::Cancelled));
            continue;
        }

        let metadata = RunMetadata::for_unit(run_id, unit);
        let result = match extractor.extract_at(unit, i + 1, total) {
            Ok(result) => result,
            Err(AppError::Cancelled) => {
                reports.push(UnitReport::without_result(unit, UnitOutcome::Cancelled));
                continue;
            }
            Err(e) => {
                log::error!("Extraction of '{}' failed: {}", unit.name(), e);
                reports.push(UnitReport::without_result(
                    unit,
                    UnitOutcome::Failed {
                        error: e.to_string(),
                    },
                ));
                continue;
            }
        };

        let outcome = if result.is_empty() {
            log::info!("No extractable files in '{}'", unit.name());
            UnitOutcome::Empty
        } else {
            match output::write_document(&result, &options.output_dir, &metadata) {
                Ok(path) => UnitOutcome::Written { path },
                Err(e) => {
                    log::error!("Could not write document for '{}': {}", unit.name(), e);
                    UnitOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        reports.push(UnitReport {
            unit: unit.clone(),
            name: unit.name(),
            outcome,
            file_count: result.file_count,
            char_count: result.char_count,
            word_count: result.word_count,
            skipped: result.skipped,
        });
    }

    RunSummary {
        run_id,
        started_at,
        output_dir: options.output_dir.clone(),
        units: reports,
        tree: tree.stats(),
        scan_warnings: tree.warnings().to_vec(),
    }
}

/// Full pipeline: validate rules, scan, resolve the selection, extract.
///
/// Configuration and selection problems are returned as errors before any
/// file is read; everything after that is reported in the summary.
pub fn run_extraction(
    project_root: &Path,
    config: &Config,
    spec: &SelectionSpec,
    progress: &dyn ProgressSink,
    cancel: CancelFlag,
) -> Result<RunSummary> {
    let rules = config.rule_set()?;
    let tree = gather::build_tree(project_root, &rules)?;
    let units = selection::resolve(&tree, spec)?;
    let options = RunOptions {
        output_dir: config.output_dir(tree.root_path()),
        file_count_warning: config.output.file_count_warning,
        cancel,
    };
    Ok(run_units(&tree, &rules, &units, &options, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::build_tree;
    use crate::progress::NoProgress;
    use std::fs;

    fn summary_with(units: Vec<UnitReport>) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            output_dir: PathBuf::from("out"),
            units,
            tree: TreeStats::default(),
            scan_warnings: Vec::new(),
        }
    }

    fn report(outcome: UnitOutcome, skipped: Vec<SkippedFile>) -> UnitReport {
        let unit = ProcessingUnit::folder("src");
        UnitReport {
            name: unit.name(),
            unit,
            outcome,
            file_count: 1,
            char_count: 10,
            word_count: 2,
            skipped,
        }
    }

    fn skipped(reason: SkipReason) -> SkippedFile {
        SkippedFile {
            path: PathBuf::from("src/x.rs"),
            reason,
            message: String::new(),
        }
    }

    #[test]
    fn status_follows_worst_outcome() {
        let written = || UnitOutcome::Written {
            path: PathBuf::from("out/a.md"),
        };
        assert_eq!(
            summary_with(vec![report(written(), vec![])]).status(),
            RunStatus::Success
        );
        assert_eq!(
            summary_with(vec![report(written(), vec![skipped(SkipReason::TooLarge)])]).status(),
            RunStatus::Success
        );
        assert_eq!(
            summary_with(vec![report(written(), vec![skipped(SkipReason::NotText)])]).status(),
            RunStatus::CompletedWithWarnings
        );
        let failed = summary_with(vec![
            report(UnitOutcome::Failed { error: "disk full".into() }, vec![]),
            report(written(), vec![]),
        ]);
        assert_eq!(failed.status(), RunStatus::Failed);
        assert_eq!(failed.exit_code(), EXIT_UNIT_FAILED);
        let mut partial = summary_with(vec![report(written(), vec![])]);
        partial.tree.unreadable_directories = 1;
        assert_eq!(partial.status(), RunStatus::IncompleteScan);
        assert_eq!(partial.exit_code(), EXIT_INCOMPLETE_SCAN);
        let cancelled = summary_with(vec![
            report(UnitOutcome::Failed { error: "disk full".into() }, vec![]),
            report(UnitOutcome::Cancelled, vec![]),
        ]);
        assert_eq!(cancelled.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn skip_counts_merge_scan_and_read_time() {
        let mut summary = summary_with(vec![report(
            UnitOutcome::Empty,
            vec![
                skipped(SkipReason::TooLarge),
                skipped(SkipReason::Unreadable),
                skipped(SkipReason::NotText),
            ],
        )]);
        summary.tree.excluded_by_name = 3;
        summary.tree.excluded_by_size = 1;
        let counts = summary.skip_counts();
        let keys: Vec<&str> = counts.keys().copied().collect();
        assert_eq!(
            keys,
            vec!["name", "extension", "size", "read_failure", "directory_permission"]
        );
        assert_eq!(counts["name"], 3);
        assert_eq!(counts["size"], 2);
        assert_eq!(counts["read_failure"], 2);
    }

    #[test]
    fn run_units_writes_one_document_per_non_empty_unit() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        fs::write(dir.path().join("assets/logo.png"), "png").unwrap();
        fs::write(dir.path().join("main.py"), "f()\n").unwrap();

        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();
        let units = selection::resolve(&tree, &SelectionSpec::Everything).unwrap();
        let options = RunOptions::new(dir.path().join("out"));
        let summary = run_units(&tree, &rules, &units, &options, &NoProgress);

        let names: Vec<&str> = summary.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["assets", "src", "./"]);
        assert_eq!(summary.units[0].outcome, UnitOutcome::Empty);
        assert_eq!(summary.written().count(), 2);
        assert_eq!(summary.files_extracted(), 2);
        assert_eq!(summary.tree.excluded_by_extension, 1);
        assert_eq!(summary.status(), RunStatus::Success);
    }

    #[test]
    fn invalid_config_fails_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.rules.allowed_filenames.clear();
        config.rules.allowed_extensions.clear();
        let err = run_extraction(
            dir.path(),
            &config,
            &SelectionSpec::Everything,
            &NoProgress,
            CancelFlag::new(),
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(!dir.path().join(crate::config::DEFAULT_OUTPUT_DIR).exists());
    }
}

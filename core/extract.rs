use crate::cancel::CancelFlag;
use crate::config::{DEFAULT_FILE_COUNT_WARNING, RuleSet, extension_of};
use crate::error::{AppError, Result};
use crate::gather::{ScanNode, ScanTree};
use crate::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::rules::{self, mapping};
use crate::selection::ProcessingUnit;
use log;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the line introducing each file inside a document body.
pub const FILE_HEADER_PREFIX: &str = "## File: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Over the size threshold when checked at read time.
    TooLarge,
    /// Metadata or content could not be read.
    Unreadable,
    /// Content is not valid UTF-8 text.
    NotText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub message: String,
}

/// The aggregated text of one unit plus its counts.
///
/// `char_count` and `word_count` are measured over `body` itself, so they can
/// be recomputed from the body alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult<'u> {
    pub unit: &'u ProcessingUnit,
    pub file_count: usize,
    pub char_count: usize,
    pub word_count: usize,
    pub body: String,
    pub skipped: Vec<SkippedFile>,
}

impl ExtractionResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts per-file header lines in a document body, ignoring fenced content.
///
/// Each file body sits in a fence longer than any backtick run it contains,
/// so a header-like line inside a file can never be mistaken for a header.
pub fn count_file_headers(body: &str) -> usize {
    let mut open_fence: Option<usize> = None;
    let mut headers = 0;
    for line in body.lines() {
        let ticks = line.chars().take_while(|&c| c == '`').count();
        match open_fence {
            Some(len) => {
                if ticks >= len && line[ticks..].trim().is_empty() {
                    open_fence = None;
                }
            }
            None if ticks >= 3 => open_fence = Some(ticks),
            None if line.starts_with(FILE_HEADER_PREFIX) => headers += 1,
            None => {}
        }
    }
    headers
}

/// Reads the files of processing units out of a scanned tree.
pub struct Extractor<'a> {
    tree: &'a ScanTree,
    rules: &'a RuleSet,
    progress: &'a dyn ProgressSink,
    cancel: CancelFlag,
    file_count_warning: usize,
}

impl<'a> Extractor<'a> {
    pub fn new(tree: &'a ScanTree, rules: &'a RuleSet) -> Self {
        Self {
            tree,
            rules,
            progress: &NoProgress,
            cancel: CancelFlag::new(),
            file_count_warning: DEFAULT_FILE_COUNT_WARNING,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_file_count_warning(mut self, threshold: usize) -> Self {
        self.file_count_warning = threshold;
        self
    }

    pub fn extract<'u>(&self, unit: &'u ProcessingUnit) -> Result<ExtractionResult<'u>> {
        self.extract_at(unit, 1, 1)
    }

    /// Extracts `unit`, reporting it as number `index` of `total` units.
    ///
    /// Returns [`AppError::Cancelled`] if the cancel flag trips before the
    /// unit finishes; no partial result is produced in that case and the
    /// unit is closed with [`ProgressEvent::UnitCancelled`].
    pub fn extract_at<'u>(
        &self,
        unit: &'u ProcessingUnit,
        index: usize,
        total: usize,
    ) -> Result<ExtractionResult<'u>> {
        let unit_name = unit.name();
        self.progress.on_event(&ProgressEvent::UnitStarted {
            unit: unit_name.clone(),
            index,
            total,
        });
        log::info!("Extracting unit '{}' ({}/{})", unit_name, index, total);

        let files = self.collect_files(unit)?;
        if files.len() > self.file_count_warning {
            log::warn!(
                "Unit '{}' includes {} files (warning threshold {})",
                unit_name,
                files.len(),
                self.file_count_warning
            );
        }

        let mut body = String::new();
        let mut file_count = 0;
        let mut skipped = Vec::new();
        for node in files {
            if self.cancel.is_cancelled() {
                log::warn!("Unit '{}' abandoned: extraction cancelled", unit_name);
                self.progress.on_event(&ProgressEvent::UnitCancelled {
                    unit: unit_name,
                    index,
                    total,
                    files_read: file_count,
                });
                return Err(AppError::Cancelled);
            }
            let relative = self.tree.relative(&node.path);
            match self.read_text(node) {
                Ok(content) => {
                    append_file(&mut body, &relative, &node.name, &content);
                    file_count += 1;
                }
                Err((reason, message)) => {
                    log::warn!("Skipping '{}': {}", relative.display(), message);
                    skipped.push(SkippedFile {
                        path: relative,
                        reason,
                        message,
                    });
                }
            }
        }

        let result = ExtractionResult {
            unit,
            file_count,
            char_count: body.chars().count(),
            word_count: count_words(&body),
            body,
            skipped,
        };
        self.progress.on_event(&ProgressEvent::UnitCompleted {
            unit: unit_name,
            index,
            total,
            file_count: result.file_count,
            char_count: result.char_count,
            word_count: result.word_count,
            skipped: result.skipped.len(),
        });
        Ok(result)
    }

    /// Included file nodes of a unit, in tree order.
    fn collect_files(&self, unit: &ProcessingUnit) -> Result<Vec<&'a ScanNode>> {
        let mut files = Vec::new();
        match unit {
            ProcessingUnit::RootFiles => {
                files.extend(self.tree.root().children().iter().filter(|c| c.included()));
            }
            ProcessingUnit::Folder { root_path } => {
                let node = self.tree.find(root_path).ok_or_else(|| {
                    AppError::Selection(format!(
                        "'{}' is not part of the scanned tree",
                        root_path.display()
                    ))
                })?;
                collect_included(node, &mut files);
            }
        }
        Ok(files)
    }

    fn read_text(&self, node: &ScanNode) -> std::result::Result<String, (SkipReason, String)> {
        let metadata = fs::metadata(&node.path)
            .map_err(|e| (SkipReason::Unreadable, format!("cannot stat file: {}", e)))?;
        if rules::exceeds_threshold(self.rules, Some(metadata.len())) {
            return Err((
                SkipReason::TooLarge,
                format!("{} bytes exceeds the size limit", metadata.len()),
            ));
        }
        let bytes = fs::read(&node.path)
            .map_err(|e| (SkipReason::Unreadable, format!("cannot read file: {}", e)))?;
        if bytes.contains(&0) {
            return Err((SkipReason::NotText, "contains NUL bytes".to_string()));
        }
        String::from_utf8(bytes)
            .map_err(|e| (SkipReason::NotText, format!("not valid UTF-8: {}", e)))
    }
}

fn collect_included<'t>(node: &'t ScanNode, files: &mut Vec<&'t ScanNode>) {
    for child in node.children() {
        if child.is_dir() {
            collect_included(child, files);
        } else if child.included() {
            files.push(child);
        }
    }
}

fn append_file(body: &mut String, relative: &Path, name: &str, content: &str) {
    let display_path = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let language = mapping::language_for_extension(extension_of(name));
    let fence = fence_for(content);

    body.push_str(FILE_HEADER_PREFIX);
    body.push('`');
    body.push_str(&display_path);
    body.push_str("`\n\n");
    body.push_str(&fence);
    body.push_str(language);
    body.push('\n');
    body.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(&fence);
    body.push_str("\n\n");
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::build_tree;
    use crate::progress::RecordingSink;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn folder_unit_reads_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.rs", b"fn b() {}");
        write(dir.path(), "src/a/inner.rs", b"fn inner() {}");
        write(dir.path(), "src/a.rs", b"fn a() {}\n");
        write(dir.path(), "src/image.png", b"png");
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();

        let unit = ProcessingUnit::folder("src");
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.file_count, 3);
        let a = result.body.find("`src/a.rs`").unwrap();
        let inner = result.body.find("`src/a/inner.rs`").unwrap();
        let b = result.body.find("`src/b.rs`").unwrap();
        // Component-wise order: directory `a` sorts before file `a.rs`.
        assert!(inner < a && a < b);
        assert!(result.body.contains("```rust\nfn b() {}\n```"));
        assert!(!result.body.contains("png"));
    }

    #[test]
    fn counts_are_recomputable_from_body() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.py", b"print('hello world')\n");
        write(dir.path(), "two.md", "héllo  wörld\n\nagain".as_bytes());
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();

        let unit = ProcessingUnit::RootFiles;
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.file_count, 2);
        assert_eq!(count_file_headers(&result.body), result.file_count);
        assert_eq!(result.char_count, result.body.chars().count());
        assert_eq!(result.word_count, count_words(&result.body));
    }

    #[test]
    fn header_lines_inside_files_are_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "docs/notes.md",
            b"## File: `fake.rs`\nhello\n```\n## File: `also_fake.rs`\n```\n",
        );
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();

        let unit = ProcessingUnit::folder("docs");
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.file_count, 1);
        assert_eq!(count_file_headers(&result.body), 1);
        assert!(result.body.contains("````markdown\n## File: `fake.rs`"));
    }

    #[test]
    fn non_text_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.txt", &[0xff, 0xfe, 0x00, 0x01]);
        write(dir.path(), "latin1.txt", &[b'c', b'a', b'f', 0xe9]);
        write(dir.path(), "good.txt", b"fine");
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();

        let unit = ProcessingUnit::RootFiles;
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.file_count, 1);
        assert_eq!(result.skipped.len(), 2);
        assert!(result.skipped.iter().all(|s| s.reason == SkipReason::NotText));
    }

    #[test]
    fn size_is_rechecked_at_read_time() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "grows.rs", b"small");
        let rules = RuleSet::default().with_max_file_size(Some(10));
        let tree = build_tree(dir.path(), &rules).unwrap();
        assert!(tree.root().children()[0].included());

        write(dir.path(), "grows.rs", b"now much larger than ten bytes");
        let unit = ProcessingUnit::RootFiles;
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.file_count, 0);
        assert_eq!(result.skipped[0].reason, SkipReason::TooLarge);
        assert!(result.is_empty());
    }

    #[test]
    fn vanished_files_are_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gone.rs", b"x");
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();
        fs::remove_file(dir.path().join("gone.rs")).unwrap();

        let unit = ProcessingUnit::RootFiles;
        let result = Extractor::new(&tree, &rules).extract(&unit).unwrap();
        assert_eq!(result.skipped[0].reason, SkipReason::Unreadable);
    }

    #[test]
    fn progress_events_bracket_each_unit() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.py", b"x = 1");
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();
        let sink = RecordingSink::new();

        let unit = ProcessingUnit::RootFiles;
        Extractor::new(&tree, &rules)
            .with_progress(&sink)
            .extract_at(&unit, 2, 3)
            .unwrap();
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::UnitStarted { index: 2, total: 3, .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::UnitCompleted { file_count: 1, skipped: 0, .. }
        ));
    }

    #[test]
    fn cancellation_abandons_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.py", b"x = 1");
        let rules = RuleSet::default();
        let tree = build_tree(dir.path(), &rules).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let sink = RecordingSink::new();

        let unit = ProcessingUnit::RootFiles;
        let err = Extractor::new(&tree, &rules)
            .with_progress(&sink)
            .with_cancel(cancel)
            .extract(&unit)
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::UnitStarted { .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::UnitCancelled { files_read: 0, .. }
        ));
    }

    #[test]
    fn fences_outgrow_embedded_backticks() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("has ``` inside"), "````");
    }
}

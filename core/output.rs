use crate::error::{AppError, Result};
use crate::extract::ExtractionResult;
use crate::selection::ProcessingUnit;
use chrono::{DateTime, Utc};
use log;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

const MAX_NAME_ATTEMPTS: usize = 100;

/// Identity of one unit's document within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub unit_name: String,
}

impl RunMetadata {
    /// Stamps `unit` with the shared run id and the current time.
    pub fn for_unit(run_id: Uuid, unit: &ProcessingUnit) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            unit_name: unit.name(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentHeader<'a> {
    run_id: &'a Uuid,
    generated_at: String,
    unit: &'a str,
    file_count: usize,
    char_count: usize,
    word_count: usize,
}

/// Renders the full document: metadata front matter, title, then the body.
pub fn render_document(result: &ExtractionResult<'_>, metadata: &RunMetadata) -> Result<String> {
    let header = DocumentHeader {
        run_id: &metadata.run_id,
        generated_at: metadata.started_at.to_rfc3339(),
        unit: &metadata.unit_name,
        file_count: result.file_count,
        char_count: result.char_count,
        word_count: result.word_count,
    };
    let front_matter = serde_yml::to_string(&header)?;
    let mut document = String::with_capacity(front_matter.len() + result.body.len() + 64);
    document.push_str("---\n");
    document.push_str(&front_matter);
    if !front_matter.ends_with('\n') {
        document.push('\n');
    }
    document.push_str("---\n\n");
    document.push_str(&format!("# Codebase extract: {}\n\n", metadata.unit_name));
    document.push_str(&result.body);
    Ok(document)
}

/// Base file name, unique per run and unit: `<timestamp>_<run>_<unit>.md`.
pub fn document_file_name(result: &ExtractionResult<'_>, metadata: &RunMetadata) -> String {
    let run = metadata.run_id.simple().to_string();
    format!(
        "{}_{}_{}.md",
        metadata.started_at.format("%Y%m%d_%H%M%S"),
        &run[..8],
        result.unit.slug()
    )
}

/// Writes one unit's document into `output_dir` and returns its path.
///
/// The document goes to a temporary file first and is moved into place
/// without clobbering; an existing name gets a numeric suffix. On failure
/// nothing is left behind in `output_dir`.
pub fn write_document(
    result: &ExtractionResult<'_>,
    output_dir: &Path,
    metadata: &RunMetadata,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| AppError::DirCreation {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let document = render_document(result, metadata)?;
    let mut temp = NamedTempFile::new_in(output_dir).map_err(|e| AppError::FileWrite {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    temp.write_all(document.as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| AppError::FileWrite {
            path: temp.path().to_path_buf(),
            source: e,
        })?;

    let base_name = document_file_name(result, metadata);
    let stem = base_name.trim_end_matches(".md").to_string();
    let mut target = output_dir.join(&base_name);
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match temp.persist_noclobber(&target) {
            Ok(_) => {
                log::info!(
                    "Wrote {} file(s) for '{}' to {}",
                    result.file_count,
                    metadata.unit_name,
                    target.display()
                );
                return Ok(target);
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("{} exists, trying another name", target.display());
                temp = err.file;
                target = output_dir.join(format!("{}-{}.md", stem, attempt + 1));
            }
            Err(err) => {
                return Err(AppError::FileWrite {
                    path: target,
                    source: err.error,
                });
            }
        }
    }
    Err(AppError::FileWrite {
        path: target,
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free document name left for this unit",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(unit: &ProcessingUnit) -> ExtractionResult<'_> {
        let body = "## File: `a.rs`\n\n```rust\nfn a() {}\n```\n\n".to_string();
        ExtractionResult {
            unit,
            file_count: 1,
            char_count: body.chars().count(),
            word_count: crate::extract::count_words(&body),
            body,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn document_has_front_matter_and_body() {
        let unit = ProcessingUnit::folder("src");
        let result = result(&unit);
        let metadata = RunMetadata::for_unit(Uuid::new_v4(), &unit);
        let document = render_document(&result, &metadata).unwrap();

        assert!(document.starts_with("---\n"));
        assert!(document.contains(&metadata.run_id.to_string()));
        assert!(document.contains("unit: src"));
        assert!(document.contains("file_count: 1"));
        assert!(document.contains(&format!("word_count: {}", result.word_count)));
        assert!(document.ends_with(&result.body));
    }

    #[test]
    fn writes_create_directory_and_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        fs::create_dir_all(&output_dir).unwrap();
        fs::write(output_dir.join("keep.md"), "previous run").unwrap();

        let unit = ProcessingUnit::folder("src/utils");
        let result = result(&unit);
        let metadata = RunMetadata::for_unit(Uuid::new_v4(), &unit);

        let first = write_document(&result, &output_dir, &metadata).unwrap();
        let second = write_document(&result, &output_dir, &metadata).unwrap();
        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().ends_with("_src_utils.md"));
        assert_eq!(fs::read_to_string(output_dir.join("keep.md")).unwrap(), "previous run");

        let entries = fs::read_dir(&output_dir).unwrap().count();
        assert_eq!(entries, 3);
    }

    #[test]
    fn unwritable_target_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let unit = ProcessingUnit::RootFiles;
        let result = result(&unit);
        let metadata = RunMetadata::for_unit(Uuid::new_v4(), &unit);
        let err = write_document(&result, &blocker, &metadata).unwrap_err();
        assert!(matches!(err, AppError::DirCreation { .. }));
    }
}

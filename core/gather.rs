use crate::config::{RuleSet, extension_of};
use crate::error::{AppError, Result};
use crate::rules::{self, Verdict};
use log;
use serde::Serialize;
use std::cell::Cell;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One filesystem entry discovered during a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanNode {
    pub path: PathBuf,
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Directory {
        children: Vec<ScanNode>,
    },
    File {
        verdict: Verdict,
        /// `None` when metadata could not be read during the walk.
        size_bytes: Option<u64>,
    },
}

impl ScanNode {
    fn directory(path: PathBuf, name: String) -> Self {
        Self {
            path,
            name,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// True for file nodes the rule engine accepted at walk time.
    pub fn included(&self) -> bool {
        matches!(self.kind, NodeKind::File { verdict, .. } if verdict.is_included())
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self.kind {
            NodeKind::File { verdict, .. } => Some(verdict),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn size_bytes(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size_bytes, .. } => size_bytes,
            NodeKind::Directory { .. } => None,
        }
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[ScanNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<ScanNode>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Directory could not be enumerated; it appears in the tree empty.
    UnreadableDirectory,
    /// Metadata unavailable; size checks are deferred to read time.
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub directories: usize,
    pub files: usize,
    pub included: usize,
    pub excluded_by_name: usize,
    pub excluded_by_extension: usize,
    pub excluded_by_size: usize,
    pub pruned_directories: usize,
    pub unreadable_directories: usize,
}

/// Immutable snapshot of a scanned root.
#[derive(Debug, Clone)]
pub struct ScanTree {
    root: ScanNode,
    warnings: Vec<ScanWarning>,
    pruned_directories: usize,
}

impl ScanTree {
    pub fn root(&self) -> &ScanNode {
        &self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Path of `path` relative to the scan root, falling back to `path`.
    pub fn relative(&self, path: &Path) -> PathBuf {
        pathdiff::diff_paths(path, self.root_path()).unwrap_or_else(|| path.to_path_buf())
    }

    /// Looks up a node by a path relative to the root. An empty path is the root.
    pub fn find(&self, relative: &Path) -> Option<&ScanNode> {
        let mut current = &self.root;
        for component in relative.components() {
            match component {
                Component::CurDir => continue,
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    current = current.children().iter().find(|c| c.name == name)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            pruned_directories: self.pruned_directories,
            unreadable_directories: self
                .warnings
                .iter()
                .filter(|w| w.kind == WarningKind::UnreadableDirectory)
                .count(),
            ..TreeStats::default()
        };
        tally(&self.root, &mut stats);
        stats
    }
}

fn tally(node: &ScanNode, stats: &mut TreeStats) {
    match &node.kind {
        NodeKind::Directory { children } => {
            stats.directories += 1;
            for child in children {
                tally(child, stats);
            }
        }
        NodeKind::File { verdict, .. } => {
            stats.files += 1;
            match verdict {
                Verdict::Included => stats.included += 1,
                Verdict::ExcludedByName => stats.excluded_by_name += 1,
                Verdict::ExcludedByExtension => stats.excluded_by_extension += 1,
                Verdict::ExcludedBySize => stats.excluded_by_size += 1,
            }
        }
    }
}

/// Walks `root_path` and builds the classified tree.
///
/// Excluded directories are pruned before descent and never appear in the
/// result. Unreadable directories stay in the tree as empty nodes and are
/// reported through [`ScanTree::warnings`]. Symlinks are not followed and are
/// left out of the tree.
pub fn build_tree(root_path: &Path, rules: &RuleSet) -> Result<ScanTree> {
    let root_path = root_path.canonicalize().map_err(|e| AppError::FileRead {
        path: root_path.to_path_buf(),
        source: e,
    })?;
    if !root_path.is_dir() {
        return Err(AppError::NotADirectory { path: root_path });
    }
    log::info!("Walking project directory: {}", root_path.display());

    let root_name = root_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root_path.to_string_lossy().into_owned());
    let mut root = ScanNode::directory(root_path.clone(), root_name);
    let mut warnings = Vec::new();
    let pruned = Cell::new(0usize);

    let walker = WalkDir::new(&root_path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let keep = rules::classify(rules, &name, "", None, true).is_included();
            if !keep {
                log::debug!("Pruning excluded directory: {}", entry.path().display());
                pruned.set(pruned.get() + 1);
            }
            keep
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                let kind = if path.is_dir() {
                    WarningKind::UnreadableDirectory
                } else {
                    WarningKind::Metadata
                };
                log::warn!("Error walking '{}': {}", path.display(), err);
                warnings.push(ScanWarning {
                    path,
                    message: err.to_string(),
                    kind,
                });
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(&root_path) else {
            log::warn!("Could not get relative path for: {}", path.display());
            continue;
        };
        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some(name) = components.last().cloned() else {
            continue;
        };

        let file_type = entry.file_type();
        let node = if file_type.is_dir() {
            ScanNode::directory(path.to_path_buf(), name)
        } else if file_type.is_file() {
            let size_bytes = match entry.metadata() {
                Ok(metadata) => Some(metadata.len()),
                Err(err) => {
                    log::warn!("Metadata unavailable for '{}': {}", path.display(), err);
                    warnings.push(ScanWarning {
                        path: path.to_path_buf(),
                        message: err.to_string(),
                        kind: WarningKind::Metadata,
                    });
                    None
                }
            };
            let verdict = rules::classify(rules, &name, extension_of(&name), size_bytes, false);
            ScanNode {
                path: path.to_path_buf(),
                name,
                kind: NodeKind::File {
                    verdict,
                    size_bytes,
                },
            }
        } else {
            log::debug!("Skipping non-regular entry: {}", path.display());
            continue;
        };

        if !insert_node(&mut root, &components, node) {
            log::warn!("Could not place '{}' in the tree", relative.display());
        }
    }

    log::info!(
        "Directory walk complete with {} warning(s).",
        warnings.len()
    );
    Ok(ScanTree {
        root,
        warnings,
        pruned_directories: pruned.get(),
    })
}

/// Inserts `node` at `components` below `parent`, keeping children sorted by
/// name. Returns false when an intermediate directory is missing.
fn insert_node(parent: &mut ScanNode, components: &[String], node: ScanNode) -> bool {
    let Some((first, rest)) = components.split_first() else {
        return false;
    };
    let Some(children) = parent.children_mut() else {
        return false;
    };
    match children.binary_search_by(|child| child.name.as_str().cmp(first)) {
        Ok(index) if !rest.is_empty() => insert_node(&mut children[index], rest, node),
        Ok(_) => {
            log::trace!("Duplicate tree entry ignored: {}", node.path.display());
            true
        }
        Err(index) if rest.is_empty() => {
            children.insert(index, node);
            true
        }
        Err(_) => false,
    }
}

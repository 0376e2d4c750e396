use crate::error::{AppError, Result};
use crate::gather::{ScanNode, ScanTree};
use log;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const ROOT_FILES_NAME: &str = "./";
/// Folder slugs only contain alphanumerics, `-`, `_` and `.`.
const ROOT_FILES_SLUG: &str = "@root";

/// A disjoint extraction scope producing one document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessingUnit {
    /// A subtree, by path relative to the scan root. An empty path is the
    /// whole tree.
    Folder { root_path: PathBuf },
    /// Files directly inside the scan root, no subdirectories.
    RootFiles,
}

impl ProcessingUnit {
    pub fn folder(root_path: impl Into<PathBuf>) -> Self {
        ProcessingUnit::Folder {
            root_path: root_path.into(),
        }
    }

    /// Human-readable name, used in headers and progress output.
    ///
    /// Folder names never end in `/`, so the root-files name `./` cannot
    /// collide with a folder, not even one called `root`.
    pub fn name(&self) -> String {
        match self {
            ProcessingUnit::Folder { root_path } if root_path.as_os_str().is_empty() => {
                ".".to_string()
            }
            ProcessingUnit::Folder { root_path } => root_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            ProcessingUnit::RootFiles => ROOT_FILES_NAME.to_string(),
        }
    }

    /// Filesystem-safe form of [`name`](Self::name) for output file names.
    pub fn slug(&self) -> String {
        let slug: String = match self {
            ProcessingUnit::Folder { root_path } if root_path.as_os_str().is_empty() => {
                "all".to_string()
            }
            ProcessingUnit::Folder { .. } => self
                .name()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
                .collect(),
            ProcessingUnit::RootFiles => ROOT_FILES_SLUG.to_string(),
        };
        slug.trim_matches('.').to_string()
    }
}

impl fmt::Display for ProcessingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingUnit::RootFiles => write!(f, "{} (files in root folder only)", ROOT_FILES_NAME),
            ProcessingUnit::Folder { .. } => write!(f, "{}", self.name()),
        }
    }
}

/// One entry of a picker: either the root-files sentinel or a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum SelectionChoice {
    RootFiles,
    Folder(PathBuf),
}

/// What the operator asked to extract, however it was gathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSpec {
    /// Every top-level folder plus the root files, if any are included.
    Everything,
    /// Explicit folder paths, relative to the root or absolute inside it.
    Folders {
        paths: Vec<PathBuf>,
        include_root_files: bool,
    },
    /// Choices picked from [`folder_choices`].
    Picked(Vec<SelectionChoice>),
    RootFilesOnly,
}

/// A presented picker entry. `label` carries the tree connectors; `value`
/// is what the pick resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderChoice {
    pub label: String,
    pub value: SelectionChoice,
    pub depth: usize,
}

/// Flattens the tree into picker choices down to `max_depth` levels.
///
/// The root-files sentinel comes first; every folder appears once.
pub fn folder_choices(tree: &ScanTree, max_depth: usize) -> Result<Vec<FolderChoice>> {
    if max_depth == 0 {
        return Err(AppError::InvalidArgument(
            "Folder depth must be a positive number".to_string(),
        ));
    }
    let mut choices = vec![FolderChoice {
        label: format!(
            "root [{}] (files in root folder only, excl. sub-folders)",
            tree.root().name
        ),
        value: SelectionChoice::RootFiles,
        depth: 0,
    }];
    push_folder_choices(tree.root(), Path::new(""), "", 1, max_depth, &mut choices);
    Ok(choices)
}

fn push_folder_choices(
    node: &ScanNode,
    relative: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    choices: &mut Vec<FolderChoice>,
) {
    let dirs: Vec<&ScanNode> = node.children().iter().filter(|c| c.is_dir()).collect();
    let last_index = dirs.len().saturating_sub(1);
    for (i, dir) in dirs.into_iter().enumerate() {
        let is_last = i == last_index;
        let connector = if is_last { "└── " } else { "├── " };
        let child_relative = relative.join(&dir.name);
        choices.push(FolderChoice {
            label: format!("{}{}{}/", prefix, connector, dir.name),
            value: SelectionChoice::Folder(child_relative.clone()),
            depth,
        });
        if depth < max_depth {
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            push_folder_choices(dir, &child_relative, &child_prefix, depth + 1, max_depth, choices);
        }
    }
}

/// Turns a selection into an ordered list of disjoint units.
///
/// Folder units come first in path order, then the root-files unit. Unknown
/// paths and overlapping folders are rejected before anything is read.
pub fn resolve(tree: &ScanTree, spec: &SelectionSpec) -> Result<Vec<ProcessingUnit>> {
    let (folders, root_files) = match spec {
        SelectionSpec::Everything => {
            let folders: Vec<PathBuf> = tree
                .root()
                .children()
                .iter()
                .filter(|c| c.is_dir())
                .map(|c| PathBuf::from(&c.name))
                .collect();
            let has_root_files = tree.root().children().iter().any(ScanNode::included);
            (folders, has_root_files)
        }
        SelectionSpec::RootFilesOnly => (Vec::new(), true),
        SelectionSpec::Folders {
            paths,
            include_root_files,
        } => {
            let mut folders = Vec::with_capacity(paths.len());
            for path in paths {
                folders.push(normalize_selected(tree, path)?);
            }
            (folders, *include_root_files)
        }
        SelectionSpec::Picked(choices) => {
            let mut folders = Vec::new();
            let mut root_files = false;
            for choice in choices {
                match choice {
                    SelectionChoice::RootFiles => root_files = true,
                    SelectionChoice::Folder(path) => folders.push(normalize_selected(tree, path)?),
                }
            }
            (folders, root_files)
        }
    };

    if folders.is_empty() && !root_files && !matches!(spec, SelectionSpec::Everything) {
        return Err(AppError::Selection(
            "Nothing selected; choose at least one folder or the root files".to_string(),
        ));
    }

    let mut units: Vec<ProcessingUnit> = folders.into_iter().map(ProcessingUnit::folder).collect();
    units.sort();
    check_disjoint(&units, root_files)?;
    if root_files {
        units.push(ProcessingUnit::RootFiles);
    }
    log::debug!(
        "Resolved selection into {} unit(s): {:?}",
        units.len(),
        units.iter().map(ProcessingUnit::name).collect::<Vec<_>>()
    );
    Ok(units)
}

fn normalize_selected(tree: &ScanTree, path: &Path) -> Result<PathBuf> {
    let relative = if path.is_absolute() {
        path.strip_prefix(tree.root_path())
            .map_err(|_| {
                AppError::Selection(format!(
                    "'{}' is outside the scanned root {}",
                    path.display(),
                    tree.root_path().display()
                ))
            })?
            .to_path_buf()
    } else {
        path.to_path_buf()
    };

    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => normalized.push(name),
            _ => {
                return Err(AppError::Selection(format!(
                    "'{}' must stay inside the scanned root",
                    path.display()
                )));
            }
        }
    }

    match tree.find(&normalized) {
        Some(node) if node.is_dir() => Ok(normalized),
        Some(_) => Err(AppError::Selection(format!(
            "'{}' is a file, not a folder",
            path.display()
        ))),
        None => Err(AppError::Selection(format!(
            "'{}' does not exist in the scanned tree or is excluded",
            path.display()
        ))),
    }
}

fn check_disjoint(sorted_folders: &[ProcessingUnit], root_files: bool) -> Result<()> {
    for (i, unit) in sorted_folders.iter().enumerate() {
        let ProcessingUnit::Folder { root_path: a } = unit else {
            continue;
        };
        if root_files && a.as_os_str().is_empty() {
            return Err(AppError::Selection(
                "The whole tree and the root files overlap; select only one of them".to_string(),
            ));
        }
        for other in &sorted_folders[i + 1..] {
            let ProcessingUnit::Folder { root_path: b } = other else {
                continue;
            };
            if b.starts_with(a) || a.starts_with(b) {
                return Err(AppError::Selection(format!(
                    "Overlapping selection: '{}' and '{}'",
                    unit.name(),
                    other.name()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSet;
    use crate::gather::build_tree;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, ScanTree) {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "main.py",
            "src/lib.rs",
            "src/utils/helpers.rs",
            "docs/guide.md",
            "node_modules/x.py",
        ] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "content").unwrap();
        }
        let tree = build_tree(dir.path(), &RuleSet::default()).unwrap();
        (dir, tree)
    }

    #[test]
    fn everything_lists_top_level_folders_then_root() {
        let (_dir, tree) = fixture();
        let units = resolve(&tree, &SelectionSpec::Everything).unwrap();
        assert_eq!(
            units,
            vec![
                ProcessingUnit::folder("docs"),
                ProcessingUnit::folder("src"),
                ProcessingUnit::RootFiles,
            ]
        );
    }

    #[test]
    fn everything_without_root_files_omits_root_unit() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("notes.bin"), "x").unwrap();
        let tree = build_tree(dir.path(), &RuleSet::default()).unwrap();
        let units = resolve(&tree, &SelectionSpec::Everything).unwrap();
        assert_eq!(units, vec![ProcessingUnit::folder("src")]);
    }

    #[test]
    fn overlapping_folders_are_rejected() {
        let (_dir, tree) = fixture();
        let spec = SelectionSpec::Folders {
            paths: vec![PathBuf::from("src"), PathBuf::from("src/utils")],
            include_root_files: false,
        };
        let err = resolve(&tree, &spec).unwrap_err();
        assert!(matches!(err, AppError::Selection(_)));

        let spec = SelectionSpec::Folders {
            paths: vec![PathBuf::from("./src"), PathBuf::from("src")],
            include_root_files: false,
        };
        assert!(resolve(&tree, &spec).is_err());
    }

    #[test]
    fn sibling_prefixes_are_not_overlaps() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["src/a.rs", "src2/b.rs"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let tree = build_tree(dir.path(), &RuleSet::default()).unwrap();
        let spec = SelectionSpec::Folders {
            paths: vec![PathBuf::from("src2"), PathBuf::from("src")],
            include_root_files: true,
        };
        let units = resolve(&tree, &spec).unwrap();
        assert_eq!(
            units,
            vec![
                ProcessingUnit::folder("src"),
                ProcessingUnit::folder("src2"),
                ProcessingUnit::RootFiles,
            ]
        );
    }

    #[test]
    fn unknown_excluded_and_escaping_paths_are_rejected() {
        let (dir, tree) = fixture();
        for path in ["missing", "node_modules", "main.py", "../elsewhere"] {
            let spec = SelectionSpec::Folders {
                paths: vec![PathBuf::from(path)],
                include_root_files: false,
            };
            assert!(resolve(&tree, &spec).is_err(), "{path}");
        }
        let absolute = tree.root_path().join("src");
        let spec = SelectionSpec::Folders {
            paths: vec![absolute],
            include_root_files: false,
        };
        assert_eq!(resolve(&tree, &spec).unwrap(), vec![ProcessingUnit::folder("src")]);
        drop(dir);
    }

    #[test]
    fn whole_tree_conflicts_with_root_files() {
        let (_dir, tree) = fixture();
        let spec = SelectionSpec::Picked(vec![
            SelectionChoice::Folder(PathBuf::from(".")),
            SelectionChoice::RootFiles,
        ]);
        assert!(resolve(&tree, &spec).is_err());
    }

    #[test]
    fn empty_picks_are_rejected() {
        let (_dir, tree) = fixture();
        assert!(resolve(&tree, &SelectionSpec::Picked(Vec::new())).is_err());
        assert_eq!(
            resolve(&tree, &SelectionSpec::RootFilesOnly).unwrap(),
            vec![ProcessingUnit::RootFiles]
        );
    }

    #[test]
    fn folder_choices_map_to_unique_paths() {
        let (_dir, tree) = fixture();
        let choices = folder_choices(&tree, 3).unwrap();
        let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
        assert!(labels[0].starts_with("root ["));
        assert_eq!(&labels[1..], &["├── docs/", "└── src/", "    └── utils/"]);
        assert_eq!(
            choices[3].value,
            SelectionChoice::Folder(PathBuf::from("src/utils"))
        );

        let shallow = folder_choices(&tree, 1).unwrap();
        assert_eq!(shallow.len(), 3);
        assert!(folder_choices(&tree, 0).is_err());
    }

    #[test]
    fn picked_choices_resolve_like_flags() {
        let (_dir, tree) = fixture();
        let choices = folder_choices(&tree, 2).unwrap();
        let picked = SelectionSpec::Picked(vec![choices[3].value.clone(), choices[0].value.clone()]);
        assert_eq!(
            resolve(&tree, &picked).unwrap(),
            vec![ProcessingUnit::folder("src/utils"), ProcessingUnit::RootFiles]
        );
    }

    #[test]
    fn unit_names_and_slugs() {
        assert_eq!(ProcessingUnit::folder("src/utils").name(), "src/utils");
        assert_eq!(ProcessingUnit::folder("src/utils").slug(), "src_utils");
        assert_eq!(ProcessingUnit::folder("").slug(), "all");
        assert_eq!(ProcessingUnit::folder(".github").slug(), "github");
        assert_eq!(ProcessingUnit::RootFiles.name(), "./");
        assert_eq!(ProcessingUnit::RootFiles.slug(), "@root");
    }

    #[test]
    fn root_files_never_share_a_name_with_a_root_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("root")).unwrap();
        fs::write(dir.path().join("root/a.py"), "a = 1").unwrap();
        fs::write(dir.path().join("main.py"), "main()").unwrap();
        let tree = build_tree(dir.path(), &RuleSet::default()).unwrap();

        let units = resolve(&tree, &SelectionSpec::Everything).unwrap();
        assert_eq!(units, vec![ProcessingUnit::folder("root"), ProcessingUnit::RootFiles]);
        assert_ne!(units[0].name(), units[1].name());
        assert_ne!(units[0].slug(), units[1].slug());
    }
}

use crate::config::{RuleSet, extension_of};
use log;
use serde::Serialize;

pub mod mapping;

/// Outcome of classifying one filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Included,
    ExcludedByName,
    ExcludedByExtension,
    ExcludedBySize,
}

impl Verdict {
    pub fn is_included(self) -> bool {
        self == Verdict::Included
    }
}

/// Classifies an entry against the rule set.
///
/// Priority order: excluded directory names, allow-listed filenames,
/// excluded filenames, allowed extensions, size threshold. A `size_bytes` of
/// `None` skips the size check; callers re-check once the size is known.
pub fn classify(
    rules: &RuleSet,
    name: &str,
    extension: &str,
    size_bytes: Option<u64>,
    is_directory: bool,
) -> Verdict {
    if is_directory {
        return if rules.is_excluded_dir(name) {
            Verdict::ExcludedByName
        } else {
            Verdict::Included
        };
    }

    let verdict = if rules.is_allowed_filename(name) {
        Verdict::Included
    } else if rules.is_excluded_filename(name) {
        Verdict::ExcludedByName
    } else if !rules.is_allowed_extension(extension) {
        Verdict::ExcludedByExtension
    } else if exceeds_threshold(rules, size_bytes) {
        Verdict::ExcludedBySize
    } else {
        Verdict::Included
    };
    log::trace!("Classified '{}' as {:?}", name, verdict);
    verdict
}

/// Convenience wrapper deriving the extension from the file name.
pub fn classify_file(rules: &RuleSet, name: &str, size_bytes: Option<u64>) -> Verdict {
    classify(rules, name, extension_of(name), size_bytes, false)
}

/// Size check on its own, for the read-time re-check.
///
/// A file exactly at the threshold passes.
pub fn exceeds_threshold(rules: &RuleSet, size_bytes: Option<u64>) -> bool {
    match (rules.max_file_size(), size_bytes) {
        (Some(max), Some(size)) => size > max,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::default().with_max_file_size(Some(100))
    }

    #[test]
    fn excluded_directory_names_are_case_sensitive() {
        let rules = rules();
        assert_eq!(
            classify(&rules, "node_modules", "", None, true),
            Verdict::ExcludedByName
        );
        assert_eq!(
            classify(&rules, "Node_Modules", "", None, true),
            Verdict::Included
        );
        assert_eq!(classify(&rules, "src", "", None, true), Verdict::Included);
    }

    #[test]
    fn allowed_filename_beats_extension_and_exclusion() {
        let rules = rules();
        assert_eq!(classify_file(&rules, "Dockerfile", Some(10)), Verdict::Included);
        assert_eq!(classify_file(&rules, ".gitignore", Some(10)), Verdict::Included);

        let mut config = crate::config::Config::default();
        config.rules.excluded_filenames.push("Makefile".to_string());
        let rules = config.rule_set().unwrap();
        assert_eq!(classify_file(&rules, "Makefile", None), Verdict::Included);
    }

    #[test]
    fn excluded_filename_and_extension() {
        let rules = rules();
        assert_eq!(
            classify_file(&rules, "package-lock.json", Some(10)),
            Verdict::ExcludedByName
        );
        assert_eq!(
            classify_file(&rules, "logo.png", Some(10)),
            Verdict::ExcludedByExtension
        );
        assert_eq!(classify_file(&rules, "README", Some(10)), Verdict::ExcludedByExtension);
        assert_eq!(classify_file(&rules, "main.PY", Some(10)), Verdict::Included);
    }

    #[test]
    fn size_threshold_boundary() {
        let rules = rules();
        assert_eq!(classify_file(&rules, "a.rs", Some(100)), Verdict::Included);
        assert_eq!(classify_file(&rules, "a.rs", Some(101)), Verdict::ExcludedBySize);
        assert_eq!(classify_file(&rules, "a.rs", None), Verdict::Included);
        assert!(!exceeds_threshold(&RuleSet::default(), Some(u64::MAX)));
    }

    #[test]
    fn classification_is_repeatable() {
        let rules = rules();
        for (name, size, is_dir) in [
            ("lib.rs", Some(5), false),
            ("big.rs", Some(500), false),
            ("target", None, true),
            ("yarn.lock", Some(1), false),
        ] {
            let ext = extension_of(name);
            let first = classify(&rules, name, ext, size, is_dir);
            let second = classify(&rules, name, ext, size, is_dir);
            assert_eq!(first, second, "{name}");
        }
    }
}

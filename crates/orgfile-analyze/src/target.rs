//! Canonical destination computation.

use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::timestamp::{ExtractedDate, TimestampExtractor};

/// Maps a source path to `root / <date formatted by template> / basename`.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    root: PathBuf,
    template: String,
    extractor: TimestampExtractor,
}

impl TargetResolver {
    /// Create a resolver. `template` should pass `orgfile_core::validate_template`;
    /// anything else degrades to the root rather than escaping it.
    pub fn new(root: impl Into<PathBuf>, template: impl Into<String>, extractor: TimestampExtractor) -> Self {
        Self {
            root: root.into(),
            template: template.into(),
            extractor,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectory for a date, or empty when the date is unknown or the
    /// template cannot be rendered from a date alone.
    pub fn subdirectory(&self, date: Option<&ExtractedDate>) -> String {
        let Some(found) = date else {
            return String::new();
        };
        let mut subdir = String::new();
        if write!(subdir, "{}", found.date.format(&self.template)).is_err() {
            warn!(template = %self.template, "template cannot be rendered from a date");
            return String::new();
        }
        subdir
    }

    /// Compute the canonical target for `path`.
    ///
    /// Returns `None` when `path` has no file name component.
    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?;
        let date = self.extractor.extract(path);
        let subdir = self.subdirectory(date.as_ref());

        // Only plain components, so the target never leaves the root.
        let mut target = self.root.clone();
        for component in Path::new(&subdir).components() {
            if let Component::Normal(part) = component {
                target.push(part);
            }
        }
        target.push(name);

        debug!(
            path = %path.display(),
            date = ?date.map(|d| d.date),
            target = %target.display(),
            "resolved target"
        );
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgfile_core::{RuleSet, DEFAULT_TEMPLATE};
    use std::fs;
    use tempfile::TempDir;

    fn resolver(root: &str) -> TargetResolver {
        TargetResolver::new(
            root,
            DEFAULT_TEMPLATE,
            TimestampExtractor::new(RuleSet::default()),
        )
    }

    #[test]
    fn test_resolve_from_parent_dir() {
        let target = resolver("/out").resolve(Path::new("a/2020-01-05/x.jpg")).unwrap();
        assert_eq!(target, PathBuf::from("/out/2020/2020-01-05/x.jpg"));
    }

    #[test]
    fn test_resolve_custom_template() {
        let resolver = TargetResolver::new(
            "/archive",
            "%Y/%m",
            TimestampExtractor::new(RuleSet::default()),
        );
        let target = resolver
            .resolve(Path::new("/import/2008_02_03/IMG12343.CRW"))
            .unwrap();
        assert_eq!(target, PathBuf::from("/archive/2008/02/IMG12343.CRW"));
    }

    #[test]
    fn test_resolve_unknown_date_lands_in_root() {
        let resolver = TargetResolver::new(
            "/out",
            DEFAULT_TEMPLATE,
            TimestampExtractor::new(RuleSet::new(Vec::new())),
        );
        let target = resolver.resolve(Path::new("/does/not/exist.jpg")).unwrap();
        assert_eq!(target, PathBuf::from("/out/exist.jpg"));
    }

    #[test]
    fn test_resolve_uses_mtime_fallback() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b").join("x.jpg");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "pixels").unwrap();

        let target = resolver("/out").resolve(&path).unwrap();
        let date = crate::timestamp::modified_date(&path).unwrap();
        let expected = PathBuf::from("/out")
            .join(date.format("%Y").to_string())
            .join(date.format("%Y-%m-%d").to_string())
            .join("x.jpg");
        assert_eq!(target, expected);
    }

    #[test]
    fn test_time_template_lands_in_root() {
        let resolver = TargetResolver::new(
            "/out",
            "%Y/%H",
            TimestampExtractor::new(RuleSet::default()),
        );
        let target = resolver.resolve(Path::new("a/2020-01-05/x.jpg")).unwrap();
        assert_eq!(target, PathBuf::from("/out/x.jpg"));
    }

    #[test]
    fn test_escaping_template_stays_under_root() {
        for template in ["/tmp/escape-%Y", "../../%Y", "%Y/../.."] {
            let resolver = TargetResolver::new(
                "/out",
                template,
                TimestampExtractor::new(RuleSet::default()),
            );
            let target = resolver.resolve(Path::new("a/2020-01-05/x.jpg")).unwrap();
            assert!(target.starts_with("/out"), "{template} gave {}", target.display());
            assert!(
                target.components().all(|c| c != Component::ParentDir),
                "{template} gave {}",
                target.display()
            );
        }
    }

    #[test]
    fn test_resolve_no_file_name() {
        assert!(resolver("/out").resolve(Path::new("/")).is_none());
        assert!(resolver("/out").resolve(Path::new("photos/..")).is_none());
    }
}

//! Conflict detection and resolution.
//!
//! The engine classifies each source path without touching the filesystem
//! beyond existence checks and hashing. Only paths proven digest-identical to
//! a surviving path are ever classified for removal.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use tracing::debug;

use orgfile_analyze::{IdentityRegistry, TargetResolver};

use crate::operation::{Classification, Decision};
use crate::record::RecordKind;
use crate::OpError;

/// Classifies source paths for the move and dedup pipelines.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    resolver: Option<TargetResolver>,
    dedup_filter: Option<GlobMatcher>,
}

impl DecisionEngine {
    /// Engine for the move pipeline.
    pub fn for_move(resolver: TargetResolver) -> Self {
        Self {
            resolver: Some(resolver),
            dedup_filter: None,
        }
    }

    /// Engine for the dedup pipeline. `None` makes every path eligible.
    pub fn for_dedup(dedup_filter: Option<GlobMatcher>) -> Self {
        Self {
            resolver: None,
            dedup_filter,
        }
    }

    pub fn resolver(&self) -> Option<&TargetResolver> {
        self.resolver.as_ref()
    }

    /// Decide where `source` goes. Anything but a regular file is not found.
    pub fn decide_move(&self, registry: &mut IdentityRegistry, source: &Path) -> Decision {
        let file = |class| Decision::new(RecordKind::File, source, class);

        if !source.is_file() {
            return file(Classification::NotFound);
        }

        let Some(target) = self.resolver.as_ref().and_then(|r| r.resolve(source)) else {
            return file(Classification::NoOp);
        };

        if is_same_file(source, &target) {
            return file(Classification::NoOp).with_target(target);
        }

        if !target.exists() {
            let decision = file(Classification::Move).with_target(target);
            return match registry.lookup(source) {
                Some(id) => decision.with_entry(id),
                None => decision,
            };
        }

        let src = registry.access_path(source);
        let existing = registry.access_path(&target);
        if registry.same_content(src, existing) {
            return file(Classification::DuplicateMove)
                .with_target(target)
                .with_entry(src);
        }

        debug!(
            source = %source.display(),
            target = %target.display(),
            "collision with different content"
        );

        let mut n = 2;
        loop {
            let candidate = disambiguated_path(&target, n);

            if is_same_file(source, &candidate) {
                return file(Classification::NoOp).with_target(candidate);
            }
            if !candidate.exists() {
                return file(Classification::MoveRenamed)
                    .with_target(candidate)
                    .with_entry(src);
            }

            let occupant = registry.access_path(&candidate);
            if registry.same_content(src, occupant) {
                return file(Classification::DuplicateMove)
                    .with_target(candidate)
                    .with_entry(src);
            }
            n += 1;
        }
    }

    /// Decide whether `source` is a removable duplicate. Anything but a
    /// regular file is not found.
    pub fn decide_dedup(&self, registry: &mut IdentityRegistry, source: &Path) -> Decision {
        let dedup = |class| Decision::new(RecordKind::Dedup, source, class);

        if !source.is_file() {
            return dedup(Classification::NotFound);
        }

        // Registered even when not eligible, so it can still act as an original.
        let id = registry.access_path(source);

        if let Some(ref filter) = self.dedup_filter
            && !filter.is_match(source)
        {
            return dedup(Classification::NotEligible).with_entry(id);
        }

        if registry.duplicate_count(id) <= 1 {
            return dedup(Classification::Unique).with_entry(id);
        }

        let original = registry
            .digest(id)
            .and_then(|digest| registry.first_known_path(digest))
            .map(Path::to_path_buf);

        match original {
            Some(original) if original != source && !is_same_file(source, &original) => {
                dedup(Classification::DuplicateDelete)
                    .with_target(original)
                    .with_entry(id)
            }
            _ => dedup(Classification::Original).with_entry(id),
        }
    }
}

/// Compile a dedup eligibility glob.
pub fn compile_filter(pattern: &str) -> Result<GlobMatcher, OpError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| OpError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })
}

/// Name variant used to avoid a collision.
///
/// For "x.jpg" and `n = 2` returns "x-2.jpg"; names without an extension
/// get the suffix appended.
pub fn disambiguated_path(path: &Path, n: usize) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();

    let new_name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}-{}", stem, n),
    };

    parent.join(new_name)
}

/// Whether two paths name the same file, resolving aliases when both exist.
fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgfile_analyze::{Blake3Hasher, TimestampExtractor};
    use orgfile_core::{RuleSet, DEFAULT_TEMPLATE};
    use tempfile::TempDir;

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(Blake3Hasher::new())
    }

    fn move_engine(root: &Path) -> DecisionEngine {
        DecisionEngine::for_move(TargetResolver::new(
            root,
            DEFAULT_TEMPLATE,
            TimestampExtractor::new(RuleSet::default()),
        ))
    }

    /// Source in a dated folder plus an output root.
    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in/2020-01-05/x.jpg");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "pixels").unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        (temp, source, out)
    }

    fn place(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_disambiguated_path() {
        assert_eq!(
            disambiguated_path(Path::new("/out/x.jpg"), 2),
            PathBuf::from("/out/x-2.jpg")
        );
        assert_eq!(
            disambiguated_path(Path::new("/out/archive.tar.gz"), 3),
            PathBuf::from("/out/archive.tar-3.gz")
        );
        assert_eq!(
            disambiguated_path(Path::new("/out/README"), 2),
            PathBuf::from("/out/README-2")
        );
    }

    #[test]
    fn test_compile_filter() {
        let filter = compile_filter("*.jpg").unwrap();
        assert!(filter.is_match("a/b/x.jpg"));
        assert!(!filter.is_match("a/b/x.png"));
        assert!(matches!(
            compile_filter("[unclosed"),
            Err(OpError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_move_not_found() {
        let (_temp, source, out) = fixture();
        let missing = source.with_file_name("gone.jpg");
        let decision = move_engine(&out).decide_move(&mut registry(), &missing);
        assert_eq!(decision.classification, Classification::NotFound);
        assert!(decision.target.is_none());
    }

    #[test]
    fn test_move_free_target() {
        let (_temp, source, out) = fixture();
        let mut registry = registry();
        let decision = move_engine(&out).decide_move(&mut registry, &source);

        assert_eq!(decision.classification, Classification::Move);
        assert_eq!(decision.target, Some(out.join("2020/2020-01-05/x.jpg")));
        // A free target needs no digest.
        assert!(registry.is_empty());
    }

    #[test]
    fn test_move_already_in_place() {
        let (_temp, _source, out) = fixture();
        let placed = out.join("2020/2020-01-05/x.jpg");
        place(&placed, "pixels");

        let decision = move_engine(&out).decide_move(&mut registry(), &placed);
        assert_eq!(decision.classification, Classification::NoOp);
        assert!(!decision.is_actionable());
    }

    #[test]
    fn test_move_identical_target() {
        let (_temp, source, out) = fixture();
        let target = out.join("2020/2020-01-05/x.jpg");
        place(&target, "pixels");

        let decision = move_engine(&out).decide_move(&mut registry(), &source);
        assert_eq!(decision.classification, Classification::DuplicateMove);
        assert_eq!(decision.target, Some(target));
        assert!(decision.source_entry.is_some());
    }

    #[test]
    fn test_move_collision_renames() {
        let (_temp, source, out) = fixture();
        let target = out.join("2020/2020-01-05/x.jpg");
        place(&target, "other pixels");

        let decision = move_engine(&out).decide_move(&mut registry(), &source);
        assert_eq!(decision.classification, Classification::MoveRenamed);
        assert_eq!(decision.target, Some(out.join("2020/2020-01-05/x-2.jpg")));

        place(&out.join("2020/2020-01-05/x-2.jpg"), "third pixels");
        let decision = move_engine(&out).decide_move(&mut registry(), &source);
        assert_eq!(decision.target, Some(out.join("2020/2020-01-05/x-3.jpg")));
    }

    #[test]
    fn test_move_collision_finds_identical_candidate() {
        let (_temp, source, out) = fixture();
        place(&out.join("2020/2020-01-05/x.jpg"), "other pixels");
        place(&out.join("2020/2020-01-05/x-2.jpg"), "pixels");

        let decision = move_engine(&out).decide_move(&mut registry(), &source);
        assert_eq!(decision.classification, Classification::DuplicateMove);
        assert_eq!(decision.target, Some(out.join("2020/2020-01-05/x-2.jpg")));
    }

    #[test]
    fn test_move_rerun_of_renamed_file_is_noop() {
        let (_temp, _source, out) = fixture();
        place(&out.join("2020/2020-01-05/x.jpg"), "other pixels");
        let renamed = out.join("2020/2020-01-05/x-2.jpg");
        place(&renamed, "pixels");

        // x-2.jpg resolves to .../x-2.jpg itself.
        let decision = move_engine(&out).decide_move(&mut registry(), &renamed);
        assert_eq!(decision.classification, Classification::NoOp);
    }

    #[test]
    fn test_dedup_scenario() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a/x.jpg");
        let b = temp.path().join("b/x.jpg");
        let c = temp.path().join("c/y.jpg");
        place(&a, "same");
        place(&b, "same");
        place(&c, "different");

        let engine = DecisionEngine::for_dedup(None);
        let mut registry = registry();

        let first = engine.decide_dedup(&mut registry, &a);
        assert_eq!(first.classification, Classification::Unique);

        let second = engine.decide_dedup(&mut registry, &b);
        assert_eq!(second.classification, Classification::DuplicateDelete);
        assert_eq!(second.target, Some(a.clone()));

        let third = engine.decide_dedup(&mut registry, &c);
        assert_eq!(third.classification, Classification::Unique);

        // Seeing the original again must not condemn it.
        let again = engine.decide_dedup(&mut registry, &a);
        assert_eq!(again.classification, Classification::Original);
    }

    #[test]
    fn test_dedup_filter_excludes_but_registers() {
        let temp = TempDir::new().unwrap();
        let keep = temp.path().join("keep/x.png");
        let dup = temp.path().join("dup/x.jpg");
        place(&keep, "same");
        place(&dup, "same");

        let engine = DecisionEngine::for_dedup(Some(compile_filter("*.jpg").unwrap()));
        let mut registry = registry();

        let first = engine.decide_dedup(&mut registry, &keep);
        assert_eq!(first.classification, Classification::NotEligible);

        let second = engine.decide_dedup(&mut registry, &dup);
        assert_eq!(second.classification, Classification::DuplicateDelete);
        assert_eq!(second.target, Some(keep));
    }

    #[test]
    fn test_dedup_missing_source() {
        let temp = TempDir::new().unwrap();
        let decision =
            DecisionEngine::for_dedup(None).decide_dedup(&mut registry(), &temp.path().join("nope"));
        assert_eq!(decision.classification, Classification::NotFound);
        assert_eq!(decision.kind, RecordKind::Dedup);
    }

    #[test]
    fn test_directory_is_not_a_candidate() {
        let (_temp, source, out) = fixture();
        let dir = source.parent().unwrap().to_path_buf();
        let mut registry = registry();

        let decision = move_engine(&out).decide_move(&mut registry, &dir);
        assert_eq!(decision.classification, Classification::NotFound);
        assert!(decision.target.is_none());

        let decision = DecisionEngine::for_dedup(None).decide_dedup(&mut registry, &dir);
        assert_eq!(decision.classification, Classification::NotFound);

        assert!(dir.is_dir());
        assert!(registry.lookup(&dir).is_none());
    }
}

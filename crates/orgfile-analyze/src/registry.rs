//! In-memory identity registry.
//!
//! Maps every path observed during a run to its content digest, and every
//! digest to the insertion-ordered list of paths carrying it. Digests are
//! computed at most once per distinct path. Entries are never removed, only
//! marked deleted, so an [`EntryId`] held by an in-flight decision stays
//! valid for the whole run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use orgfile_core::Digest;

use crate::hasher::Hasher;

/// Stable handle to a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Outcome of hashing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestState {
    /// Digest computed successfully.
    Known(Digest),
    /// Hashing failed. The entry is treated as unique content.
    Failed(String),
}

impl DigestState {
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Known(digest) => Some(digest),
            Self::Failed(_) => None,
        }
    }
}

/// One path known to the run.
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub path: PathBuf,
    pub digest: DigestState,
    pub deleted: bool,
}

/// Bidirectional path/digest index scoped to one run.
pub struct IdentityRegistry {
    hasher: Box<dyn Hasher>,
    entries: Vec<PathEntry>,
    by_path: IndexMap<PathBuf, EntryId>,
    groups: HashMap<Digest, Vec<EntryId>>,
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("entries", &self.entries.len())
            .field("live", &self.by_path.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl IdentityRegistry {
    /// Create an empty registry using `hasher` for digests.
    pub fn new(hasher: impl Hasher + 'static) -> Self {
        Self {
            hasher: Box::new(hasher),
            entries: Vec::new(),
            by_path: IndexMap::new(),
            groups: HashMap::new(),
        }
    }

    /// Return the live entry for `path`, registering and hashing it first if needed.
    pub fn access_path(&mut self, path: &Path) -> EntryId {
        if let Some(&id) = self.by_path.get(path) {
            return id;
        }

        let digest = match self.hasher.hash(path) {
            Ok(digest) => {
                debug!(path = %path.display(), digest = digest.short(), "hashed");
                DigestState::Known(digest)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "digest failed, treating as unique");
                DigestState::Failed(e.to_string())
            }
        };

        let id = self.push_entry(path.to_path_buf(), digest);
        if let Some(digest) = self.entries[id.0].digest.digest().cloned() {
            self.groups.entry(digest).or_default().push(id);
        }
        id
    }

    /// Live entry for `path`, without hashing.
    pub fn lookup(&self, path: &Path) -> Option<EntryId> {
        self.by_path.get(path).copied()
    }

    pub fn entry(&self, id: EntryId) -> &PathEntry {
        &self.entries[id.0]
    }

    pub fn path(&self, id: EntryId) -> &Path {
        &self.entries[id.0].path
    }

    pub fn digest(&self, id: EntryId) -> Option<&Digest> {
        self.entries[id.0].digest.digest()
    }

    /// Whether two entries are proven to hold identical content.
    ///
    /// False when either digest is unknown.
    pub fn same_content(&self, a: EntryId, b: EntryId) -> bool {
        match (self.digest(a), self.digest(b)) {
            (Some(da), Some(db)) => da == db,
            _ => false,
        }
    }

    /// Number of live entries sharing `id`'s digest, including `id` itself.
    pub fn duplicate_count(&self, id: EntryId) -> usize {
        let entry = &self.entries[id.0];
        match entry.digest.digest() {
            Some(digest) => self.live_members(digest).count(),
            None => usize::from(!entry.deleted),
        }
    }

    /// Oldest surviving path carrying `digest`.
    pub fn first_known_path(&self, digest: &Digest) -> Option<&Path> {
        self.live_members(digest)
            .next()
            .map(|id| self.entries[id.0].path.as_path())
    }

    /// Record that the file behind `id` now lives at `new_path`.
    ///
    /// The digest travels with the content and is not recomputed. The new
    /// entry takes the old one's place in its digest group. When `new_path`
    /// is already a live entry with the same digest, that entry is kept and
    /// returned.
    pub fn rebind(&mut self, id: EntryId, new_path: &Path) -> EntryId {
        let digest = self.entries[id.0].digest.clone();
        self.retire(id);

        if let Some(existing) = self.lookup(new_path) {
            if self.entries[existing.0].digest == digest {
                return existing;
            }
            // Whatever was registered there has been replaced on disk.
            self.retire(existing);
        }

        let new_id = self.push_entry(new_path.to_path_buf(), digest);
        if let Some(digest) = self.entries[new_id.0].digest.digest().cloned() {
            let group = self.groups.entry(digest).or_default();
            match group.iter().position(|&member| member == id) {
                Some(pos) => group[pos] = new_id,
                None => group.push(new_id),
            }
        }
        debug!(
            from = %self.entries[id.0].path.display(),
            to = %new_path.display(),
            "rebound"
        );
        new_id
    }

    /// Mark an entry as no longer present on disk.
    pub fn mark_deleted(&mut self, id: EntryId) {
        self.retire(id);
    }

    /// Drop whatever live entry is registered at `path`.
    ///
    /// Used when a file arrives at `path` whose digest was never computed.
    pub fn forget_path(&mut self, path: &Path) {
        if let Some(id) = self.lookup(path) {
            self.retire(id);
        }
    }

    /// Live paths. Observation order holds until a path is forgotten or
    /// deleted; removal moves the last path into the freed slot.
    pub fn live_paths(&self) -> impl Iterator<Item = &Path> {
        self.by_path.keys().map(PathBuf::as_path)
    }

    /// Total entries ever created, including deleted ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_entry(&mut self, path: PathBuf, digest: DigestState) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(PathEntry {
            path: path.clone(),
            digest,
            deleted: false,
        });
        self.by_path.insert(path, id);
        id
    }

    fn retire(&mut self, id: EntryId) {
        let entry = &mut self.entries[id.0];
        entry.deleted = true;
        if self.by_path.get(&entry.path) == Some(&id) {
            self.by_path.swap_remove(&entry.path);
        }
    }

    fn live_members<'a>(&'a self, digest: &Digest) -> impl Iterator<Item = EntryId> + 'a {
        self.groups
            .get(digest)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| !self.entries[id.0].deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashError;
    use std::cell::RefCell;
    use std::collections::HashMap as Map;
    use std::rc::Rc;

    /// Hashes from a fixed table and counts invocations per path.
    #[derive(Clone, Default)]
    struct TableHasher {
        table: Map<PathBuf, &'static str>,
        calls: Rc<RefCell<Map<PathBuf, usize>>>,
    }

    impl TableHasher {
        fn with(mut self, path: &str, digest: &'static str) -> Self {
            self.table.insert(PathBuf::from(path), digest);
            self
        }

        fn calls(&self, path: &str) -> usize {
            self.calls
                .borrow()
                .get(Path::new(path))
                .copied()
                .unwrap_or(0)
        }
    }

    impl Hasher for TableHasher {
        fn hash(&self, path: &Path) -> Result<Digest, HashError> {
            *self.calls.borrow_mut().entry(path.to_path_buf()).or_default() += 1;
            self.table
                .get(path)
                .map(|d| Digest::new(d))
                .ok_or_else(|| HashError::Command {
                    path: path.to_path_buf(),
                    message: "no such file".into(),
                })
        }
    }

    #[test]
    fn test_access_path_hashes_once() {
        let hasher = TableHasher::default().with("/a", "aa");
        let mut registry = IdentityRegistry::new(hasher.clone());

        let first = registry.access_path(Path::new("/a"));
        let second = registry.access_path(Path::new("/a"));

        assert_eq!(first, second);
        assert_eq!(hasher.calls("/a"), 1);
        assert_eq!(registry.digest(first), Some(&Digest::new("aa")));
    }

    #[test]
    fn test_duplicate_count_and_first_known() {
        let hasher = TableHasher::default()
            .with("/a", "aa")
            .with("/b", "aa")
            .with("/c", "cc");
        let mut registry = IdentityRegistry::new(hasher);

        let a = registry.access_path(Path::new("/a"));
        assert_eq!(registry.duplicate_count(a), 1);

        let b = registry.access_path(Path::new("/b"));
        let c = registry.access_path(Path::new("/c"));

        assert_eq!(registry.duplicate_count(a), 2);
        assert_eq!(registry.duplicate_count(b), 2);
        assert_eq!(registry.duplicate_count(c), 1);
        assert!(registry.same_content(a, b));
        assert!(!registry.same_content(a, c));
        assert_eq!(
            registry.first_known_path(&Digest::new("aa")),
            Some(Path::new("/a"))
        );
    }

    #[test]
    fn test_deleted_entries_excluded() {
        let hasher = TableHasher::default().with("/a", "aa").with("/b", "aa");
        let mut registry = IdentityRegistry::new(hasher);

        let a = registry.access_path(Path::new("/a"));
        let b = registry.access_path(Path::new("/b"));
        registry.mark_deleted(a);

        assert_eq!(registry.duplicate_count(b), 1);
        assert_eq!(
            registry.first_known_path(&Digest::new("aa")),
            Some(Path::new("/b"))
        );
        assert!(registry.lookup(Path::new("/a")).is_none());
        // The handle itself stays readable.
        assert!(registry.entry(a).deleted);
        assert_eq!(registry.path(a), Path::new("/a"));
    }

    #[test]
    fn test_failed_digest_is_unique() {
        let hasher = TableHasher::default().with("/a", "aa");
        let mut registry = IdentityRegistry::new(hasher);

        let a = registry.access_path(Path::new("/a"));
        let broken = registry.access_path(Path::new("/broken"));

        assert!(registry.digest(broken).is_none());
        assert!(matches!(registry.entry(broken).digest, DigestState::Failed(_)));
        assert_eq!(registry.duplicate_count(broken), 1);
        assert!(!registry.same_content(a, broken));
        assert!(!registry.same_content(broken, broken));
    }

    #[test]
    fn test_rebind_keeps_digest_without_rehash() {
        let hasher = TableHasher::default().with("/src/a", "aa").with("/src/b", "aa");
        let mut registry = IdentityRegistry::new(hasher.clone());

        let a = registry.access_path(Path::new("/src/a"));
        registry.access_path(Path::new("/src/b"));
        let moved = registry.rebind(a, Path::new("/out/a"));

        assert_ne!(moved, a);
        assert!(registry.entry(a).deleted);
        assert_eq!(registry.digest(moved), Some(&Digest::new("aa")));
        assert_eq!(registry.lookup(Path::new("/out/a")), Some(moved));
        assert!(registry.lookup(Path::new("/src/a")).is_none());

        // Accessing the new path reuses the rebound entry.
        assert_eq!(registry.access_path(Path::new("/out/a")), moved);
        assert_eq!(hasher.calls("/out/a"), 0);

        // The moved file keeps its place as the original.
        assert_eq!(
            registry.first_known_path(&Digest::new("aa")),
            Some(Path::new("/out/a"))
        );
        assert_eq!(registry.duplicate_count(moved), 2);
    }

    #[test]
    fn test_rebind_onto_identical_entry() {
        let hasher = TableHasher::default().with("/src/a", "aa").with("/out/a", "aa");
        let mut registry = IdentityRegistry::new(hasher);

        let src = registry.access_path(Path::new("/src/a"));
        let tgt = registry.access_path(Path::new("/out/a"));
        let len_before = registry.len();

        let survivor = registry.rebind(src, Path::new("/out/a"));

        assert_eq!(survivor, tgt);
        assert_eq!(registry.len(), len_before);
        assert_eq!(registry.duplicate_count(tgt), 1);
    }

    #[test]
    fn test_rebind_replaces_stale_entry() {
        let hasher = TableHasher::default().with("/src/a", "aa").with("/out/a", "zz");
        let mut registry = IdentityRegistry::new(hasher);

        let src = registry.access_path(Path::new("/src/a"));
        let stale = registry.access_path(Path::new("/out/a"));

        let moved = registry.rebind(src, Path::new("/out/a"));

        assert_ne!(moved, stale);
        assert!(registry.entry(stale).deleted);
        assert_eq!(registry.digest(moved), Some(&Digest::new("aa")));
        assert!(registry.first_known_path(&Digest::new("zz")).is_none());
    }

    #[test]
    fn test_forget_path_and_live_paths() {
        let hasher = TableHasher::default()
            .with("/a", "aa")
            .with("/b", "bb")
            .with("/c", "cc");
        let mut registry = IdentityRegistry::new(hasher);

        registry.access_path(Path::new("/a"));
        registry.access_path(Path::new("/b"));
        registry.access_path(Path::new("/c"));
        registry.forget_path(Path::new("/b"));

        let live: Vec<&Path> = registry.live_paths().collect();
        assert_eq!(live, vec![Path::new("/a"), Path::new("/c")]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lookup_survives_many_removals() {
        let names: Vec<String> = (0..200).map(|n| format!("/f{n}")).collect();
        let mut hasher = TableHasher::default();
        for name in &names {
            hasher = hasher.with(name, "aa");
        }
        let mut registry = IdentityRegistry::new(hasher);
        let ids: Vec<EntryId> = names
            .iter()
            .map(|name| registry.access_path(Path::new(name)))
            .collect();

        for name in names.iter().step_by(2) {
            registry.forget_path(Path::new(name));
        }

        for (n, name) in names.iter().enumerate() {
            let found = registry.lookup(Path::new(name));
            if n % 2 == 0 {
                assert!(found.is_none(), "{name} should be forgotten");
            } else {
                assert_eq!(found, Some(ids[n]));
                assert_eq!(registry.path(ids[n]), Path::new(name));
            }
        }
        assert_eq!(registry.live_paths().count(), 100);
    }
}

//! Content identity and path analysis for orgfile.
//!
//! This crate answers the per-path questions the decision engine asks:
//!
//! - **Identity** - which content does this path hold, and which other
//!   paths hold the same content? See [`IdentityRegistry`].
//! - **Date** - which calendar day does this file belong to? See
//!   [`TimestampExtractor`].
//! - **Destination** - where should the file live? See [`TargetResolver`].
//!
//! ```rust,ignore
//! use orgfile_analyze::{Blake3Hasher, IdentityRegistry};
//!
//! let mut registry = IdentityRegistry::new(Blake3Hasher::new());
//! let a = registry.access_path("a/x.jpg".as_ref());
//! let b = registry.access_path("b/x.jpg".as_ref());
//!
//! if registry.same_content(a, b) {
//!     println!("{} duplicates", registry.duplicate_count(a));
//! }
//! ```

mod hasher;
mod registry;
mod target;
mod timestamp;

pub use hasher::{Blake3Hasher, CommandHasher, HashError, Hasher};
pub use registry::{DigestState, EntryId, IdentityRegistry, PathEntry};
pub use target::TargetResolver;
pub use timestamp::{modified_date, parse_date_prefix, DateSource, ExtractedDate, TimestampExtractor};

// Re-export core types
pub use orgfile_core::{Digest, RuleSet, TimestampRule};

//! Decision engine and file operations for orgfile.
//!
//! Every input path is classified by the [`DecisionEngine`], applied (or only
//! described, in a dry run) by the [`Executor`], and reported as an
//! [`ActionRecord`]. Records can later be fed to the [`UndoReplayer`].

mod conflict;
mod executor;
mod mover;
mod operation;
mod record;
mod session;
mod summary;
mod undo;

pub use conflict::{compile_filter, disambiguated_path, DecisionEngine};
pub use executor::{Execution, Executor};
pub use mover::{FsMover, Mover};
pub use operation::{Classification, Decision, OpError};
pub use record::{ActionRecord, RecordFormat, RecordKind, RecordParseError};
pub use session::{build_hasher, undo_replayer, Session};
pub use summary::RunSummary;
pub use undo::{UndoReplayer, UndoReport};

/// Data model for SpaceSleuth.
///
/// Entries live in a flat arena and refer to each other by [`EntryId`],
/// so lazily-attached children never form ownership cycles with their parent.
pub mod arena;
pub mod entry;
pub mod size;

pub use arena::EntryArena;
pub use entry::{EntryId, FileSystemEntry, SizeState, PERMISSION_DENIED};
pub use size::{format_bytes, format_count, ACCESS_DENIED};

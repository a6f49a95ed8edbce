/// Platform seams: the filesystem primitives the engine consumes and the
/// access-gate capability.
///
/// The engine never calls `std::fs` directly; it goes through
/// [`FileSystem`], so sizing logic can run against the real disk
/// ([`OsFileSystem`]) or a deterministic in-memory tree ([`MemoryFileSystem`]).

pub mod fs;
pub mod memory;
pub mod permissions;

pub use fs::{DirChild, FileSystem, NodeKind, NodeMeta, OsFileSystem, WalkEvent};
pub use memory::MemoryFileSystem;
pub use permissions::{AccessGate, OpenGate, ProbeGate};

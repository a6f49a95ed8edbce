/// SpaceSleuth Core: sizing, aggregation, and the scan session.
///
/// This crate contains all business logic with zero UI dependencies.
/// Frontends (the bundled CLI, or a GUI) drive a [`session::ScanSession`]
/// from a single coordinating thread and observe its state.
///
/// # Modules
///
/// - [`cache`]: Thread-safe memo of computed sizes keyed by path.
/// - [`config`]: Engine configuration (worker count, hidden-entry policy, size mode).
/// - [`error`]: Listing, fault, session and configuration error types.
/// - [`model`]: Arena-allocated entries and byte formatting.
/// - [`platform`]: Filesystem primitives and the access-gate capability.
/// - [`scanner`]: Listing, sizing and parallel batch aggregation.
/// - [`session`]: The scan state machine exposed to frontends.
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod scanner;
pub mod session;

pub use cache::PathSizeCache;
pub use config::{EngineConfig, SizeMode};
pub use error::{ConfigError, EngineError, ListError, ScanFault, SessionError};
pub use model::{format_bytes, EntryId, FileSystemEntry, SizeState};
pub use session::{ScanPhase, ScanSession, ScanState, SessionEvent};

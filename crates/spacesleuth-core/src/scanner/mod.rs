/// Scanner module: listing, sizing, and parallel batch aggregation.
///
/// All filesystem I/O in here runs on the [`pool::WorkerPool`]. Results
/// travel to the session as [`progress::ScanMessage`]s over a crossbeam
/// channel; nothing in this module touches session state directly.
pub mod aggregate;
pub mod calculator;
pub mod lister;
pub mod pool;
pub mod progress;

pub use aggregate::{sort_by_size_desc, AggregationEngine};
pub use calculator::{Measurement, SizeCalculator};
pub use lister::{EntryLister, ListedChild};
pub use pool::WorkerPool;
pub use progress::{BatchId, BatchSummary, BatchTicket, ScanMessage};

/// Upper bound on messages handled per [`crate::session::ScanSession::process_messages`]
/// call, so a frontend frame never stalls behind a flood of updates.
pub const MAX_MESSAGES_PER_PUMP: usize = 300;

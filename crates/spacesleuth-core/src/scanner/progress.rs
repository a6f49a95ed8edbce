/// Worker → coordinator messages: lightweight results sent from pool
/// threads to the session over a crossbeam channel.
///
/// Every message carries the scan generation it belongs to. The session
/// drops any message whose generation is no longer current.
use crate::error::{ListError, ScanFault};
use crate::model::EntryId;
use crate::platform::NodeKind;
use crate::scanner::lister::ListedChild;

/// Session-local batch number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u32);

/// Which scan and which batch a piece of work belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTicket {
    pub generation: u64,
    pub batch: BatchId,
}

/// Result of a whole batch, sent once after every entry has reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Sum of every non-negative entry size.
    pub total: u64,
    /// Some entry was denied or only partially measured.
    pub permission_issue: bool,
    pub measured: usize,
    /// Entries skipped because their scan was superseded.
    pub skipped: usize,
}

#[derive(Debug)]
pub enum ScanMessage {
    /// A directory listing finished.
    Listed {
        ticket: BatchTicket,
        result: Result<Vec<ListedChild>, ListError>,
    },
    /// One entry of a batch has been measured.
    EntrySized {
        ticket: BatchTicket,
        entry: EntryId,
        size: i64,
        partial: bool,
        /// Kind observed by the measurement, when it had to stat the path.
        kind: Option<NodeKind>,
    },
    /// Every entry of the batch has reported.
    BatchFinished {
        ticket: BatchTicket,
        summary: BatchSummary,
    },
    /// The scan root itself has been measured.
    RootSized {
        generation: u64,
        size: i64,
        partial: bool,
    },
    /// Outcome of the access gate's full-access probe.
    AccessProbed { generation: u64, full_access: bool },
    /// A non-fatal problem (e.g. permission denied on one file).
    Fault { generation: u64, fault: ScanFault },
}

impl ScanMessage {
    pub fn generation(&self) -> u64 {
        match self {
            ScanMessage::Listed { ticket, .. }
            | ScanMessage::EntrySized { ticket, .. }
            | ScanMessage::BatchFinished { ticket, .. } => ticket.generation,
            ScanMessage::RootSized { generation, .. }
            | ScanMessage::AccessProbed { generation, .. }
            | ScanMessage::Fault { generation, .. } => *generation,
        }
    }
}

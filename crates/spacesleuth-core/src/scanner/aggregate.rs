/// Batch aggregation: measures a set of sibling entries in parallel.
///
/// Each entry becomes one job on the [`WorkerPool`]. A finished job reports
/// its own result immediately and folds it into the batch totals under one
/// shared mutex. The job that finishes last sends the batch summary, so the
/// summary always follows every per-entry update on the channel.
use crate::model::{EntryArena, EntryId, SizeState};
use crate::scanner::calculator::SizeCalculator;
use crate::scanner::pool::WorkerPool;
use crate::scanner::progress::{BatchSummary, BatchTicket, ScanMessage};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

struct BatchState {
    ticket: BatchTicket,
    totals: Mutex<BatchSummary>,
    remaining: AtomicUsize,
}

#[derive(Clone)]
pub struct AggregationEngine {
    pool: Arc<WorkerPool>,
    calculator: Arc<SizeCalculator>,
    tx: Sender<ScanMessage>,
    generation: Arc<AtomicU64>,
}

impl AggregationEngine {
    pub fn new(
        pool: Arc<WorkerPool>,
        calculator: Arc<SizeCalculator>,
        tx: Sender<ScanMessage>,
        generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            pool,
            calculator,
            tx,
            generation,
        }
    }

    /// Measure every entry of a batch. Returns immediately.
    pub fn run(&self, ticket: BatchTicket, batch: Vec<(EntryId, PathBuf)>) {
        debug!(
            "Batch {:?} (generation {}): {} entries",
            ticket.batch,
            ticket.generation,
            batch.len()
        );
        if batch.is_empty() {
            let _ = self.tx.send(ScanMessage::BatchFinished {
                ticket,
                summary: BatchSummary::default(),
            });
            return;
        }

        let state = Arc::new(BatchState {
            ticket,
            totals: Mutex::new(BatchSummary::default()),
            remaining: AtomicUsize::new(batch.len()),
        });

        for (entry, path) in batch {
            let state = state.clone();
            let calculator = self.calculator.clone();
            let tx = self.tx.clone();
            let generation = self.generation.clone();
            self.pool.spawn(move || {
                if generation.load(Ordering::SeqCst) == state.ticket.generation {
                    let m = calculator.measure(&path);
                    for fault in m.faults {
                        let _ = tx.send(ScanMessage::Fault {
                            generation: state.ticket.generation,
                            fault,
                        });
                    }
                    let _ = tx.send(ScanMessage::EntrySized {
                        ticket: state.ticket,
                        entry,
                        size: m.size,
                        partial: m.partial,
                        kind: m.kind,
                    });
                    let mut totals = state.totals.lock();
                    totals.measured += 1;
                    if m.size >= 0 {
                        totals.total = totals.total.saturating_add(m.size as u64);
                    }
                    if m.size < 0 || m.partial {
                        totals.permission_issue = true;
                    }
                } else {
                    state.totals.lock().skipped += 1;
                }

                if state.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let summary = *state.totals.lock();
                    debug!(
                        "Batch {:?} finished: {} bytes, {} measured, {} skipped",
                        state.ticket.batch, summary.total, summary.measured, summary.skipped
                    );
                    let _ = tx.send(ScanMessage::BatchFinished {
                        ticket: state.ticket,
                        summary,
                    });
                }
            });
        }
    }

    /// Measure the scan root itself, for the root-subtree total.
    pub fn measure_root(&self, generation: u64, path: PathBuf) {
        let calculator = self.calculator.clone();
        let tx = self.tx.clone();
        let current = self.generation.clone();
        self.pool.spawn(move || {
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let m = calculator.measure(&path);
            for fault in m.faults {
                let _ = tx.send(ScanMessage::Fault { generation, fault });
            }
            let _ = tx.send(ScanMessage::RootSized {
                generation,
                size: m.size,
                partial: m.partial,
            });
        });
    }
}

/// Sort by size, largest first. Unset and denied entries go last.
///
/// Stable, so entries of equal size keep their listing order.
pub fn sort_by_size_desc(ids: &mut [EntryId], arena: &EntryArena) {
    ids.sort_by_key(|id| match arena.get(*id).map(|e| e.size) {
        Some(SizeState::Bytes(n)) => (0u8, Reverse(n)),
        Some(SizeState::Unset) => (1, Reverse(0)),
        Some(SizeState::Denied) | None => (2, Reverse(0)),
    });
}

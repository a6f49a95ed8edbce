/// The scan session: the state machine a frontend drives.
///
/// A [`ScanSession`] is owned by one coordinating thread (a UI thread, or
/// the CLI's main thread). It hands all filesystem work to the worker pool
/// and applies the results only inside [`ScanSession::process_messages`],
/// so [`ScanState`] is never touched by a worker.
///
/// # Lifecycle
///
/// `Idle → Scanning → Ready`. Calling [`ScanSession::scan`] again at any
/// point cancels the running scan and starts over: the generation counter
/// is bumped, queued jobs for the old generation skip their I/O, and any
/// message from the old generation is dropped on arrival.
use crate::cache::{CacheStats, PathSizeCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, ListError, ScanFault, SessionError};
use crate::model::{EntryArena, EntryId, FileSystemEntry, PERMISSION_DENIED};
use crate::platform::{AccessGate, FileSystem, NodeKind, OpenGate, OsFileSystem};
use crate::scanner::{
    sort_by_size_desc, AggregationEngine, BatchId, BatchSummary, BatchTicket, EntryLister,
    ListedChild, ScanMessage, SizeCalculator, WorkerPool, MAX_MESSAGES_PER_PUMP,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single wait inside [`ScanSession::wait_until_idle`].
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    /// No scan has been started.
    #[default]
    Idle,
    /// The root is being listed or its entries measured.
    Scanning,
    /// The root batch has completed (or the scan was cancelled).
    Ready,
}

/// Everything a frontend renders.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub phase: ScanPhase,
    pub root: Option<PathBuf>,
    /// Top-level entries. Sorted by size once the root batch completes.
    pub items: Vec<EntryId>,
    /// Sum of the measured top-level entries.
    pub total_size: u64,
    /// Full measurement of the root, hidden entries included.
    pub root_total: Option<i64>,
    pub root_partial: bool,
    /// Work is outstanding (listing, measurement, expansion, or probe).
    pub busy: bool,
    pub permission_issue: bool,
    pub show_permission_prompt: bool,
    pub generation: u64,
    pub started_at: Option<Instant>,
    pub duration: Option<Duration>,
    /// Retained faults, capped by `EngineConfig::max_session_faults`.
    pub faults: Vec<ScanFault>,
    /// Every fault seen, retained or not.
    pub fault_count: usize,
}

/// Notifications for subscribers, sent after the state has changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ScanStarted {
        generation: u64,
        root: PathBuf,
    },
    /// A listing produced entries. `parent` is `None` for the root listing.
    EntriesListed {
        parent: Option<EntryId>,
        count: usize,
    },
    EntryUpdated {
        id: EntryId,
    },
    BatchCompleted {
        parent: Option<EntryId>,
        total: u64,
        permission_issue: bool,
    },
    RootMeasured {
        size: i64,
        partial: bool,
    },
    ScanFinished {
        generation: u64,
        total: u64,
        permission_issue: bool,
        duration: Duration,
    },
    Fault(ScanFault),
}

/// One listing plus its measurement batch.
#[derive(Debug)]
struct PendingBatch {
    parent: Option<EntryId>,
    entries: Vec<EntryId>,
}

pub struct ScanSession {
    config: EngineConfig,
    gate: Arc<dyn AccessGate>,
    pool: Arc<WorkerPool>,
    cache: Arc<PathSizeCache>,
    lister: Arc<EntryLister>,
    engine: AggregationEngine,
    tx: Sender<ScanMessage>,
    rx: Receiver<ScanMessage>,
    generation: Arc<AtomicU64>,
    next_batch: u32,
    batches: HashMap<BatchId, PendingBatch>,
    arena: EntryArena,
    state: ScanState,
    root_pending: bool,
    probe_pending: bool,
    probe_started: bool,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl ScanSession {
    /// A session over the real filesystem that grants every access request.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_parts(config, Arc::new(OsFileSystem), Arc::new(OpenGate))
    }

    pub fn with_parts(
        config: EngineConfig,
        fs: Arc<dyn FileSystem>,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self, EngineError> {
        let pool = Arc::new(WorkerPool::new(config.effective_workers())?);
        let cache = Arc::new(PathSizeCache::new());
        let lister = Arc::new(EntryLister::new(fs.clone(), config.include_hidden));
        let calculator = Arc::new(SizeCalculator::new(fs, cache.clone(), &config));
        let (tx, rx) = crossbeam_channel::unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let engine = AggregationEngine::new(pool.clone(), calculator, tx.clone(), generation.clone());

        Ok(Self {
            config,
            gate,
            pool,
            cache,
            lister,
            engine,
            tx,
            rx,
            generation,
            next_batch: 0,
            batches: HashMap::new(),
            arena: EntryArena::default(),
            state: ScanState::default(),
            root_pending: false,
            probe_pending: false,
            probe_started: false,
            subscribers: Vec::new(),
        })
    }

    // ── Commands ──────────────────────────────────────────────────

    /// Start scanning `root`, or the filesystem root when `None`.
    ///
    /// Any scan in progress is abandoned.
    pub fn scan(&mut self, root: Option<PathBuf>) {
        let root = root.unwrap_or_else(|| PathBuf::from(std::path::MAIN_SEPARATOR.to_string()));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Starting scan of {} (generation {generation})", root.display());

        self.batches.clear();
        self.arena.clear();
        self.root_pending = false;
        self.probe_pending = false;
        self.probe_started = false;
        self.state = ScanState {
            phase: ScanPhase::Scanning,
            root: Some(root.clone()),
            generation,
            started_at: Some(Instant::now()),
            busy: true,
            ..ScanState::default()
        };
        self.emit(SessionEvent::ScanStarted {
            generation,
            root: root.clone(),
        });

        let ticket = self.open_batch(None);
        self.spawn_listing(ticket, root, Some(self.gate.clone()));
    }

    /// Lazily list and measure the children of a directory entry.
    pub fn expand(&mut self, id: EntryId) -> Result<(), SessionError> {
        let entry = self.arena.get(id).ok_or(SessionError::UnknownEntry(id.0))?;
        if !entry.is_directory {
            return Err(SessionError::NotADirectory(entry.path.clone()));
        }
        if entry.is_expanded() {
            return Err(SessionError::AlreadyExpanded(entry.path.clone()));
        }
        if self.batches.values().any(|b| b.parent == Some(id)) {
            return Err(SessionError::ExpansionPending(entry.path.clone()));
        }
        let dir = entry.path.clone();
        debug!("Expanding {}", dir.display());

        let ticket = self.open_batch(Some(id));
        self.refresh_busy();
        self.spawn_listing(ticket, dir, None);
        Ok(())
    }

    /// [`expand`](Self::expand) by path.
    pub fn expand_path(&mut self, path: &Path) -> Result<(), SessionError> {
        match self.arena.id_of(path) {
            Some(id) => self.expand(id),
            None => Err(SessionError::UnknownPath(path.to_path_buf())),
        }
    }

    /// Abandon outstanding work, keeping whatever has been applied.
    ///
    /// Directories whose expansion was still in flight go back to
    /// unexpanded and can be expanded again.
    pub fn cancel(&mut self) {
        if !self.state.busy {
            return;
        }
        let superseded = self.generation.fetch_add(1, Ordering::SeqCst);
        info!("Cancelled scan generation {superseded}");
        self.state.generation = superseded + 1;
        for (_, batch) in self.batches.drain() {
            if let Some(p) = batch.parent.and_then(|pid| self.arena.get_mut(pid)) {
                p.children = None;
            }
        }
        self.root_pending = false;
        self.probe_pending = false;
        for id in self.arena.iter().map(|(id, _)| id).collect::<Vec<_>>() {
            if let Some(e) = self.arena.get_mut(id) {
                e.is_calculating = false;
            }
        }
        if self.state.phase == ScanPhase::Scanning {
            self.state.phase = ScanPhase::Ready;
            self.state.duration = self.state.started_at.map(|t| t.elapsed());
        }
        self.refresh_busy();
    }

    /// Forget every cached size and scan the current root again.
    pub fn refresh(&mut self) {
        self.cache.clear();
        let root = self.state.root.clone();
        self.scan(root);
    }

    /// Receive [`SessionEvent`]s from now on.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    // ── Message pump ──────────────────────────────────────────────

    /// Apply pending worker messages without blocking.
    ///
    /// Handles at most [`MAX_MESSAGES_PER_PUMP`] messages per call and
    /// returns how many were taken off the channel.
    pub fn process_messages(&mut self) -> usize {
        let mut taken = 0;
        while taken < MAX_MESSAGES_PER_PUMP {
            let msg = match self.rx.try_recv() {
                Ok(m) => m,
                Err(_) => break,
            };
            taken += 1;
            self.handle(msg);
        }
        taken
    }

    /// Pump messages until no work is outstanding or `timeout` expires.
    ///
    /// Returns `true` if the session went idle.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_messages();
            if !self.state.busy {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.rx.recv_timeout(IDLE_POLL.min(deadline - now)) {
                Ok(msg) => self.handle(msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return !self.state.busy,
            }
        }
    }

    // ── Observation ───────────────────────────────────────────────

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn arena(&self) -> &EntryArena {
        &self.arena
    }

    pub fn entry(&self, id: EntryId) -> Option<&FileSystemEntry> {
        self.arena.get(id)
    }

    pub fn find(&self, path: &Path) -> Option<EntryId> {
        self.arena.id_of(path)
    }

    /// Top-level entries in display order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &FileSystemEntry)> + '_ {
        self.state
            .items
            .iter()
            .filter_map(|id| self.arena.get(*id).map(|e| (*id, e)))
    }

    /// Expanded children of `id` in display order.
    pub fn children(&self, id: EntryId) -> impl Iterator<Item = (EntryId, &FileSystemEntry)> + '_ {
        self.arena
            .children(id)
            .iter()
            .filter_map(|c| self.arena.get(*c).map(|e| (*c, e)))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.threads()
    }

    // ── Internals ─────────────────────────────────────────────────

    fn open_batch(&mut self, parent: Option<EntryId>) -> BatchTicket {
        let batch = BatchId(self.next_batch);
        self.next_batch = self.next_batch.wrapping_add(1);
        self.batches.insert(
            batch,
            PendingBatch {
                parent,
                entries: Vec::new(),
            },
        );
        BatchTicket {
            generation: self.state.generation,
            batch,
        }
    }

    /// List `dir` on the pool. With a gate, access is checked (and requested
    /// if refused) on the worker first; the coordinator never waits on it.
    fn spawn_listing(
        &self,
        ticket: BatchTicket,
        dir: PathBuf,
        gate: Option<Arc<dyn AccessGate>>,
    ) {
        let lister = self.lister.clone();
        let tx = self.tx.clone();
        let current = self.generation.clone();
        self.pool.spawn(move || {
            if current.load(Ordering::SeqCst) != ticket.generation {
                return;
            }
            if let Some(gate) = gate {
                if !(gate.can_access(&dir) || gate.request_access(&dir)) {
                    warn!("Access to {} was refused", dir.display());
                    let result = Err(ListError::PermissionDenied { path: dir });
                    let _ = tx.send(ScanMessage::Listed { ticket, result });
                    return;
                }
            }
            let result = lister.list(&dir);
            let _ = tx.send(ScanMessage::Listed { ticket, result });
        });
    }

    fn handle(&mut self, msg: ScanMessage) {
        if msg.generation() != self.state.generation {
            debug!("Dropping stale message from generation {}", msg.generation());
            return;
        }
        match msg {
            ScanMessage::Listed { ticket, result } => self.on_listed(ticket, result),
            ScanMessage::EntrySized {
                ticket,
                entry,
                size,
                partial,
                kind,
            } => self.on_entry_sized(ticket, entry, size, partial, kind),
            ScanMessage::BatchFinished { ticket, summary } => {
                self.on_batch_finished(ticket, summary)
            }
            ScanMessage::RootSized { size, partial, .. } => {
                self.root_pending = false;
                self.state.root_total = Some(size);
                self.state.root_partial = partial;
                if size < 0 || partial {
                    self.flag_permission_issue();
                }
                self.emit(SessionEvent::RootMeasured { size, partial });
                self.refresh_busy();
            }
            ScanMessage::AccessProbed { full_access, .. } => {
                self.probe_pending = false;
                self.state.show_permission_prompt = self.state.permission_issue && !full_access;
                debug!(
                    "Full-access probe: {full_access}, prompt: {}",
                    self.state.show_permission_prompt
                );
                self.refresh_busy();
            }
            ScanMessage::Fault { fault, .. } => self.record_fault(fault),
        }
    }

    fn on_listed(&mut self, ticket: BatchTicket, result: Result<Vec<ListedChild>, ListError>) {
        let Some(parent) = self.batches.get(&ticket.batch).map(|b| b.parent) else {
            return;
        };

        let children = match result {
            Ok(children) => children,
            Err(err) => {
                warn!("{err}");
                self.batches.remove(&ticket.batch);
                self.record_fault(ScanFault::from(&err));
                self.flag_permission_issue();
                match parent {
                    None => self.finish_scan(0),
                    Some(pid) => {
                        let reason = if err.is_permission_denied() {
                            PERMISSION_DENIED.to_string()
                        } else {
                            err.to_string()
                        };
                        if let Some(p) = self.arena.get_mut(pid) {
                            p.mark_listing_failed(&reason);
                        }
                        self.emit(SessionEvent::BatchCompleted {
                            parent,
                            total: 0,
                            permission_issue: true,
                        });
                    }
                }
                self.refresh_busy();
                return;
            }
        };

        let mut ids = Vec::with_capacity(children.len());
        let mut jobs = Vec::with_capacity(children.len());
        for child in children {
            let mut entry = FileSystemEntry::new(child.path.clone(), child.is_directory, parent);
            entry.classified = child.classified;
            entry.is_calculating = true;
            let id = self.arena.insert(entry);
            // A cancelled expansion may have left this path in the arena.
            if let Some(existing) = self.arena.get_mut(id) {
                existing.is_calculating = true;
            }
            ids.push(id);
            jobs.push((id, child.path));
        }

        match parent {
            None => self.state.items = ids.clone(),
            Some(pid) => {
                if let Some(p) = self.arena.get_mut(pid) {
                    p.children = Some(ids.clone());
                }
            }
        }
        self.emit(SessionEvent::EntriesListed {
            parent,
            count: ids.len(),
        });
        if let Some(batch) = self.batches.get_mut(&ticket.batch) {
            batch.entries = ids;
        }
        self.engine.run(ticket, jobs);
    }

    fn on_entry_sized(
        &mut self,
        ticket: BatchTicket,
        id: EntryId,
        size: i64,
        partial: bool,
        kind: Option<NodeKind>,
    ) {
        let Some(parent) = self.batches.get(&ticket.batch).map(|b| b.parent) else {
            return;
        };
        if let Some(entry) = self.arena.get_mut(id) {
            if !entry.classified && kind == Some(NodeKind::Directory) {
                debug!("Reclassified {} as a directory", entry.path.display());
                entry.is_directory = true;
                entry.classified = true;
            }
            entry.apply_measurement(size, partial);
        }
        if parent.is_none() && size >= 0 {
            self.state.total_size = self.state.total_size.saturating_add(size as u64);
        }
        if size < 0 || partial {
            self.flag_permission_issue();
        }
        self.emit(SessionEvent::EntryUpdated { id });
    }

    fn on_batch_finished(&mut self, ticket: BatchTicket, summary: BatchSummary) {
        let Some(mut batch) = self.batches.remove(&ticket.batch) else {
            return;
        };
        sort_by_size_desc(&mut batch.entries, &self.arena);
        if summary.permission_issue {
            self.flag_permission_issue();
        }
        self.emit(SessionEvent::BatchCompleted {
            parent: batch.parent,
            total: summary.total,
            permission_issue: summary.permission_issue,
        });

        match batch.parent {
            None => {
                self.state.items = batch.entries;
                self.finish_scan(summary.total);
                if self.config.measure_root {
                    self.start_root_total(summary);
                }
            }
            Some(pid) => {
                if let Some(p) = self.arena.get_mut(pid) {
                    p.children = Some(batch.entries);
                }
            }
        }
        self.refresh_busy();
    }

    fn finish_scan(&mut self, total: u64) {
        let duration = self.state.started_at.map(|t| t.elapsed()).unwrap_or_default();
        self.state.total_size = total;
        self.state.phase = ScanPhase::Ready;
        self.state.duration = Some(duration);
        info!(
            "Scan finished: {} entries, {total} bytes in {duration:?}{}",
            self.state.items.len(),
            if self.state.permission_issue {
                " (with permission issues)"
            } else {
                ""
            }
        );
        self.emit(SessionEvent::ScanFinished {
            generation: self.state.generation,
            total,
            permission_issue: self.state.permission_issue,
            duration,
        });
    }

    /// The root total equals the batch total when nothing was hidden from
    /// the listing. Otherwise the root is walked once more, after the batch.
    fn start_root_total(&mut self, summary: BatchSummary) {
        let Some(root) = self.state.root.clone() else {
            return;
        };
        if self.config.include_hidden {
            let size = i64::try_from(summary.total).unwrap_or(i64::MAX);
            self.state.root_total = Some(size);
            self.state.root_partial = summary.permission_issue;
            self.emit(SessionEvent::RootMeasured {
                size,
                partial: summary.permission_issue,
            });
        } else {
            self.root_pending = true;
            self.engine.measure_root(self.state.generation, root);
        }
    }

    fn flag_permission_issue(&mut self) {
        self.state.permission_issue = true;
        if self.probe_started {
            return;
        }
        self.probe_started = true;
        self.probe_pending = true;
        let gate = self.gate.clone();
        let tx = self.tx.clone();
        let generation = self.state.generation;
        self.pool.spawn(move || {
            let full_access = gate.has_full_access();
            let _ = tx.send(ScanMessage::AccessProbed {
                generation,
                full_access,
            });
        });
        self.refresh_busy();
    }

    fn record_fault(&mut self, fault: ScanFault) {
        self.state.fault_count += 1;
        if self.state.faults.len() < self.config.max_session_faults {
            self.state.faults.push(fault.clone());
        }
        self.emit(SessionEvent::Fault(fault));
    }

    fn refresh_busy(&mut self) {
        self.state.busy = !self.batches.is_empty() || self.root_pending || self.probe_pending;
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
    }
}

/// Bounded worker pool for blocking filesystem I/O.
///
/// Every listing and size computation runs here, never on the coordinating
/// thread. The thread count comes from configuration, not from batch size,
/// so a directory with a million children queues a million jobs on a fixed
/// number of threads instead of spawning a million threads.
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("spacesleuth-worker-{i}"))
            .build()?;
        debug!("Worker pool started with {threads} threads");
        Ok(Self { pool, threads })
    }

    /// Queue a job. Returns immediately.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

//! Background execution for directory loads.

use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, trace};

const POOL_MIN_THREADS: usize = 1;
const POOL_MAX_THREADS: usize = 4;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs a job somewhere other than the observing thread.
pub trait TaskExecutor {
    fn execute(&self, job: Job);
}

static POOL_THREADS: OnceCell<usize> = OnceCell::new();
static LOAD_POOL: OnceCell<ThreadPool> = OnceCell::new();

/// Fixes the shared pool size; only effective before the pool's first use.
pub fn configure_shared_pool(threads: Option<usize>) -> bool {
    let threads = threads
        .unwrap_or_else(num_cpus::get)
        .clamp(POOL_MIN_THREADS, POOL_MAX_THREADS);
    POOL_THREADS.set(threads).is_ok()
}

fn shared_pool() -> &'static ThreadPool {
    LOAD_POOL.get_or_init(|| {
        let threads = *POOL_THREADS
            .get_or_init(|| num_cpus::get().clamp(POOL_MIN_THREADS, POOL_MAX_THREADS));
        debug!(threads, "building principal load pool");
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("principal-load-{i}"))
            .panic_handler(|_| error!("principal load job panicked"))
            .build()
            .expect("failed to build principal load pool")
    })
}

/// Process-wide rayon pool shared by every directory instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedPoolExecutor;

impl TaskExecutor for SharedPoolExecutor {
    fn execute(&self, job: Job) {
        trace!("scheduling principal load");
        shared_pool().spawn_fifo(job);
    }
}

/// Runs the job on the calling thread before returning.
///
/// Results still go through the loader's hand-off, so observers see the
/// same `Loading` then terminal sequence as with a pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

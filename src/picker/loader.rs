use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::executor::TaskExecutor;
use crate::principals::{
    enumerate, merge, ApplicationDirectory, DirectoryError, DirectoryErrorCode, DirectoryResult,
    Namespace, Principal, PrincipalTableReader,
};
use crate::reactive::{Signal, Subscription};

/// Life cycle of one directory load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Error(DirectoryError),
    Success(Arc<Vec<Principal>>),
}

impl LoadState {
    pub fn principals(&self) -> Option<&[Principal]> {
        match self {
            LoadState::Success(principals) => Some(principals.as_slice()),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Loading)
    }
}

/// Inputs of one load; everything here is moved onto the worker.
pub struct LoadRequest {
    pub table: Box<dyn PrincipalTableReader + Send>,
    pub apps: Arc<dyn ApplicationDirectory>,
}

impl LoadRequest {
    pub fn new(table: Box<dyn PrincipalTableReader + Send>, apps: Arc<dyn ApplicationDirectory>) -> Self {
        Self { table, apps }
    }

    pub fn namespace(&self) -> Namespace {
        self.table.namespace()
    }
}

/// Enumerates, queries installed applications and merges, in that order.
pub fn load_principals(request: LoadRequest) -> DirectoryResult<Vec<Principal>> {
    let LoadRequest { mut table, apps } = request;
    let namespace = table.namespace();
    let os_entries = enumerate(table.as_mut())?;
    let installed = apps.list_installed_applications()?;
    Ok(merge(os_entries, installed, namespace, |app| apps.label(app)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Owns one load: publishes `Loading` on construction and exactly one
/// terminal state once the worker's result is joined on the observing thread.
pub struct PrincipalListLoader {
    namespace: Namespace,
    state: Signal<LoadState>,
    pending: RefCell<Option<oneshot::Receiver<LoadState>>>,
}

impl PrincipalListLoader {
    pub fn start(request: LoadRequest, executor: &dyn TaskExecutor) -> Self {
        let namespace = request.namespace();
        let state = Signal::new(LoadState::Loading);
        let (tx, rx) = oneshot::channel();
        debug!(namespace = %namespace, "principal load scheduled");
        executor.execute(Box::new(move || {
            let terminal = match catch_unwind(AssertUnwindSafe(|| load_principals(request))) {
                Ok(Ok(principals)) => {
                    info!(namespace = %namespace, count = principals.len(), "principal load finished");
                    LoadState::Success(Arc::new(principals))
                }
                Ok(Err(err)) => {
                    warn!(namespace = %namespace, error = %err, "principal load failed");
                    LoadState::Error(err)
                }
                Err(payload) => {
                    error!(
                        namespace = %namespace,
                        panic = panic_message(payload.as_ref()),
                        "principal load worker panicked"
                    );
                    LoadState::Error(DirectoryError::new(
                        DirectoryErrorCode::WorkerUnavailable,
                        "Principal load worker panicked",
                    ))
                }
            };
            if tx.send(terminal).is_err() {
                debug!(namespace = %namespace, "principal load result dropped, loader is gone");
            }
        }));
        Self {
            namespace,
            state,
            pending: RefCell::new(Some(rx)),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    pub(crate) fn signal(&self) -> &Signal<LoadState> {
        &self.state
    }

    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn observe(&self, observer: impl Fn(&LoadState) + 'static) -> Subscription {
        self.state.observe(observer)
    }

    /// True while the worker's result has not been published yet.
    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Publishes the worker's result if it has arrived. Returns whether a
    /// terminal state was published by this call.
    pub fn dispatch_pending(&self) -> bool {
        let Some(mut rx) = self.pending.borrow_mut().take() else {
            return false;
        };
        let terminal = match rx.try_recv() {
            Ok(state) => state,
            Err(oneshot::error::TryRecvError::Empty) => {
                *self.pending.borrow_mut() = Some(rx);
                return false;
            }
            Err(oneshot::error::TryRecvError::Closed) => self.worker_lost(),
        };
        self.publish(terminal);
        true
    }

    /// Blocks the observing thread until the worker finishes, then publishes.
    pub fn wait_until_loaded(&self) -> LoadState {
        let Some(rx) = self.pending.borrow_mut().take() else {
            return self.state.get();
        };
        let terminal = rx.blocking_recv().unwrap_or_else(|_| self.worker_lost());
        self.publish(terminal.clone());
        terminal
    }

    fn worker_lost(&self) -> LoadState {
        warn!(namespace = %self.namespace, "principal load worker exited without a result");
        LoadState::Error(DirectoryError::new(
            DirectoryErrorCode::WorkerUnavailable,
            "Principal load worker exited without a result",
        ))
    }

    fn publish(&self, terminal: LoadState) {
        debug!(
            namespace = %self.namespace,
            success = matches!(terminal, LoadState::Success(_)),
            "publishing principal load result"
        );
        self.state.set(terminal);
    }
}

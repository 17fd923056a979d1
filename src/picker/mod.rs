//! Observing-thread side of an owner or group picker.
//!
//! [`PrincipalDirectory`] joins the load state with the filter text into the
//! filtered view and carries the selection. [`PrincipalPicker`] binds one
//! directory to the file whose owner or group is being changed.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

mod filter;
mod loader;
mod selection;
#[cfg(test)]
mod tests;

pub use filter::{matches, position_by_id, recompute};
pub use loader::{load_principals, LoadRequest, LoadState, PrincipalListLoader};
pub use selection::{ChangeKind, SelectionState};

use crate::executor::TaskExecutor;
use crate::principals::{
    current_principal_id, ApplicationDirectory, DirectoryResult, Namespace, Principal,
    SystemTable,
};
use crate::reactive::{Signal, Subscription};

pub struct PrincipalDirectory {
    loader: PrincipalListLoader,
    filter: Signal<String>,
    filtered: Signal<LoadState>,
    selection: SelectionState,
    _bindings: [Subscription; 2],
}

impl PrincipalDirectory {
    /// Publishes `Loading` and schedules the load on `executor`.
    pub fn new(request: LoadRequest, executor: &dyn TaskExecutor) -> Self {
        let loader = PrincipalListLoader::start(request, executor);
        let filter = Signal::new(String::new());
        let filtered = Signal::new(recompute(&loader.state(), ""));

        let on_load = {
            let filter = filter.downgrade();
            let filtered = filtered.downgrade();
            loader.signal().subscribe(move |state| {
                if let (Some(filter), Some(filtered)) = (filter.upgrade(), filtered.upgrade()) {
                    let text = filter.get();
                    filtered.set(recompute(state, &text));
                }
            })
        };
        let on_filter = {
            let base = loader.signal().downgrade();
            let filtered = filtered.downgrade();
            filter.subscribe(move |text| {
                if let (Some(base), Some(filtered)) = (base.upgrade(), filtered.upgrade()) {
                    let state = base.get();
                    filtered.set(recompute(&state, text));
                }
            })
        };

        Self {
            loader,
            filter,
            filtered,
            selection: SelectionState::new(),
            _bindings: [on_load, on_filter],
        }
    }

    /// Directory over the host's passwd or group database.
    pub fn system(
        namespace: Namespace,
        apps: Arc<dyn ApplicationDirectory>,
        executor: &dyn TaskExecutor,
    ) -> Self {
        Self::new(
            LoadRequest::new(Box::new(SystemTable::new(namespace)), apps),
            executor,
        )
    }

    pub fn namespace(&self) -> Namespace {
        self.loader.namespace()
    }

    pub fn load_state(&self) -> LoadState {
        self.loader.state()
    }

    /// Delivers `Loading` first, then exactly one of `Error` or `Success`.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn observe_load_state(&self, observer: impl Fn(&LoadState) + 'static) -> Subscription {
        self.loader.observe(observer)
    }

    /// No-op when `text` equals the current filter.
    pub fn set_filter(&self, text: impl Into<String>) {
        let text = text.into();
        if self.filter.set_if_changed(text) {
            trace!(namespace = %self.namespace(), "principal filter changed");
        }
    }

    pub fn filter(&self) -> String {
        self.filter.get()
    }

    pub fn filtered_view(&self) -> LoadState {
        self.filtered.get()
    }

    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn observe_filtered_view(&self, observer: impl Fn(&LoadState) + 'static) -> Subscription {
        self.filtered.observe(observer)
    }

    pub fn selection_state(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection(&self) -> Option<u32> {
        self.selection.selection()
    }

    pub fn set_selection(&self, id: u32) {
        self.selection.set_selection(id);
    }

    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn observe_selection(&self, observer: impl Fn(ChangeKind) + 'static) -> Subscription {
        self.selection.observe(observer)
    }

    /// Row index of `id` in the filtered view, if it is loaded and visible.
    pub fn find_position_by_id(&self, id: u32) -> Option<usize> {
        self.filtered
            .with(|state| state.principals().and_then(|list| position_by_id(list, id)))
    }

    /// Looks `id` up in the unfiltered load result.
    pub fn principal_by_id(&self, id: u32) -> Option<Principal> {
        self.loader.signal().with(|state| {
            state
                .principals()
                .and_then(|list| position_by_id(list, id).map(|pos| list[pos].clone()))
        })
    }

    pub fn dispatch_pending(&self) -> bool {
        self.loader.dispatch_pending()
    }

    pub fn wait_until_loaded(&self) -> LoadState {
        self.loader.wait_until_loaded()
    }

    pub fn is_pending(&self) -> bool {
        self.loader.is_pending()
    }
}

/// The ownership or group change a confirmed picker hands to the job executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalChange {
    pub path: PathBuf,
    pub namespace: Namespace,
    pub principal: Principal,
    pub recursive: bool,
}

/// Performs ownership and group changes; lives outside this crate.
pub trait FileJobExecutor {
    fn submit(&self, change: PrincipalChange) -> DirectoryResult<()>;
}

/// One picker surface: a directory bound to the file being changed.
pub struct PrincipalPicker {
    directory: PrincipalDirectory,
    path: PathBuf,
    original_id: u32,
    scroll_target: Rc<Cell<Option<usize>>>,
    _view: Subscription,
}

impl PrincipalPicker {
    pub fn new(directory: PrincipalDirectory, path: impl Into<PathBuf>, original_id: u32) -> Self {
        let path = path.into();
        if directory.selection_state().seed(original_id) {
            debug!(id = original_id, path = %path.display(), "selection seeded from file");
        }
        let scroll_target = Rc::new(Cell::new(None));
        let view = {
            let selection = directory.selection_state().clone();
            let scroll_target = scroll_target.clone();
            directory.observe_filtered_view(move |state| {
                let Some(list) = state.principals() else {
                    return;
                };
                if let Some(id) = selection.take_pending_scroll() {
                    let position = position_by_id(list, id);
                    trace!(id, ?position, "initial scroll resolved");
                    if position.is_some() {
                        scroll_target.set(position);
                    }
                }
            })
        };
        Self {
            directory,
            path,
            original_id,
            scroll_target,
            _view: view,
        }
    }

    /// Seeds from the file's current owner (user directory) or group.
    pub fn for_path(directory: PrincipalDirectory, path: &Path) -> DirectoryResult<Self> {
        let id = current_principal_id(path, directory.namespace())?;
        Ok(Self::new(directory, path, id))
    }

    pub fn directory(&self) -> &PrincipalDirectory {
        &self.directory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_id(&self) -> u32 {
        self.original_id
    }

    /// The row to scroll to after the first successful load, handed out once.
    pub fn take_scroll_target(&self) -> Option<usize> {
        self.scroll_target.take()
    }

    /// The change to apply, or `None` when there is nothing to do.
    pub fn confirm(&self, recursive: bool) -> Option<PrincipalChange> {
        let id = self.directory.selection()?;
        if !recursive && id == self.original_id {
            return None;
        }
        let principal = self.directory.principal_by_id(id)?;
        Some(PrincipalChange {
            path: self.path.clone(),
            namespace: self.directory.namespace(),
            principal,
            recursive,
        })
    }

    /// Confirms and submits; returns whether a change was submitted.
    pub fn apply(&self, recursive: bool, jobs: &dyn FileJobExecutor) -> DirectoryResult<bool> {
        let Some(change) = self.confirm(recursive) else {
            return Ok(false);
        };
        debug!(
            path = %change.path.display(),
            namespace = %change.namespace,
            id = change.principal.id,
            recursive,
            "submitting principal change"
        );
        jobs.submit(change)?;
        Ok(true)
    }
}

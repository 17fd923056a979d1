use std::cell::Cell;
use std::rc::Rc;

use crate::reactive::{Signal, Subscription};

/// What a selection observer has to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Re-evaluate the checked state of every visible row.
    FullInvalidate,
}

/// The single chosen principal ID plus the one-shot scroll request that
/// accompanies the initial seed.
#[derive(Clone)]
pub struct SelectionState {
    selected: Signal<Option<u32>>,
    pending_scroll: Rc<Cell<Option<u32>>>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self {
            selected: Signal::new(None),
            pending_scroll: Rc::new(Cell::new(None)),
        }
    }

    /// Sets the initial value from the file's current principal. Only the
    /// first seed takes effect; it also arms the scroll request.
    pub fn seed(&self, id: u32) -> bool {
        if self.selected.with(Option::is_some) {
            return false;
        }
        self.pending_scroll.set(Some(id));
        self.selected.set(Some(id));
        true
    }

    pub fn set_selection(&self, id: u32) {
        self.selected.set(Some(id));
    }

    pub fn selection(&self) -> Option<u32> {
        self.selected.get()
    }

    pub fn is_selected(&self, id: u32) -> bool {
        self.selected.with(|selected| *selected == Some(id))
    }

    /// Called on every `set_selection`, never with a diff.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn observe(&self, observer: impl Fn(ChangeKind) + 'static) -> Subscription {
        self.selected
            .subscribe(move |_| observer(ChangeKind::FullInvalidate))
    }

    /// Returns the armed scroll target at most once.
    pub fn take_pending_scroll(&self) -> Option<u32> {
        self.pending_scroll.take()
    }
}

use parking_lot::Mutex;
use tracing::debug;

use super::dialog::Dialog;
use crate::entity::{EntityId, EntityKey};
use crate::progress::Deadline;

/// What an open overlay shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// Meatball menu of a book, article or assignment row.
    RowMenu { row: EntityKey },
    /// Complete toggle plus deadline row for one chapter pill or item.
    Actions(ActionsMenu),
    DatePicker { target: EntityKey, initial: Deadline },
    Dialog(Dialog),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionsMenu {
    pub target: EntityKey,
    /// "Mark complete" or "Mark incomplete".
    pub toggle_label: String,
    pub deadline_label: String,
}

impl ActionsMenu {
    pub fn new(target: EntityKey, completed: bool, deadline: Deadline) -> Self {
        Self {
            target,
            toggle_label: if completed { "Mark incomplete" } else { "Mark complete" }.to_string(),
            deadline_label: deadline.label(),
        }
    }
}

/// Proof of having opened an overlay; closes only that overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHandle(u64);

#[derive(Debug, Default)]
struct Slot {
    open: Option<(OverlayHandle, Overlay)>,
    next: u64,
}

/// Holds the single open overlay. Opening one closes whatever was open.
#[derive(Debug, Default)]
pub struct OverlaySlot {
    slot: Mutex<Slot>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `overlay`, returning its handle and the overlay it replaced.
    pub fn open(&self, overlay: Overlay) -> (OverlayHandle, Option<Overlay>) {
        let mut slot = self.slot.lock();
        slot.next += 1;
        let handle = OverlayHandle(slot.next);
        debug!(?handle, "open overlay");
        let previous = slot.open.replace((handle, overlay)).map(|(_, o)| o);
        (handle, previous)
    }

    /// Close the overlay `handle` opened. No-op if another overlay replaced it.
    pub fn close(&self, handle: OverlayHandle) -> Option<Overlay> {
        let mut slot = self.slot.lock();
        match &slot.open {
            Some((open, _)) if *open == handle => slot.open.take().map(|(_, o)| o),
            _ => None,
        }
    }

    /// Close whatever is open (Escape, click outside).
    pub fn dismiss(&self) -> Option<Overlay> {
        self.slot.lock().open.take().map(|(_, o)| o)
    }

    pub fn current(&self) -> Option<Overlay> {
        self.slot.lock().open.as_ref().map(|(_, o)| o.clone())
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().open.is_some()
    }
}

/// Convenience for menus anchored to a book row.
pub fn book_menu(book: EntityId) -> Overlay {
    Overlay::RowMenu {
        row: EntityKey::Book(book),
    }
}

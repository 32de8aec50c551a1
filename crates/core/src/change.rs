//! Change detection for access request item saves.
//!
//! A save is captured *before* it is written and compared afterwards. Only a save that moves an
//! existing item to a different status counts as a [`Transition`]. New rows, no-op saves and
//! edits to other fields (such as `rejection_reason`) do not.

use crate::model::{ItemId, ItemStatus};
use crate::store::rows;
use rusqlite::Connection;

/// The stored status of an item at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub item_id: ItemId,
    pub previous: Option<ItemStatus>,
}

/// A real change of an item's status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub item_id: ItemId,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

impl StatusSnapshot {
    /// Compares the captured status against the status just written.
    pub fn transition_to(&self, current: ItemStatus) -> Option<Transition> {
        detect(self.previous, current).map(|from| Transition {
            item_id: self.item_id,
            from,
            to: current,
        })
    }
}

/// Returns the previous status when `previous -> current` is a real transition.
pub fn detect(previous: Option<ItemStatus>, current: ItemStatus) -> Option<ItemStatus> {
    match previous {
        Some(prev) if prev != current => Some(prev),
        _ => None,
    }
}

pub struct ChangeDetector;

impl ChangeDetector {
    /// Captures the stored status of `item_id`.
    ///
    /// Fails open: if the lookup errors or the row is gone, the snapshot has no previous status
    /// and therefore never yields a transition.
    pub fn capture(conn: &Connection, item_id: ItemId) -> StatusSnapshot {
        let previous = match rows::item_status(conn, item_id) {
            Ok(Some(status)) => Some(status),
            Ok(None) => {
                tracing::warn!(item_id = %item_id, "no stored status to compare against");
                None
            }
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "status lookup failed; suppressing transition");
                None
            }
        };

        StatusSnapshot { item_id, previous }
    }
}

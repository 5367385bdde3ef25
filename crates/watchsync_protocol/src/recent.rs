//! Selection of recently touched items for incremental sync.

use crate::item::{Snapshot, Timestamp};
use crate::key::ItemId;
use std::collections::BTreeSet;

/// The ids touched on either side since a cutoff, with both sides'
/// current entries for those ids.
///
/// Running the merge over `local` and `remote` here gives, for every id in
/// `ids`, the same answer a full merge would.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentWindow {
    /// Ids with a record or tombstone modified at or after the cutoff.
    pub ids: BTreeSet<ItemId>,
    /// Local entries (records and tombstones) for those ids.
    pub local: Snapshot,
    /// Remote entries for those ids.
    pub remote: Snapshot,
}

impl RecentWindow {
    /// Selects the window starting at `since`.
    pub fn select(local: &Snapshot, remote: &Snapshot, since: Timestamp) -> Self {
        let ids: BTreeSet<ItemId> = local
            .entries()
            .chain(remote.entries())
            .filter(|e| e.time >= since)
            .map(|e| e.key.item_id().clone())
            .collect();

        let pick = |snapshot: &Snapshot| -> Snapshot {
            snapshot
                .entries()
                .filter(|e| ids.contains(e.key.item_id()))
                .cloned()
                .collect()
        };

        Self {
            local: pick(local),
            remote: pick(remote),
            ids,
        }
    }

    /// Returns true if nothing was touched in the window.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

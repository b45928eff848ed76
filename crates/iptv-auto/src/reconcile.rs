//! Mark-and-sweep reconciliation of a mux inventory against a playlist.

use thiserror::Error;

use crate::mux::{MuxConfig, MuxInventory, MuxStore};
use crate::playlist::PlaylistEntry;

/// Outcome counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Muxes newly created this pass.
    pub created: usize,
    /// Playlist entries that matched an existing mux (repeats included).
    pub matched: usize,
    /// Muxes swept because the playlist no longer lists them.
    pub deleted: usize,
}

impl ReconcileSummary {
    /// Playlist entries accounted for: created plus matched.
    pub fn total(&self) -> usize {
        self.created + self.matched
    }
}

/// The pass made no mutation because the playlist produced no entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("playlist produced no entries, inventory left unchanged")]
pub struct ReconcileAborted;

/// Reconciles `inventory` to exactly the URL set of `entries`.
///
/// Every pre-existing mux is marked delete-pending; each playlist entry
/// then either clears the mark on its mux (updating the display name when
/// it differs) or creates the mux through the store. Whatever stays marked
/// afterwards is swept. An empty entry sequence aborts before the marking
/// step, so a rejected or empty payload can never wipe a previously good
/// inventory.
pub fn reconcile(
    inventory: &mut MuxInventory,
    entries: &[PlaylistEntry],
    store: &dyn MuxStore,
) -> Result<ReconcileSummary, ReconcileAborted> {
    if entries.is_empty() {
        return Err(ReconcileAborted);
    }

    inventory.mark_all();

    let mut summary = ReconcileSummary::default();
    for entry in entries {
        if let Some(existing) = inventory.get_mut(&entry.url) {
            existing.clear_mark();
            // Absent and empty names compare equal.
            if existing.name().unwrap_or("") != entry.name.as_deref().unwrap_or("") {
                existing.set_name(entry.name.clone());
                store.notify_changed(existing);
            }
            summary.matched += 1;
            continue;
        }

        let config = MuxConfig {
            url: entry.url.clone(),
            name: entry.name.clone(),
        };
        let Some(new_entry) = store.create(&config) else {
            continue;
        };
        store.save(&new_entry);
        inventory.insert(new_entry);
        summary.created += 1;
    }

    summary.deleted = inventory.sweep(|swept| store.delete(swept));

    Ok(summary)
}

//! The per-network mux inventory and its persistence seam.
//!
//! A mux is one stream-source definition owned by its network. The
//! inventory keys muxes by URL, so the URL is the identity used for
//! matching during reconciliation; the display name is mutable metadata.

use std::collections::HashMap;

/// Configuration payload offered to the store when a new mux is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    pub url: String,
    pub name: Option<String>,
}

/// One stream-source definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxEntry {
    url: String,
    name: Option<String>,
    /// Delete-pending mark; false outside an active reconciliation pass.
    marked: bool,
}

impl MuxEntry {
    pub fn new(url: impl Into<String>, name: Option<String>) -> Self {
        Self {
            url: url.into(),
            name,
            marked: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(crate) fn clear_mark(&mut self) {
        self.marked = false;
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.marked
    }
}

/// URL-keyed mux collection with mark-and-sweep support.
#[derive(Debug, Default)]
pub struct MuxInventory {
    entries: HashMap<String, MuxEntry>,
}

impl MuxInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&MuxEntry> {
        self.entries.get(url)
    }

    /// Iterates over entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &MuxEntry> {
        self.entries.values()
    }

    pub(crate) fn get_mut(&mut self, url: &str) -> Option<&mut MuxEntry> {
        self.entries.get_mut(url)
    }

    /// Inserts an entry under its own URL, replacing any previous holder.
    pub(crate) fn insert(&mut self, entry: MuxEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Marks every entry delete-pending.
    pub(crate) fn mark_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.marked = true;
        }
    }

    /// Removes every entry still marked, handing each to `on_delete` first.
    /// Returns the number of removed entries.
    pub(crate) fn sweep(&mut self, mut on_delete: impl FnMut(&MuxEntry)) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if entry.marked {
                on_delete(entry);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }
}

/// Persistence and notification hooks for mux lifecycle events.
///
/// Reconciliation drives every inventory mutation through this trait so a
/// host can persist configuration, index muxes elsewhere or broadcast
/// changes. Implementations are called with the network lock held and must
/// not block.
pub trait MuxStore: Send + Sync {
    /// Builds a new mux for the given config.
    ///
    /// Returning `None` vetoes the creation: the playlist entry is skipped
    /// for this pass and will be offered again on the next fetch.
    fn create(&self, config: &MuxConfig) -> Option<MuxEntry>;

    /// Persists a newly created mux.
    fn save(&self, entry: &MuxEntry);

    /// Signals that an existing mux changed its display name.
    fn notify_changed(&self, entry: &MuxEntry);

    /// Removes a mux that the playlist no longer lists. The removal is
    /// permanent, not a disable.
    fn delete(&self, entry: &MuxEntry);
}

/// Store that accepts every creation and ignores the remaining hooks.
///
/// Suitable when the in-memory inventory is the only state a host needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMuxStore;

impl MuxStore for NoopMuxStore {
    fn create(&self, config: &MuxConfig) -> Option<MuxEntry> {
        Some(MuxEntry::new(config.url.clone(), config.name.clone()))
    }

    fn save(&self, _entry: &MuxEntry) {}

    fn notify_changed(&self, _entry: &MuxEntry) {}

    fn delete(&self, _entry: &MuxEntry) {}
}

//! The network handle and its shared state.
//!
//! One [`AutoNetwork`] owns one mux inventory, at most one in-flight HTTP
//! fetch session and one recurring fetch loop. All mutable state sits
//! behind a single exclusive lock; the lock is never held across an await.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::NetworkConfig;
use crate::error::FetchError;
use crate::mux::{MuxEntry, MuxInventory, MuxStore};
use crate::playlist::parse_playlist;
use crate::reconcile::{ReconcileAborted, reconcile};
use crate::scheduler;
use crate::session::{HttpFetchSession, build_client};

/// Mutable network state guarded by the exclusive lock.
#[derive(Debug, Default)]
pub(crate) struct NetworkState {
    pub(crate) inventory: MuxInventory,
    /// The in-flight HTTP fetch session, if any.
    pub(crate) session: Option<HttpFetchSession>,
    /// Pending zero-delay session teardown, if any.
    pub(crate) deferred_close: Option<JoinHandle<()>>,
}

/// State shared between the handle, the fetch loop and fetch sessions.
///
/// The token is cancelled exactly once, at teardown; every state mutation
/// re-checks it under the lock, so no fetch activity can slip in after
/// [`AutoNetwork::shutdown`] has run.
pub(crate) struct NetworkShared {
    pub(crate) config: NetworkConfig,
    pub(crate) client: Client,
    pub(crate) store: Arc<dyn MuxStore>,
    pub(crate) state: Mutex<NetworkState>,
    pub(crate) token: CancellationToken,
    session_seq: AtomicU64,
}

impl NetworkShared {
    pub(crate) fn new(
        config: NetworkConfig,
        store: Arc<dyn MuxStore>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(&config)?,
            config,
            store,
            state: Mutex::new(NetworkState::default()),
            token: CancellationToken::new(),
            session_seq: AtomicU64::new(0),
        })
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.session_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Parses a payload and reconciles the inventory, logging the outcome.
    ///
    /// Called with the state lock already held.
    pub(crate) fn process_payload(&self, state: &mut NetworkState, data: &[u8]) {
        // A rejected format and an entry-less document take the same
        // failure path: the inventory is left untouched.
        let entries = parse_playlist(data).unwrap_or_default();
        match reconcile(&mut state.inventory, &entries, self.store.as_ref()) {
            Ok(summary) => {
                info!(
                    network = %self.config.name,
                    removed = summary.deleted,
                    "removed muxes missing from playlist"
                );
                info!(
                    network = %self.config.name,
                    created = summary.created,
                    total = summary.total(),
                    "playlist reconciled"
                );
            }
            Err(ReconcileAborted) => {
                error!(network = %self.config.name, "unrecognized playlist format");
            }
        }
    }
}

/// A playlist-driven network.
///
/// The network periodically fetches its playlist source and keeps the mux
/// inventory reconciled with whatever the playlist last said. Fetching
/// starts with [`start`](AutoNetwork::start) and stops for good with
/// [`shutdown`](AutoNetwork::shutdown); dropping the handle shuts it down
/// as well.
pub struct AutoNetwork {
    pub(crate) shared: Arc<NetworkShared>,
    pub(crate) scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl AutoNetwork {
    /// Creates the network. No fetching happens until [`start`].
    ///
    /// [`start`]: AutoNetwork::start
    pub fn new(config: NetworkConfig, store: Arc<dyn MuxStore>) -> Result<Self, FetchError> {
        Ok(Self {
            shared: Arc::new(NetworkShared::new(config, store)?),
            scheduler: Mutex::new(None),
        })
    }

    /// Network name, as used on log lines.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Arms the recurring fetch loop; the first cycle runs immediately.
    ///
    /// Must be called from within a Tokio runtime. Calling it again
    /// replaces the previous loop. After [`shutdown`](AutoNetwork::shutdown)
    /// this has no effect.
    pub fn start(&self) {
        let handle = scheduler::spawn(Arc::clone(&self.shared));
        if let Some(previous) = self.scheduler.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Snapshot of the current mux inventory, in no particular order.
    pub fn muxes(&self) -> Vec<MuxEntry> {
        self.shared
            .state
            .lock()
            .inventory
            .entries()
            .cloned()
            .collect()
    }

    /// Tears the network down: stops the fetch loop, cancels any pending
    /// deferred session close and force-terminates an in-flight session.
    ///
    /// Safe to call at any point, including mid-fetch; no fetch activity
    /// follows. The network cannot be restarted afterwards.
    pub fn shutdown(&self) {
        self.shared.token.cancel();
        if let Some(handle) = self.scheduler.lock().take() {
            handle.abort();
        }
        let (deferred, session) = {
            let mut state = self.shared.state.lock();
            (state.deferred_close.take(), state.session.take())
        };
        if let Some(handle) = deferred {
            handle.abort();
        }
        if let Some(session) = session {
            session.close();
        }
    }
}

impl Drop for AutoNetwork {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Playlist-driven mux management for IPTV networks.
//!
//! This crate keeps a network's set of stream-source definitions (muxes)
//! continuously reconciled against an external playlist document. The
//! playlist is re-fetched on a fixed schedule and each fetch drives one
//! mark-and-sweep pass: muxes the playlist still lists survive, missing
//! ones are removed, new ones are created. Malformed payloads and failed
//! fetches never touch the previously reconciled inventory.
//!
//! ## Core Types
//!
//! - [`AutoNetwork`] - the periodically refetched network handle
//! - [`NetworkConfig`] - source URL, refetch period, TLS policy
//! - [`MuxEntry`] / [`MuxInventory`] - the URL-keyed mux collection
//! - [`MuxStore`] - persistence and notification hooks for mux lifecycle
//! - [`parse_playlist`] - the tolerant, format-gated playlist parser
//! - [`reconcile`] - one mark-and-sweep pass over an inventory
//!
//! Fetching alternates between two strategies by URL scheme: a synchronous
//! local-file path (`file://`) and an asynchronous HTTP path (`http://`,
//! `https://`). Either way the next cycle is armed unconditionally, so a
//! bad fetch only means the inventory keeps its last-known-good contents
//! until the next one.

pub mod config;
pub mod error;
pub mod mux;
pub mod network;
pub mod playlist;
pub mod reconcile;

mod file;
mod scheduler;
mod session;

pub use config::{NetworkConfig, PLAYLIST_BODY_LIMIT};
pub use error::FetchError;
pub use mux::{MuxConfig, MuxEntry, MuxInventory, MuxStore, NoopMuxStore};
pub use network::AutoNetwork;
pub use playlist::{FormatError, PlaylistEntry, parse_playlist};
pub use reconcile::{ReconcileAborted, ReconcileSummary, reconcile};

//! Error types for playlist fetching.

use thiserror::Error;

/// Failure of a single fetch cycle.
///
/// None of these are fatal to the network: the cycle is logged as failed,
/// the inventory keeps its last reconciled contents and the next cycle is
/// armed as usual.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured source URL does not parse.
    #[error("invalid playlist URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport-level HTTP failure (connect, TLS, protocol).
    #[error("http transfer failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body exceeded the accepted size.
    #[error("response body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    /// Local file open, stat or read failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The local playlist file exists but has no content.
    #[error("playlist file `{path}` is empty")]
    EmptyFile { path: String },

    /// The buffer for the playlist file could not be reserved.
    #[error("failed to reserve {size} bytes for `{path}`")]
    Allocation { size: usize, path: String },
}

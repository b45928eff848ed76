//! Per-network configuration.

use std::time::Duration;

/// User agent presented on playlist fetches.
pub const USER_AGENT: &str = concat!("iptv-auto/", env!("CARGO_PKG_VERSION"));

/// Upper bound on an HTTP playlist body, in bytes.
pub const PLAYLIST_BODY_LIMIT: usize = 1024 * 1024;

/// Maximum number of redirect hops followed per fetch.
pub const MAX_REDIRECTS: usize = 10;

/// Configuration for one playlist-driven network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name; appears as the `network` field on every log line.
    pub name: String,
    /// Playlist source: `file://<path>`, `http://...` or `https://...`.
    pub url: String,
    /// Minutes between fetch cycles. Values below 1 are clamped to 1.
    pub refetch_period: u64,
    /// Verify the TLS peer certificate on `https` sources.
    pub ssl_peer_verify: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            refetch_period: 60,
            ssl_peer_verify: true,
        }
    }
}

impl NetworkConfig {
    /// Delay between consecutive fetch cycles.
    pub fn refetch_delay(&self) -> Duration {
        Duration::from_secs(self.refetch_period.max(1) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refetch_delay_follows_period() {
        let config = NetworkConfig {
            refetch_period: 5,
            ..Default::default()
        };
        assert_eq!(config.refetch_delay(), Duration::from_secs(300));
    }

    #[test]
    fn refetch_delay_is_at_least_one_minute() {
        let config = NetworkConfig {
            refetch_period: 0,
            ..Default::default()
        };
        assert_eq!(config.refetch_delay(), Duration::from_secs(60));
    }
}

//! The recurring fetch loop.
//!
//! One loop per network. Each cycle issues a fetch and the loop then
//! sleeps for the refetch delay, so the period is measured from issuance
//! to issuance; neither fetch duration nor fetch outcome changes the
//! schedule.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

use crate::error::FetchError;
use crate::file::read_playlist_file;
use crate::network::NetworkShared;
use crate::session::HttpFetchSession;

/// Prefix selecting the synchronous local-file fetch strategy.
const FILE_SCHEME: &str = "file://";

/// Spawns the recurring fetch loop for a network. The first cycle runs
/// immediately.
pub(crate) fn spawn(shared: Arc<NetworkShared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            run_cycle(&shared);
            tokio::select! {
                biased;
                _ = shared.token.cancelled() => {
                    debug!(network = %shared.config.name, "fetch loop stopped");
                    break;
                }
                _ = tokio::time::sleep(shared.config.refetch_delay()) => {}
            }
        }
    })
}

/// One fetch cycle: pick the strategy by scheme and issue the fetch. The
/// HTTP strategy returns without waiting for the transfer to finish.
fn run_cycle(shared: &Arc<NetworkShared>) {
    if let Some(path) = shared.config.url.strip_prefix(FILE_SCHEME) {
        fetch_local(shared, path);
    } else if let Err(e) = fetch_http(shared) {
        error!(network = %shared.config.name, error = %e, "unable to issue playlist fetch");
    }
}

/// Synchronous local-file strategy: read, parse and reconcile in place.
fn fetch_local(shared: &Arc<NetworkShared>, path: &str) {
    match read_playlist_file(path) {
        Ok(data) => {
            let mut state = shared.state.lock();
            if shared.token.is_cancelled() {
                return;
            }
            shared.process_payload(&mut state, &data);
        }
        Err(e) => {
            error!(network = %shared.config.name, path, error = %e, "unable to read playlist file");
        }
    }
}

/// Asynchronous HTTP strategy: force-close any session left over from the
/// previous cycle, then issue a new one.
fn fetch_http(shared: &Arc<NetworkShared>) -> Result<(), FetchError> {
    let url = Url::parse(&shared.config.url).map_err(|e| FetchError::InvalidUrl {
        url: shared.config.url.clone(),
        reason: e.to_string(),
    })?;

    let id = shared.next_session_id();
    let mut state = shared.state.lock();
    if shared.token.is_cancelled() {
        return Ok(());
    }

    if let Some(previous) = state.session.take() {
        debug!(
            network = %shared.config.name,
            session = previous.id(),
            "closing stale fetch session"
        );
        previous.close();
    }

    state.session = Some(HttpFetchSession::spawn(Arc::clone(shared), url, id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::mux::NoopMuxStore;
    use crate::network::AutoNetwork;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("iptv_auto=debug")
            .with_test_writer()
            .try_init();
    }

    fn test_shared(url: &str) -> Arc<NetworkShared> {
        let config = NetworkConfig {
            name: "test".to_string(),
            url: url.to_string(),
            ..Default::default()
        };
        Arc::new(NetworkShared::new(config, Arc::new(NoopMuxStore)).unwrap())
    }

    fn test_network(url: String) -> AutoNetwork {
        let config = NetworkConfig {
            name: "test".to_string(),
            url,
            ..Default::default()
        };
        AutoNetwork::new(config, Arc::new(NoopMuxStore)).unwrap()
    }

    fn http_response(status_line: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    /// Serves exactly one connection with a canned response.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(&response).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/playlist.m3u")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn local_file_source_reconciles_on_start() {
        init_tracing();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"#EXTM3U\n#EXTINF:-1,One\nhttp://example.com/1\nhttp://example.com/2\n")
            .unwrap();

        let network = test_network(format!("file://{}", file.path().display()));
        network.start();
        wait_until(|| network.muxes().len() == 2).await;

        let mut muxes = network.muxes();
        muxes.sort_by(|a, b| a.url().cmp(b.url()));
        assert_eq!(muxes[0].url(), "http://example.com/1");
        assert_eq!(muxes[0].name(), Some("One"));
        // The second URL inherited the same pending name.
        assert_eq!(muxes[1].name(), Some("One"));
        network.shutdown();
    }

    #[tokio::test]
    async fn http_source_reconciles_end_to_end() {
        init_tracing();
        let url = serve_once(http_response(
            "200 OK",
            b"#EXTM3U\n#EXTINF:-1,Alpha\nhttp://example.com/1\n",
        ))
        .await;

        let network = test_network(url);
        network.start();
        wait_until(|| network.muxes().len() == 1).await;
        assert_eq!(network.muxes()[0].name(), Some("Alpha"));

        // The deferred close clears the finished session afterwards.
        wait_until(|| network.shared.state.lock().session.is_none()).await;
        network.shutdown();
    }

    #[tokio::test]
    async fn failed_http_fetch_keeps_inventory() {
        let url = serve_once(http_response("404 Not Found", b"")).await;
        let network = test_network(url);
        {
            let mut state = network.shared.state.lock();
            network
                .shared
                .process_payload(&mut state, b"#EXTM3U\nhttp://example.com/old\n");
        }

        network.start();
        // The deferred close is only scheduled once the completion handler
        // has run, so its appearance means the failed cycle is done.
        wait_until(|| network.shared.state.lock().deferred_close.is_some()).await;

        let muxes = network.muxes();
        assert_eq!(muxes.len(), 1);
        assert_eq!(muxes[0].url(), "http://example.com/old");
        network.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_the_period() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"#EXTM3U\nhttp://example.com/1\n").unwrap();

        let network = test_network(format!("file://{}", file.path().display()));
        network.start();
        wait_until(|| network.muxes().len() == 1).await;

        std::fs::write(file.path(), b"#EXTM3U\nhttp://example.com/1\nhttp://example.com/2\n")
            .unwrap();
        tokio::time::advance(Duration::from_secs(61 * 60)).await;

        wait_until(|| network.muxes().len() == 2).await;
        network.shutdown();
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn stale_session_is_closed_before_reissue() {
        let shared = test_shared("http://127.0.0.1:9/playlist.m3u");
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let stale_handle = tokio::spawn(async move {
            let _guard = SetOnDrop(flag);
            std::future::pending::<()>().await;
        });
        // The guard only exists once the task has been polled; aborting an
        // unstarted task would drop the async block before it is armed.
        tokio::task::yield_now().await;
        shared.state.lock().session = Some(HttpFetchSession::from_parts(1000, stale_handle));

        fetch_http(&shared).unwrap();
        wait_until(|| closed.load(Ordering::Relaxed)).await;

        let mut state = shared.state.lock();
        assert_ne!(state.session.as_ref().map(|s| s.id()), Some(1000));
        if let Some(session) = state.session.take() {
            session.close();
        }
    }

    #[test]
    fn invalid_url_fails_the_cycle() {
        let shared = test_shared("not a playlist url");
        let result = fetch_http(&shared);
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
        assert!(shared.state.lock().session.is_none());
    }

    #[test]
    fn cancelled_network_issues_no_session() {
        let shared = test_shared("http://example.com/playlist.m3u");
        shared.token.cancel();
        run_cycle(&shared);
        assert!(shared.state.lock().session.is_none());
    }

    #[tokio::test]
    async fn shutdown_while_fetch_in_flight() {
        // Server that accepts the connection and never responds.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let _socket = socket;
            std::future::pending::<()>().await;
        });

        let network = test_network(format!("http://{addr}/playlist.m3u"));
        network.start();
        wait_until(|| network.shared.state.lock().session.is_some()).await;

        network.shutdown();

        assert!(network.shared.state.lock().session.is_none());
        assert!(network.scheduler.lock().is_none());
        assert!(network.muxes().is_empty());
    }
}

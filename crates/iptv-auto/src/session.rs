//! HTTP fetch sessions and their completion protocol.
//!
//! Each HTTP cycle issues exactly one session: a spawned task that
//! performs the transfer, hands the terminal outcome to the completion
//! handler and then gets torn down by a separate zero-delay follow-up
//! task. The session never tears itself down from inside its own task.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, StatusCode, redirect};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

use crate::config::{MAX_REDIRECTS, NetworkConfig, PLAYLIST_BODY_LIMIT, USER_AGENT};
use crate::error::FetchError;
use crate::network::NetworkShared;

/// Builds the per-network HTTP client.
pub(crate) fn build_client(config: &NetworkConfig) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(!config.ssl_peer_verify)
        .build()
        .map_err(FetchError::from)
}

/// Terminal state of one HTTP fetch, as seen by the completion handler.
#[derive(Debug)]
pub(crate) struct HttpCompletion {
    /// Response status, if a response arrived at all.
    pub status: Option<StatusCode>,
    /// Transfer failure, if the body did not arrive intact.
    pub result: Option<FetchError>,
    /// Response body; empty unless the transfer completed.
    pub body: Bytes,
}

/// One in-flight playlist retrieval.
///
/// Sessions carry a generation id so a late completion or deferred close
/// can tell whether the network still refers to them.
#[derive(Debug)]
pub(crate) struct HttpFetchSession {
    id: u64,
    handle: JoinHandle<()>,
}

impl HttpFetchSession {
    /// Issues the request for `url` and installs the completion handler.
    pub(crate) fn spawn(shared: Arc<NetworkShared>, url: Url, id: u64) -> Self {
        let handle = tokio::spawn(async move {
            let completion = fetch(&shared.client, url, PLAYLIST_BODY_LIMIT).await;
            on_complete(&shared, id, completion);
        });
        Self { id, handle }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(id: u64, handle: JoinHandle<()>) -> Self {
        Self { id, handle }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Force-terminates the session. Safe on an already finished task.
    pub(crate) fn close(self) {
        self.handle.abort();
    }
}

/// Performs the GET and drains the body up to the size limit.
///
/// All failure modes end up inside the returned completion; this function
/// itself never aborts the protocol.
async fn fetch(client: &Client, url: Url, limit: usize) -> HttpCompletion {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return HttpCompletion {
                status: None,
                result: Some(e.into()),
                body: Bytes::new(),
            };
        }
    };

    let status = response.status();
    match read_body(response, limit).await {
        Ok(body) => HttpCompletion {
            status: Some(status),
            result: None,
            body,
        },
        Err(e) => HttpCompletion {
            status: Some(status),
            result: Some(e),
            body: Bytes::new(),
        },
    }
}

/// Accumulates the response body, failing once it would exceed `limit`.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<Bytes, FetchError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Handles the terminal outcome of a session.
///
/// Redirect and not-modified statuses are left entirely alone: nothing to
/// ingest, and the already-armed periodic cycle stands. Everything else is
/// either processed (HTTP 200, intact, non-empty body) or logged as a
/// failed cycle, and either way the session's teardown is handed to a
/// zero-delay follow-up task. A completion that loses the race against
/// teardown does nothing.
fn on_complete(shared: &Arc<NetworkShared>, id: u64, completion: HttpCompletion) {
    if completion
        .status
        .is_some_and(|status| matches!(status.as_u16(), 301 | 302 | 303 | 304))
    {
        return;
    }

    let mut state = shared.state.lock();
    if shared.token.is_cancelled() {
        return;
    }

    if completion.status == Some(StatusCode::OK)
        && completion.result.is_none()
        && !completion.body.is_empty()
    {
        shared.process_payload(&mut state, &completion.body);
    } else {
        let error = completion
            .result
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        error!(
            network = %shared.config.name,
            status = completion.status.map_or(0, |status| status.as_u16()),
            error = %error,
            bytes = completion.body.len(),
            "unable to fetch playlist"
        );
    }

    // Latest wins: an older pending close is superseded, not awaited.
    state.deferred_close = Some(tokio::spawn(deferred_close(Arc::clone(shared), id)));
}

/// Zero-delay follow-up that clears the stored session reference and then
/// closes the session, outside the task that delivered its completion.
///
/// The stored session may already be a newer one; it is only taken when
/// the generation id still matches.
async fn deferred_close(shared: Arc<NetworkShared>, id: u64) {
    let session = {
        let mut state = shared.state.lock();
        match &state.session {
            Some(session) if session.id() == id => state.session.take(),
            _ => None,
        }
    };
    if let Some(session) = session {
        debug!(network = %shared.config.name, session = id, "closing completed fetch session");
        session.close();
    }
}

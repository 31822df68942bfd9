//! JSON-RPC over the MCP SSE transport.
//!
//! - `GET <sse-url>` opens the event stream; the first `endpoint` event names
//!   the URL requests are POSTed to (relative to the SSE URL).
//! - Requests are POSTed as JSON; the server acknowledges with `202` and the
//!   response arrives later as a `message` event.
//! - A background reader task routes each response to the waiting caller by
//!   JSON-RPC `id`.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::Url;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::McpError;
use crate::sse::SseParser;
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, error_codes};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

// ─── Transport ───────────────────────────────────────────────────────────────

/// One MCP session's event stream plus its POST endpoint.
pub struct SseTransport {
    post_url: Url,
    client: reqwest::Client,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its endpoint.
    ///
    /// `connect_timeout` bounds both the GET and the wait for the `endpoint`
    /// event.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, McpError> {
        let connect_failed = |reason: String| McpError::ConnectFailed {
            url: url.to_string(),
            reason,
        };

        let sse_url = Url::parse(url).map_err(|e| connect_failed(format!("invalid URL: {e}")))?;

        // No overall request timeout: the event stream stays open for the
        // whole session.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        let opened = tokio::time::timeout(connect_timeout, async {
            client
                .get(sse_url.clone())
                .header("Accept", "text/event-stream")
                .send()
                .await
        })
        .await
        .map_err(|_| connect_failed(format!("no response within {connect_timeout:?}")))?
        .map_err(|e| connect_failed(e.to_string()))?;

        let status = opened.status();
        if !status.is_success() {
            return Err(connect_failed(format!("event stream returned HTTP {status}")));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        let reader = tokio::spawn(read_events(
            opened.bytes_stream(),
            pending.clone(),
            closed.clone(),
            endpoint_tx,
        ));

        let endpoint = match tokio::time::timeout(connect_timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                reader.abort();
                return Err(connect_failed(
                    "event stream ended before an endpoint was announced".into(),
                ));
            }
            Err(_) => {
                reader.abort();
                return Err(connect_failed(format!(
                    "no endpoint event within {connect_timeout:?}"
                )));
            }
        };

        let post_url = match resolve_endpoint(&sse_url, &endpoint) {
            Ok(post_url) => post_url,
            Err(e) => {
                reader.abort();
                return Err(connect_failed(e));
            }
        };

        info!(sse_url = %sse_url, post_url = %post_url, "MCP event stream open");

        Ok(Self {
            post_url,
            client,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    /// Whether the event stream has ended or the transport was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a JSON-RPC request and wait for the matching response's `result`.
    ///
    /// Dropping the returned future (e.g. on timeout) forgets the request;
    /// a late response is discarded by the reader.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        debug!(id, method, "MCP request");
        self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let response = rx.await.map_err(|_| McpError::Closed)?;
        extract_result(response)
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }
        debug!(method, "MCP notification");
        self.post(&JsonRpcNotification::new(method, params)).await
    }

    /// Stop the reader task and fail every outstanding request.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader.abort();
        lock(&self.pending).clear();
    }

    async fn post<T: serde::Serialize>(&self, message: &T) -> Result<(), McpError> {
        let response = self
            .client
            .post(self.post_url.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| McpError::TransportError {
                reason: format!("failed to POST to {}: {e}", self.post_url),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::TransportError {
                reason: format!("POST returned HTTP {status}: {body}"),
            });
        }
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Removes a request's slot when its caller finishes or gives up.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn lock(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcResponse>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolve the `endpoint` event data against the SSE URL.
pub fn resolve_endpoint(sse_url: &Url, endpoint: &str) -> Result<Url, String> {
    sse_url
        .join(endpoint.trim())
        .map_err(|e| format!("invalid endpoint '{endpoint}': {e}"))
}

// ─── Reader task ─────────────────────────────────────────────────────────────

async fn read_events<S, B, E>(
    stream: S,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    endpoint_tx: oneshot::Sender<String>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut parser = SseParser::new();
    let mut endpoint_tx = Some(endpoint_tx);

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "MCP event stream interrupted");
                break;
            }
        };

        for event in parser.push(bytes.as_ref()) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(event.data);
                    }
                }
                "message" => route_message(&pending, &event.data),
                other => debug!(event = other, "Ignoring SSE event"),
            }
        }
    }

    info!("MCP event stream closed");
    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiting caller with `Closed`.
    lock(&pending).clear();
}

fn route_message(pending: &PendingMap, data: &str) {
    let response: JsonRpcResponse = match serde_json::from_str(data) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Discarding malformed MCP message");
            return;
        }
    };

    let Some(id) = response.id else {
        debug!("Ignoring server-initiated MCP message");
        return;
    };

    match lock(pending).remove(&id) {
        Some(tx) => {
            let _ = tx.send(response);
        }
        None => debug!(id, "No caller waiting for MCP response"),
    }
}

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

//! MCP session tests against an in-process SSE tool server.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use docbridge_core::article::ArticleId;
use docbridge_core::error::SourceError;
use docbridge_core::source::{ASK_TOOL, DocumentSource, SEARCH_TOOL, VIEW_TOOL};
use docbridge_mcp::{ClientInfo, McpDocumentSource, McpError, McpSession, ToolTimeouts};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

// ── Mock tool server ────────────────────────────────────────────────────

enum Reply {
    Result(Value),
    Error(i32, &'static str),
    Silent,
    HangUp,
}

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockServer {
    events: Arc<Mutex<Option<mpsc::Sender<Event>>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    handler: Handler,
}

async fn sse_handler(
    State(server): State<MockServer>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(32);
    tx.send(
        Event::default()
            .event("endpoint")
            .data("/messages/?session_id=test"),
    )
    .await
    .unwrap();
    *server.events.lock().await = Some(tx);
    Sse::new(ReceiverStream::new(rx).map(Ok))
}

/// An event stream that never announces an endpoint.
async fn silent_sse_handler(
    State(server): State<MockServer>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(1);
    *server.events.lock().await = Some(tx);
    Sse::new(ReceiverStream::new(rx).map(Ok))
}

async fn messages_handler(
    State(server): State<MockServer>,
    axum::Json(body): axum::Json<Value>,
) -> StatusCode {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let params = body.get("params").cloned().unwrap_or(Value::Null);
    server.calls.lock().await.push((method.clone(), params.clone()));

    let Some(id) = body.get("id").and_then(Value::as_u64) else {
        return StatusCode::ACCEPTED;
    };

    let message = match (server.handler)(&method, &params) {
        Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Reply::Error(code, text) => {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": text}})
        }
        Reply::Silent => return StatusCode::ACCEPTED,
        Reply::HangUp => {
            server.events.lock().await.take();
            return StatusCode::ACCEPTED;
        }
    };

    if let Some(tx) = server.events.lock().await.as_ref() {
        let _ = tx
            .send(Event::default().event("message").data(message.to_string()))
            .await;
    }
    StatusCode::ACCEPTED
}

fn docs_handler() -> Handler {
    Arc::new(|method: &str, params: &Value| match method {
        "initialize" => Reply::Result(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "wiki-docs", "version": "1.0.0"}
        })),
        "tools/list" => Reply::Result(json!({"tools": [
            {"name": "search_articles", "description": "Search", "inputSchema": {"type": "object"}},
            {"name": "view_article", "description": "View", "inputSchema": {"type": "object"}}
        ]})),
        "tools/call" => match params["name"].as_str().unwrap_or_default() {
            "search_articles" => Reply::Result(json!({"content": [
                {"type": "text", "text": format!("[{{\"article_id\": 1, \"title\": \"{}\"}}]", params["arguments"]["query"].as_str().unwrap_or_default())}
            ]})),
            "view_article" => Reply::Result(json!({"content": [
                {"type": "text", "text": format!("{{\"content\": \"body {}\"}}", params["arguments"]["article_id"])}
            ]})),
            "broken" => Reply::Result(json!({"isError": true, "content": [{"type": "text", "text": "wiki backend down"}]})),
            "rejected" => Reply::Error(-32602, "Invalid params"),
            "hangup" => Reply::HangUp,
            _ => Reply::Silent,
        },
        _ => Reply::Error(-32601, "Method not found"),
    })
}

async fn start(handler: Handler) -> (String, MockServer) {
    let server = MockServer {
        events: Arc::new(Mutex::new(None)),
        calls: Arc::new(Mutex::new(Vec::new())),
        handler,
    };
    let app = Router::new()
        .route("/sse", get(sse_handler))
        .route("/silent", get(silent_sse_handler))
        .route("/messages/", post(messages_handler))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), server)
}

async fn connect(base: &str) -> McpSession {
    McpSession::connect(
        &format!("{base}/sse"),
        &ClientInfo::default(),
        Duration::from_secs(5),
    )
    .await
    .unwrap()
}

const SHORT: Duration = Duration::from_millis(200);

// ── Handshake & discovery ────────────────────────────────────────────────

#[tokio::test]
async fn handshake_then_discovery() {
    let (base, server) = start(docs_handler()).await;
    let session = connect(&base).await;

    assert_eq!(session.server_info().name.as_deref(), Some("wiki-docs"));

    let tools = session.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["search_articles", "view_article"]);

    let calls = server.calls.lock().await;
    assert_eq!(calls[0].0, "initialize");
    assert_eq!(calls[0].1["protocolVersion"], "2024-11-05");
    assert_eq!(calls[0].1["clientInfo"]["name"], "docbridge");
    assert_eq!(calls[1].0, "notifications/initialized");
    assert_eq!(calls[2].0, "tools/list");
}

#[tokio::test]
async fn connect_fails_when_server_is_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = McpSession::connect(
        &format!("http://{addr}/sse"),
        &ClientInfo::default(),
        Duration::from_secs(2),
    )
    .await;
    assert!(matches!(result, Err(McpError::ConnectFailed { .. })));
}

#[tokio::test]
async fn connect_fails_without_endpoint_event() {
    let (base, _server) = start(docs_handler()).await;
    let result = McpSession::connect(&format!("{base}/silent"), &ClientInfo::default(), SHORT).await;
    assert!(matches!(result, Err(McpError::ConnectFailed { .. })));
}

// ── Tool calls through the document source ───────────────────────────────

#[tokio::test]
async fn document_source_search_and_view() {
    let (base, server) = start(docs_handler()).await;
    let session = Arc::new(connect(&base).await);
    let source = McpDocumentSource::discover(session, ToolTimeouts::default())
        .await
        .unwrap();

    assert_eq!(source.name(), "wiki-docs");
    assert!(source.supports(SEARCH_TOOL));
    assert!(source.supports(VIEW_TOOL));
    assert!(!source.supports(ASK_TOOL));

    let found = source.search("billing").await.unwrap();
    assert_eq!(
        found.first_text(),
        Some("[{\"article_id\": 1, \"title\": \"billing\"}]")
    );

    let viewed = source.view(&ArticleId::Number(7)).await.unwrap();
    assert_eq!(viewed.first_text(), Some("{\"content\": \"body 7\"}"));

    let calls = server.calls.lock().await;
    let view_call = calls.iter().rfind(|(m, _)| m == "tools/call").unwrap();
    assert_eq!(view_call.1["name"], "view_article");
    assert_eq!(view_call.1["arguments"]["article_id"], 7);
}

#[tokio::test]
async fn ask_is_unavailable_when_not_advertised() {
    let (base, server) = start(docs_handler()).await;
    let session = Arc::new(connect(&base).await);
    let source = McpDocumentSource::discover(session, ToolTimeouts::default())
        .await
        .unwrap();

    let err = source.ask("anything").await.unwrap_err();
    assert!(matches!(err, SourceError::Unavailable(_)));
    let calls = server.calls.lock().await;
    assert!(!calls.iter().any(|(m, _)| m == "tools/call"));
}

#[tokio::test]
async fn tool_error_flag_becomes_tool_failed() {
    let (base, _server) = start(docs_handler()).await;
    let session = connect(&base).await;

    let err = session
        .call_tool("broken", json!({}), Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        McpError::ToolFailed { tool, message } => {
            assert_eq!(tool, "broken");
            assert_eq!(message, "wiki backend down");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn json_rpc_error_is_a_server_error() {
    let (base, _server) = start(docs_handler()).await;
    let session = connect(&base).await;

    let err = session
        .call_tool("rejected", json!({}), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ServerError { code: -32602, .. }));
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let (base, _server) = start(docs_handler()).await;
    let session = connect(&base).await;

    let err = session
        .call_tool("never_answers", json!({}), SHORT)
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Timeout { .. }));

    // The session is still usable after a timed-out call.
    assert_eq!(session.list_tools().await.unwrap().len(), 2);
}

#[tokio::test]
async fn stream_end_fails_pending_call() {
    let (base, _server) = start(docs_handler()).await;
    let session = connect(&base).await;

    let err = session
        .call_tool("hangup", json!({}), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Closed), "got {err:?}");
    // The stream is gone, so later calls fail at once.
    let err = session.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Closed), "got {err:?}");
}

#[tokio::test]
async fn closed_session_rejects_requests() {
    let (base, _server) = start(docs_handler()).await;
    let session = connect(&base).await;

    session.close();
    session.close();
    assert!(matches!(session.list_tools().await, Err(McpError::Closed)));
}

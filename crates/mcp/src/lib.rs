//! # docbridge MCP client
//!
//! A small Model Context Protocol client for servers that speak the SSE
//! transport: the client opens a long-lived `text/event-stream` GET, learns
//! the session's POST endpoint from the first `endpoint` event, and then
//! POSTs JSON-RPC requests whose responses come back as `message` events.
//!
//! [`McpDocumentSource`] adapts a session to the `DocumentSource` trait the
//! chat loop is written against.

pub mod errors;
pub mod session;
pub mod source;
pub mod sse;
pub mod transport;
pub mod types;

pub use errors::McpError;
pub use session::{ClientInfo, McpSession};
pub use source::{McpDocumentSource, ToolTimeouts};
pub use transport::SseTransport;
pub use types::{CallToolResult, ContentBlock, McpToolDefinition, ServerInfo};

//! # docbridge core
//!
//! Domain types, traits, and error definitions shared by every docbridge crate.
//! This crate has **no network dependencies**: it defines the seams the
//! chat loop is written against.
//!
//! - [`Provider`] abstracts the hosted chat-completion endpoint.
//! - [`DocumentSource`] abstracts the documentation tool server.
//!
//! Both have fake implementations in the tests of the crates that consume them.

pub mod article;
pub mod error;
pub mod message;
pub mod provider;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use article::{Article, ArticleId, Context};
pub use error::{ProviderError, SourceError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use source::{ASK_TOOL, DocumentSource, SEARCH_TOOL, ToolOutput, VIEW_TOOL};

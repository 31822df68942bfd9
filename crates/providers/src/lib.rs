//! Chat-completion endpoint clients for docbridge.
//!
//! All providers implement the `docbridge_core::Provider` trait.

pub mod openai_compat;
pub mod probe;

pub use openai_compat::OpenAiCompatProvider;
pub use probe::{ProbeAttempt, ProbeReport, candidate_base_urls, probe};

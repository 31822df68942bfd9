//! The docbridge chat turn and the loop that drives it.
//!
//! A turn follows one of two paths, chosen once per session:
//!
//! 1. **Pipeline**: search the tool server, fetch the top articles, and ask
//!    the completion endpoint to answer from that context.
//! 2. **Ask**: hand the question to the tool server's own agent and print
//!    whatever it returns.
//!
//! Nothing is carried from one turn to the next.

pub mod aggregator;
pub mod completion;
pub mod pipeline;
pub mod repl;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use aggregator::{ContextAggregator, RetrievalError};
pub use completion::{
    CompletionRequester, EMPTY_RESPONSE_DIAGNOSTIC, NO_DOCUMENTATION_ADVISORY, SYSTEM_PROMPT,
};
pub use pipeline::{
    ChatMode, ChatPipeline, ModePreference, ModeSelection, NO_AGENT_CONTENT, TurnOutcome, select_mode,
};
pub use repl::{
    EXIT_KEYWORD, ExitReason, LineReceiver, PROMPT, SessionSummary, TurnHandler, is_exit, run,
    spawn_line_reader,
};

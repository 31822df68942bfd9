//! Interactive Loop: prompt, read a line, run a turn, print, repeat.
//!
//! The loop ends on the exit keyword, end of input, or the interrupt future
//! resolving (Ctrl+C in the binary). A turn never ends the loop.
//!
//! Lines arrive over a channel fed by a plain OS thread (see
//! [`spawn_line_reader`]). A blocking read of the terminal cannot be
//! cancelled, so it must not live on the runtime's blocking pool: shutting
//! the runtime down would wait for the next Enter key.

use std::future::Future;
use std::io::{BufRead, BufReader, Read, Write};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::pipeline::TurnOutcome;

/// Input prompt.
pub const PROMPT: &str = "Ask (or 'exit'): ";

/// Typing this (any case, surrounding whitespace ignored) ends the session.
pub const EXIT_KEYWORD: &str = "exit";

const RULE_WIDTH: usize = 56;

/// Anything that can answer one question.
#[async_trait]
pub trait TurnHandler: Send + Sync {
    async fn handle_turn(&self, question: &str) -> TurnOutcome;
}

pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_KEYWORD)
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ExitKeyword,
    EndOfInput,
    Interrupted,
}

/// Lines read from the user, in order. The channel closes at end of input.
pub type LineReceiver = mpsc::Receiver<std::io::Result<String>>;

const LINE_BUFFER: usize = 16;

/// Read `reader` line by line on a dedicated thread.
///
/// The thread exits at end of input, after a read error, or once the
/// receiver is dropped and the next line arrives. It is never joined, so a
/// read still blocked at process exit does not hold the process open.
pub fn spawn_line_reader<R>(reader: R) -> LineReceiver
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let spawned = std::thread::Builder::new()
        .name("docbridge-input".into())
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Could not start the input reader: {e}");
    }
    rx
}

/// Totals for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: usize,
    pub reason: ExitReason,
}

/// Drive the chat loop until exit.
pub async fn run<H, W, I>(
    handler: &H,
    mut lines: LineReceiver,
    output: &mut W,
    interrupt: I,
) -> std::io::Result<SessionSummary>
where
    H: TurnHandler + ?Sized,
    W: Write,
    I: Future<Output = ()>,
{
    let mut turns = 0;
    tokio::pin!(interrupt);

    let reason = loop {
        write!(output, "\n{PROMPT}")?;
        output.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose()?,
            _ = &mut interrupt => break ExitReason::Interrupted,
        };

        let Some(line) = line else {
            break ExitReason::EndOfInput;
        };

        if is_exit(&line) {
            break ExitReason::ExitKeyword;
        }

        let question = line.trim();
        writeln!(output, "\nProcessing query: \"{question}\"...")?;
        output.flush()?;

        let outcome = tokio::select! {
            outcome = handler.handle_turn(question) => outcome,
            _ = &mut interrupt => break ExitReason::Interrupted,
        };
        turns += 1;
        debug!(turn = turns, answered = outcome.is_answer(), "Turn finished");

        print_outcome(output, &outcome)?;
    };

    if reason == ExitReason::Interrupted {
        writeln!(output)?;
    }
    writeln!(output, "Goodbye!")?;
    info!(turns, reason = ?reason, "Chat loop ended");

    Ok(SessionSummary { turns, reason })
}

/// Print one outcome. Answers are framed by rules.
pub fn print_outcome<W: Write>(output: &mut W, outcome: &TurnOutcome) -> std::io::Result<()> {
    match outcome {
        TurnOutcome::Answer(text) => {
            let title = " ANSWER ";
            let side = (RULE_WIDTH - title.len()) / 2;
            writeln!(output, "\n{}{title}{}", "=".repeat(side), "=".repeat(side))?;
            writeln!(output, "{text}")?;
            writeln!(output, "{}", "=".repeat(side * 2 + title.len()))?;
        }
        TurnOutcome::Advisory(text) => writeln!(output, "{text}")?,
        TurnOutcome::Diagnostic(text) => writeln!(output, "[Error] {text}")?,
    }
    output.flush()
}

//! Line-oriented frontend for kiosks without a full terminal
//!
//! Reads operator lines from stdin and prints one status line per state
//! change. Lines are held back while the desk is busy, so piped input is
//! replayed in order. Closing stdin stops input but keeps the desk running
//! until shutdown, so scripted dry runs can finish.

use super::input::map_line;
use super::{Dispatch, Frontend};
use crate::domain::types::{AppState, VerificationOutcome};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Text printed when the desk enters a state
pub fn status_line(state: AppState) -> String {
    match state {
        AppState::Ready => "ready: press Enter to scan".to_string(),
        AppState::Scanning => "scanning: enter code (blank line cancels)".to_string(),
        AppState::Loading => "verifying...".to_string(),
        AppState::Result(outcome) => {
            let label = match outcome {
                VerificationOutcome::Success => "ok",
                VerificationOutcome::Priority => "priority",
                VerificationOutcome::Failure => "rejected",
            };
            format!("{} {}", outcome.symbol(), label)
        }
    }
}

/// Run the headless frontend on stdin/stdout
pub async fn run(
    frontend: Frontend,
    transitions: broadcast::Receiver<AppState>,
    state: watch::Receiver<AppState>,
    shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    drive(frontend, input, io::stdout(), transitions, state, shutdown).await
}

/// Run the line loop until the operator quits or shutdown is signalled.
///
/// A line is read only while the desk is idle and nothing sent is still
/// waiting for its transition, so each line maps against the state it
/// will actually hit.
pub async fn drive<R, W>(
    frontend: Frontend,
    input: R,
    mut out: W,
    mut transitions: broadcast::Receiver<AppState>,
    state: watch::Receiver<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut input_open = true;
    let mut current = *state.borrow();

    print_status(&mut out, current)?;
    let mut pending = frontend.on_start();

    loop {
        let accepting = input_open && !pending && accepts_input(current);
        tokio::select! {
            line = lines.next_line(), if accepting => match line? {
                Some(line) => match frontend.dispatch(map_line(current, &line)) {
                    Dispatch::Quit => {
                        info!("operator_quit");
                        return Ok(());
                    }
                    Dispatch::Sent => pending = true,
                    Dispatch::Idle => {}
                },
                None => {
                    debug!("stdin_closed");
                    input_open = false;
                }
            },
            next = transitions.recv() => match next {
                Ok(next) => {
                    print_status(&mut out, next)?;
                    pending = frontend.on_transition(current, next);
                    current = next;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = %skipped, "headless_transitions_lagged");
                    pending = false;
                    current = *state.borrow();
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = shutdown.changed() => {
                info!("headless_frontend_shutdown");
                return Ok(());
            }
        }
    }
}

/// Operator lines are only consumed where they can act on the desk
fn accepts_input(state: AppState) -> bool {
    matches!(state, AppState::Ready | AppState::Scanning)
}

fn print_status<W: Write>(out: &mut W, state: AppState) -> io::Result<()> {
    writeln!(out, "{}", status_line(state))?;
    out.flush()
}

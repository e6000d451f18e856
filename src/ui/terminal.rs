//! Full-screen terminal frontend
//!
//! Redraws on a fixed tick and polls crossterm for key presses between
//! frames. State changes arrive on the controller's transition broadcast.
//! The terminal bell rings when a scan is decoded.

use super::input::{map_key, EntryBuffer};
use super::view::{draw, DeskView};
use super::{Dispatch, Frontend};
use crate::domain::types::AppState;
use crate::infra::metrics::Metrics;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Static facts shown in the header
pub struct ScreenInfo {
    pub desk_id: String,
    pub build: String,
    pub metrics: Arc<Metrics>,
}

/// Run the terminal frontend until the operator quits or shutdown is signalled
pub async fn run(
    frontend: Frontend,
    transitions: broadcast::Receiver<AppState>,
    state: watch::Receiver<AppState>,
    info: ScreenInfo,
    shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, frontend, transitions, state, &info, shutdown).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    frontend: Frontend,
    mut transitions: broadcast::Receiver<AppState>,
    state: watch::Receiver<AppState>,
    info: &ScreenInfo,
    shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut entry = EntryBuffer::default();
    let mut current = *state.borrow();
    let mut last_tick = Instant::now();
    let mut tick = 0usize;

    frontend.on_start();

    loop {
        if *shutdown.borrow() {
            info!("terminal_frontend_shutdown");
            return Ok(());
        }

        loop {
            match transitions.try_recv() {
                Ok(next) => {
                    if next != AppState::Scanning {
                        entry.clear();
                    }
                    if rings_bell(current, next) {
                        ring_bell(terminal.backend_mut())?;
                    }
                    frontend.on_transition(current, next);
                    current = next;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped = %skipped, "terminal_transitions_lagged");
                    current = *state.borrow();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => return Ok(()),
            }
        }

        let view = DeskView {
            desk_id: &info.desk_id,
            build: &info.build,
            state: current,
            entry: entry.as_str(),
            manual_entry: frontend.manual_entry(),
            admitted: info.metrics.admitted(),
            rejected: info.metrics.rejected(),
            tick,
        };
        terminal.draw(|f| draw(f, &view))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if frontend.dispatch(map_key(current, key, &mut entry)) == Dispatch::Quit {
                    info!("operator_quit");
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
            tick = tick.wrapping_add(1);
        }

        tokio::task::yield_now().await;
    }
}

/// A decoded scan moves the desk from Scanning to Loading
fn rings_bell(previous: AppState, next: AppState) -> bool {
    previous == AppState::Scanning && next == AppState::Loading
}

fn ring_bell<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(b"\x07")?;
    Write::flush(out)
}

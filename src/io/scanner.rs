//! Scan acquisition - one decoded code (or one failure) per session
//!
//! A `ScanSource` opens a `ScanSession` on demand. The session runs its
//! capture on a separate task and hands back a single `ScanEvent` through a
//! oneshot channel. Dropping the session aborts the capture task, so a
//! closed session can never report again.

use crate::domain::types::{DecodedCode, ScanEvent, ScanFailure};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Capture backend that can open scan sessions
pub trait ScanSource: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Start capturing. Must be called from within a tokio runtime.
    fn start_session(&self) -> ScanSession;
}

/// Handle to one in-progress capture
pub struct ScanSession {
    id: u64,
    rx: oneshot::Receiver<ScanEvent>,
    task: JoinHandle<()>,
    delivered: bool,
}

impl ScanSession {
    /// Run `capture` on its own task; its output is the session's event
    pub fn spawn<F>(capture: F) -> Self
    where
        F: Future<Output = ScanEvent> + Send + 'static,
    {
        let id = next_session_id();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let event = capture.await;
            if tx.send(event).is_err() {
                debug!(session_id = id, "scan_event_discarded_session_closed");
            }
        });
        Self { id, rx, task, delivered: false }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the session's event. Yields exactly once; later calls
    /// never complete.
    pub async fn recv(&mut self) -> ScanEvent {
        if self.delivered {
            return std::future::pending().await;
        }
        let event = match (&mut self.rx).await {
            Ok(event) => event,
            // Capture task ended (or panicked) without reporting
            Err(_) => ScanEvent::Failed(ScanFailure::Closed),
        };
        self.delivered = true;
        event
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("id", &self.id)
            .field("delivered", &self.delivered)
            .finish()
    }
}

/// Line delivered to the keyboard backend, tagged with the session epoch
/// that was current when it was submitted
#[derive(Debug)]
struct KeyboardLine {
    epoch: u64,
    text: String,
}

/// Sending half used by frontends to deliver typed or wedge-scanned lines
#[derive(Debug, Clone)]
pub struct KeyboardFeed {
    tx: mpsc::Sender<KeyboardLine>,
    epoch: Arc<AtomicU64>,
}

impl KeyboardFeed {
    /// Submit a line without blocking. Returns false if the feed is full or
    /// the scanner is gone.
    pub fn submit(&self, line: impl Into<String>) -> bool {
        let line = KeyboardLine { epoch: self.epoch.load(Ordering::Acquire), text: line.into() };
        self.tx.try_send(line).is_ok()
    }
}

/// Keyboard-wedge / manual entry backend
///
/// Lines only count for the session that was open when they were submitted.
/// Each session bumps the shared epoch; older lines are skipped on read.
pub struct KeyboardScanner {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<KeyboardLine>>>,
    epoch: Arc<AtomicU64>,
}

/// Create a connected feed / scanner pair
pub fn keyboard_channel(buffer: usize) -> (KeyboardFeed, KeyboardScanner) {
    let (tx, rx) = mpsc::channel(buffer);
    let epoch = Arc::new(AtomicU64::new(0));
    (
        KeyboardFeed { tx, epoch: epoch.clone() },
        KeyboardScanner { rx: Arc::new(tokio::sync::Mutex::new(rx)), epoch },
    )
}

/// Strip the line terminator a wedge reader or terminal leaves behind
fn strip_line_ending(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

impl ScanSource for KeyboardScanner {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn start_session(&self) -> ScanSession {
        let session_epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let rx = self.rx.clone();

        ScanSession::spawn(async move {
            // A just-aborted previous session may still hold the lock briefly
            let mut rx = rx.lock().await;
            loop {
                match rx.recv().await {
                    Some(line) if line.epoch < session_epoch => {
                        debug!(
                            line_epoch = line.epoch,
                            session_epoch = session_epoch,
                            "keyboard_stale_line_discarded"
                        );
                    }
                    Some(line) => {
                        if let Some(code) = DecodedCode::new(strip_line_ending(&line.text)) {
                            return ScanEvent::Decoded(code);
                        }
                    }
                    None => return ScanEvent::Failed(ScanFailure::Closed),
                }
            }
        })
    }
}

/// Deterministic backend serving a fixed queue of events
pub struct ScriptedScanner {
    script: Mutex<VecDeque<ScanEvent>>,
    delay: Duration,
}

impl ScriptedScanner {
    pub fn new(events: impl IntoIterator<Item = ScanEvent>) -> Self {
        Self { script: Mutex::new(events.into_iter().collect()), delay: Duration::ZERO }
    }

    /// Queue each non-blank string as a decoded code
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Self {
        let codes = codes.iter().filter_map(|c| DecodedCode::new(c.as_ref()));
        Self::new(codes.map(ScanEvent::Decoded))
    }

    /// Wait this long before answering each session
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl ScanSource for ScriptedScanner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn start_session(&self) -> ScanSession {
        let event =
            self.script.lock().pop_front().unwrap_or(ScanEvent::Failed(ScanFailure::Closed));
        let delay = self.delay;
        ScanSession::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        })
    }
}

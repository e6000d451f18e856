//! Operator frontends
//!
//! - `input` - key and line mapping per desk state
//! - `view` - ratatui rendering of the desk screen
//! - `terminal` - full-screen terminal frontend
//! - `headless` - line-oriented stdin/stdout frontend

pub mod headless;
pub mod input;
pub mod terminal;
pub mod view;

pub use input::{map_key, map_line, EntryBuffer, UiAction};
pub use view::{draw, DeskView};

use crate::domain::types::AppState;
use crate::io::scanner::KeyboardFeed;
use crate::services::controller::DeskCommand;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Result of applying one operator action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing reached the desk
    Idle,
    /// A command or code reached the desk; a transition will follow
    Sent,
    Quit,
}

/// Frontend side of the desk: forwards operator actions to the controller
pub struct Frontend {
    commands: mpsc::Sender<DeskCommand>,
    feed: Option<KeyboardFeed>,
    auto_arm: bool,
}

impl Frontend {
    pub fn new(
        commands: mpsc::Sender<DeskCommand>,
        feed: Option<KeyboardFeed>,
        auto_arm: bool,
    ) -> Self {
        Self { commands, feed, auto_arm }
    }

    /// Whether typed codes reach the scanner (keyboard backend)
    pub fn manual_entry(&self) -> bool {
        self.feed.is_some()
    }

    /// Apply an operator action
    pub fn dispatch(&self, action: UiAction) -> Dispatch {
        let sent = match action {
            UiAction::None => false,
            UiAction::Arm => self.send(DeskCommand::StartScan),
            UiAction::Cancel => self.send(DeskCommand::CancelScan),
            UiAction::Submit(line) => match &self.feed {
                Some(feed) => {
                    let accepted = feed.submit(line);
                    if !accepted {
                        warn!("keyboard_feed_rejected_line");
                    }
                    accepted
                }
                None => {
                    debug!("manual_entry_unavailable");
                    false
                }
            },
            UiAction::Quit => return Dispatch::Quit,
        };
        if sent {
            Dispatch::Sent
        } else {
            Dispatch::Idle
        }
    }

    /// Arm once at startup when auto-arm is enabled. Returns true if armed.
    pub fn on_start(&self) -> bool {
        self.auto_arm && self.send(DeskCommand::StartScan)
    }

    /// Re-arm after a result has been shown. A failed or cancelled scan
    /// returns to Ready without re-arming. Returns true if armed.
    pub fn on_transition(&self, previous: AppState, next: AppState) -> bool {
        self.auto_arm
            && next == AppState::Ready
            && matches!(previous, AppState::Result(_))
            && self.send(DeskCommand::StartScan)
    }

    fn send(&self, command: DeskCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!(command = ?command, error = %e, "desk_command_dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::VerificationOutcome;
    use crate::io::scanner::keyboard_channel;

    #[test]
    fn test_dispatch_forwards_commands() {
        let (tx, mut rx) = mpsc::channel(4);
        let frontend = Frontend::new(tx, None, false);

        assert_eq!(frontend.dispatch(UiAction::Arm), Dispatch::Sent);
        assert_eq!(frontend.dispatch(UiAction::Cancel), Dispatch::Sent);
        assert_eq!(frontend.dispatch(UiAction::None), Dispatch::Idle);
        assert_eq!(frontend.dispatch(UiAction::Quit), Dispatch::Quit);

        assert_eq!(rx.try_recv().unwrap(), DeskCommand::StartScan);
        assert_eq!(rx.try_recv().unwrap(), DeskCommand::CancelScan);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_submit_without_keyboard_feed_is_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        let frontend = Frontend::new(tx, None, false);
        assert!(!frontend.manual_entry());
        assert_eq!(frontend.dispatch(UiAction::Submit("ABC123".into())), Dispatch::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_reaches_keyboard_scanner() {
        use crate::domain::types::ScanEvent;
        use crate::io::scanner::ScanSource;

        let (tx, _rx) = mpsc::channel(4);
        let (feed, scanner) = keyboard_channel(4);
        let frontend = Frontend::new(tx, Some(feed), false);
        assert!(frontend.manual_entry());

        let mut session = scanner.start_session();
        assert_eq!(frontend.dispatch(UiAction::Submit("ABC123".into())), Dispatch::Sent);

        match session.recv().await {
            ScanEvent::Decoded(code) => assert_eq!(code.as_str(), "ABC123"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_command_channel_is_not_sent() {
        let (tx, _rx) = mpsc::channel(1);
        let frontend = Frontend::new(tx, None, false);
        assert_eq!(frontend.dispatch(UiAction::Arm), Dispatch::Sent);
        assert_eq!(frontend.dispatch(UiAction::Arm), Dispatch::Idle);
    }

    #[test]
    fn test_auto_arm_only_after_result() {
        let (tx, mut rx) = mpsc::channel(4);
        let frontend = Frontend::new(tx, None, true);

        assert!(frontend.on_start());
        assert_eq!(rx.try_recv().unwrap(), DeskCommand::StartScan);

        assert!(!frontend.on_transition(AppState::Scanning, AppState::Ready));
        assert!(rx.try_recv().is_err());

        let shown = AppState::Result(VerificationOutcome::Success);
        assert!(frontend.on_transition(shown, AppState::Ready));
        assert_eq!(rx.try_recv().unwrap(), DeskCommand::StartScan);
    }

    #[test]
    fn test_no_auto_arm_when_disabled() {
        let (tx, mut rx) = mpsc::channel(4);
        let frontend = Frontend::new(tx, None, false);
        assert!(!frontend.on_start());
        let shown = AppState::Result(VerificationOutcome::Failure);
        assert!(!frontend.on_transition(shown, AppState::Ready));
        assert!(rx.try_recv().is_err());
    }
}

//! Desk state machine
//!
//! Transitions are a pure function from (state, event) to (state, effect).
//! The controller executes the effect; nothing here touches I/O or time.
//!
//! ```text
//! Ready --ScanRequested--> Scanning --ScanDecoded--> Loading --VerificationCompleted--> Result
//!   ^                         |                                                          |
//!   +------ScanFailed---------+                                                          |
//!   +------------------------------------ResetElapsed----------------------------------+
//! ```

use crate::domain::types::{AppState, DecodedCode, ScanFailure, VerificationOutcome};
use std::time::Duration;

/// Default time a result stays on screen
pub const DEFAULT_RESULT_HOLD: Duration = Duration::from_millis(3000);

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskEvent {
    /// Operator armed a scan
    ScanRequested,
    ScanDecoded(DecodedCode),
    ScanFailed(ScanFailure),
    /// Operator abandoned the open session
    ScanCancelled,
    VerificationCompleted(VerificationOutcome),
    /// Result hold timer fired
    ResetElapsed,
}

impl DeskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeskEvent::ScanRequested => "scan_requested",
            DeskEvent::ScanDecoded(_) => "scan_decoded",
            DeskEvent::ScanFailed(_) => "scan_failed",
            DeskEvent::ScanCancelled => "scan_cancelled",
            DeskEvent::VerificationCompleted(_) => "verification_completed",
            DeskEvent::ResetElapsed => "reset_elapsed",
        }
    }
}

/// Side effect the controller must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskEffect {
    None,
    OpenSession,
    CloseSession,
    CloseSessionAndVerify(DecodedCode),
    ScheduleReset(Duration),
}

/// Pure transition step
#[derive(Debug, Clone, Copy)]
pub struct DeskMachine {
    result_hold: Duration,
}

impl Default for DeskMachine {
    fn default() -> Self {
        Self { result_hold: DEFAULT_RESULT_HOLD }
    }
}

impl DeskMachine {
    pub fn new(result_hold: Duration) -> Self {
        Self { result_hold }
    }

    pub fn result_hold(&self) -> Duration {
        self.result_hold
    }

    /// Apply one event. Pairs not listed in the transition table leave the
    /// state untouched with no effect; this is what keeps a second request
    /// from starting while one is loading or displayed.
    pub fn transition(&self, state: AppState, event: DeskEvent) -> (AppState, DeskEffect) {
        match (state, event) {
            (AppState::Ready, DeskEvent::ScanRequested) => {
                (AppState::Scanning, DeskEffect::OpenSession)
            }
            (AppState::Scanning, DeskEvent::ScanDecoded(code)) => {
                (AppState::Loading, DeskEffect::CloseSessionAndVerify(code))
            }
            (AppState::Scanning, DeskEvent::ScanFailed(_) | DeskEvent::ScanCancelled) => {
                (AppState::Ready, DeskEffect::CloseSession)
            }
            (AppState::Loading, DeskEvent::VerificationCompleted(outcome)) => {
                (AppState::Result(outcome), DeskEffect::ScheduleReset(self.result_hold))
            }
            (AppState::Result(_), DeskEvent::ResetElapsed) => (AppState::Ready, DeskEffect::None),
            (state, _) => (state, DeskEffect::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> DecodedCode {
        DecodedCode::new(s).unwrap()
    }

    fn all_events() -> Vec<DeskEvent> {
        vec![
            DeskEvent::ScanRequested,
            DeskEvent::ScanDecoded(code("ABC123")),
            DeskEvent::ScanFailed(ScanFailure::Closed),
            DeskEvent::ScanCancelled,
            DeskEvent::VerificationCompleted(VerificationOutcome::Success),
            DeskEvent::ResetElapsed,
        ]
    }

    #[test]
    fn test_ready_arms_scan() {
        let machine = DeskMachine::default();
        let (state, effect) = machine.transition(AppState::Ready, DeskEvent::ScanRequested);
        assert_eq!(state, AppState::Scanning);
        assert_eq!(effect, DeskEffect::OpenSession);
    }

    #[test]
    fn test_decoded_code_starts_verification() {
        let machine = DeskMachine::default();
        let (state, effect) =
            machine.transition(AppState::Scanning, DeskEvent::ScanDecoded(code("ABC123")));
        assert_eq!(state, AppState::Loading);
        assert_eq!(effect, DeskEffect::CloseSessionAndVerify(code("ABC123")));
    }

    #[test]
    fn test_scan_failure_returns_to_ready() {
        let machine = DeskMachine::default();
        for failure in [
            ScanFailure::DeviceUnavailable("/dev/ttyACM0".into()),
            ScanFailure::Io("broken pipe".into()),
            ScanFailure::Closed,
        ] {
            let (state, effect) =
                machine.transition(AppState::Scanning, DeskEvent::ScanFailed(failure));
            assert_eq!(state, AppState::Ready);
            assert_eq!(effect, DeskEffect::CloseSession);
        }

        let (state, effect) = machine.transition(AppState::Scanning, DeskEvent::ScanCancelled);
        assert_eq!(state, AppState::Ready);
        assert_eq!(effect, DeskEffect::CloseSession);
    }

    #[test]
    fn test_completion_schedules_reset_with_hold() {
        let machine = DeskMachine::new(Duration::from_millis(1500));
        let (state, effect) = machine.transition(
            AppState::Loading,
            DeskEvent::VerificationCompleted(VerificationOutcome::Priority),
        );
        assert_eq!(state, AppState::Result(VerificationOutcome::Priority));
        assert_eq!(effect, DeskEffect::ScheduleReset(Duration::from_millis(1500)));
    }

    #[test]
    fn test_reset_discards_outcome() {
        let machine = DeskMachine::default();
        for outcome in [
            VerificationOutcome::Success,
            VerificationOutcome::Priority,
            VerificationOutcome::Failure,
        ] {
            let (state, effect) =
                machine.transition(AppState::Result(outcome), DeskEvent::ResetElapsed);
            assert_eq!(state, AppState::Ready);
            assert_eq!(effect, DeskEffect::None);
        }
    }

    #[test]
    fn test_scan_request_ignored_outside_ready() {
        let machine = DeskMachine::default();
        for state in [
            AppState::Scanning,
            AppState::Loading,
            AppState::Result(VerificationOutcome::Success),
        ] {
            let (next, effect) = machine.transition(state, DeskEvent::ScanRequested);
            assert_eq!(next, state);
            assert_eq!(effect, DeskEffect::None);
        }
    }

    #[test]
    fn test_unlisted_pairs_are_inert() {
        let machine = DeskMachine::default();
        let listed = |state: &AppState, event: &DeskEvent| {
            matches!(
                (state, event),
                (AppState::Ready, DeskEvent::ScanRequested)
                    | (AppState::Scanning, DeskEvent::ScanDecoded(_))
                    | (AppState::Scanning, DeskEvent::ScanFailed(_))
                    | (AppState::Scanning, DeskEvent::ScanCancelled)
                    | (AppState::Loading, DeskEvent::VerificationCompleted(_))
                    | (AppState::Result(_), DeskEvent::ResetElapsed)
            )
        };

        for state in [
            AppState::Ready,
            AppState::Scanning,
            AppState::Loading,
            AppState::Result(VerificationOutcome::Failure),
        ] {
            for event in all_events() {
                if listed(&state, &event) {
                    continue;
                }
                let (next, effect) = machine.transition(state, event.clone());
                assert_eq!(next, state, "{} changed state on {}", state, event.as_str());
                assert_eq!(effect, DeskEffect::None);
            }
        }
    }

    #[test]
    fn test_full_cycle_sequence() {
        let machine = DeskMachine::default();
        let mut state = AppState::Ready;
        let mut seen = vec![state];

        for event in [
            DeskEvent::ScanRequested,
            DeskEvent::ScanDecoded(code("ABC123")),
            DeskEvent::VerificationCompleted(VerificationOutcome::Priority),
            DeskEvent::ResetElapsed,
        ] {
            state = machine.transition(state, event).0;
            seen.push(state);
        }

        assert_eq!(
            seen,
            vec![
                AppState::Ready,
                AppState::Scanning,
                AppState::Loading,
                AppState::Result(VerificationOutcome::Priority),
                AppState::Ready,
            ]
        );
    }
}

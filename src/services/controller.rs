//! Desk controller - owns the desk state and executes machine effects
//!
//! The controller is the only writer of `AppState`. Everything that can
//! move the desk forward arrives as a message on one of its channels:
//! - operator commands from the frontend
//! - the open scan session's single event
//! - verification results and reset timer expiry from spawned tasks
//!
//! Each message becomes a `DeskEvent`, runs through `DeskMachine`, and the
//! resulting effect is carried out here.

use crate::domain::machine::{DeskEffect, DeskEvent, DeskMachine};
use crate::domain::types::{AppState, DecodedCode, ScanEvent, ScanFailure, VerificationOutcome};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::journal::{CheckinRecord, Journal};
use crate::io::scanner::{ScanSession, ScanSource};
use crate::io::verifier::{Verifier, VerifyError};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Capacity of the transition broadcast; slow observers skip ahead
const TRANSITION_BUFFER: usize = 64;

/// Operator requests coming from a frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskCommand {
    StartScan,
    CancelScan,
}

impl DeskCommand {
    fn into_event(self) -> DeskEvent {
        match self {
            DeskCommand::StartScan => DeskEvent::ScanRequested,
            DeskCommand::CancelScan => DeskEvent::ScanCancelled,
        }
    }
}

/// Result of one verification task
#[derive(Debug)]
struct VerificationReport {
    code: DecodedCode,
    outcome: VerificationOutcome,
    latency_ms: u64,
    error: Option<VerifyError>,
}

/// Completions reported back by tasks the controller spawned
#[derive(Debug)]
enum Completion {
    Verified(VerificationReport),
    ResetElapsed,
}

pub struct DeskController {
    state: AppState,
    machine: DeskMachine,
    desk_id: String,
    scanner: Arc<dyn ScanSource>,
    verifier: Arc<dyn Verifier>,
    metrics: Arc<Metrics>,
    journal: Option<Journal>,
    /// Open only while the desk is scanning
    session: Option<ScanSession>,
    state_tx: watch::Sender<AppState>,
    transitions_tx: broadcast::Sender<AppState>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
}

impl DeskController {
    pub fn new(
        config: &Config,
        scanner: Arc<dyn ScanSource>,
        verifier: Arc<dyn Verifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AppState::Ready);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        let (completion_tx, completion_rx) = mpsc::channel(16);
        let journal = config.journal_enabled().then(|| Journal::new(config.journal_file()));

        Self {
            state: AppState::Ready,
            machine: DeskMachine::new(config.result_hold()),
            desk_id: config.desk_id().to_string(),
            scanner,
            verifier,
            metrics,
            journal,
            session: None,
            state_tx,
            transitions_tx,
            completion_tx,
            completion_rx,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// Latest published state, for rendering
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_tx.subscribe()
    }

    /// Every state entered from now on, in order
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<AppState> {
        self.transitions_tx.subscribe()
    }

    /// Process commands until shutdown is signalled or the command channel closes
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<DeskCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            desk = %self.desk_id,
            scanner = %self.scanner.name(),
            result_hold_ms = %self.machine.result_hold().as_millis(),
            "desk_controller_started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also ends the desk
                    if changed.is_err() || *shutdown.borrow() {
                        info!("desk_controller_shutdown");
                        break;
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command.into_event()),
                        None => {
                            info!("desk_command_channel_closed");
                            break;
                        }
                    }
                }
                scan = next_scan_event(&mut self.session) => {
                    let event = match scan {
                        ScanEvent::Decoded(code) => DeskEvent::ScanDecoded(code),
                        ScanEvent::Failed(failure) => DeskEvent::ScanFailed(failure),
                    };
                    self.handle(event);
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }
        }

        // Stop any capture still running
        self.session = None;
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Verified(report) => {
                self.record_verification(&report);
                self.handle(DeskEvent::VerificationCompleted(report.outcome));
            }
            Completion::ResetElapsed => self.handle(DeskEvent::ResetElapsed),
        }
    }

    fn record_verification(&self, report: &VerificationReport) {
        let errored = report.error.is_some();
        self.metrics.record_verification(report.outcome, report.latency_ms, errored);

        match &report.error {
            None => info!(
                code = %report.code,
                outcome = %report.outcome,
                latency_ms = %report.latency_ms,
                "verification_completed"
            ),
            Some(e) => warn!(
                code = %report.code,
                outcome = %report.outcome,
                latency_ms = %report.latency_ms,
                error = %e,
                "verification_failed"
            ),
        }

        if let Some(journal) = &self.journal {
            let mut record = CheckinRecord::new(
                &self.desk_id,
                &report.code,
                report.outcome,
                report.latency_ms,
                Utc::now(),
            );
            if let Some(e) = &report.error {
                record = record.with_error(e.as_str());
            }
            journal.write_record(&record);
        }
    }

    /// Run one event through the machine and carry out its effect
    fn handle(&mut self, event: DeskEvent) {
        let event_name = event.as_str();
        self.observe(&event);

        let previous = self.state;
        let (next, effect) = self.machine.transition(previous, event);

        if next == previous && effect == DeskEffect::None {
            debug!(state = %previous, event = %event_name, "desk_event_ignored");
            return;
        }

        self.state = next;
        self.apply(effect);

        info!(from = %previous, to = %next, event = %event_name, "desk_state_changed");
        self.state_tx.send_replace(next);
        // No receivers is fine
        let _ = self.transitions_tx.send(next);
    }

    /// Metrics and logs for scan events, only when they are live
    fn observe(&self, event: &DeskEvent) {
        if self.state != AppState::Scanning {
            return;
        }
        match event {
            DeskEvent::ScanDecoded(code) => {
                self.metrics.record_scan_decoded();
                info!(code = %code, "scan_decoded");
            }
            DeskEvent::ScanFailed(failure) => {
                self.metrics.record_scan_failed(failure);
                warn!(reason = %failure, kind = %failure.as_str(), "scan_failed");
            }
            DeskEvent::ScanCancelled => {
                self.metrics.record_scan_failed(&ScanFailure::Cancelled);
                info!("scan_cancelled");
            }
            _ => {}
        }
    }

    fn apply(&mut self, effect: DeskEffect) {
        match effect {
            DeskEffect::None => {}
            DeskEffect::OpenSession => {
                self.metrics.record_scan_armed();
                let session = self.scanner.start_session();
                info!(
                    session_id = session.id(),
                    scanner = %self.scanner.name(),
                    "scan_session_opened"
                );
                self.session = Some(session);
            }
            DeskEffect::CloseSession => self.close_session(),
            DeskEffect::CloseSessionAndVerify(code) => {
                self.close_session();
                self.spawn_verification(code);
            }
            DeskEffect::ScheduleReset(delay) => self.spawn_reset(delay),
        }
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session_id = session.id(), "scan_session_closed");
        }
    }

    fn spawn_verification(&self, code: DecodedCode) {
        let verifier = self.verifier.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let result = verifier.verify(&code).await;
            let outcome = VerificationOutcome::from_verification(&result);
            let report = VerificationReport {
                code,
                outcome,
                latency_ms: start.elapsed().as_millis() as u64,
                error: result.err(),
            };
            if tx.send(Completion::Verified(report)).await.is_err() {
                debug!("verification_result_dropped_controller_stopped");
            }
        });
    }

    /// Fire-and-forget: fires exactly once, never cancelled
    fn spawn_reset(&self, delay: Duration) {
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::ResetElapsed).await;
        });
    }
}

/// Wait for the open session's event; never completes when none is open
async fn next_scan_event(session: &mut Option<ScanSession>) -> ScanEvent {
    match session {
        Some(session) => session.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::VerificationResponse;
    use crate::io::scanner::{keyboard_channel, ScriptedScanner};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Verifier answering from a fixed response after a delay
    struct FixedVerifier {
        response: Result<VerificationResponse, VerifyError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn new(response: Result<VerificationResponse, VerifyError>) -> Self {
            Self { response, delay: Duration::from_millis(100), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Verifier for FixedVerifier {
        async fn verify(&self, _code: &DecodedCode) -> Result<VerificationResponse, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }
    }

    struct Harness {
        commands: mpsc::Sender<DeskCommand>,
        transitions: broadcast::Receiver<AppState>,
        state: watch::Receiver<AppState>,
        _shutdown: watch::Sender<bool>,
    }

    fn start(scanner: Arc<dyn ScanSource>, verifier: Arc<dyn Verifier>) -> Harness {
        let config = Config::default().without_journal();
        let controller = DeskController::new(&config, scanner, verifier, Arc::new(Metrics::new()));
        let transitions = controller.subscribe_transitions();
        let state = controller.subscribe();
        let (commands, command_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(controller.run(command_rx, shutdown_rx));
        Harness { commands, transitions, state, _shutdown: shutdown_tx }
    }

    async fn next(h: &mut Harness) -> AppState {
        h.transitions.recv().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_cycle_and_hold() {
        let scanner = Arc::new(ScriptedScanner::from_codes(&["ABC123"]));
        let verifier = Arc::new(FixedVerifier::new(Ok(VerificationResponse::new(true, "yes"))));
        let mut h = start(scanner, verifier);

        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Scanning);
        assert_eq!(next(&mut h).await, AppState::Loading);
        assert_eq!(next(&mut h).await, AppState::Result(VerificationOutcome::Priority));

        let shown_at = tokio::time::Instant::now();
        assert_eq!(next(&mut h).await, AppState::Ready);
        let held = shown_at.elapsed();
        assert!(held >= Duration::from_millis(3000), "held only {:?}", held);
        assert!(held < Duration::from_millis(3100), "held too long {:?}", held);
        assert_eq!(*h.state.borrow(), AppState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_maps_to_failure() {
        let scanner = Arc::new(ScriptedScanner::from_codes(&["ZZZ999"]));
        let verifier =
            Arc::new(FixedVerifier::new(Err(VerifyError::Transport("refused".to_string()))));
        let mut h = start(scanner, verifier);

        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Scanning);
        assert_eq!(next(&mut h).await, AppState::Loading);
        assert_eq!(next(&mut h).await, AppState::Result(VerificationOutcome::Failure));
        assert_eq!(next(&mut h).await, AppState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_scan_request_ignored_while_busy() {
        let scanner = Arc::new(ScriptedScanner::from_codes(&["ABC123", "DEF456"]));
        let verifier = Arc::new(FixedVerifier::new(Ok(VerificationResponse::new(true, "no"))));
        let mut h = start(scanner.clone(), verifier.clone());

        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Scanning);
        assert_eq!(next(&mut h).await, AppState::Loading);

        // Ignored while loading
        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Result(VerificationOutcome::Success));

        // Ignored while the result is displayed
        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Ready);

        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_failure_skips_loading() {
        let scanner = Arc::new(ScriptedScanner::new([ScanEvent::Failed(
            ScanFailure::DeviceUnavailable("no camera".to_string()),
        )]));
        let verifier = Arc::new(FixedVerifier::new(Ok(VerificationResponse::new(true, "yes"))));
        let mut h = start(scanner, verifier.clone());

        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Scanning);
        assert_eq!(next(&mut h).await, AppState::Ready);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_closes_keyboard_session() {
        let (feed, scanner) = keyboard_channel(8);
        let verifier = Arc::new(FixedVerifier::new(Ok(VerificationResponse::new(true, "no"))));
        let mut h = start(Arc::new(scanner), verifier.clone());

        h.commands.send(DeskCommand::StartScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Scanning);
        h.commands.send(DeskCommand::CancelScan).await.unwrap();
        assert_eq!(next(&mut h).await, AppState::Ready);

        // Input typed after cancelling belongs to no session
        assert!(feed.submit("LATE001"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*h.state.borrow(), AppState::Ready);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_ignored_outside_scanning() {
        let scanner = Arc::new(ScriptedScanner::from_codes(&["ABC123"]));
        let verifier = Arc::new(FixedVerifier::new(Ok(VerificationResponse::new(true, "no"))));
        let config = Config::default().without_journal();
        let mut controller =
            DeskController::new(&config, scanner, verifier, Arc::new(Metrics::new()));

        controller.handle(DeskEvent::ScanCancelled);
        assert_eq!(controller.state(), AppState::Ready);
        controller.handle(DeskEvent::ResetElapsed);
        assert_eq!(controller.state(), AppState::Ready);
    }
}

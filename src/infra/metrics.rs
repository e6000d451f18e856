//! Lock-free desk metrics and periodic reporting
//!
//! Counters are plain atomics; `report()` swaps the windowed values so each
//! summary covers the interval since the previous one.
//!
//! NOTE: All atomics use Relaxed ordering. They are statistical counters and
//! must not drive desk decisions.

use crate::domain::types::{ScanFailure, VerificationOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

pub struct Metrics {
    /// Scan sessions opened (monotonic)
    scans_armed: AtomicU64,
    /// Sessions that ended with a code (monotonic)
    scans_decoded: AtomicU64,
    scans_cancelled: AtomicU64,
    /// Capture device could not be opened (monotonic)
    scans_device_failed: AtomicU64,
    /// Capture read errors or closed sources (monotonic)
    scans_io_failed: AtomicU64,
    outcome_success: AtomicU64,
    outcome_priority: AtomicU64,
    outcome_failure: AtomicU64,
    /// Verifications that never got an answer from the backend (monotonic)
    verify_errors: AtomicU64,
    /// Verification latency sum in ms (reset on report)
    verify_latency_sum_ms: AtomicU64,
    /// Verification latency max in ms (reset on report)
    verify_latency_max_ms: AtomicU64,
    /// Verifications since last report (reset on report)
    verify_since_report: AtomicU64,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            scans_armed: AtomicU64::new(0),
            scans_decoded: AtomicU64::new(0),
            scans_cancelled: AtomicU64::new(0),
            scans_device_failed: AtomicU64::new(0),
            scans_io_failed: AtomicU64::new(0),
            outcome_success: AtomicU64::new(0),
            outcome_priority: AtomicU64::new(0),
            outcome_failure: AtomicU64::new(0),
            verify_errors: AtomicU64::new(0),
            verify_latency_sum_ms: AtomicU64::new(0),
            verify_latency_max_ms: AtomicU64::new(0),
            verify_since_report: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn record_scan_armed(&self) {
        self.scans_armed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_scan_decoded(&self) {
        self.scans_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_failed(&self, failure: &ScanFailure) {
        let counter = match failure {
            ScanFailure::Cancelled => &self.scans_cancelled,
            ScanFailure::DeviceUnavailable(_) => &self.scans_device_failed,
            ScanFailure::Io(_) | ScanFailure::Closed => &self.scans_io_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verification(
        &self,
        outcome: VerificationOutcome,
        latency_ms: u64,
        errored: bool,
    ) {
        let counter = match outcome {
            VerificationOutcome::Success => &self.outcome_success,
            VerificationOutcome::Priority => &self.outcome_priority,
            VerificationOutcome::Failure => &self.outcome_failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if errored {
            self.verify_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.verify_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.verify_latency_max_ms, latency_ms);
        self.verify_since_report.fetch_add(1, Ordering::Relaxed);
    }

    /// Admitted attendees (success + priority)
    pub fn admitted(&self) -> u64 {
        self.outcome_success.load(Ordering::Relaxed) + self.outcome_priority.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.outcome_failure.load(Ordering::Relaxed)
    }

    /// Snapshot counters; windowed latency values are reset
    pub fn report(&self) -> MetricsSummary {
        let window_count = self.verify_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.verify_latency_sum_ms.swap(0, Ordering::Relaxed);
        let latency_max = self.verify_latency_max_ms.swap(0, Ordering::Relaxed);
        let avg_verify_latency_ms = if window_count > 0 { latency_sum / window_count } else { 0 };

        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            scans_armed: self.scans_armed.load(Ordering::Relaxed),
            scans_decoded: self.scans_decoded.load(Ordering::Relaxed),
            scans_cancelled: self.scans_cancelled.load(Ordering::Relaxed),
            scans_device_failed: self.scans_device_failed.load(Ordering::Relaxed),
            scans_io_failed: self.scans_io_failed.load(Ordering::Relaxed),
            outcome_success: self.outcome_success.load(Ordering::Relaxed),
            outcome_priority: self.outcome_priority.load(Ordering::Relaxed),
            outcome_failure: self.outcome_failure.load(Ordering::Relaxed),
            verify_errors: self.verify_errors.load(Ordering::Relaxed),
            verifications_in_window: window_count,
            avg_verify_latency_ms,
            max_verify_latency_ms: latency_max,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub scans_armed: u64,
    pub scans_decoded: u64,
    pub scans_cancelled: u64,
    pub scans_device_failed: u64,
    pub scans_io_failed: u64,
    pub outcome_success: u64,
    pub outcome_priority: u64,
    pub outcome_failure: u64,
    pub verify_errors: u64,
    pub verifications_in_window: u64,
    pub avg_verify_latency_ms: u64,
    pub max_verify_latency_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            scans_armed = %self.scans_armed,
            scans_decoded = %self.scans_decoded,
            scans_cancelled = %self.scans_cancelled,
            scans_device_failed = %self.scans_device_failed,
            scans_io_failed = %self.scans_io_failed,
            success = %self.outcome_success,
            priority = %self.outcome_priority,
            failure = %self.outcome_failure,
            verify_errors = %self.verify_errors,
            window_verifications = %self.verifications_in_window,
            avg_verify_ms = %self.avg_verify_latency_ms,
            max_verify_ms = %self.max_verify_latency_ms,
            "desk_metrics"
        );
    }
}

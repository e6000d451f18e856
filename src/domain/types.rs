//! Shared types for the check-in desk

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal status value the backend uses for an accepted code
pub const STATUS_SUCCESS: &str = "success";

/// Literal priority value that marks a priority attendee
pub const PRIORITY_YES: &str = "yes";

/// Priority assumed when the backend omits the field
pub const PRIORITY_DEFAULT: &str = "no";

/// Text payload extracted from a scanned QR code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodedCode(String);

impl DecodedCode {
    /// Keep the payload exactly as read. Returns None for blank reads;
    /// line framing is stripped by the backends.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DecodedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result shown to the operator for one verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    /// ○
    Success,
    /// ◎
    Priority,
    /// ×
    Failure,
}

impl VerificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Success => "success",
            VerificationOutcome::Priority => "priority",
            VerificationOutcome::Failure => "failure",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            VerificationOutcome::Success => "○",
            VerificationOutcome::Priority => "◎",
            VerificationOutcome::Failure => "×",
        }
    }

    /// Map a success flag and priority value to an outcome
    pub fn from_flags(success: bool, priority: &str) -> Self {
        match (success, priority == PRIORITY_YES) {
            (false, _) => VerificationOutcome::Failure,
            (true, true) => VerificationOutcome::Priority,
            (true, false) => VerificationOutcome::Success,
        }
    }

    /// Any verification error counts as success=false
    pub fn from_verification<E>(result: &Result<VerificationResponse, E>) -> Self {
        match result {
            Ok(response) => response.outcome(),
            Err(_) => VerificationOutcome::Failure,
        }
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded answer from the verification backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResponse {
    pub success: bool,
    pub priority: String,
}

impl VerificationResponse {
    pub fn new(success: bool, priority: impl Into<String>) -> Self {
        Self { success, priority: priority.into() }
    }

    pub fn outcome(&self) -> VerificationOutcome {
        VerificationOutcome::from_flags(self.success, &self.priority)
    }
}

/// The single piece of mutable desk state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Ready,
    Scanning,
    Loading,
    Result(VerificationOutcome),
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Ready => "ready",
            AppState::Scanning => "scanning",
            AppState::Loading => "loading",
            AppState::Result(_) => "result",
        }
    }

    pub fn outcome(&self) -> Option<VerificationOutcome> {
        match self {
            AppState::Result(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppState::Result(outcome) => write!(f, "result({})", outcome),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Why a scan session ended without a code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanFailure {
    /// Capture device missing or could not be attached
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("capture read failed: {0}")]
    Io(String),
    #[error("scan cancelled")]
    Cancelled,
    /// Capture source ended before producing a code
    #[error("capture source closed")]
    Closed,
}

impl ScanFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanFailure::DeviceUnavailable(_) => "device_unavailable",
            ScanFailure::Io(_) => "io",
            ScanFailure::Cancelled => "cancelled",
            ScanFailure::Closed => "closed",
        }
    }
}

/// The one event a scan session produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Decoded(DecodedCode),
    Failed(ScanFailure),
}

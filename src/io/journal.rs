//! Check-in journal - appends each completed verification to a file
//!
//! Records are written in JSONL format (one JSON object per line)
//! to the file specified in config.

use crate::domain::types::{DecodedCode, VerificationOutcome};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};
use uuid::Uuid;

/// One line of the journal
#[derive(Debug, Clone, Serialize)]
pub struct CheckinRecord {
    pub id: String,
    pub ts: String,
    pub desk: String,
    pub code: String,
    pub outcome: VerificationOutcome,
    pub latency_ms: u64,
    /// Error class when the backend could not be consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckinRecord {
    pub fn new(
        desk: &str,
        code: &DecodedCode,
        outcome: VerificationOutcome,
        latency_ms: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            ts: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            desk: desk.to_string(),
            code: code.as_str().to_string(),
            outcome,
            latency_ms,
            error: None,
        }
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn to_json(&self) -> String {
        // Serialization of plain strings and integers cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Journal writer for check-ins
pub struct Journal {
    file_path: String,
}

impl Journal {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "journal_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write a record to the journal file
    /// Returns true if successful, false otherwise
    pub fn write_record(&self, record: &CheckinRecord) -> bool {
        match self.append_line(&record.to_json()) {
            Ok(()) => {
                debug!(id = %record.id, outcome = %record.outcome, "checkin_journaled");
                true
            }
            Err(e) => {
                error!(id = %record.id, error = %e, "checkin_journal_failed");
                false
            }
        }
    }

    /// Append a line to the journal file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }
}

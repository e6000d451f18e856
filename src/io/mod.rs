//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `scanner` - Scan session contract plus keyboard and scripted backends
//! - `serial_scanner` - Serial / USB-CDC QR reader backend
//! - `verifier` - HTTP client for the roster verification backend
//! - `journal` - Check-in output to file (JSONL format)

pub mod journal;
pub mod scanner;
pub mod serial_scanner;
pub mod verifier;

// Re-export commonly used types
pub use journal::{CheckinRecord, Journal};
pub use scanner::{keyboard_channel, KeyboardFeed, ScanSession, ScanSource, ScriptedScanner};
pub use serial_scanner::SerialScanner;
pub use verifier::{HttpVerifier, Verifier, VerifyError};

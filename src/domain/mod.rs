//! Domain models - desk state and verification types
//!
//! This module contains the canonical data types used throughout the desk:
//! - `AppState` - the single piece of mutable desk state
//! - `VerificationOutcome` - pass / priority / fail shown to the operator
//! - `DecodedCode` - text payload from one scan
//! - `DeskMachine` - pure transition function over `AppState`

pub mod machine;
pub mod types;

// Re-export commonly used types at module level
pub use machine::{DeskEffect, DeskEvent, DeskMachine};
pub use types::{
    AppState, DecodedCode, ScanEvent, ScanFailure, VerificationOutcome, VerificationResponse,
};

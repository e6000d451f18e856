//! Services - desk orchestration
//!
//! - `controller` - owns the desk state and runs scan/verify effects

pub mod controller;

pub use controller::{DeskCommand, DeskController};

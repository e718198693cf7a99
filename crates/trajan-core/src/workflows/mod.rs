//! # Workflows Module
//!
//! The highest-level, user-facing layer. It ties the engine's state machine
//! and the core's data models together into a complete acquisition run that
//! hands every post-processed frame to a caller-supplied analysis step.

pub mod run;

pub use run::{AnalysisInputs, run_analysis};

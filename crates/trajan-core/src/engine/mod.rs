//! # Engine Module
//!
//! The stateful layer of the acquisition pipeline. It holds the analysis
//! configuration, negotiates user-facing options for periodic-boundary and
//! time-unit overrides, and drives frame iteration through a strict state
//! machine.
//!
//! ## Architecture
//!
//! - **Configuration** ([`settings`]) - Requirement flags, PBC policy, frame
//!   content mask, time unit, and plot settings
//! - **Option Negotiation** ([`options`]) - The externally-owned option
//!   container the runner publishes its overrides into
//! - **Acquisition Driver** ([`runner`]) - The `RunnerCommon` state machine
//! - **File Configuration** ([`config`]) - Optional TOML run configuration
//!   seeding settings defaults
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod options;
pub mod runner;
pub mod settings;

//! # Trajan Core Library
//!
//! A control core for molecular-simulation trajectory analysis: it governs how a
//! trajectory is opened, which per-frame data is requested, how periodic-boundary
//! handling is configured and overridden by the user, and how frames are iterated
//! and handed to an analysis step.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Frame`,
//!   `TopologyInformation`), periodic-boundary mathematics including whole-molecule
//!   reconstruction, and the narrow collaborator traits through which trajectory and
//!   topology data enter the pipeline.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer holds the analysis
//!   configuration (`AnalysisSettings`), the command-line option negotiation seam
//!   (`OptionsContainer`), and the frame-acquisition state machine (`RunnerCommon`)
//!   that enforces the strict ordering of the acquisition protocol.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute a complete acquisition run,
//!   delivering each post-processed frame to a caller-supplied analysis step.
//!
//! ## Scope
//!
//! Trajan deliberately does not decode on-disk trajectory or topology formats, parse
//! command lines, or compile selection expressions. Those concerns live behind the
//! collaborator seams in [`core::io`]; the library owns only the acquisition and
//! configuration pipeline between them and the analysis code.

pub mod core;
pub mod engine;
pub mod workflows;

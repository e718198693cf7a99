//! # Core Module
//!
//! This module provides the fundamental building blocks for trajectory acquisition:
//! the per-frame and topology data models, the periodic-boundary mathematics used
//! for whole-molecule reconstruction, and the narrow I/O seams through which
//! external format decoders deliver their data.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Frame buffers, content masks, and topology information
//! - **Periodic Boundaries** ([`pbc`]) - Box representation, minimum-image convention,
//!   and whole-molecule reconstruction over bond connectivity
//! - **Collaborator Seams** ([`io`]) - Traits implemented by trajectory and topology
//!   providers; the core never interprets on-disk formats itself

pub mod io;
pub mod models;
pub mod pbc;

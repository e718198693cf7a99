//! Collaborator seams for trajectory and topology input.
//!
//! The acquisition pipeline never interprets on-disk formats. Format decoders
//! live outside this crate and plug in through the traits defined here.

pub mod traits;

pub use traits::{TopologyError, TopologyProvider, TrajectoryError, TrajectorySource};

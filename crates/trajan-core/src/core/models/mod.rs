//! Data models shared across the acquisition pipeline.
//!
//! [`frame`] holds the reusable per-frame buffer and the content mask that
//! selects which buffers a trajectory source must fill. [`topology`] holds the
//! at-most-once-loaded structural information (atom count, connectivity, and
//! optional reference coordinates) shared read-only with the analysis step.

pub mod frame;
pub mod topology;

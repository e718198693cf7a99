use crate::core::models::frame::{Frame, FrameContent};
use crate::core::models::topology::TopologyInformation;
use std::io;
use thiserror::Error;

/// Errors surfaced by a trajectory source.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("I/O error while reading trajectory: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed trajectory frame at step {step}: {message}")]
    Malformed { step: u64, message: String },
}

/// Errors surfaced by a topology provider.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("I/O error while reading topology: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed topology: {0}")]
    Malformed(String),
}

/// Which optional topology data the caller wants retained after loading.
///
/// Derived by the runner from the analysis requirement flags so that topology
/// providers stay independent of the engine layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyRequest {
    /// Retain the reference coordinates stored in the topology.
    pub positions: bool,
    /// Retain the reference velocities stored in the topology.
    pub velocities: bool,
}

/// A sequential stream of trajectory frames.
///
/// Implementors decode whatever on-disk or in-memory representation they wrap
/// and fill the caller-owned [`Frame`] buffer in place, honoring the requested
/// [`FrameContent`] mask. The stream is consumed front to back; there is no
/// rewinding.
pub trait TrajectorySource {
    /// Fills `frame` with the next frame of the stream.
    ///
    /// Returns `Ok(false)` when the stream is exhausted, which is the sole
    /// expected termination signal and not an error. On `Ok(false)` the
    /// contents of `frame` are unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures or malformed frame data; the run
    /// aborts, no retry is attempted.
    fn read_next(
        &mut self,
        frame: &mut Frame,
        content: FrameContent,
    ) -> Result<bool, TrajectoryError>;
}

/// A source of structural information about the simulated system.
///
/// Queried at most once per run, and only when the analysis requires a
/// topology or the user supplied one explicitly.
pub trait TopologyProvider {
    /// Loads the topology.
    ///
    /// The `request` indicates which optional reference data should be
    /// retained; providers may ignore it and deliver more, the runner strips
    /// anything that was not requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology cannot be read or is malformed.
    fn load(&self, request: TopologyRequest) -> Result<TopologyInformation, TopologyError>;
}

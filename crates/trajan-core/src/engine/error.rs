use crate::core::io::traits::{TopologyError, TrajectoryError};
use crate::engine::options::OptionsError;
use thiserror::Error;

/// Errors surfaced by the acquisition state machine.
///
/// These cover resource failures and contract violations by collaborators.
/// Calling runner operations out of state order is not represented here; that
/// is a programming error and panics.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Trajectory read failed: {source}")]
    Trajectory {
        #[from]
        source: TrajectoryError,
    },

    #[error("Topology load failed: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("Option negotiation failed: {source}")]
    Options {
        #[from]
        source: OptionsError,
    },

    #[error("The analysis requires a topology but no topology provider was supplied")]
    TopologyRequired,

    #[error("Trajectory contains no frames")]
    EmptyTrajectory,

    #[error("Trajectory frame has {frame_atoms} atoms but the topology defines {topology_atoms}")]
    AtomCountMismatch {
        frame_atoms: usize,
        topology_atoms: usize,
    },

    #[error("Trajectory frame at step {step} lacks a {buffer} buffer covering all atoms")]
    MissingBuffer { buffer: &'static str, step: u64 },

    #[error("Index {index} in the frame index group is out of range for {atom_count} atoms")]
    IndexOutOfRange { index: usize, atom_count: usize },
}

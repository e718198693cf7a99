use crate::core::io::traits::{TopologyProvider, TopologyRequest, TrajectorySource};
use crate::core::models::frame::Frame;
use crate::core::models::topology::TopologyInformation;
use crate::core::pbc::make_molecules_whole;
use crate::engine::error::RunnerError;
use crate::engine::options::{
    OPT_PBC, OPT_RM_PBC, OPT_TIME_UNIT, OptionValue, OptionsContainer,
};
use crate::engine::settings::{AnalysisSettings, Requirement};
use tracing::{debug, warn};

/// The states of the acquisition protocol, in strict order.
///
/// Each state is a precondition for the operations that move to the next one;
/// calling an operation from any other state is a contract breach and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Constructed,
    OptionsRegistered,
    OptionsFinished,
    TopologyInitialized,
    FirstFrameLoaded,
    Exhausted,
}

/// Drives frame acquisition for one trajectory analysis run.
///
/// Consumes an [`AnalysisSettings`], publishes the PBC/time-unit override
/// options into an externally-owned [`OptionsContainer`], loads topology when
/// required, and exposes an iterator-like protocol over trajectory frames,
/// post-processing each frame as configured. The protocol must be driven in
/// the order of [`RunnerState`]:
///
/// 1. [`init_options`](Self::init_options)
/// 2. [`options_finished`](Self::options_finished), after external parsing
/// 3. [`init_topology`](Self::init_topology)
/// 4. [`init_first_frame`](Self::init_first_frame)
/// 5. optionally [`init_frame_index_group`](Self::init_frame_index_group),
///    after selections have been compiled
/// 6. per frame: [`init_frame`](Self::init_frame), analysis on
///    [`frame`](Self::frame), then [`read_next_frame`](Self::read_next_frame)
///    until it returns false
///
/// The runner exclusively owns its frame buffer, the trajectory stream, and
/// the loaded topology; everything runs single-threaded to completion.
pub struct RunnerCommon {
    settings: AnalysisSettings,
    state: RunnerState,
    trajectory: Option<Box<dyn TrajectorySource>>,
    topology_provider: Option<Box<dyn TopologyProvider>>,
    topology: Option<TopologyInformation>,
    frame: Frame,
    index_group: Option<Vec<usize>>,
    pbc_option_registered: bool,
    rm_pbc_option_registered: bool,
    warned_missing_connectivity: bool,
}

impl RunnerCommon {
    /// Creates a runner for the given settings.
    ///
    /// The settings should be treated as read-only by the caller from here
    /// on; module-side changes go through
    /// [`settings_mut`](Self::settings_mut).
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            settings,
            state: RunnerState::Constructed,
            trajectory: None,
            topology_provider: None,
            topology: None,
            frame: Frame::default(),
            index_group: None,
            pbc_option_registered: false,
            rm_pbc_option_registered: false,
            warned_missing_connectivity: false,
        }
    }

    /// Returns the current protocol state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Returns the settings registered with this runner.
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Returns the settings for module-side mutation.
    ///
    /// Calling [`AnalysisSettings::set_pbc`] or
    /// [`AnalysisSettings::set_rm_pbc`] through this after
    /// [`options_finished`](Self::options_finished) overrides the resolved
    /// user choice; the override takes effect from the next
    /// [`init_frame`](Self::init_frame) on.
    pub fn settings_mut(&mut self) -> &mut AnalysisSettings {
        &mut self.settings
    }

    /// Attaches the trajectory stream to iterate over.
    ///
    /// Stands in for the trajectory-file option of a command-line front end,
    /// whose parsing is outside this crate. Without a trajectory the runner
    /// operates in topology-only mode.
    ///
    /// # Panics
    ///
    /// Panics if called after [`init_topology`](Self::init_topology).
    pub fn set_trajectory(&mut self, source: Box<dyn TrajectorySource>) {
        self.expect_before_topology("set_trajectory");
        self.trajectory = Some(source);
    }

    /// Attaches the topology provider.
    ///
    /// A supplied provider is loaded even when the analysis does not require
    /// a topology, matching the semantics of an explicit user-supplied
    /// topology file.
    ///
    /// # Panics
    ///
    /// Panics if called after [`init_topology`](Self::init_topology).
    pub fn set_topology_provider(&mut self, provider: Box<dyn TopologyProvider>) {
        self.expect_before_topology("set_topology_provider");
        self.topology_provider = Some(provider);
    }

    /// Publishes the common analysis options into `options`.
    ///
    /// Registers the PBC override (unless suppressed by
    /// [`Requirement::NoUserPbcOverride`]), the whole-molecule override
    /// (unless suppressed by [`Requirement::NoUserRmPbcOverride`]), and the
    /// time-unit option. Declared defaults are the current settings values.
    /// No trajectory or topology access occurs here.
    ///
    /// # Panics
    ///
    /// Panics if the runner is not in the `Constructed` state.
    pub fn init_options(&mut self, options: &mut OptionsContainer) {
        self.expect_state(RunnerState::Constructed, "init_options");
        if !self.settings.has_flag(Requirement::NoUserPbcOverride) {
            options.declare(
                OPT_PBC,
                OptionValue::Bool(self.settings.has_pbc()),
                "Use periodic boundary conditions for distance calculation",
            );
            self.pbc_option_registered = true;
        }
        if !self.settings.has_flag(Requirement::NoUserRmPbcOverride) {
            options.declare(
                OPT_RM_PBC,
                OptionValue::Bool(self.settings.has_rm_pbc()),
                "Make molecules whole for each frame",
            );
            self.rm_pbc_option_registered = true;
        }
        options.declare(
            OPT_TIME_UNIT,
            OptionValue::TimeUnit(self.settings.time_unit()),
            "Unit for time values",
        );
        self.state = RunnerState::OptionsRegistered;
        debug!(
            pbc_option = self.pbc_option_registered,
            rmpbc_option = self.rm_pbc_option_registered,
            "analysis options registered"
        );
    }

    /// Processes the common option values after external parsing completed.
    ///
    /// Resolves the effective PBC and whole-molecule values (module default,
    /// overridden by a user-supplied value where the option was registered)
    /// and locks the time unit. Must be called exactly once, before any
    /// topology or frame access.
    ///
    /// # Panics
    ///
    /// Panics if called twice or before
    /// [`init_options`](Self::init_options).
    pub fn options_finished(&mut self, options: &OptionsContainer) {
        self.expect_state(RunnerState::OptionsRegistered, "options_finished");
        if self.pbc_option_registered {
            if let Some(pbc) = options.user_bool(OPT_PBC) {
                self.settings.set_pbc(pbc);
            }
        }
        if self.rm_pbc_option_registered {
            if let Some(rm_pbc) = options.user_bool(OPT_RM_PBC) {
                self.settings.set_rm_pbc(rm_pbc);
            }
        }
        if let Some(unit) = options.user_time_unit(OPT_TIME_UNIT) {
            self.settings.set_time_unit(unit);
        }
        self.state = RunnerState::OptionsFinished;
        debug!(
            pbc = self.settings.has_pbc(),
            rmpbc = self.settings.has_rm_pbc(),
            time_unit = %self.settings.time_unit(),
            "analysis options resolved"
        );
    }

    /// Loads topology information if provided and/or required.
    ///
    /// The topology is loaded when [`Requirement::RequireTopology`] is set or
    /// a provider was attached; otherwise [`topology`](Self::topology) simply
    /// reports unavailable and the run proceeds. Reference coordinates and
    /// velocities are retained only when the corresponding requirement flags
    /// ask for them.
    ///
    /// # Errors
    ///
    /// Fails if a topology is required but no provider was attached, or if
    /// the provider fails to load.
    ///
    /// # Panics
    ///
    /// Panics if called twice or out of order.
    pub fn init_topology(&mut self) -> Result<(), RunnerError> {
        self.expect_state(RunnerState::OptionsFinished, "init_topology");
        if self.settings.has_flag(Requirement::RequireTopology) && self.topology_provider.is_none()
        {
            return Err(RunnerError::TopologyRequired);
        }
        if let Some(provider) = &self.topology_provider {
            let request = TopologyRequest {
                positions: self.settings.has_flag(Requirement::UseTopologyPositions),
                velocities: self.settings.has_flag(Requirement::UseTopologyVelocities),
            };
            let mut topology = provider.load(request)?;
            if !request.positions {
                topology.drop_reference_positions();
            }
            if !request.velocities {
                topology.drop_reference_velocities();
            }
            debug!(
                atoms = topology.atom_count(),
                bonds = topology.bonds().len(),
                "topology loaded"
            );
            self.topology = Some(topology);
        }
        self.state = RunnerState::TopologyInitialized;
        Ok(())
    }

    /// Reads the first frame from the trajectory into the internal buffer.
    ///
    /// After this call, [`frame`](Self::frame) returns the first frame. When
    /// no trajectory was attached the runner enters topology-only mode: the
    /// buffer is filled from the topology's reference coordinates when those
    /// were retained, and frame iteration yields zero frames.
    ///
    /// # Errors
    ///
    /// Fails if the trajectory cannot be read, contains no frames, or its
    /// first frame disagrees with the topology atom count or lacks a
    /// requested buffer.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init_topology`](Self::init_topology).
    pub fn init_first_frame(&mut self) -> Result<(), RunnerError> {
        self.expect_state(RunnerState::TopologyInitialized, "init_first_frame");
        if self.trajectory.is_some() {
            if !self.read_raw_frame()? {
                return Err(RunnerError::EmptyTrajectory);
            }
            debug!(
                step = self.frame.step,
                time = self.frame.time,
                atoms = self.frame.atom_count(),
                "first frame loaded"
            );
        } else {
            self.frame.clear();
            if let Some(topology) = &self.topology {
                if let Some(positions) = topology.reference_positions() {
                    self.frame.positions.extend_from_slice(positions);
                }
                if let Some(velocities) = topology.reference_velocities() {
                    self.frame.velocities.extend_from_slice(velocities);
                }
            }
            debug!("no trajectory attached, running in topology-only mode");
        }
        self.state = RunnerState::FirstFrameLoaded;
        Ok(())
    }

    /// Establishes the subset of atom indices the frame buffers represent.
    ///
    /// Must be called after selections have been compiled and before
    /// iteration; the subset determines which atoms' coordinates are
    /// materialized in [`frame`](Self::frame), for the already-loaded first
    /// frame as well as every subsequent one.
    ///
    /// # Errors
    ///
    /// Fails if any index is out of range for the system.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init_first_frame`](Self::init_first_frame).
    pub fn init_frame_index_group(&mut self, indices: &[usize]) -> Result<(), RunnerError> {
        self.expect_state(RunnerState::FirstFrameLoaded, "init_frame_index_group");
        let atom_count = match &self.topology {
            Some(topology) => topology.atom_count(),
            None => self.frame.atom_count(),
        };
        if let Some(&index) = indices.iter().find(|&&index| index >= atom_count) {
            return Err(RunnerError::IndexOutOfRange { index, atom_count });
        }
        self.index_group = Some(indices.to_vec());
        self.apply_index_group()?;
        Ok(())
    }

    /// Advances to the next frame.
    ///
    /// Returns false when the stream is depleted; the runner then stays
    /// exhausted and further calls keep returning false. After a successful
    /// advance, [`frame`](Self::frame) returns the newly loaded frame.
    ///
    /// # Errors
    ///
    /// Fails on trajectory read errors or frames inconsistent with the
    /// topology or the requested content.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init_first_frame`](Self::init_first_frame).
    pub fn read_next_frame(&mut self) -> Result<bool, RunnerError> {
        match self.state {
            RunnerState::Exhausted => return Ok(false),
            RunnerState::FirstFrameLoaded => {}
            other => panic!(
                "read_next_frame called in state {other:?}, expected FirstFrameLoaded or Exhausted"
            ),
        }
        if self.read_raw_frame()? {
            Ok(true)
        } else {
            self.state = RunnerState::Exhausted;
            debug!("trajectory exhausted");
            Ok(false)
        }
    }

    /// Performs common initialization for the currently loaded frame.
    ///
    /// Makes molecules whole using the topology's connectivity if the
    /// effective whole-molecule setting asks for it; a no-op otherwise. The
    /// effective setting is re-read on every call, so a late
    /// [`AnalysisSettings::set_rm_pbc`] takes effect from the next frame.
    /// When reconstruction is requested but no usable connectivity is
    /// available, or the frame does not cover the full topology, the step is
    /// skipped with a warning instead of failing the run.
    ///
    /// # Panics
    ///
    /// Panics if no frame has been loaded.
    pub fn init_frame(&mut self) {
        self.expect_state(RunnerState::FirstFrameLoaded, "init_frame");
        if !self.settings.has_rm_pbc() {
            return;
        }
        let Some(topology) = &self.topology else {
            self.warn_missing_connectivity("no topology was loaded");
            return;
        };
        if !topology.has_connectivity() {
            self.warn_missing_connectivity("the topology carries no bonds");
            return;
        }
        if self.frame.atom_count() != topology.atom_count() {
            self.warn_missing_connectivity("the frame does not cover all topology atoms");
            return;
        }
        make_molecules_whole(&mut self.frame, topology);
    }

    /// Returns true if input data comes from a trajectory.
    pub fn has_trajectory(&self) -> bool {
        self.trajectory.is_some()
    }

    /// Returns the topology information, if it was loaded.
    pub fn topology(&self) -> Option<&TopologyInformation> {
        self.topology.as_ref()
    }

    /// Returns the currently loaded frame.
    ///
    /// The borrow is valid until the next frame is read.
    ///
    /// # Panics
    ///
    /// Panics if called before any frame was loaded.
    pub fn frame(&self) -> &Frame {
        match self.state {
            RunnerState::FirstFrameLoaded | RunnerState::Exhausted => &self.frame,
            other => panic!("frame() called in state {other:?} before any frame was loaded"),
        }
    }

    fn read_raw_frame(&mut self) -> Result<bool, RunnerError> {
        let content = self.settings.frame_content();
        let Some(source) = self.trajectory.as_mut() else {
            return Ok(false);
        };
        if !source.read_next(&mut self.frame, content)? {
            return Ok(false);
        }
        let atoms = self.frame.atom_count();
        // A buffer the source delivers unbidden must still cover every atom,
        // or index-group application would read past its end.
        if (content.velocities || !self.frame.velocities.is_empty())
            && self.frame.velocities.len() != atoms
        {
            return Err(RunnerError::MissingBuffer {
                buffer: "velocity",
                step: self.frame.step,
            });
        }
        if (content.forces || !self.frame.forces.is_empty()) && self.frame.forces.len() != atoms {
            return Err(RunnerError::MissingBuffer {
                buffer: "force",
                step: self.frame.step,
            });
        }
        if let Some(topology) = &self.topology {
            if topology.atom_count() != atoms {
                return Err(RunnerError::AtomCountMismatch {
                    frame_atoms: atoms,
                    topology_atoms: topology.atom_count(),
                });
            }
        }
        self.apply_index_group()
            .map(|()| true)
    }

    /// Restricts the loaded frame to the configured index group, if any.
    fn apply_index_group(&mut self) -> Result<(), RunnerError> {
        let Some(group) = &self.index_group else {
            return Ok(());
        };
        if self.frame.positions.is_empty() {
            return Ok(());
        }
        let atom_count = self.frame.positions.len();
        if let Some(&index) = group.iter().find(|&&index| index >= atom_count) {
            return Err(RunnerError::IndexOutOfRange { index, atom_count });
        }
        gather(&mut self.frame.positions, group);
        if !self.frame.velocities.is_empty() {
            gather(&mut self.frame.velocities, group);
        }
        if !self.frame.forces.is_empty() {
            gather(&mut self.frame.forces, group);
        }
        Ok(())
    }

    fn warn_missing_connectivity(&mut self, reason: &str) {
        if !self.warned_missing_connectivity {
            warn!("skipping whole-molecule reconstruction: {reason}");
            self.warned_missing_connectivity = true;
        }
    }

    fn expect_state(&self, expected: RunnerState, operation: &str) {
        if self.state != expected {
            panic!("{operation} called in state {:?}, expected {expected:?}", self.state);
        }
    }

    fn expect_before_topology(&self, operation: &str) {
        match self.state {
            RunnerState::Constructed
            | RunnerState::OptionsRegistered
            | RunnerState::OptionsFinished => {}
            other => panic!("{operation} called in state {other:?}, inputs must be attached before init_topology"),
        }
    }
}

fn gather<T: Copy>(buffer: &mut Vec<T>, group: &[usize]) {
    let selected: Vec<T> = group.iter().map(|&index| buffer[index]).collect();
    *buffer = selected;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::traits::{TopologyError, TrajectoryError};
    use crate::core::models::frame::FrameContent;
    use crate::engine::settings::{RequirementFlags, TimeUnit};
    use nalgebra::{Matrix3, Point3, Vector3};

    struct VecTrajectory {
        frames: Vec<Frame>,
        cursor: usize,
    }

    impl VecTrajectory {
        fn new(frames: Vec<Frame>) -> Box<Self> {
            Box::new(Self { frames, cursor: 0 })
        }
    }

    impl TrajectorySource for VecTrajectory {
        fn read_next(
            &mut self,
            frame: &mut Frame,
            _content: FrameContent,
        ) -> Result<bool, TrajectoryError> {
            match self.frames.get(self.cursor) {
                Some(next) => {
                    *frame = next.clone();
                    self.cursor += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    struct StaticTopology(TopologyInformation);

    impl TopologyProvider for StaticTopology {
        fn load(&self, _request: TopologyRequest) -> Result<TopologyInformation, TopologyError> {
            Ok(self.0.clone())
        }
    }

    /// Delivers its frames, then fails as a truncated stream would.
    struct TruncatedTrajectory {
        good: Vec<Frame>,
        cursor: usize,
    }

    impl TrajectorySource for TruncatedTrajectory {
        fn read_next(
            &mut self,
            frame: &mut Frame,
            _content: FrameContent,
        ) -> Result<bool, TrajectoryError> {
            match self.good.get(self.cursor) {
                Some(next) => {
                    *frame = next.clone();
                    self.cursor += 1;
                    Ok(true)
                }
                None => Err(TrajectoryError::Malformed {
                    step: self.cursor as u64,
                    message: "truncated frame header".into(),
                }),
            }
        }
    }

    struct FailingTopology;

    impl TopologyProvider for FailingTopology {
        fn load(&self, _request: TopologyRequest) -> Result<TopologyInformation, TopologyError> {
            Err(TopologyError::Malformed("unreadable bond section".into()))
        }
    }

    fn cubic_box(length: f64) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(length, length, length))
    }

    fn test_frame(atoms: usize, step: u64) -> Frame {
        Frame {
            step,
            time: step as f64,
            box_matrix: cubic_box(10.0),
            positions: (0..atoms)
                .map(|i| Point3::new(1.0 + i as f64 * 0.5, 2.0, 3.0))
                .collect(),
            ..Frame::default()
        }
    }

    fn test_frames(atoms: usize, count: u64) -> Vec<Frame> {
        (0..count).map(|step| test_frame(atoms, step)).collect()
    }

    /// Drives the protocol up to and including `init_first_frame`.
    fn runner_with_frames(settings: AnalysisSettings, frames: Vec<Frame>) -> RunnerCommon {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.set_trajectory(VecTrajectory::new(frames));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        runner.init_first_frame().unwrap();
        runner
    }

    #[test]
    fn user_override_wins_over_module_default() {
        let mut settings = AnalysisSettings::new();
        settings.set_pbc(true);
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.init_options(&mut options);
        options.set_value(OPT_PBC, OptionValue::Bool(false)).unwrap();
        runner.options_finished(&options);
        assert!(!runner.settings().has_pbc());
    }

    #[test]
    fn untouched_option_keeps_module_default() {
        let mut settings = AnalysisSettings::new();
        settings.set_rm_pbc(false);
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.init_options(&mut options);
        runner.options_finished(&options);
        assert!(!runner.settings().has_rm_pbc());
        assert!(runner.settings().has_pbc());
    }

    #[test]
    fn no_user_pbc_override_suppresses_the_option() {
        let mut settings = AnalysisSettings::new();
        settings.set_flags(RequirementFlags::NONE.with(Requirement::NoUserPbcOverride));
        settings.set_pbc(false);
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.init_options(&mut options);

        assert!(!options.is_declared(OPT_PBC));
        assert!(options.is_declared(OPT_RM_PBC));
        // An externally injected value cannot land anywhere.
        assert!(matches!(
            options.set_value(OPT_PBC, OptionValue::Bool(true)),
            Err(crate::engine::options::OptionsError::UnknownOption(_))
        ));

        runner.options_finished(&options);
        assert!(!runner.settings().has_pbc());
    }

    #[test]
    fn no_user_rm_pbc_override_suppresses_the_option() {
        let mut settings = AnalysisSettings::new();
        settings.set_flags(RequirementFlags::NONE.with(Requirement::NoUserRmPbcOverride));
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.init_options(&mut options);
        assert!(options.is_declared(OPT_PBC));
        assert!(!options.is_declared(OPT_RM_PBC));
        runner.options_finished(&options);
        assert!(runner.settings().has_rm_pbc());
    }

    #[test]
    fn time_unit_option_resolves_into_settings() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.init_options(&mut options);
        options
            .set_value(OPT_TIME_UNIT, OptionValue::TimeUnit(TimeUnit::Nanosecond))
            .unwrap();
        runner.options_finished(&options);
        assert_eq!(runner.settings().time_unit(), TimeUnit::Nanosecond);
        assert_eq!(
            runner.settings().plot_settings().time_unit,
            TimeUnit::Nanosecond
        );
    }

    #[test]
    fn read_next_frame_exhausts_idempotently() {
        let mut runner = runner_with_frames(AnalysisSettings::new(), test_frames(2, 3));
        assert_eq!(runner.frame().step, 0);
        assert!(runner.read_next_frame().unwrap());
        assert!(runner.read_next_frame().unwrap());
        assert!(!runner.read_next_frame().unwrap());
        assert_eq!(runner.state(), RunnerState::Exhausted);
        assert!(!runner.read_next_frame().unwrap());
        assert!(!runner.read_next_frame().unwrap());
    }

    #[test]
    fn empty_trajectory_is_an_error_at_first_frame() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(VecTrajectory::new(Vec::new()));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert!(matches!(
            runner.init_first_frame(),
            Err(RunnerError::EmptyTrajectory)
        ));
    }

    #[test]
    #[should_panic(expected = "frame() called in state")]
    fn frame_before_first_load_panics() {
        let runner = RunnerCommon::new(AnalysisSettings::new());
        let _ = runner.frame();
    }

    #[test]
    #[should_panic(expected = "options_finished called in state OptionsFinished")]
    fn options_finished_twice_panics() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.options_finished(&options);
    }

    #[test]
    #[should_panic(expected = "init_topology called in state TopologyInitialized")]
    fn init_topology_twice_panics() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        let _ = runner.init_topology();
    }

    #[test]
    #[should_panic(expected = "read_next_frame called in state OptionsFinished")]
    fn read_next_frame_before_first_frame_panics() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(VecTrajectory::new(test_frames(2, 1)));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        let _ = runner.read_next_frame();
    }

    #[test]
    fn missing_topology_without_requirement_is_not_an_error() {
        let mut runner = runner_with_frames(AnalysisSettings::new(), test_frames(2, 1));
        assert!(runner.topology().is_none());
        assert!(runner.has_trajectory());
        assert!(!runner.read_next_frame().unwrap());
    }

    #[test]
    fn required_topology_without_provider_is_an_error() {
        let mut settings = AnalysisSettings::new();
        settings.set_flag(Requirement::RequireTopology, true);
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.init_options(&mut options);
        runner.options_finished(&options);
        assert!(matches!(
            runner.init_topology(),
            Err(RunnerError::TopologyRequired)
        ));
    }

    #[test]
    fn supplied_topology_is_loaded_even_without_requirement() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_topology_provider(Box::new(StaticTopology(TopologyInformation::new(4))));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert_eq!(runner.topology().unwrap().atom_count(), 4);
    }

    #[test]
    fn reference_data_is_stripped_unless_requested() {
        let mut top = TopologyInformation::new(2);
        top.set_reference_positions(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)])
            .unwrap();
        top.set_reference_velocities(vec![Vector3::zeros(), Vector3::zeros()])
            .unwrap();

        let mut settings = AnalysisSettings::new();
        settings.set_flag(Requirement::UseTopologyPositions, true);
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.set_topology_provider(Box::new(StaticTopology(top)));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();

        let loaded = runner.topology().unwrap();
        assert!(loaded.reference_positions().is_some());
        assert!(loaded.reference_velocities().is_none());
    }

    #[test]
    fn topology_only_mode_yields_zero_frames() {
        let mut top = TopologyInformation::new(2);
        top.set_reference_positions(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)])
            .unwrap();
        let mut settings = AnalysisSettings::new();
        settings.set_flag(Requirement::UseTopologyPositions, true);

        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.set_topology_provider(Box::new(StaticTopology(top)));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        runner.init_first_frame().unwrap();

        assert!(!runner.has_trajectory());
        assert_eq!(runner.frame().atom_count(), 2);
        assert!(!runner.read_next_frame().unwrap());
        assert_eq!(runner.state(), RunnerState::Exhausted);
    }

    #[test]
    fn frame_topology_atom_count_mismatch_is_an_error() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(VecTrajectory::new(test_frames(3, 1)));
        runner.set_topology_provider(Box::new(StaticTopology(TopologyInformation::new(5))));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert!(matches!(
            runner.init_first_frame(),
            Err(RunnerError::AtomCountMismatch {
                frame_atoms: 3,
                topology_atoms: 5,
            })
        ));
    }

    #[test]
    fn missing_requested_velocities_is_an_error() {
        let mut settings = AnalysisSettings::new();
        settings.set_frame_content(FrameContent {
            velocities: true,
            forces: false,
        });
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.set_trajectory(VecTrajectory::new(test_frames(2, 1)));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert!(matches!(
            runner.init_first_frame(),
            Err(RunnerError::MissingBuffer {
                buffer: "velocity",
                ..
            })
        ));
    }

    #[test]
    fn trajectory_error_propagates_from_init_first_frame() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(Box::new(TruncatedTrajectory {
            good: Vec::new(),
            cursor: 0,
        }));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert!(matches!(
            runner.init_first_frame(),
            Err(RunnerError::Trajectory {
                source: TrajectoryError::Malformed { .. },
            })
        ));
    }

    #[test]
    fn trajectory_error_propagates_mid_iteration() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(Box::new(TruncatedTrajectory {
            good: test_frames(2, 1),
            cursor: 0,
        }));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        runner.init_first_frame().unwrap();
        assert_eq!(runner.frame().step, 0);
        assert!(matches!(
            runner.read_next_frame(),
            Err(RunnerError::Trajectory {
                source: TrajectoryError::Malformed { step: 1, .. },
            })
        ));
    }

    #[test]
    fn topology_error_propagates_from_init_topology() {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_topology_provider(Box::new(FailingTopology));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        assert!(matches!(
            runner.init_topology(),
            Err(RunnerError::Topology {
                source: TopologyError::Malformed(_),
            })
        ));
    }

    #[test]
    fn short_unrequested_velocity_buffer_is_an_error() {
        let mut frame = test_frame(3, 0);
        frame.velocities.push(Vector3::zeros());

        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(AnalysisSettings::new());
        runner.set_trajectory(VecTrajectory::new(vec![frame]));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        assert!(matches!(
            runner.init_first_frame(),
            Err(RunnerError::MissingBuffer {
                buffer: "velocity",
                ..
            })
        ));
    }

    #[test]
    fn full_unrequested_velocity_buffer_follows_the_index_group() {
        let mut frame = test_frame(3, 0);
        frame.velocities = (0..3).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();

        let mut runner = runner_with_frames(AnalysisSettings::new(), vec![frame]);
        runner.init_frame_index_group(&[2]).unwrap();
        assert_eq!(
            runner.frame().velocities,
            vec![Vector3::new(2.0, 0.0, 0.0)]
        );
    }

    #[test]
    fn index_group_restricts_current_and_subsequent_frames() {
        let mut runner = runner_with_frames(AnalysisSettings::new(), test_frames(4, 2));
        runner.init_frame_index_group(&[1, 3]).unwrap();

        assert_eq!(runner.frame().atom_count(), 2);
        assert_eq!(runner.frame().positions[0], Point3::new(1.5, 2.0, 3.0));
        assert_eq!(runner.frame().positions[1], Point3::new(2.5, 2.0, 3.0));

        assert!(runner.read_next_frame().unwrap());
        assert_eq!(runner.frame().atom_count(), 2);
        assert_eq!(runner.frame().positions[1], Point3::new(2.5, 2.0, 3.0));
    }

    #[test]
    fn index_group_out_of_range_is_an_error() {
        let mut runner = runner_with_frames(AnalysisSettings::new(), test_frames(4, 1));
        assert!(matches!(
            runner.init_frame_index_group(&[0, 4]),
            Err(RunnerError::IndexOutOfRange {
                index: 4,
                atom_count: 4,
            })
        ));
    }

    fn split_molecule_frame() -> Frame {
        Frame {
            box_matrix: cubic_box(10.0),
            positions: vec![Point3::new(9.75, 5.0, 5.0), Point3::new(0.25, 5.0, 5.0)],
            ..Frame::default()
        }
    }

    fn bonded_pair_topology() -> TopologyInformation {
        let mut top = TopologyInformation::new(2);
        top.add_bond(0, 1).unwrap();
        top
    }

    fn runner_with_split_molecule(settings: AnalysisSettings) -> RunnerCommon {
        let mut options = OptionsContainer::new();
        let mut runner = RunnerCommon::new(settings);
        runner.set_trajectory(VecTrajectory::new(vec![split_molecule_frame()]));
        runner.set_topology_provider(Box::new(StaticTopology(bonded_pair_topology())));
        runner.init_options(&mut options);
        runner.options_finished(&options);
        runner.init_topology().unwrap();
        runner.init_first_frame().unwrap();
        runner
    }

    #[test]
    fn init_frame_makes_split_molecule_whole() {
        let mut runner = runner_with_split_molecule(AnalysisSettings::new());
        runner.init_frame();
        assert_eq!(runner.frame().positions[1], Point3::new(10.25, 5.0, 5.0));
    }

    #[test]
    fn init_frame_is_a_no_op_without_rm_pbc() {
        let mut settings = AnalysisSettings::new();
        settings.set_rm_pbc(false);
        let mut runner = runner_with_split_molecule(settings);
        runner.init_frame();
        assert_eq!(runner.frame().positions[1], Point3::new(0.25, 5.0, 5.0));
    }

    #[test]
    fn late_set_rm_pbc_disables_reconstruction() {
        let mut runner = runner_with_split_molecule(AnalysisSettings::new());
        runner.settings_mut().set_rm_pbc(false);
        runner.init_frame();
        assert_eq!(runner.frame().positions[1], Point3::new(0.25, 5.0, 5.0));
    }

    #[test]
    fn init_frame_skips_reconstruction_without_connectivity() {
        // rm-pbc defaults to true, but with no topology the step must be
        // skipped rather than fail the run.
        let mut runner = runner_with_frames(AnalysisSettings::new(), test_frames(2, 1));
        runner.init_frame();
        assert_eq!(runner.frame().positions[0], Point3::new(1.0, 2.0, 3.0));
    }
}

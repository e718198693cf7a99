use crate::core::io::traits::{TopologyProvider, TrajectorySource};
use crate::core::models::frame::Frame;
use crate::engine::error::RunnerError;
use crate::engine::options::{OptionsContainer, OptionsError};
use crate::engine::runner::RunnerCommon;
use crate::engine::settings::AnalysisSettings;
use tracing::{info, instrument};

/// Input sources for an analysis run.
///
/// Both sources are optional: without a trajectory the run operates in
/// topology-only mode, and without a topology provider the analysis must not
/// require one. The optional index group is the output of an external
/// selection system.
#[derive(Default)]
pub struct AnalysisInputs {
    pub trajectory: Option<Box<dyn TrajectorySource>>,
    pub topology: Option<Box<dyn TopologyProvider>>,
    pub index_group: Option<Vec<usize>>,
}

/// Executes a complete acquisition run.
///
/// Drives the full protocol in order: option registration, the caller's
/// override hook (standing in for external command-line parsing), option
/// finalization, topology load, first-frame load, index-group setup, and the
/// frame loop. Each frame is post-processed by the runner before `analyze`
/// sees it. Returns the number of frames analyzed; a topology-only run
/// returns zero.
///
/// # Errors
///
/// Propagates resource failures from the collaborators and option errors
/// from the override hook; no retry is attempted.
#[instrument(skip_all, name = "analysis_run")]
pub fn run_analysis<F>(
    settings: AnalysisSettings,
    inputs: AnalysisInputs,
    overrides: impl FnOnce(&mut OptionsContainer) -> Result<(), OptionsError>,
    mut analyze: F,
) -> Result<usize, RunnerError>
where
    F: FnMut(&Frame),
{
    let mut options = OptionsContainer::new();
    let mut runner = RunnerCommon::new(settings);
    if let Some(trajectory) = inputs.trajectory {
        runner.set_trajectory(trajectory);
    }
    if let Some(topology) = inputs.topology {
        runner.set_topology_provider(topology);
    }

    runner.init_options(&mut options);
    overrides(&mut options)?;
    runner.options_finished(&options);
    info!(
        pbc = runner.settings().has_pbc(),
        rmpbc = runner.settings().has_rm_pbc(),
        time_unit = %runner.settings().time_unit(),
        "acquisition configured"
    );

    runner.init_topology()?;
    runner.init_first_frame()?;
    if let Some(group) = &inputs.index_group {
        runner.init_frame_index_group(group)?;
    }

    let mut analyzed = 0;
    if runner.has_trajectory() {
        loop {
            runner.init_frame();
            analyze(runner.frame());
            analyzed += 1;
            if !runner.read_next_frame()? {
                break;
            }
        }
    } else {
        info!("no trajectory attached, analyzing topology only");
    }

    info!(frames = analyzed, "analysis run finished");
    Ok(analyzed)
}

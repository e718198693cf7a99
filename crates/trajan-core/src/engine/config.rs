use crate::engine::settings::{AnalysisSettings, PlotFormat, TimeUnit};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

/// Optional run configuration read from a TOML file.
///
/// Every key is optional; only the keys that are present touch the settings.
/// The configuration provides module defaults and is applied before option
/// registration, so user-supplied option values still override it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Default for periodic-boundary handling.
    pub pbc: Option<bool>,
    /// Default for whole-molecule reconstruction.
    pub rmpbc: Option<bool>,
    /// Default time unit (fs, ps, ns, us, ms, s).
    pub time_unit: Option<TimeUnit>,
    /// Request the velocity buffer from the trajectory.
    pub read_velocities: Option<bool>,
    /// Request the force buffer from the trajectory.
    pub read_forces: Option<bool>,
    /// Plot output format (none, xvg, plain).
    pub plot_format: Option<PlotFormat>,
}

impl RunConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, RunConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, RunConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies the configured values onto `settings` as module defaults.
    pub fn apply_to(&self, settings: &mut AnalysisSettings) {
        if let Some(pbc) = self.pbc {
            settings.set_pbc(pbc);
        }
        if let Some(rmpbc) = self.rmpbc {
            settings.set_rm_pbc(rmpbc);
        }
        if let Some(unit) = self.time_unit {
            settings.set_time_unit(unit);
        }
        if self.read_velocities.is_some() || self.read_forces.is_some() {
            let mut content = settings.frame_content();
            content.velocities = self.read_velocities.unwrap_or(content.velocities);
            content.forces = self.read_forces.unwrap_or(content.forces);
            settings.set_frame_content(content);
        }
        if let Some(format) = self.plot_format {
            settings.set_plot_format(format);
        }
    }
}

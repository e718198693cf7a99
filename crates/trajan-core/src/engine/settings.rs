use crate::core::models::frame::FrameContent;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requirements an analysis module places on the input, declared before
/// option negotiation begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Forces loading of a topology even if the user did not supply one.
    RequireTopology,
    /// Retain the reference coordinates stored in the topology.
    UseTopologyPositions,
    /// Retain the reference velocities stored in the topology.
    UseTopologyVelocities,
    /// Suppresses the user-facing option that overrides PBC handling.
    NoUserPbcOverride,
    /// Suppresses the user-facing option that overrides whole-molecule
    /// reconstruction.
    NoUserRmPbcOverride,
}

/// The full set of requirement flags.
///
/// A closed set of named booleans; any combination is accepted, policy
/// decisions about sensible combinations are left to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequirementFlags {
    pub require_topology: bool,
    pub use_topology_positions: bool,
    pub use_topology_velocities: bool,
    pub no_user_pbc_override: bool,
    pub no_user_rm_pbc_override: bool,
}

impl RequirementFlags {
    /// No requirements set.
    pub const NONE: Self = Self {
        require_topology: false,
        use_topology_positions: false,
        use_topology_velocities: false,
        no_user_pbc_override: false,
        no_user_rm_pbc_override: false,
    };

    /// Tests whether a single flag is set.
    pub fn contains(&self, flag: Requirement) -> bool {
        match flag {
            Requirement::RequireTopology => self.require_topology,
            Requirement::UseTopologyPositions => self.use_topology_positions,
            Requirement::UseTopologyVelocities => self.use_topology_velocities,
            Requirement::NoUserPbcOverride => self.no_user_pbc_override,
            Requirement::NoUserRmPbcOverride => self.no_user_rm_pbc_override,
        }
    }

    /// Sets or clears a single flag.
    pub fn set(&mut self, flag: Requirement, value: bool) {
        match flag {
            Requirement::RequireTopology => self.require_topology = value,
            Requirement::UseTopologyPositions => self.use_topology_positions = value,
            Requirement::UseTopologyVelocities => self.use_topology_velocities = value,
            Requirement::NoUserPbcOverride => self.no_user_pbc_override = value,
            Requirement::NoUserRmPbcOverride => self.no_user_rm_pbc_override = value,
        }
    }

    /// Returns a copy with `flag` set, for concise construction.
    pub fn with(mut self, flag: Requirement) -> Self {
        self.set(flag, true);
        self
    }
}

/// The unit used for time values the analysis reports.
///
/// Trajectory-native times are picoseconds; conversion factors are expressed
/// relative to that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "fs")]
    Femtosecond,
    #[default]
    #[serde(rename = "ps")]
    Picosecond,
    #[serde(rename = "ns")]
    Nanosecond,
    #[serde(rename = "us")]
    Microsecond,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "s")]
    Second,
}

impl TimeUnit {
    /// Returns how many picoseconds one of this unit spans.
    pub fn in_ps(&self) -> f64 {
        match self {
            Self::Femtosecond => 1e-3,
            Self::Picosecond => 1.0,
            Self::Nanosecond => 1e3,
            Self::Microsecond => 1e6,
            Self::Millisecond => 1e9,
            Self::Second => 1e12,
        }
    }

    /// Converts a time in picoseconds into this unit.
    pub fn from_ps(&self, time_ps: f64) -> f64 {
        time_ps / self.in_ps()
    }
}

#[derive(Debug, Error)]
#[error("Invalid time unit string")]
pub struct ParseTimeUnitError;

impl FromStr for TimeUnit {
    type Err = ParseTimeUnitError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fs" => Ok(Self::Femtosecond),
            "ps" => Ok(Self::Picosecond),
            "ns" => Ok(Self::Nanosecond),
            "us" => Ok(Self::Microsecond),
            "ms" => Ok(Self::Millisecond),
            "s" => Ok(Self::Second),
            _ => Err(ParseTimeUnitError),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Femtosecond => "fs",
                Self::Picosecond => "ps",
                Self::Nanosecond => "ns",
                Self::Microsecond => "us",
                Self::Millisecond => "ms",
                Self::Second => "s",
            }
        )
    }
}

/// Output format for plot files produced by analyses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotFormat {
    /// No plot output.
    None,
    /// Grace (.xvg) output with axis labels and legends.
    #[default]
    Xvg,
    /// Plain columns without any markup.
    Plain,
}

/// Common settings for plot output produced by the analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlotSettings {
    pub format: PlotFormat,
    /// Unit used for time axes; kept in sync with the resolved time unit.
    pub time_unit: TimeUnit,
}

/// Configuration record negotiated between an analysis module, the user, and
/// the runner.
///
/// The module declares its requirements and defaults before option parsing;
/// the runner resolves user overrides into it at the options-finished
/// transition; afterwards the module reads the effective values back. The PBC
/// setters stay callable after finalization as a documented escape hatch for
/// modules that discover mid-run that boundary handling must change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSettings {
    flags: RequirementFlags,
    pbc: PolicyValue,
    rm_pbc: PolicyValue,
    frame_content: FrameContent,
    time_unit: TimeUnit,
    plot: PlotSettings,
}

/// One PBC policy value: the fail-safe default is true when never set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PolicyValue(bool);

impl Default for PolicyValue {
    fn default() -> Self {
        Self(true)
    }
}

impl AnalysisSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently set requirement flags.
    pub fn flags(&self) -> RequirementFlags {
        self.flags
    }

    /// Tests whether a requirement flag is set.
    pub fn has_flag(&self, flag: Requirement) -> bool {
        self.flags.contains(flag)
    }

    /// Replaces all requirement flags. By default no flags are set.
    pub fn set_flags(&mut self, flags: RequirementFlags) {
        self.flags = flags;
    }

    /// Sets or clears an individual requirement flag.
    pub fn set_flag(&mut self, flag: Requirement, value: bool) {
        self.flags.set(flag, value);
    }

    /// Returns whether periodic boundary conditions are used.
    ///
    /// This is the effective value: the module default, possibly overridden
    /// by the user at the options-finished transition or by a later
    /// [`set_pbc`](Self::set_pbc) call.
    pub fn has_pbc(&self) -> bool {
        self.pbc.0
    }

    /// Returns whether molecules are made whole before analysis.
    ///
    /// See [`has_pbc`](Self::has_pbc) for how the effective value is formed.
    pub fn has_rm_pbc(&self) -> bool {
        self.rm_pbc.0
    }

    /// Sets whether periodic boundary conditions are used.
    ///
    /// Called before option registration this sets the module default, which
    /// the user may override through the `pbc` option unless
    /// [`Requirement::NoUserPbcOverride`] is set. Called after the options
    /// have been finished it overrides whatever was resolved.
    pub fn set_pbc(&mut self, pbc: bool) {
        self.pbc = PolicyValue(pbc);
    }

    /// Sets whether molecules are made whole.
    ///
    /// Same default/override timing as [`set_pbc`](Self::set_pbc). Analyses
    /// that do not need whole molecules should set this to false, and
    /// usually also [`Requirement::NoUserRmPbcOverride`], to skip the
    /// reconstruction work per frame.
    pub fn set_rm_pbc(&mut self, rm_pbc: bool) {
        self.rm_pbc = PolicyValue(rm_pbc);
    }

    /// Returns the requested per-frame content mask.
    pub fn frame_content(&self) -> FrameContent {
        self.frame_content
    }

    /// Replaces the per-frame content mask; the last write wins.
    ///
    /// Defaults to positions only.
    pub fn set_frame_content(&mut self, content: FrameContent) {
        self.frame_content = content;
    }

    /// Returns the time unit the user has requested.
    ///
    /// Holds the picosecond default until option parsing has completed.
    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// Sets the time unit; normally driven by the `tu` option at the
    /// options-finished transition.
    pub fn set_time_unit(&mut self, unit: TimeUnit) {
        self.time_unit = unit;
        self.plot.time_unit = unit;
    }

    /// Returns common settings for plot output.
    pub fn plot_settings(&self) -> &PlotSettings {
        &self.plot
    }

    /// Selects the plot output format.
    pub fn set_plot_format(&mut self, format: PlotFormat) {
        self.plot.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbc_policies_default_to_true() {
        let settings = AnalysisSettings::new();
        assert!(settings.has_pbc());
        assert!(settings.has_rm_pbc());
    }

    #[test]
    fn pbc_policies_default_to_true_for_any_flag_combination() {
        let all = RequirementFlags {
            require_topology: true,
            use_topology_positions: true,
            use_topology_velocities: true,
            no_user_pbc_override: true,
            no_user_rm_pbc_override: true,
        };
        for flags in [RequirementFlags::NONE, all] {
            let mut settings = AnalysisSettings::new();
            settings.set_flags(flags);
            assert!(settings.has_pbc());
            assert!(settings.has_rm_pbc());
        }
    }

    #[test]
    fn set_flags_replaces_earlier_flags() {
        let mut settings = AnalysisSettings::new();
        settings.set_flag(Requirement::RequireTopology, true);
        settings.set_flags(RequirementFlags::NONE.with(Requirement::NoUserPbcOverride));
        assert!(!settings.has_flag(Requirement::RequireTopology));
        assert!(settings.has_flag(Requirement::NoUserPbcOverride));
    }

    #[test]
    fn set_flag_toggles_individual_bits() {
        let mut settings = AnalysisSettings::new();
        settings.set_flag(Requirement::UseTopologyVelocities, true);
        assert!(settings.has_flag(Requirement::UseTopologyVelocities));
        settings.set_flag(Requirement::UseTopologyVelocities, false);
        assert!(!settings.has_flag(Requirement::UseTopologyVelocities));
    }

    #[test]
    fn frame_content_last_write_wins() {
        let mut settings = AnalysisSettings::new();
        settings.set_frame_content(FrameContent {
            velocities: true,
            forces: true,
        });
        settings.set_frame_content(FrameContent {
            velocities: true,
            forces: false,
        });
        assert!(settings.frame_content().velocities);
        assert!(!settings.frame_content().forces);
    }

    #[test]
    fn set_pbc_overrides_earlier_value() {
        let mut settings = AnalysisSettings::new();
        settings.set_pbc(false);
        assert!(!settings.has_pbc());
        settings.set_pbc(true);
        assert!(settings.has_pbc());
    }

    #[test]
    fn time_unit_updates_plot_settings() {
        let mut settings = AnalysisSettings::new();
        settings.set_time_unit(TimeUnit::Nanosecond);
        assert_eq!(settings.time_unit(), TimeUnit::Nanosecond);
        assert_eq!(settings.plot_settings().time_unit, TimeUnit::Nanosecond);
    }

    #[test]
    fn time_unit_conversion_factors_are_ps_relative() {
        assert_eq!(TimeUnit::Picosecond.in_ps(), 1.0);
        assert_eq!(TimeUnit::Nanosecond.from_ps(1500.0), 1.5);
        assert_eq!(TimeUnit::Femtosecond.from_ps(1.0), 1000.0);
    }

    #[test]
    fn time_unit_parses_its_short_names() {
        for (text, unit) in [
            ("fs", TimeUnit::Femtosecond),
            ("ps", TimeUnit::Picosecond),
            ("ns", TimeUnit::Nanosecond),
            ("us", TimeUnit::Microsecond),
            ("ms", TimeUnit::Millisecond),
            ("s", TimeUnit::Second),
        ] {
            assert_eq!(text.parse::<TimeUnit>().unwrap(), unit);
            assert_eq!(unit.to_string(), text);
        }
        assert!("minutes".parse::<TimeUnit>().is_err());
    }
}

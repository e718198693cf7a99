use crate::engine::settings::TimeUnit;
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the PBC-override option the runner registers.
pub const OPT_PBC: &str = "pbc";
/// Name of the whole-molecule-override option the runner registers.
pub const OPT_RM_PBC: &str = "rmpbc";
/// Name of the time-unit option the runner registers.
pub const OPT_TIME_UNIT: &str = "tu";

/// A typed option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    TimeUnit(TimeUnit),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::TimeUnit(_) => "time unit",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Option '{name}' expects a {expected} value, got a {got} value")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

#[derive(Debug, Clone)]
struct OptionEntry {
    default: OptionValue,
    user: Option<OptionValue>,
    description: &'static str,
}

/// An externally-owned container of named options.
///
/// The runner declares its override options into a container it does not own;
/// an external parsing layer records the user-supplied values; after parsing
/// completes the runner reads the resolved values back. The container must
/// outlive the registration-to-finalization window, which the borrow checker
/// enforces here. Only values the user actually supplied are reported as
/// overrides; untouched options fall back to their declared default.
#[derive(Debug, Clone, Default)]
pub struct OptionsContainer {
    entries: BTreeMap<String, OptionEntry>,
}

impl OptionsContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an option with its default value and help text.
    ///
    /// # Panics
    ///
    /// Panics if an option of the same name was already declared; two modules
    /// competing for one name is a programming error.
    pub fn declare(&mut self, name: &str, default: OptionValue, description: &'static str) {
        let previous = self.entries.insert(
            name.to_string(),
            OptionEntry {
                default,
                user: None,
                description,
            },
        );
        if previous.is_some() {
            panic!("option '{name}' declared twice");
        }
    }

    /// Returns true if an option of this name has been declared.
    pub fn is_declared(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the help text of a declared option.
    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|entry| entry.description)
    }

    /// Records a user-supplied value for a declared option.
    ///
    /// # Errors
    ///
    /// Returns an error if the option was never declared or the value type
    /// does not match the declared default.
    pub fn set_value(&mut self, name: &str, value: OptionValue) -> Result<(), OptionsError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| OptionsError::UnknownOption(name.to_string()))?;
        if std::mem::discriminant(&entry.default) != std::mem::discriminant(&value) {
            return Err(OptionsError::TypeMismatch {
                name: name.to_string(),
                expected: entry.default.kind(),
                got: value.kind(),
            });
        }
        entry.user = Some(value);
        Ok(())
    }

    /// Returns the user-supplied value of an option, if one was recorded.
    pub fn user_value(&self, name: &str) -> Option<OptionValue> {
        self.entries.get(name).and_then(|entry| entry.user)
    }

    /// Returns the user-supplied value or the declared default.
    pub fn effective_value(&self, name: &str) -> Option<OptionValue> {
        self.entries
            .get(name)
            .map(|entry| entry.user.unwrap_or(entry.default))
    }

    /// Typed accessor for a user-supplied boolean option.
    pub fn user_bool(&self, name: &str) -> Option<bool> {
        match self.user_value(name) {
            Some(OptionValue::Bool(value)) => Some(value),
            _ => None,
        }
    }

    /// Typed accessor for a user-supplied time-unit option.
    pub fn user_time_unit(&self, name: &str) -> Option<TimeUnit> {
        match self.user_value(name) {
            Some(OptionValue::TimeUnit(unit)) => Some(unit),
            _ => None,
        }
    }
}

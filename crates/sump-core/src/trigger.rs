//! Trigger stages and the three trigger modes.
//!
//! A `TriggerSet` always holds exactly `n_stages` stages. The constructors
//! fill the stages the caller does not supply; changing the stage count
//! builds a new set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::ConfigError;

/// Number of stages implemented by the reference hardware.
pub const MAX_TRIGGER_STAGES: usize = 4;
/// Highest serial-trigger channel index.
pub const MAX_TRIGGER_CHANNEL: u8 = 31;
/// Highest arming level.
pub const MAX_TRIGGER_LEVEL: u8 = 3;

/// Raised when a trigger mode name is not one of the three modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trigger mode '{value}' (expected none, simple or complex)")]
pub struct TriggerModeError {
    pub value: String,
}

/// How the trigger stages are sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerMode {
    /// Every stage fires immediately.
    Disabled,
    /// Stage 0 only.
    Simple,
    /// All stages, chained by level.
    Complex,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Disabled => "none",
            TriggerMode::Simple => "simple",
            TriggerMode::Complex => "complex",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = TriggerModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "disabled" => Ok(TriggerMode::Disabled),
            "simple" => Ok(TriggerMode::Simple),
            "complex" => Ok(TriggerMode::Complex),
            _ => Err(TriggerModeError {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TriggerMode {
    type Error = TriggerModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TriggerMode> for String {
    fn from(mode: TriggerMode) -> Self {
        mode.as_str().to_string()
    }
}

/// One comparator stage of the trigger pipeline.
///
/// # Examples
/// ```
/// use sump_core::TriggerStage;
///
/// let stage = TriggerStage {
///     mask: 0x01,
///     value: 0x01,
///     ..TriggerStage::default()
/// };
/// assert!(!stage.start);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerStage {
    pub mask: u32,
    pub value: u32,
    /// Samples to wait once the stage matches.
    pub delay: u16,
    /// Input channel for serial matching.
    pub channel: u8,
    /// Arming level of the stage.
    pub level: u8,
    pub serial: bool,
    /// Start the capture when this stage matches.
    pub start: bool,
}

impl TriggerStage {
    /// The "always fire" stage: zero mask and value.
    pub fn disabled(level: u8, start: bool) -> Self {
        Self {
            level,
            start,
            ..Self::default()
        }
    }

    fn validate(&self, stage: usize) -> Result<(), ConfigError> {
        if self.channel > MAX_TRIGGER_CHANNEL {
            return Err(ConfigError::StageChannel {
                stage,
                channel: self.channel,
            });
        }
        if self.level > MAX_TRIGGER_LEVEL {
            return Err(ConfigError::StageLevel {
                stage,
                level: self.level,
            });
        }
        Ok(())
    }
}

/// Ordered trigger stages tagged with their mode.
///
/// # Examples
/// ```
/// use sump_core::{TriggerMode, TriggerSet, TriggerStage};
///
/// let first = TriggerStage { mask: 0xFF, value: 0x42, ..TriggerStage::default() };
/// let triggers = TriggerSet::complex(vec![first], 4).unwrap();
/// assert_eq!(triggers.mode(), TriggerMode::Complex);
/// assert_eq!(triggers.stages().len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TriggerSetRepr", into = "TriggerSetRepr")]
pub struct TriggerSet {
    mode: TriggerMode,
    stages: Vec<TriggerStage>,
}

impl TriggerSet {
    /// All stages fire immediately; only stage 0 starts the capture.
    pub fn disabled(n_stages: usize) -> Result<Self, ConfigError> {
        check_stage_count(n_stages)?;
        let stages = (0..n_stages)
            .map(|index| TriggerStage::disabled(0, index == 0))
            .collect();
        Ok(Self {
            mode: TriggerMode::Disabled,
            stages,
        })
    }

    /// Stage 0 from the caller; the remaining stages are parked at
    /// ascending levels.
    pub fn simple(stage: TriggerStage, n_stages: usize) -> Result<Self, ConfigError> {
        check_stage_count(n_stages)?;
        let mut stages = Vec::with_capacity(n_stages);
        stages.push(TriggerStage {
            level: 0,
            start: true,
            ..stage
        });
        stages.extend((1..n_stages).map(|index| TriggerStage::disabled(index as u8, false)));
        let set = Self {
            mode: TriggerMode::Simple,
            stages,
        };
        set.validate()?;
        Ok(set)
    }

    /// Caller stages in order; missing trailing stages are parked at their
    /// own level and never start the capture.
    pub fn complex(stages: Vec<TriggerStage>, n_stages: usize) -> Result<Self, ConfigError> {
        check_stage_count(n_stages)?;
        if stages.len() > n_stages {
            return Err(ConfigError::TooManyStages {
                given: stages.len(),
                n_stages,
            });
        }
        let mut stages = stages;
        let given = stages.len();
        stages.extend((given..n_stages).map(|index| TriggerStage::disabled(index as u8, false)));
        let set = Self {
            mode: TriggerMode::Complex,
            stages,
        };
        set.validate()?;
        Ok(set)
    }

    /// Build the same trigger for a different stage count.
    pub fn with_stage_count(&self, n_stages: usize) -> Result<Self, ConfigError> {
        match self.mode {
            TriggerMode::Disabled => Self::disabled(n_stages),
            TriggerMode::Simple => Self::simple(self.stages[0], n_stages),
            TriggerMode::Complex => {
                let kept = self.stages.iter().copied().take(n_stages).collect();
                Self::complex(kept, n_stages)
            }
        }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn stages(&self) -> &[TriggerStage] {
        &self.stages
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    /// Re-check the stage count and every stage field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_stage_count(self.stages.len())?;
        for (index, stage) in self.stages.iter().enumerate() {
            stage.validate(index)?;
        }
        Ok(())
    }
}

impl Default for TriggerSet {
    fn default() -> Self {
        Self {
            mode: TriggerMode::Disabled,
            stages: (0..MAX_TRIGGER_STAGES)
                .map(|index| TriggerStage::disabled(0, index == 0))
                .collect(),
        }
    }
}

fn check_stage_count(n_stages: usize) -> Result<(), ConfigError> {
    if n_stages == 0 || n_stages > MAX_TRIGGER_STAGES {
        return Err(ConfigError::StageCount { count: n_stages });
    }
    Ok(())
}

/// Serialized form of a `TriggerSet`; rebuilt through the constructors on
/// load so a file can never describe an inconsistent set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TriggerSetRepr {
    mode: TriggerMode,
    #[serde(default = "default_stage_count")]
    n_stages: usize,
    #[serde(default)]
    stages: Vec<TriggerStage>,
}

fn default_stage_count() -> usize {
    MAX_TRIGGER_STAGES
}

impl TryFrom<TriggerSetRepr> for TriggerSet {
    type Error = ConfigError;

    fn try_from(spec: TriggerSetRepr) -> Result<Self, Self::Error> {
        match spec.mode {
            TriggerMode::Disabled => TriggerSet::disabled(spec.n_stages),
            TriggerMode::Simple => {
                let stage = spec.stages.first().copied().unwrap_or_default();
                TriggerSet::simple(stage, spec.n_stages)
            }
            TriggerMode::Complex => TriggerSet::complex(spec.stages, spec.n_stages),
        }
    }
}

impl From<TriggerSet> for TriggerSetRepr {
    fn from(set: TriggerSet) -> Self {
        Self {
            mode: set.mode,
            n_stages: set.stages.len(),
            stages: set.stages,
        }
    }
}

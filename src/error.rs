// src/error.rs

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid parameter combinations, reported before any analysis runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max distance factor must be finite and > 1.0, got {0}")]
    MaxDistanceFactor(f64),
    #[error("min angle factor must be in [0, 1), got {0}")]
    MinAngleFactor(f64),
    #[error("distance cutoff must be finite and >= 1.0, got {0}")]
    DistanceCutoff(f64),
    #[error("angle cutoff must be in [0, 1], got {0}")]
    AngleCutoff(f64),
    #[error("unknown multi-weight preset '{0}' (expected one of: {1})")]
    UnknownPreset(String, String),
    #[error("invalid weight '{name}': lower bound {lower} must be below upper bound {upper}")]
    WeightBounds { name: &'static str, lower: f64, upper: f64 },
    #[error("invalid strategy '{0}' (expected simple:<d>,<a> or multiweighted:<preset>)")]
    StrategySyntax(String),
    #[error("unknown centering policy '{0}'")]
    CenteringPolicy(String),
    #[error("empty species symbol in exclusion list")]
    EmptySpecies,
    #[error("empty connectivity filter tag")]
    EmptyFilterTag,
    #[error("config file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read structure file {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("internal analysis failure: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Input { .. } | PipelineError::Config(_) => 1,
            PipelineError::Internal(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Geometry,
    Strategy,
    Connectivity,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Geometry => write!(f, "geometry"),
            Stage::Strategy => write!(f, "strategy"),
            Stage::Connectivity => write!(f, "connectivity"),
        }
    }
}

/// A non-fatal problem inside an analysis stage. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisWarning {
    pub stage: Stage,
    pub site_index: Option<usize>,
    pub message: String,
}

impl AnalysisWarning {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            site_index: None,
            message: message.into(),
        }
    }

    pub fn for_site(stage: Stage, site_index: usize, message: impl Into<String>) -> Self {
        Self {
            stage,
            site_index: Some(site_index),
            message: message.into(),
        }
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.site_index {
            Some(i) => write!(f, "[{}] site {}: {}", self.stage, i, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let input = PipelineError::Input {
            path: PathBuf::from("missing"),
            reason: "not found".into(),
        };
        assert_eq!(input.exit_code(), 1);
        assert_eq!(PipelineError::from(ConfigError::EmptySpecies).exit_code(), 1);
        assert_eq!(PipelineError::Internal("boom".into()).exit_code(), 2);
    }

    #[test]
    fn test_input_error_names_path() {
        let err = PipelineError::Input {
            path: PathBuf::from("/tmp/CONTCAR_000"),
            reason: "No such file".into(),
        };
        assert!(err.to_string().contains("/tmp/CONTCAR_000"));
    }

    #[test]
    fn test_warning_display() {
        let w = AnalysisWarning::for_site(Stage::Geometry, 3, "no neighbours");
        assert_eq!(w.to_string(), "[geometry] site 3: no neighbours");
    }
}

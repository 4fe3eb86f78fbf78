// src/config.rs

use crate::chemenv::{CenteringPolicy, StrategySpec, VoronoiParams};
use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "coordenv.log";

// --- Main Config Struct ---

/// Analysis settings. Read from JSON; command-line flags override each field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
  pub centering: CenteringPolicy,
  pub voronoi: VoronoiParams,
  pub strategy: StrategySpec,
  /// Environment tags for the connectivity stage; empty disables it
  pub connectivity_filter: Vec<String>,
  pub log_file: PathBuf,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      centering: CenteringPolicy::default(),
      voronoi: VoronoiParams::default(),
      strategy: StrategySpec::default(),
      connectivity_filter: Vec::new(),
      log_file: PathBuf::from(DEFAULT_LOG_FILE),
    }
  }
}

impl AnalysisConfig {
  /// Loads config from an explicit JSON file
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let file_err = |reason: String| ConfigError::File {
      path: path.to_path_buf(),
      reason,
    };
    let file = File::open(path).map_err(|e| file_err(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| file_err(e.to_string()))
  }

  /// Loads config from the standard OS location (e.g. ~/.config/coordenv/settings.json).
  /// A missing file is not an error; defaults are used.
  pub fn load_default() -> Result<(Self, String), ConfigError> {
    match Self::default_path() {
      Some(path) if path.exists() => {
        let cfg = Self::load_from(&path)?;
        Ok((cfg, format!("config loaded from {:?}", path)))
      }
      _ => Ok((Self::default(), "no config found, using defaults".to_string())),
    }
  }

  pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "coordenv", "coordenv").map(|proj| proj.config_dir().join("settings.json"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chemenv::WeightSource;
  use std::io::Write;

  #[test]
  fn test_partial_json_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"{{
        "centering": "central-site",
        "voronoi": {{ "max_distance_factor": 1.5, "excluded_species": ["O", "K"] }},
        "strategy": {{ "kind": "multi-weighted", "weights": {{ "preset": "stats_article" }} }}
      }}"#
    )
    .unwrap();

    let cfg = AnalysisConfig::load_from(file.path()).unwrap();
    assert_eq!(cfg.centering, CenteringPolicy::CentralSite);
    assert_eq!(cfg.voronoi.max_distance_factor, 1.5);
    assert_eq!(cfg.voronoi.min_angle_factor, VoronoiParams::default().min_angle_factor);
    assert!(cfg.voronoi.is_excluded("K"));
    assert_eq!(
      cfg.strategy,
      StrategySpec::MultiWeighted {
        weights: WeightSource::Preset("stats_article".into())
      }
    );
    assert_eq!(cfg.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    assert!(cfg.voronoi.validate().is_ok());
    assert!(cfg.strategy.validate().is_ok());
  }

  #[test]
  fn test_bad_json_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    let err = AnalysisConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::File { .. }));
  }
}

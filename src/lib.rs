//! Coordination environment analysis of crystal structures.
//!
//! One structure file goes through a fixed pipeline: it is loaded, every
//! site's neighbours are found, a strategy decides each site's coordination
//! environment, and optionally the coordination polyhedra are joined into a
//! connectivity graph. See [`pipeline::run_pipeline`].

pub mod chemenv;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod utils;

pub use error::{AnalysisWarning, ConfigError, PipelineError};
pub use pipeline::{run_pipeline, PipelineRequest, PipelineResult, SiteLabel};

// src/pipeline.rs
//
// Load -> geometry finder -> strategy -> optional connectivity.

use crate::chemenv::{
    CenteringPolicy, ConnectivityFinder, FinderError, LightStructureEnvironments, LocalGeometryFinder,
    StrategySpec, StructureConnectivity, VoronoiParams,
};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisWarning, ConfigError, PipelineError, Stage};
use crate::io::load_structure;
use crate::utils::logger::EventLog;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const COMPONENT: &str = "pipeline";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub structure_path: PathBuf,
    pub centering: CenteringPolicy,
    pub voronoi: VoronoiParams,
    pub strategy: StrategySpec,
    /// None or empty: connectivity stage is skipped
    pub connectivity_filter: Option<Vec<String>>,
}

impl PipelineRequest {
    pub fn new(structure_path: impl Into<PathBuf>) -> Self {
        Self::from_config(structure_path, &AnalysisConfig::default())
    }

    pub fn from_config(structure_path: impl Into<PathBuf>, cfg: &AnalysisConfig) -> Self {
        Self {
            structure_path: structure_path.into(),
            centering: cfg.centering,
            voronoi: cfg.voronoi.clone(),
            strategy: cfg.strategy.clone(),
            connectivity_filter: if cfg.connectivity_filter.is_empty() {
                None
            } else {
                Some(cfg.connectivity_filter.clone())
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.voronoi.validate()?;
        self.strategy.validate()?;
        if let Some(tags) = &self.connectivity_filter {
            if tags.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::EmptyFilterTag);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteLabel {
    pub site_index: usize,
    pub species: String,
    pub label: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub structure_title: String,
    pub formula: String,
    pub site_count: usize,
    pub excluded_site_count: usize,
    pub strategy: String,
    /// One entry per non-excluded site, by site index
    pub per_site_environment_labels: Vec<SiteLabel>,
    pub connectivity_graph: Option<StructureConnectivity>,
    pub warnings: Vec<AnalysisWarning>,
}

fn input_error(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::Input {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Runs the whole analysis for one structure file.
///
/// Configuration problems are reported before the file is touched. A fatal
/// error is returned, not logged; the caller reports it once. Problems
/// inside the analysis stages that leave the run usable (a site without
/// neighbours, a failed connectivity graph) come back as warnings in the
/// result, not as errors.
pub fn run_pipeline(request: &PipelineRequest, log: &mut EventLog) -> Result<PipelineResult, PipelineError> {
    let path = request.structure_path.as_path();
    log.info(COMPONENT, "run_pipeline", format!("start {}", path.display()));

    request.validate()?;
    let strategy = request.strategy.build()?;
    log.debug(
        COMPONENT,
        "run_pipeline",
        format!(
            "centering={} max_distance_factor={} min_angle_factor={} excluded={:?} strategy={}",
            request.centering,
            request.voronoi.max_distance_factor,
            request.voronoi.min_angle_factor,
            request.voronoi.excluded_species,
            request.strategy
        ),
    );

    // 1. Structure
    let structure = match load_structure(path) {
        Ok(s) if s.site_count() == 0 => return Err(input_error(path, "structure contains no sites")),
        Ok(s) => s,
        Err(e) => return Err(input_error(path, e)),
    };
    log.info(
        "io",
        "load_structure",
        format!("{} sites, formula {}", structure.site_count(), structure.formula()),
    );

    // 2. Local geometry
    let finder = LocalGeometryFinder::new(request.centering);
    let se = finder
        .compute_structure_environments(&structure, &request.voronoi)
        .map_err(|e| match e {
            FinderError::NonFinite(_) => PipelineError::Internal(e.to_string()),
            _ => input_error(path, e),
        })?;
    log.info(
        "finder",
        "compute_structure_environments",
        format!(
            "{} sites analysed, {} excluded",
            se.analysed_sites().count(),
            se.excluded_site_count()
        ),
    );

    let mut warnings = Vec::new();
    for site in se.analysed_sites().filter(|s| s.candidates.is_empty()) {
        warnings.push(AnalysisWarning::for_site(
            Stage::Geometry,
            site.site_index,
            "no neighbours within the distance and angle factors",
        ));
    }

    // 3. Strategy
    let lse = LightStructureEnvironments::from_structure_environments(strategy.as_ref(), &se);
    warnings.extend(lse.warnings());

    let labels: Vec<SiteLabel> = lse
        .assignments()
        .map(|a| SiteLabel {
            site_index: a.site_index,
            species: a.species.clone(),
            label: a.label().to_string(),
            confidence: a.confidence(),
        })
        .collect();
    for l in &labels {
        log.debug("strategy", "assign", format!("site {} {} -> {}", l.site_index, l.species, l.label));
    }
    log.info(
        "strategy",
        "from_structure_environments",
        format!("{} labels with {}", labels.len(), lse.strategy),
    );

    // 4. Connectivity (best effort)
    let connectivity_graph = match request.connectivity_filter.as_deref() {
        None | Some([]) => None,
        Some(tags) => build_connectivity(&lse, tags, &mut warnings, log),
    };

    for w in &warnings {
        log.warn(COMPONENT, "run_pipeline", w);
    }
    log.info(
        COMPONENT,
        "run_pipeline",
        format!("done, {} warnings", warnings.len()),
    );

    Ok(PipelineResult {
        structure_title: structure.title.clone(),
        formula: structure.formula(),
        site_count: structure.site_count(),
        excluded_site_count: se.excluded_site_count(),
        strategy: lse.strategy.clone(),
        per_site_environment_labels: labels,
        connectivity_graph,
        warnings,
    })
}

fn build_connectivity(
    lse: &LightStructureEnvironments,
    tags: &[String],
    warnings: &mut Vec<AnalysisWarning>,
    log: &mut EventLog,
) -> Option<StructureConnectivity> {
    // Repeated tags carry no meaning here; flag them instead of guessing
    let mut seen = BTreeSet::new();
    let repeated: BTreeSet<&str> = tags
        .iter()
        .filter(|t| !seen.insert(t.as_str()))
        .map(String::as_str)
        .collect();
    if !repeated.is_empty() {
        warnings.push(AnalysisWarning::new(
            Stage::Connectivity,
            format!(
                "connectivity filter repeats {:?}; repetitions are ignored",
                repeated
            ),
        ));
    }

    match ConnectivityFinder::get_structure_connectivity(lse, tags) {
        Ok(sc) => {
            log.info(
                "connectivity",
                "get_structure_connectivity",
                format!(
                    "{} nodes, {} links, {} components",
                    sc.node_count(),
                    sc.graph.edge_count(),
                    sc.components.len()
                ),
            );
            Some(sc)
        }
        Err(e) => {
            warnings.push(AnalysisWarning::new(
                Stage::Connectivity,
                format!("connectivity graph unavailable: {}", e),
            ));
            None
        }
    }
}

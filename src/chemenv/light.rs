// src/chemenv/light.rs

use super::finder::StructureEnvironments;
use super::geometries::UNKNOWN_SYMBOL;
use super::strategies::{ChemenvStrategy, EnvironmentGuess};
use crate::error::{AnalysisWarning, Stage};
use serde::Serialize;

/// A ligand of a coordination polyhedron: site plus lattice image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LigandRef {
    pub site_index: usize,
    pub image: [i32; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteAssignment {
    pub site_index: usize,
    pub species: String,
    /// Ranked environments, dominant first
    pub environments: Vec<EnvironmentGuess>,
    /// Neighbours of the chosen set, in distance order
    pub ligands: Vec<LigandRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SiteAssignment {
    pub fn dominant(&self) -> Option<&EnvironmentGuess> {
        self.environments.first()
    }

    pub fn label(&self) -> &str {
        self.dominant().map_or(UNKNOWN_SYMBOL, |g| g.symbol.as_str())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.dominant().and_then(|g| g.fraction)
    }
}

/// Strategy-filtered view of a StructureEnvironments: one decided
/// environment per analysed site.
#[derive(Debug, Clone, Serialize)]
pub struct LightStructureEnvironments {
    pub strategy: String,
    /// Indexed by site; None for excluded species
    pub sites: Vec<Option<SiteAssignment>>,
}

impl LightStructureEnvironments {
    pub fn from_structure_environments(
        strategy: &dyn ChemenvStrategy,
        se: &StructureEnvironments,
    ) -> Self {
        let sites = se
            .sites
            .iter()
            .map(|slot| {
                slot.as_ref().map(|site| {
                    let outcome = strategy.site_outcome(se, site);
                    let ligands = outcome
                        .members
                        .iter()
                        .map(|&m| {
                            let n = &site.candidates[m];
                            LigandRef {
                                site_index: n.site_index,
                                image: n.image,
                            }
                        })
                        .collect();
                    SiteAssignment {
                        site_index: site.site_index,
                        species: site.species.clone(),
                        environments: outcome.environments,
                        ligands,
                        note: outcome.note,
                    }
                })
            })
            .collect();

        Self {
            strategy: strategy.name(),
            sites,
        }
    }

    pub fn assignments(&self) -> impl Iterator<Item = &SiteAssignment> {
        self.sites.iter().flatten()
    }

    /// Per-site ranked environments, None for excluded sites
    pub fn coordination_environments(&self) -> Vec<Option<&[EnvironmentGuess]>> {
        self.sites
            .iter()
            .map(|s| s.as_ref().map(|a| a.environments.as_slice()))
            .collect()
    }

    /// Per-site problems the strategy ran into
    pub fn warnings(&self) -> Vec<AnalysisWarning> {
        self.assignments()
            .filter_map(|a| {
                a.note
                    .as_ref()
                    .map(|n| AnalysisWarning::for_site(Stage::Strategy, a.site_index, n.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemenv::finder::{CenteringPolicy, LocalGeometryFinder, VoronoiParams};
    use crate::chemenv::fixtures::rock_salt;
    use crate::chemenv::strategies::StrategySpec;

    #[test]
    fn test_light_environments_rock_salt() {
        let params = VoronoiParams {
            excluded_species: ["Cl".to_string()].into_iter().collect(),
            ..VoronoiParams::default()
        };
        let se = LocalGeometryFinder::new(CenteringPolicy::CentralSite)
            .compute_structure_environments(&rock_salt(), &params)
            .unwrap();
        let strategy = StrategySpec::default().build().unwrap();
        let lse = LightStructureEnvironments::from_structure_environments(strategy.as_ref(), &se);

        assert_eq!(lse.assignments().count(), 4);
        let envs = lse.coordination_environments();
        assert!(envs[4].is_none());
        for a in lse.assignments() {
            assert_eq!(a.label(), "C:12");
            assert_eq!(a.ligands.len(), 12);
            assert!(a.ligands.iter().all(|l| l.site_index < 4));
        }
        assert!(lse.warnings().is_empty());
    }
}

// src/chemenv/mod.rs
//
// Coordination environment analysis:
// finder -> StructureEnvironments -> strategy -> LightStructureEnvironments
// -> (optional) StructureConnectivity

pub mod connectivity;
pub mod finder;
pub mod geometries;
pub mod light;
pub mod strategies;

pub use connectivity::{ConnectivityError, ConnectivityFinder, LinkKind, StructureConnectivity};
pub use finder::{
    CenteringPolicy, FinderError, LocalGeometryFinder, StructureEnvironments, VoronoiParams,
};
pub use light::{LightStructureEnvironments, SiteAssignment};
pub use strategies::{ChemenvStrategy, MultiWeightParams, StrategySpec, WeightSource};

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Site, Structure};

    /// Conventional rock-salt cell, a = 5.64 A: Na on 0..4, Cl on 4..8
    pub(crate) fn rock_salt() -> Structure {
        let a = 5.64;
        let mut sites = Vec::new();
        for f in [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]] {
            sites.push(Site { species: "Na".into(), frac: f });
        }
        for f in [[0.5, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.5], [0.5, 0.5, 0.5]] {
            sites.push(Site { species: "Cl".into(), frac: f });
        }
        Structure::new("NaCl", [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]], sites)
    }
}

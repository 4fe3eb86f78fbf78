// src/chemenv/finder.rs
//
// Local geometry finder: periodic neighbour search plus a ray-cast estimate
// of each neighbour's Voronoi solid angle. Produces StructureEnvironments,
// the raw per-site analysis consumed by the strategies.

use super::geometries::{measure_shapes, ShapeMeasure};
use crate::error::ConfigError;
use crate::model::Structure;
use crate::utils::geometry::{add, dot, fibonacci_sphere, len, scale, sub, Point3};
use crate::utils::linalg::{frac_to_cart, lattice_volume, plane_spacings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of rays used to estimate solid angles
pub const DEFAULT_RAY_COUNT: usize = 720;

/// Atoms closer than this are treated as a broken structure
pub const MIN_ATOM_SEPARATION: f64 = 0.1;

/// Two neighbours belong to the same distance shell when their normalized
/// distances differ by less than this
pub const SHELL_TOLERANCE: f64 = 0.05;

/// Largest ratio of the shortest lattice vector to a lattice plane spacing.
/// More sheared cells make the image search explode and must be reduced first.
pub const MAX_CELL_SKEW: f64 = 5.0;

/// Reference point used when the shape of a neighbour set is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CenteringPolicy {
    /// Centroid of the neighbours together with the central site
    #[default]
    CentroidIncludingCenter,
    /// Centroid of the neighbours only
    CentroidExcludingCenter,
    /// The central site itself
    CentralSite,
}

impl CenteringPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CenteringPolicy::CentroidIncludingCenter => "centroid-including-center",
            CenteringPolicy::CentroidExcludingCenter => "centroid-excluding-center",
            CenteringPolicy::CentralSite => "central-site",
        }
    }
}

impl fmt::Display for CenteringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CenteringPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "centroid-including-center" | "centroid" => Ok(CenteringPolicy::CentroidIncludingCenter),
            "centroid-excluding-center" => Ok(CenteringPolicy::CentroidExcludingCenter),
            "central-site" | "central" => Ok(CenteringPolicy::CentralSite),
            _ => Err(ConfigError::CenteringPolicy(s.to_string())),
        }
    }
}

/// Tolerances of the neighbour search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiParams {
    /// Neighbours farther than this multiple of the shortest distance are dropped
    pub max_distance_factor: f64,
    /// Neighbours whose solid angle is below this fraction of the largest are dropped
    pub min_angle_factor: f64,
    /// Species removed from the analysis entirely, as centres and as neighbours
    pub excluded_species: BTreeSet<String>,
}

impl Default for VoronoiParams {
    fn default() -> Self {
        Self {
            max_distance_factor: 1.41,
            min_angle_factor: 0.29,
            excluded_species: BTreeSet::new(),
        }
    }
}

impl VoronoiParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_distance_factor.is_finite() || self.max_distance_factor <= 1.0 {
            return Err(ConfigError::MaxDistanceFactor(self.max_distance_factor));
        }
        if !(0.0..1.0).contains(&self.min_angle_factor) {
            return Err(ConfigError::MinAngleFactor(self.min_angle_factor));
        }
        if self.excluded_species.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptySpecies);
        }
        Ok(())
    }

    pub fn is_excluded(&self, species: &str) -> bool {
        self.excluded_species.contains(species)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinderError {
    #[error("lattice is degenerate (cell volume {0:.3e})")]
    DegenerateLattice(f64),
    #[error("sites {a} and {b} overlap ({distance:.4} A apart)")]
    OverlappingAtoms { a: usize, b: usize, distance: f64 },
    #[error("non-finite geometry around site {0}")]
    NonFinite(usize),
    #[error("cell too skewed along axis {axis} (skew {skew:.1}, max {MAX_CELL_SKEW}); reduce the cell first")]
    SkewedCell { axis: usize, skew: f64 },
}

/// One periodic image of a neighbouring site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborCandidate {
    pub site_index: usize,
    /// Lattice translation of the neighbour relative to the home cell
    pub image: [i32; 3],
    pub cart: Point3,
    pub distance: f64,
    pub normalized_distance: f64,
    /// Solid angle fraction of the Voronoi face (0..1 of 4π)
    pub solid_angle: f64,
    pub normalized_angle: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteEnvironments {
    pub site_index: usize,
    pub species: String,
    pub center: Point3,
    /// Shortest neighbour distance (0 if the site has no neighbour)
    pub min_distance: f64,
    /// Accepted neighbours sorted by distance
    pub candidates: Vec<NeighborCandidate>,
}

impl SiteEnvironments {
    pub fn positions(&self, members: &[usize]) -> Vec<Point3> {
        members.iter().map(|&m| self.candidates[m].cart).collect()
    }

    /// Prefix lengths of the candidate list at each distance-shell boundary
    pub fn distance_shells(&self) -> Vec<usize> {
        let mut shells = Vec::new();
        for k in 1..self.candidates.len() {
            let gap = self.candidates[k].normalized_distance
                - self.candidates[k - 1].normalized_distance;
            if gap > SHELL_TOLERANCE {
                shells.push(k);
            }
        }
        if !self.candidates.is_empty() {
            shells.push(self.candidates.len());
        }
        shells
    }
}

/// Raw per-site analysis of one structure under one parameter set.
#[derive(Debug, Clone, Serialize)]
pub struct StructureEnvironments {
    pub structure: Structure,
    pub params: VoronoiParams,
    pub centering: CenteringPolicy,
    /// Indexed by site; None for excluded species
    pub sites: Vec<Option<SiteEnvironments>>,
}

impl StructureEnvironments {
    pub fn site(&self, idx: usize) -> Option<&SiteEnvironments> {
        self.sites.get(idx).and_then(|s| s.as_ref())
    }

    pub fn analysed_sites(&self) -> impl Iterator<Item = &SiteEnvironments> {
        self.sites.iter().flatten()
    }

    pub fn excluded_site_count(&self) -> usize {
        self.sites.iter().filter(|s| s.is_none()).count()
    }

    /// Shape measures for a subset of a site's candidates, best first
    pub fn shape_measures(&self, site: &SiteEnvironments, members: &[usize]) -> Vec<ShapeMeasure> {
        measure_shapes(site.center, &site.positions(members), self.centering)
    }
}

pub struct LocalGeometryFinder {
    centering: CenteringPolicy,
    rays: Vec<Point3>,
}

impl LocalGeometryFinder {
    pub fn new(centering: CenteringPolicy) -> Self {
        Self::with_ray_count(centering, DEFAULT_RAY_COUNT)
    }

    pub fn with_ray_count(centering: CenteringPolicy, ray_count: usize) -> Self {
        Self {
            centering,
            rays: fibonacci_sphere(ray_count.max(1)),
        }
    }

    pub fn compute_structure_environments(
        &self,
        structure: &Structure,
        params: &VoronoiParams,
    ) -> Result<StructureEnvironments, FinderError> {
        let volume = lattice_volume(structure.lattice);
        if !volume.is_finite() || volume.abs() < 1e-8 {
            return Err(FinderError::DegenerateLattice(volume));
        }

        let min_length = structure.min_lattice_length();
        for (axis, spacing) in plane_spacings(structure.lattice).into_iter().enumerate() {
            let skew = min_length / spacing;
            if !(skew <= MAX_CELL_SKEW) {
                return Err(FinderError::SkewedCell { axis, skew });
            }
        }

        let active: Vec<usize> = (0..structure.site_count())
            .filter(|&i| !params.is_excluded(&structure.sites[i].species))
            .collect();
        let carts: Vec<Point3> = (0..structure.site_count())
            .map(|i| frac_to_cart(structure.wrapped_frac(i), structure.lattice))
            .collect();

        let mut sites = vec![None; structure.site_count()];
        for &i in &active {
            let env = self.site_environments(structure, params, &active, &carts, i)?;
            log::debug!(
                "site {} ({}): {} neighbours, d_min {:.4}",
                i,
                env.species,
                env.candidates.len(),
                env.min_distance
            );
            sites[i] = Some(env);
        }

        Ok(StructureEnvironments {
            structure: structure.clone(),
            params: params.clone(),
            centering: self.centering,
            sites,
        })
    }

    fn site_environments(
        &self,
        structure: &Structure,
        params: &VoronoiParams,
        active: &[usize],
        carts: &[Point3],
        i: usize,
    ) -> Result<SiteEnvironments, FinderError> {
        let center = carts[i];

        // The site's own image along the shortest lattice vector bounds d_min
        let first = gather(structure, active, carts, i, structure.min_lattice_length() * (1.0 + 1e-6));
        let d_min = first.iter().map(|n| n.distance).fold(f64::INFINITY, f64::min);
        if !d_min.is_finite() {
            return Err(FinderError::NonFinite(i));
        }
        if let Some(close) = first.iter().find(|n| n.distance < MIN_ATOM_SEPARATION) {
            return Err(FinderError::OverlappingAtoms {
                a: i.min(close.site_index),
                b: i.max(close.site_index),
                distance: close.distance,
            });
        }

        // Faces of accepted neighbours can be cut by atoms up to twice as far
        let mut pool = gather(structure, active, carts, i, 2.0 * params.max_distance_factor * d_min);
        pool.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.site_index.cmp(&b.site_index))
                .then(a.image.cmp(&b.image))
        });

        let counts = self.ray_cast(&pool);
        let total = self.rays.len() as f64;
        let max_count = counts.iter().copied().max().unwrap_or(0);

        let mut candidates = Vec::new();
        for (n, &hits) in pool.iter().zip(&counts) {
            if hits == 0 {
                continue;
            }
            let normalized_distance = n.distance / d_min;
            let normalized_angle = hits as f64 / max_count as f64;
            if !normalized_distance.is_finite() {
                return Err(FinderError::NonFinite(i));
            }
            if normalized_distance > params.max_distance_factor + 1e-9
                || normalized_angle < params.min_angle_factor - 1e-12
            {
                continue;
            }
            candidates.push(NeighborCandidate {
                site_index: n.site_index,
                image: n.image,
                cart: add(center, n.vector),
                distance: n.distance,
                normalized_distance,
                solid_angle: hits as f64 / total,
                normalized_angle,
            });
        }

        Ok(SiteEnvironments {
            site_index: i,
            species: structure.sites[i].species.clone(),
            center,
            min_distance: if candidates.is_empty() { 0.0 } else { d_min },
            candidates,
        })
    }

    /// For each ray, the neighbour whose bisector plane is hit first owns it.
    fn ray_cast(&self, pool: &[RawNeighbor]) -> Vec<usize> {
        let mut counts = vec![0usize; pool.len()];
        for u in &self.rays {
            let mut best: Option<(usize, f64)> = None;
            for (k, n) in pool.iter().enumerate() {
                let proj = dot(*u, n.vector);
                if proj <= 0.0 {
                    continue;
                }
                let t = 0.5 * n.distance * n.distance / proj;
                if best.map_or(true, |(_, bt)| t < bt) {
                    best = Some((k, t));
                }
            }
            if let Some((k, _)) = best {
                counts[k] += 1;
            }
        }
        counts
    }
}

struct RawNeighbor {
    site_index: usize,
    image: [i32; 3],
    vector: Point3,
    distance: f64,
}

/// All active sites (with periodic images) within `radius` of site `i`
fn gather(structure: &Structure, active: &[usize], carts: &[Point3], i: usize, radius: f64) -> Vec<RawNeighbor> {
    let reach = plane_spacings(structure.lattice).map(|d| (radius / d).ceil() as i32 + 1);
    let [a, b, c] = structure.lattice;

    let mut out = Vec::new();
    for &j in active {
        for l0 in -reach[0]..=reach[0] {
            for l1 in -reach[1]..=reach[1] {
                for l2 in -reach[2]..=reach[2] {
                    if j == i && l0 == 0 && l1 == 0 && l2 == 0 {
                        continue;
                    }
                    let shift = add(
                        add(scale(a, l0 as f64), scale(b, l1 as f64)),
                        scale(c, l2 as f64),
                    );
                    let vector = sub(add(carts[j], shift), carts[i]);
                    let distance = len(vector);
                    if distance <= radius {
                        out.push(RawNeighbor {
                            site_index: j,
                            image: [l0, l1, l2],
                            vector,
                            distance,
                        });
                    }
                }
            }
        }
    }
    out
}

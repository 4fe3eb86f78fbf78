// src/chemenv/geometries.rs
//
// Catalogue of ideal coordination polyhedra and the shape deviation measure
// used to pick the closest one for an observed neighbour set.

use super::finder::CenteringPolicy;
use crate::utils::geometry::{centroid, len, normalize, scale, sub, Point3};
use serde::Serialize;
use std::sync::OnceLock;

/// Symbol used when no catalogue geometry applies to a site
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

#[derive(Debug, Clone)]
pub struct CoordinationGeometry {
    /// Short symbol, "<family>:<coordination number>"
    pub symbol: &'static str,
    /// Vertices around the origin, scaled to unit mean radius
    pub points: Vec<Point3>,
}

impl CoordinationGeometry {
    pub fn coordination_number(&self) -> usize {
        self.points.len()
    }
}

/// Deviation of an observed neighbour set from one ideal geometry.
/// Zero for a perfect match, grows with distortion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeMeasure {
    pub symbol: &'static str,
    pub csm: f64,
}

/// Family part of a symbol: "O" for "O:6"
pub fn symbol_family(symbol: &str) -> &str {
    symbol.split(':').next().unwrap_or(symbol)
}

pub fn all_geometries() -> &'static [CoordinationGeometry] {
    static CATALOGUE: OnceLock<Vec<CoordinationGeometry>> = OnceLock::new();
    CATALOGUE.get_or_init(build_catalogue)
}

pub fn geometries_for_cn(cn: usize) -> impl Iterator<Item = &'static CoordinationGeometry> {
    all_geometries()
        .iter()
        .filter(move |g| g.coordination_number() == cn)
}

fn ring(n: usize, radius: f64, z: f64, phase: f64) -> Vec<Point3> {
    (0..n)
        .map(|k| {
            let t = phase + 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            [radius * t.cos(), radius * t.sin(), z]
        })
        .collect()
}

fn unit(points: Vec<Point3>) -> Vec<Point3> {
    points.into_iter().map(normalize).collect()
}

/// For polyhedra whose vertices are not all on one sphere
fn unit_mean(points: Vec<Point3>) -> Vec<Point3> {
    let mean = points.iter().map(|p| len(*p)).sum::<f64>() / points.len() as f64;
    points.into_iter().map(|p| scale(p, 1.0 / mean)).collect()
}

fn build_catalogue() -> Vec<CoordinationGeometry> {
    let tetra_angle = (-1.0_f64 / 3.0).acos();
    let tetra = unit(vec![
        [1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
    ]);
    let octa = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];

    // Trigonal prism with square side faces
    let prism_r = 2.0 / 7.0_f64.sqrt();
    let prism_h = prism_r * 3.0_f64.sqrt();
    let mut prism = ring(3, prism_r, prism_h / 2.0, 0.0);
    prism.extend(ring(3, prism_r, -prism_h / 2.0, 0.0));

    // Square antiprism with equal edges
    let sa_r = 1.0 / (1.0 + 2.0_f64.sqrt() / 4.0).sqrt();
    let sa_h = (2.0_f64.sqrt()).sqrt() * sa_r;
    let mut antiprism = ring(4, sa_r, sa_h / 2.0, 0.0);
    antiprism.extend(ring(4, sa_r, -sa_h / 2.0, std::f64::consts::FRAC_PI_4));

    let mut cube = Vec::new();
    for x in [-1.0, 1.0] {
        for y in [-1.0, 1.0] {
            for z in [-1.0, 1.0] {
                cube.push([x, y, z]);
            }
        }
    }

    let mut cubocta = Vec::new();
    for a in [-1.0, 1.0] {
        for b in [-1.0, 1.0] {
            cubocta.push([a, b, 0.0]);
            cubocta.push([a, 0.0, b]);
            cubocta.push([0.0, a, b]);
        }
    }

    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut icosa = Vec::new();
    for a in [-1.0, 1.0] {
        for b in [-phi, phi] {
            icosa.push([0.0, a, b]);
            icosa.push([a, b, 0.0]);
            icosa.push([b, 0.0, a]);
        }
    }

    let mut seesaw = vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];
    seesaw.extend(ring(3, 1.0, 0.0, 0.0).into_iter().take(2));

    let mut tbp = vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];
    tbp.extend(ring(3, 1.0, 0.0, 0.0));

    let mut pbp = vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];
    pbp.extend(ring(5, 1.0, 0.0, 0.0));

    // Rhombic dodecahedron: the first two shells of a bcc lattice
    let mut rhombic = cube.clone();
    rhombic.extend(octa.iter().map(|p| scale(*p, 2.0)));

    let geometry = |symbol, points| CoordinationGeometry { symbol, points };

    vec![
        geometry("S:1", vec![[0.0, 0.0, 1.0]]),
        geometry("L:2", vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]]),
        geometry("A:2", vec![[0.0, 0.0, 1.0], [tetra_angle.sin(), 0.0, tetra_angle.cos()]]),
        geometry("TL:3", ring(3, 1.0, 0.0, 0.0)),
        geometry("TY:3", tetra[..3].to_vec()),
        geometry("T:4", tetra.clone()),
        geometry("S:4", ring(4, 1.0, 0.0, 0.0)),
        geometry("SS:4", seesaw),
        geometry("T:5", tbp),
        geometry("S:5", octa[..5].to_vec()),
        geometry("O:6", octa.clone()),
        geometry("T:6", prism),
        geometry("PB:7", pbp),
        geometry("C:8", unit(cube)),
        geometry("SA:8", antiprism),
        geometry("C:12", unit(cubocta)),
        geometry("I:12", unit(icosa)),
        geometry("RD:14", unit_mean(rhombic)),
    ]
}

/// Neighbour vectors measured from the reference point chosen by `policy`.
/// Falls back to the central site when the centroid collapses onto every
/// neighbour (single-neighbour sets).
pub fn reference_vectors(center: Point3, neighbors: &[Point3], policy: CenteringPolicy) -> Vec<Point3> {
    let reference = match policy {
        CenteringPolicy::CentralSite => center,
        CenteringPolicy::CentroidExcludingCenter => centroid(neighbors),
        CenteringPolicy::CentroidIncludingCenter => {
            let mut all = neighbors.to_vec();
            all.push(center);
            centroid(&all)
        }
    };

    let vectors: Vec<Point3> = neighbors.iter().map(|p| sub(*p, reference)).collect();
    if vectors.iter().all(|v| len(*v) < 1e-8) {
        return neighbors.iter().map(|p| sub(*p, center)).collect();
    }
    vectors
}

/// Sorted spectrum of radial and pairwise distances after scaling the set to
/// unit mean radius. Invariant under rotation and neighbour permutation.
pub fn shape_spectrum(vectors: &[Point3]) -> Vec<f64> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }
    let mean_radius = vectors.iter().map(|v| len(*v)).sum::<f64>() / n as f64;
    let s = if mean_radius > 1e-12 { 1.0 / mean_radius } else { 1.0 };
    let q: Vec<Point3> = vectors.iter().map(|v| scale(*v, s)).collect();

    let mut spectrum = Vec::with_capacity(n + n * (n - 1) / 2);
    for (a, qa) in q.iter().enumerate() {
        spectrum.push(len(*qa));
        for qb in &q[a + 1..] {
            spectrum.push(len(sub(*qa, *qb)));
        }
    }
    spectrum.sort_by(|x, y| x.total_cmp(y));
    spectrum
}

fn spectrum_deviation(observed: &[f64], ideal: &[f64]) -> f64 {
    let norm: f64 = ideal.iter().map(|x| x * x).sum();
    if norm <= 0.0 || observed.len() != ideal.len() {
        return 100.0;
    }
    let diff: f64 = observed
        .iter()
        .zip(ideal)
        .map(|(o, i)| (o - i) * (o - i))
        .sum();
    100.0 * diff / norm
}

/// Shape measures of a neighbour set against every catalogue geometry with
/// the same coordination number, best first. Empty if none exists.
pub fn measure_shapes(center: Point3, neighbors: &[Point3], policy: CenteringPolicy) -> Vec<ShapeMeasure> {
    let observed = shape_spectrum(&reference_vectors(center, neighbors, policy));

    let mut measures: Vec<ShapeMeasure> = geometries_for_cn(neighbors.len())
        .map(|g| {
            let ideal = shape_spectrum(&reference_vectors([0.0; 3], &g.points, policy));
            ShapeMeasure {
                symbol: g.symbol,
                csm: spectrum_deviation(&observed, &ideal),
            }
        })
        .collect();

    // Stable: ties keep catalogue order
    measures.sort_by(|a, b| a.csm.total_cmp(&b.csm));
    measures
}

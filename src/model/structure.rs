// src/model/structure.rs

use crate::utils::linalg::lattice_volume;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub species: String,
    // Fractional coordinates as read from the file (not wrapped)
    pub frac: [f64; 3],
}

/// A periodic crystal: lattice rows [a, b, c] in Angstroms plus the ordered
/// list of sites. Never mutated once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Structure {
    pub title: String,
    pub lattice: [[f64; 3]; 3],
    pub sites: Vec<Site>,
}

impl Structure {
    pub fn new(title: impl Into<String>, lattice: [[f64; 3]; 3], sites: Vec<Site>) -> Self {
        Self {
            title: title.into(),
            lattice,
            sites,
        }
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn volume(&self) -> f64 {
        lattice_volume(self.lattice)
    }

    /// Fractional coordinates of a site folded back into [0, 1)
    pub fn wrapped_frac(&self, idx: usize) -> [f64; 3] {
        let f = self.sites[idx].frac;
        [wrap_unit(f[0]), wrap_unit(f[1]), wrap_unit(f[2])]
    }

    /// Number of sites per species, sorted by symbol
    pub fn composition(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.species.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// e.g. "Cl4 Na4"
    pub fn formula(&self) -> String {
        self.composition()
            .iter()
            .map(|(el, count)| format!("{}{}", el, count))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Shortest of the three lattice vector lengths
    pub fn min_lattice_length(&self) -> f64 {
        self.lattice
            .iter()
            .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
            .fold(f64::INFINITY, f64::min)
    }
}

fn wrap_unit(x: f64) -> f64 {
    let w = x - x.floor();
    // floor() of values like -1e-17 gives exactly 1.0 back
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> [[f64; 3]; 3] {
        [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]
    }

    #[test]
    fn test_formula_is_sorted() {
        let s = Structure::new(
            "t",
            cubic(4.0),
            vec![
                Site { species: "O".into(), frac: [0.0, 0.0, 0.0] },
                Site { species: "Fe".into(), frac: [0.5, 0.5, 0.5] },
                Site { species: "O".into(), frac: [0.5, 0.0, 0.0] },
            ],
        );
        assert_eq!(s.formula(), "Fe1 O2");
        assert_eq!(s.site_count(), 3);
    }

    #[test]
    fn test_wrapping() {
        let s = Structure::new(
            "t",
            cubic(4.0),
            vec![Site { species: "X".into(), frac: [-0.25, 1.5, -1e-17] }],
        );
        let w = s.wrapped_frac(0);
        assert!((w[0] - 0.75).abs() < 1e-12);
        assert!((w[1] - 0.5).abs() < 1e-12);
        assert!(w[2] >= 0.0 && w[2] < 1.0);
    }

    #[test]
    fn test_volume_and_lengths() {
        let s = Structure::new("t", cubic(3.0), vec![]);
        assert!((s.volume() - 27.0).abs() < 1e-10);
        assert!((s.min_lattice_length() - 3.0).abs() < 1e-12);
    }
}

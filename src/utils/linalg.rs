// src/utils/linalg.rs

use nalgebra::{DMatrix, Matrix3, Vector3};

fn lattice_matrix(lattice: [[f64; 3]; 3]) -> Matrix3<f64> {
  Matrix3::from_row_slice(&[
    lattice[0][0],
    lattice[0][1],
    lattice[0][2],
    lattice[1][0],
    lattice[1][1],
    lattice[1][2],
    lattice[2][0],
    lattice[2][1],
    lattice[2][2],
  ])
}

/// Convert fractional coordinates to Cartesian using lattice matrix
///
/// # Arguments
/// * `frac` - Fractional coordinates [x, y, z]
/// * `lattice` - Lattice vectors as row matrix [[ax, ay, az], [bx, by, bz], [cx, cy, cz]]
///
/// # Formula
/// ```text
/// Cartesian = Lattice^T × Fractional
/// ```
pub fn frac_to_cart(frac: [f64; 3], lattice: [[f64; 3]; 3]) -> [f64; 3] {
  let cart_vec = lattice_matrix(lattice).transpose() * Vector3::from(frac);
  [cart_vec.x, cart_vec.y, cart_vec.z]
}

/// Convert Cartesian coordinates to fractional using lattice matrix.
/// Returns None if the lattice is singular.
///
/// # Formula
/// ```text
/// Fractional = (Lattice^T)^-1 × Cartesian
/// ```
pub fn cart_to_frac(cart: [f64; 3], lattice: [[f64; 3]; 3]) -> Option<[f64; 3]> {
  let inv_lat = lattice_matrix(lattice).transpose().try_inverse()?;
  let frac_vec = inv_lat * Vector3::from(cart);
  Some([frac_vec.x, frac_vec.y, frac_vec.z])
}

/// Signed cell volume a · (b × c); negative for left-handed lattices
pub fn lattice_volume(lattice: [[f64; 3]; 3]) -> f64 {
  lattice_matrix(lattice).determinant()
}

/// Distances between successive lattice planes spanned by (b,c), (c,a), (a,b).
///
/// A sphere of radius r around any point crosses at most ceil(r / d_i)
/// cells along axis i.
pub fn plane_spacings(lattice: [[f64; 3]; 3]) -> [f64; 3] {
  let a = Vector3::from(lattice[0]);
  let b = Vector3::from(lattice[1]);
  let c = Vector3::from(lattice[2]);
  let vol = a.dot(&b.cross(&c)).abs();
  [
    vol / b.cross(&c).norm(),
    vol / c.cross(&a).norm(),
    vol / a.cross(&b).norm(),
  ]
}

/// Rank of a set of integer lattice translations (0..=3)
pub fn translation_rank(vectors: &[[i32; 3]]) -> usize {
  if vectors.is_empty() {
    return 0;
  }
  let flat: Vec<f64> = vectors
    .iter()
    .flat_map(|v| v.iter().map(|&x| x as f64))
    .collect();
  DMatrix::from_row_slice(vectors.len(), 3, &flat).rank(1e-6)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cubic_lattice() {
    let lattice = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];

    let cart = frac_to_cart([0.5, 0.5, 0.5], lattice);

    assert!((cart[0] - 2.5).abs() < 1e-10);
    assert!((cart[1] - 2.5).abs() < 1e-10);
    assert!((cart[2] - 2.5).abs() < 1e-10);
  }

  #[test]
  fn test_non_orthogonal_back_conversion() {
    let lattice = [[4.0, 0.0, 0.0], [2.0, 3.46, 0.0], [0.0, 0.0, 5.0]];

    let frac_orig = [0.333, 0.667, 0.25];
    let cart = frac_to_cart(frac_orig, lattice);
    let frac_back = cart_to_frac(cart, lattice).unwrap();

    for i in 0..3 {
      assert!((frac_back[i] - frac_orig[i]).abs() < 1e-10);
    }
  }

  #[test]
  fn test_singular_lattice() {
    let lattice = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    assert!(cart_to_frac([1.0, 1.0, 1.0], lattice).is_none());
    assert!(lattice_volume(lattice).abs() < 1e-12);
  }

  #[test]
  fn test_plane_spacings_hexagonal() {
    // a = b = 3, gamma = 120 deg: spacing of (100) planes is a * sin(60)
    let h = 3.0 * (3.0_f64).sqrt() / 2.0;
    let lattice = [[3.0, 0.0, 0.0], [-1.5, h, 0.0], [0.0, 0.0, 5.0]];
    let d = plane_spacings(lattice);
    assert!((d[0] - h).abs() < 1e-10);
    assert!((d[1] - h).abs() < 1e-10);
    assert!((d[2] - 5.0).abs() < 1e-10);
  }

  #[test]
  fn test_translation_rank() {
    assert_eq!(translation_rank(&[]), 0);
    assert_eq!(translation_rank(&[[1, 0, 0], [2, 0, 0]]), 1);
    assert_eq!(translation_rank(&[[1, 0, 0], [0, 1, 0], [1, 1, 0]]), 2);
    assert_eq!(translation_rank(&[[1, 0, 0], [0, 1, 0], [0, 0, 1]]), 3);
  }
}

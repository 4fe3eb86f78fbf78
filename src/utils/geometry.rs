// src/utils/geometry.rs

pub type Point3 = [f64; 3];

/// Arithmetic mean of a point cloud; origin for an empty slice
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return [0.0; 3];
    }
    let mut c = [0.0; 3];
    for p in points {
        c = add(c, *p);
    }
    scale(c, 1.0 / points.len() as f64)
}

/// Quasi-uniform unit vectors on the sphere (golden spiral).
/// Same `n` always yields the same directions.
pub fn fibonacci_sphere(n: usize) -> Vec<Point3> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let phi = golden * i as f64;
            [r * phi.cos(), r * phi.sin(), z]
        })
        .collect()
}

// --- Math Helpers for [f64; 3] ---

pub fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn add(a: Point3, b: Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn scale(a: Point3, s: f64) -> Point3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn len(a: Point3) -> f64 {
    dot(a, a).sqrt()
}

pub fn normalize(a: Point3) -> Point3 {
    let l = len(a);
    if l == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        [a[0] / l, a[1] / l, a[2] / l]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_sphere_is_unit_and_balanced() {
        let dirs = fibonacci_sphere(500);
        assert_eq!(dirs.len(), 500);
        for d in &dirs {
            assert!((len(*d) - 1.0).abs() < 1e-12);
        }
        let c = centroid(&dirs);
        assert!(len(c) < 0.01);
    }
}

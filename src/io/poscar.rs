// src/io/poscar.rs
//
// VASP POSCAR / CONTCAR reader. Only the structural header and the first
// block of positions are read; velocities and predictor data in a CONTCAR
// are ignored.

use crate::model::{Site, Structure};
use crate::utils::linalg::{cart_to_frac, lattice_volume};
use std::fs;
use std::io;
use std::path::Path;

pub fn parse(path: &Path) -> io::Result<Structure> {
    let content = fs::read_to_string(path)?;
    parse_str(&content)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn parse_floats(line: &str, n: usize, what: &str) -> io::Result<Vec<f64>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < n {
        return Err(invalid(format!("Invalid {} line: '{}'", what, line.trim())));
    }
    parts[..n]
        .iter()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| invalid(format!("Invalid number '{}' in {} line", p, what)))
        })
        .collect()
}

pub fn parse_str(content: &str) -> io::Result<Structure> {
    let mut lines = content.lines();
    let mut next_line = |what: &str| {
        lines
            .next()
            .ok_or_else(|| invalid(format!("Unexpected end of file: missing {}", what)))
    };

    let title = next_line("comment")?.trim().to_string();

    // Scale (negative means target cell volume)
    let scale_line = next_line("scale")?;
    let scale = parse_floats(scale_line, 1, "scale")?[0];
    if scale == 0.0 {
        return Err(invalid("Scale factor must be non-zero"));
    }

    // Lattice
    let mut lattice = [[0.0; 3]; 3];
    for row in lattice.iter_mut() {
        let v = parse_floats(next_line("lattice")?, 3, "lattice")?;
        row.copy_from_slice(&v);
    }
    let raw_volume = lattice_volume(lattice);
    if raw_volume.abs() < 1e-8 {
        return Err(invalid("Lattice vectors are degenerate"));
    }
    let factor = if scale < 0.0 {
        (scale.abs() / raw_volume.abs()).cbrt()
    } else {
        scale
    };
    for row in lattice.iter_mut() {
        for x in row.iter_mut() {
            *x *= factor;
        }
    }

    // Elements & Counts (VASP 4 files have no species line)
    let line6 = next_line("species or counts")?;
    let starts_alpha = line6
        .trim()
        .chars()
        .next()
        .map_or(false, |c| c.is_alphabetic());
    let (element_names, counts_line): (Vec<String>, &str) = if starts_alpha {
        let names = line6
            .split_whitespace()
            // POTCAR-style labels like "Fe_pv" or "O/1a2b"
            .map(|s| s.split(['_', '/']).next().unwrap_or(s).to_string())
            .collect();
        (names, next_line("counts")?)
    } else {
        (Vec::new(), line6)
    };

    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(|x| {
            x.parse()
                .map_err(|_| invalid(format!("Invalid atom count '{}'", x)))
        })
        .collect::<io::Result<_>>()?;
    if counts.is_empty() {
        return Err(invalid("No atom counts given"));
    }
    if !element_names.is_empty() && element_names.len() != counts.len() {
        return Err(invalid(format!(
            "{} species listed but {} counts given",
            element_names.len(),
            counts.len()
        )));
    }

    // Mode (optionally preceded by "Selective dynamics")
    let mut mode_line = next_line("coordinate mode")?;
    if mode_line.trim_start().to_lowercase().starts_with('s') {
        mode_line = next_line("coordinate mode")?;
    }
    let mode = mode_line.trim_start().to_lowercase();
    let is_cartesian = mode.starts_with('c') || mode.starts_with('k');

    // Sites
    let mut sites = Vec::with_capacity(counts.iter().sum());
    for (elem_idx, &count) in counts.iter().enumerate() {
        let species = element_names
            .get(elem_idx)
            .cloned()
            .unwrap_or_else(|| "Xx".to_string());
        for _ in 0..count {
            let v = parse_floats(next_line("atomic position")?, 3, "position")?;
            let mut p = [v[0], v[1], v[2]];

            if is_cartesian {
                let cart = [p[0] * factor, p[1] * factor, p[2] * factor];
                p = cart_to_frac(cart, lattice)
                    .ok_or_else(|| invalid("Lattice vectors are degenerate"))?;
            }

            if p.iter().any(|x| !x.is_finite()) {
                return Err(invalid("Non-finite atomic position"));
            }

            sites.push(Site {
                species: species.clone(),
                frac: p,
            });
        }
    }

    Ok(Structure::new(title, lattice, sites))
}

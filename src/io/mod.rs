// src/io/mod.rs
pub mod poscar;

use crate::model::Structure;
use std::io;
use std::path::Path;

/// Reads a structure file. POSCAR/CONTCAR is the only supported grammar; any
/// file name is attempted as such.
pub fn load_structure(path: &Path) -> io::Result<Structure> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".cif") || name.ends_with(".xyz") {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Unsupported structure format: {}", name),
        ));
    }

    poscar::parse(path)
}

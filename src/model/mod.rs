//src/model/mod.rs
pub mod structure;

// Re-exports for cleaner imports
pub use structure::{Site, Structure};

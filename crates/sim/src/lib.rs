//! Glow - Simulation Library
//!
//! Host side of the triangle particle demo:
//! - Immutable run configuration and presets
//! - Particle store with seeded initialization
//! - Reference math for the particle update kernel (wrap, triangle emission)
//! - Reference image filters (Laplacian, area max, Gaussian blur)
//!
//! This crate is framework-agnostic - it has no GPU dependency.
//! Use the `glow` crate for the wgpu pipeline.

pub mod config;
pub mod error;
pub mod image;
pub mod kernel;
pub mod particle;

pub use config::{ComputeConfig, FilterConfig, SimConfig};
pub use error::SimError;
pub use image::{FilterChain, Image, ImageOperator};
pub use particle::{initialize, Particle, Vertex, ViewportSize};

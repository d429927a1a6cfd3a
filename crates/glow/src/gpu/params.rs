//! GPU uniform structs.
//!
//! These are `#[repr(C)]` structs uploaded to uniform buffers; each is padded
//! to a multiple of 16 bytes to satisfy WGSL uniform layout rules.

use bytemuck::{Pod, Zeroable};
use sim::ViewportSize;

/// Particle update kernel parameters (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ComputeParams {
    pub viewport: [u32; 2],
    pub particle_count: u32,
    pub _pad: u32,
}

impl ComputeParams {
    pub fn new(viewport: ViewportSize, particle_count: u32) -> Self {
        Self {
            viewport: [viewport.width, viewport.height],
            particle_count,
            _pad: 0,
        }
    }
}

/// Viewport size for the triangle vertex shader (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ViewportUniform {
    pub size: [u32; 2],
    pub _pad: [u32; 2],
}

impl ViewportUniform {
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            size: [viewport.width, viewport.height],
            _pad: [0; 2],
        }
    }
}

/// One filter pass (32 bytes).
///
/// `direction` is the step between taps: (1, 0) horizontal, (0, 1) vertical,
/// (0, 0) for the non-separable Laplacian. `taps` is the inclusive range of
/// tap offsets along `direction`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct FilterParams {
    pub direction: [i32; 2],
    pub taps: [i32; 2],
    pub bias: f32,
    pub _pad: [f32; 3],
}

impl FilterParams {
    pub fn laplacian(bias: f32) -> Self {
        Self {
            direction: [0, 0],
            taps: [-1, 1],
            bias,
            _pad: [0.0; 3],
        }
    }

    /// Taps `first..=last` along `direction`.
    pub fn directional(direction: [i32; 2], (first, last): (i32, i32)) -> Self {
        Self {
            direction,
            taps: [first, last],
            bias: 0.0,
            _pad: [0.0; 3],
        }
    }

    /// Taps symmetric about the centre.
    pub fn symmetric(direction: [i32; 2], radius: u32) -> Self {
        let radius = radius as i32;
        Self::directional(direction, (-radius, radius))
    }
}

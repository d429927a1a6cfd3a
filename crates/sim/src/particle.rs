//! Particle store records and initial generation.
//!
//! `Particle` and `Vertex` are uploaded verbatim to GPU storage buffers, so
//! their layout follows WGSL alignment rules (vec4 fields on 16-byte
//! boundaries, struct size rounded up to 16).

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;

use crate::config::SimConfig;
use crate::error::SimError;

/// One simulated triangle (48 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub color: [f32; 4],
    /// Pixel-space position, origin at the viewport centre.
    pub position: [f32; 2],
    /// Pixels per frame.
    pub velocity: [f32; 2],
    pub size: f32,
    /// Radians.
    pub angle: f32,
    /// Radians per frame.
    pub ang_velocity: f32,
    pub _pad: f32,
}

impl Particle {
    pub fn new(color: [f32; 4], position: Vec2, velocity: Vec2, size: f32, angle: f32, ang_velocity: f32) -> Self {
        Self {
            color,
            position: position.to_array(),
            velocity: velocity.to_array(),
            size,
            angle,
            ang_velocity,
            _pad: 0.0,
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    #[inline]
    pub fn vel(&self) -> Vec2 {
        Vec2::from_array(self.velocity)
    }
}

/// Triangle corner emitted by the compute stage (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec2, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            _pad: [0.0; 2],
            color,
        }
    }
}

/// Size of the drawable in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the viewport unchanged, or an error if either side is zero.
    pub fn validated(self) -> Result<Self, SimError> {
        if self.is_empty() {
            Err(SimError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        } else {
            Ok(self)
        }
    }

    pub fn extent(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn half_extent(&self) -> Vec2 {
        self.extent() * 0.5
    }
}

/// Draw one of `resolution` evenly spaced levels in [0, 1).
fn sample_level<R: Rng + ?Sized>(rng: &mut R, resolution: u32) -> f32 {
    rng.gen_range(0..resolution) as f32 / resolution as f32
}

/// Generate `count` particles spread over the viewport.
///
/// Colour channels are quantised to `config.resolution` levels; green and blue
/// also drive the velocity, red the size and blue the starting angle.
pub fn initialize<R: Rng + ?Sized>(
    count: u32,
    viewport: ViewportSize,
    config: &SimConfig,
    rng: &mut R,
) -> Result<Vec<Particle>, SimError> {
    let viewport = viewport.validated()?;
    if config.resolution == 0 {
        return Err(SimError::InvalidConfig("resolution must be > 0".into()));
    }

    let half = viewport.half_extent();
    let mut particles = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let red = sample_level(rng, config.resolution);
        let green = sample_level(rng, config.resolution);
        let blue = sample_level(rng, config.resolution);

        let velocity = Vec2::new(green - 0.5, blue - 0.5) * config.speed;
        let size = config.size_min * (1.0 - red) + config.size_max * red;
        let ang_velocity = rng.gen_range(-1.0f32..1.0) * config.ang_speed;

        let position = Vec2::new(
            rng.gen_range(0..viewport.width) as f32 - half.x,
            rng.gen_range(0..viewport.height) as f32 - half.y,
        );

        particles.push(Particle::new(
            [red, green, blue, 1.0],
            position,
            velocity,
            size,
            blue,
            ang_velocity,
        ));
    }

    log::debug!(
        "Initialized {} particles over {}x{} viewport",
        count,
        viewport.width,
        viewport.height
    );

    Ok(particles)
}

//! Reference implementation of the particle update kernel.
//!
//! `shaders/particle_update.wgsl` in the `glow` crate performs the same
//! arithmetic per work item; the GPU tests compare against these functions.
//!
//! Boundary handling is toroidal: a coordinate leaving one edge re-enters at
//! the opposite edge carrying its overflow, so the visible domain is
//! `[-extent/2, extent/2)` on each axis.

use glam::Vec2;
use std::f32::consts::TAU;

use crate::particle::{Particle, Vertex, ViewportSize};

/// Vertices emitted per particle.
pub const VERTICES_PER_PARTICLE: usize = 3;

/// Wrap `x` into `[-extent/2, extent/2)`.
#[inline]
pub fn wrap_coordinate(x: f32, extent: f32) -> f32 {
    let half = extent * 0.5;
    let wrapped = x - extent * ((x + half) / extent).floor();
    // Rounding in the floor term can land one ulp outside the range.
    if wrapped < -half {
        wrapped + extent
    } else if wrapped >= half {
        wrapped - extent
    } else {
        wrapped
    }
}

#[inline]
pub fn wrap_position(position: Vec2, viewport: ViewportSize) -> Vec2 {
    let extent = viewport.extent();
    Vec2::new(
        wrap_coordinate(position.x, extent.x),
        wrap_coordinate(position.y, extent.y),
    )
}

/// Corners of an equilateral triangle with circumradius `size`, rotated by `angle`.
pub fn triangle_corners(center: Vec2, size: f32, angle: f32) -> [Vec2; 3] {
    std::array::from_fn(|k| {
        let a = angle + k as f32 * (TAU / 3.0);
        center + Vec2::new(a.cos(), a.sin()) * size
    })
}

/// Advance one particle by a frame and return its triangle.
pub fn update_particle(particle: &mut Particle, viewport: ViewportSize) -> [Vertex; 3] {
    let position = wrap_position(particle.pos() + particle.vel(), viewport);
    particle.position = position.to_array();
    particle.angle += particle.ang_velocity;

    let color = particle.color;
    triangle_corners(position, particle.size, particle.angle).map(|corner| Vertex::new(corner, color))
}

/// Work groups needed to cover `count` items at `width` items per group.
#[inline]
pub fn workgroup_count(count: u32, width: u32) -> u32 {
    count.div_ceil(width.max(1))
}

/// Tally of one emulated dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub workgroups: u32,
    pub invocations: u32,
    pub particles_updated: u32,
    pub vertices_written: u32,
}

/// Run the kernel the way the GPU schedules it: `workgroup_count` groups of
/// `width` invocations, each guarded against indices past the end.
///
/// `vertices` must hold exactly `3 * particles.len()` entries.
pub fn emulate_dispatch(
    particles: &mut [Particle],
    vertices: &mut [Vertex],
    viewport: ViewportSize,
    width: u32,
) -> DispatchStats {
    assert_eq!(vertices.len(), particles.len() * VERTICES_PER_PARTICLE);

    let count = particles.len() as u32;
    let width = width.max(1);
    let mut stats = DispatchStats {
        workgroups: workgroup_count(count, width),
        ..Default::default()
    };

    for group in 0..stats.workgroups {
        for local in 0..width {
            stats.invocations += 1;
            let index = (group * width + local) as usize;
            if index >= particles.len() {
                continue;
            }
            let triangle = update_particle(&mut particles[index], viewport);
            let base = index * VERTICES_PER_PARTICLE;
            vertices[base..base + VERTICES_PER_PARTICLE].copy_from_slice(&triangle);
            stats.particles_updated += 1;
            stats.vertices_written += VERTICES_PER_PARTICLE as u32;
        }
    }

    stats
}

//! Property-based tests for the host-side store, kernel and filters.
//!
//! These check invariants across random inputs:
//! - Initialization produces exactly N particles inside their documented ranges
//! - Toroidal wrap lands in the viewport and keeps the overflow
//! - A dispatch of any width updates every particle exactly once
//! - The degenerate filter chain returns its input untouched

use glam::Vec2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim::kernel::{emulate_dispatch, update_particle, wrap_coordinate, VERTICES_PER_PARTICLE};
use sim::{initialize, FilterChain, FilterConfig, Image, Particle, SimConfig, Vertex, ViewportSize};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn initialize_respects_ranges(
        count in 1u32..2000,
        width in 1u32..4096,
        height in 1u32..4096,
        seed in any::<u64>(),
    ) {
        let config = SimConfig::particles();
        let particles = initialize(
            count,
            ViewportSize::new(width, height),
            &config,
            &mut StdRng::seed_from_u64(seed),
        ).unwrap();

        prop_assert_eq!(particles.len(), count as usize);
        let (hw, hh) = (width as f32 / 2.0, height as f32 / 2.0);
        for p in &particles {
            prop_assert!(p.position[0] >= -hw && p.position[0] < hw);
            prop_assert!(p.position[1] >= -hh && p.position[1] < hh);
            prop_assert!(p.size >= config.size_min && p.size <= config.size_max);
            prop_assert!(p.ang_velocity >= -config.ang_speed && p.ang_velocity < config.ang_speed);
        }
    }

    #[test]
    fn wrap_stays_in_domain(x in -1.0e4f32..1.0e4, extent in 1u32..4096) {
        let extent = extent as f32;
        let wrapped = wrap_coordinate(x, extent);
        prop_assert!(wrapped >= -extent / 2.0 && wrapped < extent / 2.0, "{} -> {}", x, wrapped);
        // Same point on the torus: differs by a whole number of extents.
        let laps = (x - wrapped) / extent;
        prop_assert!((laps - laps.round()).abs() < 1e-2);
    }

    #[test]
    fn small_steps_never_jump(
        x in -50.0f32..50.0,
        y in -30.0f32..30.0,
        vx in -5.0f32..5.0,
        vy in -5.0f32..5.0,
    ) {
        let viewport = ViewportSize::new(100, 60);
        let mut p = Particle::new([1.0; 4], Vec2::new(x, y), Vec2::new(vx, vy), 1.0, 0.0, 0.0);
        update_particle(&mut p, viewport);

        // Distance on the torus equals the step length.
        let dx = (p.position[0] - x - vx).rem_euclid(100.0);
        let dy = (p.position[1] - y - vy).rem_euclid(60.0);
        prop_assert!(dx.min(100.0 - dx) < 1e-3);
        prop_assert!(dy.min(60.0 - dy) < 1e-3);
    }

    #[test]
    fn dispatch_covers_every_particle(count in 1usize..3000, width in 1u32..=256) {
        let viewport = ViewportSize::new(640, 480);
        let mut particles: Vec<Particle> = (0..count)
            .map(|i| Particle::new([1.0; 4], Vec2::ZERO, Vec2::new(1.0, 0.0), 2.0, 0.0, i as f32))
            .collect();
        let mut vertices = vec![Vertex::default(); count * VERTICES_PER_PARTICLE];

        let stats = emulate_dispatch(&mut particles, &mut vertices, viewport, width);

        prop_assert_eq!(stats.particles_updated as usize, count);
        prop_assert_eq!(stats.vertices_written as usize, 3 * count);
        for (i, p) in particles.iter().enumerate() {
            prop_assert_eq!(p.position, [1.0, 0.0]);
            prop_assert_eq!(p.angle, i as f32);
        }
        prop_assert!(vertices.iter().all(|v| v.color == [1.0; 4]));
    }

    #[test]
    fn passthrough_chain_is_exact(
        width in 1u32..24,
        height in 1u32..24,
        seed in any::<u64>(),
    ) {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..width * height * 4).map(|_| rng.gen()).collect();
        let image = Image::from_rgba8(width, height, &bytes);

        let chain = FilterChain::from_config(&FilterConfig::passthrough());
        let out = chain.apply(&image);

        prop_assert_eq!(out.to_rgba8(), bytes);
    }
}

/// Static particles: ten frames with zero speed leave positions bit-identical.
#[test]
fn static_particles_hold_position_over_ten_frames() {
    let mut config = SimConfig::particles();
    config.speed = 0.0;
    config.ang_speed = 0.0;
    let viewport = ViewportSize::new(100, 100);

    let initial = initialize(4, viewport, &config, &mut StdRng::seed_from_u64(2024)).unwrap();
    let mut particles = initial.clone();
    let mut vertices = vec![Vertex::default(); 12];

    for _ in 0..10 {
        emulate_dispatch(&mut particles, &mut vertices, viewport, 64);
    }

    for (before, after) in initial.iter().zip(&particles) {
        assert_eq!(before.position[0].to_bits(), after.position[0].to_bits());
        assert_eq!(before.position[1].to_bits(), after.position[1].to_bits());
        assert_eq!(before.angle.to_bits(), after.angle.to_bits());
    }
}

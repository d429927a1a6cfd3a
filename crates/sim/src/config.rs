//! Run configuration.
//!
//! Everything here is read once when the renderer is built and never mutated
//! afterwards. Two presets mirror the two parameter sets the demo ships with.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SimError;
use crate::particle::Vertex;

/// Largest compute work-group width accepted (wgpu default limit).
pub const MAX_WORKGROUP_SIZE: u32 = 256;

/// Largest storage buffer binding in bytes (wgpu default limit).
pub const MAX_STORAGE_BINDING_SIZE: u64 = 128 << 20;

/// Largest particle count whose vertex buffer fits one storage binding.
pub const MAX_PARTICLE_COUNT: u32 =
    (MAX_STORAGE_BINDING_SIZE / (3 * std::mem::size_of::<Vertex>() as u64)) as u32;

/// Parameters of the post-filter chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Run the Laplacian edge detector. When false the stage passes through.
    #[serde(default = "default_edge_detect")]
    pub edge_detect: bool,
    /// Added to every Laplacian output sample.
    #[serde(default)]
    pub edge_bias: f32,
    /// Square neighbourhood extent for the area-max dilation (0 disables).
    #[serde(default = "default_dilate_size")]
    pub dilate_size: u32,
    /// Gaussian sigma in pixels (0 disables).
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
}

fn default_edge_detect() -> bool {
    true
}
fn default_dilate_size() -> u32 {
    10
}
fn default_blur_sigma() -> f32 {
    2.5
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            edge_detect: default_edge_detect(),
            edge_bias: 0.0,
            dilate_size: default_dilate_size(),
            blur_sigma: default_blur_sigma(),
        }
    }
}

impl FilterConfig {
    /// Degenerate chain: every stage is the identity.
    pub fn passthrough() -> Self {
        Self {
            edge_detect: false,
            edge_bias: 0.0,
            dilate_size: 0,
            blur_sigma: 0.0,
        }
    }
}

/// Compute dispatch parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Work-group width of the particle kernel. Need not divide the particle count.
    #[serde(default = "default_workgroup_size")]
    pub workgroup_size: u32,
}

fn default_workgroup_size() -> u32 {
    64
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            workgroup_size: default_workgroup_size(),
        }
    }
}

/// Immutable per-run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub particle_count: u32,
    /// Extent of the initial spawn area. Spawning currently covers the whole viewport.
    pub start_size: f32,
    /// Number of discrete levels used when sampling colour channels.
    pub resolution: u32,
    pub size_min: f32,
    pub size_max: f32,
    pub speed: f32,
    pub ang_speed: f32,
    /// Clear colour of the offscreen target (RGBA).
    pub background: [f64; 4],
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::particles()
    }
}

impl SimConfig {
    /// Large triangles with a strong edge glow.
    pub fn particles() -> Self {
        Self {
            particle_count: 50_000,
            start_size: 100.0,
            resolution: 100,
            size_min: 10.0,
            size_max: 50.0,
            speed: 10.0,
            ang_speed: 0.1,
            background: [0.0, 0.0, 0.0, 1.0],
            filters: FilterConfig::default(),
            compute: ComputeConfig::default(),
        }
    }

    /// Small triangles, thin dilation and a negative edge bias.
    pub fn fine_lines() -> Self {
        Self {
            size_min: 2.0,
            size_max: 10.0,
            filters: FilterConfig {
                edge_detect: true,
                edge_bias: -0.5,
                dilate_size: 4,
                blur_sigma: 2.5,
            },
            ..Self::particles()
        }
    }

    /// Check the configuration before any GPU resource is created.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.particle_count == 0 {
            return Err(SimError::InvalidConfig("particle_count must be > 0".into()));
        }
        let vertex_bytes = self
            .particle_count
            .checked_mul(3)
            .and_then(|n| n.checked_mul(std::mem::size_of::<Vertex>() as u32));
        if vertex_bytes.map_or(true, |bytes| bytes as u64 > MAX_STORAGE_BINDING_SIZE) {
            return Err(SimError::InvalidConfig(format!(
                "particle_count {} exceeds {MAX_PARTICLE_COUNT}",
                self.particle_count
            )));
        }
        if self.resolution == 0 {
            return Err(SimError::InvalidConfig("resolution must be > 0".into()));
        }
        let scalars = [
            ("start_size", self.start_size),
            ("size_min", self.size_min),
            ("size_max", self.size_max),
            ("speed", self.speed),
            ("ang_speed", self.ang_speed),
            ("filters.edge_bias", self.filters.edge_bias),
            ("filters.blur_sigma", self.filters.blur_sigma),
        ];
        if let Some((name, _)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::InvalidConfig(format!("{name} must be finite")));
        }
        if self.size_min < 0.0 || self.size_min > self.size_max {
            return Err(SimError::InvalidConfig(format!(
                "size range {}..{} is empty or negative",
                self.size_min, self.size_max
            )));
        }
        if self.filters.blur_sigma < 0.0 {
            return Err(SimError::InvalidConfig("filters.blur_sigma must be >= 0".into()));
        }
        if self.compute.workgroup_size == 0 || self.compute.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(SimError::InvalidConfig(format!(
                "compute.workgroup_size must be in 1..={MAX_WORKGROUP_SIZE}, got {}",
                self.compute.workgroup_size
            )));
        }
        Ok(())
    }

    /// Number of vertices the compute stage emits per frame.
    pub fn vertex_count(&self) -> u32 {
        3 * self.particle_count
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &Path) -> Result<Self, SimError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        SimConfig::particles().validate().unwrap();
        SimConfig::fine_lines().validate().unwrap();
    }

    #[test]
    fn test_default_matches_particles_preset() {
        let config = SimConfig::default();
        assert_eq!(config.particle_count, 50_000);
        assert_eq!(config.vertex_count(), 150_000);
        assert_eq!(config.background, [0.0, 0.0, 0.0, 1.0]);
        assert!(config.filters.edge_detect);
        assert_eq!(config.filters.dilate_size, 10);
    }

    #[test]
    fn test_fine_lines_overrides_filters_and_sizes() {
        let config = SimConfig::fine_lines();
        assert_eq!(config.size_min, 2.0);
        assert_eq!(config.size_max, 10.0);
        assert_eq!(config.filters.dilate_size, 4);
        assert_eq!(config.filters.edge_bias, -0.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimConfig::particles();
        config.particle_count = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::particles();
        config.size_min = 60.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::particles();
        config.filters.blur_sigma = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = SimConfig::particles();
        config.compute.workgroup_size = 0;
        assert!(config.validate().is_err());
        config.compute.workgroup_size = MAX_WORKGROUP_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = SimConfig::particles();
        config.particle_count = 2_000_000_000;
        assert!(config.validate().is_err());
        config.particle_count = MAX_PARTICLE_COUNT + 1;
        assert!(config.validate().is_err());
        config.particle_count = MAX_PARTICLE_COUNT;
        assert!(config.validate().is_ok());
        assert_eq!(config.vertex_count(), 3 * MAX_PARTICLE_COUNT);
    }

    #[test]
    fn test_json_missing_sections_use_defaults() {
        let json = r#"{
            "particle_count": 10,
            "start_size": 100.0,
            "resolution": 100,
            "size_min": 1.0,
            "size_max": 2.0,
            "speed": 0.0,
            "ang_speed": 0.0,
            "background": [0.0, 0.0, 0.0, 1.0]
        }"#;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.filters, FilterConfig::default());
        assert_eq!(config.compute.workgroup_size, 64);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("glow_config_{}.json", std::process::id()));
        let config = SimConfig::fine_lines();
        config.save_json(&path).unwrap();
        let loaded = SimConfig::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config, loaded);
    }
}

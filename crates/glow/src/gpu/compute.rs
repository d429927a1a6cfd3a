//! Particle update compute stage.
//!
//! One invocation per particle: advance position and angle, wrap against the
//! viewport, write the particle's triangle into `vertices[3i..3i+3]`.
//! The dispatch rounds the group count up and the kernel bounds-checks, so
//! any work-group width covers every particle exactly once.

use sim::kernel::workgroup_count;
use sim::ViewportSize;

use super::params::ComputeParams;
use super::{allocate_checked, create_checked, GpuError};

const SHADER_SOURCE: &str = include_str!("shaders/particle_update.wgsl");
const WORKGROUP_SIZE_DECL: &str = "const WORKGROUP_SIZE: u32 = 64u;";

/// Shader source specialised for `workgroup_size`.
pub fn shader_source(workgroup_size: u32) -> String {
    SHADER_SOURCE.replace(
        WORKGROUP_SIZE_DECL,
        &format!("const WORKGROUP_SIZE: u32 = {workgroup_size}u;"),
    )
}

/// GPU compute pipeline for the particle update.
pub struct ParticleCompute {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    particle_count: u32,
    workgroup_size: u32,
}

impl ParticleCompute {
    pub fn new(
        device: &wgpu::Device,
        particles: &wgpu::Buffer,
        vertices: &wgpu::Buffer,
        particle_count: u32,
        workgroup_size: u32,
        viewport: ViewportSize,
    ) -> Result<Self, GpuError> {
        let groups = workgroup_count(particle_count, workgroup_size);
        let max_groups = device.limits().max_compute_workgroups_per_dimension;
        if groups > max_groups {
            return Err(GpuError::Config(sim::SimError::InvalidConfig(format!(
                "{particle_count} particles at work-group width {workgroup_size} need {groups} groups, device allows {max_groups}"
            ))));
        }

        let shader = create_checked(device, "particle update shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Update Shader"),
                source: wgpu::ShaderSource::Wgsl(shader_source(workgroup_size).into()),
            })
        })?;

        let params_buffer = allocate_checked(device, "particle update params", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Particle Update Params"),
                size: std::mem::size_of::<ComputeParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: true,
            })
        })?;
        params_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::bytes_of(&ComputeParams::new(viewport, particle_count)));
        params_buffer.unmap();

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let (pipeline, bind_group) = create_checked(device, "particle update pipeline", || {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle Update Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(1),
                    storage_entry(2),
                ],
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particle Update Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: particles.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: vertices.as_entire_binding(),
                    },
                ],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Particle Update Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Particle Update Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("update_particles"),
                compilation_options: Default::default(),
                cache: None,
            });

            (pipeline, bind_group)
        })?;

        Ok(Self {
            pipeline,
            bind_group,
            params_buffer,
            particle_count,
            workgroup_size,
        })
    }

    /// Upload a new viewport. Takes effect for every later submission.
    pub fn set_viewport(&self, queue: &wgpu::Queue, viewport: ViewportSize) {
        let params = ComputeParams::new(viewport, self.particle_count);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    pub fn workgroups(&self) -> u32 {
        workgroup_count(self.particle_count, self.workgroup_size)
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Particle Update Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(self.workgroups(), 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_source_substitutes_workgroup_size() {
        assert!(SHADER_SOURCE.contains(WORKGROUP_SIZE_DECL));
        let source = shader_source(7);
        assert!(source.contains("const WORKGROUP_SIZE: u32 = 7u;"));
        assert!(!source.contains(WORKGROUP_SIZE_DECL));
    }
}

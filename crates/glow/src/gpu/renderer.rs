//! Frame orchestrator.
//!
//! Owns the particle buffer, the vertex buffer and the offscreen target for
//! the lifetime of the view. Two events drive it:
//!
//! - `on_resize`: reallocate the offscreen target and upload the new viewport.
//! - `on_tick`: build one command buffer (compute -> raster -> filters -> blit),
//!   submit it and present the drawable.
//!
//! A tick either submits a complete frame or nothing at all.

use rand::Rng;
use sim::{initialize, Particle, SimConfig, Vertex, ViewportSize};
use std::sync::Arc;
use wgpu::util::DeviceExt;

use super::compute::ParticleCompute;
use super::filters::{FilterChain, ScratchAllocator};
use super::raster::TriangleRaster;
use super::readback::{read_buffer, read_texture_rgba8};
use super::target::{can_copy_into, RenderTarget};
use super::{allocate_checked, is_device_lost, GpuError};

/// A drawable the frame's final copy lands in.
pub trait Presentable {
    fn texture(&self) -> &wgpu::Texture;

    /// Queue presentation once the submitted frame completes.
    fn present(self);
}

impl Presentable for wgpu::SurfaceTexture {
    fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn present(self) {
        wgpu::SurfaceTexture::present(self)
    }
}

/// Headless drawable: a plain texture that stays readable after presenting.
pub struct OffscreenSurface {
    pub texture: wgpu::Texture,
}

impl OffscreenSurface {
    pub fn new(device: &wgpu::Device, size: ViewportSize, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Surface"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self { texture }
    }
}

impl Presentable for &OffscreenSurface {
    fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn present(self) {}
}

/// Stages in the order a frame encodes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameStage {
    Compute,
    Raster,
    Filter(&'static str),
    Blit,
}

/// Why a tick did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The host had no drawable this refresh.
    NoSurface,
    /// The viewport is zero-sized (e.g. a minimised window).
    ZeroSizedViewport,
    /// The drawable cannot receive a copy of the offscreen target.
    IncompatibleSurface,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Presented { stages: Vec<FrameStage> },
    Skipped(SkipReason),
}

/// A fully encoded frame, ready to submit.
pub struct Frame {
    commands: wgpu::CommandBuffer,
    stages: Vec<FrameStage>,
}

impl Frame {
    pub fn stages(&self) -> &[FrameStage] {
        &self.stages
    }

    pub fn into_commands(self) -> wgpu::CommandBuffer {
        self.commands
    }
}

pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: SimConfig,
    format: wgpu::TextureFormat,
    viewport: ViewportSize,

    particle_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    target: RenderTarget,

    compute: ParticleCompute,
    raster: TriangleRaster,
    filters: FilterChain,

    frames_submitted: u64,
}

impl Renderer {
    /// Build the pipeline and seed `config.particle_count` particles from `rng`.
    pub fn new<R: Rng + ?Sized>(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        size: ViewportSize,
        format: wgpu::TextureFormat,
        config: SimConfig,
        rng: &mut R,
    ) -> Result<Self, GpuError> {
        config.validate()?;
        let particles = initialize(config.particle_count, size, &config, rng)?;
        Self::with_particles(device, queue, size, format, config, &particles)
    }

    /// Build the pipeline around an explicit particle set.
    ///
    /// `particles.len()` must equal `config.particle_count`.
    pub fn with_particles(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        size: ViewportSize,
        format: wgpu::TextureFormat,
        config: SimConfig,
        particles: &[Particle],
    ) -> Result<Self, GpuError> {
        config.validate()?;
        let viewport = size.validated()?;
        if particles.len() != config.particle_count as usize {
            return Err(GpuError::Config(sim::SimError::InvalidConfig(format!(
                "expected {} particles, got {}",
                config.particle_count,
                particles.len()
            ))));
        }

        let particle_buffer = allocate_checked(&device, "particle buffer", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particle Buffer"),
                contents: bytemuck::cast_slice(particles),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            })
        })?;

        let vertex_buffer = allocate_checked(&device, "vertex buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Vertex Buffer"),
                size: (config.vertex_count() as usize * std::mem::size_of::<Vertex>()) as u64,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let target = RenderTarget::new(&device, "Offscreen Target", viewport, format)?;

        let compute = ParticleCompute::new(
            &device,
            &particle_buffer,
            &vertex_buffer,
            config.particle_count,
            config.compute.workgroup_size,
            viewport,
        )?;
        let raster = TriangleRaster::new(&device, format, config.background, config.vertex_count(), viewport)?;
        let filters = FilterChain::new(&device, &config.filters)?;

        log::info!(
            "Renderer ready: {} particles, {}x{} {:?}, filters {:?}",
            config.particle_count,
            viewport.width,
            viewport.height,
            format,
            filters.stage_names()
        );

        Ok(Self {
            device,
            queue,
            config,
            format,
            viewport,
            particle_buffer,
            vertex_buffer,
            target,
            compute,
            raster,
            filters,
            frames_submitted: 0,
        })
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    /// Size of the offscreen target texture.
    pub fn target_size(&self) -> ViewportSize {
        self.target.size()
    }

    pub fn target_texture(&self) -> &wgpu::Texture {
        &self.target.texture
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn set_scratch_allocator(&mut self, allocator: Box<dyn ScratchAllocator>) {
        self.filters.set_allocator(allocator);
    }

    /// Reallocate the offscreen target for `size` and upload the new viewport.
    ///
    /// A zero-sized viewport is recorded and ticks skip until a real size
    /// arrives. On allocation failure the previous target and viewport stay.
    pub fn on_resize(&mut self, size: ViewportSize) -> Result<(), GpuError> {
        if size.is_empty() {
            log::debug!("Viewport collapsed to {}x{}", size.width, size.height);
            self.viewport = size;
            return Ok(());
        }

        if !self.target.matches(size, self.format) {
            self.target = RenderTarget::new(&self.device, "Offscreen Target", size, self.format)?;
            self.filters.invalidate();
        }

        self.compute.set_viewport(&self.queue, size);
        self.raster.set_viewport(&self.queue, size);
        self.viewport = size;
        log::debug!("Resized to {}x{}", size.width, size.height);
        Ok(())
    }

    /// Encode one frame: compute, raster, filters, then copy into `output`.
    pub fn encode_frame(&mut self, output: &wgpu::Texture) -> Result<Frame, GpuError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        let mut stages = Vec::with_capacity(6);

        self.compute.encode(&mut encoder);
        stages.push(FrameStage::Compute);

        self.raster.encode(&mut encoder, &self.target, &self.vertex_buffer);
        stages.push(FrameStage::Raster);

        for name in self.filters.encode(&self.device, &mut encoder, &mut self.target)? {
            stages.push(FrameStage::Filter(name));
        }

        let size = self.target.size();
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: output,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: size.width.min(output.width()),
                height: size.height.min(output.height()),
                depth_or_array_layers: 1,
            },
        );
        stages.push(FrameStage::Blit);

        Ok(Frame {
            commands: encoder.finish(),
            stages,
        })
    }

    /// Run one display refresh against `surface`.
    ///
    /// Transient unavailability returns `Ok(Skipped)`. An error means the
    /// frame was abandoned before submission; the next tick starts clean.
    pub fn on_tick<P: Presentable>(&mut self, surface: Option<P>) -> Result<TickOutcome, GpuError> {
        let Some(surface) = surface else {
            log::debug!("Tick skipped: no drawable");
            return Ok(TickOutcome::Skipped(SkipReason::NoSurface));
        };
        if is_device_lost() {
            return Err(GpuError::DeviceLost);
        }
        if self.viewport.is_empty() {
            log::debug!("Tick skipped: zero-sized viewport");
            return Ok(TickOutcome::Skipped(SkipReason::ZeroSizedViewport));
        }
        if !can_copy_into(surface.texture(), self.format) {
            log::debug!("Tick skipped: drawable {:?} not copy-compatible", surface.texture().format());
            return Ok(TickOutcome::Skipped(SkipReason::IncompatibleSurface));
        }

        let frame = match self.encode_frame(surface.texture()) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Abandoning frame {}: {}", self.frames_submitted, e);
                return Err(e);
            }
        };

        let stages = frame.stages().to_vec();
        self.queue.submit(std::iter::once(frame.into_commands()));
        surface.present();
        self.frames_submitted += 1;

        Ok(TickOutcome::Presented { stages })
    }

    /// Read the particle buffer back to the host. Blocks on the GPU.
    pub fn read_particles(&self) -> Result<Vec<Particle>, GpuError> {
        read_buffer(
            &self.device,
            &self.queue,
            &self.particle_buffer,
            self.config.particle_count as usize,
        )
    }

    /// Read the vertex buffer back to the host. Blocks on the GPU.
    pub fn read_vertices(&self) -> Result<Vec<Vertex>, GpuError> {
        read_buffer(
            &self.device,
            &self.queue,
            &self.vertex_buffer,
            self.config.vertex_count() as usize,
        )
    }

    /// Overwrite every vertex with `vertex`, e.g. a sentinel before a coverage check.
    pub fn fill_vertices(&self, vertex: Vertex) {
        let data = vec![vertex; self.config.vertex_count() as usize];
        self.queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&data));
    }

    /// Read the offscreen target as RGBA8. Blocks on the GPU.
    pub fn read_target_rgba8(&self) -> Result<Vec<u8>, GpuError> {
        read_texture_rgba8(&self.device, &self.queue, &self.target.texture)
    }
}

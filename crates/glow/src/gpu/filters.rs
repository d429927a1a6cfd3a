//! Post-filter chain: edge detect -> dilate -> blur.
//!
//! Every filter is a list of full-screen passes. Each pass reads the current
//! target and writes the scratch target, then the two are swapped, so after
//! the chain the caller's `RenderTarget` holds the filtered image. Filters
//! whose parameters make them the identity encode nothing.
//!
//! Pipelines are built per target format and rebuilt if the format changes;
//! the scratch target follows the target's size and format.

use sim::image::{blur_radius, blur_weights, dilate_offsets};
use sim::{FilterConfig, ViewportSize};
use wgpu::util::DeviceExt;

use super::params::FilterParams;
use super::target::RenderTarget;
use super::{allocate_checked, create_checked, GpuError};

/// Fragment entry point a pass runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKernel {
    Laplacian,
    AreaMax,
    Blur,
}

impl FilterKernel {
    fn entry_point(self) -> &'static str {
        match self {
            Self::Laplacian => "fs_laplacian",
            Self::AreaMax => "fs_area_max",
            Self::Blur => "fs_blur",
        }
    }
}

/// One full-screen pass with its immutable parameters.
pub struct FilterPass {
    kernel: FilterKernel,
    params_buffer: wgpu::Buffer,
}

impl FilterPass {
    fn new(device: &wgpu::Device, kernel: FilterKernel, params: FilterParams) -> Result<Self, GpuError> {
        let params_buffer = allocate_checked(device, "filter params", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Filter Params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        })?;
        Ok(Self { kernel, params_buffer })
    }
}

/// A GPU image operator. `apply(input) -> output` is realised as its passes.
pub trait GpuFilter {
    fn name(&self) -> &'static str;

    /// True when the filter would leave the image unchanged.
    fn is_identity(&self) -> bool;

    fn passes(&self) -> &[FilterPass];

    /// Tap weights bound at `@binding(2)`, if the passes read any.
    fn weights(&self) -> Option<&wgpu::Buffer> {
        None
    }
}

/// Laplacian edge detector with bias.
pub struct EdgeDetect {
    passes: Vec<FilterPass>,
}

impl EdgeDetect {
    pub fn new(device: &wgpu::Device, enabled: bool, bias: f32) -> Result<Self, GpuError> {
        let passes = if enabled {
            vec![FilterPass::new(device, FilterKernel::Laplacian, FilterParams::laplacian(bias))?]
        } else {
            Vec::new()
        };
        Ok(Self { passes })
    }
}

impl GpuFilter for EdgeDetect {
    fn name(&self) -> &'static str {
        "edge_detect"
    }

    fn is_identity(&self) -> bool {
        self.passes.is_empty()
    }

    fn passes(&self) -> &[FilterPass] {
        &self.passes
    }
}

/// Area maximum over a square window, as a horizontal then a vertical pass.
pub struct Dilate {
    passes: Vec<FilterPass>,
}

impl Dilate {
    pub fn new(device: &wgpu::Device, extent: u32) -> Result<Self, GpuError> {
        let passes = if extent <= 1 {
            Vec::new()
        } else {
            let taps = dilate_offsets(extent);
            vec![
                FilterPass::new(device, FilterKernel::AreaMax, FilterParams::directional([1, 0], taps))?,
                FilterPass::new(device, FilterKernel::AreaMax, FilterParams::directional([0, 1], taps))?,
            ]
        };
        Ok(Self { passes })
    }
}

impl GpuFilter for Dilate {
    fn name(&self) -> &'static str {
        "dilate"
    }

    fn is_identity(&self) -> bool {
        self.passes.is_empty()
    }

    fn passes(&self) -> &[FilterPass] {
        &self.passes
    }
}

/// Separable Gaussian blur.
pub struct Blur {
    passes: Vec<FilterPass>,
    weights: Option<wgpu::Buffer>,
}

impl Blur {
    pub fn new(device: &wgpu::Device, sigma: f32) -> Result<Self, GpuError> {
        let radius = blur_radius(sigma);
        if radius == 0 {
            return Ok(Self {
                passes: Vec::new(),
                weights: None,
            });
        }

        let weights = allocate_checked(device, "blur weights", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Blur Weights"),
                contents: bytemuck::cast_slice(&blur_weights(sigma)),
                usage: wgpu::BufferUsages::STORAGE,
            })
        })?;

        Ok(Self {
            passes: vec![
                FilterPass::new(device, FilterKernel::Blur, FilterParams::symmetric([1, 0], radius))?,
                FilterPass::new(device, FilterKernel::Blur, FilterParams::symmetric([0, 1], radius))?,
            ],
            weights: Some(weights),
        })
    }
}

impl GpuFilter for Blur {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn is_identity(&self) -> bool {
        self.passes.is_empty()
    }

    fn passes(&self) -> &[FilterPass] {
        &self.passes
    }

    fn weights(&self) -> Option<&wgpu::Buffer> {
        self.weights.as_ref()
    }
}

/// Supplies the scratch texture a pass writes into.
pub trait ScratchAllocator {
    fn allocate(
        &self,
        device: &wgpu::Device,
        size: ViewportSize,
        format: wgpu::TextureFormat,
    ) -> Result<RenderTarget, GpuError>;
}

/// Allocates scratch targets straight from the device.
pub struct DeviceScratchAllocator;

impl ScratchAllocator for DeviceScratchAllocator {
    fn allocate(
        &self,
        device: &wgpu::Device,
        size: ViewportSize,
        format: wgpu::TextureFormat,
    ) -> Result<RenderTarget, GpuError> {
        RenderTarget::new(device, "Filter Scratch Target", size, format)
    }
}

struct FilterPipelines {
    format: wgpu::TextureFormat,
    laplacian: wgpu::RenderPipeline,
    area_max: wgpu::RenderPipeline,
    blur: wgpu::RenderPipeline,
}

impl FilterPipelines {
    fn get(&self, kernel: FilterKernel) -> &wgpu::RenderPipeline {
        match kernel {
            FilterKernel::Laplacian => &self.laplacian,
            FilterKernel::AreaMax => &self.area_max,
            FilterKernel::Blur => &self.blur,
        }
    }
}

/// The three post filters in their fixed order.
pub struct FilterChain {
    filters: Vec<Box<dyn GpuFilter>>,
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: Option<FilterPipelines>,
    unit_weights: wgpu::Buffer,
    scratch: Option<RenderTarget>,
    allocator: Box<dyn ScratchAllocator>,
}

impl FilterChain {
    pub fn new(device: &wgpu::Device, config: &FilterConfig) -> Result<Self, GpuError> {
        let filters: Vec<Box<dyn GpuFilter>> = vec![
            Box::new(EdgeDetect::new(device, config.edge_detect, config.edge_bias)?),
            Box::new(Dilate::new(device, config.dilate_size)?),
            Box::new(Blur::new(device, config.blur_sigma)?),
        ];

        let shader = create_checked(device, "filter shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Filter Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/filters.wgsl").into()),
            })
        })?;

        let (bind_group_layout, pipeline_layout) = create_checked(device, "filter layout", || {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Filter Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Filter Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            (bind_group_layout, pipeline_layout)
        })?;

        let unit_weights = allocate_checked(device, "unit filter weights", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Unit Filter Weights"),
                contents: bytemuck::cast_slice(&[1.0f32]),
                usage: wgpu::BufferUsages::STORAGE,
            })
        })?;

        Ok(Self {
            filters,
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: None,
            unit_weights,
            scratch: None,
            allocator: Box::new(DeviceScratchAllocator),
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn is_identity(&self) -> bool {
        self.filters.iter().all(|f| f.is_identity())
    }

    pub fn set_allocator(&mut self, allocator: Box<dyn ScratchAllocator>) {
        self.allocator = allocator;
    }

    /// Drop the scratch target, e.g. after the main target was reallocated.
    pub fn invalidate(&mut self) {
        self.scratch = None;
    }

    fn build_pipelines(&self, device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<FilterPipelines, GpuError> {
        let build = |kernel: FilterKernel| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(kernel.entry_point()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.shader,
                    entry_point: Some(kernel.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        create_checked(device, "filter pipelines", || FilterPipelines {
            format,
            laplacian: build(FilterKernel::Laplacian),
            area_max: build(FilterKernel::AreaMax),
            blur: build(FilterKernel::Blur),
        })
    }

    /// Encode every non-identity filter against `target`, in order.
    ///
    /// On return `target` holds the filtered image. Returns the names of the
    /// filters that were encoded. A scratch allocation failure leaves the
    /// encoder partially recorded; the caller must drop it unsubmitted.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &mut RenderTarget,
    ) -> Result<Vec<&'static str>, GpuError> {
        if self.is_identity() {
            return Ok(Vec::new());
        }

        let format = target.format();
        if self.pipelines.as_ref().map(|p| p.format) != Some(format) {
            log::debug!("Building filter pipelines for {:?}", format);
            self.pipelines = Some(self.build_pipelines(device, format)?);
        }
        let Some(pipelines) = self.pipelines.as_ref() else {
            return Ok(Vec::new());
        };

        let mut scratch = match self.scratch.take() {
            Some(scratch) if scratch.matches(target.size(), format) => scratch,
            _ => self.allocator.allocate(device, target.size(), format)?,
        };

        let mut encoded = Vec::new();
        for filter in self.filters.iter().filter(|f| !f.is_identity()) {
            let weights = filter.weights().unwrap_or(&self.unit_weights);
            for pass in filter.passes() {
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Filter Bind Group"),
                    layout: &self.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&target.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: pass.params_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: weights.as_entire_binding(),
                        },
                    ],
                });

                {
                    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some(filter.name()),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &scratch.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    render_pass.set_pipeline(pipelines.get(pass.kernel));
                    render_pass.set_bind_group(0, &bind_group, &[]);
                    render_pass.draw(0..3, 0..1);
                }

                std::mem::swap(target, &mut scratch);
            }
            encoded.push(filter.name());
        }

        self.scratch = Some(scratch);
        Ok(encoded)
    }
}

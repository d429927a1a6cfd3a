use sim::ViewportSize;

use super::{allocate_checked, GpuError};

/// A 2D colour texture the frame renders into and the filters ping-pong between.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: ViewportSize,
    format: wgpu::TextureFormat,
}

impl RenderTarget {
    /// Render attachment for the raster pass and filter outputs, sampled by
    /// the filter inputs, copy source for the final blit and readback.
    pub const USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
        .union(wgpu::TextureUsages::TEXTURE_BINDING)
        .union(wgpu::TextureUsages::COPY_SRC)
        .union(wgpu::TextureUsages::COPY_DST);

    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        size: ViewportSize,
        format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        let size = size.validated()?;
        let texture = allocate_checked(device, label, || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: Self::USAGE,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            size,
            format,
        })
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn matches(&self, size: ViewportSize, format: wgpu::TextureFormat) -> bool {
        self.size == size && self.format == format
    }
}

/// Whether `texture` can receive a copy of a target with `format`.
///
/// Copies may differ only in sRGB-ness and need `COPY_DST` on the destination.
pub fn can_copy_into(texture: &wgpu::Texture, format: wgpu::TextureFormat) -> bool {
    texture.usage().contains(wgpu::TextureUsages::COPY_DST)
        && texture.format().remove_srgb_suffix() == format.remove_srgb_suffix()
}

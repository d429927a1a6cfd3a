//! Blocking GPU readback through mapped staging buffers.
//!
//! Used for diagnostics and tests: particle/vertex state and the final
//! texture contents. Not on the per-frame path.

use bytemuck::Pod;
use std::sync::mpsc;

use super::{allocate_checked, await_buffer_map, GpuError};

/// A single staging buffer with map tracking.
struct StagingBuffer {
    buffer: wgpu::Buffer,
    rx: Option<mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>>,
}

impl StagingBuffer {
    fn new(device: &wgpu::Device, label: &str, size: u64) -> Result<Self, GpuError> {
        let buffer = allocate_checked(device, "readback staging buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        Ok(Self { buffer, rx: None })
    }

    fn start_map(&mut self) {
        let (tx, rx) = mpsc::channel();
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.rx = Some(rx);
    }

    /// Block until the map completes and hand the mapped bytes to `read`.
    fn wait_and_read<T>(mut self, device: &wgpu::Device, read: impl FnOnce(&[u8]) -> T) -> Result<T, GpuError> {
        device.poll(wgpu::Maintain::Wait);
        let rx = self.rx.take().ok_or(GpuError::ChannelDisconnected)?;
        await_buffer_map(rx)?;
        let out = {
            let data = self.buffer.slice(..).get_mapped_range();
            read(&data)
        };
        self.buffer.unmap();
        Ok(out)
    }
}

/// Copy the first `count` elements of `source` back to the host.
///
/// `source` must have been created with `COPY_SRC`.
pub fn read_buffer<T: Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<T>, GpuError> {
    let byte_size = (count * std::mem::size_of::<T>()) as u64;
    if byte_size == 0 {
        return Ok(Vec::new());
    }

    let mut staging = StagingBuffer::new(device, "Readback Staging", byte_size)?;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Copy Encoder"),
    });
    encoder.copy_buffer_to_buffer(source, 0, &staging.buffer, 0, byte_size);
    queue.submit(std::iter::once(encoder.finish()));

    staging.start_map();
    staging.wait_and_read(device, |bytes| bytemuck::cast_slice::<u8, T>(bytes).to_vec())
}

/// Read a 4-byte-per-texel colour texture back as tightly packed RGBA8.
///
/// BGRA formats are swizzled to RGBA. `texture` must have `COPY_SRC`.
pub fn read_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>, GpuError> {
    let (width, height) = (texture.width(), texture.height());
    let unpadded_row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = unpadded_row.div_ceil(align) * align;

    let mut staging = StagingBuffer::new(device, "Texture Readback Staging", (padded_row * height) as u64)?;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging.buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let swizzle = matches!(
        texture.format(),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    );

    staging.start_map();
    staging.wait_and_read(device, |bytes| {
        let mut out = Vec::with_capacity((unpadded_row * height) as usize);
        for row in bytes.chunks_exact(padded_row as usize) {
            let row = &row[..unpadded_row as usize];
            if swizzle {
                for px in row.chunks_exact(4) {
                    out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            } else {
                out.extend_from_slice(row);
            }
        }
        out
    })
}

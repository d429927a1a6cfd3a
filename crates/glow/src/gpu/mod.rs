pub mod compute;
pub mod filters;
pub mod params;
pub mod raster;
pub mod readback;
pub mod renderer;
pub mod target;

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Global flag indicating GPU device was lost
static GPU_DEVICE_LOST: AtomicBool = AtomicBool::new(false);

/// Check if the GPU device has been lost
pub fn is_device_lost() -> bool {
    GPU_DEVICE_LOST.load(Ordering::SeqCst)
}

/// Reset the device lost flag (call after recreating device)
pub fn reset_device_lost() {
    GPU_DEVICE_LOST.store(false, Ordering::SeqCst);
}

/// Errors from GPU setup, allocation and readback.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Shader compilation or pipeline creation failed. Nothing can be drawn.
    #[error("{stage} setup failed: {message}")]
    Setup { stage: &'static str, message: String },

    /// Buffer or texture allocation failed.
    #[error("out of memory allocating {resource}")]
    OutOfMemory { resource: &'static str },

    /// The device rejected a buffer or texture, e.g. one past its size limits.
    #[error("{resource} rejected by device: {message}")]
    Allocation { resource: &'static str, message: String },

    #[error("no GPU adapter available")]
    NoAdapter,

    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface creation failed: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("GPU device lost")]
    DeviceLost,

    #[error("buffer map failed: {0:?}")]
    BufferMapFailed(wgpu::BufferAsyncError),

    #[error("buffer map channel disconnected")]
    ChannelDisconnected,

    #[error(transparent)]
    Config(#[from] sim::SimError),
}

/// Wait for a buffer map operation to complete, returning Result instead of panicking.
pub fn await_buffer_map(
    rx: std::sync::mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
) -> Result<(), GpuError> {
    if is_device_lost() {
        return Err(GpuError::DeviceLost);
    }
    match rx.recv() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("Buffer map failed: {:?}", e);
            Err(GpuError::BufferMapFailed(e))
        }
        Err(_) => {
            log::error!("Buffer map channel disconnected - possible device lost");
            GPU_DEVICE_LOST.store(true, Ordering::SeqCst);
            Err(GpuError::ChannelDisconnected)
        }
    }
}

/// Log uncaptured GPU errors and flag out-of-memory as device loss.
pub fn install_error_handler(device: &wgpu::Device) {
    device.on_uncaptured_error(Box::new(|error| {
        log::error!("GPU uncaptured error: {:?}", error);
        if matches!(error, wgpu::Error::OutOfMemory { .. }) {
            GPU_DEVICE_LOST.store(true, Ordering::SeqCst);
        }
    }));
}

/// Run `f` inside an error scope and return whatever the scope caught.
fn scoped<T>(device: &wgpu::Device, filter: wgpu::ErrorFilter, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(filter);
    let value = f();
    let error = pollster::block_on(device.pop_error_scope());
    (value, error)
}

/// Create shaders/pipelines, turning validation errors into [`GpuError::Setup`].
pub(crate) fn create_checked<T>(
    device: &wgpu::Device,
    stage: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    match scoped(device, wgpu::ErrorFilter::Validation, f) {
        (value, None) => Ok(value),
        (_, Some(error)) => {
            log::error!("{} setup failed: {}", stage, error);
            Err(GpuError::Setup {
                stage,
                message: error.to_string(),
            })
        }
    }
}

/// Allocate buffers/textures.
///
/// Out-of-memory becomes [`GpuError::OutOfMemory`]; a descriptor the device
/// rejects (size over a limit, bad usage) becomes [`GpuError::Allocation`].
pub(crate) fn allocate_checked<T>(
    device: &wgpu::Device,
    resource: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    let ((value, invalid), oom) = scoped(device, wgpu::ErrorFilter::OutOfMemory, || {
        scoped(device, wgpu::ErrorFilter::Validation, f)
    });
    if let Some(error) = oom {
        log::error!("Allocation of {} failed: {}", resource, error);
        return Err(GpuError::OutOfMemory { resource });
    }
    if let Some(error) = invalid {
        log::error!("Allocation of {} rejected: {}", resource, error);
        return Err(GpuError::Allocation {
            resource,
            message: error.to_string(),
        });
    }
    Ok(value)
}

/// Request a headless adapter and device.
///
/// Returns `Ok(None)` when the machine has no usable adapter.
pub async fn request_headless_device() -> Result<Option<(wgpu::Device, wgpu::Queue)>, GpuError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let Some(adapter) = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    else {
        return Ok(None);
    };

    log::info!("Using GPU: {:?}", adapter.get_info());

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Headless Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await?;

    install_error_handler(&device);
    reset_device_lost();
    Ok(Some((device, queue)))
}

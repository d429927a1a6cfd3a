//! Glow library crate - GPU particle pipeline and the winit host.
//!
//! Per frame: particle update (compute) -> triangle raster into an offscreen
//! target -> edge detect / dilate / blur -> copy to the drawable.

pub mod app;
pub mod gpu;

pub use gpu::renderer::{Frame, FrameStage, OffscreenSurface, Presentable, Renderer, SkipReason, TickOutcome};
pub use gpu::GpuError;

//! winit host for the renderer.
//!
//! Creates the window and surface, forwards resize and redraw events to
//! [`Renderer::on_resize`](crate::Renderer::on_resize) and
//! [`Renderer::on_tick`](crate::Renderer::on_tick), and redraws continuously.

pub mod context;
pub mod runner;

pub use context::GpuContext;
pub use runner::run;

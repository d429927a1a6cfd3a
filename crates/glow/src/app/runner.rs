use rand::rngs::StdRng;
use rand::SeedableRng;
use sim::{SimConfig, ViewportSize};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::Window,
};

use super::context::GpuContext;
use crate::gpu::renderer::{Renderer, TickOutcome};
use crate::gpu::GpuError;

/// Open a window and run the particle demo until it is closed.
pub fn run(config: SimConfig) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    let mut runner = AppRunner::new(config);
    event_loop.run_app(&mut runner)
}

struct AppRunner {
    config: SimConfig,
    window: Option<Arc<Window>>,
    ctx: Option<GpuContext>,
    renderer: Option<Renderer>,
}

impl AppRunner {
    fn new(config: SimConfig) -> Self {
        Self {
            config,
            window: None,
            ctx: None,
            renderer: None,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(ctx), Some(renderer)) = (&self.ctx, &mut self.renderer) else {
            return;
        };

        let surface = match ctx.surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                ctx.reconfigure();
                None
            }
            Err(wgpu::SurfaceError::Timeout) => None,
            Err(e) => {
                log::error!("Surface error: {}", e);
                event_loop.exit();
                return;
            }
        };

        match renderer.on_tick(surface) {
            Ok(TickOutcome::Presented { .. }) => {}
            Ok(TickOutcome::Skipped(reason)) => log::trace!("Frame skipped: {:?}", reason),
            Err(GpuError::DeviceLost) => {
                log::error!("GPU device lost, exiting");
                event_loop.exit();
            }
            Err(e) => log::error!("Frame dropped: {}", e),
        }
    }
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Glow")
                .with_inner_size(winit::dpi::LogicalSize::new(1024, 768)),
        ) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let ctx = match pollster::block_on(GpuContext::new(window.clone())) {
            Ok(ctx) => ctx,
            Err(e) => {
                log::error!("GPU init failed: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = ViewportSize::new(ctx.config.width, ctx.config.height);
        let renderer = Renderer::new(
            ctx.device.clone(),
            ctx.queue.clone(),
            size,
            ctx.surface_format(),
            self.config.clone(),
            &mut StdRng::from_entropy(),
        );

        match renderer {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.ctx = Some(ctx);
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("Renderer setup failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => {
                if let (Some(ctx), Some(renderer)) = (&mut self.ctx, &mut self.renderer) {
                    ctx.resize(size.width, size.height);
                    if let Err(e) = renderer.on_resize(ViewportSize::new(size.width, size.height)) {
                        log::error!("Resize failed: {}", e);
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.logical_key == Key::Named(NamedKey::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

// app.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey, PhysicalKey},
    window::{Window, WindowId},
};

use crate::renderer::{BatchRenderer, GpuContext, RendererError, RendererStats, WgpuBackend};
use crate::scene::{CameraController, Sandbox, SandboxTextures};
use crate::settings::RenderSettings;

const WINDOW_TITLE: &str = "Quad Batch Sandbox";
const STATS_INTERVAL: Duration = Duration::from_secs(1);

struct RenderState {
    window: Arc<Window>,
    renderer: BatchRenderer<WgpuBackend>,
    camera: CameraController,
    sandbox: Sandbox,
    last_frame: Instant,
    last_stats: Instant,
}

pub struct App {
    settings: RenderSettings,
    state: Option<RenderState>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            state: None,
        }
    }

    fn create_state(&self, window: Arc<Window>) -> Result<RenderState, RendererError> {
        let context = pollster::block_on(GpuContext::new(window.clone(), &self.settings))?;
        let mut backend = WgpuBackend::new(context);
        let textures = SandboxTextures::load(&mut backend);
        let aspect = backend.aspect_ratio();
        let renderer = BatchRenderer::init(backend, self.settings.batch_config())?;

        let now = Instant::now();
        Ok(RenderState {
            window,
            renderer,
            camera: CameraController::new(aspect),
            sandbox: Sandbox::new(textures),
            last_frame: now,
            last_stats: now,
        })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.renderer.shutdown();
        }
        event_loop.exit();
    }
}

impl RenderState {
    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.renderer.backend_mut().resize(size);
        self.camera.resize(size.width, size.height);
    }

    fn redraw(&mut self, clear_color: wgpu::Color) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.camera.update(dt);
        self.sandbox.update(dt);

        let backend = self.renderer.backend_mut();
        backend.set_view_proj(self.camera.camera().view_proj());
        backend.begin_frame(clear_color)?;

        self.sandbox.render(&mut self.renderer);

        self.renderer.backend_mut().end_frame();

        if now.duration_since(self.last_stats) >= STATS_INTERVAL {
            self.last_stats = now;
            self.report_stats(self.renderer.stats(), dt);
        }
        Ok(())
    }

    fn report_stats(&self, stats: RendererStats, dt: f32) {
        log::info!(
            "Quads: {} | Draw calls: {} | Frame: {:.2} ms",
            stats.quad_count,
            stats.draw_count,
            dt * 1000.0
        );
        self.window.set_title(&format!(
            "{WINDOW_TITLE} - Quads: {} Draws: {}",
            stats.quad_count, stats.draw_count
        ));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(resolution.width, resolution.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        match self.create_state(window) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Renderer initialisation failed: {}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let clear_color = self.settings.clear_color();
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if id != state.window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                state.resize(size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.window.inner_size();
                state.resize(size);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                state.camera.handle_scroll(delta);
            }
            WindowEvent::RedrawRequested => {
                match state.redraw(clear_color) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.renderer.backend_mut().reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Surface out of memory");
                        self.shutdown(event_loop);
                        return;
                    }
                    Err(err) => log::warn!("Skipping frame: {}", err),
                }
                state.window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.shutdown(event_loop);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                if !state.camera.handle_key(code, pressed) {
                    state.sandbox.handle_key(code, pressed);
                }
            }
            _ => {}
        }
    }
}

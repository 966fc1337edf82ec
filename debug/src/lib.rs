//! Shared harness for the debug programs: logging, a winit loop driving one Ember device, and an
//! offscreen path that saves the last frame as a PNG.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context as _};
use ember_bridge::{BridgeConfig, WgpuExecutor};
use ember_renderer::Context;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

/// A program drawn once per frame through the immediate-mode API.
pub trait Scene {
    /// Called once after the device exists (upload textures here).
    fn setup(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Draws one frame. `swap` is issued by the harness.
    fn frame(&mut self, ctx: &mut Context, size: (u32, u32), seconds: f32);

    fn key(&mut self, _key: &str) {}
}

/// `RUST_LOG` filtering, `info` by default.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

/// Turns the context's last error into an `anyhow::Error`.
pub fn check(ctx: &Context) -> anyhow::Result<()> {
    match ctx.error() {
        Some(e) => Err(anyhow!("{e}")),
        None => Ok(()),
    }
}

/// `--headless <out.png>` from the command line, if present.
pub fn headless_output() -> Option<String> {
    let mut args = std::env::args().skip_while(|a| a != "--headless");
    args.next()?;
    Some(args.next().unwrap_or_else(|| "frame.png".to_string()))
}

/// Renders `frames` frames offscreen and writes the last back buffer to `output`.
pub fn run_headless<S: Scene>(mut scene: S, size: (u32, u32), frames: u32, output: &Path) -> anyhow::Result<()> {
    let exec = WgpuExecutor::headless(size.0, size.1, BridgeConfig::default())?;
    let mut ctx = Context::new();
    if ctx.create(Box::new(exec)) == 0 {
        check(&ctx)?;
    }
    scene.setup(&mut ctx)?;
    for i in 0..frames.max(1) {
        scene.frame(&mut ctx, size, i as f32 / 60.0);
        ctx.swap();
        check(&ctx)?;
    }
    let exec = ctx.executor_as_mut::<WgpuExecutor>().context("bound executor is not wgpu")?;
    let pixels = exec.read_back_buffer()?;
    let image = image::RgbaImage::from_raw(size.0, size.1, pixels).context("back buffer size mismatch")?;
    image.save(output).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {}", output.display());
    Ok(())
}

/// Opens a window and redraws `scene` continuously until it is closed or Escape is pressed.
pub fn run_windowed<S: Scene>(title: &'static str, scene: S) -> anyhow::Result<()> {
    let event_loop = winit::event_loop::EventLoop::new()?;
    let mut app = App { title, scene, window: None, ctx: Context::new(), start: Instant::now(), failure: None };
    event_loop.run_app(&mut app)?;
    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App<S> {
    title: &'static str,
    scene: S,
    window: Option<Arc<Window>>,
    ctx: Context,
    start: Instant,
    failure: Option<anyhow::Error>,
}

impl<S: Scene> App<S> {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.title)
            .with_inner_size(winit::dpi::LogicalSize::new(800, 600));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let size = window.inner_size();
        let exec = WgpuExecutor::from_window(Arc::clone(&window), (size.width, size.height), BridgeConfig::default())?;
        if self.ctx.create(Box::new(exec)) == 0 {
            check(&self.ctx)?;
        }
        self.scene.setup(&mut self.ctx)?;
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        log::error!("{e:#}");
        self.failure = Some(e);
        event_loop.exit();
    }
}

impl<S: Scene> ApplicationHandler for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(physical) => {
                if let Some(exec) = self.ctx.executor_as_mut::<WgpuExecutor>() {
                    exec.resize(physical.width, physical.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => match &event.logical_key {
                Key::Named(NamedKey::Escape) => event_loop.exit(),
                Key::Character(c) => self.scene.key(c.as_str()),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                let Some(window) = &self.window else { return };
                let size = window.inner_size();
                let size = (size.width.max(1), size.height.max(1));
                self.scene.frame(&mut self.ctx, size, self.start.elapsed().as_secs_f32());
                self.ctx.swap();
                if let Some(e) = self.ctx.error() {
                    log::warn!("frame: {e}");
                    self.ctx.clear_error();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use catalog::Project;
use shaders::ShaderRegistry;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use tracing::{debug, error, info, warn};

use crate::app::{Showcase, ShowcaseOptions};
use crate::gpu::{Compositor, GpuContext, GpuFactory, LayerRegistry};
use crate::types::{Antialiasing, Viewport};

const LINE_SCROLL: f32 = 48.0;

/// Settings for the interactive window.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    /// Logical inner size.
    pub size: (u32, u32),
    pub antialias: Antialiasing,
    pub frame_interval: Duration,
    pub showcase: ShowcaseOptions,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "NeuraByte Labs".into(),
            size: (1280, 900),
            antialias: Antialiasing::default(),
            frame_interval: Duration::from_millis(16),
            showcase: ShowcaseOptions::default(),
        }
    }
}

/// GPU state and the page it draws. Field order is drop order: the page
/// releases its layers before the device and the window go away.
struct WindowState {
    showcase: Showcase,
    compositor: Compositor,
    context: GpuContext,
    window: Arc<Window>,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        projects: &[Project],
        registry: &ShaderRegistry,
        options: &WindowOptions,
    ) -> Result<Self> {
        let context = GpuContext::new(window.as_ref(), window.inner_size(), options.antialias)?;
        let layers = LayerRegistry::default();
        let layer_layout = crate::gpu::layer_layout(&context.device);
        let compositor = Compositor::new(&context, &layer_layout, layers.clone())?;
        let mut factory = GpuFactory::new(&context, layer_layout, layers);
        let showcase = Showcase::initialize(
            projects,
            registry,
            viewport_of(&window, window.inner_size()),
            &mut factory,
            options.showcase,
        );
        Ok(Self {
            showcase,
            compositor,
            context,
            window,
        })
    }

    fn scale(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>, now: Instant) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.showcase
            .window_resized(viewport_of(&self.window, new_size), now);
    }

    fn render(&mut self, now: Instant) -> Result<(), wgpu::SurfaceError> {
        self.showcase.poll(now);
        self.showcase.frame(now);
        self.compositor.render(&self.context, &self.showcase)
    }
}

fn viewport_of(window: &Window, size: PhysicalSize<u32>) -> Viewport {
    let scale = window.scale_factor() as f32;
    Viewport::new(
        size.width as f32 / scale,
        size.height as f32 / scale,
        scale,
    )
}

/// Opens the portfolio window and runs until it is closed.
pub fn run_window(
    projects: &[Project],
    registry: &ShaderRegistry,
    options: WindowOptions,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(LogicalSize::new(options.size.0, options.size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window.clone(), projects, registry, &options)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;
    info!(
        cards = state.showcase.report().cards,
        scenes = state.showcase.report().scenes,
        "window ready"
    );

    let frame_interval = options.frame_interval;
    let mut next_frame = Instant::now();
    window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                state.showcase.destroy();
                elwt.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let scale = state.scale();
                state
                    .showcase
                    .pointer_moved(position.x as f32 / scale, position.y as f32 / scale);
            }
            WindowEvent::CursorLeft { .. } => {
                state.showcase.pointer_left();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some((x, y)) = state.showcase.pointer_position() {
                    if let Some(slot) = state.showcase.click(x, y) {
                        match slot.url.as_deref() {
                            Some(url) => info!(id = %slot.id, url, "open project"),
                            None => debug!(id = %slot.id, "card action without url"),
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scale = state.scale();
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * LINE_SCROLL,
                    MouseScrollDelta::PixelDelta(position) => -(position.y as f32) / scale,
                };
                if state.showcase.scroll(delta) {
                    state.window.request_redraw();
                }
            }
            WindowEvent::Resized(new_size) => {
                state.resize(new_size, Instant::now());
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                match state.render(now) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.context.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("surface out of memory; closing window");
                        state.showcase.destroy();
                        elwt.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                    }
                    Err(other) => {
                        warn!("surface error: {other:?}; retrying next frame");
                    }
                }
                next_frame = now + frame_interval;
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if now >= next_frame {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else {
                elwt.set_control_flow(ControlFlow::WaitUntil(next_frame));
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

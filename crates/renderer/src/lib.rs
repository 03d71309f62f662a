//! Renderer crate for the NeuraByte Labs showcase.
//!
//! Every project card owns a small shader scene; a coordinator mounts the
//! cards, drives their frame loops and tears them down, and a particle field
//! animates behind the grid. The overall flow is:
//!
//! ```text
//!   labs CLI
//!      │ projects + ShaderRegistry
//!      ▼
//!   Showcase::initialize ──▶ SceneCoordinator ──▶ CardScene (one per card)
//!      │                            │                  │ CardUniforms
//!      │                            │                  ▼
//!      │                            └── FrameScheduler  SurfaceFactory
//!      └──▶ BackgroundController ──────────────────────▶ (gpu | headless)
//! ```
//!
//! Scenes never talk to wgpu directly. They draw through the
//! [`SurfaceFactory`] seam: the windowed path renders each card into an
//! offscreen layer that a compositor places on the window, while
//! [`headless`] records what would have been drawn so the whole lifecycle
//! can run without a GPU.

mod app;
mod background;
mod backend;
mod compile;
mod coordinator;
mod gpu;
pub mod headless;
mod input;
pub mod math;
mod page;
mod scene;
mod types;
mod uniforms;
mod window;

pub use app::{Showcase, ShowcaseOptions};
pub use background::{
    BackgroundController, ParticleField, FIELD_HALF_DEPTH, FIELD_HALF_HEIGHT, MIN_SPEED,
    PARTICLE_COUNT, ROTATION_STEP, SPEED_RANGE,
};
pub use backend::{
    CardSurface, CardSurfaceDescriptor, ParticleSurface, ParticleSurfaceDescriptor, SurfaceFactory,
};
pub use coordinator::{
    CardFailure, CardRecord, FailureKind, InitReport, SceneCoordinator, RESIZE_DEBOUNCE,
};
pub use input::InputPort;
pub use page::{
    CardContainer, CardMount, CardSlot, GridLayout, PointerRouter, CARD_GAP, CARD_WIDTH,
    CONTENT_HEIGHT, HEADER_HEIGHT, PAGE_PADDING, SHADER_HEIGHT,
};
pub use scene::{
    CardScene, FrameOutcome, SceneError, SceneOptions, SceneState, CLICK_DECAY, CLICK_FLOOR,
    HOVER_SMOOTHING, IDLE_TIME_SCALE,
};
pub use types::{
    clamp_pixel_ratio, Antialiasing, LayoutBox, SurfaceGeometry, SurfaceHandle, SurfaceSize,
    Viewport, DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH, MAX_PIXEL_RATIO,
};
pub use uniforms::{BackgroundUniforms, CardUniforms};
pub use window::{run_window, WindowOptions};

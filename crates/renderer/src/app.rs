//! The whole portfolio page: card grid, scenes and background wired together
//! behind the handful of events a window host forwards.

use std::time::Instant;

use catalog::Project;
use shaders::ShaderRegistry;
use tracing::{debug, info, warn};

use crate::background::BackgroundController;
use crate::backend::SurfaceFactory;
use crate::coordinator::{InitReport, SceneCoordinator};
use crate::page::{CardSlot, GridLayout, PointerRouter};
use crate::scene::SceneOptions;
use crate::types::Viewport;

#[derive(Debug, Clone, Copy)]
pub struct ShowcaseOptions {
    pub background: bool,
    /// Seed for the particle field; random when unset.
    pub seed: Option<u64>,
    pub card: SceneOptions,
}

impl Default for ShowcaseOptions {
    fn default() -> Self {
        Self {
            background: true,
            seed: None,
            card: SceneOptions::default(),
        }
    }
}

pub struct Showcase {
    layout: GridLayout,
    pointer: PointerRouter,
    report: InitReport,
    background: Option<BackgroundController>,
    coordinator: SceneCoordinator,
}

impl Showcase {
    /// Lays out one card per project and starts their scenes. A background
    /// that cannot be created is logged and left out.
    pub fn initialize(
        projects: &[Project],
        registry: &ShaderRegistry,
        viewport: Viewport,
        factory: &mut dyn SurfaceFactory,
        options: ShowcaseOptions,
    ) -> Self {
        let mut layout = GridLayout::new(viewport);
        let mut coordinator = SceneCoordinator::new(options.card);
        let report = coordinator.initialize(projects, registry, Some(&mut layout), factory);

        let background = if options.background {
            match BackgroundController::new(viewport.surface_size(), factory, options.seed) {
                Ok(background) => Some(background),
                Err(err) => {
                    warn!("background disabled: {err:#}");
                    None
                }
            }
        } else {
            debug!("background disabled by configuration");
            None
        };

        info!(
            cards = report.cards,
            scenes = report.scenes,
            background = background.is_some(),
            "showcase ready"
        );

        Self {
            layout,
            pointer: PointerRouter::default(),
            report,
            background,
            coordinator,
        }
    }

    pub fn report(&self) -> &InitReport {
        &self.report
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn coordinator(&self) -> &SceneCoordinator {
        &self.coordinator
    }

    pub fn background(&self) -> Option<&BackgroundController> {
        self.background.as_ref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.pointer.hovered()
    }

    /// Last pointer position in page coordinates, while over the window.
    pub fn pointer_position(&self) -> Option<(f32, f32)> {
        self.pointer.position()
    }

    /// Draws the background and every due card. Returns the card draw count.
    pub fn frame(&mut self, now: Instant) -> usize {
        if let Some(background) = self.background.as_mut() {
            background.frame();
        }
        self.coordinator.frame(now)
    }

    /// The layout and background follow the window at once; card scenes
    /// are resized after the debounce delay.
    pub fn window_resized(&mut self, viewport: Viewport, now: Instant) {
        self.layout.relayout(viewport);
        if let Some(background) = self.background.as_mut() {
            background.resize(viewport.surface_size());
        }
        self.coordinator.request_resize(now);
        self.pointer.refresh(&self.layout, &mut self.coordinator);
    }

    /// Fires pending timers. Returns `true` when card scenes were resized.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.coordinator.poll(now)
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer
            .pointer_moved(&self.layout, &mut self.coordinator, x, y);
    }

    pub fn pointer_left(&mut self) {
        self.pointer.pointer_left(&mut self.coordinator);
    }

    /// Returns the card whose action link was clicked, if any.
    pub fn click(&mut self, x: f32, y: f32) -> Option<&CardSlot> {
        self.pointer.click(&self.layout, &mut self.coordinator, x, y)
    }

    /// Scrolling only moves the shader areas. Scenes read their box on each
    /// pointer move, so no resize is needed.
    pub fn scroll(&mut self, delta: f32) -> bool {
        if !self.layout.scroll_by(delta) {
            return false;
        }
        self.pointer.refresh(&self.layout, &mut self.coordinator);
        true
    }

    pub fn destroy(&mut self) {
        self.pointer.pointer_left(&mut self.coordinator);
        self.coordinator.destroy();
        if let Some(mut background) = self.background.take() {
            background.dispose();
        }
    }
}

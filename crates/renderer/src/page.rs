//! The page around the scenes: where cards sit, which card the pointer is
//! over, and where each card's action link is.

use catalog::{Project, ProjectStatus, Rgba};
use tracing::debug;

use crate::coordinator::SceneCoordinator;
use crate::types::{LayoutBox, SurfaceHandle, Viewport};

pub const CARD_WIDTH: f32 = 340.0;
/// Height of the shader area at the top of every card.
pub const SHADER_HEIGHT: f32 = 180.0;
/// Height of the text area under the shader.
pub const CONTENT_HEIGHT: f32 = 200.0;
pub const CARD_GAP: f32 = 32.0;
pub const PAGE_PADDING: f32 = 48.0;
pub const HEADER_HEIGHT: f32 = 160.0;

const ACTION_WIDTH: f32 = 112.0;
const ACTION_HEIGHT: f32 = 32.0;
const ACTION_INSET: f32 = 20.0;
const BADGE_WIDTH: f32 = 64.0;
const BADGE_HEIGHT: f32 = 20.0;
const FALLBACK_ACCENT: Rgba = Rgba([0.27, 0.27, 0.33, 1.0]);

/// What mounting a card produced.
#[derive(Debug, Clone)]
pub struct CardMount {
    pub surface: Option<SurfaceHandle>,
    pub has_action: bool,
}

/// Mounting point for cards. The page adapter decides where a card lives and
/// hands back the surface its scene should draw into.
pub trait CardContainer {
    fn mount(&mut self, project: &Project, index: usize) -> CardMount;
}

/// One mounted card as the page sees it.
#[derive(Debug, Clone)]
pub struct CardSlot {
    pub id: String,
    pub index: usize,
    pub status: ProjectStatus,
    pub url: Option<String>,
    pub accent: (Rgba, Rgba),
    pub surface: SurfaceHandle,
    bounds: LayoutBox,
    has_action: bool,
}

impl CardSlot {
    pub fn bounds(&self) -> LayoutBox {
        self.bounds
    }

    pub fn shader_area(&self) -> LayoutBox {
        self.surface.layout()
    }

    /// The action link rectangle, present only for projects with a url.
    pub fn action(&self) -> Option<LayoutBox> {
        if !self.has_action {
            return None;
        }
        Some(LayoutBox::new(
            self.bounds.right() - ACTION_INSET - ACTION_WIDTH,
            self.bounds.bottom() - ACTION_INSET - ACTION_HEIGHT,
            ACTION_WIDTH,
            ACTION_HEIGHT,
        ))
    }

    pub fn badge(&self) -> LayoutBox {
        LayoutBox::new(
            self.bounds.left + ACTION_INSET,
            self.bounds.top + SHADER_HEIGHT + ACTION_INSET,
            BADGE_WIDTH,
            BADGE_HEIGHT,
        )
    }
}

/// Responsive grid of fixed-width cards under a page header.
#[derive(Debug)]
pub struct GridLayout {
    viewport: Viewport,
    scroll: f32,
    slots: Vec<CardSlot>,
}

impl GridLayout {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            scroll: 0.0,
            slots: Vec::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn slots(&self) -> &[CardSlot] {
        &self.slots
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    pub fn columns(&self) -> usize {
        let usable = self.viewport.width - 2.0 * PAGE_PADDING + CARD_GAP;
        ((usable / (CARD_WIDTH + CARD_GAP)).floor() as usize).max(1)
    }

    fn card_width(&self) -> f32 {
        CARD_WIDTH.min((self.viewport.width - 2.0 * PAGE_PADDING).max(0.0))
    }

    pub fn content_height(&self) -> f32 {
        let rows = self.slots.len().div_ceil(self.columns());
        let rows_height = rows as f32 * (SHADER_HEIGHT + CONTENT_HEIGHT + CARD_GAP);
        HEADER_HEIGHT + rows_height + PAGE_PADDING
    }

    fn max_scroll(&self) -> f32 {
        (self.content_height() - self.viewport.height).max(0.0)
    }

    fn card_bounds(&self, index: usize) -> LayoutBox {
        let columns = self.columns();
        let width = self.card_width();
        let grid_width = columns as f32 * width + (columns as f32 - 1.0) * CARD_GAP;
        let left_margin = ((self.viewport.width - grid_width) * 0.5).max(0.0);
        let column = index % columns;
        let row = index / columns;
        LayoutBox::new(
            left_margin + column as f32 * (width + CARD_GAP),
            HEADER_HEIGHT + row as f32 * (SHADER_HEIGHT + CONTENT_HEIGHT + CARD_GAP) - self.scroll,
            width,
            SHADER_HEIGHT + CONTENT_HEIGHT,
        )
    }

    fn place(&mut self) {
        let bounds: Vec<_> = (0..self.slots.len())
            .map(|index| self.card_bounds(index))
            .collect();
        let ratio = self.viewport.scale_factor;
        for (slot, bounds) in self.slots.iter_mut().zip(bounds) {
            slot.bounds = bounds;
            slot.surface.set_layout(LayoutBox::new(
                bounds.left,
                bounds.top,
                bounds.width,
                SHADER_HEIGHT,
            ));
            slot.surface.set_device_pixel_ratio(ratio);
        }
    }

    /// Reflows every card for a new viewport. Surfaces see the new boxes
    /// immediately; scenes pick them up on their next resize.
    pub fn relayout(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.scroll = self.scroll.min(self.max_scroll());
        self.place();
        debug!(
            width = viewport.width,
            height = viewport.height,
            columns = self.columns(),
            "page relayout"
        );
    }

    /// Scrolls by `delta` logical units, clamped to the content. Returns
    /// whether the offset changed.
    pub fn scroll_by(&mut self, delta: f32) -> bool {
        let next = (self.scroll + delta).clamp(0.0, self.max_scroll());
        if next == self.scroll {
            return false;
        }
        self.scroll = next;
        self.place();
        true
    }

    pub fn card_at(&self, x: f32, y: f32) -> Option<&CardSlot> {
        self.slots.iter().find(|slot| slot.bounds.contains(x, y))
    }

    pub fn action_at(&self, x: f32, y: f32) -> Option<&CardSlot> {
        self.slots
            .iter()
            .find(|slot| slot.action().is_some_and(|action| action.contains(x, y)))
    }
}

impl CardContainer for GridLayout {
    fn mount(&mut self, project: &Project, index: usize) -> CardMount {
        let bounds = self.card_bounds(index);
        let surface = SurfaceHandle::new(
            LayoutBox::new(bounds.left, bounds.top, bounds.width, SHADER_HEIGHT),
            self.viewport.scale_factor,
        );
        let accent = (
            project.color.primary().unwrap_or(FALLBACK_ACCENT),
            project.color.secondary().unwrap_or(FALLBACK_ACCENT),
        );
        let has_action = project.has_link();
        self.slots.push(CardSlot {
            id: project.id.clone(),
            index,
            status: project.status,
            url: project.url.clone().filter(|_| has_action),
            accent,
            surface: surface.clone(),
            bounds,
            has_action,
        });
        CardMount {
            surface: Some(surface),
            has_action,
        }
    }
}

/// Turns raw pointer positions into enter/leave/move calls on the card under
/// the pointer.
#[derive(Debug, Default)]
pub struct PointerRouter {
    hovered: Option<String>,
    position: Option<(f32, f32)>,
}

impl PointerRouter {
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    pub fn pointer_moved(
        &mut self,
        layout: &GridLayout,
        coordinator: &mut SceneCoordinator,
        x: f32,
        y: f32,
    ) {
        self.position = Some((x, y));
        let target = layout.card_at(x, y).map(|slot| slot.id.clone());
        if target != self.hovered {
            if let Some(previous) = self.hovered.take() {
                if let Some(input) = coordinator.input(&previous) {
                    input.on_pointer_leave();
                }
            }
            if let Some(id) = target.as_deref() {
                if let Some(input) = coordinator.input(id) {
                    input.on_pointer_enter();
                }
            }
            self.hovered = target;
        }
        if let Some(id) = self.hovered.as_deref() {
            if let Some(input) = coordinator.input(id) {
                input.on_pointer_move(x, y);
            }
        }
    }

    pub fn pointer_left(&mut self, coordinator: &mut SceneCoordinator) {
        self.position = None;
        if let Some(previous) = self.hovered.take() {
            if let Some(input) = coordinator.input(&previous) {
                input.on_pointer_leave();
            }
        }
    }

    /// Re-evaluates hover after the layout moved under a still pointer.
    pub fn refresh(&mut self, layout: &GridLayout, coordinator: &mut SceneCoordinator) {
        if let Some((x, y)) = self.position {
            self.pointer_moved(layout, coordinator, x, y);
        }
    }

    /// Handles a click. When it lands on a card's action link the card's
    /// scene is pulsed and the slot is returned.
    pub fn click<'a>(
        &mut self,
        layout: &'a GridLayout,
        coordinator: &mut SceneCoordinator,
        x: f32,
        y: f32,
    ) -> Option<&'a CardSlot> {
        let slot = layout.action_at(x, y)?;
        if let Some(input) = coordinator.input(&slot.id) {
            input.on_action_triggered();
        }
        Some(slot)
    }
}

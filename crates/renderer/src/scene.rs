//! One shader-backed card surface and its animation state.
//!
//! `CardScene` never schedules itself. The coordinator's frame scheduler
//! calls [`CardScene::frame`] once per tick with the elapsed time, and the
//! scene answers with what it did. Pointer events arrive through
//! [`InputPort`].

use shaders::ShaderProgram;
use tracing::{debug, warn};

use crate::backend::{CardSurface, CardSurfaceDescriptor, SurfaceFactory};
use crate::input::InputPort;
use crate::math::{self, Mat4};
use crate::types::{LayoutBox, SurfaceHandle, SurfaceSize};
use crate::uniforms::CardUniforms;

/// Fraction of the remaining hover distance covered per frame.
pub const HOVER_SMOOTHING: f32 = 0.1;
/// Per-frame multiplier applied to the click pulse.
pub const CLICK_DECAY: f32 = 0.92;
/// Click pulses at or below this snap to zero.
pub const CLICK_FLOOR: f32 = 0.01;
/// Shader time advances at this rate while the card is not hovered.
pub const IDLE_TIME_SCALE: f64 = 0.2;

const CAMERA_DISTANCE: f32 = 1.0;
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to initialise surface for '{id}'")]
    SurfaceInit {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Interaction and time state of one card, independent of any backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneState {
    pub hovered: bool,
    pub target_hover: f32,
    pub current_hover: f32,
    pub pointer: [f32; 2],
    pub click_pulse: f32,
    pub elapsed: f64,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            hovered: false,
            target_hover: 0.0,
            current_hover: 0.0,
            pointer: [0.5, 0.5],
            click_pulse: 0.0,
            elapsed: 0.0,
        }
    }
}

impl SceneState {
    pub fn pointer_enter(&mut self) {
        self.hovered = true;
        self.target_hover = 1.0;
    }

    pub fn pointer_leave(&mut self) {
        self.hovered = false;
        self.target_hover = 0.0;
    }

    /// Normalises a page position against `layout`: X grows right, Y grows
    /// up from the bottom edge. Positions outside the box are clamped.
    pub fn pointer_move(&mut self, layout: &LayoutBox, x: f32, y: f32) {
        if layout.width <= 0.0 || layout.height <= 0.0 {
            return;
        }
        let u = (x - layout.left) / layout.width;
        let v = 1.0 - (y - layout.top) / layout.height;
        self.pointer = [u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)];
    }

    pub fn trigger_click(&mut self) {
        self.click_pulse = 1.0;
    }

    pub fn time_scale(&self) -> f64 {
        if self.hovered {
            1.0
        } else {
            IDLE_TIME_SCALE
        }
    }

    /// One frame of smoothing, decay and time accrual.
    pub fn advance(&mut self, delta_seconds: f64) {
        self.current_hover += (self.target_hover - self.current_hover) * HOVER_SMOOTHING;
        if self.click_pulse > CLICK_FLOOR {
            self.click_pulse *= CLICK_DECAY;
        } else {
            self.click_pulse = 0.0;
        }
        self.elapsed += delta_seconds.max(0.0) * self.time_scale();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SceneOptions {
    pub antialias: bool,
    pub transparent: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            transparent: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The scene was stopped or disposed; nothing happened.
    Skipped,
    Drawn,
    /// State advanced but the backend rejected the draw.
    DrawFailed,
}

pub struct CardScene {
    id: String,
    surface: SurfaceHandle,
    backend: Option<Box<dyn CardSurface>>,
    state: SceneState,
    size: SurfaceSize,
    projection: Mat4,
    model_view: Mat4,
    running: bool,
    frames: u64,
}

impl CardScene {
    pub fn new(
        id: impl Into<String>,
        surface: SurfaceHandle,
        program: &ShaderProgram,
        factory: &mut dyn SurfaceFactory,
        options: SceneOptions,
    ) -> Result<Self, SceneError> {
        let id = id.into();
        let size = surface.size();
        let descriptor = CardSurfaceDescriptor {
            id: &id,
            size,
            vertex_source: &program.vertex,
            fragment_source: &program.fragment,
            antialias: options.antialias,
            transparent: options.transparent,
        };
        let backend = factory
            .create_card_surface(&descriptor)
            .map_err(|source| SceneError::SurfaceInit {
                id: id.clone(),
                source,
            })?;

        let projection = math::orthographic(-0.5, 0.5, -0.5, 0.5, CAMERA_NEAR, CAMERA_FAR);
        let model_view = math::translation(0.0, 0.0, -CAMERA_DISTANCE);
        debug!(id = %id, width = size.width, height = size.height, "card scene created");

        Ok(Self {
            id,
            surface,
            backend: Some(backend),
            state: SceneState::default(),
            size,
            projection,
            model_view,
            running: false,
            frames: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_disposed(&self) -> bool {
        self.backend.is_none()
    }

    /// Starts the frame loop. Returns `false` if it was already running or
    /// the scene has been disposed.
    pub fn start(&mut self) -> bool {
        if self.running || self.is_disposed() {
            return false;
        }
        self.running = true;
        true
    }

    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn update(&mut self, delta_seconds: f64) {
        self.state.advance(delta_seconds);
    }

    pub fn uniforms(&self) -> CardUniforms {
        let (width, height) = self.size.physical();
        CardUniforms {
            projection: self.projection,
            model_view: self.model_view,
            time: self.state.elapsed as f32,
            hover: self.state.current_hover,
            click: self.state.click_pulse,
            _padding0: 0.0,
            mouse: self.state.pointer,
            resolution: [width as f32, height as f32],
        }
    }

    /// Runs one scheduled tick. A tick that arrives after `stop` or `dispose`
    /// does nothing.
    pub fn frame(&mut self, delta_seconds: f64) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Skipped;
        }
        self.update(delta_seconds);
        let uniforms = self.uniforms();
        let Some(backend) = self.backend.as_mut() else {
            return FrameOutcome::Skipped;
        };
        backend.write_uniforms(&uniforms);
        self.frames += 1;
        match backend.draw() {
            Ok(()) => FrameOutcome::Drawn,
            Err(err) => {
                warn!(id = %self.id, "card draw failed: {err:#}");
                FrameOutcome::DrawFailed
            }
        }
    }

    /// Re-reads the layout box and forwards the new size to the backend.
    pub fn resize(&mut self) -> SurfaceSize {
        self.size = self.surface.size();
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(self.size);
        }
        self.size
    }

    /// Stops the loop and releases mesh, program and context in that order.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut backend) = self.backend.take() {
            backend.dispose_geometry();
            backend.dispose_material();
            backend.dispose_context();
            debug!(id = %self.id, frames = self.frames, "card scene disposed");
        }
    }
}

impl InputPort for CardScene {
    fn on_pointer_enter(&mut self) {
        self.state.pointer_enter();
    }

    fn on_pointer_leave(&mut self) {
        self.state.pointer_leave();
    }

    fn on_pointer_move(&mut self, x: f32, y: f32) {
        let layout = self.surface.layout();
        self.state.pointer_move(&layout, x, y);
    }

    fn on_action_triggered(&mut self) {
        self.state.trigger_click();
    }
}

impl Drop for CardScene {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessFactory, SurfaceEvent};
    use shaders::ShaderRegistry;

    fn scene_with(layout: LayoutBox, dpr: f32) -> (CardScene, HeadlessFactory, SurfaceHandle) {
        let mut factory = HeadlessFactory::new();
        let surface = SurfaceHandle::new(layout, dpr);
        let program = ShaderRegistry::builtin().get("oracle").unwrap();
        let scene = CardScene::new(
            "oracle",
            surface.clone(),
            &program,
            &mut factory,
            SceneOptions::default(),
        )
        .expect("scene");
        (scene, factory, surface)
    }

    fn scene() -> (CardScene, HeadlessFactory) {
        let (scene, factory, _) = scene_with(LayoutBox::new(0.0, 0.0, 340.0, 180.0), 1.0);
        (scene, factory)
    }

    #[test]
    fn click_pulse_decays_to_exact_zero_and_stays() {
        let mut state = SceneState::default();
        state.trigger_click();
        let mut expected = 1.0_f32;
        let mut frames = 0;
        while state.click_pulse > 0.0 {
            state.advance(0.016);
            expected = if expected > CLICK_FLOOR {
                expected * CLICK_DECAY
            } else {
                0.0
            };
            assert_eq!(state.click_pulse, expected);
            assert!((0.0..=1.0).contains(&state.click_pulse));
            frames += 1;
            assert!(frames < 200, "pulse never reached zero");
        }
        for _ in 0..10 {
            state.advance(0.016);
            assert_eq!(state.click_pulse, 0.0);
        }
    }

    #[test]
    fn click_pulse_tracks_geometric_decay() {
        let mut state = SceneState::default();
        state.trigger_click();
        for k in 1..=20 {
            state.advance(0.016);
            let closed_form = CLICK_DECAY.powi(k);
            assert!((state.click_pulse - closed_form).abs() < 1e-5, "frame {k}");
        }
    }

    #[test]
    fn hover_converges_without_overshoot() {
        for start in [0.0_f32, 0.25, 0.5, 0.9, 1.0] {
            for enter in [true, false] {
                let mut state = SceneState {
                    current_hover: start,
                    ..SceneState::default()
                };
                if enter {
                    state.pointer_enter();
                } else {
                    state.pointer_leave();
                }
                let target = state.target_hover;
                let mut previous_gap = (target - state.current_hover).abs();
                for _ in 0..300 {
                    state.advance(0.016);
                    let gap = (target - state.current_hover).abs();
                    assert!(gap <= previous_gap);
                    assert!((0.0..=1.0).contains(&state.current_hover));
                    if enter {
                        assert!(state.current_hover <= 1.0);
                    } else {
                        assert!(state.current_hover >= 0.0);
                    }
                    previous_gap = gap;
                }
                assert!(previous_gap < 1e-6);
            }
        }
    }

    #[test]
    fn hovered_time_accrues_five_times_faster() {
        let deltas = [0.016, 0.017, 0.033, 0.008, 0.1, 0.016];
        let mut idle = SceneState::default();
        let mut hovered = SceneState::default();
        hovered.pointer_enter();
        for delta in deltas {
            idle.advance(delta);
            hovered.advance(delta);
        }
        let ratio = hovered.elapsed / idle.elapsed;
        assert!((ratio - 5.0).abs() < 1e-9, "ratio {ratio}");
    }

    #[test]
    fn pointer_corners_are_y_inverted() {
        let layout = LayoutBox::new(100.0, 50.0, 340.0, 180.0);
        let mut state = SceneState::default();
        state.pointer_move(&layout, 100.0, 50.0);
        assert_eq!(state.pointer, [0.0, 1.0]);
        state.pointer_move(&layout, 440.0, 230.0);
        assert_eq!(state.pointer, [1.0, 0.0]);
        state.pointer_move(&layout, 270.0, 140.0);
        assert_eq!(state.pointer, [0.5, 0.5]);
        state.pointer_move(&layout, 0.0, 400.0);
        assert_eq!(state.pointer, [0.0, 0.0]);
    }

    #[test]
    fn input_port_routes_through_surface_layout() {
        let (mut scene, _factory, surface) =
            scene_with(LayoutBox::new(20.0, 30.0, 200.0, 100.0), 1.0);
        scene.on_pointer_enter();
        assert!(scene.state().hovered);
        surface.set_layout(LayoutBox::new(0.0, 0.0, 200.0, 100.0));
        scene.on_pointer_move(0.0, 0.0);
        assert_eq!(scene.state().pointer, [0.0, 1.0]);
        scene.on_action_triggered();
        assert_eq!(scene.state().click_pulse, 1.0);
        scene.on_pointer_leave();
        assert!(!scene.state().hovered);
        assert_eq!(scene.state().target_hover, 0.0);
    }

    #[test]
    fn start_is_idempotent_and_frames_require_running() {
        let (mut scene, factory) = scene();
        let log = factory.log();
        assert_eq!(scene.frame(0.016), FrameOutcome::Skipped);
        assert!(scene.start());
        assert!(!scene.start());
        assert_eq!(scene.frame(0.016), FrameOutcome::Drawn);
        assert_eq!(log.draw_count("oracle"), 1);
        assert!(scene.stop());
        assert!(!scene.stop());
        assert_eq!(scene.frame(0.016), FrameOutcome::Skipped);
        assert_eq!(log.draw_count("oracle"), 1);
    }

    #[test]
    fn frame_pushes_state_into_uniforms() {
        let (mut scene, factory) = scene();
        let log = factory.log();
        scene.start();
        scene.on_pointer_enter();
        scene.on_action_triggered();
        scene.frame(0.5);
        let uniforms = log.last_uniforms("oracle").expect("uniforms");
        assert_eq!(uniforms.time, 0.5);
        assert!((uniforms.hover - 0.1).abs() < 1e-6);
        assert!((uniforms.click - 0.92).abs() < 1e-6);
        assert_eq!(uniforms.resolution, [340.0, 180.0]);
    }

    #[test]
    fn resize_is_idempotent_and_keeps_running_state() {
        let (mut scene, factory, surface) =
            scene_with(LayoutBox::new(0.0, 0.0, 300.0, 150.0), 3.0);
        let log = factory.log();
        scene.start();
        surface.set_layout(LayoutBox::new(0.0, 0.0, 0.0, 90.0));
        let first = scene.resize();
        let second = scene.resize();
        assert_eq!(first, second);
        assert_eq!(first.width, 340.0);
        assert_eq!(first.physical(), (680, 180));
        assert!(scene.is_running());
        assert_eq!(log.resizes("oracle"), vec![(680, 180), (680, 180)]);
    }

    #[test]
    fn dispose_releases_in_order_and_silences_frames() {
        let (mut scene, factory) = scene();
        let log = factory.log();
        scene.start();
        scene.frame(0.016);
        let writes_before = log.uniform_writes("oracle").len();
        scene.dispose();
        assert!(!scene.is_running());
        assert!(!scene.start());
        for _ in 0..5 {
            assert_eq!(scene.frame(0.016), FrameOutcome::Skipped);
        }
        assert_eq!(log.uniform_writes("oracle").len(), writes_before);
        assert_eq!(log.draw_count("oracle"), 1);
        assert_eq!(
            log.release_order("oracle"),
            vec![
                SurfaceEvent::GeometryReleased,
                SurfaceEvent::MaterialReleased,
                SurfaceEvent::ContextReleased,
            ]
        );
        scene.dispose();
        assert_eq!(log.release_order("oracle").len(), 3);
    }

    #[test]
    fn backend_failure_becomes_surface_init_error() {
        let mut factory = HeadlessFactory::new();
        factory.fail_card("voice");
        let program = ShaderRegistry::builtin().get("voice").unwrap();
        let surface = SurfaceHandle::new(LayoutBox::default(), 1.0);
        let err = CardScene::new("voice", surface, &program, &mut factory, SceneOptions::default())
            .err()
            .expect("creation fails");
        let SceneError::SurfaceInit { id, source } = err;
        assert_eq!(id, "voice");
        assert!(source.to_string().contains("voice"));
    }
}

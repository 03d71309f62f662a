//! Owns every card scene and drives them as a group.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use catalog::Project;
use scheduler::{Debouncer, FrameScheduler};
use shaders::ShaderRegistry;
use tracing::{debug, error, info, warn};

use crate::backend::SurfaceFactory;
use crate::input::InputPort;
use crate::page::CardContainer;
use crate::scene::{CardScene, FrameOutcome, SceneError, SceneOptions};
use crate::types::SurfaceHandle;

/// Quiet period before a burst of window resizes reaches the scenes.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(250);

const STAGGER_BASE: f32 = 0.2;
const STAGGER_STEP: f32 = 0.08;

/// A project bound to its mounted card.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub project: Project,
    pub index: usize,
    pub surface: Option<SurfaceHandle>,
    pub has_action: bool,
}

impl CardRecord {
    pub fn id(&self) -> &str {
        &self.project.id
    }

    /// Entrance animation delay for this card.
    pub fn stagger_delay(&self) -> Duration {
        Duration::from_secs_f32(STAGGER_BASE + STAGGER_STEP * self.index as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingSurface,
    MissingShader,
    SurfaceInit,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MissingSurface => "missing surface",
            FailureKind::MissingShader => "missing shader",
            FailureKind::SurfaceInit => "surface init failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFailure {
    pub id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of [`SceneCoordinator::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub cards: usize,
    pub scenes: usize,
    pub container_missing: bool,
    pub failures: Vec<CardFailure>,
}

impl InitReport {
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.kind == kind)
            .count()
    }
}

pub struct SceneCoordinator {
    cards: Vec<CardRecord>,
    scenes: BTreeMap<String, CardScene>,
    frames: FrameScheduler<String>,
    resize: Debouncer,
    options: SceneOptions,
}

impl Default for SceneCoordinator {
    fn default() -> Self {
        Self::new(SceneOptions::default())
    }
}

impl SceneCoordinator {
    pub fn new(options: SceneOptions) -> Self {
        Self {
            cards: Vec::new(),
            scenes: BTreeMap::new(),
            frames: FrameScheduler::new(),
            resize: Debouncer::new(RESIZE_DEBOUNCE),
            options,
        }
    }

    /// Mounts one card per project in order and starts a scene for every
    /// card whose surface and shader resolve. Per-card failures are logged
    /// and reported; they never stop the remaining cards.
    pub fn initialize(
        &mut self,
        projects: &[Project],
        registry: &ShaderRegistry,
        container: Option<&mut dyn CardContainer>,
        factory: &mut dyn SurfaceFactory,
    ) -> InitReport {
        if !self.cards.is_empty() || !self.scenes.is_empty() {
            warn!("coordinator initialised twice; tearing down previous cards");
            self.destroy();
        }

        let mut report = InitReport::default();
        let Some(container) = container else {
            error!("card container not found; no cards created");
            report.container_missing = true;
            return report;
        };

        for (index, project) in projects.iter().enumerate() {
            let mount = container.mount(project, index);
            self.cards.push(CardRecord {
                project: project.clone(),
                index,
                surface: mount.surface.clone(),
                has_action: mount.has_action,
            });

            let Some(surface) = mount.surface else {
                warn!(id = %project.id, "card has no shader surface");
                report.failures.push(CardFailure {
                    id: project.id.clone(),
                    kind: FailureKind::MissingSurface,
                    message: "card has no shader surface".into(),
                });
                continue;
            };

            let program = match registry.get(&project.id) {
                Ok(program) => program,
                Err(err) => {
                    warn!(id = %project.id, "{err}; card rendered without shader");
                    report.failures.push(CardFailure {
                        id: project.id.clone(),
                        kind: FailureKind::MissingShader,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match CardScene::new(&project.id, surface, &program, factory, self.options) {
                Ok(mut scene) => {
                    scene.start();
                    self.frames.request(project.id.clone());
                    self.scenes.insert(project.id.clone(), scene);
                }
                Err(SceneError::SurfaceInit { id, source }) => {
                    error!(id = %id, "failed to initialise card scene: {source:#}");
                    report.failures.push(CardFailure {
                        id,
                        kind: FailureKind::SurfaceInit,
                        message: format!("{source:#}"),
                    });
                }
            }
        }

        report.cards = self.cards.len();
        report.scenes = self.scenes.len();
        info!(
            projects = report.cards,
            scenes = report.scenes,
            "initialised {} projects with {} shader scenes",
            report.cards,
            report.scenes
        );
        report
    }

    pub fn cards(&self) -> &[CardRecord] {
        &self.cards
    }

    pub fn scene(&self, id: &str) -> Option<&CardScene> {
        self.scenes.get(id)
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn running_count(&self) -> usize {
        self.scenes.values().filter(|scene| scene.is_running()).count()
    }

    pub fn has_scene(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn input(&mut self, id: &str) -> Option<&mut dyn InputPort> {
        self.scenes
            .get_mut(id)
            .map(|scene| scene as &mut dyn InputPort)
    }

    pub fn start(&mut self, id: &str) -> bool {
        let Some(scene) = self.scenes.get_mut(id) else {
            return false;
        };
        if scene.start() {
            self.frames.request(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self, id: &str) -> bool {
        let Some(scene) = self.scenes.get_mut(id) else {
            return false;
        };
        self.frames.cancel(&id.to_string());
        scene.stop()
    }

    /// Runs every due tick in scheduling order and re-requests ticks for
    /// scenes that are still running. Returns the number of draws.
    pub fn frame(&mut self, now: Instant) -> usize {
        let mut drawn = 0;
        for tick in self.frames.take_due(now) {
            let Some(scene) = self.scenes.get_mut(&tick.key) else {
                continue;
            };
            if scene.frame(tick.delta.as_secs_f64()) == FrameOutcome::Drawn {
                drawn += 1;
            }
            if scene.is_running() {
                self.frames.request(tick.key);
            }
        }
        drawn
    }

    /// Notes a window resize; scenes are resized once resizes stop arriving.
    pub fn request_resize(&mut self, now: Instant) {
        self.resize.trigger(now);
    }

    pub fn resize_pending(&self) -> bool {
        self.resize.is_pending()
    }

    /// Fires the debounced resize when due. Returns `true` if it ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.resize.poll(now) {
            self.resize_all();
            true
        } else {
            false
        }
    }

    pub fn resize_all(&mut self) {
        for scene in self.scenes.values_mut() {
            scene.resize();
        }
        debug!(scenes = self.scenes.len(), "resized card scenes");
    }

    /// Disposes every scene and forgets every card. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        for scene in self.scenes.values_mut() {
            scene.dispose();
        }
        if !self.scenes.is_empty() {
            debug!(scenes = self.scenes.len(), "destroyed card scenes");
        }
        self.scenes.clear();
        self.cards.clear();
        self.frames.clear();
        self.resize.cancel();
    }
}

impl Drop for SceneCoordinator {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessFactory, SurfaceEvent};
    use crate::page::CardMount;
    use crate::types::LayoutBox;
    use catalog::Catalog;

    /// Stacks cards vertically, optionally without a surface for some ids.
    #[derive(Default)]
    struct StackContainer {
        handles: Vec<SurfaceHandle>,
        without_surface: Vec<String>,
    }

    impl CardContainer for StackContainer {
        fn mount(&mut self, project: &Project, index: usize) -> CardMount {
            if self.without_surface.contains(&project.id) {
                return CardMount {
                    surface: None,
                    has_action: project.has_link(),
                };
            }
            let handle = SurfaceHandle::new(
                LayoutBox::new(0.0, index as f32 * 400.0, 340.0, 180.0),
                1.0,
            );
            self.handles.push(handle.clone());
            CardMount {
                surface: Some(handle),
                has_action: project.has_link(),
            }
        }
    }

    fn projects() -> Vec<Project> {
        Catalog::builtin().unwrap().projects
    }

    #[test]
    fn nine_projects_yield_nine_running_scenes() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        let report = coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        assert_eq!(report.cards, 9);
        assert_eq!(report.scenes, 9);
        assert!(report.failures.is_empty());
        assert_eq!(coordinator.running_count(), 9);
        assert_eq!(container.handles.len(), 9);
    }

    #[test]
    fn missing_shader_skips_only_that_card() {
        let mut registry = ShaderRegistry::builtin();
        registry.remove("engram");
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        let report =
            coordinator.initialize(&projects(), &registry, Some(&mut container), &mut factory);
        assert_eq!(report.cards, 9);
        assert_eq!(coordinator.cards().len(), 9);
        assert_eq!(coordinator.running_count(), 8);
        assert_eq!(report.failures_of(FailureKind::MissingShader), 1);
        // The report entry carries the text of the single warning logged.
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "engram");
        assert_eq!(
            report.failures[0].message,
            "no shader registered for 'engram'"
        );
        assert!(!coordinator.has_scene("engram"));
    }

    #[test]
    fn surface_failure_is_contained_per_card() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer {
            without_surface: vec!["nexus".into()],
            ..StackContainer::default()
        };
        let mut factory = HeadlessFactory::new();
        factory.fail_card("oracle");
        let report = coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        assert_eq!(report.cards, 9);
        assert_eq!(report.scenes, 7);
        assert_eq!(report.failures_of(FailureKind::SurfaceInit), 1);
        assert_eq!(report.failures_of(FailureKind::MissingSurface), 1);
        assert!(coordinator.input("oracle").is_none());
    }

    #[test]
    fn missing_container_creates_nothing() {
        let mut coordinator = SceneCoordinator::default();
        let mut factory = HeadlessFactory::new();
        let report =
            coordinator.initialize(&projects(), &ShaderRegistry::builtin(), None, &mut factory);
        assert!(report.container_missing);
        assert_eq!(report.cards, 0);
        assert_eq!(coordinator.running_count(), 0);
        coordinator.destroy();
    }

    #[test]
    fn cards_keep_list_order_and_stagger() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        let cards = coordinator.cards();
        assert_eq!(cards[0].id(), "metalogos");
        assert_eq!(cards[8].id(), "voice");
        assert_eq!(cards[0].stagger_delay(), Duration::from_secs_f32(0.2));
        assert_eq!(cards[2].stagger_delay(), Duration::from_secs_f32(0.2 + 0.08 * 2.0));
        assert!(cards[0].has_action);
        assert!(!cards[2].has_action, "lithosphere has no url");
    }

    #[test]
    fn frames_tick_every_running_scene_with_measured_delta() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        let start = Instant::now();
        assert_eq!(coordinator.frame(start), 9);
        assert_eq!(coordinator.frame(start + Duration::from_millis(100)), 9);
        let uniforms = log.last_uniforms("voice").unwrap();
        assert!((uniforms.time - 0.02).abs() < 1e-6, "idle time scale applies");

        assert!(coordinator.stop("voice"));
        assert_eq!(coordinator.frame(start + Duration::from_millis(200)), 8);
        assert_eq!(log.draw_count("voice"), 2);

        assert!(coordinator.start("voice"));
        assert!(!coordinator.start("voice"));
        coordinator.frame(start + Duration::from_secs(10));
        let uniforms = log.last_uniforms("voice").unwrap();
        assert!((uniforms.time - 0.02).abs() < 1e-6, "restart begins with zero delta");
    }

    #[test]
    fn input_reaches_the_named_scene() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        coordinator
            .input("boardroom")
            .expect("scene")
            .on_pointer_enter();
        assert!(coordinator.scene("boardroom").unwrap().state().hovered);
        assert!(!coordinator.scene("oracle").unwrap().state().hovered);
        assert!(coordinator.input("missing").is_none());
    }

    #[test]
    fn resize_is_debounced() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        container.handles[0].set_layout(LayoutBox::new(0.0, 0.0, 200.0, 100.0));

        let start = Instant::now();
        coordinator.request_resize(start);
        coordinator.request_resize(start + Duration::from_millis(100));
        assert!(!coordinator.poll(start + Duration::from_millis(300)));
        assert!(log.resizes("metalogos").is_empty());
        assert!(coordinator.poll(start + Duration::from_millis(350)));
        assert_eq!(log.resizes("metalogos"), vec![(200, 100)]);
        assert_eq!(log.resizes("voice"), vec![(340, 180)]);
        assert!(!coordinator.poll(start + Duration::from_secs(1)));
    }

    #[test]
    fn destroy_disposes_everything_and_is_repeatable() {
        let mut coordinator = SceneCoordinator::default();
        let mut container = StackContainer::default();
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        coordinator.initialize(
            &projects(),
            &ShaderRegistry::builtin(),
            Some(&mut container),
            &mut factory,
        );
        let start = Instant::now();
        coordinator.frame(start);
        coordinator.destroy();
        coordinator.destroy();
        assert_eq!(coordinator.scene_count(), 0);
        assert!(coordinator.cards().is_empty());
        assert_eq!(coordinator.frame(start + Duration::from_millis(16)), 0);
        for id in log.surfaces() {
            assert_eq!(log.draw_count(&id), 1);
            assert_eq!(
                log.release_order(&id),
                vec![
                    SurfaceEvent::GeometryReleased,
                    SurfaceEvent::MaterialReleased,
                    SurfaceEvent::ContextReleased,
                ]
            );
        }
    }
}

//! Backend that draws nothing and records what it was asked to do.
//!
//! Used by the `--headless` host and by tests, which inspect the shared
//! [`HeadlessLog`] to assert on draw counts, uniform writes and release order.
//! Long runs use [`HeadlessFactory::counting`], which keeps draw counters but
//! drops the per-frame events.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::backend::{
    CardSurface, CardSurfaceDescriptor, ParticleSurface, ParticleSurfaceDescriptor,
    SurfaceFactory,
};
use crate::types::SurfaceSize;
use crate::uniforms::{BackgroundUniforms, CardUniforms};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Created { width: u32, height: u32 },
    Resized { width: u32, height: u32 },
    UniformsWritten(CardUniforms),
    Drawn,
    GeometryReleased,
    MaterialReleased,
    ContextReleased,
}

impl SurfaceEvent {
    fn is_per_frame(&self) -> bool {
        matches!(self, SurfaceEvent::UniformsWritten(_) | SurfaceEvent::Drawn)
    }

    fn is_release(&self) -> bool {
        matches!(
            self,
            SurfaceEvent::GeometryReleased
                | SurfaceEvent::MaterialReleased
                | SurfaceEvent::ContextReleased
        )
    }
}

#[derive(Debug, Default)]
struct LogState {
    cards: BTreeMap<String, Vec<SurfaceEvent>>,
    draws: BTreeMap<String, usize>,
    counting_only: bool,
    particle_draws: usize,
    particle_sizes: Vec<(u32, u32)>,
    particles_released: bool,
}

/// Shared, cloneable record of every call made against headless surfaces.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog(Rc<RefCell<LogState>>);

impl HeadlessLog {
    fn record(&self, id: &str, event: SurfaceEvent) {
        let mut state = self.0.borrow_mut();
        if event == SurfaceEvent::Drawn {
            *state.draws.entry(id.to_string()).or_default() += 1;
        }
        if state.counting_only && event.is_per_frame() {
            return;
        }
        state.cards.entry(id.to_string()).or_default().push(event);
    }

    pub fn surfaces(&self) -> Vec<String> {
        self.0.borrow().cards.keys().cloned().collect()
    }

    pub fn events(&self, id: &str) -> Vec<SurfaceEvent> {
        self.0.borrow().cards.get(id).cloned().unwrap_or_default()
    }

    pub fn draw_count(&self, id: &str) -> usize {
        self.0.borrow().draws.get(id).copied().unwrap_or(0)
    }

    pub fn total_draws(&self) -> usize {
        self.0.borrow().draws.values().sum()
    }

    /// Number of events currently held across all card surfaces.
    pub fn retained_events(&self) -> usize {
        self.0.borrow().cards.values().map(Vec::len).sum()
    }

    pub fn uniform_writes(&self, id: &str) -> Vec<CardUniforms> {
        self.events(id)
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::UniformsWritten(uniforms) => Some(uniforms),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniforms(&self, id: &str) -> Option<CardUniforms> {
        self.uniform_writes(id).pop()
    }

    pub fn resizes(&self, id: &str) -> Vec<(u32, u32)> {
        self.events(id)
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Resized { width, height } => Some((width, height)),
                _ => None,
            })
            .collect()
    }

    pub fn release_order(&self, id: &str) -> Vec<SurfaceEvent> {
        self.events(id)
            .into_iter()
            .filter(SurfaceEvent::is_release)
            .collect()
    }

    pub fn particle_draws(&self) -> usize {
        self.0.borrow().particle_draws
    }

    pub fn particle_sizes(&self) -> Vec<(u32, u32)> {
        self.0.borrow().particle_sizes.clone()
    }

    pub fn particles_released(&self) -> bool {
        self.0.borrow().particles_released
    }
}

#[derive(Debug, Default)]
pub struct HeadlessFactory {
    log: HeadlessLog,
    failing: BTreeSet<String>,
    fail_particles: bool,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts draws without keeping uniform writes or draw events, so memory
    /// stays flat however many frames run.
    pub fn counting() -> Self {
        let factory = Self::default();
        factory.log.0.borrow_mut().counting_only = true;
        factory
    }

    pub fn log(&self) -> HeadlessLog {
        self.log.clone()
    }

    /// Makes surface creation fail for `id`, as a context loss would.
    pub fn fail_card(&mut self, id: impl Into<String>) {
        self.failing.insert(id.into());
    }

    pub fn fail_particles(&mut self) {
        self.fail_particles = true;
    }
}

impl SurfaceFactory for HeadlessFactory {
    fn create_card_surface(
        &mut self,
        descriptor: &CardSurfaceDescriptor<'_>,
    ) -> Result<Box<dyn CardSurface>> {
        if self.failing.contains(descriptor.id) {
            bail!("context creation failed for '{}'", descriptor.id);
        }
        if descriptor.vertex_source.trim().is_empty() {
            bail!("vertex shader for '{}' is empty", descriptor.id);
        }
        if descriptor.fragment_source.trim().is_empty() {
            bail!("fragment shader for '{}' is empty", descriptor.id);
        }
        let (width, height) = descriptor.size.physical();
        self.log
            .record(descriptor.id, SurfaceEvent::Created { width, height });
        Ok(Box::new(HeadlessCardSurface {
            id: descriptor.id.to_string(),
            log: self.log.clone(),
            released: false,
        }))
    }

    fn create_particle_surface(
        &mut self,
        descriptor: &ParticleSurfaceDescriptor,
    ) -> Result<Box<dyn ParticleSurface>> {
        if self.fail_particles {
            bail!("particle context creation failed");
        }
        self.log
            .0
            .borrow_mut()
            .particle_sizes
            .push(descriptor.size.physical());
        Ok(Box::new(HeadlessParticleSurface {
            log: self.log.clone(),
            point_count: descriptor.point_count,
        }))
    }
}

struct HeadlessCardSurface {
    id: String,
    log: HeadlessLog,
    released: bool,
}

impl CardSurface for HeadlessCardSurface {
    fn resize(&mut self, size: SurfaceSize) {
        let (width, height) = size.physical();
        self.log
            .record(&self.id, SurfaceEvent::Resized { width, height });
    }

    fn write_uniforms(&mut self, uniforms: &CardUniforms) {
        self.log
            .record(&self.id, SurfaceEvent::UniformsWritten(*uniforms));
    }

    fn draw(&mut self) -> Result<()> {
        if self.released {
            bail!("surface '{}' has been released", self.id);
        }
        self.log.record(&self.id, SurfaceEvent::Drawn);
        Ok(())
    }

    fn dispose_geometry(&mut self) {
        self.log.record(&self.id, SurfaceEvent::GeometryReleased);
    }

    fn dispose_material(&mut self) {
        self.log.record(&self.id, SurfaceEvent::MaterialReleased);
    }

    fn dispose_context(&mut self) {
        self.released = true;
        self.log.record(&self.id, SurfaceEvent::ContextReleased);
    }
}

struct HeadlessParticleSurface {
    log: HeadlessLog,
    point_count: usize,
}

impl ParticleSurface for HeadlessParticleSurface {
    fn resize(&mut self, size: SurfaceSize) {
        self.log.0.borrow_mut().particle_sizes.push(size.physical());
    }

    fn draw(&mut self, positions: &[[f32; 3]], _uniforms: &BackgroundUniforms) -> Result<()> {
        if positions.len() != self.point_count {
            bail!(
                "expected {} particle positions, got {}",
                self.point_count,
                positions.len()
            );
        }
        self.log.0.borrow_mut().particle_draws += 1;
        Ok(())
    }

    fn dispose(&mut self) {
        self.log.0.borrow_mut().particles_released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(factory: &mut HeadlessFactory) -> Box<dyn CardSurface> {
        factory
            .create_card_surface(&CardSurfaceDescriptor {
                id: "oracle",
                size: SurfaceSize::new(340.0, 180.0, 1.0),
                vertex_source: "void main() {}",
                fragment_source: "void main() {}",
                antialias: true,
                transparent: true,
            })
            .unwrap()
    }

    #[test]
    fn full_capture_keeps_every_frame() {
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        let mut surface = card(&mut factory);
        for _ in 0..10 {
            surface.write_uniforms(&CardUniforms::default());
            surface.draw().unwrap();
        }
        assert_eq!(log.draw_count("oracle"), 10);
        assert_eq!(log.uniform_writes("oracle").len(), 10);
        assert_eq!(log.retained_events(), 21);
    }

    #[test]
    fn counting_mode_does_not_grow_with_frames() {
        let mut factory = HeadlessFactory::counting();
        let log = factory.log();
        let mut surface = card(&mut factory);
        for _ in 0..1000 {
            surface.write_uniforms(&CardUniforms::default());
            surface.draw().unwrap();
        }
        assert_eq!(log.draw_count("oracle"), 1000);
        assert_eq!(log.total_draws(), 1000);
        assert!(log.uniform_writes("oracle").is_empty());
        assert_eq!(log.retained_events(), 1);

        surface.dispose_geometry();
        surface.dispose_material();
        surface.dispose_context();
        assert_eq!(log.release_order("oracle").len(), 3);
        assert!(surface.draw().is_err());
    }
}

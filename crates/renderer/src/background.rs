//! Ambient particle field drawn behind the card grid.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::backend::{ParticleSurface, ParticleSurfaceDescriptor, SurfaceFactory};
use crate::math::{self, Mat4};
use crate::types::SurfaceSize;
use crate::uniforms::BackgroundUniforms;

pub const PARTICLE_COUNT: usize = 150;
/// Points live in `[-FIELD_HALF_HEIGHT, FIELD_HALF_HEIGHT)` on X and Y.
pub const FIELD_HALF_HEIGHT: f32 = 7.5;
pub const FIELD_HALF_DEPTH: f32 = 5.0;
pub const MIN_SPEED: f32 = 0.002;
pub const SPEED_RANGE: f32 = 0.005;
/// Rotation of the whole cloud about Y, radians per frame.
pub const ROTATION_STEP: f32 = 0.001;

const FOV_DEGREES: f32 = 75.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;
const CAMERA_Z: f32 = 5.0;
const POINT_SIZE: f32 = 0.05;
const POINT_COLOR: [f32; 3] = [0x44 as f32 / 255.0, 0x44 as f32 / 255.0, 0x55 as f32 / 255.0];
const POINT_OPACITY: f32 = 0.6;
const LAYER_OPACITY: f32 = 0.6;

/// Rising points that wrap from the top of the field back to the bottom.
#[derive(Debug, Clone)]
pub struct ParticleField {
    positions: Vec<[f32; 3]>,
    speeds: Vec<f32>,
    rotation: f32,
}

impl ParticleField {
    pub fn new<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(count);
        let mut speeds = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push([
                (rng.gen::<f32>() - 0.5) * FIELD_HALF_HEIGHT * 2.0,
                (rng.gen::<f32>() - 0.5) * FIELD_HALF_HEIGHT * 2.0,
                (rng.gen::<f32>() - 0.5) * FIELD_HALF_DEPTH * 2.0,
            ]);
            speeds.push(rng.gen::<f32>() * SPEED_RANGE + MIN_SPEED);
        }
        Self {
            positions,
            speeds,
            rotation: 0.0,
        }
    }

    pub fn seeded(count: usize, seed: u64) -> Self {
        Self::new(count, &mut StdRng::seed_from_u64(seed))
    }

    /// Advances every point by its own speed, wrapping above the field.
    pub fn step(&mut self) {
        for (position, speed) in self.positions.iter_mut().zip(&self.speeds) {
            position[1] += speed;
            if position[1] > FIELD_HALF_HEIGHT {
                position[1] = -FIELD_HALF_HEIGHT;
            }
        }
        self.rotation += ROTATION_STEP;
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub struct BackgroundController {
    field: ParticleField,
    surface: Option<Box<dyn ParticleSurface>>,
    size: SurfaceSize,
    projection: Mat4,
    frames: u64,
}

impl BackgroundController {
    /// Builds the particle layer. Always running once constructed.
    pub fn new(
        size: SurfaceSize,
        factory: &mut dyn SurfaceFactory,
        seed: Option<u64>,
    ) -> Result<Self> {
        let field = match seed {
            Some(seed) => ParticleField::seeded(PARTICLE_COUNT, seed),
            None => ParticleField::new(PARTICLE_COUNT, &mut rand::thread_rng()),
        };
        let surface = factory
            .create_particle_surface(&ParticleSurfaceDescriptor {
                size,
                point_count: PARTICLE_COUNT,
                antialias: false,
                layer_opacity: LAYER_OPACITY,
            })
            .context("failed to create background surface")?;
        debug!(points = field.len(), seeded = seed.is_some(), "background created");
        Ok(Self {
            field,
            surface: Some(surface),
            size,
            projection: projection_for(size),
            frames: 0,
        })
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn uniforms(&self) -> BackgroundUniforms {
        let view = math::translation(0.0, 0.0, -CAMERA_Z);
        let model = math::rotation_y(self.field.rotation());
        let [r, g, b] = POINT_COLOR;
        BackgroundUniforms {
            projection: self.projection,
            model_view: math::mul(&view, &model),
            color: [r, g, b, POINT_OPACITY],
            params: [POINT_SIZE, 0.0, 0.0, 0.0],
        }
    }

    /// Steps the field and draws it. Returns `false` once disposed.
    pub fn frame(&mut self) -> bool {
        if self.surface.is_none() {
            return false;
        }
        self.field.step();
        self.frames += 1;
        let uniforms = self.uniforms();
        if let Some(surface) = self.surface.as_mut() {
            if let Err(err) = surface.draw(self.field.positions(), &uniforms) {
                warn!("background draw failed: {err:#}");
            }
        }
        true
    }

    /// Only the projection aspect and the pixel size change.
    pub fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.projection = projection_for(size);
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(size);
        }
    }

    pub fn dispose(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.dispose();
        }
    }
}

impl Drop for BackgroundController {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn projection_for(size: SurfaceSize) -> Mat4 {
    math::perspective(FOV_DEGREES.to_radians(), size.aspect(), NEAR, FAR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessFactory;

    #[test]
    fn field_starts_inside_bounds() {
        let field = ParticleField::seeded(PARTICLE_COUNT, 7);
        assert_eq!(field.len(), 150);
        for (position, speed) in field.positions().iter().zip(field.speeds()) {
            assert!((-7.5..7.5).contains(&position[0]));
            assert!((-7.5..7.5).contains(&position[1]));
            assert!((-5.0..5.0).contains(&position[2]));
            assert!((MIN_SPEED..MIN_SPEED + SPEED_RANGE).contains(speed));
        }
    }

    #[test]
    fn seeded_fields_are_reproducible() {
        let a = ParticleField::seeded(10, 42);
        let b = ParticleField::seeded(10, 42);
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn points_rise_and_wrap() {
        let mut field = ParticleField::seeded(PARTICLE_COUNT, 3);
        let before = field.positions().to_vec();
        field.step();
        for ((old, new), speed) in before.iter().zip(field.positions()).zip(field.speeds()) {
            if old[1] + speed > FIELD_HALF_HEIGHT {
                assert_eq!(new[1], -FIELD_HALF_HEIGHT);
            } else {
                assert_eq!(new[1], old[1] + speed);
            }
            assert_eq!(new[0], old[0]);
        }
        assert_eq!(field.rotation(), ROTATION_STEP);

        for _ in 0..10_000 {
            field.step();
        }
        assert!(field
            .positions()
            .iter()
            .all(|position| (-7.5..=7.5).contains(&position[1])));
    }

    #[test]
    fn resize_only_changes_aspect_and_size() {
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        let mut background =
            BackgroundController::new(SurfaceSize::new(800.0, 600.0, 1.0), &mut factory, Some(1))
                .expect("background");
        let positions = background.field().positions().to_vec();
        background.resize(SurfaceSize::new(1600.0, 600.0, 1.0));
        assert_eq!(background.field().positions(), positions.as_slice());
        let projection = background.projection();
        assert!((projection[1][1] / projection[0][0] - background.size().aspect()).abs() < 1e-4);
        assert_eq!(log.particle_sizes(), vec![(800, 600), (1600, 600)]);
    }

    #[test]
    fn frames_draw_until_disposed() {
        let mut factory = HeadlessFactory::new();
        let log = factory.log();
        let mut background =
            BackgroundController::new(SurfaceSize::new(640.0, 480.0, 1.0), &mut factory, Some(9))
                .unwrap();
        assert!(background.frame());
        assert!(background.frame());
        assert_eq!(log.particle_draws(), 2);
        assert_eq!(background.uniforms().color[3], 0.6);
        background.dispose();
        assert!(!background.frame());
        assert!(log.particles_released());
        assert_eq!(log.particle_draws(), 2);
    }
}

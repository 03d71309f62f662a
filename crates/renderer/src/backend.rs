//! Seams between the scene state machines and whatever draws their pixels.
//!
//! Scenes only talk to these traits. The windowed host plugs in the wgpu
//! implementation from [`crate::gpu`]; tests and `--headless` runs use
//! [`crate::headless`].

use anyhow::Result;

use crate::types::SurfaceSize;
use crate::uniforms::{BackgroundUniforms, CardUniforms};

/// Everything a backend needs to build one card's context, mesh and program.
#[derive(Debug, Clone, Copy)]
pub struct CardSurfaceDescriptor<'a> {
    pub id: &'a str,
    pub size: SurfaceSize,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    pub antialias: bool,
    pub transparent: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ParticleSurfaceDescriptor {
    pub size: SurfaceSize,
    pub point_count: usize,
    pub antialias: bool,
    /// Opacity applied to the whole layer when it is composited.
    pub layer_opacity: f32,
}

/// One card's rendering context. Resources are released piecewise so the
/// scene controls the order.
pub trait CardSurface {
    fn resize(&mut self, size: SurfaceSize);
    fn write_uniforms(&mut self, uniforms: &CardUniforms);
    fn draw(&mut self) -> Result<()>;
    fn dispose_geometry(&mut self);
    fn dispose_material(&mut self);
    fn dispose_context(&mut self);
}

pub trait ParticleSurface {
    fn resize(&mut self, size: SurfaceSize);
    fn draw(&mut self, positions: &[[f32; 3]], uniforms: &BackgroundUniforms) -> Result<()>;
    fn dispose(&mut self);
}

pub trait SurfaceFactory {
    /// Creates the context and compiles the program for one card. Shader
    /// compilation problems are reported here, never at draw time.
    fn create_card_surface(
        &mut self,
        descriptor: &CardSurfaceDescriptor<'_>,
    ) -> Result<Box<dyn CardSurface>>;

    fn create_particle_surface(
        &mut self,
        descriptor: &ParticleSurfaceDescriptor,
    ) -> Result<Box<dyn ParticleSurface>>;
}

use bytemuck::{Pod, Zeroable};

use crate::math::{Mat4, IDENTITY};

/// Uniform block shared by every card program. The layout must match
/// `CardParams` in the wrapped GLSL prelude (std140).
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardUniforms {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub time: f32,
    pub hover: f32,
    pub click: f32,
    pub _padding0: f32,
    pub mouse: [f32; 2],
    pub resolution: [f32; 2],
}

unsafe impl Zeroable for CardUniforms {}
unsafe impl Pod for CardUniforms {}

impl Default for CardUniforms {
    fn default() -> Self {
        Self {
            projection: IDENTITY,
            model_view: IDENTITY,
            time: 0.0,
            hover: 0.0,
            click: 0.0,
            _padding0: 0.0,
            mouse: [0.5, 0.5],
            resolution: [1.0, 1.0],
        }
    }
}

/// Uniform block for the particle layer. `color.a` carries the point opacity,
/// `params.x` the point size in world units.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundUniforms {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub color: [f32; 4],
    pub params: [f32; 4],
}

unsafe impl Zeroable for BackgroundUniforms {}
unsafe impl Pod for BackgroundUniforms {}

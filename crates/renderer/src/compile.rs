use std::borrow::Cow;

use anyhow::{bail, Result};
use wgpu::naga::ShaderStage;

/// Compiles GLSL through naga's frontend.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_string()),
            stage,
            defines: &[],
        },
    })
}

/// Runs `build` inside a validation error scope so shader and pipeline
/// errors come back as `Err` instead of reaching the device error handler.
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    what: &str,
    build: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        bail!("{what} failed validation: {err}");
    }
    Ok(value)
}

/// Produces a GLSL 450 vertex shader from a card vertex program.
pub(crate) fn wrap_card_vertex(source: &str) -> String {
    format!(
        "{VERSION}{CARD_PARAMS}{VERTEX_HEADER}\n#line 1\n{body}",
        body = sanitize(source)
    )
}

/// Produces a GLSL 450 fragment shader from a card fragment program.
///
/// Card programs are written against the WebGL conventions: `varying`
/// inputs, loose `uniform` declarations and `gl_FragColor`. Those lines are
/// dropped and replaced by [`CARD_PARAMS`] and [`FRAGMENT_HEADER`].
pub(crate) fn wrap_card_fragment(source: &str) -> String {
    format!(
        "{VERSION}{CARD_PARAMS}{FRAGMENT_HEADER}\n#line 1\n{body}",
        body = sanitize(source)
    )
}

fn sanitize(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        let skip = trimmed.starts_with("#version")
            || trimmed.starts_with("precision ")
            || trimmed.starts_with("uniform ")
            || trimmed.starts_with("varying ")
            || trimmed.starts_with("attribute ");
        if skip {
            // Keep line numbers aligned with the original program.
            sanitized.push('\n');
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }
    sanitized
}

const VERSION: &str = "#version 450\n";

/// Uniform block shared by both card stages. Must match `CardUniforms`.
const CARD_PARAMS: &str = r"layout(std140, set = 0, binding = 0) uniform CardParams {
    mat4 _projectionMatrix;
    mat4 _modelViewMatrix;
    float _uTime;
    float _uHover;
    float _uClick;
    float _padding0;
    vec2 _uMouse;
    vec2 _uResolution;
} card;

#define projectionMatrix card._projectionMatrix
#define modelViewMatrix card._modelViewMatrix
#define uTime card._uTime
#define uHover card._uHover
#define uClick card._uClick
#define uMouse card._uMouse
#define uResolution card._uResolution
";

const VERTEX_HEADER: &str = r"layout(location = 0) in vec3 position;
layout(location = 1) in vec2 uv;
layout(location = 0) out vec2 vUv;
";

const FRAGMENT_HEADER: &str = r"layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 outColor;
#define gl_FragColor outColor
";

/// Camera-facing square per particle, six vertices per instance.
pub(crate) const PARTICLE_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 a_position;

layout(std140, set = 0, binding = 0) uniform ParticleParams {
    mat4 projection;
    mat4 model_view;
    vec4 color;
    vec4 params;
} particles;

const vec2 corners[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 corner = corners[uint(gl_VertexIndex)];
    vec4 view = particles.model_view * vec4(a_position, 1.0);
    view.xy += corner * particles.params.x * 0.5;
    gl_Position = particles.projection * view;
}
";

pub(crate) const PARTICLE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform ParticleParams {
    mat4 projection;
    mat4 model_view;
    vec4 color;
    vec4 params;
} particles;

void main() {
    outColor = particles.color;
}
";

/// Instanced rectangles in NDC with an optional texture and a diagonal
/// colour ramp.
pub(crate) const COMPOSITE_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec4 a_rect;
layout(location = 1) in vec4 a_color;
layout(location = 2) in vec4 a_color_end;

layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec4 v_color;

const vec2 corners[6] = vec2[6](
    vec2(0.0, 0.0),
    vec2(1.0, 0.0),
    vec2(1.0, 1.0),
    vec2(0.0, 0.0),
    vec2(1.0, 1.0),
    vec2(0.0, 1.0)
);

void main() {
    vec2 corner = corners[uint(gl_VertexIndex)];
    float x = mix(a_rect.x, a_rect.z, corner.x);
    float y = mix(a_rect.y, a_rect.w, corner.y);
    gl_Position = vec4(x, y, 0.0, 1.0);
    v_uv = corner;
    v_color = mix(a_color, a_color_end, (corner.x + corner.y) * 0.5);
}
";

pub(crate) const COMPOSITE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 1) in vec4 v_color;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D layer_texture;
layout(set = 0, binding = 1) uniform sampler layer_sampler;

void main() {
    outColor = texture(sampler2D(layer_texture, layer_sampler), v_uv) * v_color;
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
precision highp float;
varying vec2 vUv;
uniform float uTime;
uniform vec2 uMouse;
void main() {
    gl_FragColor = vec4(vUv, sin(uTime), 1.0);
}
"#;

    #[test]
    fn fragment_wrap_replaces_webgl_declarations() {
        let wrapped = wrap_card_fragment(FRAGMENT);
        assert!(wrapped.starts_with("#version 450\n"));
        assert!(!wrapped.contains("precision highp"));
        assert!(!wrapped.contains("varying vec2 vUv"));
        assert!(!wrapped.contains("uniform float uTime"));
        assert!(wrapped.contains("layout(location = 0) in vec2 vUv;"));
        assert!(wrapped.contains("#define gl_FragColor outColor"));
        assert!(wrapped.contains("gl_FragColor = vec4(vUv, sin(uTime), 1.0);"));
        assert_eq!(wrapped.matches("#version").count(), 1);
    }

    #[test]
    fn vertex_wrap_declares_mesh_attributes() {
        let wrapped = wrap_card_vertex(shaders::CARD_VERTEX);
        assert!(wrapped.contains("layout(location = 0) in vec3 position;"));
        assert!(wrapped.contains("layout(location = 1) in vec2 uv;"));
        assert!(wrapped.contains("layout(location = 0) out vec2 vUv;"));
        assert!(wrapped.contains("#define modelViewMatrix card._modelViewMatrix"));
        assert!(wrapped.contains("vUv = uv;"));
    }

    #[test]
    fn sanitize_keeps_line_count() {
        let sanitized = sanitize(FRAGMENT);
        assert_eq!(sanitized.lines().count(), FRAGMENT.lines().count());
        assert!(sanitized.contains("void main()"));
    }

    #[test]
    fn builtin_fragments_wrap_without_loose_uniforms() {
        let registry = shaders::ShaderRegistry::builtin();
        for id in registry.ids() {
            let program = registry.get(id).unwrap();
            let wrapped = wrap_card_fragment(&program.fragment);
            let body = wrapped.split("#line 1").nth(1).unwrap();
            assert!(!body.contains("uniform "), "{id} keeps a uniform");
            assert!(!body.contains("varying "), "{id} keeps a varying");
        }
    }
}

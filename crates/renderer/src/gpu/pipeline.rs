use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;

use crate::compile::{
    compile_glsl, validated, wrap_card_fragment, wrap_card_vertex, COMPOSITE_FRAGMENT_GLSL,
    COMPOSITE_VERTEX_GLSL, PARTICLE_FRAGMENT_GLSL, PARTICLE_VERTEX_GLSL,
};

use super::context::LAYER_FORMAT;

/// Card plane vertex: object-space position plus texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

unsafe impl Zeroable for MeshVertex {}
unsafe impl Pod for MeshVertex {}

/// Unit plane centred on the origin, two triangles.
pub(crate) const PLANE_VERTICES: [MeshVertex; 6] = [
    MeshVertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    MeshVertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    MeshVertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
    MeshVertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    MeshVertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
    MeshVertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
];

/// One rectangle drawn by the compositor, in normalised device coordinates.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct QuadInstance {
    /// Left, top, right, bottom.
    pub rect: [f32; 4],
    pub color: [f32; 4],
    pub color_end: [f32; 4],
}

unsafe impl Zeroable for QuadInstance {}
unsafe impl Pod for QuadInstance {}

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];
const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x4];

pub(crate) fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub(crate) fn layer_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("layer texture layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub(crate) fn layer_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("layer bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn triangle_list() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

struct PipelineParts<'a> {
    label: &'a str,
    vertex: &'a wgpu::ShaderModule,
    fragment: &'a wgpu::ShaderModule,
    bind_group_layout: &'a wgpu::BindGroupLayout,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    format: wgpu::TextureFormat,
    sample_count: u32,
    blend: wgpu::BlendState,
}

fn build_pipeline(device: &wgpu::Device, parts: PipelineParts<'_>) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(parts.label),
        bind_group_layouts: &[parts.bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(parts.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: parts.vertex,
            entry_point: Some("main"),
            buffers: parts.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: triangle_list(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: parts.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: parts.fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: parts.format,
                blend: Some(parts.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

/// Compiles a card program and links it into a pipeline for a layer target.
/// Compile and link errors are returned with the card id attached.
pub(crate) fn card_pipeline(
    device: &wgpu::Device,
    id: &str,
    uniform_layout: &wgpu::BindGroupLayout,
    vertex_source: &str,
    fragment_source: &str,
    sample_count: u32,
    transparent: bool,
) -> Result<wgpu::RenderPipeline> {
    let vertex = validated(device, &format!("vertex shader for '{id}'"), || {
        compile_glsl(device, "card vertex", &wrap_card_vertex(vertex_source), ShaderStage::Vertex)
    })?;
    let fragment = validated(device, &format!("fragment shader for '{id}'"), || {
        compile_glsl(
            device,
            "card fragment",
            &wrap_card_fragment(fragment_source),
            ShaderStage::Fragment,
        )
    })?;
    let buffers = [wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }];
    let blend = if transparent {
        wgpu::BlendState::ALPHA_BLENDING
    } else {
        wgpu::BlendState::REPLACE
    };
    validated(device, &format!("pipeline for '{id}'"), || {
        build_pipeline(
            device,
            PipelineParts {
                label: "card pipeline",
                vertex: &vertex,
                fragment: &fragment,
                bind_group_layout: uniform_layout,
                buffers: &buffers,
                format: LAYER_FORMAT,
                sample_count,
                blend,
            },
        )
    })
}

pub(crate) fn particle_pipeline(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
) -> Result<wgpu::RenderPipeline> {
    validated(device, "particle pipeline", || {
        let vertex = compile_glsl(
            device,
            "particle vertex",
            PARTICLE_VERTEX_GLSL,
            ShaderStage::Vertex,
        );
        let fragment = compile_glsl(
            device,
            "particle fragment",
            PARTICLE_FRAGMENT_GLSL,
            ShaderStage::Fragment,
        );
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &PARTICLE_ATTRIBUTES,
        }];
        build_pipeline(
            device,
            PipelineParts {
                label: "particle pipeline",
                vertex: &vertex,
                fragment: &fragment,
                bind_group_layout: uniform_layout,
                buffers: &buffers,
                format: LAYER_FORMAT,
                sample_count: 1,
                blend: wgpu::BlendState::ALPHA_BLENDING,
            },
        )
    })
}

pub(crate) fn composite_pipeline(
    device: &wgpu::Device,
    layer_layout: &wgpu::BindGroupLayout,
    surface_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    validated(device, "composite pipeline", || {
        let vertex = compile_glsl(
            device,
            "composite vertex",
            COMPOSITE_VERTEX_GLSL,
            ShaderStage::Vertex,
        );
        let fragment = compile_glsl(
            device,
            "composite fragment",
            COMPOSITE_FRAGMENT_GLSL,
            ShaderStage::Fragment,
        );
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &QUAD_ATTRIBUTES,
        }];
        build_pipeline(
            device,
            PipelineParts {
                label: "composite pipeline",
                vertex: &vertex,
                fragment: &fragment,
                bind_group_layout: layer_layout,
                buffers: &buffers,
                format: surface_format,
                sample_count: 1,
                blend: wgpu::BlendState::ALPHA_BLENDING,
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layouts_match_shader_inputs() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 20);
        assert_eq!(MESH_ATTRIBUTES[1].offset, 12);
        assert_eq!(std::mem::size_of::<QuadInstance>(), 48);
        assert_eq!(QUAD_ATTRIBUTES[2].offset, 32);
    }

    #[test]
    fn plane_spans_unit_square() {
        let min = PLANE_VERTICES
            .iter()
            .fold([f32::MAX; 2], |acc, v| [acc[0].min(v.position[0]), acc[1].min(v.position[1])]);
        assert_eq!(min, [-0.5, -0.5]);
        for vertex in PLANE_VERTICES {
            assert_eq!(vertex.uv[0], vertex.position[0] + 0.5);
            assert_eq!(vertex.uv[1], vertex.position[1] + 0.5);
        }
    }
}

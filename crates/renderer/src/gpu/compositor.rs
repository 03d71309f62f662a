use anyhow::Result;
use catalog::ProjectStatus;

use crate::app::Showcase;
use crate::page::CardSlot;
use crate::types::{LayoutBox, Viewport};

use super::backend::LayerRegistry;
use super::context::{GpuContext, LAYER_FORMAT};
use super::pipeline::{self, QuadInstance};

const PAGE_COLOR: [f32; 4] = [0.039, 0.039, 0.059, 1.0];
const PANEL_COLOR: [f32; 4] = [0.078, 0.078, 0.11, 1.0];
const LIVE_COLOR: [f32; 4] = [0.13, 0.77, 0.37, 1.0];
const DEV_COLOR: [f32; 4] = [0.96, 0.62, 0.04, 1.0];
const WHITE: [f32; 4] = [1.0; 4];
const ACTION_ALPHA: f32 = 0.85;

/// Which texture a quad samples.
enum Fill {
    Solid,
    Layer(wgpu::BindGroup),
}

/// Places every layer on the window: page, particles, card panels, card
/// shaders (or an accent fallback), action links and status badges.
pub(crate) struct Compositor {
    pipeline: wgpu::RenderPipeline,
    solid: wgpu::BindGroup,
    instances: wgpu::Buffer,
    capacity: usize,
    layers: LayerRegistry,
}

impl Compositor {
    pub fn new(
        context: &GpuContext,
        layer_layout: &wgpu::BindGroupLayout,
        layers: LayerRegistry,
    ) -> Result<Self> {
        let device = &context.device;
        let pipeline = pipeline::composite_pipeline(device, layer_layout, context.surface_format)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("solid fill"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
        let solid = pipeline::layer_bind_group(device, layer_layout, &view, &sampler);

        let capacity = 64;
        Ok(Self {
            pipeline,
            solid,
            instances: instance_buffer(device, capacity),
            capacity,
            layers,
        })
    }

    fn quads(&self, showcase: &Showcase) -> Vec<(Fill, QuadInstance)> {
        let viewport = showcase.layout().viewport();
        let full = LayoutBox::new(0.0, 0.0, viewport.width, viewport.height);
        let mut quads = vec![(Fill::Solid, solid(viewport, &full, PAGE_COLOR))];

        if let Some((layer, opacity)) = self.layers.background() {
            quads.push((
                Fill::Layer(layer),
                solid(viewport, &full, [1.0, 1.0, 1.0, opacity]),
            ));
        }

        for slot in showcase.layout().slots() {
            if !visible(viewport, &slot.bounds()) {
                continue;
            }
            quads.push((Fill::Solid, solid(viewport, &slot.bounds(), PANEL_COLOR)));
            quads.push(self.shader_area(showcase, viewport, slot));
            if let Some(action) = slot.action() {
                let (start, end) = slot.accent;
                quads.push((
                    Fill::Solid,
                    QuadInstance {
                        rect: ndc(viewport, &action),
                        color: start.with_alpha(ACTION_ALPHA).0,
                        color_end: end.with_alpha(ACTION_ALPHA).0,
                    },
                ));
            }
            let badge = match slot.status {
                ProjectStatus::Live => LIVE_COLOR,
                ProjectStatus::Dev => DEV_COLOR,
            };
            quads.push((Fill::Solid, solid(viewport, &slot.badge(), badge)));
        }
        quads
    }

    fn shader_area(
        &self,
        showcase: &Showcase,
        viewport: Viewport,
        slot: &CardSlot,
    ) -> (Fill, QuadInstance) {
        let area = slot.shader_area();
        let layer = showcase
            .coordinator()
            .has_scene(&slot.id)
            .then(|| self.layers.card(&slot.id))
            .flatten();
        match layer {
            Some(layer) => (Fill::Layer(layer), solid(viewport, &area, WHITE)),
            None => {
                let (start, end) = slot.accent;
                (
                    Fill::Solid,
                    QuadInstance {
                        rect: ndc(viewport, &area),
                        color: start.0,
                        color_end: end.0,
                    },
                )
            }
        }
    }

    pub fn render(
        &mut self,
        context: &GpuContext,
        showcase: &Showcase,
    ) -> Result<(), wgpu::SurfaceError> {
        let quads = self.quads(showcase);
        if quads.len() > self.capacity {
            self.capacity = quads.len().next_power_of_two();
            self.instances = instance_buffer(&context.device, self.capacity);
        }
        let instances: Vec<QuadInstance> = quads.iter().map(|(_, quad)| *quad).collect();
        context
            .queue
            .write_buffer(&self.instances, 0, bytemuck::cast_slice(&instances));

        let frame = context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_vertex_buffer(0, self.instances.slice(..));
            for (index, (fill, _)) in quads.iter().enumerate() {
                let bind_group = match fill {
                    Fill::Solid => &self.solid,
                    Fill::Layer(layer) => layer,
                };
                pass.set_bind_group(0, bind_group, &[]);
                let instance = index as u32;
                pass.draw(0..6, instance..instance + 1);
            }
        }
        context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("composite quads"),
        size: (capacity * std::mem::size_of::<QuadInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn visible(viewport: Viewport, bounds: &LayoutBox) -> bool {
    bounds.bottom() > 0.0 && bounds.top < viewport.height
}

fn solid(viewport: Viewport, rect: &LayoutBox, color: [f32; 4]) -> QuadInstance {
    QuadInstance {
        rect: ndc(viewport, rect),
        color,
        color_end: color,
    }
}

/// Logical page box to clip space: left, top, right, bottom.
fn ndc(viewport: Viewport, rect: &LayoutBox) -> [f32; 4] {
    let width = viewport.width.max(1.0);
    let height = viewport.height.max(1.0);
    [
        rect.left / width * 2.0 - 1.0,
        1.0 - rect.top / height * 2.0,
        rect.right() / width * 2.0 - 1.0,
        1.0 - rect.bottom() / height * 2.0,
    ]
}

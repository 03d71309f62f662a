//! wgpu implementations of the card and particle surfaces. Each surface
//! renders into its own offscreen layer; the compositor later places the
//! layers on the window.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::backend::{
    CardSurface, CardSurfaceDescriptor, ParticleSurface, ParticleSurfaceDescriptor, SurfaceFactory,
};
use crate::types::SurfaceSize;
use crate::uniforms::{BackgroundUniforms, CardUniforms};

use super::context::GpuContext;
use super::pipeline::{self, PLANE_VERTICES};
use super::target::{layer_extent, OffscreenTarget};

#[derive(Default)]
struct LayerState {
    cards: BTreeMap<String, wgpu::BindGroup>,
    background: Option<(wgpu::BindGroup, f32)>,
}

/// Bind groups of the live layers, keyed by card id. Surfaces register on
/// creation and resize and unregister when their context is released.
#[derive(Clone, Default)]
pub(crate) struct LayerRegistry(Rc<RefCell<LayerState>>);

impl LayerRegistry {
    fn set_card(&self, id: &str, bind_group: wgpu::BindGroup) {
        self.0.borrow_mut().cards.insert(id.to_string(), bind_group);
    }

    fn remove_card(&self, id: &str) {
        self.0.borrow_mut().cards.remove(id);
    }

    pub fn card(&self, id: &str) -> Option<wgpu::BindGroup> {
        self.0.borrow().cards.get(id).cloned()
    }

    fn set_background(&self, layer: Option<(wgpu::BindGroup, f32)>) {
        self.0.borrow_mut().background = layer;
    }

    /// The particle layer and the opacity it is composited with.
    pub fn background(&self) -> Option<(wgpu::BindGroup, f32)> {
        self.0.borrow().background.clone()
    }
}

/// Everything a surface needs from the device, cloned out of [`GpuContext`].
#[derive(Clone)]
struct Shared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layer_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    layers: LayerRegistry,
    max_dimension: u32,
}

impl Shared {
    fn layer(
        &self,
        label: &str,
        size: SurfaceSize,
        sample_count: u32,
    ) -> (OffscreenTarget, wgpu::BindGroup) {
        let target = OffscreenTarget::new(
            &self.device,
            label,
            size,
            sample_count,
            self.max_dimension,
        );
        let bind_group = pipeline::layer_bind_group(
            &self.device,
            &self.layer_layout,
            target.view(),
            &self.sampler,
        );
        (target, bind_group)
    }

    fn uniform_buffer(&self, label: &str, size: usize) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn uniform_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }
}

pub(crate) struct GpuFactory {
    shared: Shared,
    uniform_layout: wgpu::BindGroupLayout,
    sample_count: u32,
}

impl GpuFactory {
    pub fn new(
        context: &GpuContext,
        layer_layout: wgpu::BindGroupLayout,
        layers: LayerRegistry,
    ) -> Self {
        let device = context.device.clone();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("layer sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let uniform_layout = pipeline::uniform_layout(&device, "layer uniform layout");
        Self {
            shared: Shared {
                device,
                queue: context.queue.clone(),
                layer_layout,
                sampler,
                layers,
                max_dimension: context.max_dimension,
            },
            uniform_layout,
            sample_count: context.layer_sample_count,
        }
    }
}

impl SurfaceFactory for GpuFactory {
    fn create_card_surface(
        &mut self,
        descriptor: &CardSurfaceDescriptor<'_>,
    ) -> Result<Box<dyn CardSurface>> {
        let sample_count = if descriptor.antialias {
            self.sample_count
        } else {
            1
        };
        let shared = &self.shared;
        let render_pipeline = pipeline::card_pipeline(
            &shared.device,
            descriptor.id,
            &self.uniform_layout,
            descriptor.vertex_source,
            descriptor.fragment_source,
            sample_count,
            descriptor.transparent,
        )?;
        let uniform_buffer =
            shared.uniform_buffer("card uniforms", std::mem::size_of::<CardUniforms>());
        let bind_group = shared.uniform_bind_group(&self.uniform_layout, &uniform_buffer);
        let vertex_buffer = shared
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("card plane"),
                contents: bytemuck::cast_slice(&PLANE_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let (target, layer) = shared.layer("card layer", descriptor.size, sample_count);
        shared.layers.set_card(descriptor.id, layer);
        debug!(
            id = descriptor.id,
            dimensions = ?target.dimensions(),
            sample_count,
            "card surface created"
        );

        Ok(Box::new(GpuCardSurface {
            id: descriptor.id.to_string(),
            shared: shared.clone(),
            geometry: Some(vertex_buffer),
            material: Some(CardMaterial {
                pipeline: render_pipeline,
                uniform_buffer,
                bind_group,
            }),
            target: Some(target),
            sample_count,
        }))
    }

    fn create_particle_surface(
        &mut self,
        descriptor: &ParticleSurfaceDescriptor,
    ) -> Result<Box<dyn ParticleSurface>> {
        let shared = &self.shared;
        let render_pipeline = pipeline::particle_pipeline(&shared.device, &self.uniform_layout)?;
        let uniform_buffer =
            shared.uniform_buffer("particle uniforms", std::mem::size_of::<BackgroundUniforms>());
        let bind_group = shared.uniform_bind_group(&self.uniform_layout, &uniform_buffer);
        let instances = shared.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particle positions"),
            size: (descriptor.point_count.max(1) * std::mem::size_of::<[f32; 3]>())
                as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (target, layer) = shared.layer("particle layer", descriptor.size, 1);
        shared
            .layers
            .set_background(Some((layer, descriptor.layer_opacity)));

        Ok(Box::new(GpuParticleSurface {
            shared: shared.clone(),
            pipeline: render_pipeline,
            uniform_buffer,
            bind_group,
            instances,
            point_count: descriptor.point_count,
            opacity: descriptor.layer_opacity,
            target: Some(target),
        }))
    }
}

struct CardMaterial {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuCardSurface {
    id: String,
    shared: Shared,
    geometry: Option<wgpu::Buffer>,
    material: Option<CardMaterial>,
    target: Option<OffscreenTarget>,
    sample_count: u32,
}

impl CardSurface for GpuCardSurface {
    fn resize(&mut self, size: SurfaceSize) {
        let Some(current) = &self.target else {
            return;
        };
        if current.dimensions() == layer_extent(size, self.shared.max_dimension) {
            return;
        }
        let (target, layer) = self.shared.layer("card layer", size, self.sample_count);
        self.shared.layers.set_card(&self.id, layer);
        self.target = Some(target);
    }

    fn write_uniforms(&mut self, uniforms: &CardUniforms) {
        if let Some(material) = &self.material {
            self.shared
                .queue
                .write_buffer(&material.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        }
    }

    fn draw(&mut self) -> Result<()> {
        let (Some(geometry), Some(material), Some(target)) =
            (&self.geometry, &self.material, &self.target)
        else {
            bail!("card surface '{}' has been released", self.id);
        };
        let mut encoder = self
            .shared
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("card encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("card pass"),
                color_attachments: &[Some(target.attachment())],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&material.pipeline);
            pass.set_bind_group(0, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.slice(..));
            pass.draw(0..PLANE_VERTICES.len() as u32, 0..1);
        }
        self.shared.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn dispose_geometry(&mut self) {
        if let Some(buffer) = self.geometry.take() {
            buffer.destroy();
        }
    }

    fn dispose_material(&mut self) {
        if let Some(material) = self.material.take() {
            material.uniform_buffer.destroy();
        }
    }

    fn dispose_context(&mut self) {
        if self.target.take().is_some() {
            self.shared.layers.remove_card(&self.id);
            debug!(id = %self.id, "card layer released");
        }
    }
}

struct GpuParticleSurface {
    shared: Shared,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: wgpu::Buffer,
    point_count: usize,
    opacity: f32,
    target: Option<OffscreenTarget>,
}

impl ParticleSurface for GpuParticleSurface {
    fn resize(&mut self, size: SurfaceSize) {
        let Some(current) = &self.target else {
            return;
        };
        if current.dimensions() == layer_extent(size, self.shared.max_dimension) {
            return;
        }
        let (target, layer) = self.shared.layer("particle layer", size, 1);
        self.shared.layers.set_background(Some((layer, self.opacity)));
        self.target = Some(target);
    }

    fn draw(&mut self, positions: &[[f32; 3]], uniforms: &BackgroundUniforms) -> Result<()> {
        let Some(target) = &self.target else {
            bail!("particle surface has been released");
        };
        if positions.len() != self.point_count {
            bail!(
                "expected {} particle positions, got {}",
                self.point_count,
                positions.len()
            );
        }
        let queue = &self.shared.queue;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(positions));

        let mut encoder = self
            .shared
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("particle encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("particle pass"),
                color_attachments: &[Some(target.attachment())],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_vertex_buffer(0, self.instances.slice(..));
            pass.draw(0..6, 0..self.point_count as u32);
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn dispose(&mut self) {
        if self.target.take().is_some() {
            self.instances.destroy();
            self.uniform_buffer.destroy();
            self.shared.layers.set_background(None);
            debug!("particle layer released");
        }
    }
}

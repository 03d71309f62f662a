use crate::types::SurfaceSize;

use super::context::LAYER_FORMAT;

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(device: &wgpu::Device, extent: wgpu::Extent3d, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("layer msaa target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Texel size of the layer for `size`, within the device limit.
pub(crate) fn layer_extent(size: SurfaceSize, max_dimension: u32) -> (u32, u32) {
    let (width, height) = size.physical();
    (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
}

/// A texture a layer renders into and the compositor samples from.
pub(crate) struct OffscreenTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    multisample: Option<MultisampleTarget>,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: SurfaceSize,
        sample_count: u32,
        max_dimension: u32,
    ) -> Self {
        let (width, height) = layer_extent(size, max_dimension);
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let multisample =
            (sample_count > 1).then(|| MultisampleTarget::new(device, extent, sample_count));
        Self {
            _texture: texture,
            view,
            multisample,
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Colour attachment that clears to transparent and resolves into the
    /// sampled texture when multisampled.
    pub fn attachment(&self) -> wgpu::RenderPassColorAttachment<'_> {
        let (view, resolve_target) = match &self.multisample {
            Some(msaa) => (&msaa.view, Some(&self.view)),
            None => (&self.view, None),
        };
        wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        }
    }
}

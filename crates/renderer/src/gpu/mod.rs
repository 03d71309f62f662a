//! wgpu backend for the windowed showcase.
//!
//! - `context` owns the instance, device and window surface.
//! - `target` holds the offscreen layer every card and the particle field
//!   render into, with an optional MSAA companion.
//! - `pipeline` builds the card, particle and composite pipelines.
//! - `backend` implements [`crate::SurfaceFactory`] on top of those and
//!   publishes each layer in a shared [`LayerRegistry`].
//! - `compositor` draws the page and every registered layer to the window.

mod backend;
mod compositor;
mod context;
mod pipeline;
mod target;

pub(crate) use backend::{GpuFactory, LayerRegistry};
pub(crate) use compositor::Compositor;
pub(crate) use context::GpuContext;
pub(crate) use pipeline::layer_layout;

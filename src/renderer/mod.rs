pub mod backend;
pub mod batch;
pub mod camera;
pub mod context;
pub mod error;
pub mod gpu;
mod pipeline;
pub mod quad_renderer;
pub mod texture;
pub mod vertex;

pub use backend::{RecordingBackend, RenderBackend, TextureHandle};
pub use batch::{BatchBreak, QuadBatch, MAX_TEXTURE_SLOTS};
pub use camera::CameraUniform;
pub use context::GpuContext;
pub use error::RendererError;
pub use gpu::WgpuBackend;
pub use quad_renderer::{BatchConfig, BatchRenderer, RendererState, RendererStats};
pub use texture::{Texture, TextureRegistry};
pub use vertex::QuadVertex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("failed to allocate {what}: {reason}")]
    BufferAllocation { what: &'static str, reason: String },

    #[error("no suitable graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to load texture {path}: {source}")]
    TextureLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

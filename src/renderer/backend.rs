// renderer/backend.rs
use std::fmt;

use super::batch::MAX_TEXTURE_SLOTS;
use super::error::RendererError;
use super::vertex::QuadVertex;

/// Opaque identifier of a texture living in the graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The graphics-context operations the batch renderer drives.
///
/// Implementations own the GPU vertex/index buffers and the texture units.
/// Calls arrive in the order `bind_texture*`, `draw_indexed` for every
/// flush, preceded by one `upload_vertices` per batch.
pub trait RenderBackend {
    /// Largest single buffer the backend can allocate, in bytes. Checked
    /// before any index data is generated.
    fn max_buffer_size(&self) -> u64;

    /// Texture units one draw call can sample, slot 0 included.
    fn max_texture_slots(&self) -> usize;

    /// Allocates a streaming vertex buffer of `vertex_capacity` vertices and
    /// an immutable index buffer initialised with `indices`.
    fn create_buffers(&mut self, vertex_capacity: usize, indices: &[u32])
        -> Result<(), RendererError>;

    /// Creates the 1x1 opaque white texture used for slot 0.
    fn create_white_texture(&mut self) -> Result<TextureHandle, RendererError>;

    fn upload_vertices(&mut self, vertices: &[QuadVertex]);

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle);

    fn draw_indexed(&mut self, index_count: u32);

    /// Releases everything acquired by `create_buffers` and
    /// `create_white_texture`.
    fn release(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateBuffers { vertex_capacity: usize, index_count: usize },
    CreateWhiteTexture(TextureHandle),
    UploadVertices(usize),
    BindTexture { slot: u32, texture: TextureHandle },
    DrawIndexed(u32),
    Release,
}

/// Headless backend that records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<BackendCall>,
    pub indices: Vec<u32>,
    /// Contents of the most recent vertex upload.
    pub vertices: Vec<QuadVertex>,
    /// Slot bindings in effect for each draw call, in issue order.
    pub draws: Vec<RecordedDraw>,
    bound: Vec<(u32, TextureHandle)>,
    fail_allocation: bool,
    buffer_limit: Option<u64>,
    slot_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub index_count: u32,
    pub textures: Vec<(u32, TextureHandle)>,
    pub vertices: Vec<QuadVertex>,
}

pub const RECORDED_WHITE_TEXTURE: TextureHandle = TextureHandle(0);

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose buffer allocation always fails.
    pub fn failing() -> Self {
        Self {
            fail_allocation: true,
            ..Self::default()
        }
    }

    /// A backend reporting the given device limits.
    pub fn with_limits(max_buffer_size: u64, max_texture_slots: usize) -> Self {
        Self {
            buffer_limit: Some(max_buffer_size),
            slot_limit: Some(max_texture_slots),
            ..Self::default()
        }
    }

    pub fn draw_calls(&self) -> usize {
        self.draws.len()
    }

    pub fn upload_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::UploadVertices(_)))
            .count()
    }
}

impl RenderBackend for RecordingBackend {
    fn max_buffer_size(&self) -> u64 {
        self.buffer_limit.unwrap_or(u64::MAX)
    }

    fn max_texture_slots(&self) -> usize {
        self.slot_limit.unwrap_or(MAX_TEXTURE_SLOTS)
    }

    fn create_buffers(
        &mut self,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> Result<(), RendererError> {
        if self.fail_allocation {
            return Err(RendererError::BufferAllocation {
                what: "vertex buffer",
                reason: "allocation disabled".to_string(),
            });
        }
        self.indices = indices.to_vec();
        self.calls.push(BackendCall::CreateBuffers {
            vertex_capacity,
            index_count: indices.len(),
        });
        Ok(())
    }

    fn create_white_texture(&mut self) -> Result<TextureHandle, RendererError> {
        self.calls
            .push(BackendCall::CreateWhiteTexture(RECORDED_WHITE_TEXTURE));
        Ok(RECORDED_WHITE_TEXTURE)
    }

    fn upload_vertices(&mut self, vertices: &[QuadVertex]) {
        self.vertices = vertices.to_vec();
        self.calls.push(BackendCall::UploadVertices(vertices.len()));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) {
        self.bound.push((slot, texture));
        self.calls.push(BackendCall::BindTexture { slot, texture });
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.draws.push(RecordedDraw {
            index_count,
            textures: std::mem::take(&mut self.bound),
            vertices: self.vertices.clone(),
        });
        self.calls.push(BackendCall::DrawIndexed(index_count));
    }

    fn release(&mut self) {
        self.calls.push(BackendCall::Release);
    }
}

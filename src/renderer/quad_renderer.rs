// renderer/quad_renderer.rs
use std::mem;

use glam::{Vec2, Vec4};

use super::backend::{RenderBackend, TextureHandle};
use super::batch::{
    quad_indices, BatchBreak, QuadBatch, INDICES_PER_QUAD, MAX_QUADS, MAX_TEXTURE_SLOTS,
    VERTICES_PER_QUAD,
};
use super::error::RendererError;
use super::vertex::{QuadVertex, WHITE, WHITE_SLOT};

pub const DEFAULT_MAX_QUADS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_quads: usize,
    /// Texture units available per draw call, slot 0 included.
    pub texture_slots: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_quads: DEFAULT_MAX_QUADS,
            texture_slots: MAX_TEXTURE_SLOTS,
        }
    }
}

impl BatchConfig {
    /// Largest accepted `max_quads`. Keeps every index of a full batch, and
    /// its index count, within `u32`.
    pub const MAX_QUADS_LIMIT: usize = MAX_QUADS;

    pub fn validate(mut self) -> Self {
        if self.max_quads == 0 || self.max_quads > Self::MAX_QUADS_LIMIT {
            log::warn!(
                "max_quads {} must be within 1..={}. Using {} instead.",
                self.max_quads,
                Self::MAX_QUADS_LIMIT,
                DEFAULT_MAX_QUADS
            );
            self.max_quads = DEFAULT_MAX_QUADS;
        }
        let clamped = self.texture_slots.clamp(2, MAX_TEXTURE_SLOTS);
        if clamped != self.texture_slots {
            log::warn!(
                "texture_slots {} must be within 2..={}. Using {}.",
                self.texture_slots,
                MAX_TEXTURE_SLOTS,
                clamped
            );
            self.texture_slots = clamped;
        }
        self
    }

    /// Bytes of the vertex and index buffers this configuration needs.
    pub fn buffer_sizes(&self) -> (u64, u64) {
        let vertex = self.max_quads * VERTICES_PER_QUAD * mem::size_of::<QuadVertex>();
        let index = self.max_quads * INDICES_PER_QUAD * mem::size_of::<u32>();
        (vertex as u64, index as u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub draw_count: u32,
    pub quad_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Ready,
    InBatch,
    /// `end_batch` uploaded the batch; `flush` has not drawn it yet.
    Ended,
    Shutdown,
}

/// Batches quads into as few indexed draw calls as the buffer capacity and
/// texture slot table allow.
///
/// Per frame: [`begin_batch`](Self::begin_batch), any number of
/// `draw_*quad` calls, [`end_batch`](Self::end_batch), then
/// [`flush`](Self::flush). Running out of quad capacity or texture slots
/// mid-batch flushes and restarts the batch transparently; the only visible
/// effect is an extra draw call in [`stats`](Self::stats). Beginning a new
/// batch while an ended one is still pending draws the pending one first.
pub struct BatchRenderer<B: RenderBackend> {
    backend: B,
    batch: QuadBatch,
    state: RendererState,
    stats: RendererStats,
}

impl<B: RenderBackend> BatchRenderer<B> {
    /// Allocates the GPU buffers, uploads the index pattern and creates the
    /// white texture. Any failure here is fatal to the renderer.
    pub fn init(mut backend: B, config: BatchConfig) -> Result<Self, RendererError> {
        let mut config = config.validate();

        let limit = backend.max_buffer_size();
        let (vertex_bytes, index_bytes) = config.buffer_sizes();
        if vertex_bytes.max(index_bytes) > limit {
            return Err(RendererError::BufferAllocation {
                what: "quad buffers",
                reason: format!(
                    "{} quads need {} vertex bytes and {} index bytes, device limit is {}",
                    config.max_quads, vertex_bytes, index_bytes, limit
                ),
            });
        }

        let backend_slots = backend.max_texture_slots();
        if config.texture_slots > backend_slots {
            log::info!(
                "Backend samples at most {} textures per draw call (requested {})",
                backend_slots,
                config.texture_slots
            );
            config.texture_slots = backend_slots;
        }

        let indices = quad_indices(config.max_quads);
        backend.create_buffers(config.max_quads * VERTICES_PER_QUAD, &indices)?;
        let white = backend.create_white_texture()?;

        log::info!(
            "Batch renderer ready: {} quads, {} texture slots per draw call",
            config.max_quads,
            config.texture_slots
        );

        Ok(Self {
            backend,
            batch: QuadBatch::new(config.max_quads, config.texture_slots, white),
            state: RendererState::Ready,
            stats: RendererStats::default(),
        })
    }

    pub fn shutdown(&mut self) {
        if !self.expect_state(&[RendererState::Ready], "shutdown") {
            return;
        }
        self.backend.release();
        self.state = RendererState::Shutdown;
        log::info!("Batch renderer shut down");
    }

    pub fn begin_batch(&mut self) {
        if !self.expect_state(&[RendererState::Ready, RendererState::Ended], "begin_batch") {
            return;
        }
        if self.state == RendererState::Ended {
            log::warn!(
                "begin_batch before flush; drawing {} pending quads first",
                self.batch.quads.quad_count()
            );
            self.draw_pending();
        }
        self.batch.reset();
        self.state = RendererState::InBatch;
    }

    /// Uploads the vertices written since `begin_batch`. Does not draw.
    pub fn end_batch(&mut self) {
        if !self.expect_state(&[RendererState::InBatch], "end_batch") {
            return;
        }
        if !self.batch.quads.is_empty() {
            self.backend.upload_vertices(self.batch.quads.vertices());
        }
        self.state = RendererState::Ended;
    }

    /// Binds every texture slot in use and issues one indexed draw call for
    /// the ended batch. An empty batch, or a second flush, issues nothing.
    pub fn flush(&mut self) {
        if !self.expect_state(&[RendererState::Ended, RendererState::Ready], "flush") {
            return;
        }
        self.draw_pending();
        self.state = RendererState::Ready;
    }

    fn draw_pending(&mut self) {
        let index_count = self.batch.quads.index_count();
        if index_count == 0 {
            return;
        }
        for (slot, texture) in self.batch.slots.iter() {
            self.backend.bind_texture(slot, texture);
        }
        self.backend.draw_indexed(index_count);
        self.stats.draw_count += 1;
        self.batch.reset();
    }

    /// Solid-color quad anchored at its bottom-left corner.
    pub fn draw_quad(&mut self, position: Vec2, size: Vec2, color: Vec4) {
        if !self.expect_state(&[RendererState::InBatch], "draw_quad") {
            return;
        }
        if let Some(reason) = self.batch.break_reason(None) {
            self.break_batch(reason);
        }
        self.batch.quads.push_quad(position, size, color, WHITE_SLOT);
        self.stats.quad_count += 1;
    }

    /// Textured quad anchored at its bottom-left corner, tinted opaque white.
    pub fn draw_textured_quad(&mut self, position: Vec2, size: Vec2, texture: TextureHandle) {
        if !self.expect_state(&[RendererState::InBatch], "draw_textured_quad") {
            return;
        }
        if let Some(reason) = self.batch.break_reason(Some(texture)) {
            self.break_batch(reason);
        }
        // A fresh table after a break always has room.
        let Some(slot) = self.batch.slots.assign(texture) else {
            log::error!("No texture slot available for {}", texture);
            return;
        };
        self.batch
            .quads
            .push_quad(position, size, Vec4::from_array(WHITE), slot);
        self.stats.quad_count += 1;
    }

    fn break_batch(&mut self, reason: BatchBreak) {
        log::trace!(
            "Batch break ({:?}) after {} quads, {} texture slots",
            reason,
            self.batch.quads.quad_count(),
            self.batch.slots.len()
        );
        self.end_batch();
        self.flush();
        self.begin_batch();
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RendererStats::default();
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn expect_state(&self, allowed: &[RendererState], operation: &str) -> bool {
        let valid = allowed.contains(&self.state);
        debug_assert!(valid, "{} called in state {:?}", operation, self.state);
        if !valid {
            log::error!(
                "{} called in state {:?}, expected one of {:?}; ignoring",
                operation,
                self.state,
                allowed
            );
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::{BackendCall, RecordingBackend};

    fn renderer(max_quads: usize) -> BatchRenderer<RecordingBackend> {
        BatchRenderer::init(
            RecordingBackend::new(),
            BatchConfig {
                max_quads,
                ..BatchConfig::default()
            },
        )
        .expect("init")
    }

    #[test]
    fn init_uploads_index_pattern_once() {
        let renderer = renderer(4);
        let backend = renderer.backend();
        assert_eq!(backend.indices.len(), 24);
        assert_eq!(
            backend.calls[0],
            BackendCall::CreateBuffers {
                vertex_capacity: 16,
                index_count: 24
            }
        );
        assert_eq!(renderer.state(), RendererState::Ready);
    }

    #[test]
    fn init_failure_is_reported() {
        let result = BatchRenderer::init(RecordingBackend::failing(), BatchConfig::default());
        assert!(matches!(
            result,
            Err(RendererError::BufferAllocation { .. })
        ));
    }

    #[test]
    fn config_validation_replaces_out_of_range_values() {
        let config = BatchConfig {
            max_quads: 0,
            texture_slots: 99,
        }
        .validate();
        assert_eq!(config.max_quads, DEFAULT_MAX_QUADS);
        assert_eq!(config.texture_slots, MAX_TEXTURE_SLOTS);
    }

    #[test]
    fn config_validation_rejects_quad_counts_overflowing_indices() {
        for max_quads in [800_000_000, u32::MAX as usize / INDICES_PER_QUAD + 1] {
            let config = BatchConfig {
                max_quads,
                ..BatchConfig::default()
            }
            .validate();
            assert_eq!(config.max_quads, DEFAULT_MAX_QUADS, "{} quads", max_quads);
        }

        let largest = BatchConfig {
            max_quads: BatchConfig::MAX_QUADS_LIMIT,
            ..BatchConfig::default()
        }
        .validate();
        assert_eq!(largest.max_quads, BatchConfig::MAX_QUADS_LIMIT);
        let index_count = largest.max_quads * INDICES_PER_QUAD;
        assert!(u32::try_from(index_count).is_ok());
    }

    #[test]
    fn init_rejects_buffers_over_backend_limit() {
        let config = BatchConfig {
            max_quads: 100,
            ..BatchConfig::default()
        };
        let (vertex_bytes, index_bytes) = config.buffer_sizes();
        assert_eq!(vertex_bytes, 100 * 4 * 40);
        assert_eq!(index_bytes, 100 * 6 * 4);

        let backend = RecordingBackend::with_limits(vertex_bytes - 1, 32);
        let result = BatchRenderer::init(backend, config);
        assert!(matches!(
            result,
            Err(RendererError::BufferAllocation { .. })
        ));

        let renderer = BatchRenderer::init(RecordingBackend::with_limits(vertex_bytes, 32), config)
            .expect("buffers fit exactly");
        assert_eq!(renderer.backend().indices.len(), 600);
    }

    #[test]
    fn init_limits_texture_slots_to_backend() {
        let mut renderer =
            BatchRenderer::init(RecordingBackend::with_limits(u64::MAX, 4), BatchConfig::default())
                .expect("init");
        renderer.begin_batch();
        for texture in 1..=7 {
            renderer.draw_textured_quad(Vec2::ZERO, Vec2::ONE, TextureHandle(texture));
        }
        renderer.end_batch();
        renderer.flush();
        assert_eq!(renderer.stats().draw_count, 3);
        assert!(renderer
            .backend()
            .draws
            .iter()
            .all(|draw| draw.textures.len() <= 4));
    }

    #[test]
    fn end_batch_uploads_written_prefix_only() {
        let mut renderer = renderer(100);
        renderer.begin_batch();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        renderer.draw_quad(Vec2::ONE, Vec2::ONE, Vec4::ONE);
        renderer.end_batch();
        assert_eq!(
            renderer.backend().calls.last(),
            Some(&BackendCall::UploadVertices(8))
        );
        assert_eq!(renderer.backend().draw_calls(), 0);
        assert_eq!(renderer.state(), RendererState::Ended);
    }

    #[test]
    fn begin_after_end_draws_pending_quads() {
        let mut renderer = renderer(100);
        renderer.begin_batch();
        for i in 0..3 {
            renderer.draw_quad(Vec2::new(i as f32, 0.0), Vec2::ONE, Vec4::ONE);
        }
        renderer.end_batch();
        renderer.begin_batch();
        renderer.draw_quad(Vec2::new(9.0, 0.0), Vec2::ONE, Vec4::ONE);
        renderer.end_batch();
        renderer.flush();

        assert_eq!(
            renderer.stats(),
            RendererStats {
                draw_count: 2,
                quad_count: 4
            }
        );
        let draws = &renderer.backend().draws;
        let drawn: u32 = draws.iter().map(|draw| draw.index_count / 6).sum();
        assert_eq!(drawn, 4);
        assert_eq!(draws[0].vertices.len(), 12);
        assert_eq!(draws[1].vertices[0].position[0], 9.0);
        assert_eq!(renderer.state(), RendererState::Ready);
    }

    #[test]
    fn second_flush_issues_no_draw() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        renderer.end_batch();
        renderer.flush();
        renderer.flush();
        assert_eq!(renderer.backend().draw_calls(), 1);
        assert_eq!(renderer.stats().draw_count, 1);
    }

    #[test]
    fn flush_without_quads_issues_no_draw() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.end_batch();
        renderer.flush();
        assert_eq!(renderer.stats(), RendererStats::default());
        assert_eq!(renderer.backend().draw_calls(), 0);
    }

    #[test]
    fn solid_quads_sample_white_slot() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::new(0.8, 0.2, 0.3, 1.0));
        renderer.end_batch();
        renderer.flush();
        let draw = &renderer.backend().draws[0];
        assert!(draw.vertices.iter().all(|v| v.tex_index == WHITE_SLOT));
        assert!(draw.vertices.iter().all(|v| v.color == [0.8, 0.2, 0.3, 1.0]));
        assert_eq!(draw.textures.len(), 1);
    }

    #[test]
    fn textured_quads_use_white_tint() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.draw_textured_quad(Vec2::ZERO, Vec2::ONE, TextureHandle(42));
        renderer.end_batch();
        renderer.flush();
        let draw = &renderer.backend().draws[0];
        assert!(draw.vertices.iter().all(|v| v.tex_index == 1));
        assert!(draw.vertices.iter().all(|v| v.color == WHITE));
        assert_eq!(draw.textures[1], (1, TextureHandle(42)));
    }

    #[test]
    fn shutdown_releases_backend() {
        let mut renderer = renderer(10);
        renderer.shutdown();
        assert_eq!(renderer.state(), RendererState::Shutdown);
        assert_eq!(renderer.backend().calls.last(), Some(&BackendCall::Release));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "draw_quad called in state Ready")]
    fn draw_outside_batch_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "begin_batch called in state InBatch")]
    fn nested_begin_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.begin_batch();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "draw_textured_quad called in state Ended")]
    fn draw_after_end_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.end_batch();
        renderer.draw_textured_quad(Vec2::ZERO, Vec2::ONE, TextureHandle(1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "flush called in state InBatch")]
    fn flush_inside_batch_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        renderer.flush();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "end_batch called in state Ready")]
    fn end_without_begin_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.end_batch();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "shutdown called in state InBatch")]
    fn shutdown_inside_batch_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.begin_batch();
        renderer.shutdown();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "begin_batch called in state Shutdown")]
    fn begin_after_shutdown_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.shutdown();
        renderer.begin_batch();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "draw_quad called in state Shutdown")]
    fn draw_after_shutdown_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.shutdown();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "flush called in state Shutdown")]
    fn flush_after_shutdown_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.shutdown();
        renderer.flush();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "shutdown called in state Shutdown")]
    fn double_shutdown_panics_in_debug() {
        let mut renderer = renderer(10);
        renderer.shutdown();
        renderer.shutdown();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn contract_violations_are_ignored_in_release() {
        let mut renderer = renderer(10);
        let calls_after_init = renderer.backend().calls.len();

        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        renderer.end_batch();
        assert_eq!(renderer.state(), RendererState::Ready);
        assert_eq!(renderer.stats(), RendererStats::default());
        assert_eq!(renderer.backend().calls.len(), calls_after_init);

        renderer.begin_batch();
        renderer.draw_quad(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        renderer.begin_batch();
        renderer.flush();
        renderer.shutdown();
        assert_eq!(renderer.state(), RendererState::InBatch);
        assert_eq!(renderer.backend().draw_calls(), 0);
        assert_eq!(
            renderer.stats(),
            RendererStats {
                draw_count: 0,
                quad_count: 1
            }
        );

        renderer.end_batch();
        renderer.flush();
        renderer.shutdown();
        let calls_after_shutdown = renderer.backend().calls.len();
        renderer.begin_batch();
        renderer.draw_textured_quad(Vec2::ZERO, Vec2::ONE, TextureHandle(3));
        renderer.end_batch();
        renderer.flush();
        renderer.shutdown();
        assert_eq!(renderer.state(), RendererState::Shutdown);
        assert_eq!(renderer.backend().calls.len(), calls_after_shutdown);
        assert_eq!(
            renderer.stats(),
            RendererStats {
                draw_count: 1,
                quad_count: 1
            }
        );
    }
}

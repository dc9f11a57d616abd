// renderer/batch.rs
use glam::{Vec2, Vec4};

use super::backend::TextureHandle;
use super::vertex::{QuadVertex, WHITE_SLOT};

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// Size of the shader's `binding_array` of textures.
pub const MAX_TEXTURE_SLOTS: usize = 32;

/// Upper bound on the quad capacity of one batch.
pub const MAX_QUADS: usize = 1 << 20;

// Every index of a full batch, and the index count itself, must fit in u32.
const _: () = assert!(MAX_QUADS * INDICES_PER_QUAD <= u32::MAX as usize);

const QUAD_INDEX_PATTERN: [u32; INDICES_PER_QUAD] = [0, 1, 2, 2, 3, 0];

const QUAD_TEX_COORDS: [[f32; 2]; VERTICES_PER_QUAD] =
    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Index data for `max_quads` quads. Generated once and never mutated.
pub fn quad_indices(max_quads: usize) -> Vec<u32> {
    (0..max_quads)
        .flat_map(|quad| {
            let base = (quad * VERTICES_PER_QUAD) as u32;
            QUAD_INDEX_PATTERN.iter().map(move |i| base + i)
        })
        .collect()
}

/// Corner positions of a quad anchored at its bottom-left corner, in
/// counter-clockwise order to match [`QUAD_INDEX_PATTERN`].
pub fn quad_corners(position: Vec2, size: Vec2) -> [[f32; 3]; VERTICES_PER_QUAD] {
    let (x, y) = (position.x, position.y);
    let (w, h) = (size.x, size.y);
    [
        [x, y, 0.0],
        [x + w, y, 0.0],
        [x + w, y + h, 0.0],
        [x, y + h, 0.0],
    ]
}

/// Fixed-capacity staging arena mirroring the GPU vertex buffer.
pub struct QuadBuffer {
    vertices: Vec<QuadVertex>,
    max_quads: usize,
}

impl QuadBuffer {
    /// `max_quads` is clamped to [`MAX_QUADS`].
    pub fn new(max_quads: usize) -> Self {
        let max_quads = max_quads.min(MAX_QUADS);
        Self {
            vertices: Vec::with_capacity(max_quads * VERTICES_PER_QUAD),
            max_quads,
        }
    }

    pub fn push_quad(&mut self, position: Vec2, size: Vec2, color: Vec4, tex_index: u32) {
        debug_assert!(!self.is_full(), "quad buffer overflow");
        let color = color.to_array();
        let corners = quad_corners(position, size);
        self.vertices
            .extend(corners.iter().zip(QUAD_TEX_COORDS.iter()).map(|(&position, &tex_coord)| {
                QuadVertex {
                    position,
                    color,
                    tex_coord,
                    tex_index,
                }
            }));
    }

    pub fn is_full(&self) -> bool {
        self.quad_count() >= self.max_quads
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn reset(&mut self) {
        self.vertices.clear();
    }

    /// Only the vertices written since the last reset.
    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    /// Never truncates: the quad count is bounded by [`MAX_QUADS`].
    pub fn index_count(&self) -> u32 {
        (self.quad_count() * INDICES_PER_QUAD) as u32
    }
}

/// Texture handle to shader slot table. Slot 0 always holds the white texture.
/// Lookups are a linear scan; the table never exceeds [`MAX_TEXTURE_SLOTS`].
pub struct TextureSlots {
    slots: [Option<TextureHandle>; MAX_TEXTURE_SLOTS],
    len: usize,
    capacity: usize,
}

impl TextureSlots {
    pub fn new(white: TextureHandle, capacity: usize) -> Self {
        let capacity = capacity.clamp(2, MAX_TEXTURE_SLOTS);
        let mut slots = [None; MAX_TEXTURE_SLOTS];
        slots[WHITE_SLOT as usize] = Some(white);
        Self {
            slots,
            len: 1,
            capacity,
        }
    }

    pub fn find(&self, texture: TextureHandle) -> Option<u32> {
        self.slots[..self.len]
            .iter()
            .position(|slot| *slot == Some(texture))
            .map(|slot| slot as u32)
    }

    /// Returns the slot already holding `texture`, or binds it to the next
    /// free slot. `None` means the table is full.
    pub fn assign(&mut self, texture: TextureHandle) -> Option<u32> {
        if let Some(slot) = self.find(texture) {
            return Some(slot);
        }
        if self.is_full() {
            return None;
        }
        let slot = self.len;
        self.slots[slot] = Some(texture);
        self.len += 1;
        Some(slot as u32)
    }

    /// Drops every binding except the white texture in slot 0.
    pub fn reset(&mut self) {
        for slot in &mut self.slots[1..] {
            *slot = None;
        }
        self.len = 1;
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, TextureHandle)> + '_ {
        self.slots[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(slot, texture)| texture.map(|t| (slot as u32, t)))
    }
}

/// Why the current batch has to be flushed before the next quad goes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchBreak {
    QuadCapacity,
    TextureSlots,
}

/// In-flight batch state: staged vertices plus the slot table they reference.
pub struct QuadBatch {
    pub(crate) quads: QuadBuffer,
    pub(crate) slots: TextureSlots,
}

impl QuadBatch {
    pub fn new(max_quads: usize, texture_slots: usize, white: TextureHandle) -> Self {
        Self {
            quads: QuadBuffer::new(max_quads),
            slots: TextureSlots::new(white, texture_slots),
        }
    }

    pub fn reset(&mut self) {
        self.quads.reset();
        self.slots.reset();
    }

    /// Checks whether inserting a quad sampling `texture` (or the white
    /// texture when `None`) needs a fresh batch first.
    pub fn break_reason(&self, texture: Option<TextureHandle>) -> Option<BatchBreak> {
        if self.quads.is_full() {
            return Some(BatchBreak::QuadCapacity);
        }
        match texture {
            Some(texture) if self.slots.find(texture).is_none() && self.slots.is_full() => {
                Some(BatchBreak::TextureSlots)
            }
            _ => None,
        }
    }
}

use std::path::Path;

use glam::{Vec2, Vec4};
use winit::keyboard::KeyCode;

use crate::renderer::{BatchRenderer, RenderBackend, TextureHandle, WgpuBackend};

pub const CHECKERBOARD_TEXTURE: &str = "assets/checkerboard.png";
pub const LOGO_TEXTURE: &str = "assets/logo.png";

const TEXTURED_GRID: i32 = 5;
const COLOR_GRID_EXTENT: f32 = 10.0;
const COLOR_GRID_STEP: f32 = 0.25;
const COLOR_QUAD_SIZE: f32 = 0.2;
const QUAD_MOVE_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct SandboxTextures {
    pub primary: TextureHandle,
    pub secondary: TextureHandle,
}

impl SandboxTextures {
    /// Loads the demo textures from disk, generating a checker pattern for
    /// any file that cannot be read.
    pub fn load(backend: &mut WgpuBackend) -> Self {
        let primary = Self::load_or_generate(
            backend,
            CHECKERBOARD_TEXTURE,
            [[230, 230, 230, 255], [40, 40, 40, 255]],
        );
        let secondary = Self::load_or_generate(
            backend,
            LOGO_TEXTURE,
            [[255, 140, 0, 255], [20, 60, 160, 255]],
        );
        Self { primary, secondary }
    }

    fn load_or_generate(
        backend: &mut WgpuBackend,
        path: impl AsRef<Path>,
        colors: [[u8; 4]; 2],
    ) -> TextureHandle {
        let path = path.as_ref();
        match backend.load_texture(path) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("{}. Using a generated checker texture instead.", err);
                let image = checker_image(64, 8, colors);
                backend.add_texture(&image, path.to_str())
            }
        }
    }
}

/// Square RGBA image of alternating `cell`-sized squares.
pub fn checker_image(size: u32, cell: u32, colors: [[u8; 4]; 2]) -> image::RgbaImage {
    let cell = cell.max(1);
    image::RgbaImage::from_fn(size, size, |x, y| {
        let index = ((x / cell + y / cell) % 2) as usize;
        image::Rgba(colors[index])
    })
}

/// Gradient color of the background grid at world position (x, y).
pub fn grid_color(x: f32, y: f32) -> Vec4 {
    Vec4::new(
        (x + COLOR_GRID_EXTENT) / (2.0 * COLOR_GRID_EXTENT),
        0.2,
        (y + COLOR_GRID_EXTENT) / (2.0 * COLOR_GRID_EXTENT),
        1.0,
    )
}

/// The demo frame: a textured checkerboard, one movable textured quad and a
/// dense grid of colored quads behind them.
#[derive(Debug)]
pub struct Sandbox {
    textures: SandboxTextures,
    quad_position: Vec2,
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl Sandbox {
    pub fn new(textures: SandboxTextures) -> Self {
        Self {
            textures,
            quad_position: Vec2::new(-1.5, -0.5),
            up: false,
            down: false,
            left: false,
            right: false,
        }
    }

    pub fn quad_position(&self) -> Vec2 {
        self.quad_position
    }

    /// Arrow keys move the free-standing quad.
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        match key {
            KeyCode::ArrowUp => self.up = pressed,
            KeyCode::ArrowDown => self.down = pressed,
            KeyCode::ArrowLeft => self.left = pressed,
            KeyCode::ArrowRight => self.right = pressed,
            _ => return false,
        }
        true
    }

    /// Held arrow keys as a direction; opposite keys cancel out.
    fn direction(&self) -> Vec2 {
        let mut direction = Vec2::ZERO;
        if self.up {
            direction.y += 1.0;
        }
        if self.down {
            direction.y -= 1.0;
        }
        if self.right {
            direction.x += 1.0;
        }
        if self.left {
            direction.x -= 1.0;
        }
        direction
    }

    pub fn update(&mut self, dt: f32) {
        self.quad_position += self.direction() * QUAD_MOVE_SPEED * dt;
    }

    /// Number of quads one frame submits.
    pub fn quad_count() -> usize {
        let per_axis = (2.0 * COLOR_GRID_EXTENT / COLOR_GRID_STEP) as usize;
        (TEXTURED_GRID * TEXTURED_GRID) as usize + 1 + per_axis * per_axis
    }

    pub fn render<B: RenderBackend>(&self, renderer: &mut BatchRenderer<B>) {
        renderer.reset_stats();
        renderer.begin_batch();

        for y in 0..TEXTURED_GRID {
            for x in 0..TEXTURED_GRID {
                let texture = if (x + y) % 2 == 0 {
                    self.textures.primary
                } else {
                    self.textures.secondary
                };
                renderer.draw_textured_quad(Vec2::new(x as f32, y as f32), Vec2::ONE, texture);
            }
        }
        renderer.draw_textured_quad(self.quad_position, Vec2::ONE, self.textures.primary);

        let size = Vec2::splat(COLOR_QUAD_SIZE);
        let mut y = -COLOR_GRID_EXTENT;
        while y < COLOR_GRID_EXTENT {
            let mut x = -COLOR_GRID_EXTENT;
            while x < COLOR_GRID_EXTENT {
                renderer.draw_quad(Vec2::new(x, y), size, grid_color(x, y));
                x += COLOR_GRID_STEP;
            }
            y += COLOR_GRID_STEP;
        }

        renderer.end_batch();
        renderer.flush();
    }
}

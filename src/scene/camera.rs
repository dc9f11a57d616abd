use glam::{Mat4, Vec2, Vec3};
use winit::event::MouseScrollDelta;
use winit::keyboard::KeyCode;

const MIN_ZOOM: f32 = 0.25;
const ZOOM_STEP: f32 = 0.25;
/// Scroll distance in pixels that counts as one wheel line.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Clone, Copy, Debug)]
pub struct OrthographicCamera {
    pub position: Vec2,
    pub aspect: f32,
    /// Half of the visible height in world units.
    pub zoom: f32,
}

impl OrthographicCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec2::ZERO,
            aspect,
            zoom: 1.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(-self.position.extend(0.0))
    }

    pub fn proj(&self) -> Mat4 {
        let half_width = self.aspect * self.zoom;
        Mat4::orthographic_rh(
            -half_width,
            half_width,
            -self.zoom,
            self.zoom,
            -1.0,
            1.0,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }
}

/// WASD pans, the mouse wheel zooms. Pan speed scales with the zoom level so
/// the camera covers the same share of the screen at any zoom.
#[derive(Debug)]
pub struct CameraController {
    camera: OrthographicCamera,
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl CameraController {
    pub fn new(aspect: f32) -> Self {
        Self {
            camera: OrthographicCamera::new(aspect),
            up: false,
            down: false,
            left: false,
            right: false,
        }
    }

    pub fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }

    /// Returns true when the key is one the controller reacts to.
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        match key {
            KeyCode::KeyW => self.up = pressed,
            KeyCode::KeyS => self.down = pressed,
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            _ => return false,
        }
        true
    }

    pub fn handle_scroll(&mut self, delta: MouseScrollDelta) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
        };
        self.zoom_by(lines);
    }

    pub fn zoom_by(&mut self, lines: f32) {
        self.camera.zoom = (self.camera.zoom - lines * ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if height == 0 {
            return;
        }
        self.camera.aspect = width as f32 / height as f32;
    }

    pub fn update(&mut self, dt: f32) {
        let mut direction = Vec3::ZERO;
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
        self.camera.position += direction.truncate() * self.camera.zoom * dt;
    }
}

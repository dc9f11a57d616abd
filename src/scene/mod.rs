pub mod camera;
pub mod sandbox;

pub use camera::{CameraController, OrthographicCamera};
pub use sandbox::{Sandbox, SandboxTextures};

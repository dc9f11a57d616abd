// renderer/texture.rs
use std::path::Path;

use super::backend::TextureHandle;
use super::error::RendererError;

#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    /// Decodes an image file into an RGBA8 texture. Images are flipped
    /// vertically so that texture coordinate (0, 0) is the bottom-left texel.
    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: impl AsRef<Path>,
    ) -> Result<Self, RendererError> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);

        let img = image::open(path).map_err(|source| RendererError::TextureLoad {
            path: path.display().to_string(),
            source,
        })?;
        let rgba = img.flipv().to_rgba8();

        Ok(Self::from_rgba8(device, queue, &rgba, path.to_str()))
    }

    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::RgbaImage,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = image.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("Uploaded {}x{} texture {:?}", width, height, label);

        Self { texture, view }
    }

    /// 1x1 opaque white texture bound to slot 0.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let pixel = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        Self::from_rgba8(device, queue, &pixel, Some("WhiteTexture"))
    }
}

/// Owns every texture the host has uploaded and hands out [`TextureHandle`]s.
#[derive(Default)]
pub struct TextureRegistry {
    textures: Vec<Option<Texture>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(Some(texture));
        handle
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures
            .get(handle.0 as usize)
            .and_then(|texture| texture.as_ref())
    }

    pub fn remove(&mut self, handle: TextureHandle) -> Option<Texture> {
        self.textures
            .get_mut(handle.0 as usize)
            .and_then(|texture| texture.take())
    }
}

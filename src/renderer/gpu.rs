// renderer/gpu.rs
use std::mem;
use std::path::Path;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::renderer::backend::{RenderBackend, TextureHandle};
use crate::renderer::batch::MAX_TEXTURE_SLOTS;
use crate::renderer::context::GpuContext;
use crate::renderer::error::RendererError;
use crate::renderer::pipeline::QuadPipeline;
use crate::renderer::texture::{Texture, TextureRegistry};
use crate::renderer::{CameraUniform, QuadVertex};

struct QuadBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

struct FrameTarget {
    frame: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// [`RenderBackend`] on top of wgpu. Every draw call records and submits its
/// own render pass that loads what earlier passes of the frame produced, so
/// batch breaks keep submission order.
pub struct WgpuBackend {
    context: GpuContext,
    pipeline: QuadPipeline,
    textures: TextureRegistry,
    buffers: Option<QuadBuffers>,
    white: Option<TextureHandle>,
    slots: [Option<TextureHandle>; MAX_TEXTURE_SLOTS],
    frame: Option<FrameTarget>,
}

impl WgpuBackend {
    pub fn new(context: GpuContext) -> Self {
        let pipeline = QuadPipeline::new(
            &context.device,
            context.config.format,
            context.texture_model,
        );
        Self {
            context,
            pipeline,
            textures: TextureRegistry::new(),
            buffers: None,
            white: None,
            slots: [None; MAX_TEXTURE_SLOTS],
            frame: None,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.context.aspect_ratio()
    }

    pub fn set_view_proj(&self, view_proj: glam::Mat4) {
        let uniform = CameraUniform::from_matrix(view_proj);
        self.context.queue.write_buffer(
            &self.pipeline.camera_buffer,
            0,
            bytemuck::bytes_of(&uniform),
        );
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureHandle, RendererError> {
        let texture = Texture::from_path(&self.context.device, &self.context.queue, path)?;
        Ok(self.textures.insert(texture))
    }

    pub fn add_texture(&mut self, image: &image::RgbaImage, label: Option<&str>) -> TextureHandle {
        let texture = Texture::from_rgba8(&self.context.device, &self.context.queue, image, label);
        self.textures.insert(texture)
    }

    /// Acquires the next surface texture and clears it.
    pub fn begin_frame(&mut self, clear_color: wgpu::Color) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("ClearEncoder"),
                });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ClearPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.context.queue.submit(Some(encoder.finish()));

        self.frame = Some(FrameTarget { frame, view });
        Ok(())
    }

    pub fn end_frame(&mut self) {
        if let Some(FrameTarget { frame, view }) = self.frame.take() {
            drop(view);
            frame.present();
        }
    }

    pub fn reconfigure(&mut self) {
        self.frame = None;
        self.context.reconfigure();
    }

    fn allocation_error(what: &'static str, err: impl std::fmt::Display) -> RendererError {
        RendererError::BufferAllocation {
            what,
            reason: err.to_string(),
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn max_buffer_size(&self) -> u64 {
        self.context.device.limits().max_buffer_size
    }

    fn max_texture_slots(&self) -> usize {
        self.pipeline.model.texture_slots()
    }

    fn create_buffers(
        &mut self,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> Result<(), RendererError> {
        let device = &self.context.device;
        let vertex_size = (vertex_capacity * mem::size_of::<QuadVertex>()) as wgpu::BufferAddress;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("QuadVertexBuffer"),
            size: vertex_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("QuadIndexBuffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Self::allocation_error("quad buffers", err));
        }
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Self::allocation_error("quad buffers", err));
        }

        log::info!(
            "Allocated quad buffers: {} vertices ({} bytes), {} indices",
            vertex_capacity,
            vertex_size,
            indices.len()
        );

        self.buffers = Some(QuadBuffers { vertex, index });
        Ok(())
    }

    fn create_white_texture(&mut self) -> Result<TextureHandle, RendererError> {
        let texture = Texture::white(&self.context.device, &self.context.queue);
        let handle = self.textures.insert(texture);
        self.white = Some(handle);
        Ok(handle)
    }

    fn upload_vertices(&mut self, vertices: &[QuadVertex]) {
        let Some(buffers) = &self.buffers else {
            log::warn!("Vertex upload without allocated buffers");
            return;
        };
        self.context
            .queue
            .write_buffer(&buffers.vertex, 0, bytemuck::cast_slice(vertices));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) {
        let slot_count = self.pipeline.model.texture_slots();
        match self.slots[..slot_count].get_mut(slot as usize) {
            Some(entry) => *entry = Some(texture),
            None => log::warn!("Texture slot {} out of range", slot),
        }
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let (Some(buffers), Some(target)) = (&self.buffers, &self.frame) else {
            log::warn!("Draw call outside of a frame; skipping {} indices", index_count);
            return;
        };
        let Some(white) = self.white.and_then(|handle| self.textures.get(handle)) else {
            log::warn!("Draw call without the white texture; skipping");
            return;
        };

        let device = &self.context.device;
        {
            let slot_count = self.pipeline.model.texture_slots();
            let views: Vec<&wgpu::TextureView> = self.slots[..slot_count]
                .iter()
                .map(|slot| match slot.and_then(|handle| self.textures.get(handle)) {
                    Some(texture) => &texture.view,
                    None => {
                        if let Some(handle) = slot {
                            log::warn!("Unknown texture {} bound; sampling white", handle);
                        }
                        &white.view
                    }
                })
                .collect();
            let texture_bind_group = self.pipeline.texture_bind_group(device, &views);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("QuadEncoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("QuadPass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                pass.set_pipeline(&self.pipeline.pipeline);
                pass.set_bind_group(0, &self.pipeline.camera_bind_group, &[]);
                pass.set_bind_group(1, &texture_bind_group, &[]);
                pass.set_vertex_buffer(0, buffers.vertex.slice(..));
                pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..index_count, 0, 0..1);
            }
            self.context.queue.submit(Some(encoder.finish()));
        }

        self.slots = [None; MAX_TEXTURE_SLOTS];
    }

    fn release(&mut self) {
        self.buffers = None;
        if let Some(white) = self.white.take() {
            self.textures.remove(white);
        }
        self.slots = [None; MAX_TEXTURE_SLOTS];
        log::info!("Released quad buffers");
    }
}

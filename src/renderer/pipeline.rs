use std::mem;
use std::num::{NonZeroU32, NonZeroU64};

use wgpu::util::DeviceExt;

use crate::renderer::batch::MAX_TEXTURE_SLOTS;
use crate::renderer::{CameraUniform, QuadVertex};

/// Individually bound texture slots without binding arrays. Matches the
/// default `max_sampled_textures_per_shader_stage`.
pub(crate) const CLASSIC_TEXTURE_SLOTS: usize = 16;

/// How the texture slot table reaches the fragment shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextureBindingModel {
    /// One `binding_array` of [`MAX_TEXTURE_SLOTS`] textures.
    Bindless,
    /// [`CLASSIC_TEXTURE_SLOTS`] separate bindings selected by a switch.
    Classic,
}

impl TextureBindingModel {
    pub(crate) fn texture_slots(self) -> usize {
        match self {
            TextureBindingModel::Bindless => MAX_TEXTURE_SLOTS,
            TextureBindingModel::Classic => CLASSIC_TEXTURE_SLOTS,
        }
    }

    fn sampler_binding(self) -> u32 {
        match self {
            TextureBindingModel::Bindless => 1,
            TextureBindingModel::Classic => CLASSIC_TEXTURE_SLOTS as u32,
        }
    }

    fn shader_source(self) -> &'static str {
        match self {
            TextureBindingModel::Bindless => include_str!("../shader/quad.wgsl"),
            TextureBindingModel::Classic => include_str!("../shader/quad_classic.wgsl"),
        }
    }

    fn layout_entries(self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let texture = |binding: u32, count: Option<NonZeroU32>| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count,
        };
        let mut entries = match self {
            TextureBindingModel::Bindless => {
                vec![texture(0, NonZeroU32::new(MAX_TEXTURE_SLOTS as u32))]
            }
            TextureBindingModel::Classic => (0..CLASSIC_TEXTURE_SLOTS as u32)
                .map(|binding| texture(binding, None))
                .collect(),
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: self.sampler_binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        entries
    }
}

/// Render pipeline plus the bind group layouts the quad shader declares.
pub(crate) struct QuadPipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) camera_buffer: wgpu::Buffer,
    pub(crate) camera_bind_group: wgpu::BindGroup,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pub(crate) sampler: wgpu::Sampler,
    pub(crate) model: TextureBindingModel,
}

impl QuadPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        model: TextureBindingModel,
    ) -> Self {
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("CameraBuffer"),
            contents: bytemuck::bytes_of(&CameraUniform::new()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("CameraBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(mem::size_of::<CameraUniform>() as u64),
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("CameraBindGroup"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TextureSlotsBindLayout"),
            entries: &model.layout_entries(),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("QuadSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("QuadShader"),
            source: wgpu::ShaderSource::Wgsl(model.shader_source().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("QuadPipelineLayout"),
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("QuadPipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
                strip_index_format: None,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            camera_buffer,
            camera_bind_group,
            texture_layout,
            sampler,
            model,
        }
    }

    /// Bind group exposing `views` as the shader's texture slots. Expects
    /// exactly `model.texture_slots()` views.
    pub(crate) fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        views: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        let mut entries = match self.model {
            TextureBindingModel::Bindless => vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureViewArray(views),
            }],
            TextureBindingModel::Classic => views
                .iter()
                .enumerate()
                .map(|(binding, view)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect(),
        };
        entries.push(wgpu::BindGroupEntry {
            binding: self.model.sampler_binding(),
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("TextureSlotsBindGroup"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

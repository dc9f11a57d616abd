use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::renderer::batch::MAX_TEXTURE_SLOTS;
use crate::renderer::error::RendererError;
use crate::renderer::pipeline::TextureBindingModel;
use crate::settings::RenderSettings;

/// Features the bindless quad shader needs to index its texture array per
/// fragment.
pub fn bindless_features() -> wgpu::Features {
    wgpu::Features::TEXTURE_BINDING_ARRAY
        | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING
}

/// Picks the bindless path when the adapter has every feature it needs.
pub(crate) fn texture_binding_model(adapter_features: wgpu::Features) -> TextureBindingModel {
    if adapter_features.contains(bindless_features()) {
        TextureBindingModel::Bindless
    } else {
        TextureBindingModel::Classic
    }
}

pub struct GpuContext {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) config: wgpu::SurfaceConfiguration,
    pub(crate) size: PhysicalSize<u32>,
    pub(crate) texture_model: TextureBindingModel,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, RendererError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let texture_model = texture_binding_model(adapter.features());
        let (required_features, limits) = match texture_model {
            TextureBindingModel::Bindless => {
                log::info!("Bindless textures enabled");
                (
                    bindless_features(),
                    wgpu::Limits {
                        max_binding_array_elements_per_shader_stage: MAX_TEXTURE_SLOTS as u32,
                        ..wgpu::Limits::default()
                    },
                )
            }
            TextureBindingModel::Classic => {
                log::warn!(
                    "Texture binding arrays not supported; binding {} texture slots individually",
                    texture_model.texture_slots()
                );
                (wgpu::Features::empty(), wgpu::Limits::default())
            }
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features,
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let present_mode = settings.present_mode(&surface_caps.present_modes);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            texture_model,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Reconfigures the surface with its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }
}

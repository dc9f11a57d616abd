use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::renderer::BatchConfig;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f64; 4],
    #[serde(default = "RenderSettings::default_max_quads")]
    pub max_quads: usize,
    #[serde(default = "RenderSettings::default_texture_slots")]
    pub texture_slots: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            clear_color: Self::default_clear_color(),
            max_quads: Self::default_max_quads(),
            texture_slots: Self::default_texture_slots(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path(SETTINGS_FILE)
    }

    /// Reads settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(settings) => {
                info!("Loaded render settings from {:?}", path);
                settings
            }
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "{} ({:?}). Falling back to default render settings.",
                    err, path
                );
                RenderSettings::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str::<RenderSettings>(&contents)?;
        Ok(settings.validate())
    }

    fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        let batch = self.batch_config().validate();
        self.max_quads = batch.max_quads;
        self.texture_slots = batch.texture_slots;

        self
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_quads: self.max_quads,
            texture_slots: self.texture_slots,
        }
    }

    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_clear_color() -> [f64; 4] {
        [0.1, 0.1, 0.1, 1.0]
    }

    const fn default_max_quads() -> usize {
        crate::renderer::quad_renderer::DEFAULT_MAX_QUADS
    }

    const fn default_texture_slots() -> usize {
        crate::renderer::MAX_TEXTURE_SLOTS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let invalid = RenderSettings {
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            max_quads: 0,
            texture_slots: 1,
            ..RenderSettings::default()
        };

        let validated = invalid.validate();

        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
        assert_eq!(validated.max_quads, RenderSettings::default().max_quads);
        assert_eq!(validated.texture_slots, 2);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            max_quads: 500,
            texture_slots: 8,
            ..RenderSettings::default()
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.resolution.width, valid.resolution.width);
        assert_eq!(validated.max_quads, 500);
        assert_eq!(validated.texture_slots, 8);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "max_quads": 250, "present_mode": "mailbox" }"#)
                .expect("parse");
        assert_eq!(settings.max_quads, 250);
        assert_eq!(settings.texture_slots, 32);
        assert_eq!(settings.clear_color, [0.1, 0.1, 0.1, 1.0]);
        assert!(matches!(settings.present_mode, PresentModeSetting::Mailbox));
    }

    #[test]
    fn oversized_max_quads_is_replaced() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "max_quads": 800000000 }"#).expect("parse");
        let validated = settings.validate();
        assert_eq!(validated.max_quads, RenderSettings::default().max_quads);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.max_quads, RenderSettings::default().max_quads);
        assert!(matches!(
            RenderSettings::try_load_from_path("does/not/exist/settings.json"),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Immediate
        );
    }
}

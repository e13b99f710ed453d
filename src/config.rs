// Configuration loaded from config.toml.
//
// Every section falls back to sensible defaults when the file is missing
// or a key is absent, so the binary runs with no config at all.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub controls: ControlsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkmarch".to_string(),
            width: 800,
            height: 800,
            fullscreen: true,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    /// When true, each swapchain image gets its own uniform buffer and
    /// descriptor set, so the per-frame host write never lands in a buffer
    /// an in-flight draw may still be reading. When false a single shared
    /// uniform buffer is written every frame (documented race, see DESIGN.md).
    pub per_image_uniforms: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames_in_flight: 2,
            per_image_uniforms: false,
        }
    }
}

/// Camera control tuning
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// World units per second while a movement key is held
    pub move_speed: f32,
    /// Radians of rotation per mouse count
    pub mouse_sensitivity: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            move_speed: 100.0,
            mouse_sensitivity: 0.1,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get present mode as Vulkan enum
    pub fn get_present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 800);
        assert_eq!(config.graphics.max_frames_in_flight, 2);
        assert!(!config.graphics.per_image_uniforms);
        assert_eq!(config.controls.move_speed, 100.0);
        assert_eq!(config.controls.mouse_sensitivity, 0.1);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [controls]
            move_speed = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(config.controls.move_speed, 25.0);
        assert_eq!(config.controls.mouse_sensitivity, 0.1);
        assert_eq!(config.window.title, "vkmarch");
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config: Config = toml::from_str(
            r#"
            [graphics]
            present_mode = "quadruple-buffered"
            "#,
        )
        .unwrap();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn present_mode_strings_map_to_vulkan_enums() {
        let mut config = Config::default();
        config.graphics.present_mode = "mailbox".to_string();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::MAILBOX);
        config.graphics.present_mode = "Immediate".to_string();
        assert_eq!(
            config.get_present_mode(),
            ash::vk::PresentModeKHR::IMMEDIATE
        );
    }
}

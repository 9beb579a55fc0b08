// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section and key is optional. A missing file or a parse error falls
// back to the defaults below.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShadersConfig,
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
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Quad".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
            resizable: true,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Precompiled SPIR-V locations, relative to the working directory
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShadersConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShadersConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/quad.vert.spv"),
            fragment: PathBuf::from("shaders/quad.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "vulkan_debug.log".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, see [`Config::load_or_default`]
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default("config.toml")
    }

    /// Load from `path`, falling back to defaults on any error.
    ///
    /// The error is handed back instead of logged because this runs before
    /// the logger (whose target it configures) is installed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Whether to enable the Khronos validation layer. Release builds never do.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }

    /// Preferred present mode as a Vulkan enum
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.window.resizable);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/quad.vert.spv"));
        assert_eq!(config.shaders.fragment, PathBuf::from("shaders/quad.frag.spv"));
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [window]
            title = "Spinning"
            width = 800

            [debug]
            show_fps = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Spinning");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert!(!config.debug.show_fps);
        assert!(config.debug.validation_layers);
    }

    #[test]
    fn present_mode_names_are_case_insensitive() {
        let mut config = Config::default();
        for (name, mode) in [
            ("Immediate", vk::PresentModeKHR::IMMEDIATE),
            ("MAILBOX", vk::PresentModeKHR::MAILBOX),
            ("fifo", vk::PresentModeKHR::FIFO),
            ("fifo_relaxed", vk::PresentModeKHR::FIFO_RELAXED),
        ] {
            config.graphics.present_mode = name.to_string();
            assert_eq!(config.present_mode(), mode, "{name}");
        }
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let mut config = Config::default();
        config.graphics.present_mode = "vsync-please".to_string();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("does/not/exist/config.toml").unwrap();
        assert_eq!(config.window.title, "Vulkan Quad");
    }

    #[test]
    fn malformed_file_falls_back_and_returns_error() {
        let path = std::env::temp_dir()
            .join(format!("quad-renderer-malformed-{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = \"wide\"\n").unwrap();

        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 1280);
        let error = error.expect("malformed file should report an error");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_falls_back_without_error() {
        let (config, error) = Config::load_or_default("does/not/exist/config.toml");
        assert!(error.is_none());
        assert_eq!(config.window.width, 1280);
    }
}

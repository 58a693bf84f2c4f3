//! Configuration system
//!
//! [`EntitiesConfig`] carries the viewer options the entity renderer reads
//! every frame. Any config type can be loaded from or saved to TOML or RON
//! through the [`Config`] trait.

pub use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk config encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format for `path`, if its extension is one we read
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "ron" => Some(Self::Ron),
            _ => None,
        }
    }

    fn parse<T: for<'de> Deserialize<'de>>(self, text: &str) -> Result<T, ConfigError> {
        match self {
            Self::Toml => toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string())),
            Self::Ron => ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string())),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }
}

/// Options that round-trip through a TOML or RON file
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Read options from `path`; fields missing from the file keep their defaults
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        format.parse(&std::fs::read_to_string(path)?)
    }

    /// Write options to `path` in the format its extension names
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        std::fs::write(path, format.render(self)?)?;
        Ok(())
    }
}

/// Failures while reading or writing a config file
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents did not match the options layout
    #[error("invalid config: {0}")]
    Parse(String),

    /// The options could not be encoded
    #[error("could not encode config: {0}")]
    Serialize(String),

    /// Extension other than `.toml` or `.ron`
    #[error("unsupported config extension: {0}")]
    UnsupportedFormat(String),
}

/// Debug overlay mode for entity bounding boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// No overlay
    #[default]
    None,
    /// Show the bounding box helper of every entity
    Basic,
    /// Reserved; currently behaves like `None`
    Advanced,
}

/// Options for the entity renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    /// Whether entities are attached to the scene at all
    pub render_entities: bool,
    /// Render skin ears for every player (they are always on for `deadmau5`)
    pub render_ears: bool,
    /// Replacement prefix for `textures.minecraft.net` skin URLs
    pub skin_textures_proxy: Option<String>,
    /// Font family used for name tags
    pub font_family: String,
    /// Name tag font size in canvas pixels
    pub name_tag_font_size: f32,
    /// Entities closer than this many blocks to the viewer are always visible
    pub visible_distance: f32,
    /// Skins are only fetched for players closer than this many blocks
    pub max_skin_load_distance: f32,
    /// Position and yaw interpolation time in milliseconds
    pub tween_duration_ms: f32,
    /// Duration of the red damage flash in milliseconds
    pub damage_flash_ms: f32,
    /// Initial debug overlay mode
    pub debug_mode: DebugMode,
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            render_entities: true,
            render_ears: false,
            skin_textures_proxy: None,
            font_family: "mojangles".to_string(),
            name_tag_font_size: 48.0,
            visible_distance: 10.0,
            max_skin_load_distance: 128.0,
            tween_duration_ms: 120.0,
            damage_flash_ms: 500.0,
            debug_mode: DebugMode::None,
        }
    }
}

impl Config for EntitiesConfig {}

//! Storage engine and metadata service abstractions.
//!
//! The crate never touches bytes on disk. Everything it resolves ends up as a
//! call on one of the traits below:
//!
//! - [`StorageEngine`]: read-side queries (dimension sizes, bounding boxes,
//!   channel formats) and region composition.
//! - [`TileSink`]: write-side tile placement.
//! - [`MetadataService`]: document-level metadata, written once per session.
//!
//! [`memory::MemoryEngine`] implements all three in memory.
//!
//! # Example
//!
//! ```rust
//! use planetile::engine::{memory::MemoryEngine, StorageEngine};
//! use planetile::{Dimension, LayerSelection};
//!
//! let engine = MemoryEngine::new();
//! assert_eq!(engine.dimension_size(Dimension::C), 0);
//! assert!(engine.total_bounding_rect(LayerSelection::All).is_empty());
//! ```

pub mod compression;
pub mod memory;

pub use compression::{CompressionMode, CompressionOptions};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::cache::CacheInfo;
use crate::dimension::{Dimension, PlaneCoordinate};
use crate::geometry::{LayerSelection, Rectangle};
use crate::pixel::{BackgroundColor, PixelBuffer, PixelFormat};

/// Faults raised by a storage engine. Passed through to callers unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("The specified string could not be processed: `{0}`")]
    InvalidCompression(String),

    #[error("zoom factor {0} is outside (0, 1]")]
    InvalidZoom(f64),

    #[error("region {0} has a negative extent")]
    NegativeRegion(Rectangle),

    #[error("malformed tile: {0}")]
    MalformedTile(String),

    #[error("the document has been closed for writing")]
    Closed,
}

/// Per-scene bounding rectangles as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBoundingBoxRecord {
    pub id: i32,
    /// Extent over all layers.
    pub rect: Rectangle,
    /// Extent over the base layer only.
    pub rect_base_layer: Rectangle,
}

impl SceneBoundingBoxRecord {
    #[must_use]
    pub fn select(&self, layers: LayerSelection) -> Rectangle {
        match layers {
            LayerSelection::All => self.rect,
            LayerSelection::BaseOnly => self.rect_base_layer,
        }
    }
}

/// A fully resolved request for composed pixel data.
#[derive(Debug, Clone, Copy)]
pub struct RegionRequest<'a> {
    pub format: PixelFormat,
    pub rect: Rectangle,
    pub background: BackgroundColor,
    /// Scale factor in `(0, 1]`.
    pub zoom: f64,
    pub plane: &'a PlaneCoordinate,
    /// Only tiles of these scenes contribute; `None` means all scenes.
    pub scenes: Option<&'a [i32]>,
}

/// One tile handed to a [`TileSink`].
#[derive(Debug, Clone, Copy)]
pub struct TilePlacement<'a> {
    pub plane: &'a PlaneCoordinate,
    pub buffer: &'a PixelBuffer,
    pub x: i32,
    pub y: i32,
    /// Multiplicity index within `plane`.
    pub m_index: u32,
    /// Shared by all tiles split from one write call.
    pub retiling_id: &'a str,
    /// Overrides the sink's default compression when set.
    pub compression: Option<&'a CompressionOptions>,
}

/// Read-side storage engine.
///
/// Implementations must tolerate concurrent queries: readers share one engine
/// across threads.
pub trait StorageEngine: Send + Sync {
    /// Size of `dim` in the document; 0 if the dimension is absent.
    fn dimension_size(&self, dim: Dimension) -> usize;

    /// Number of scenes declared by the document.
    fn scene_count(&self) -> usize {
        self.dimension_size(Dimension::S)
    }

    /// Bounding rectangles of every scene, ordered by scene id.
    fn scene_bounding_boxes(&self) -> Vec<SceneBoundingBoxRecord>;

    /// Bounding rectangle of the whole document.
    fn total_bounding_rect(&self, layers: LayerSelection) -> Rectangle;

    /// Native format of a channel, `None` if the channel holds no data.
    fn channel_pixel_format(&self, channel: i32) -> Option<PixelFormat>;

    /// Compose the pixels of a region.
    ///
    /// # Errors
    /// Returns an error if the request cannot be served.
    fn fetch_region(&self, request: &RegionRequest<'_>) -> Result<PixelBuffer, EngineError>;

    /// State of the engine's sub-block cache, zeros if it has none.
    fn cache_info(&self) -> CacheInfo {
        CacheInfo::default()
    }
}

/// Write-side storage engine.
pub trait TileSink {
    /// Persist one tile. `Ok(false)` reports a rejected placement.
    ///
    /// # Errors
    /// Returns an error if the tile or its compression options are invalid.
    fn place_tile(&mut self, tile: TilePlacement<'_>) -> Result<bool, EngineError>;

    /// Finalize the document.
    ///
    /// # Errors
    /// Returns an error if finalization fails.
    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Document-level metadata writer.
pub trait MetadataService {
    /// # Errors
    /// Returns an error if the metadata cannot be written.
    fn write_document_metadata(&mut self, metadata: &DocumentMetadata) -> Result<(), EngineError>;
}

/// Typed value of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Int32(i32),
    Bool(bool),
    Double(f64),
    String(String),
}

impl From<i32> for CustomValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<bool> for CustomValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for CustomValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for CustomValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TintingMode {
    #[default]
    None,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb8Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Display settings of one channel. Stored, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDisplaySettings {
    pub is_enabled: bool,
    pub tinting_mode: TintingMode,
    /// Only meaningful with [`TintingMode::Color`].
    pub tinting_color: Rgb8Color,
    pub black_point: f32,
    pub white_point: f32,
}

impl Default for ChannelDisplaySettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            tinting_mode: TintingMode::None,
            tinting_color: Rgb8Color::default(),
            black_point: 0.0,
            white_point: 1.0,
        }
    }
}

/// Metadata written once per write session.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub name: String,
    /// Pixel extent in x, in µm.
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub scale_z: Option<f64>,
    pub channel_names: BTreeMap<i32, String>,
    pub custom_attributes: BTreeMap<String, CustomValue>,
    pub display_settings: BTreeMap<i32, ChannelDisplaySettings>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            name: "Document".to_string(),
            scale_x: None,
            scale_y: None,
            scale_z: None,
            channel_names: BTreeMap::new(),
            custom_attributes: BTreeMap::new(),
            display_settings: BTreeMap::new(),
        }
    }
}

impl DocumentMetadata {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn scale(mut self, x: f64, y: f64, z: f64) -> Self {
        self.scale_x = Some(x);
        self.scale_y = Some(y);
        self.scale_z = Some(z);
        self
    }

    #[must_use]
    pub fn channel_name(mut self, channel: i32, name: impl Into<String>) -> Self {
        self.channel_names.insert(channel, name.into());
        self
    }

    #[must_use]
    pub fn custom_attribute(mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn display_setting(mut self, channel: i32, settings: ChannelDisplaySettings) -> Self {
        self.display_settings.insert(channel, settings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_record_select() {
        let record = SceneBoundingBoxRecord {
            id: 2,
            rect: Rectangle::new(0, 0, 20, 20),
            rect_base_layer: Rectangle::new(0, 0, 18, 18),
        };
        assert_eq!(record.select(LayerSelection::All).w, 20);
        assert_eq!(record.select(LayerSelection::BaseOnly).w, 18);
    }

    #[test]
    fn test_metadata_builder() {
        let md = DocumentMetadata::named("slide")
            .scale(0.1, 0.1, 1.0)
            .channel_name(0, "DAPI")
            .custom_attribute("count", 3)
            .custom_attribute("ok", true)
            .display_setting(0, ChannelDisplaySettings::default());
        assert_eq!(md.name, "slide");
        assert_eq!(md.scale_z, Some(1.0));
        assert_eq!(md.channel_names.get(&0).map(String::as_str), Some("DAPI"));
        assert_eq!(md.custom_attributes.get("count"), Some(&CustomValue::Int32(3)));
        assert_eq!(md.custom_attributes.get("ok"), Some(&CustomValue::Bool(true)));
        assert!((md.display_settings[&0].white_point - 1.0).abs() < f32::EPSILON);
    }
}

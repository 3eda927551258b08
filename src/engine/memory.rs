//! In-memory storage engine.
//!
//! Keeps every placed tile in memory and derives dimension sizes and bounding
//! boxes from them on each query. Regions are composed by drawing the
//! base-layer tiles of the requested plane in multiplicity order, so later
//! tiles cover earlier ones where they overlap.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::cache::{CacheInfo, CacheOptions, SubBlockCache};
use crate::casting::{i32_to_usize, scaled_extent, unscaled_offset, usize_to_i32};
use crate::dimension::{Dimension, PlaneCoordinate};
use crate::geometry::{LayerSelection, Rectangle};
use crate::pixel::{convert_pixel, PixelBuffer, PixelFormat};

use super::{
    CompressionOptions, DocumentMetadata, EngineError, MetadataService, RegionRequest,
    SceneBoundingBoxRecord, StorageEngine, TilePlacement, TileSink,
};

/// A tile as stored by [`MemoryEngine`].
#[derive(Debug, Clone)]
pub struct TileRecord {
    pub plane: PlaneCoordinate,
    /// `None` for pyramid tiles.
    pub m_index: Option<u32>,
    /// Logical placement in document coordinates.
    pub rect: Rectangle,
    pub format: PixelFormat,
    pub retiling_id: String,
    pub compression: CompressionOptions,
    pub pyramid: bool,
    width: usize,
    height: usize,
    payload: Arc<[u8]>,
}

impl TileRecord {
    /// Decode the stored payload.
    ///
    /// # Errors
    /// Returns an error if the payload does not match the recorded geometry.
    pub fn buffer(&self) -> Result<PixelBuffer, EngineError> {
        PixelBuffer::from_bytes(self.format, self.width, self.height, self.payload.to_vec())
            .map_err(|e| EngineError::MalformedTile(e.to_string()))
    }

    fn scene(&self) -> Option<i32> {
        self.plane.get(Dimension::S)
    }
}

/// Storage engine holding the whole document in memory.
pub struct MemoryEngine {
    tiles: Vec<TileRecord>,
    default_compression: CompressionOptions,
    metadata: Option<DocumentMetadata>,
    metadata_writes: usize,
    cache: Option<Mutex<SubBlockCache>>,
    cache_options: CacheOptions,
    closed: bool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            default_compression: CompressionOptions::default(),
            metadata: None,
            metadata_writes: 0,
            cache: None,
            cache_options: CacheOptions::default(),
            closed: false,
        }
    }

    /// Use `compression` for tiles placed without an explicit override.
    #[must_use]
    pub fn with_default_compression(mut self, compression: CompressionOptions) -> Self {
        self.default_compression = compression;
        self
    }

    /// Cache decoded tiles, pruned to `options` after every fetch.
    #[must_use]
    pub fn with_cache(mut self, options: CacheOptions) -> Self {
        self.cache = Some(Mutex::new(SubBlockCache::new()));
        self.cache_options = options;
        self
    }

    #[must_use]
    pub fn tiles(&self) -> &[TileRecord] {
        &self.tiles
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.metadata.as_ref()
    }

    /// Number of times metadata was written to this engine.
    #[must_use]
    pub fn metadata_writes(&self) -> usize {
        self.metadata_writes
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Accept tiles again after [`TileSink::close`].
    pub fn reopen(&mut self) {
        self.closed = false;
    }

    /// Add a subsampled tile covering `rect` at a reduced resolution.
    ///
    /// Pyramid tiles only count towards the all-layers bounding boxes and are
    /// never drawn into composed regions.
    ///
    /// # Errors
    /// Returns an error if the buffer is empty or larger than `rect`.
    pub fn place_pyramid_tile(
        &mut self,
        plane: &PlaneCoordinate,
        rect: Rectangle,
        buffer: &PixelBuffer,
    ) -> Result<(), EngineError> {
        let too_large = usize_to_i32(buffer.width()).map_or(true, |w| w > rect.w)
            || usize_to_i32(buffer.height()).map_or(true, |h| h > rect.h);
        if buffer.byte_len() == 0 || too_large {
            return Err(EngineError::MalformedTile(format!(
                "{}x{} pyramid tile cannot cover {rect}",
                buffer.width(),
                buffer.height()
            )));
        }
        self.tiles.push(TileRecord {
            plane: plane.clone(),
            m_index: None,
            rect,
            format: buffer.format(),
            retiling_id: String::new(),
            compression: self.default_compression.clone(),
            pyramid: true,
            width: buffer.width(),
            height: buffer.height(),
            payload: Arc::from(buffer.as_bytes()),
        });
        Ok(())
    }

    fn base_tiles(&self) -> impl Iterator<Item = (usize, &TileRecord)> {
        self.tiles.iter().enumerate().filter(|(_, t)| !t.pyramid)
    }

    fn union_rect<'a>(tiles: impl Iterator<Item = &'a TileRecord>) -> Rectangle {
        tiles.fold(Rectangle::default(), |acc, t| acc.union(&t.rect))
    }

    fn decoded(&self, index: usize) -> Result<Arc<PixelBuffer>, EngineError> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.tiles[index].buffer()?));
        };
        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(index) {
            return Ok(hit);
        }
        let decoded = Arc::new(self.tiles[index].buffer()?);
        cache.insert(index, Arc::clone(&decoded));
        Ok(decoded)
    }

    fn prune_cache(&self) {
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .prune(&self.cache_options);
        }
    }
}

impl StorageEngine for MemoryEngine {
    fn dimension_size(&self, dim: Dimension) -> usize {
        let (min, max) = self
            .tiles
            .iter()
            .filter_map(|t| t.plane.get(dim))
            .fold((None, None), |(lo, hi): (Option<i32>, Option<i32>), v| {
                (Some(lo.map_or(v, |l| l.min(v))), Some(hi.map_or(v, |h| h.max(v))))
            });
        match (min, max) {
            (Some(lo), Some(hi)) => {
                usize::try_from(i64::from(hi) - i64::from(lo) + 1).unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn scene_bounding_boxes(&self) -> Vec<SceneBoundingBoxRecord> {
        let mut scenes: BTreeMap<i32, SceneBoundingBoxRecord> = BTreeMap::new();
        for tile in &self.tiles {
            let Some(id) = tile.scene() else {
                continue;
            };
            let record = scenes.entry(id).or_insert(SceneBoundingBoxRecord {
                id,
                rect: Rectangle::default(),
                rect_base_layer: Rectangle::default(),
            });
            record.rect = record.rect.union(&tile.rect);
            if !tile.pyramid {
                record.rect_base_layer = record.rect_base_layer.union(&tile.rect);
            }
        }
        scenes.into_values().collect()
    }

    fn total_bounding_rect(&self, layers: LayerSelection) -> Rectangle {
        match layers {
            LayerSelection::All => Self::union_rect(self.tiles.iter()),
            LayerSelection::BaseOnly => Self::union_rect(self.base_tiles().map(|(_, t)| t)),
        }
    }

    fn channel_pixel_format(&self, channel: i32) -> Option<PixelFormat> {
        self.tiles
            .iter()
            .find(|t| t.plane.get(Dimension::C).unwrap_or(0) == channel)
            .map(|t| t.format)
    }

    fn fetch_region(&self, request: &RegionRequest<'_>) -> Result<PixelBuffer, EngineError> {
        let zoom = request.zoom;
        if !(zoom > 0.0 && zoom <= 1.0) {
            return Err(EngineError::InvalidZoom(zoom));
        }
        let rect = request.rect;
        let (Ok(width), Ok(height)) = (i32_to_usize(rect.w), i32_to_usize(rect.h)) else {
            return Err(EngineError::NegativeRegion(rect));
        };

        let out_w = scaled_extent(width, zoom);
        let out_h = scaled_extent(height, zoom);
        let format = request.format;
        let mut out = PixelBuffer::filled(format, out_w, out_h, &request.background.encode(format));

        // Source document coordinate sampled by each output column / row.
        let cols: Vec<i64> = (0..out_w)
            .map(|ox| i64::from(rect.x) + unscaled_offset(ox, zoom))
            .collect();
        let rows: Vec<i64> = (0..out_h)
            .map(|oy| i64::from(rect.y) + unscaled_offset(oy, zoom))
            .collect();

        let mut visible: Vec<(usize, &TileRecord)> = self
            .base_tiles()
            .filter(|(_, t)| request.plane.selects(&t.plane))
            .filter(|(_, t)| match (request.scenes, t.scene()) {
                (Some(scenes), Some(s)) => scenes.contains(&s),
                _ => true,
            })
            .filter(|(_, t)| t.rect.intersects(&rect))
            .collect();
        visible.sort_by_key(|(_, t)| t.m_index);

        trace!(
            plane = %request.plane,
            region = %rect,
            zoom,
            tiles = visible.len(),
            "Composing region"
        );

        for (index, tile) in visible {
            let buffer = self.decoded(index)?;
            let (tx, ty) = (i64::from(tile.rect.x), i64::from(tile.rect.y));
            let x_lo = cols.partition_point(|&c| c < tx);
            let x_hi = cols.partition_point(|&c| c < tile.rect.right());
            let y_lo = rows.partition_point(|&r| r < ty);
            let y_hi = rows.partition_point(|&r| r < tile.rect.bottom());

            for oy in y_lo..y_hi {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let sy = (rows[oy] - ty) as usize;
                for ox in x_lo..x_hi {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let sx = (cols[ox] - tx) as usize;
                    convert_pixel(tile.format, buffer.pixel(sx, sy), format, out.pixel_mut(ox, oy));
                }
            }
        }

        self.prune_cache();
        Ok(out)
    }

    fn cache_info(&self) -> CacheInfo {
        self.cache.as_ref().map_or_else(CacheInfo::default, |cache| {
            cache.lock().unwrap_or_else(PoisonError::into_inner).info()
        })
    }
}

impl TileSink for MemoryEngine {
    fn place_tile(&mut self, tile: TilePlacement<'_>) -> Result<bool, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        let buffer = tile.buffer;
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(EngineError::MalformedTile(format!(
                "{}x{} tile has no pixels",
                buffer.width(),
                buffer.height()
            )));
        }
        let w = usize_to_i32(buffer.width()).map_err(EngineError::MalformedTile)?;
        let h = usize_to_i32(buffer.height()).map_err(EngineError::MalformedTile)?;
        let rect = Rectangle::new(tile.x, tile.y, w, h);
        if rect.right() > i64::from(i32::MAX) || rect.bottom() > i64::from(i32::MAX) {
            return Err(EngineError::MalformedTile(format!(
                "tile {rect} extends past the coordinate range"
            )));
        }
        let compression = tile
            .compression
            .cloned()
            .unwrap_or_else(|| self.default_compression.clone());

        debug!(
            plane = %tile.plane,
            x = tile.x,
            y = tile.y,
            m = tile.m_index,
            width = w,
            height = h,
            compression = %compression,
            "Placing tile"
        );

        self.tiles.push(TileRecord {
            plane: tile.plane.clone(),
            m_index: Some(tile.m_index),
            rect,
            format: buffer.format(),
            retiling_id: tile.retiling_id.to_string(),
            compression,
            pyramid: false,
            width: buffer.width(),
            height: buffer.height(),
            payload: Arc::from(buffer.as_bytes()),
        });
        Ok(true)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.closed = true;
        debug!(tiles = self.tiles.len(), "Closed in-memory document");
        Ok(())
    }
}

impl MetadataService for MemoryEngine {
    fn write_document_metadata(&mut self, metadata: &DocumentMetadata) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        self.metadata = Some(metadata.clone());
        self.metadata_writes += 1;
        Ok(())
    }
}

//! Write sessions.
//!
//! A [`DocumentWriter`] owns its sink for the duration of a session. Each
//! write completes the plane coordinate, splits the buffer if needed and
//! hands every tile to the sink with the next multiplicity index of its
//! plane. Document metadata is written exactly once: explicitly through
//! [`DocumentWriter::write_metadata`], or with defaults when the writer is
//! closed or dropped.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::allocator::PlaneTileAllocator;
use crate::dimension::PartialPlane;
use crate::engine::{CompressionOptions, DocumentMetadata, MetadataService, StorageEngine, TilePlacement, TileSink};
use crate::error::{Error, Result};
use crate::geometry::Location;
use crate::pixel::PixelBuffer;
use crate::resolver::{Access, CoordinateResolver};
use crate::splitter::SplitPolicy;

/// Session-wide write settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Compression for writes that do not override it. `None` leaves the
    /// choice to the sink.
    pub default_compression: Option<CompressionOptions>,
    pub split: SplitPolicy,
}

impl WriterOptions {
    #[must_use]
    pub fn with_default_compression(mut self, compression: CompressionOptions) -> Self {
        self.default_compression = Some(compression);
        self
    }

    #[must_use]
    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }
}

/// A write session over a sink.
pub struct DocumentWriter<S: TileSink + MetadataService> {
    sink: Option<S>,
    options: WriterOptions,
    allocator: PlaneTileAllocator,
    metadata_written: bool,
}

impl<S: TileSink + MetadataService> DocumentWriter<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    #[must_use]
    pub fn with_options(sink: S, options: WriterOptions) -> Self {
        Self {
            sink: Some(sink),
            options,
            allocator: PlaneTileAllocator::new(),
            metadata_written: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// The sink, `None` once closed.
    #[must_use]
    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    #[must_use]
    pub fn allocator(&self) -> &PlaneTileAllocator {
        &self.allocator
    }

    #[must_use]
    pub fn metadata_written(&self) -> bool {
        self.metadata_written
    }

    /// Write document metadata. Allowed once per session.
    ///
    /// # Errors
    /// Returns [`Error::MetadataAlreadyWritten`] on a second call, or the
    /// sink's error.
    pub fn write_metadata(&mut self, metadata: &DocumentMetadata) -> Result<()> {
        if self.metadata_written {
            return Err(Error::MetadataAlreadyWritten);
        }
        let sink = self.sink.as_mut().ok_or(Error::WriterClosed)?;
        sink.write_document_metadata(metadata)?;
        self.metadata_written = true;
        debug!(name = %metadata.name, channels = metadata.channel_names.len(), "Wrote document metadata");
        Ok(())
    }

    /// Finish the session and hand back the sink.
    ///
    /// Writes default metadata first if none was written. The sink is closed
    /// even if that fails; the first error is returned.
    ///
    /// # Errors
    /// Returns the metadata or sink error.
    pub fn close(mut self) -> Result<S> {
        let metadata = self.finish();
        let mut sink = self.sink.take().ok_or(Error::WriterClosed)?;
        let closed = sink.close();
        metadata?;
        closed?;
        Ok(sink)
    }

    fn finish(&mut self) -> Result<()> {
        if self.metadata_written {
            return Ok(());
        }
        self.write_metadata(&DocumentMetadata::default())
    }
}

impl<S: StorageEngine + TileSink + MetadataService> DocumentWriter<S> {
    /// Start a write of `buffer`. By default it lands at `(0, 0)` on the
    /// first plane of scene 0.
    #[must_use]
    pub fn write(&mut self, buffer: PixelBuffer) -> WriteRequest<'_, S> {
        WriteRequest {
            writer: self,
            buffer,
            location: Location::default(),
            plane: PartialPlane::new(),
            scene: 0,
            compression: None,
            retiling_id: None,
        }
    }
}

impl<S: TileSink + MetadataService> Drop for DocumentWriter<S> {
    fn drop(&mut self) {
        if self.sink.is_none() {
            return;
        }
        if let Err(e) = self.finish() {
            warn!(error = %e, "Failed to write default metadata on drop");
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!(error = %e, "Failed to close sink on drop");
            }
        }
    }
}

/// Options of a single write, consumed by [`WriteRequest::submit`].
#[must_use]
pub struct WriteRequest<'a, S: StorageEngine + TileSink + MetadataService> {
    writer: &'a mut DocumentWriter<S>,
    buffer: PixelBuffer,
    location: Location,
    plane: PartialPlane,
    scene: i32,
    compression: Option<CompressionOptions>,
    retiling_id: Option<String>,
}

impl<S: StorageEngine + TileSink + MetadataService> WriteRequest<'_, S> {
    /// Top-left corner of the buffer in document coordinates.
    pub fn location(mut self, location: impl Into<Location>) -> Self {
        self.location = location.into();
        self
    }

    pub fn plane(mut self, plane: impl Into<PartialPlane>) -> Self {
        self.plane = plane.into();
        self
    }

    pub fn scene(mut self, scene: i32) -> Self {
        self.scene = scene;
        self
    }

    /// Override the session's default compression for this write.
    pub fn compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Use `id` instead of a generated retiling id.
    pub fn retiling_id(mut self, id: impl Into<String>) -> Self {
        self.retiling_id = Some(id.into());
        self
    }

    /// Place the buffer.
    ///
    /// Returns `Ok(false)` as soon as the sink rejects a tile; tiles placed
    /// before it stay in the document.
    ///
    /// # Errors
    /// Returns [`Error::WriterClosed`] after close, a shape error for
    /// placements outside the coordinate range, or the sink's error.
    pub fn submit(self) -> Result<bool> {
        let writer = self.writer;
        let sink = writer.sink.as_mut().ok_or(Error::WriterClosed)?;
        let plane = CoordinateResolver::new(&*sink).complete(&self.plane, Access::Write { scene: self.scene });
        let key = plane.to_string();
        let retiling_id = self.retiling_id.unwrap_or_else(next_retiling_id);
        let compression = self.compression.as_ref().or(writer.options.default_compression.as_ref());

        let split = writer.options.split.split(self.buffer);
        debug!(plane = %key, tiles = split.tile_count(), retiling_id = %retiling_id, "Writing buffer");

        for tile in split {
            let tile = tile?;
            let x = self.location.x.checked_add(tile.offset.x);
            let y = self.location.y.checked_add(tile.offset.y);
            let (Some(x), Some(y)) = (x, y) else {
                return Err(Error::shape(format!(
                    "tile offset ({}, {}) overflows location ({}, {})",
                    tile.offset.x, tile.offset.y, self.location.x, self.location.y
                )));
            };
            let m_index = writer.allocator.next_index(&key)?;
            let placed = sink.place_tile(TilePlacement {
                plane: &plane,
                buffer: &tile.buffer,
                x,
                y,
                m_index,
                retiling_id: &retiling_id,
                compression,
            })?;
            if !placed {
                warn!(plane = %key, x, y, m = m_index, "Sink rejected tile");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A fresh random (version 4) UUID in hyphenated form.
fn next_retiling_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;
    use crate::engine::memory::MemoryEngine;
    use crate::engine::{EngineError, RegionRequest, SceneBoundingBoxRecord};
    use crate::geometry::{LayerSelection, Rectangle};
    use crate::pixel::PixelFormat;
    use crate::cache::CacheInfo;

    #[test]
    fn test_large_color_write_is_split_at_location() {
        let mut writer = DocumentWriter::new(MemoryEngine::new());
        let buffer = PixelBuffer::new(PixelFormat::Bgr24, 2048, 2048);
        assert!(writer.write(buffer).location((200, 400)).submit().unwrap());

        let engine = writer.close().unwrap();
        let origins: Vec<_> = engine.tiles().iter().map(|t| (t.rect.x, t.rect.y)).collect();
        assert_eq!(origins, vec![(200, 400), (1224, 400), (200, 1424), (1224, 1424)]);
        let indices: Vec<_> = engine.tiles().iter().map(|t| t.m_index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert!(engine.tiles().iter().all(|t| t.retiling_id == engine.tiles()[0].retiling_id));
    }

    #[test]
    fn test_write_plane_defaults_and_indices() {
        let mut writer = DocumentWriter::new(MemoryEngine::new());
        let tile = PixelBuffer::new(PixelFormat::Gray8, 4, 4);
        writer.write(tile.clone()).submit().unwrap();
        writer.write(tile.clone()).location((4, 0)).submit().unwrap();
        writer.write(tile.clone()).plane([("C", 1)]).scene(2).submit().unwrap();
        writer.write(tile).plane([("Q", 1), ("T", 0)]).submit().unwrap();

        assert_eq!(writer.allocator().issued("Z0 C0 T0 S0"), 3);
        assert_eq!(writer.allocator().issued("Z0 C1 T0 S2"), 1);

        let engine = writer.close().unwrap();
        let tiles = engine.tiles();
        assert_eq!(tiles[2].plane.get(Dimension::S), Some(2));
        assert_eq!(tiles[2].m_index, Some(0));
        assert_eq!(tiles[3].m_index, Some(2));
        assert_ne!(tiles[0].retiling_id, tiles[1].retiling_id);
    }

    #[test]
    fn test_compression_override_and_default() {
        let options = WriterOptions::default().with_default_compression("zstd0:".parse().unwrap());
        let mut writer = DocumentWriter::with_options(MemoryEngine::new(), options);
        let tile = PixelBuffer::new(PixelFormat::Gray16, 2, 2);
        writer.write(tile.clone()).submit().unwrap();
        writer
            .write(tile)
            .compression("zstd1:ExplicitLevel=2".parse().unwrap())
            .retiling_id("fixed")
            .submit()
            .unwrap();

        let engine = writer.close().unwrap();
        assert_eq!(engine.tiles()[0].compression.to_string(), "zstd0:");
        assert_eq!(engine.tiles()[1].compression.to_string(), "zstd1:ExplicitLevel=2");
        assert_eq!(engine.tiles()[1].retiling_id, "fixed");
    }

    #[test]
    fn test_metadata_once() {
        let mut writer = DocumentWriter::new(MemoryEngine::new());
        writer.write_metadata(&DocumentMetadata::named("slide")).unwrap();
        assert!(matches!(
            writer.write_metadata(&DocumentMetadata::default()),
            Err(Error::MetadataAlreadyWritten)
        ));
        let engine = writer.close().unwrap();
        assert_eq!(engine.metadata_writes(), 1);
        assert_eq!(engine.metadata().map(|m| m.name.as_str()), Some("slide"));
        assert!(engine.is_closed());
    }

    #[test]
    fn test_close_writes_default_metadata() {
        let writer = DocumentWriter::new(MemoryEngine::new());
        let engine = writer.close().unwrap();
        assert_eq!(engine.metadata_writes(), 1);
        assert_eq!(engine.metadata(), Some(&DocumentMetadata::default()));
    }

    #[test]
    fn test_write_past_coordinate_range_is_rejected() {
        let mut writer = DocumentWriter::new(MemoryEngine::new());
        writer
            .write(PixelBuffer::new(PixelFormat::Gray8, 10, 10))
            .location((i32::MIN, 0))
            .submit()
            .unwrap();
        let result = writer
            .write(PixelBuffer::new(PixelFormat::Gray8, 10, 10))
            .location((i32::MAX - 5, 0))
            .submit();
        assert!(matches!(result, Err(Error::Engine(EngineError::MalformedTile(_)))));

        let engine = writer.close().unwrap();
        let rect = engine.total_bounding_rect(LayerSelection::All);
        assert_eq!(rect, Rectangle::new(i32::MIN, 0, 10, 10));
    }

    #[test]
    fn test_retiling_ids_are_v4_uuids() {
        let a = next_retiling_id();
        let b = next_retiling_id();
        assert_ne!(a, b);
        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(a, parsed.hyphenated().to_string());
    }

    /// Accepts `capacity` tiles, rejects the rest and records everything.
    struct LimitedSink {
        inner: MemoryEngine,
        capacity: usize,
        log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl StorageEngine for LimitedSink {
        fn dimension_size(&self, dim: Dimension) -> usize {
            self.inner.dimension_size(dim)
        }
        fn scene_bounding_boxes(&self) -> Vec<SceneBoundingBoxRecord> {
            self.inner.scene_bounding_boxes()
        }
        fn total_bounding_rect(&self, layers: LayerSelection) -> Rectangle {
            self.inner.total_bounding_rect(layers)
        }
        fn channel_pixel_format(&self, channel: i32) -> Option<PixelFormat> {
            self.inner.channel_pixel_format(channel)
        }
        fn fetch_region(&self, request: &RegionRequest<'_>) -> std::result::Result<PixelBuffer, EngineError> {
            self.inner.fetch_region(request)
        }
        fn cache_info(&self) -> CacheInfo {
            self.inner.cache_info()
        }
    }

    impl TileSink for LimitedSink {
        fn place_tile(&mut self, tile: TilePlacement<'_>) -> std::result::Result<bool, EngineError> {
            if self.inner.tiles().len() >= self.capacity {
                return Ok(false);
            }
            self.inner.place_tile(tile)
        }
    }

    impl MetadataService for LimitedSink {
        fn write_document_metadata(&mut self, metadata: &DocumentMetadata) -> std::result::Result<(), EngineError> {
            self.log.lock().unwrap().push(metadata.name.clone());
            self.inner.write_document_metadata(metadata)
        }
    }

    fn limited(capacity: usize) -> (LimitedSink, std::sync::Arc<std::sync::Mutex<Vec<String>>>) {
        let log = std::sync::Arc::default();
        let sink = LimitedSink {
            inner: MemoryEngine::new(),
            capacity,
            log: std::sync::Arc::clone(&log),
        };
        (sink, log)
    }

    #[test]
    fn test_rejected_tile_stops_write_without_rollback() {
        let (sink, _log) = limited(2);
        let options = WriterOptions::default().with_split(
            SplitPolicy::default()
                .with_max_extents(2, 2)
                .with_byte_threshold(None),
        );
        let mut writer = DocumentWriter::with_options(sink, options);
        let accepted = writer
            .write(PixelBuffer::new(PixelFormat::Gray8, 4, 4))
            .submit()
            .unwrap();
        assert!(!accepted);
        assert_eq!(writer.allocator().issued("Z0 C0 T0 S0"), 3);

        let sink = writer.close().unwrap();
        assert_eq!(sink.inner.tiles().len(), 2);
    }

    #[test]
    fn test_drop_writes_default_metadata_once() {
        let (sink, log) = limited(1);
        {
            let mut writer = DocumentWriter::new(sink);
            writer.write(PixelBuffer::new(PixelFormat::Gray8, 1, 1)).submit().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec!["Document".to_string()]);
    }
}

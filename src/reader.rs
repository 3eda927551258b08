//! Read access to a document.

use std::collections::BTreeMap;

use tracing::debug;

use crate::bounds;
use crate::cache::CacheInfo;
use crate::casting::usize_to_i32;
use crate::dimension::{Dimension, PartialPlane};
use crate::engine::{RegionRequest, StorageEngine};
use crate::error::{Error, Result};
use crate::geometry::{BoundingBoxSet, LayerSelection, Rectangle, SceneBoundingBoxes};
use crate::pixel::{BackgroundColor, PixelBuffer, PixelFormat};
use crate::region::resolve_region;
use crate::resolver::{Access, CoordinateResolver};

/// Read-only view of a document backed by a [`StorageEngine`].
///
/// All methods take `&self`; a reader can be shared across threads.
pub struct DocumentReader<E: StorageEngine> {
    engine: E,
}

impl<E: StorageEngine> DocumentReader<E> {
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Start a read. Without further options the whole document is read at
    /// full resolution in the native format of channel 0.
    #[must_use]
    pub fn read(&self) -> ReadRequest<'_, E> {
        ReadRequest {
            reader: self,
            region: None,
            plane: PartialPlane::new(),
            scene: None,
            zoom: 1.0,
            format: None,
            background: BackgroundColor::BLACK,
        }
    }

    /// See [`bounds::total_bounding_box`].
    #[must_use]
    pub fn total_bounding_box(&self, layers: LayerSelection) -> BoundingBoxSet {
        bounds::total_bounding_box(&self.engine, layers)
    }

    /// See [`bounds::scene_bounding_boxes`].
    ///
    /// # Errors
    /// Returns an error if the scene count and scene records disagree.
    pub fn scene_bounding_boxes(&self, layers: LayerSelection) -> Result<SceneBoundingBoxes> {
        bounds::scene_bounding_boxes(&self.engine, layers)
    }

    #[must_use]
    pub fn total_bounding_rect(&self, layers: LayerSelection) -> Rectangle {
        bounds::total_bounding_rect(&self.engine, layers)
    }

    /// Native format of `channel`, `None` if it holds no data.
    #[must_use]
    pub fn channel_pixel_format(&self, channel: i32) -> Option<PixelFormat> {
        self.engine.channel_pixel_format(channel)
    }

    /// Native format of every channel of the document.
    #[must_use]
    pub fn pixel_formats(&self) -> BTreeMap<i32, Option<PixelFormat>> {
        let channels = self.engine.dimension_size(Dimension::C).max(1);
        (0..usize_to_i32(channels).unwrap_or(i32::MAX))
            .map(|c| (c, self.engine.channel_pixel_format(c)))
            .collect()
    }

    #[must_use]
    pub fn cache_info(&self) -> CacheInfo {
        self.engine.cache_info()
    }
}

/// Options of a single read, consumed by [`ReadRequest::fetch`].
#[must_use]
pub struct ReadRequest<'a, E: StorageEngine> {
    reader: &'a DocumentReader<E>,
    region: Option<Rectangle>,
    plane: PartialPlane,
    scene: Option<i32>,
    zoom: f64,
    format: Option<PixelFormat>,
    background: BackgroundColor,
}

impl<E: StorageEngine> ReadRequest<'_, E> {
    /// Explicit region; takes precedence over [`ReadRequest::scene`] for the extent.
    pub fn region(mut self, region: impl Into<Rectangle>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn plane(mut self, plane: impl Into<PartialPlane>) -> Self {
        self.plane = plane.into();
        self
    }

    /// Restrict the read to one scene.
    pub fn scene(mut self, scene: i32) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Scale factor in `(0, 1]`.
    pub fn zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn background(mut self, background: impl Into<BackgroundColor>) -> Self {
        self.background = background.into();
        self
    }

    /// Resolve the request and compose the pixels.
    ///
    /// # Errors
    /// Fails on an unknown scene, a scene-count mismatch, a channel without
    /// data when no format is given, a buffer of the wrong channel count, or
    /// any engine fault.
    pub fn fetch(self) -> Result<PixelBuffer> {
        let engine = &self.reader.engine;
        let resolver = CoordinateResolver::new(engine);
        let plane = resolver.complete(&self.plane, Access::Read);
        let rect = resolve_region(engine, self.region, self.scene)?;
        let format = resolver.resolve_pixel_format(self.format, &plane)?;
        let scenes = self.scene.map(|s| [s]);

        debug!(plane = %plane, region = %rect, format = %format, zoom = self.zoom, "Reading region");

        let buffer = engine.fetch_region(&RegionRequest {
            format,
            rect,
            background: self.background,
            zoom: self.zoom,
            plane: &plane,
            scenes: scenes.as_ref().map(|s| s.as_slice()),
        })?;

        if buffer.format().channels() != format.channels() {
            return Err(Error::shape(format!(
                "engine returned {} channel(s), {format} has {}",
                buffer.format().channels(),
                format.channels()
            )));
        }
        Ok(buffer)
    }
}

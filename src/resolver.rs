//! Completion of partial plane coordinates.
//!
//! A caller may name any subset of dimensions, by letter or long name. The
//! resolver turns that into the complete key the storage engine expects:
//! every dimension the document populates gets an index, defaulting to 0,
//! and keys the document does not populate are dropped.

use tracing::trace;

use crate::dimension::{Dimension, PartialPlane, PlaneCoordinate};
use crate::engine::StorageEngine;
use crate::error::{Error, Result};
use crate::pixel::PixelFormat;

/// What the completed coordinate is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    /// Writes always carry the scene axis.
    Write { scene: i32 },
}

/// Completes plane coordinates against the dimensions of one document.
pub struct CoordinateResolver<'a, E: StorageEngine + ?Sized> {
    engine: &'a E,
}

impl<'a, E: StorageEngine + ?Sized> CoordinateResolver<'a, E> {
    #[must_use]
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Plane dimensions with a non-zero size, in catalog order.
    #[must_use]
    pub fn present_dimensions(&self) -> Vec<Dimension> {
        Dimension::PLANE
            .into_iter()
            .filter(|d| self.engine.dimension_size(*d) > 0)
            .collect()
    }

    /// Build the complete coordinate for `partial`.
    ///
    /// Writes additionally carry time, depth and channel even when the
    /// document does not populate them yet, so the first tiles of a new
    /// document establish those axes.
    #[must_use]
    pub fn complete(&self, partial: &PartialPlane, access: Access) -> PlaneCoordinate {
        let mut plane: PlaneCoordinate = self.present_dimensions().into_iter().map(|d| (d, 0)).collect();
        if let Access::Write { .. } = access {
            for dim in Dimension::ALWAYS_REPORTED {
                if !plane.contains(dim) {
                    plane.set(dim, 0);
                }
            }
        }

        for (key, index) in partial.iter() {
            match Dimension::lookup(key) {
                Some(dim) if plane.contains(dim) && dim != Dimension::S => plane.set(dim, index),
                _ => trace!(key, index, "Dropping coordinate key not populated by the document"),
            }
        }

        if let Access::Write { scene } = access {
            plane.set(Dimension::S, scene);
        }
        plane
    }

    /// The requested format, or the native format of the plane's channel.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedPixelFormat`] if no format was requested and
    /// the channel holds no data.
    pub fn resolve_pixel_format(
        &self,
        requested: Option<PixelFormat>,
        plane: &PlaneCoordinate,
    ) -> Result<PixelFormat> {
        if let Some(format) = requested {
            return Ok(format);
        }
        let channel = plane.get(Dimension::C).unwrap_or(0);
        self.engine
            .channel_pixel_format(channel)
            .ok_or_else(|| Error::UnsupportedPixelFormat {
                name: "Invalid".to_string(),
                valid: PixelFormat::valid_names(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;
    use crate::engine::{TilePlacement, TileSink};
    use crate::pixel::PixelBuffer;

    fn engine_with(planes: &[&str]) -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        let buffer = PixelBuffer::new(PixelFormat::Gray16, 2, 2);
        for (m, text) in planes.iter().enumerate() {
            let plane: PlaneCoordinate = text.parse().unwrap();
            engine
                .place_tile(TilePlacement {
                    plane: &plane,
                    buffer: &buffer,
                    x: 0,
                    y: 0,
                    m_index: u32::try_from(m).unwrap(),
                    retiling_id: "",
                    compression: None,
                })
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_complete_drops_absent_dimensions() {
        let engine = engine_with(&["Z0 C0", "Z3 C1"]);
        let resolver = CoordinateResolver::new(&engine);
        let plane = resolver.complete(&PartialPlane::from([("time", 5), ("depth", 2)]), Access::Read);
        assert_eq!(plane, PlaneCoordinate::new().with(Dimension::Z, 2).with(Dimension::C, 0));
    }

    #[test]
    fn test_complete_defaults_and_letters() {
        let engine = engine_with(&["T0 Z0 C0 S0", "T1 Z0 C2 S1"]);
        let resolver = CoordinateResolver::new(&engine);
        let plane = resolver.complete(&PartialPlane::from([("C", 1), ("Q", 9)]), Access::Read);
        assert_eq!(plane.to_string(), "Z0 C1 T0");
        assert!(!plane.contains(Dimension::S));
    }

    #[test]
    fn test_complete_for_write_adds_scene() {
        let engine = MemoryEngine::new();
        let resolver = CoordinateResolver::new(&engine);
        let plane = resolver.complete(&PartialPlane::from([("C", 1), ("S", 4)]), Access::Write { scene: 2 });
        assert_eq!(plane.to_string(), "Z0 C1 T0 S2");

        let plane = resolver.complete(&PartialPlane::new(), Access::Write { scene: 0 });
        assert_eq!(plane.get(Dimension::S), Some(0));
    }

    #[test]
    fn test_read_on_empty_document_is_empty() {
        let engine = MemoryEngine::new();
        let resolver = CoordinateResolver::new(&engine);
        assert!(resolver.complete(&PartialPlane::from([("T", 1)]), Access::Read).is_empty());
    }

    #[test]
    fn test_resolve_pixel_format() {
        let engine = engine_with(&["C0"]);
        let resolver = CoordinateResolver::new(&engine);
        let plane = PlaneCoordinate::new().with(Dimension::C, 0);
        assert_eq!(resolver.resolve_pixel_format(None, &plane).unwrap(), PixelFormat::Gray16);
        assert_eq!(
            resolver.resolve_pixel_format(Some(PixelFormat::Bgr24), &plane).unwrap(),
            PixelFormat::Bgr24
        );
        assert_eq!(
            resolver.resolve_pixel_format(None, &PlaneCoordinate::new()).unwrap(),
            PixelFormat::Gray16
        );

        let missing = PlaneCoordinate::new().with(Dimension::C, 5);
        let err = resolver.resolve_pixel_format(None, &missing).unwrap_err();
        assert!(err.to_string().contains("Invalid"));
    }
}

//! Effective read region.

use crate::bounds::scene_bounding_boxes;
use crate::engine::StorageEngine;
use crate::error::{Error, Result};
use crate::geometry::{LayerSelection, Rectangle};

/// Pick the region to read.
///
/// An explicit region is returned unchanged, whatever the scene. Without one
/// the scene's bounding rectangle is used, and without a scene the whole
/// document's.
///
/// # Errors
/// Returns [`Error::UnknownScene`] for a scene the document does not hold,
/// or a scene-count mismatch from the aggregation.
pub fn resolve_region<E: StorageEngine + ?Sized>(
    engine: &E,
    explicit: Option<Rectangle>,
    scene: Option<i32>,
) -> Result<Rectangle> {
    if let Some(rect) = explicit {
        return Ok(rect);
    }
    match scene {
        Some(scene) => scene_bounding_boxes(engine, LayerSelection::All)?
            .get(&scene)
            .copied()
            .ok_or(Error::UnknownScene { scene }),
        None => Ok(engine.total_bounding_rect(LayerSelection::All)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::PlaneCoordinate;
    use crate::engine::memory::MemoryEngine;
    use crate::engine::{TilePlacement, TileSink};
    use crate::pixel::{PixelBuffer, PixelFormat};

    fn two_scene_engine() -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        let buffer = PixelBuffer::new(PixelFormat::Gray8, 8, 8);
        for (scene, x) in [(0, 0), (1, 50)] {
            let plane = PlaneCoordinate::new()
                .with(crate::Dimension::C, 0)
                .with(crate::Dimension::S, scene);
            engine
                .place_tile(TilePlacement {
                    plane: &plane,
                    buffer: &buffer,
                    x,
                    y: 0,
                    m_index: 0,
                    retiling_id: "",
                    compression: None,
                })
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_explicit_region_wins() {
        let engine = two_scene_engine();
        let rect = Rectangle::new(-1, -1, 3, 3);
        assert_eq!(resolve_region(&engine, Some(rect), Some(7)).unwrap(), rect);
    }

    #[test]
    fn test_scene_and_document_regions() {
        let engine = two_scene_engine();
        assert_eq!(resolve_region(&engine, None, Some(1)).unwrap(), Rectangle::new(50, 0, 8, 8));
        assert_eq!(
            resolve_region(&engine, None, None).unwrap(),
            engine.total_bounding_rect(LayerSelection::All)
        );
    }

    #[test]
    fn test_unknown_scene() {
        let engine = two_scene_engine();
        let err = resolve_region(&engine, None, Some(5)).unwrap_err();
        assert!(matches!(err, Error::UnknownScene { scene: 5 }));
    }
}

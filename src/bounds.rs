//! Bounding-box aggregation over a whole document and per scene.
//!
//! Everything here is recomputed from the engine's live state on each call.

use tracing::warn;

use crate::casting::usize_to_i64_saturating;
use crate::dimension::Dimension;
use crate::engine::StorageEngine;
use crate::error::{Error, Result};
use crate::geometry::{Axis, BoundingBoxSet, IndexRange, LayerSelection, Rectangle, SceneBoundingBoxes};

/// Per-axis index ranges of the whole document.
///
/// Time, depth and channel are always reported, with range `(0, 1)` if the
/// document does not populate them. Any other dimension appears only when
/// its size is non-zero. The scene axis is a filter, not a plane
/// dimension, and is never reported.
pub fn total_bounding_box<E: StorageEngine + ?Sized>(engine: &E, layers: LayerSelection) -> BoundingBoxSet {
    let mut set = BoundingBoxSet::new();
    for dim in Dimension::ALWAYS_REPORTED {
        set.insert(Axis::Dim(dim), IndexRange::new(0, 1));
    }
    for dim in Dimension::PLANE {
        let size = engine.dimension_size(dim);
        if size > 0 {
            set.insert(Axis::Dim(dim), IndexRange::new(0, usize_to_i64_saturating(size)));
        }
    }
    let rect = engine.total_bounding_rect(layers);
    set.insert(Axis::X, rect.x_range());
    set.insert(Axis::Y, rect.y_range());
    set
}

/// Bounding rectangle of every scene, keyed by scene id.
///
/// # Errors
/// Returns [`Error::SceneCountMismatch`] if the declared scene count differs
/// from the number of scene records the engine reports.
pub fn scene_bounding_boxes<E: StorageEngine + ?Sized>(
    engine: &E,
    layers: LayerSelection,
) -> Result<SceneBoundingBoxes> {
    let declared = engine.scene_count();
    let records = engine.scene_bounding_boxes();
    if declared != records.len() {
        warn!(declared, observed = records.len(), "Scene count does not match scene bounding boxes");
        return Err(Error::SceneCountMismatch {
            declared,
            observed: records.len(),
        });
    }
    Ok(records.iter().map(|r| (r.id, r.select(layers))).collect())
}

/// The engine's top-level bounding rectangle.
pub fn total_bounding_rect<E: StorageEngine + ?Sized>(engine: &E, layers: LayerSelection) -> Rectangle {
    engine.total_bounding_rect(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::PlaneCoordinate;
    use crate::engine::memory::MemoryEngine;
    use crate::engine::{TilePlacement, TileSink};
    use crate::pixel::{PixelBuffer, PixelFormat};

    fn place(engine: &mut MemoryEngine, plane: &str, x: i32, y: i32, size: usize) {
        let plane: PlaneCoordinate = plane.parse().unwrap();
        let buffer = PixelBuffer::new(PixelFormat::Gray8, size, size);
        engine
            .place_tile(TilePlacement {
                plane: &plane,
                buffer: &buffer,
                x,
                y,
                m_index: 0,
                retiling_id: "",
                compression: None,
            })
            .unwrap();
    }

    #[test]
    fn test_empty_document_reports_tzc() {
        let engine = MemoryEngine::new();
        let set = total_bounding_box(&engine, LayerSelection::All);
        for dim in [Dimension::T, Dimension::Z, Dimension::C] {
            assert_eq!(set.dim(dim), Some(IndexRange::new(0, 1)));
        }
        assert_eq!(set.dim(Dimension::S), None);
        assert_eq!(set.get(Axis::X), Some(IndexRange::new(0, 0)));
    }

    #[test]
    fn test_total_bounding_box_dimensions_and_extent() {
        let mut engine = MemoryEngine::new();
        place(&mut engine, "C0 H0 S0", -10, 5, 20);
        place(&mut engine, "C2 H1 S0", 0, 0, 30);
        let set = total_bounding_box(&engine, LayerSelection::BaseOnly);
        assert_eq!(set.dim(Dimension::C), Some(IndexRange::new(0, 3)));
        assert_eq!(set.dim(Dimension::H), Some(IndexRange::new(0, 2)));
        assert_eq!(set.dim(Dimension::T), Some(IndexRange::new(0, 1)));
        assert_eq!(set.dim(Dimension::S), None);
        assert_eq!(set.get(Axis::X), Some(IndexRange::new(-10, 30)));
        assert_eq!(set.get(Axis::Y), Some(IndexRange::new(0, 30)));
    }

    #[test]
    fn test_scene_axis_is_not_a_bounding_box_dimension() {
        let mut engine = MemoryEngine::new();
        place(&mut engine, "C0 S0", 0, 0, 2);
        place(&mut engine, "C0 S1", 4, 0, 2);
        let set = total_bounding_box(&engine, LayerSelection::All);
        assert_eq!(set.dim(Dimension::S), None);
        assert_eq!(set.get_by_name("scene"), None);
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_scene_bounding_boxes() {
        let mut engine = MemoryEngine::new();
        place(&mut engine, "C0 S0", 0, 0, 10);
        place(&mut engine, "C0 S1", 100, 100, 10);
        let scenes = scene_bounding_boxes(&engine, LayerSelection::All).unwrap();
        assert_eq!(scenes.len(), engine.scene_count());
        assert_eq!(scenes[&1], Rectangle::new(100, 100, 10, 10));
    }

    #[test]
    fn test_sparse_scene_ids_are_a_mismatch() {
        let mut engine = MemoryEngine::new();
        place(&mut engine, "C0 S0", 0, 0, 10);
        place(&mut engine, "C0 S2", 20, 0, 10);
        let err = scene_bounding_boxes(&engine, LayerSelection::All).unwrap_err();
        assert!(matches!(err, Error::SceneCountMismatch { declared: 3, observed: 2 }));
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('2'));
    }

    #[test]
    fn test_total_bounding_rect_passthrough() {
        let mut engine = MemoryEngine::new();
        place(&mut engine, "C0", 3, 4, 5);
        assert_eq!(total_bounding_rect(&engine, LayerSelection::All), Rectangle::new(3, 4, 5, 5));
    }
}

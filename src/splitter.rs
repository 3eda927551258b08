//! Subdivision of oversized buffers into container-sized tiles.
//!
//! The grid is computed per axis: an extent at or above the format's maximum
//! is cut into `ceil(extent / max)` parts of `floor(extent / parts)` pixels,
//! with the last part absorbing the remainder. Tiles are produced row by row.

use tracing::debug;

use crate::casting::usize_to_i32;
use crate::error::{Error, Result};
use crate::geometry::Location;
use crate::pixel::{PixelBuffer, PixelFormat};

/// When and how finely buffers are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPolicy {
    /// Maximum tile extent for single-channel formats.
    pub gray_max_extent: usize,
    /// Maximum tile extent for three-channel formats.
    pub color_max_extent: usize,
    /// Buffers of at most this many bytes are never split. `None` splits on
    /// extent alone.
    pub byte_threshold: Option<usize>,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            gray_max_extent: 3100,
            color_max_extent: 1800,
            byte_threshold: Some(10_000_000),
        }
    }
}

impl SplitPolicy {
    #[must_use]
    pub fn with_max_extents(mut self, gray: usize, color: usize) -> Self {
        self.gray_max_extent = gray;
        self.color_max_extent = color;
        self
    }

    #[must_use]
    pub fn with_byte_threshold(mut self, threshold: Option<usize>) -> Self {
        self.byte_threshold = threshold;
        self
    }

    #[must_use]
    pub fn max_extent(&self, format: PixelFormat) -> usize {
        if format.is_color() {
            self.color_max_extent
        } else {
            self.gray_max_extent
        }
    }

    /// Whether `buffer` is large enough to be split at all.
    #[must_use]
    pub fn should_split(&self, buffer: &PixelBuffer) -> bool {
        self.byte_threshold
            .map_or(true, |threshold| buffer.byte_len() > threshold)
    }

    /// Split `buffer`, or pass it through as a single tile at offset `(0, 0)`.
    #[must_use]
    pub fn split(&self, buffer: PixelBuffer) -> TileSplit {
        if !self.should_split(&buffer) {
            return TileSplit::whole(buffer);
        }
        let max = self.max_extent(buffer.format()).max(1);
        let rows = partition_count(buffer.height(), max);
        let cols = partition_count(buffer.width(), max);
        debug!(
            width = buffer.width(),
            height = buffer.height(),
            format = %buffer.format(),
            rows,
            cols,
            "Splitting buffer"
        );
        if rows == 1 && cols == 1 {
            return TileSplit::whole(buffer);
        }
        TileSplit::grid(buffer, rows, cols)
    }
}

/// Number of parts an axis of `extent` pixels is cut into.
#[must_use]
pub fn partition_count(extent: usize, max_extent: usize) -> usize {
    if extent < max_extent {
        1
    } else {
        extent.div_ceil(max_extent)
    }
}

/// Start and length of part `index` of `parts` along an axis of `extent`.
fn part_span(extent: usize, parts: usize, index: usize) -> (usize, usize) {
    let step = extent / parts;
    let start = index * step;
    let len = if index + 1 == parts { extent - start } else { step };
    (start, len)
}

/// One tile produced by a split.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTile {
    pub buffer: PixelBuffer,
    /// Offset of the tile's top-left corner within the split buffer.
    pub offset: Location,
}

enum Source {
    Whole(Option<PixelBuffer>),
    Grid {
        buffer: PixelBuffer,
        rows: usize,
        cols: usize,
        next: usize,
    },
}

/// Finite, single-pass sequence of sub-tiles: rows outer, columns inner.
pub struct TileSplit {
    source: Source,
}

impl TileSplit {
    fn whole(buffer: PixelBuffer) -> Self {
        Self {
            source: Source::Whole(Some(buffer)),
        }
    }

    fn grid(buffer: PixelBuffer, rows: usize, cols: usize) -> Self {
        Self {
            source: Source::Grid {
                buffer,
                rows,
                cols,
                next: 0,
            },
        }
    }

    /// Total number of tiles the split yields.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        match &self.source {
            Source::Whole(_) => 1,
            Source::Grid { rows, cols, .. } => rows * cols,
        }
    }
}

impl Iterator for TileSplit {
    type Item = Result<SubTile>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Whole(buffer) => buffer.take().map(|buffer| {
                Ok(SubTile {
                    buffer,
                    offset: Location::default(),
                })
            }),
            Source::Grid {
                buffer,
                rows,
                cols,
                next,
            } => {
                if *next >= *rows * *cols {
                    return None;
                }
                let (row, col) = (*next / *cols, *next % *cols);
                *next += 1;
                let (y, h) = part_span(buffer.height(), *rows, row);
                let (x, w) = part_span(buffer.width(), *cols, col);
                Some(sub_tile(buffer, x, y, w, h))
            }
        }
    }
}

fn sub_tile(buffer: &PixelBuffer, x: usize, y: usize, w: usize, h: usize) -> Result<SubTile> {
    let offset = Location::new(
        usize_to_i32(x).map_err(Error::shape)?,
        usize_to_i32(y).map_err(Error::shape)?,
    );
    Ok(SubTile {
        buffer: buffer.sub_buffer(x, y, w, h)?,
        offset,
    })
}

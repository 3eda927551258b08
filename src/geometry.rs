//! Geometry value types: rectangles, locations and bounding-box sets.

use std::collections::BTreeMap;
use std::fmt;

use crate::dimension::Dimension;

/// An integer rectangle in document pixel coordinates.
///
/// `x` and `y` may be negative: stitched documents are not necessarily
/// anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rectangle {
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.w)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.h)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    #[must_use]
    pub fn intersects(&self, other: &Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && i64::from(self.x) < other.right()
            && i64::from(other.x) < self.right()
            && i64::from(self.y) < other.bottom()
            && i64::from(other.y) < self.bottom()
    }

    /// Smallest rectangle covering both. Empty rectangles are ignored.
    ///
    /// Extents wider than `i32::MAX` saturate, so the result never has a
    /// negative width or height.
    #[must_use]
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        let w = i32::try_from(right - i64::from(x)).unwrap_or(i32::MAX);
        let h = i32::try_from(bottom - i64::from(y)).unwrap_or(i32::MAX);
        Rectangle::new(x, y, w, h)
    }

    /// X range `[x, x + w)`.
    #[must_use]
    pub fn x_range(&self) -> IndexRange {
        IndexRange::new(i64::from(self.x), self.right())
    }

    /// Y range `[y, y + h)`.
    #[must_use]
    pub fn y_range(&self) -> IndexRange {
        IndexRange::new(i64::from(self.y), self.bottom())
    }
}

impl From<(i32, i32, i32, i32)> for Rectangle {
    fn from((x, y, w, h): (i32, i32, i32, i32)) -> Self {
        Self::new(x, y, w, h)
    }
}

impl From<Rectangle> for (i32, i32, i32, i32) {
    fn from(r: Rectangle) -> Self {
        (r.x, r.y, r.w, r.h)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.w, self.h)
    }
}

/// Top-left corner where a tile is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Location {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Half-open index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

impl IndexRange {
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn len(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<(i64, i64)> for IndexRange {
    fn from((start, end): (i64, i64)) -> Self {
        Self::new(start, end)
    }
}

/// A key of a [`BoundingBoxSet`]: a catalog dimension or a spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    Dim(Dimension),
    X,
    Y,
}

impl Axis {
    /// Resolve `"X"`, `"Y"` or any dimension key accepted by [`Dimension::lookup`].
    #[must_use]
    pub fn lookup(key: &str) -> Option<Self> {
        match key {
            "X" | "x" => Some(Axis::X),
            "Y" | "y" => Some(Axis::Y),
            _ => Dimension::lookup(key).map(Axis::Dim),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Dim(d) => write!(f, "{d}"),
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
        }
    }
}

/// Which resolution layers contribute to an aggregated extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerSelection {
    /// Base layer and pyramid layers.
    #[default]
    All,
    /// Base (full-resolution) layer only.
    BaseOnly,
}

/// Per-axis index ranges of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundingBoxSet {
    ranges: BTreeMap<Axis, IndexRange>,
}

impl BoundingBoxSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, axis: Axis, range: IndexRange) {
        self.ranges.insert(axis, range);
    }

    #[must_use]
    pub fn get(&self, axis: Axis) -> Option<IndexRange> {
        self.ranges.get(&axis).copied()
    }

    #[must_use]
    pub fn dim(&self, dim: Dimension) -> Option<IndexRange> {
        self.get(Axis::Dim(dim))
    }

    /// Look up by key, e.g. `"C"`, `"channel"` or `"X"`.
    #[must_use]
    pub fn get_by_name(&self, key: &str) -> Option<IndexRange> {
        Axis::lookup(key).and_then(|axis| self.get(axis))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, IndexRange)> + '_ {
        self.ranges.iter().map(|(a, r)| (*a, *r))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Scene id to scene bounding rectangle. Ids need not be contiguous.
pub type SceneBoundingBoxes = BTreeMap<i32, Rectangle>;

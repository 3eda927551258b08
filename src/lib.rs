#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dimension`]: Dimension catalog, [`PlaneCoordinate`] and [`PartialPlane`]
//! - [`geometry`]: [`Rectangle`], [`Location`] and [`BoundingBoxSet`]
//! - [`pixel`]: [`PixelFormat`] and packed [`PixelBuffer`]s
//! - [`engine`]: Storage engine traits and the in-memory [`MemoryEngine`]
//! - [`resolver`]: Completion of partial plane coordinates
//! - [`bounds`]: Document and per-scene bounding boxes
//! - [`region`]: Effective read region
//! - [`splitter`]: Subdivision of oversized buffers into tiles
//! - [`allocator`]: Per-plane multiplicity indices
//! - [`reader`]: [`DocumentReader`] and the [`ReadRequest`] builder
//! - [`writer`]: [`DocumentWriter`] and the [`WriteRequest`] builder
//! - [`cache`]: LRU cache for decoded sub-blocks
//! - [`export`]: TIFF export of composed regions

// ============================================================================
// Public modules
// ============================================================================

pub mod allocator;
pub mod bounds;
pub mod cache;
pub mod casting;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod export;
pub mod geometry;
pub mod pixel;
pub mod reader;
pub mod region;
pub mod resolver;
pub mod splitter;
pub mod writer;

// ============================================================================
// Errors
// ============================================================================

pub use error::{Error, Result};
pub use engine::EngineError;

// ============================================================================
// Coordinates & Geometry
// ============================================================================

pub use dimension::{
    Dimension,
    PartialPlane,
    PlaneCoordinate,
};

pub use geometry::{
    Axis,
    BoundingBoxSet,
    IndexRange,
    LayerSelection,
    Location,
    Rectangle,
    SceneBoundingBoxes,
};

// ============================================================================
// Pixel Data
// ============================================================================

pub use pixel::{
    BackgroundColor,
    PixelBuffer,
    PixelFormat,
    SampleType,
};

// ============================================================================
// Storage Engine
// ============================================================================

pub use engine::{
    ChannelDisplaySettings,
    CompressionMode,
    CompressionOptions,
    CustomValue,
    DocumentMetadata,
    MetadataService,
    Rgb8Color,
    StorageEngine,
    TileSink,
    TintingMode,
};
pub use engine::memory::MemoryEngine;

// ============================================================================
// Reading
// ============================================================================
// Primary API: reader.read().plane(...).region(...).fetch()

pub use reader::{DocumentReader, ReadRequest};
pub use resolver::{Access, CoordinateResolver};

// ============================================================================
// Writing
// ============================================================================
// Primary API: writer.write(buffer).location(...).plane(...).submit()

pub use allocator::PlaneTileAllocator;
pub use splitter::{SplitPolicy, SubTile, TileSplit};
pub use writer::{DocumentWriter, WriteRequest, WriterOptions};

// ============================================================================
// Caching
// ============================================================================

pub use cache::{CacheInfo, CacheOptions};

// ============================================================================
// TIFF Export
// ============================================================================

pub use export::{TiffCompression, TiffExporter};

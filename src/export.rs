//! TIFF export of pixel buffers.
//!
//! Composed regions are written as a single-image TIFF. Gray formats keep
//! their sample type; color buffers are reordered from the container's
//! B, G, R memory order to the R, G, B order TIFF expects.
//!
//! # Example
//!
//! ```rust,no_run
//! use planetile::engine::memory::MemoryEngine;
//! use planetile::export::{TiffCompression, TiffExporter};
//! use planetile::DocumentReader;
//!
//! # fn main() -> planetile::Result<()> {
//! let reader = DocumentReader::new(MemoryEngine::new());
//! let region = reader.read().region((0, 0, 256, 256)).fetch()?;
//! TiffExporter::new(&region)
//!     .compression(TiffCompression::Deflate)
//!     .description("Z0 C0 T0")
//!     .write("region.tif")?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{ColorType, Gray16, Gray32Float, Gray8, RGB16, RGB32Float, RGB8};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pixel::{PixelBuffer, PixelFormat};

/// Compression method for TIFF output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TiffCompression {
    #[default]
    None,
    Lzw,
    Deflate,
}

impl TiffCompression {
    fn to_tiff(self) -> Compression {
        match self {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::Deflate => Compression::Deflate(DeflateLevel::Fast),
        }
    }
}

/// Builder writing one [`PixelBuffer`] as a TIFF image.
pub struct TiffExporter<'a> {
    buffer: &'a PixelBuffer,
    compression: TiffCompression,
    description: Option<String>,
}

impl<'a> TiffExporter<'a> {
    #[must_use]
    pub fn new(buffer: &'a PixelBuffer) -> Self {
        Self {
            buffer,
            compression: TiffCompression::default(),
            description: None,
        }
    }

    #[must_use]
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Stored in the `ImageDescription` tag.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Write to a file path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or encoding fails.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    /// Encode into memory.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Write to any writer that implements `Write + Seek`.
    ///
    /// # Errors
    /// Returns an error for an empty buffer or if encoding fails.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<()> {
        let buffer = self.buffer;
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(Error::TiffExport("buffer has zero dimensions".to_string()));
        }
        let width = u32::try_from(buffer.width()).map_err(|e| Error::TiffExport(e.to_string()))?;
        let height = u32::try_from(buffer.height()).map_err(|e| Error::TiffExport(e.to_string()))?;

        debug!(
            width,
            height,
            format = %buffer.format(),
            compression = ?self.compression,
            "Exporting TIFF"
        );

        let mut encoder = TiffEncoder::new(writer)?.with_compression(self.compression.to_tiff());
        let bytes = buffer.as_bytes();
        match buffer.format() {
            PixelFormat::Gray8 => self.write_image::<_, Gray8>(&mut encoder, width, height, bytes),
            PixelFormat::Gray16 => {
                self.write_image::<_, Gray16>(&mut encoder, width, height, &u16_samples(bytes))
            }
            PixelFormat::Gray32Float => {
                self.write_image::<_, Gray32Float>(&mut encoder, width, height, &f32_samples(bytes))
            }
            PixelFormat::Bgr24 => {
                self.write_image::<_, RGB8>(&mut encoder, width, height, &bgr_to_rgb(bytes.to_vec()))
            }
            PixelFormat::Bgr48 => self.write_image::<_, RGB16>(
                &mut encoder,
                width,
                height,
                &bgr_to_rgb(u16_samples(bytes)),
            ),
            PixelFormat::Bgr96Float => self.write_image::<_, RGB32Float>(
                &mut encoder,
                width,
                height,
                &bgr_to_rgb(f32_samples(bytes)),
            ),
        }
    }

    fn write_image<W: Write + Seek, C: ColorType>(
        &self,
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        samples: &[C::Inner],
    ) -> Result<()>
    where
        [C::Inner]: tiff::encoder::TiffValue,
    {
        let mut image = encoder.new_image::<C>(width, height)?;
        if let Some(description) = &self.description {
            image.encoder().write_tag(Tag::ImageDescription, description.as_str())?;
        }
        image.write_data(samples)?;
        Ok(())
    }
}

fn u16_samples(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn f32_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn bgr_to_rgb<T>(mut samples: Vec<T>) -> Vec<T> {
    for px in samples.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    samples
}

//! Pixel formats and packed pixel buffers.
//!
//! Buffers are stored row-major and tightly packed. Color formats keep the
//! container's native memory order (B, G, R) and all multi-byte samples are
//! little-endian.

use std::fmt;
use std::str::FromStr;

use crate::casting::f32_to_clamped_u16;
use crate::error::{Error, Result};

/// Storage type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    U8 = 0,
    U16 = 1,
    F32 = 2,
}

impl SampleType {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::F32 => 4,
        }
    }

    /// Full-scale value for integer samples.
    #[must_use]
    pub const fn max_value(self) -> Option<u16> {
        match self {
            SampleType::U8 => Some(u8::MAX as u16),
            SampleType::U16 => Some(u16::MAX),
            SampleType::F32 => None,
        }
    }
}

/// The closed set of pixel formats a document can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Grayscale, 8-bit unsigned.
    Gray8,
    /// Grayscale, 16-bit unsigned.
    Gray16,
    /// Grayscale, 32-bit float.
    Gray32Float,
    /// Color, 8-bit unsigned triples (memory order B, G, R).
    Bgr24,
    /// Color, 16-bit unsigned triples (memory order B, G, R).
    Bgr48,
    /// Color, 32-bit float triples (memory order B, G, R).
    Bgr96Float,
}

// Indexed by `SampleType as usize`.
const GRAY_FORMATS: [PixelFormat; 3] = [
    PixelFormat::Gray8,
    PixelFormat::Gray16,
    PixelFormat::Gray32Float,
];
const COLOR_FORMATS: [PixelFormat; 3] = [
    PixelFormat::Bgr24,
    PixelFormat::Bgr48,
    PixelFormat::Bgr96Float,
];

impl PixelFormat {
    pub const ALL: [PixelFormat; 6] = [
        PixelFormat::Gray8,
        PixelFormat::Gray16,
        PixelFormat::Gray32Float,
        PixelFormat::Bgr24,
        PixelFormat::Bgr48,
        PixelFormat::Bgr96Float,
    ];

    /// Pick the format for a sample type and channel count (1 or 3).
    ///
    /// # Errors
    /// Returns a shape error for any other channel count.
    pub fn from_layout(sample: SampleType, channels: usize) -> Result<Self> {
        match channels {
            1 => Ok(GRAY_FORMATS[sample as usize]),
            3 => Ok(COLOR_FORMATS[sample as usize]),
            n => Err(Error::shape(format!(
                "incorrect channel dimension {n}, expected 1 (gray) or 3 (color)"
            ))),
        }
    }

    /// Numeric tag the storage engine uses for this format.
    #[must_use]
    pub const fn engine_tag(self) -> u8 {
        match self {
            PixelFormat::Gray8 => 0,
            PixelFormat::Gray16 => 1,
            PixelFormat::Gray32Float => 2,
            PixelFormat::Bgr24 => 3,
            PixelFormat::Bgr48 => 4,
            PixelFormat::Bgr96Float => 8,
        }
    }

    #[must_use]
    pub fn from_engine_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.engine_tag() == tag)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Gray8 => "Gray8",
            PixelFormat::Gray16 => "Gray16",
            PixelFormat::Gray32Float => "Gray32Float",
            PixelFormat::Bgr24 => "Bgr24",
            PixelFormat::Bgr48 => "Bgr48",
            PixelFormat::Bgr96Float => "Bgr96Float",
        }
    }

    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 | PixelFormat::Gray16 | PixelFormat::Gray32Float => 1,
            PixelFormat::Bgr24 | PixelFormat::Bgr48 | PixelFormat::Bgr96Float => 3,
        }
    }

    #[must_use]
    pub const fn sample_type(self) -> SampleType {
        match self {
            PixelFormat::Gray8 | PixelFormat::Bgr24 => SampleType::U8,
            PixelFormat::Gray16 | PixelFormat::Bgr48 => SampleType::U16,
            PixelFormat::Gray32Float | PixelFormat::Bgr96Float => SampleType::F32,
        }
    }

    #[must_use]
    pub const fn is_color(self) -> bool {
        self.channels() == 3
    }

    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        self.channels() * self.sample_type().bytes()
    }

    pub(crate) fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::UnsupportedPixelFormat {
                name: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// Background color as normalized floats in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BackgroundColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl BackgroundColor {
    pub const BLACK: BackgroundColor = BackgroundColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Encode as one pixel of `format`.
    #[must_use]
    pub fn encode(&self, format: PixelFormat) -> Vec<u8> {
        let scale = format
            .sample_type()
            .max_value()
            .map_or(1.0, f32::from);
        let bgr = [self.b * scale, self.g * scale, self.r * scale];
        let mut out = vec![0u8; format.bytes_per_pixel()];
        encode_pixel(format, bgr, &mut out);
        out
    }
}

impl From<(f32, f32, f32)> for BackgroundColor {
    fn from((r, g, b): (f32, f32, f32)) -> Self {
        Self::new(r, g, b)
    }
}

/// A packed 2-D pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    format: PixelFormat,
    width: usize,
    height: usize,
    data: Vec<u8>,
}

/// Bytes held by a `width` x `height` buffer of `format`, if that fits in `usize`.
fn checked_byte_len(format: PixelFormat, width: usize, height: usize) -> Option<usize> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
}

impl PixelBuffer {
    /// A zero-filled buffer.
    ///
    /// # Panics
    /// Panics like [`Vec::with_capacity`] if the byte count overflows `usize`.
    #[must_use]
    pub fn new(format: PixelFormat, width: usize, height: usize) -> Self {
        let len = checked_byte_len(format, width, height).unwrap_or(usize::MAX);
        Self {
            format,
            width,
            height,
            data: vec![0; len],
        }
    }

    /// A buffer filled with one pixel value.
    ///
    /// # Panics
    /// Panics like [`Vec::with_capacity`] if the byte count overflows `usize`.
    #[must_use]
    pub fn filled(format: PixelFormat, width: usize, height: usize, pixel: &[u8]) -> Self {
        let len = checked_byte_len(format, width, height).unwrap_or(usize::MAX);
        let mut data = Vec::with_capacity(len);
        data.extend(pixel.iter().copied().cycle().take(len));
        Self {
            format,
            width,
            height,
            data,
        }
    }

    /// Wrap packed bytes.
    ///
    /// # Errors
    /// Returns a shape error if `data` does not hold exactly `width * height` pixels.
    pub fn from_bytes(format: PixelFormat, width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let Some(expected) = checked_byte_len(format, width, height) else {
            return Err(Error::shape(format!("{width}x{height} {format} buffer overflows the address space")));
        };
        if data.len() != expected {
            return Err(Error::shape(format!(
                "{width}x{height} {format} buffer needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// Wrap packed bytes described by an array shape: `(height, width)`,
    /// `(height, width, 1)` or `(height, width, 3)`.
    ///
    /// # Errors
    /// Returns a shape error for fewer than two dimensions, a channel axis other
    /// than 1 or 3, or a byte count that does not match the shape.
    pub fn from_shape(shape: &[usize], sample: SampleType, data: Vec<u8>) -> Result<Self> {
        let (height, width, channels) = match *shape {
            [h, w] => (h, w, 1),
            [h, w, c] => (h, w, c),
            [] | [_] => {
                return Err(Error::shape(
                    "the data provided should have a shape of at least length 3 (e.g. (m,n,3) or (m,n,1))",
                ))
            }
            _ => {
                return Err(Error::shape(format!(
                    "expected (m,n), (m,n,1) or (m,n,3), got {} dimensions",
                    shape.len()
                )))
            }
        };
        let format = PixelFormat::from_layout(sample, channels)?;
        Self::from_bytes(format, width, height, data)
    }

    /// Build from 8-bit samples.
    ///
    /// # Errors
    /// See [`PixelBuffer::from_shape`].
    pub fn from_u8(shape: &[usize], samples: &[u8]) -> Result<Self> {
        Self::from_shape(shape, SampleType::U8, samples.to_vec())
    }

    /// Build from 16-bit samples.
    ///
    /// # Errors
    /// See [`PixelBuffer::from_shape`].
    pub fn from_u16(shape: &[usize], samples: &[u16]) -> Result<Self> {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_shape(shape, SampleType::U16, bytes)
    }

    /// Build from float samples.
    ///
    /// # Errors
    /// See [`PixelBuffer::from_shape`].
    pub fn from_f32(shape: &[usize], samples: &[f32]) -> Result<Self> {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_shape(shape, SampleType::F32, bytes)
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `[height, width, channels]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.format.channels()]
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.data[y * stride..(y + 1) * stride]
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y * self.stride() + x * bpp;
        &self.data[start..start + bpp]
    }

    pub(crate) fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y * self.stride() + x * bpp;
        &mut self.data[start..start + bpp]
    }

    /// Copy out the rectangle at `(x, y)` of size `width x height`.
    ///
    /// # Errors
    /// Returns a shape error if the rectangle leaves the buffer.
    pub fn sub_buffer(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Self> {
        if x + width > self.width || y + height > self.height {
            return Err(Error::shape(format!(
                "sub-buffer ({x}, {y}, {width}x{height}) exceeds {}x{} buffer",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(width * height * bpp);
        for row in y..y + height {
            let src = self.row(row);
            data.extend_from_slice(&src[x * bpp..(x + width) * bpp]);
        }
        Ok(Self {
            format: self.format,
            width,
            height,
            data,
        })
    }

    /// Copy `src` into this buffer with its top-left corner at `(x, y)`.
    ///
    /// # Errors
    /// Returns a shape error if formats differ or `src` does not fit.
    pub fn blit(&mut self, src: &PixelBuffer, x: usize, y: usize) -> Result<()> {
        if src.format != self.format {
            return Err(Error::shape(format!(
                "cannot blit {} into {}",
                src.format, self.format
            )));
        }
        if x + src.width > self.width || y + src.height > self.height {
            return Err(Error::shape(format!(
                "{}x{} buffer at ({x}, {y}) exceeds {}x{} target",
                src.width, src.height, self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        for row in 0..src.height {
            let dst = self.row_mut(y + row);
            dst[x * bpp..(x + src.width) * bpp].copy_from_slice(src.row(row));
        }
        Ok(())
    }
}

fn decode_sample(sample: SampleType, bytes: &[u8]) -> f32 {
    match sample {
        SampleType::U8 => f32::from(bytes[0]),
        SampleType::U16 => f32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        SampleType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

fn encode_sample(sample: SampleType, value: f32, out: &mut [u8]) {
    match sample {
        #[allow(clippy::cast_possible_truncation)]
        SampleType::U8 => out[0] = f32_to_clamped_u16(value, u16::from(u8::MAX)) as u8,
        SampleType::U16 => out.copy_from_slice(&f32_to_clamped_u16(value, u16::MAX).to_le_bytes()),
        SampleType::F32 => out.copy_from_slice(&value.to_le_bytes()),
    }
}

/// Decode one pixel into `[b, g, r]` in the format's raw sample units.
pub(crate) fn decode_pixel(format: PixelFormat, bytes: &[u8]) -> [f32; 3] {
    let sample = format.sample_type();
    let n = sample.bytes();
    if format.is_color() {
        [
            decode_sample(sample, &bytes[0..n]),
            decode_sample(sample, &bytes[n..2 * n]),
            decode_sample(sample, &bytes[2 * n..3 * n]),
        ]
    } else {
        let v = decode_sample(sample, &bytes[0..n]);
        [v, v, v]
    }
}

/// Encode `[b, g, r]` raw sample values as one pixel of `format`.
pub(crate) fn encode_pixel(format: PixelFormat, bgr: [f32; 3], out: &mut [u8]) {
    let sample = format.sample_type();
    let n = sample.bytes();
    if format.is_color() {
        for (i, v) in bgr.iter().enumerate() {
            encode_sample(sample, *v, &mut out[i * n..(i + 1) * n]);
        }
    } else {
        let gray = (bgr[0] + bgr[1] + bgr[2]) / 3.0;
        encode_sample(sample, gray, &mut out[0..n]);
    }
}

/// Convert one pixel between formats.
///
/// Integer samples are rescaled between bit depths; float samples keep their
/// raw value. Gray expands to equal color components, color collapses to
/// the component mean.
pub(crate) fn convert_pixel(src: PixelFormat, src_bytes: &[u8], dst: PixelFormat, out: &mut [u8]) {
    if src == dst {
        out.copy_from_slice(src_bytes);
        return;
    }
    let mut bgr = decode_pixel(src, src_bytes);
    if let (Some(from), Some(to)) = (src.sample_type().max_value(), dst.sample_type().max_value()) {
        let factor = f32::from(to) / f32::from(from);
        for v in &mut bgr {
            *v *= factor;
        }
    }
    encode_pixel(dst, bgr, out);
}

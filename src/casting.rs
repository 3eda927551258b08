//! Checked numeric conversions between pixel extents and document coordinates.
//!
//! Buffers are indexed with `usize`, document coordinates are `i32` (tiles may
//! sit left of or above the origin) and aggregated ranges are `i64`.
//!
//! # Assumptions
//!
//! - A single tile or composed region never exceeds `i32::MAX` pixels per side.
//! - Zoom factors are in `(0, 1]`, so scaled extents never exceed the source.

use std::convert::TryFrom;

/// Convert a buffer extent to a document coordinate delta.
///
/// # Errors
/// Returns an error string if the value exceeds `i32::MAX`.
#[inline]
pub fn usize_to_i32(value: usize) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("Extent {value} exceeds i32 maximum"))
}

/// Convert a document extent to a buffer extent, failing on negative values.
///
/// # Errors
/// Returns an error string if the value is negative.
#[inline]
pub fn i32_to_usize(value: i32) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("Extent {value} is negative"))
}

/// Convert an aggregated dimension size to an `i64` range bound.
#[inline]
#[must_use]
pub fn usize_to_i64_saturating(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Scale an extent by a zoom factor, rounding to the nearest pixel.
///
/// Non-empty extents never collapse to zero.
#[inline]
#[must_use]
pub fn scaled_extent(extent: usize, zoom: f64) -> usize {
    if extent == 0 {
        return 0;
    }
    // Allow cast precision loss: extents are far below 2^53
    #[allow(clippy::cast_precision_loss)]
    let scaled = (extent as f64 * zoom).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = scaled as usize;
    scaled.max(1)
}

/// Map an output pixel index back to a source offset under `zoom`.
#[inline]
#[must_use]
pub fn unscaled_offset(index: usize, zoom: f64) -> i64 {
    #[allow(clippy::cast_precision_loss)]
    let src = (index as f64 / zoom).floor();
    #[allow(clippy::cast_possible_truncation)]
    let src = src as i64;
    src
}

/// Clamp a float sample to `[0, max]` and round it.
#[inline]
#[must_use]
pub fn f32_to_clamped_u16(value: f32, max: u16) -> u16 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max_f = f32::from(max);
    if value >= max_f {
        return max;
    }
    // Safety: we've already checked 0 < value < max above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let v = value.round() as u16;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usize_to_i32() {
        assert_eq!(usize_to_i32(0), Ok(0));
        assert_eq!(usize_to_i32(1800), Ok(1800));
        #[cfg(target_pointer_width = "64")]
        assert!(usize_to_i32(usize::MAX).is_err());
    }

    #[test]
    fn test_i32_to_usize() {
        assert_eq!(i32_to_usize(5), Ok(5));
        assert!(i32_to_usize(-1).is_err());
    }

    #[test]
    fn test_scaled_extent() {
        assert_eq!(scaled_extent(100, 1.0), 100);
        assert_eq!(scaled_extent(100, 0.5), 50);
        assert_eq!(scaled_extent(3, 0.1), 1);
        assert_eq!(scaled_extent(0, 0.5), 0);
    }

    #[test]
    fn test_unscaled_offset() {
        assert_eq!(unscaled_offset(0, 0.5), 0);
        assert_eq!(unscaled_offset(3, 0.5), 6);
        assert_eq!(unscaled_offset(7, 1.0), 7);
    }

    #[test]
    fn test_f32_to_clamped_u16() {
        assert_eq!(f32_to_clamped_u16(-3.0, 255), 0);
        assert_eq!(f32_to_clamped_u16(f32::NAN, 255), 0);
        assert_eq!(f32_to_clamped_u16(300.0, 255), 255);
        assert_eq!(f32_to_clamped_u16(12.4, 255), 12);
        assert_eq!(f32_to_clamped_u16(70000.0, u16::MAX), u16::MAX);
    }
}

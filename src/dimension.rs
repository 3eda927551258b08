//! Dimension catalog and plane coordinates.
//!
//! A document addresses its 2-D tiles by one index per populated dimension.
//! The catalog below fixes the set of dimensions a plane coordinate may name
//! and the identifier the storage engine uses for each of them.
//!
//! The scene dimension is part of [`Dimension`] because the engine needs it
//! for writes, but it is *not* part of [`Dimension::PLANE`]: on the read side
//! a scene filters tiles, it does not select a plane.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named, non-spatial axis of a document.
///
/// Ordering follows the engine identifiers, which is also the order used when
/// a [`PlaneCoordinate`] is formatted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Dimension {
    /// Depth ("Z").
    Z,
    /// Channel ("C").
    C,
    /// Time ("T").
    T,
    /// Rotation ("R").
    R,
    /// Scene ("S"). A filter, not a plane coordinate.
    S,
    /// Illumination ("I").
    I,
    /// Phase ("H").
    H,
    /// View ("V").
    V,
    /// Block ("B"). Deprecated, may carry negative indices.
    B,
}

impl Dimension {
    /// Dimensions that make up a plane coordinate, in catalog order.
    pub const PLANE: [Dimension; 8] = [
        Dimension::Z,
        Dimension::C,
        Dimension::T,
        Dimension::R,
        Dimension::I,
        Dimension::H,
        Dimension::V,
        Dimension::B,
    ];

    /// Dimensions reported with range `(0, 1)` even when absent from a document.
    pub const ALWAYS_REPORTED: [Dimension; 3] = [Dimension::T, Dimension::Z, Dimension::C];

    /// Identifier of this dimension in the storage engine.
    #[must_use]
    pub const fn engine_id(self) -> u8 {
        match self {
            Dimension::Z => 1,
            Dimension::C => 2,
            Dimension::T => 3,
            Dimension::R => 4,
            Dimension::S => 5,
            Dimension::I => 6,
            Dimension::H => 7,
            Dimension::V => 8,
            Dimension::B => 9,
        }
    }

    /// Look up a dimension by its engine identifier.
    #[must_use]
    pub fn from_engine_id(id: u8) -> Option<Self> {
        Self::PLANE
            .iter()
            .copied()
            .chain(std::iter::once(Dimension::S))
            .find(|d| d.engine_id() == id)
    }

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Dimension::Z => 'Z',
            Dimension::C => 'C',
            Dimension::T => 'T',
            Dimension::R => 'R',
            Dimension::S => 'S',
            Dimension::I => 'I',
            Dimension::H => 'H',
            Dimension::V => 'V',
            Dimension::B => 'B',
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Dimension::Z => "depth",
            Dimension::C => "channel",
            Dimension::T => "time",
            Dimension::R => "rotation",
            Dimension::S => "scene",
            Dimension::I => "illumination",
            Dimension::H => "phase",
            Dimension::V => "view",
            Dimension::B => "block",
        }
    }

    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'Z' => Some(Dimension::Z),
            'C' => Some(Dimension::C),
            'T' => Some(Dimension::T),
            'R' => Some(Dimension::R),
            'S' => Some(Dimension::S),
            'I' => Some(Dimension::I),
            'H' => Some(Dimension::H),
            'V' => Some(Dimension::V),
            'B' => Some(Dimension::B),
            _ => None,
        }
    }

    /// Resolve a caller-facing key: either the single letter or the long name.
    #[must_use]
    pub fn lookup(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::from_letter(c);
        }
        Self::PLANE
            .iter()
            .copied()
            .chain(std::iter::once(Dimension::S))
            .find(|d| d.name().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| format!("unknown dimension `{s}`"))
    }
}

/// A caller-supplied, possibly incomplete plane coordinate.
///
/// Keys are kept as given; names that do not resolve to a dimension, or
/// that name a dimension the document does not populate, are dropped during
/// completion rather than rejected. Later entries win over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialPlane {
    entries: Vec<(String, i32)>,
}

impl PartialPlane {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, overriding any earlier value for it.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: i32) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, const N: usize> From<[(K, i32); N]> for PartialPlane {
    fn from(pairs: [(K, i32); N]) -> Self {
        pairs.into_iter().fold(Self::new(), |p, (k, v)| p.with(k, v))
    }
}

impl<K: Into<String>> FromIterator<(K, i32)> for PartialPlane {
    fn from_iter<I: IntoIterator<Item = (K, i32)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |p, (k, v)| p.with(k, v))
    }
}

impl From<&PlaneCoordinate> for PartialPlane {
    fn from(plane: &PlaneCoordinate) -> Self {
        plane.iter().map(|(d, v)| (d.letter().to_string(), v)).collect()
    }
}

/// A complete plane coordinate: one index per dimension it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlaneCoordinate {
    indices: BTreeMap<Dimension, i32>,
}

impl PlaneCoordinate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, dim: Dimension, index: i32) {
        self.indices.insert(dim, index);
    }

    #[must_use]
    pub fn with(mut self, dim: Dimension, index: i32) -> Self {
        self.set(dim, index);
        self
    }

    #[must_use]
    pub fn get(&self, dim: Dimension) -> Option<i32> {
        self.indices.get(&dim).copied()
    }

    #[must_use]
    pub fn contains(&self, dim: Dimension) -> bool {
        self.indices.contains_key(&dim)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, i32)> + '_ {
        self.indices.iter().map(|(d, v)| (*d, *v))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.indices.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// True if every dimension named by `self` has the same index in `other`.
    ///
    /// Dimensions `other` carries beyond those of `self` are ignored, which is
    /// how a requested plane selects tiles that carry more dimensions.
    #[must_use]
    pub fn selects(&self, other: &PlaneCoordinate) -> bool {
        self.iter()
            .filter(|(d, _)| *d != Dimension::S)
            .all(|(d, v)| other.get(d) == Some(v))
    }
}

/// Engine key format: `"Z2 C0 S1"`.
impl fmt::Display for PlaneCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (dim, index) in &self.indices {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{dim}{index}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for PlaneCoordinate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut plane = PlaneCoordinate::new();
        for token in s.split_whitespace() {
            let mut chars = token.chars();
            let letter = chars
                .next()
                .ok_or_else(|| format!("empty coordinate token in `{s}`"))?;
            let dim = Dimension::from_letter(letter)
                .ok_or_else(|| format!("unknown dimension `{letter}` in `{s}`"))?;
            let index = chars
                .as_str()
                .parse::<i32>()
                .map_err(|e| format!("invalid index in `{token}`: {e}"))?;
            plane.set(dim, index);
        }
        Ok(plane)
    }
}

impl FromIterator<(Dimension, i32)> for PlaneCoordinate {
    fn from_iter<I: IntoIterator<Item = (Dimension, i32)>>(iter: I) -> Self {
        Self {
            indices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_not_in_plane_catalog() {
        assert!(!Dimension::PLANE.contains(&Dimension::S));
        assert_eq!(Dimension::PLANE.len(), 8);
    }

    #[test]
    fn test_engine_ids() {
        assert_eq!(Dimension::Z.engine_id(), 1);
        assert_eq!(Dimension::C.engine_id(), 2);
        assert_eq!(Dimension::T.engine_id(), 3);
        assert_eq!(Dimension::S.engine_id(), 5);
        assert_eq!(Dimension::B.engine_id(), 9);
        assert_eq!(Dimension::from_engine_id(7), Some(Dimension::H));
        assert_eq!(Dimension::from_engine_id(0), None);
    }

    #[test]
    fn test_lookup_letters_and_names() {
        assert_eq!(Dimension::lookup("Z"), Some(Dimension::Z));
        assert_eq!(Dimension::lookup("t"), Some(Dimension::T));
        assert_eq!(Dimension::lookup("depth"), Some(Dimension::Z));
        assert_eq!(Dimension::lookup("Channel"), Some(Dimension::C));
        assert_eq!(Dimension::lookup("Q"), None);
        assert_eq!(Dimension::lookup("mosaic"), None);
    }

    #[test]
    fn test_plane_display() {
        let plane = PlaneCoordinate::new()
            .with(Dimension::T, 0)
            .with(Dimension::Z, 8)
            .with(Dimension::C, 0);
        assert_eq!(plane.to_string(), "Z8 C0 T0");

        let plane = PlaneCoordinate::new().with(Dimension::C, 0);
        assert_eq!(plane.to_string(), "C0");
    }

    #[test]
    fn test_plane_parse() {
        let plane: PlaneCoordinate = "T0 Z100 S3 B-1".parse().unwrap();
        assert_eq!(plane.get(Dimension::Z), Some(100));
        assert_eq!(plane.get(Dimension::S), Some(3));
        assert_eq!(plane.get(Dimension::B), Some(-1));
        assert!("X1".parse::<PlaneCoordinate>().is_err());
        assert!("Zabc".parse::<PlaneCoordinate>().is_err());
    }

    #[test]
    fn test_selects_ignores_extra_dims_and_scene() {
        let request = PlaneCoordinate::new().with(Dimension::C, 1);
        let tile = PlaneCoordinate::new()
            .with(Dimension::C, 1)
            .with(Dimension::T, 0)
            .with(Dimension::S, 2);
        assert!(request.selects(&tile));

        let other = PlaneCoordinate::new().with(Dimension::C, 0);
        assert!(!request.selects(&other));
    }

    #[test]
    fn test_partial_plane_keeps_unknown_keys() {
        let partial = PartialPlane::from([("T", 5), ("Q", 1)]);
        let keys: Vec<_> = partial.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["T", "Q"]);
    }
}

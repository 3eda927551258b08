//! Per-plane multiplicity indices for one write session.

use std::collections::HashMap;

use crate::dimension::PlaneCoordinate;
use crate::error::{Error, Result};

/// Issues `0, 1, 2, ...` per plane key.
///
/// Owned by a single writer and dropped with it; indices are never reused.
#[derive(Debug, Default)]
pub struct PlaneTileAllocator {
    next: HashMap<String, u32>,
}

impl PlaneTileAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index for `key`, starting at 0.
    ///
    /// # Errors
    /// Returns [`Error::IndicesExhausted`] once `key` has no larger index left.
    pub fn next_index(&mut self, key: &str) -> Result<u32> {
        let slot = self.next.entry(key.to_string()).or_insert(0);
        let index = *slot;
        *slot = index
            .checked_add(1)
            .ok_or_else(|| Error::IndicesExhausted { key: key.to_string() })?;
        Ok(index)
    }

    /// Next index for the formatted key of `plane`.
    ///
    /// # Errors
    /// See [`PlaneTileAllocator::next_index`].
    pub fn next_for_plane(&mut self, plane: &PlaneCoordinate) -> Result<u32> {
        self.next_index(&plane.to_string())
    }

    /// Number of indices issued for `key` so far.
    #[must_use]
    pub fn issued(&self, key: &str) -> u32 {
        self.next.get(key).copied().unwrap_or(0)
    }
}

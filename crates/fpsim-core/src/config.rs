//! Arena construction options

use serde::{Deserialize, Serialize};

use crate::error::{FpSimError, Result};

/// Default byte alignment of arena rows (one 64-bit word).
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Options consumed by [`crate::arena::ArenaBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaOptions {
    /// Row stride and buffer start are multiples of this (power of two)
    pub alignment: usize,
    /// Sort rows by ascending popcount; ids follow their rows
    pub reorder_by_popcount: bool,
    /// Build the popcount index (requires `reorder_by_popcount`)
    pub build_popcount_index: bool,
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            reorder_by_popcount: true,
            build_popcount_index: true,
        }
    }
}

impl ArenaOptions {
    /// Keep rows in insertion order, without a popcount index.
    pub fn unordered() -> Self {
        Self {
            reorder_by_popcount: false,
            build_popcount_index: false,
            ..Self::default()
        }
    }

    /// Set the row alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Check option consistency.
    pub fn validate(&self) -> Result<()> {
        check_alignment(self.alignment)?;
        if self.build_popcount_index && !self.reorder_by_popcount {
            return Err(FpSimError::InvalidArgument(
                "a popcount index requires rows reordered by popcount".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_alignment(alignment: usize) -> Result<()> {
    if alignment == 0 || !alignment.is_power_of_two() {
        return Err(FpSimError::InvalidArgument(format!(
            "alignment must be a power of two, got {}",
            alignment
        )));
    }
    Ok(())
}

/// Storage size for `num_bits` bits: whole bytes rounded up to `alignment`.
pub fn storage_size_for(num_bits: usize, alignment: usize) -> usize {
    round_up((num_bits + 7) / 8, alignment)
}

#[inline]
pub(crate) fn round_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

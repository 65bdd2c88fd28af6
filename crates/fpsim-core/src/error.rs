//! Error types for fpsim

use thiserror::Error;

/// Result type alias for fpsim operations
pub type Result<T> = std::result::Result<T, FpSimError>;

/// Main error type for fpsim
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FpSimError {
    /// Query and target fingerprints do not share a bit or byte width
    #[error("Size mismatch: query uses {query} {unit} while target uses {target} {unit}")]
    SizeMismatch {
        /// Either "bits" or "bytes"
        unit: &'static str,
        /// Width on the query side
        query: usize,
        /// Width on the target side
        target: usize,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Row or hit index outside of the container
    #[error("Index out of range: {index} is not in 0..{len}")]
    IndexOutOfRange {
        /// Requested index, as given by the caller
        index: isize,
        /// Number of valid entries
        len: usize,
    },

    /// Ids were requested from a result set built without target ids
    #[error("Target ids are not available")]
    IdsUnavailable,

    /// Arena construction rejected its inputs
    #[error("Invalid arena layout: {0}")]
    InvalidLayout(String),

    /// Hex fingerprint contained a non-hex character or an odd length
    #[error("Invalid hex fingerprint: {0}")]
    InvalidHex(String),
}

impl FpSimError {
    pub(crate) fn bits(query: usize, target: usize) -> Self {
        FpSimError::SizeMismatch {
            unit: "bits",
            query,
            target,
        }
    }

    pub(crate) fn bytes(query: usize, target: usize) -> Self {
        FpSimError::SizeMismatch {
            unit: "bytes",
            query,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_message_names_both_sizes() {
        let err = FpSimError::bits(166, 1024);
        assert_eq!(
            err.to_string(),
            "Size mismatch: query uses 166 bits while target uses 1024 bits"
        );
    }

    #[test]
    fn test_index_out_of_range_message() {
        let err = FpSimError::IndexOutOfRange { index: -4, len: 3 };
        assert_eq!(err.to_string(), "Index out of range: -4 is not in 0..3");
    }
}

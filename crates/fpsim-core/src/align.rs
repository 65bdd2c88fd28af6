//! Alignment of standalone fingerprints to an arena's layout
//!
//! A query that did not come from an arena is copied into a zeroed buffer
//! whose payload starts on an `alignment` boundary and spans at least the
//! arena's storage size, so it can be scanned with the same stride as
//! arena rows.

use crate::config::{check_alignment, round_up};
use crate::error::{FpSimError, Result};

/// A fingerprint copied into an aligned, zero-padded buffer.
#[derive(Debug, Clone)]
pub struct AlignedFingerprint {
    start_padding: usize,
    end_padding: usize,
    storage_size: usize,
    bytes: Vec<u8>,
}

impl AlignedFingerprint {
    /// Zero bytes in front of the original fingerprint
    pub fn start_padding(&self) -> usize {
        self.start_padding
    }

    /// Zero bytes after the original fingerprint
    pub fn end_padding(&self) -> usize {
        self.end_padding
    }

    /// The whole buffer, padding included. Its length is a multiple of the alignment.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The storage window holding the fingerprint, `storage_size` bytes long.
    pub fn fingerprint(&self) -> &[u8] {
        &self.bytes[self.start_padding..self.start_padding + self.storage_size]
    }

    /// Split into `(start_padding, end_padding, bytes)`.
    pub fn into_parts(self) -> (usize, usize, Vec<u8>) {
        (self.start_padding, self.end_padding, self.bytes)
    }
}

/// Zeroed buffer of at least `payload` bytes whose data starts `alignment`-aligned.
///
/// Returns the buffer and the offset of the aligned start. The buffer length
/// is a multiple of `alignment`.
pub(crate) fn zeroed_aligned(payload: usize, alignment: usize) -> Result<(Vec<u8>, usize)> {
    let capacity = payload
        .checked_add(2 * alignment)
        .ok_or_else(|| FpSimError::InvalidLayout("buffer size overflow".to_string()))?;
    let mut bytes = vec![0u8; capacity];

    let start_padding = match bytes.as_ptr().align_offset(alignment) {
        offset if offset < alignment => offset,
        _ => 0,
    };
    // Shrinking never reallocates, so the aligned start stays put.
    bytes.truncate(round_up(start_padding + payload, alignment));
    Ok((bytes, start_padding))
}

/// Copy `fp` into a buffer matching an arena's stride and alignment.
///
/// The returned buffer's length is a multiple of `alignment` and holds at
/// least `storage_size` bytes after `start_padding`. The original bytes sit
/// unchanged at `start_padding..start_padding + fp.len()`.
pub fn align_fingerprint(
    fp: &[u8],
    alignment: usize,
    storage_size: usize,
) -> Result<AlignedFingerprint> {
    check_alignment(alignment)?;

    let storage_size = storage_size.max(fp.len());
    let payload = round_up(storage_size, alignment);
    let (mut bytes, start_padding) = zeroed_aligned(payload, alignment)?;
    bytes[start_padding..start_padding + fp.len()].copy_from_slice(fp);
    let end_padding = bytes.len() - start_padding - fp.len();

    Ok(AlignedFingerprint {
        start_padding,
        end_padding,
        storage_size,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_preserves_bytes() {
        let fp = [0xde, 0xad, 0xbe];
        for alignment in [1, 2, 4, 8, 16, 64] {
            let aligned = align_fingerprint(&fp, alignment, 8).unwrap();
            let start = aligned.start_padding();
            assert_eq!(aligned.as_bytes().len() % alignment, 0);
            assert_eq!(&aligned.as_bytes()[start..start + 3], &fp);
            assert_eq!(aligned.fingerprint().len(), 8);
            assert_eq!(aligned.fingerprint().as_ptr() as usize % alignment, 0);
            assert_eq!(
                start + fp.len() + aligned.end_padding(),
                aligned.as_bytes().len()
            );
        }
    }

    #[test]
    fn test_padding_is_zero() {
        let aligned = align_fingerprint(&[0xff; 5], 8, 16).unwrap();
        let (start, _, bytes) = aligned.into_parts();
        assert!(bytes[..start].iter().all(|&b| b == 0));
        assert!(bytes[start + 5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_storage_smaller_than_fp() {
        let aligned = align_fingerprint(&[1, 2, 3, 4, 5], 4, 2).unwrap();
        assert_eq!(aligned.fingerprint(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(matches!(
            align_fingerprint(&[1], 3, 8),
            Err(FpSimError::InvalidArgument(_))
        ));
    }
}

//! Fingerprint arenas
//!
//! An arena stores N fingerprints of identical width in one contiguous,
//! zero-padded buffer. Rows are `storage_size` bytes apart and row 0 starts
//! on an `alignment` boundary. Bits past `num_bits` are always zero, which
//! lets the popcount kernels scan whole rows without masking.
//!
//! Arenas are immutable once built. [`FingerprintArena::slice`] returns a
//! view onto a `[start, end)` window that shares the same buffer and ids.

use std::ops::Range;
use std::sync::Arc;

use crate::align::zeroed_aligned;
use crate::config::{check_alignment, storage_size_for, ArenaOptions};
use crate::error::{FpSimError, Result};
use crate::popcount::popcount;

/// Row offsets grouped by popcount.
///
/// Rows with popcount `p` occupy `offsets[p]..offsets[p + 1]`. Only valid
/// for arenas whose rows are sorted by ascending popcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopcountIndex {
    offsets: Vec<usize>,
}

impl PopcountIndex {
    fn from_sorted_popcounts(popcounts: &[u32], num_bits: usize) -> Self {
        let mut offsets = vec![0usize; num_bits + 2];
        for &p in popcounts {
            offsets[p as usize + 1] += 1;
        }
        for p in 1..offsets.len() {
            offsets[p] += offsets[p - 1];
        }
        Self { offsets }
    }

    /// Largest representable popcount (the arena's bit width).
    pub fn max_popcount(&self) -> u32 {
        (self.offsets.len() - 2) as u32
    }

    /// Rows whose popcount is exactly `popcount`.
    pub fn rows_with_popcount(&self, popcount: u32) -> Range<usize> {
        let p = (popcount.min(self.max_popcount())) as usize;
        self.offsets[p]..self.offsets[p + 1]
    }

    /// Rows whose popcount lies in `lo..=hi`. Empty when `lo > hi`.
    pub fn rows_in_popcount_range(&self, lo: u32, hi: u32) -> Range<usize> {
        let hi = hi.min(self.max_popcount());
        if lo > hi {
            let at = self.offsets[self.offsets.len() - 1];
            return at..at;
        }
        self.offsets[lo as usize]..self.offsets[hi as usize + 1]
    }
}

#[derive(Debug)]
struct Storage {
    bytes: Vec<u8>,
    start_padding: usize,
    num_rows: usize,
}

/// Immutable, aligned store of fixed-width fingerprints.
#[derive(Debug, Clone)]
pub struct FingerprintArena {
    storage: Arc<Storage>,
    num_bits: usize,
    storage_size: usize,
    alignment: usize,
    start: usize,
    end: usize,
    ids: Option<Arc<Vec<String>>>,
    popcount_index: Option<Arc<PopcountIndex>>,
}

fn check_row_width(num_bits: usize, storage_size: usize, alignment: usize) -> Result<()> {
    if num_bits == 0 {
        return Err(FpSimError::InvalidLayout("num_bits must be positive".to_string()));
    }
    check_alignment(alignment)?;
    let min_bytes = (num_bits + 7) / 8;
    if storage_size < min_bytes {
        return Err(FpSimError::InvalidLayout(format!(
            "storage size {} cannot hold {} bits",
            storage_size, num_bits
        )));
    }
    if storage_size % alignment != 0 {
        return Err(FpSimError::InvalidLayout(format!(
            "storage size {} is not a multiple of alignment {}",
            storage_size, alignment
        )));
    }
    Ok(())
}

/// True if no bit at position `num_bits` or later is set.
pub(crate) fn padding_is_zero(fp: &[u8], num_bits: usize) -> bool {
    let full_bytes = num_bits / 8;
    let spare_bits = num_bits % 8;
    let mut tail = full_bytes;
    if spare_bits != 0 {
        if let Some(&last) = fp.get(full_bytes) {
            if last >> spare_bits != 0 {
                return false;
            }
        }
        tail += 1;
    }
    fp.get(tail..).map_or(true, |rest| rest.iter().all(|&b| b == 0))
}

impl FingerprintArena {
    /// Build an arena from a flat buffer of `storage_size`-byte rows.
    ///
    /// Rows keep their order and no popcount index is built. The buffer
    /// length must be a whole number of rows, `ids` (if any) must name every
    /// row, and bits past `num_bits` must be zero.
    pub fn from_bytes(
        data: &[u8],
        num_bits: usize,
        storage_size: usize,
        alignment: usize,
        ids: Option<Vec<String>>,
    ) -> Result<Self> {
        check_row_width(num_bits, storage_size, alignment)?;
        if data.len() % storage_size != 0 {
            return Err(FpSimError::InvalidLayout(format!(
                "buffer of {} bytes is not a whole number of {}-byte rows",
                data.len(),
                storage_size
            )));
        }
        let num_rows = data.len() / storage_size;
        check_ids(ids.as_deref(), num_rows)?;

        let (mut bytes, start_padding) = zeroed_aligned(data.len(), alignment)?;
        for (row, fp) in data.chunks_exact(storage_size).enumerate() {
            if !padding_is_zero(fp, num_bits) {
                return Err(FpSimError::InvalidLayout(format!(
                    "row {} has bits set past bit {}",
                    row, num_bits
                )));
            }
        }
        bytes[start_padding..start_padding + data.len()].copy_from_slice(data);

        tracing::debug!(
            "Built arena with {} rows of {} bits ({} bytes/row)",
            num_rows,
            num_bits,
            storage_size
        );

        Ok(Self {
            storage: Arc::new(Storage {
                bytes,
                start_padding,
                num_rows,
            }),
            num_bits,
            storage_size,
            alignment,
            start: 0,
            end: num_rows,
            ids: ids.map(Arc::new),
            popcount_index: None,
        })
    }

    /// Number of rows in this view
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True if the view has no rows
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Fingerprint width in bits
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Row stride in bytes (same as [`Self::storage_size`])
    pub fn num_bytes(&self) -> usize {
        self.storage_size
    }

    /// Row stride in bytes, a multiple of the alignment
    pub fn storage_size(&self) -> usize {
        self.storage_size
    }

    /// Bytes needed for `num_bits` without padding
    pub fn fingerprint_bytes(&self) -> usize {
        (self.num_bits + 7) / 8
    }

    /// Byte alignment of the rows
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// First row of this view in the shared buffer
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last row of this view in the shared buffer
    pub fn end(&self) -> usize {
        self.end
    }

    /// Zero bytes in front of row 0 of the shared buffer
    pub fn start_padding(&self) -> usize {
        self.storage.start_padding
    }

    /// Zero bytes after the last row of the shared buffer
    pub fn end_padding(&self) -> usize {
        self.storage.bytes.len()
            - self.storage.start_padding
            - self.storage.num_rows * self.storage_size
    }

    /// Raw bytes of row `row` (`storage_size` bytes, padding included).
    ///
    /// # Panics
    /// Panics if `row >= self.len()`.
    #[inline]
    pub fn fingerprint(&self, row: usize) -> &[u8] {
        assert!(row < self.len(), "row {} out of range for arena of {}", row, self.len());
        let offset = self.storage.start_padding + (self.start + row) * self.storage_size;
        &self.storage.bytes[offset..offset + self.storage_size]
    }

    /// Checked variant of [`Self::fingerprint`].
    pub fn get(&self, row: usize) -> Result<&[u8]> {
        if row >= self.len() {
            return Err(FpSimError::IndexOutOfRange {
                index: row as isize,
                len: self.len(),
            });
        }
        Ok(self.fingerprint(row))
    }

    /// Popcount of row `row`.
    pub fn popcount(&self, row: usize) -> u32 {
        popcount(self.fingerprint(row))
    }

    /// Ids of the rows in this view, positionally aligned with the rows.
    pub fn ids(&self) -> Option<&[String]> {
        self.ids.as_ref().map(|ids| &ids[self.start..self.end])
    }

    /// Id of row `row`, if the arena carries ids.
    pub fn id(&self, row: usize) -> Option<&str> {
        self.ids().and_then(|ids| ids.get(row)).map(String::as_str)
    }

    /// Popcount index, present only for popcount-ordered arenas viewed whole.
    pub fn popcount_index(&self) -> Option<&PopcountIndex> {
        self.popcount_index.as_deref()
    }

    /// Iterate `(id, fingerprint)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &[u8])> + '_ {
        (0..self.len()).map(move |row| (self.id(row), self.fingerprint(row)))
    }

    /// Zero-copy view of rows `range` (relative to this view).
    ///
    /// The popcount index survives only if the view still spans every row.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(FpSimError::IndexOutOfRange {
                index: range.end.max(range.start) as isize,
                len: self.len(),
            });
        }
        let start = self.start + range.start;
        let end = self.start + range.end;
        let whole = start == 0 && end == self.storage.num_rows;

        Ok(Self {
            storage: Arc::clone(&self.storage),
            num_bits: self.num_bits,
            storage_size: self.storage_size,
            alignment: self.alignment,
            start,
            end,
            ids: self.ids.clone(),
            popcount_index: if whole {
                self.popcount_index.clone()
            } else {
                None
            },
        })
    }

    /// Copy of this view with one fingerprint per row, as an owned `Vec`.
    pub fn to_vecs(&self) -> Vec<Vec<u8>> {
        (0..self.len()).map(|row| self.fingerprint(row).to_vec()).collect()
    }
}

fn check_ids(ids: Option<&[String]>, num_rows: usize) -> Result<()> {
    match ids {
        Some(ids) if ids.len() != num_rows => Err(FpSimError::InvalidLayout(format!(
            "{} ids given for {} fingerprints",
            ids.len(),
            num_rows
        ))),
        _ => Ok(()),
    }
}

/// Collects fingerprints from a producer and lays them out as an arena.
#[derive(Debug)]
pub struct ArenaBuilder {
    num_bits: usize,
    options: ArenaOptions,
    fingerprints: Vec<Vec<u8>>,
    ids: Vec<String>,
}

impl ArenaBuilder {
    /// Start an arena of `num_bits`-bit fingerprints with default options.
    pub fn new(num_bits: usize) -> Self {
        Self::with_options(num_bits, ArenaOptions::default())
    }

    /// Start an arena with explicit options.
    pub fn with_options(num_bits: usize, options: ArenaOptions) -> Self {
        Self {
            num_bits,
            options,
            fingerprints: Vec::new(),
            ids: Vec::new(),
        }
    }

    /// Number of fingerprints added so far
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// True if nothing was added yet
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    fn check_fingerprint(&self, fp: &[u8]) -> Result<()> {
        let min_bytes = (self.num_bits + 7) / 8;
        let storage_size = storage_size_for(self.num_bits, self.options.alignment);
        if fp.len() < min_bytes || fp.len() > storage_size {
            return Err(FpSimError::bytes(fp.len(), min_bytes));
        }
        if !padding_is_zero(fp, self.num_bits) {
            return Err(FpSimError::InvalidLayout(format!(
                "fingerprint {} has bits set past bit {}",
                self.fingerprints.len(),
                self.num_bits
            )));
        }
        Ok(())
    }

    /// Add an anonymous fingerprint.
    pub fn add(&mut self, fp: &[u8]) -> Result<()> {
        self.check_fingerprint(fp)?;
        if !self.ids.is_empty() {
            return Err(FpSimError::InvalidLayout(
                "cannot mix fingerprints with and without ids".to_string(),
            ));
        }
        self.fingerprints.push(fp.to_vec());
        Ok(())
    }

    /// Add a fingerprint with its id.
    pub fn add_with_id(&mut self, id: impl Into<String>, fp: &[u8]) -> Result<()> {
        self.check_fingerprint(fp)?;
        if self.ids.len() != self.fingerprints.len() {
            return Err(FpSimError::InvalidLayout(
                "cannot mix fingerprints with and without ids".to_string(),
            ));
        }
        self.fingerprints.push(fp.to_vec());
        self.ids.push(id.into());
        Ok(())
    }

    /// Lay out the collected fingerprints.
    pub fn build(self) -> Result<FingerprintArena> {
        self.options.validate()?;
        let alignment = self.options.alignment;
        let storage_size = storage_size_for(self.num_bits, alignment);
        check_row_width(self.num_bits, storage_size, alignment)?;

        let num_rows = self.fingerprints.len();
        let payload = num_rows
            .checked_mul(storage_size)
            .ok_or_else(|| FpSimError::InvalidLayout("arena size overflow".to_string()))?;

        let mut order: Vec<usize> = (0..num_rows).collect();
        let popcounts: Vec<u32> = self.fingerprints.iter().map(|fp| popcount(fp)).collect();
        if self.options.reorder_by_popcount {
            // Stable, so equal popcounts keep insertion order.
            order.sort_by_key(|&row| popcounts[row]);
        }

        let (mut bytes, start_padding) = zeroed_aligned(payload, alignment)?;
        for (dest, &src) in order.iter().enumerate() {
            let fp = &self.fingerprints[src];
            let offset = start_padding + dest * storage_size;
            bytes[offset..offset + fp.len()].copy_from_slice(fp);
        }

        let ids = if self.ids.is_empty() {
            None
        } else {
            let mut ids = self.ids;
            let reordered: Vec<String> = order.iter().map(|&src| std::mem::take(&mut ids[src])).collect();
            Some(Arc::new(reordered))
        };

        let popcount_index = if self.options.build_popcount_index {
            let sorted: Vec<u32> = order.iter().map(|&src| popcounts[src]).collect();
            Some(Arc::new(PopcountIndex::from_sorted_popcounts(&sorted, self.num_bits)))
        } else {
            None
        };

        tracing::debug!(
            "Built arena with {} rows of {} bits (reordered: {}, indexed: {})",
            num_rows,
            self.num_bits,
            self.options.reorder_by_popcount,
            popcount_index.is_some()
        );

        Ok(FingerprintArena {
            storage: Arc::new(Storage {
                bytes,
                start_padding,
                num_rows,
            }),
            num_bits: self.num_bits,
            storage_size,
            alignment,
            start: 0,
            end: num_rows,
            ids,
            popcount_index,
        })
    }
}

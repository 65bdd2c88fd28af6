//! Per-query search results
//!
//! [`SearchResults`] holds one sparse row of `(target index, score)` hits
//! per query. Target ids are borrowed from the target arena, so the arena
//! must outlive any id lookup; the borrow checker enforces that.
//!
//! [`SearchResult`] is a read-only view of a single row. It stores the row
//! number and a shared borrow of its container, never a pointer of its own.

use std::fmt;
use std::str::FromStr;

use crate::error::{FpSimError, Result};

/// One match: a target row and its Tanimoto score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Row of the target arena
    pub index: usize,
    /// Tanimoto score in `[0.0, 1.0]`
    pub score: f64,
}

impl Hit {
    /// Create a hit
    pub fn new(index: usize, score: f64) -> Self {
        Self { index, score }
    }
}

/// Sort orders accepted by [`SearchResults::reorder`].
///
/// All orders are stable: hits comparing equal keep their relative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrdering {
    /// Highest score first
    #[default]
    DecreasingScore,
    /// Lowest score first
    IncreasingScore,
    /// Lowest target index first
    IncreasingIndex,
    /// Highest target index first
    DecreasingIndex,
}

impl ResultOrdering {
    /// Canonical name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            ResultOrdering::DecreasingScore => "decreasing-score",
            ResultOrdering::IncreasingScore => "increasing-score",
            ResultOrdering::IncreasingIndex => "increasing-index",
            ResultOrdering::DecreasingIndex => "decreasing-index",
        }
    }

    fn sort(&self, hits: &mut [Hit]) {
        match self {
            ResultOrdering::DecreasingScore => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
            ResultOrdering::IncreasingScore => hits.sort_by(|a, b| a.score.total_cmp(&b.score)),
            ResultOrdering::IncreasingIndex => hits.sort_by_key(|hit| hit.index),
            ResultOrdering::DecreasingIndex => hits.sort_by(|a, b| b.index.cmp(&a.index)),
        }
    }
}

impl FromStr for ResultOrdering {
    type Err = FpSimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "decreasing-score" => Ok(ResultOrdering::DecreasingScore),
            "increasing-score" => Ok(ResultOrdering::IncreasingScore),
            "increasing-index" => Ok(ResultOrdering::IncreasingIndex),
            "decreasing-index" => Ok(ResultOrdering::DecreasingIndex),
            other => Err(FpSimError::InvalidArgument(format!(
                "unknown ordering {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for ResultOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sparse result rows, one per query.
#[derive(Debug, Clone, Default)]
pub struct SearchResults<'a> {
    rows: Vec<Vec<Hit>>,
    target_ids: Option<&'a [String]>,
}

impl<'a> SearchResults<'a> {
    /// Allocate `num_rows` empty rows, optionally resolving hits through `target_ids`.
    pub fn new(num_rows: usize, target_ids: Option<&'a [String]>) -> Self {
        Self {
            rows: vec![Vec::new(); num_rows],
            target_ids,
        }
    }

    /// Number of rows (queries)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Target ids used to resolve hit indices
    pub fn target_ids(&self) -> Option<&'a [String]> {
        self.target_ids
    }

    /// Total number of hits across all rows
    pub fn total_hits(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    fn resolve(&self, index: isize) -> Result<usize> {
        let len = self.rows.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|&i| i < len)
        };
        resolved.ok_or(FpSimError::IndexOutOfRange { index, len })
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows.len() {
            return Err(FpSimError::IndexOutOfRange {
                index: row as isize,
                len: self.rows.len(),
            });
        }
        Ok(())
    }

    /// Row `index`; negative indices count from the end.
    pub fn get(&self, index: isize) -> Result<SearchResult<'_, 'a>> {
        let row = self.resolve(index)?;
        Ok(SearchResult { results: self, row })
    }

    /// Iterate over all rows.
    pub fn iter(&self) -> impl Iterator<Item = SearchResult<'_, 'a>> + '_ {
        (0..self.rows.len()).map(move |row| SearchResult { results: self, row })
    }

    /// Hit indices of every row.
    pub fn iter_indices(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        self.rows
            .iter()
            .map(|hits| hits.iter().map(|hit| hit.index).collect())
    }

    /// Hit scores of every row.
    pub fn iter_scores(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.rows
            .iter()
            .map(|hits| hits.iter().map(|hit| hit.score).collect())
    }

    /// `(index, score)` pairs of every row.
    pub fn iter_indices_and_scores(&self) -> impl Iterator<Item = Vec<(usize, f64)>> + '_ {
        self.rows
            .iter()
            .map(|hits| hits.iter().map(|hit| (hit.index, hit.score)).collect())
    }

    /// Attached ids, after checking that every stored hit names one of them.
    fn checked_ids(&self) -> Result<&'a [String]> {
        let ids = self.target_ids.ok_or(FpSimError::IdsUnavailable)?;
        check_hits(self.rows.iter().flatten(), ids.len())?;
        Ok(ids)
    }

    /// Hit ids of every row.
    ///
    /// Fails if no target ids are attached or a hit points past them.
    pub fn iter_ids(&self) -> Result<impl Iterator<Item = Vec<&'a str>> + '_> {
        let ids = self.checked_ids()?;
        Ok(self
            .rows
            .iter()
            .map(move |hits| hits.iter().map(|hit| ids[hit.index].as_str()).collect()))
    }

    /// `(id, score)` pairs of every row.
    ///
    /// Fails if no target ids are attached or a hit points past them.
    pub fn iter_ids_and_scores(&self) -> Result<impl Iterator<Item = Vec<(&'a str, f64)>> + '_> {
        let ids = self.checked_ids()?;
        Ok(self.rows.iter().map(move |hits| {
            hits.iter()
                .map(|hit| (ids[hit.index].as_str(), hit.score))
                .collect()
        }))
    }

    /// Remove every hit of `row`, keeping the row itself.
    pub fn clear(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        self.rows[row].clear();
        Ok(())
    }

    /// Remove every hit of every row.
    pub fn clear_all(&mut self) {
        self.rows.iter_mut().for_each(Vec::clear);
    }

    /// Sort the hits of `row` in place.
    pub fn reorder(&mut self, row: usize, ordering: ResultOrdering) -> Result<()> {
        self.check_row(row)?;
        ordering.sort(&mut self.rows[row]);
        Ok(())
    }

    /// Sort the hits of every row in place.
    pub fn reorder_all(&mut self, ordering: ResultOrdering) {
        for hits in &mut self.rows {
            ordering.sort(hits);
        }
    }

    /// Append the hits of a container computed over a disjoint region.
    ///
    /// Both containers must have the same number of rows. Hits of row `i` in
    /// `other` are appended to row `i` here. When ids are attached, every
    /// incoming hit must name one of them; nothing is merged otherwise.
    pub fn merge(&mut self, other: SearchResults<'_>) -> Result<()> {
        if other.len() != self.len() {
            return Err(FpSimError::InvalidArgument(format!(
                "cannot merge {} rows into {} rows",
                other.len(),
                self.len()
            )));
        }
        if let Some(ids) = self.target_ids {
            check_hits(other.rows.iter().flatten(), ids.len())?;
        }
        for (mine, theirs) in self.rows.iter_mut().zip(other.rows) {
            if mine.is_empty() {
                *mine = theirs;
            } else {
                mine.extend(theirs);
            }
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn push(&mut self, row: usize, index: usize, score: f64) {
        self.rows[row].push(Hit { index, score });
    }

    pub(crate) fn row_hits(&self, row: usize) -> &[Hit] {
        &self.rows[row]
    }

    pub(crate) fn row_hits_mut(&mut self, row: usize) -> &mut Vec<Hit> {
        &mut self.rows[row]
    }

    /// Container over already assembled rows.
    pub(crate) fn from_rows(rows: Vec<Vec<Hit>>, target_ids: Option<&'a [String]>) -> Self {
        Self { rows, target_ids }
    }
}

fn check_hits<'h>(hits: impl IntoIterator<Item = &'h Hit>, len: usize) -> Result<()> {
    match hits.into_iter().find(|hit| hit.index >= len) {
        Some(hit) => Err(FpSimError::IndexOutOfRange {
            index: hit.index as isize,
            len,
        }),
        None => Ok(()),
    }
}

impl<'r, 'a> IntoIterator for &'r SearchResults<'a> {
    type Item = SearchResult<'r, 'a>;
    type IntoIter = Box<dyn Iterator<Item = SearchResult<'r, 'a>> + 'r>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Read-only view of one result row.
#[derive(Debug, Clone, Copy)]
pub struct SearchResult<'r, 'a> {
    results: &'r SearchResults<'a>,
    row: usize,
}

impl<'r, 'a> SearchResult<'r, 'a> {
    /// Row number in the parent container
    pub fn row(&self) -> usize {
        self.row
    }

    /// Number of hits
    pub fn len(&self) -> usize {
        self.hits().len()
    }

    /// True if the row has no hits
    pub fn is_empty(&self) -> bool {
        self.hits().is_empty()
    }

    /// Hits in stored order
    pub fn hits(&self) -> &'r [Hit] {
        self.results.row_hits(self.row)
    }

    /// `(index, score)` pairs in stored order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'r {
        self.hits().iter().map(|hit| (hit.index, hit.score))
    }

    /// Target indices in stored order
    pub fn get_indices(&self) -> Vec<usize> {
        self.hits().iter().map(|hit| hit.index).collect()
    }

    /// Scores in stored order
    pub fn get_scores(&self) -> Vec<f64> {
        self.hits().iter().map(|hit| hit.score).collect()
    }

    /// `(index, score)` pairs in stored order
    pub fn get_indices_and_scores(&self) -> Vec<(usize, f64)> {
        self.iter().collect()
    }

    /// Target ids in stored order, or `None` when no ids are attached or a
    /// hit points past them.
    pub fn get_ids(&self) -> Option<Vec<&'a str>> {
        let ids = self.results.target_ids?;
        self.hits()
            .iter()
            .map(|hit| ids.get(hit.index).map(String::as_str))
            .collect()
    }

    /// `(id, score)` pairs in stored order.
    ///
    /// Unlike [`Self::get_ids`] this fails with [`FpSimError::IdsUnavailable`]
    /// when no ids are attached, and with [`FpSimError::IndexOutOfRange`]
    /// when a hit points past them.
    pub fn get_ids_and_scores(&self) -> Result<Vec<(&'a str, f64)>> {
        let ids = self.results.target_ids.ok_or(FpSimError::IdsUnavailable)?;
        self.hits()
            .iter()
            .map(|hit| {
                ids.get(hit.index)
                    .map(|id| (id.as_str(), hit.score))
                    .ok_or(FpSimError::IndexOutOfRange {
                        index: hit.index as isize,
                        len: ids.len(),
                    })
            })
            .collect()
    }

    /// Id of this row's own query in a symmetric search (target row `row`).
    pub fn target_id(&self) -> Option<&'a str> {
        self.results
            .target_ids
            .and_then(|ids| ids.get(self.row))
            .map(String::as_str)
    }
}

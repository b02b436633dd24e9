//! FILENAME: cube-engine/src/result.rs
//! Cube Result - the flat row set and its memoized lookups.
//!
//! Rows are read-only once the enumerator hands them over. Marginal maps
//! (one per dimension) and the grand total are derived from the rows on
//! first access and cached in `OnceLock`s, so concurrent readers compute
//! each of them at most once.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use log::trace;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::definition::{GroupKey, SpecifiedDimensions};
use crate::error::CubeError;
use crate::keys::{CubeKeys, DynamicKeys, Marginal};

// ============================================================================
// CUBE ROW
// ============================================================================

/// One aggregated row: the keys of its group, which dimensions are
/// specified, and the aggregate over the group's records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CubeRow<D, A> {
    keys: D,
    specified: SpecifiedDimensions,
    aggregate: A,
}

impl<D, A> CubeRow<D, A> {
    pub(crate) fn new(keys: D, specified: SpecifiedDimensions, aggregate: A) -> Self {
        CubeRow {
            keys,
            specified,
            aggregate,
        }
    }

    pub fn keys(&self) -> &D {
        &self.keys
    }

    pub fn specified(&self) -> SpecifiedDimensions {
        self.specified
    }

    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    /// Key of dimension `I` (1-based); `None` when rolled up.
    pub fn key<const I: usize>(&self) -> Option<&GroupKey<<D as Marginal<I>>::Key>>
    where
        D: Marginal<I>,
    {
        <D as Marginal<I>>::key(&self.keys)
    }

    pub fn into_parts(self) -> (D, SpecifiedDimensions, A) {
        (self.keys, self.specified, self.aggregate)
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Figures collected while the cube was built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CubeStats {
    pub dimensions: usize,
    pub subsets: usize,
    pub rows: usize,
    pub build_time_ms: u64,
}

// ============================================================================
// CUBE RESULT
// ============================================================================

/// Every row of a cube plus memoized per-dimension marginals and grand total.
pub struct CubeResult<D: CubeKeys, A> {
    rows: Vec<CubeRow<D, A>>,
    stats: CubeStats,
    marginals: D::Marginals<A>,
    /// Index of the fully rolled-up row, if any.
    grand_total: OnceLock<Option<usize>>,
    lazy_computations: AtomicUsize,
}

impl<D: CubeKeys, A> CubeResult<D, A> {
    pub(crate) fn from_rows(rows: Vec<CubeRow<D, A>>, stats: CubeStats) -> Self {
        CubeResult {
            rows,
            stats,
            marginals: Default::default(),
            grand_total: OnceLock::new(),
            lazy_computations: AtomicUsize::new(0),
        }
    }

    /// All rows, in the order the subsets were merged.
    pub fn all_rows(&self) -> &[CubeRow<D, A>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CubeRow<D, A>> {
        self.rows
    }

    /// Rows grouped on exactly the `specified` dimensions.
    pub fn rows_for(
        &self,
        specified: SpecifiedDimensions,
    ) -> impl Iterator<Item = &CubeRow<D, A>> + '_ {
        self.rows.iter().filter(move |r| r.specified == specified)
    }

    /// Distinct subset tags present among the rows, ascending.
    pub fn subsets(&self) -> Vec<SpecifiedDimensions> {
        let mut masks: Vec<SpecifiedDimensions> = self.rows.iter().map(|r| r.specified).collect();
        masks.sort_unstable();
        masks.dedup();
        masks
    }

    pub fn dimensions(&self) -> usize {
        self.stats.dimensions
    }

    pub fn stats(&self) -> &CubeStats {
        &self.stats
    }

    /// How many memoized values have been computed so far.
    pub fn lazy_computations(&self) -> usize {
        self.lazy_computations.load(Ordering::SeqCst)
    }

    /// Aggregate of the row where every dimension is rolled up.
    pub fn grand_total(&self) -> Result<&A, CubeError> {
        let index = self.grand_total.get_or_init(|| {
            self.lazy_computations.fetch_add(1, Ordering::SeqCst);
            trace!("Computing grand total over {} rows", self.rows.len());
            self.rows.iter().position(|r| r.specified.is_empty())
        });

        index
            .map(|i| &self.rows[i].aggregate)
            .ok_or(CubeError::MissingGrandTotalRow)
    }

    /// Value -> aggregate for rows where only `specified` is grouped on.
    fn collect_marginal<K, F>(&self, specified: SpecifiedDimensions, key: F) -> FxHashMap<K, A>
    where
        K: Clone + Eq + Hash,
        A: Clone,
        F: Fn(&D) -> Option<&GroupKey<K>>,
    {
        self.lazy_computations.fetch_add(1, Ordering::SeqCst);
        let map: FxHashMap<K, A> = self
            .rows
            .iter()
            .filter(|r| r.specified == specified)
            .filter_map(|r| key(&r.keys).map(|k| (k.value().clone(), r.aggregate.clone())))
            .collect();
        trace!("Computed marginal for {}: {} values", specified, map.len());
        map
    }

    /// Marginal of dimension `I` (1-based): each distinct value of that
    /// dimension mapped to its aggregate with every other dimension rolled up.
    pub fn dimension<const I: usize>(&self) -> &FxHashMap<<D as Marginal<I>>::Key, A>
    where
        D: Marginal<I>,
        A: Clone,
    {
        <D as Marginal<I>>::slot(&self.marginals).get_or_init(|| {
            self.collect_marginal(SpecifiedDimensions::single(I), <D as Marginal<I>>::key)
        })
    }
}

impl<K, A> CubeResult<DynamicKeys<K>, A>
where
    K: Clone + Eq + Hash + Send + Sync,
    A: Clone,
{
    /// Marginal of `dimension` (1-based) for cubes built from a runtime
    /// selector list.
    pub fn dimension_at(&self, dimension: usize) -> Result<&FxHashMap<K, A>, CubeError> {
        if dimension == 0 || dimension > self.stats.dimensions {
            return Err(CubeError::InvalidDimension {
                index: dimension,
                dimensions: self.stats.dimensions,
            });
        }

        let slot = &self.marginals[dimension - 1];
        Ok(slot.get_or_init(|| {
            self.collect_marginal(SpecifiedDimensions::single(dimension), |keys| {
                keys.get(dimension)
            })
        }))
    }
}

impl<D, A> fmt::Debug for CubeResult<D, A>
where
    D: CubeKeys + fmt::Debug,
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeResult")
            .field("stats", &self.stats)
            .field("rows", &self.rows)
            .finish()
    }
}

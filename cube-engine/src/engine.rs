//! FILENAME: cube-engine/src/engine.rs
//! Cube Enumerator - fans a request out over every dimension subset.
//!
//! Algorithm:
//! 1. Enumerate the 2^N subsets as the integers 0..2^N (bit i = dimension i+1)
//! 2. For each subset, partition the source by the projected key tuple
//!    (the empty subset is one group holding every record, even none)
//! 3. Aggregate each group and tag the row with the subset mask
//! 4. Concatenate the per-subset rows once every subset has succeeded

use std::convert::Infallible;
use std::hash::Hash;
use std::time::Instant;

use log::{debug, trace};
use rayon::prelude::*;

use crate::definition::{CubeOptions, EvaluationMode, GroupKey, SpecifiedDimensions, MAX_DIMENSIONS};
use crate::error::{BoxError, CubeError};
use crate::keys::{Dimensions, DynamicKeys};
use crate::result::{CubeResult, CubeRow, CubeStats};
use crate::source::CubeSource;

/// Result of a one-dimensional cube.
pub type Cube1<K1, A> = CubeResult<(Option<GroupKey<K1>>,), A>;
/// Result of a two-dimensional cube.
pub type Cube2<K1, K2, A> = CubeResult<(Option<GroupKey<K1>>, Option<GroupKey<K2>>), A>;
/// Result of a three-dimensional cube.
pub type Cube3<K1, K2, K3, A> =
    CubeResult<(Option<GroupKey<K1>>, Option<GroupKey<K2>>, Option<GroupKey<K3>>), A>;
/// Result of a four-dimensional cube.
pub type Cube4<K1, K2, K3, K4, A> = CubeResult<
    (
        Option<GroupKey<K1>>,
        Option<GroupKey<K2>>,
        Option<GroupKey<K3>>,
        Option<GroupKey<K4>>,
    ),
    A,
>;
/// Result of a cube over a runtime list of same-typed selectors.
pub type DynamicCube<K, A> = CubeResult<DynamicKeys<K>, A>;

// ============================================================================
// CUBE CALCULATOR
// ============================================================================

/// Runs one cube request against a source.
struct CubeCalculator<'a, S: ?Sized, D: ?Sized, F> {
    source: &'a S,
    dimensions: &'a D,
    aggregate: &'a F,
    options: &'a CubeOptions,
}

impl<'a, S, D, F, A, E> CubeCalculator<'a, S, D, F>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    D: Dimensions<S::Record> + Sync + ?Sized,
    F: Fn(&[&S::Record]) -> Result<A, E> + Sync,
    A: Send,
    E: Into<BoxError>,
{
    fn label(&self) -> &str {
        self.options.label.as_deref().unwrap_or("cube")
    }

    /// Executes every subset and assembles the result.
    fn calculate(&self) -> Result<CubeResult<D::Keys, A>, CubeError> {
        let count = self.dimensions.count();
        if count == 0 || count > MAX_DIMENSIONS {
            return Err(CubeError::InvalidArity { requested: count });
        }

        let started = Instant::now();
        let subsets: Vec<SpecifiedDimensions> = SpecifiedDimensions::subsets(count).collect();
        debug!(
            "{}: computing {} subsets over {} dimensions ({:?})",
            self.label(),
            subsets.len(),
            count,
            self.options.mode
        );

        let per_subset: Vec<Vec<CubeRow<D::Keys, A>>> = match self.options.mode {
            EvaluationMode::Sequential => subsets
                .iter()
                .map(|&specified| self.compute_subset(specified))
                .collect::<Result<_, _>>()?,
            EvaluationMode::Parallel => subsets
                .par_iter()
                .map(|&specified| self.compute_subset(specified))
                .collect::<Result<_, _>>()?,
        };

        let rows: Vec<CubeRow<D::Keys, A>> = per_subset.into_iter().flatten().collect();
        let stats = CubeStats {
            dimensions: count,
            subsets: subsets.len(),
            rows: rows.len(),
            build_time_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            "{}: built {} rows in {} ms",
            self.label(),
            stats.rows,
            stats.build_time_ms
        );

        Ok(CubeResult::from_rows(rows, stats))
    }

    /// Groups the source on `specified` and aggregates each group.
    fn compute_subset(
        &self,
        specified: SpecifiedDimensions,
    ) -> Result<Vec<CubeRow<D::Keys, A>>, CubeError> {
        let groups = if specified.is_empty() {
            let records = self.source.single_group()?;
            vec![(self.dimensions.rolled_up(), records)]
        } else {
            self.source
                .partition(|record| self.dimensions.project(record, specified))?
                .into_iter()
                .map(|group| (group.key, group.records))
                .collect()
        };
        trace!("{}: subset {} has {} groups", self.label(), specified, groups.len());

        groups
            .into_iter()
            .map(|(keys, records)| {
                let aggregate =
                    (self.aggregate)(records.as_slice()).map_err(|e| CubeError::Aggregate {
                        dimensions: specified,
                        source: e.into(),
                    })?;
                Ok(CubeRow::new(keys, specified, aggregate))
            })
            .collect()
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Computes a cube with a fallible aggregate and explicit options.
///
/// The first failing subset aborts the whole computation; no partial
/// cube is returned.
pub fn try_cube_with<S, D, F, A, E>(
    source: &S,
    dimensions: &D,
    aggregate: F,
    options: &CubeOptions,
) -> Result<CubeResult<D::Keys, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    D: Dimensions<S::Record> + Sync + ?Sized,
    F: Fn(&[&S::Record]) -> Result<A, E> + Sync,
    A: Send,
    E: Into<BoxError>,
{
    let calculator = CubeCalculator {
        source,
        dimensions,
        aggregate: &aggregate,
        options,
    };
    calculator.calculate()
}

/// Computes a cube with a fallible aggregate.
pub fn try_cube<S, D, F, A, E>(
    source: &S,
    dimensions: D,
    aggregate: F,
) -> Result<CubeResult<D::Keys, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    D: Dimensions<S::Record> + Sync,
    F: Fn(&[&S::Record]) -> Result<A, E> + Sync,
    A: Send,
    E: Into<BoxError>,
{
    try_cube_with(source, &dimensions, aggregate, &CubeOptions::default())
}

/// Computes a cube with explicit options.
pub fn cube_with<S, D, F, A>(
    source: &S,
    dimensions: &D,
    aggregate: F,
    options: &CubeOptions,
) -> Result<CubeResult<D::Keys, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    D: Dimensions<S::Record> + Sync + ?Sized,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    try_cube_with(
        source,
        dimensions,
        |records: &[&S::Record]| Ok::<A, Infallible>(aggregate(records)),
        options,
    )
}

/// Computes a cube over a tuple of 1 to 4 key selectors.
///
/// ```
/// use cube_engine::cube;
///
/// let sales: Vec<(&'static str, i32)> = vec![("E", 10), ("E", 5), ("W", 7)];
/// let result = cube(
///     &sales,
///     (|s: &(&'static str, i32)| s.0,),
///     |group: &[&(&'static str, i32)]| group.iter().map(|s| s.1).sum::<i32>(),
/// )
/// .unwrap();
/// assert_eq!(result.dimension::<1>()["E"], 15);
/// assert_eq!(*result.grand_total().unwrap(), 22);
/// ```
pub fn cube<S, D, F, A>(
    source: &S,
    dimensions: D,
    aggregate: F,
) -> Result<CubeResult<D::Keys, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    D: Dimensions<S::Record> + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube_with(source, &dimensions, aggregate, &CubeOptions::default())
}

/// One-dimensional cube.
pub fn cube1<S, F1, K1, F, A>(
    source: &S,
    group1: F1,
    aggregate: F,
) -> Result<Cube1<K1, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    F1: Fn(&S::Record) -> K1 + Sync,
    K1: Clone + Eq + Hash + Send + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube(source, (group1,), aggregate)
}

/// Two-dimensional cube.
pub fn cube2<S, F1, F2, K1, K2, F, A>(
    source: &S,
    group1: F1,
    group2: F2,
    aggregate: F,
) -> Result<Cube2<K1, K2, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    F1: Fn(&S::Record) -> K1 + Sync,
    F2: Fn(&S::Record) -> K2 + Sync,
    K1: Clone + Eq + Hash + Send + Sync,
    K2: Clone + Eq + Hash + Send + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube(source, (group1, group2), aggregate)
}

/// Three-dimensional cube.
pub fn cube3<S, F1, F2, F3, K1, K2, K3, F, A>(
    source: &S,
    group1: F1,
    group2: F2,
    group3: F3,
    aggregate: F,
) -> Result<Cube3<K1, K2, K3, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    F1: Fn(&S::Record) -> K1 + Sync,
    F2: Fn(&S::Record) -> K2 + Sync,
    F3: Fn(&S::Record) -> K3 + Sync,
    K1: Clone + Eq + Hash + Send + Sync,
    K2: Clone + Eq + Hash + Send + Sync,
    K3: Clone + Eq + Hash + Send + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube(source, (group1, group2, group3), aggregate)
}

/// Four-dimensional cube.
pub fn cube4<S, F1, F2, F3, F4, K1, K2, K3, K4, F, A>(
    source: &S,
    group1: F1,
    group2: F2,
    group3: F3,
    group4: F4,
    aggregate: F,
) -> Result<Cube4<K1, K2, K3, K4, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    F1: Fn(&S::Record) -> K1 + Sync,
    F2: Fn(&S::Record) -> K2 + Sync,
    F3: Fn(&S::Record) -> K3 + Sync,
    F4: Fn(&S::Record) -> K4 + Sync,
    K1: Clone + Eq + Hash + Send + Sync,
    K2: Clone + Eq + Hash + Send + Sync,
    K3: Clone + Eq + Hash + Send + Sync,
    K4: Clone + Eq + Hash + Send + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube(source, (group1, group2, group3, group4), aggregate)
}

/// Cube over a runtime list of selectors sharing one key type.
///
/// Fails with `InvalidArity` unless the list holds 1 to 4 selectors.
pub fn cube_dyn<S, G, K, F, A>(
    source: &S,
    selectors: &[G],
    aggregate: F,
    options: &CubeOptions,
) -> Result<DynamicCube<K, A>, CubeError>
where
    S: CubeSource + Sync + ?Sized,
    S::Record: Sync,
    G: Fn(&S::Record) -> K + Sync,
    K: Clone + Eq + Hash + Send + Sync,
    F: Fn(&[&S::Record]) -> A + Sync,
    A: Send,
{
    cube_with(source, selectors, aggregate, options)
}

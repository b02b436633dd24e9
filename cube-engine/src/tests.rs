//! FILENAME: cube-engine/src/tests.rs
//! PURPOSE: End-to-end cube scenarios across the enumerator and result layers.

use std::fmt;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::aggregate::{measure, AggregationType};
use crate::definition::{CubeOptions, GroupKey, SpecifiedDimensions};
use crate::engine::{cube, cube1, cube2, cube3, cube4, cube_dyn, cube_with, try_cube_with};
use crate::error::CubeError;
use crate::keys::{CubeKeys, OrderedFloat};
use crate::result::CubeResult;
use crate::source::{CubeSource, Group};

#[derive(Debug, Clone)]
struct Sale {
    region: String,
    category: String,
    channel: &'static str,
    year: u16,
    amount: i64,
}

fn sale(region: &str, category: &str, amount: i64) -> Sale {
    Sale {
        region: region.to_string(),
        category: category.to_string(),
        channel: "web",
        year: 2024,
        amount,
    }
}

fn sum_amount(group: &[&Sale]) -> i64 {
    group.iter().map(|s| s.amount).sum()
}

fn three_sales() -> Vec<Sale> {
    vec![sale("E", "A", 10), sale("E", "B", 5), sale("W", "A", 7)]
}

fn many_sales() -> Vec<Sale> {
    let regions = ["N", "S", "E", "W"];
    let categories = ["A", "B", "C"];
    let channels = ["web", "store"];
    (0..60)
        .map(|i| Sale {
            region: regions[i % 4].to_string(),
            category: categories[i % 3].to_string(),
            channel: channels[(i / 5) % 2],
            year: 2020 + (i % 5) as u16,
            amount: (i as i64 * 7) % 23,
        })
        .collect()
}

/// Reference grouping of the source by one selector.
fn group_by_one<K: Eq + Hash>(sales: &[Sale], key: impl Fn(&Sale) -> K) -> FxHashMap<K, i64> {
    let mut map: FxHashMap<K, i64> = FxHashMap::default();
    for s in sales {
        *map.entry(key(s)).or_insert(0) += s.amount;
    }
    map
}

/// Aggregates keyed by subset tag and key tuple, independent of row order.
fn rows_by_key<D: CubeKeys, A: Clone>(
    result: &CubeResult<D, A>,
) -> FxHashMap<(SpecifiedDimensions, D), A> {
    result
        .all_rows()
        .iter()
        .map(|row| ((row.specified(), row.keys().clone()), row.aggregate().clone()))
        .collect()
}

// ========================================
// CONCRETE SCENARIOS
// ========================================

#[test]
fn test_two_dimension_region_category() {
    let sales = three_sales();
    let result = cube2(
        &sales,
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.category.clone(),
        sum_amount,
    )
    .unwrap();

    let regions = result.dimension::<1>();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions["E"], 15);
    assert_eq!(regions["W"], 7);

    let categories = result.dimension::<2>();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories["A"], 17);
    assert_eq!(categories["B"], 5);

    assert_eq!(*result.grand_total().unwrap(), 22);

    assert_eq!(result.subsets().len(), 4);
    assert_eq!(result.rows_for(SpecifiedDimensions::all(2)).count(), 3);
    assert_eq!(result.all_rows().len(), 1 + 2 + 2 + 3);
}

#[test]
fn test_empty_source_count() {
    let sales: Vec<Sale> = Vec::new();
    let result = cube1(&sales, |s: &Sale| s.region.clone(), |g: &[&Sale]| g.len()).unwrap();

    assert!(result.dimension::<1>().is_empty());
    assert_eq!(*result.grand_total().unwrap(), 0);
    assert_eq!(result.all_rows().len(), 1);
    assert_eq!(result.subsets(), vec![SpecifiedDimensions::NONE]);
}

#[test]
fn test_empty_source_average_is_callers_contract() {
    let sales: Vec<Sale> = Vec::new();
    let result = cube1(
        &sales,
        |s: &Sale| s.year,
        measure(AggregationType::Average, |s: &Sale| Some(s.amount as f64)),
    )
    .unwrap();
    assert!(result.grand_total().unwrap().is_nan());
}

// ========================================
// POWER SET & ROW COUNTS
// ========================================

#[test]
fn test_power_set_completeness_four_dimensions() {
    let sales = many_sales();
    let result = cube4(
        &sales,
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.category.clone(),
        |s: &Sale| s.channel,
        |s: &Sale| s.year,
        sum_amount,
    )
    .unwrap();

    let expected: Vec<SpecifiedDimensions> = SpecifiedDimensions::subsets(4).collect();
    assert_eq!(result.subsets(), expected);
    assert_eq!(result.dimensions(), 4);
    assert_eq!(result.stats().subsets, 16);

    assert_eq!(*result.dimension::<1>(), group_by_one(&sales, |s| s.region.clone()));
    assert_eq!(*result.dimension::<2>(), group_by_one(&sales, |s| s.category.clone()));
    assert_eq!(*result.dimension::<3>(), group_by_one(&sales, |s| s.channel));
    assert_eq!(*result.dimension::<4>(), group_by_one(&sales, |s| s.year));

    for specified in SpecifiedDimensions::subsets(4) {
        let distinct: FxHashSet<(Option<String>, Option<String>, Option<&str>, Option<u16>)> =
            sales
                .iter()
                .map(|s| {
                    (
                        specified.contains(1).then(|| s.region.clone()),
                        specified.contains(2).then(|| s.category.clone()),
                        specified.contains(3).then_some(s.channel),
                        specified.contains(4).then_some(s.year),
                    )
                })
                .collect();
        assert_eq!(
            result.rows_for(specified).count(),
            distinct.len(),
            "row count for subset {}",
            specified
        );
    }
}

#[test]
fn test_row_count_matches_distinct_combinations() {
    let sales = many_sales();
    let result = cube3(
        &sales,
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.category.clone(),
        |s: &Sale| s.channel,
        sum_amount,
    )
    .unwrap();

    for specified in SpecifiedDimensions::subsets(3) {
        let distinct: FxHashSet<(Option<String>, Option<String>, Option<&str>)> = sales
            .iter()
            .map(|s| {
                (
                    specified.contains(1).then(|| s.region.clone()),
                    specified.contains(2).then(|| s.category.clone()),
                    specified.contains(3).then_some(s.channel),
                )
            })
            .collect();
        assert_eq!(
            result.rows_for(specified).count(),
            distinct.len(),
            "row count for subset {}",
            specified
        );
    }
}

#[test]
fn test_rows_carry_keys_only_for_specified_dimensions() {
    let sales = many_sales();
    let result = cube2(&sales, |s: &Sale| s.region.clone(), |s: &Sale| s.year, sum_amount).unwrap();

    for row in result.all_rows() {
        assert_eq!(row.key::<1>().is_some(), row.specified().contains(1));
        assert_eq!(row.key::<2>().is_some(), row.specified().contains(2));
    }
}

// ========================================
// MARGINALS & GRAND TOTAL
// ========================================

#[test]
fn test_marginals_match_single_dimension_grouping() {
    let sales = many_sales();
    let result = cube3(
        &sales,
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.channel,
        |s: &Sale| s.year,
        sum_amount,
    )
    .unwrap();

    assert_eq!(*result.dimension::<1>(), group_by_one(&sales, |s| s.region.clone()));
    assert_eq!(*result.dimension::<2>(), group_by_one(&sales, |s| s.channel));
    assert_eq!(*result.dimension::<3>(), group_by_one(&sales, |s| s.year));
    assert_eq!(*result.grand_total().unwrap(), sum_amount(&sales.iter().collect::<Vec<_>>()));
}

#[test]
fn test_memoization_computes_once() {
    let sales = three_sales();
    let result = cube2(
        &sales,
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.category.clone(),
        sum_amount,
    )
    .unwrap();
    assert_eq!(result.lazy_computations(), 0);

    let first = result.dimension::<1>().clone();
    let second = result.dimension::<1>().clone();
    assert_eq!(first, second);
    assert_eq!(result.lazy_computations(), 1);

    assert_eq!(result.grand_total().unwrap(), result.grand_total().unwrap());
    assert_eq!(result.lazy_computations(), 2);

    result.dimension::<2>();
    result.dimension::<2>();
    assert_eq!(result.lazy_computations(), 3);
}

#[test]
fn test_concurrent_readers_share_one_computation() {
    let sales = many_sales();
    let result = cube2(&sales, |s: &Sale| s.region.clone(), |s: &Sale| s.year, sum_amount).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                assert_eq!(result.dimension::<1>().len(), 4);
                assert_eq!(result.dimension::<2>().len(), 5);
                assert!(result.grand_total().is_ok());
            });
        }
    });

    assert_eq!(result.lazy_computations(), 3);
}

#[test]
fn test_present_default_value_is_not_rolled_up() {
    let data: Vec<(Option<&'static str>, i64)> = vec![(None, 4), (Some("x"), 6), (None, 1)];
    let result = cube1(
        &data,
        |r: &(Option<&'static str>, i64)| r.0,
        |g: &[&(Option<&'static str>, i64)]| g.iter().map(|r| r.1).sum::<i64>(),
    )
    .unwrap();

    let marginal = result.dimension::<1>();
    assert_eq!(marginal.len(), 2);
    assert_eq!(marginal[&None], 5);
    assert_eq!(marginal[&Some("x")], 6);
    assert_eq!(*result.grand_total().unwrap(), 11);

    let none_row = result
        .rows_for(SpecifiedDimensions::DIM1)
        .find(|r| r.key::<1>() == Some(&GroupKey::new(None)))
        .unwrap();
    assert_eq!(*none_row.aggregate(), 5);
}

#[test]
fn test_float_dimension() {
    let data = vec![(0.5f64, 1u32), (0.5, 2), (1.25, 3)];
    let result = cube(
        &data,
        (|r: &(f64, u32)| OrderedFloat(r.0),),
        |g: &[&(f64, u32)]| g.iter().map(|r| r.1).sum::<u32>(),
    )
    .unwrap();

    assert_eq!(result.dimension::<1>()[&OrderedFloat(0.5)], 3);
    assert_eq!(result.dimension::<1>()[&OrderedFloat(1.25)], 3);
}

// ========================================
// EVALUATION MODES
// ========================================

#[test]
fn test_parallel_matches_sequential() {
    let sales = many_sales();
    let dims = (
        |s: &Sale| s.region.clone(),
        |s: &Sale| s.category.clone(),
        |s: &Sale| s.year,
    );

    let sequential = cube_with(&sales, &dims, sum_amount, &CubeOptions::default()).unwrap();
    let parallel = cube_with(
        &sales,
        &dims,
        sum_amount,
        &CubeOptions::parallel().with_label("sales"),
    )
    .unwrap();

    assert_eq!(sequential.all_rows().len(), parallel.all_rows().len());
    assert_eq!(rows_by_key(&sequential), rows_by_key(&parallel));
    for specified in SpecifiedDimensions::subsets(3) {
        assert_eq!(
            sequential.rows_for(specified).count(),
            parallel.rows_for(specified).count(),
            "row count for subset {}",
            specified
        );
    }
    assert_eq!(sequential.dimension::<1>(), parallel.dimension::<1>());
    assert_eq!(sequential.dimension::<2>(), parallel.dimension::<2>());
    assert_eq!(sequential.dimension::<3>(), parallel.dimension::<3>());
    assert_eq!(sequential.grand_total().unwrap(), parallel.grand_total().unwrap());
}

#[test]
fn test_dynamic_selectors() {
    let sales = many_sales();
    let selectors: Vec<Box<dyn Fn(&Sale) -> String + Send + Sync>> = vec![
        Box::new(|s| s.region.clone()),
        Box::new(|s| s.category.clone()),
    ];

    let result = cube_dyn(&sales, &selectors, sum_amount, &CubeOptions::parallel()).unwrap();

    assert_eq!(result.subsets().len(), 4);
    assert_eq!(
        *result.dimension_at(1).unwrap(),
        group_by_one(&sales, |s| s.region.clone())
    );
    assert_eq!(
        *result.dimension_at(2).unwrap(),
        group_by_one(&sales, |s| s.category.clone())
    );
    assert!(matches!(
        result.dimension_at(3),
        Err(CubeError::InvalidDimension { index: 3, dimensions: 2 })
    ));
    assert!(matches!(
        result.dimension_at(0),
        Err(CubeError::InvalidDimension { index: 0, .. })
    ));
}

// ========================================
// FAILURE PROPAGATION
// ========================================

#[derive(Debug)]
struct Unreachable;

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store unreachable")
    }
}

impl std::error::Error for Unreachable {}

/// A source whose grouping pass fails once a grouped query is issued.
struct FlakyStore {
    sales: Vec<Sale>,
}

impl CubeSource for FlakyStore {
    type Record = Sale;

    fn partition<K, F>(&self, _key: F) -> Result<Vec<Group<'_, K, Sale>>, CubeError>
    where
        K: Eq + Hash,
        F: Fn(&Sale) -> K,
    {
        Err(CubeError::Source(Box::new(Unreachable)))
    }

    fn single_group(&self) -> Result<Vec<&Sale>, CubeError> {
        Ok(self.sales.iter().collect())
    }
}

#[test]
fn test_source_failure_prevents_result() {
    let store = FlakyStore { sales: three_sales() };
    for options in [CubeOptions::default(), CubeOptions::parallel()] {
        let err = cube_with(&store, &(|s: &Sale| s.year,), sum_amount, &options).unwrap_err();
        assert!(matches!(err, CubeError::Source(_)));
        assert_eq!(err.to_string(), "Source error: store unreachable");
    }
}

#[test]
fn test_aggregate_failure_on_nonempty_groups() {
    let sales = three_sales();
    let err = try_cube_with(
        &sales,
        &(|s: &Sale| s.region.clone(), |s: &Sale| s.category.clone()),
        |g: &[&Sale]| {
            if g.iter().any(|s| s.category == "B") && g.len() == 1 {
                Err(Unreachable)
            } else {
                Ok(g.len())
            }
        },
        &CubeOptions::parallel(),
    )
    .unwrap_err();

    match err {
        CubeError::Aggregate { dimensions, .. } => {
            // Only the category-only and full subsets isolate the single B sale.
            assert!(dimensions.contains(2));
        }
        other => panic!("unexpected error: {other}"),
    }
}

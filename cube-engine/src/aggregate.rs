//! FILENAME: cube-engine/src/aggregate.rs
//! Built-in aggregate functions.
//!
//! Any `Fn(&[&T]) -> A` can aggregate a cube. This module supplies the usual
//! spreadsheet set (sum, count, average, variance, ...) over a numeric
//! measure extracted from each record.

use serde::{Deserialize, Serialize};

/// Supported aggregation functions for a numeric measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregationType {
    #[default]
    Sum,
    Count,
    CountNumbers,
    Average,
    Min,
    Max,
    Product,
    StdDev,
    StdDevP,
    Var,
    VarP,
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Accumulator for computing aggregates incrementally.
/// Stores the intermediate state needed for all aggregation types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accumulator {
    pub sum: f64,
    pub count: u64,
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub product: Option<f64>,
    /// Sum of squared differences from the mean (Welford).
    pub m2: f64,
    pub mean: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator {
            sum: 0.0,
            count: 0,
            count_numbers: 0,
            min: None,
            max: None,
            product: None,
            m2: 0.0,
            mean: 0.0,
        }
    }

    /// Adds a numeric value to the accumulator.
    pub fn add_number(&mut self, value: f64) {
        self.count += 1;
        self.count_numbers += 1;
        self.sum += value;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.product = Some(self.product.map_or(value, |p| p * value));

        let delta = value - self.mean;
        self.mean += delta / (self.count_numbers as f64);
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Adds a non-numeric value (only increments count).
    pub fn add_non_number(&mut self) {
        self.count += 1;
    }

    pub fn add(&mut self, value: Option<f64>) {
        match value {
            Some(n) => self.add_number(n),
            None => self.add_non_number(),
        }
    }

    /// Computes the final aggregate value.
    /// Statistics that are undefined for the accumulated values yield NaN.
    pub fn compute(&self, aggregation: AggregationType) -> f64 {
        let n = self.count_numbers as f64;
        match aggregation {
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.count as f64,
            AggregationType::CountNumbers => n,
            AggregationType::Average => {
                if self.count_numbers > 0 {
                    self.sum / n
                } else {
                    f64::NAN
                }
            }
            AggregationType::Min => self.min.unwrap_or(f64::NAN),
            AggregationType::Max => self.max.unwrap_or(f64::NAN),
            AggregationType::Product => self.product.unwrap_or(f64::NAN),
            AggregationType::Var => {
                if self.count_numbers > 1 {
                    self.m2 / (n - 1.0)
                } else {
                    f64::NAN
                }
            }
            AggregationType::VarP => {
                if self.count_numbers > 0 {
                    self.m2 / n
                } else {
                    f64::NAN
                }
            }
            AggregationType::StdDev => self.compute(AggregationType::Var).sqrt(),
            AggregationType::StdDevP => self.compute(AggregationType::VarP).sqrt(),
        }
    }
}

/// Builds an aggregate function applying `aggregation` to the measure
/// `value` of each record in a group. `None` marks a non-numeric value.
pub fn measure<T, V>(aggregation: AggregationType, value: V) -> impl Fn(&[&T]) -> f64 + Send + Sync
where
    V: Fn(&T) -> Option<f64> + Send + Sync,
{
    move |records: &[&T]| {
        let mut acc = Accumulator::new();
        for record in records {
            acc.add(value(record));
        }
        acc.compute(aggregation)
    }
}

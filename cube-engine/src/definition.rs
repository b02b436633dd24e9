//! FILENAME: cube-engine/src/definition.rs
//! Cube Definition - Tag types and the serializable request options.
//!
//! These types describe a cube request and the shape of its rows:
//! - Which dimensions a row is grouped on (`SpecifiedDimensions`)
//! - The present-value wrapper for a grouped dimension (`GroupKey`)
//! - How the subsets are evaluated (`CubeOptions`)

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Largest supported number of grouping dimensions.
pub const MAX_DIMENSIONS: usize = 4;

// ============================================================================
// SPECIFIED DIMENSIONS
// ============================================================================

/// Bitmask over {Dim1, Dim2, Dim3, Dim4} recording which dimensions a row is
/// grouped on. A cleared bit means the dimension is rolled up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "u8")]
pub struct SpecifiedDimensions(u8);

impl SpecifiedDimensions {
    /// Every dimension rolled up (the grand total).
    pub const NONE: SpecifiedDimensions = SpecifiedDimensions(0);
    pub const DIM1: SpecifiedDimensions = SpecifiedDimensions(1);
    pub const DIM2: SpecifiedDimensions = SpecifiedDimensions(2);
    pub const DIM3: SpecifiedDimensions = SpecifiedDimensions(4);
    pub const DIM4: SpecifiedDimensions = SpecifiedDimensions(8);

    /// Builds a mask from raw bits. Bits above `MAX_DIMENSIONS` are dropped.
    pub fn from_bits(bits: u8) -> Self {
        SpecifiedDimensions(bits & Self::all(MAX_DIMENSIONS).0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// The mask with only `dimension` (1-based) specified.
    /// Out-of-range dimensions yield `NONE`.
    pub fn single(dimension: usize) -> Self {
        if (1..=MAX_DIMENSIONS).contains(&dimension) {
            SpecifiedDimensions(1 << (dimension - 1))
        } else {
            Self::NONE
        }
    }

    /// The mask with the first `dimensions` dimensions specified.
    pub fn all(dimensions: usize) -> Self {
        let n = dimensions.min(MAX_DIMENSIONS);
        SpecifiedDimensions(((1u16 << n) - 1) as u8)
    }

    /// Every subset of the first `dimensions` dimensions, `NONE` first.
    pub fn subsets(dimensions: usize) -> impl Iterator<Item = SpecifiedDimensions> {
        let n = dimensions.min(MAX_DIMENSIONS);
        (0..(1u16 << n)).map(|bits| SpecifiedDimensions(bits as u8))
    }

    /// Whether `dimension` (1-based) is specified.
    pub fn contains(self, dimension: usize) -> bool {
        let single = Self::single(dimension);
        single != Self::NONE && self.0 & single.0 == single.0
    }

    /// Number of specified dimensions.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The specified dimensions as 1-based indices, ascending.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (1..=MAX_DIMENSIONS).filter(move |&d| self.contains(d))
    }
}

impl From<u8> for SpecifiedDimensions {
    fn from(bits: u8) -> Self {
        SpecifiedDimensions::from_bits(bits)
    }
}

impl BitOr for SpecifiedDimensions {
    type Output = SpecifiedDimensions;

    fn bitor(self, rhs: Self) -> Self::Output {
        SpecifiedDimensions(self.0 | rhs.0)
    }
}

impl fmt::Display for SpecifiedDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        let names: Vec<String> = self.iter().map(|d| format!("Dim{}", d)).collect();
        write!(f, "{}", names.join("|"))
    }
}

// ============================================================================
// GROUP KEY
// ============================================================================

/// A dimension value on a row where that dimension is specified.
///
/// Rows carry `Option<GroupKey<T>>` per dimension. `None` means rolled up;
/// `Some(GroupKey(v))` means grouped on `v`, even when `v` is itself a
/// default or `None` value of `T`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey<T>(T);

impl<T> GroupKey<T> {
    pub fn new(value: T) -> Self {
        GroupKey(value)
    }

    pub fn value(&self) -> &T {
        &self.0
    }

    pub fn into_value(self) -> T {
        self.0
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// How the 2^N subset computations are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EvaluationMode {
    /// One subset after another on the calling thread.
    #[default]
    Sequential,
    /// Subsets spread over the rayon thread pool.
    Parallel,
}

/// Options for a single cube computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeOptions {
    #[serde(default)]
    pub mode: EvaluationMode,

    /// Name shown in log output.
    #[serde(default)]
    pub label: Option<String>,
}

impl CubeOptions {
    pub fn new() -> Self {
        CubeOptions::default()
    }

    pub fn parallel() -> Self {
        CubeOptions {
            mode: EvaluationMode::Parallel,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

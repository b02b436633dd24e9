//! FILENAME: cube-engine/src/keys.rs
//! Per-row key tuples and the key-selector sets that produce them.
//!
//! A cube over N dimensions keys each row by an N-tuple of
//! `Option<GroupKey<Ki>>`. The same tuple is the grouping key of the
//! partition pass, so rolled-up dimensions (`None`) never split a group.
//!
//! - `CubeKeys`: a key tuple plus storage for its memoized marginals
//! - `Marginal<I>`: typed access to dimension `I` (1-based) of a key tuple
//! - `Dimensions<T>`: a set of key selectors that projects a record into keys
//! - `DynamicKeys<K>`: runtime-sized key list for homogeneous selectors

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::definition::{GroupKey, SpecifiedDimensions, MAX_DIMENSIONS};

// ============================================================================
// KEY TUPLES
// ============================================================================

/// The grouping key of one cube row.
pub trait CubeKeys: Clone + Eq + Hash + Send + Sync {
    /// One lazily filled value -> aggregate map per dimension.
    type Marginals<A>: Default;
}

/// Typed access to dimension `I` (1-based) of a key tuple.
pub trait Marginal<const I: usize>: CubeKeys {
    type Key: Clone + Eq + Hash;

    fn key(&self) -> Option<&GroupKey<Self::Key>>;

    fn slot<A>(marginals: &Self::Marginals<A>) -> &OnceLock<FxHashMap<Self::Key, A>>;
}

macro_rules! impl_cube_keys {
    ($($K:ident),+) => {
        impl<$($K),+> CubeKeys for ($(Option<GroupKey<$K>>,)+)
        where
            $($K: Clone + Eq + Hash + Send + Sync),+
        {
            type Marginals<A> = ($(OnceLock<FxHashMap<$K, A>>,)+);
        }
    };
}

macro_rules! impl_marginal {
    (($($K:ident),+), $dim:literal, $idx:tt, $Key:ident) => {
        impl<$($K),+> Marginal<$dim> for ($(Option<GroupKey<$K>>,)+)
        where
            $($K: Clone + Eq + Hash + Send + Sync),+
        {
            type Key = $Key;

            fn key(&self) -> Option<&GroupKey<$Key>> {
                self.$idx.as_ref()
            }

            fn slot<A>(marginals: &Self::Marginals<A>) -> &OnceLock<FxHashMap<$Key, A>> {
                &marginals.$idx
            }
        }
    };
}

impl_cube_keys!(K1);
impl_cube_keys!(K1, K2);
impl_cube_keys!(K1, K2, K3);
impl_cube_keys!(K1, K2, K3, K4);

impl_marginal!((K1), 1, 0, K1);

impl_marginal!((K1, K2), 1, 0, K1);
impl_marginal!((K1, K2), 2, 1, K2);

impl_marginal!((K1, K2, K3), 1, 0, K1);
impl_marginal!((K1, K2, K3), 2, 1, K2);
impl_marginal!((K1, K2, K3), 3, 2, K3);

impl_marginal!((K1, K2, K3, K4), 1, 0, K1);
impl_marginal!((K1, K2, K3, K4), 2, 1, K2);
impl_marginal!((K1, K2, K3, K4), 3, 2, K3);
impl_marginal!((K1, K2, K3, K4), 4, 3, K4);

/// Key list for cubes whose dimension count is only known at runtime.
/// All dimensions share the key type `K`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicKeys<K>(SmallVec<[Option<GroupKey<K>>; MAX_DIMENSIONS]>);

impl<K> DynamicKeys<K> {
    /// Key of `dimension` (1-based); `None` when rolled up or out of range.
    pub fn get(&self, dimension: usize) -> Option<&GroupKey<K>> {
        dimension
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&GroupKey<K>>> {
        self.0.iter().map(Option::as_ref)
    }
}

impl<K> CubeKeys for DynamicKeys<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    type Marginals<A> = [OnceLock<FxHashMap<K, A>>; MAX_DIMENSIONS];
}

// ============================================================================
// KEY SELECTORS
// ============================================================================

/// A set of key selectors, one per dimension.
///
/// Implemented for tuples of 1 to 4 closures `Fn(&T) -> Ki` and for
/// slices of closures sharing one key type.
pub trait Dimensions<T> {
    type Keys: CubeKeys;

    /// Number of dimensions this set groups on.
    fn count(&self) -> usize;

    /// Keys of `record` with only the `specified` dimensions present.
    fn project(&self, record: &T, specified: SpecifiedDimensions) -> Self::Keys;

    /// Keys with every dimension rolled up.
    fn rolled_up(&self) -> Self::Keys;
}

macro_rules! impl_dimensions {
    ($(($F:ident, $K:ident, $idx:tt, $dim:literal)),+) => {
        impl<T, $($F, $K),+> Dimensions<T> for ($($F,)+)
        where
            $($F: Fn(&T) -> $K, $K: Clone + Eq + Hash + Send + Sync),+
        {
            type Keys = ($(Option<GroupKey<$K>>,)+);

            fn count(&self) -> usize {
                [$($dim),+].len()
            }

            fn project(&self, record: &T, specified: SpecifiedDimensions) -> Self::Keys {
                ($(
                    if specified.contains($dim) {
                        Some(GroupKey::new((self.$idx)(record)))
                    } else {
                        None
                    },
                )+)
            }

            fn rolled_up(&self) -> Self::Keys {
                ($(Option::<GroupKey<$K>>::None,)+)
            }
        }
    };
}

impl_dimensions!((F1, K1, 0, 1));
impl_dimensions!((F1, K1, 0, 1), (F2, K2, 1, 2));
impl_dimensions!((F1, K1, 0, 1), (F2, K2, 1, 2), (F3, K3, 2, 3));
impl_dimensions!((F1, K1, 0, 1), (F2, K2, 1, 2), (F3, K3, 2, 3), (F4, K4, 3, 4));

impl<T, K, F> Dimensions<T> for [F]
where
    F: Fn(&T) -> K,
    K: Clone + Eq + Hash + Send + Sync,
{
    type Keys = DynamicKeys<K>;

    fn count(&self) -> usize {
        self.len()
    }

    fn project(&self, record: &T, specified: SpecifiedDimensions) -> Self::Keys {
        DynamicKeys(
            self.iter()
                .enumerate()
                .map(|(i, selector)| {
                    specified
                        .contains(i + 1)
                        .then(|| GroupKey::new(selector(record)))
                })
                .collect(),
        )
    }

    fn rolled_up(&self) -> Self::Keys {
        DynamicKeys(self.iter().map(|_| None).collect())
    }
}

// ============================================================================
// FLOAT KEYS
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash so it can key a dimension.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            // -0.0 == 0.0, so both must hash alike
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl From<f64> for OrderedFloat {
    fn from(value: f64) -> Self {
        OrderedFloat(value)
    }
}

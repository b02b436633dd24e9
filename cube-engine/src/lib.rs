//! FILENAME: cube-engine/src/lib.rs
//! Cube aggregation subsystem.
//!
//! Computes `GROUP BY ... WITH CUBE`: one aggregate for every subset of
//! 1 to 4 grouping dimensions, including the empty subset (grand total).
//!
//! Layers:
//! - `definition`: Tag types and serializable options (what a cube request IS)
//! - `keys`: Per-row key tuples and key-selector sets
//! - `source`: The record source and its grouping primitive
//! - `aggregate`: Built-in aggregate functions
//! - `engine`: Subset enumeration (HOW we calculate)
//! - `result`: Cube rows and memoized marginals (WHAT callers read)

pub mod aggregate;
pub mod definition;
pub mod engine;
pub mod error;
pub mod keys;
pub mod result;
pub mod source;

#[cfg(test)]
mod tests;

pub use aggregate::{measure, Accumulator, AggregationType};
pub use definition::*;
pub use engine::{
    cube, cube1, cube2, cube3, cube4, cube_dyn, cube_with, try_cube, try_cube_with, Cube1, Cube2,
    Cube3, Cube4, DynamicCube,
};
pub use error::CubeError;
pub use keys::{CubeKeys, Dimensions, DynamicKeys, Marginal, OrderedFloat};
pub use result::{CubeResult, CubeRow, CubeStats};
pub use source::{partition_records, CubeSource, Group};

//! # data-cube
//!
//! Multi-dimensional "data cubes" over a filterable collection of records.
//! A cube has named dimensions, each with a sorted sample space, and an
//! aggregation function. Constraining dimensions and asking for measures
//! turns into filter and aggregate calls on the backing collection.
//!
//! - Copy-on-write cubes: `constrain`, `subcube`, `resample` and `filter`
//!   return new cubes and never touch the receiver
//! - Lazy decomposition into sub-cubes over any set of dimensions
//! - Nested measure dictionaries and lists, flat measure maps
//! - Pivot tables with subtotals and a grand total
//! - An in-memory columnar backend loading CSV files in parallel, with
//!   foreign-key traversal (`instrument__name`) and date parts
//!   (`released__year`, `released__absmonth`)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use data_cube::collection::{count, RecordTable};
//! use data_cube::cube::{Cube, DimensionSpec, Value};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let instruments = Arc::new(
//!         RecordTable::from_rows(
//!             "instrument",
//!             &["id", "name"],
//!             vec![
//!                 vec![Value::from(1), Value::from("trumpet")],
//!                 vec![Value::from(2), Value::from("piano")],
//!             ],
//!         )?,
//!     );
//!     let musicians = RecordTable::from_rows(
//!         "musician",
//!         &["id", "firstname", "instrument"],
//!         vec![
//!             vec![Value::from(1), Value::from("Miles"), Value::from(1)],
//!             vec![Value::from(2), Value::from("Bill"), Value::from(2)],
//!         ],
//!     )?
//!     .with_relation("instrument", instruments)?;
//!
//!     let cube = Cube::new(Arc::new(musicians).records(), count)
//!         .with_dimension("firstname", DimensionSpec::new())
//!         .with_dimension("instrument", DimensionSpec::field("instrument__name"));
//!
//!     assert_eq!(cube.measure()?, Value::Int(2));
//!     for (coordinate, measure) in cube.measures(&["instrument"])? {
//!         println!("{} => {}", coordinate, measure);
//!     }
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod cube;
pub mod present;

pub use collection::{count, AggregateOp, BackingCollection, RecordTable, Records};
pub use cube::{Coordinate, Cube, CubeError, CubeSchema, DimensionSpec, Value};

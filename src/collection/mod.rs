use thiserror::Error;

use crate::cube::{CubeError, FieldPath, Lookup, Value};

pub mod column;
pub mod records;

pub use records::{RecordTable, Records};

/// Error type for loading and reading record tables
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Schema/parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column '{column}': expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: String,
        got: String,
    },
}

#[derive(Debug, Default)]
pub struct ParseSummary {
    pub rows_processed: usize,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    /// 1-based line number in the source file, header included
    pub line: usize,
    pub column: String,
    pub value: String,
    pub error: Option<String>,
}

/// A queryable collection of records a cube aggregates over.
///
/// Implementations must make `filter` compose: filtering twice is the same
/// as filtering once with both sets of lookups.
pub trait BackingCollection: Clone + Send + Sync + 'static {
    /// Distinct values taken by `path` over the collection, in no particular order
    fn distinct_values(&self, path: &FieldPath) -> Result<Vec<Value>, CubeError>;

    /// Sub-collection of the records matching every lookup
    fn filter(&self, lookups: &[Lookup]) -> Result<Self, CubeError>;

    /// Number of records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate operations over a numeric field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// Sum of all numeric values
    Sum,
    /// Count of all rows
    Count,
    /// Average of numeric values
    Avg,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

/// Record count of a collection. Usable directly as a cube aggregation.
pub fn count<C: BackingCollection>(collection: &C) -> Result<Option<Value>, CubeError> {
    Ok(Some(Value::Int(collection.len() as i64)))
}

/// Builds an aggregation applying `op` to the numeric `field` of a [`Records`] view.
///
/// ```rust
/// # use data_cube::collection::{aggregate_field, AggregateOp};
/// let total_amount = aggregate_field("amount", AggregateOp::Sum);
/// ```
pub fn aggregate_field(
    field: &str,
    op: AggregateOp,
) -> impl Fn(&Records) -> Result<Option<Value>, CubeError> + Send + Sync + 'static {
    let path = FieldPath::from(field);
    move |records: &Records| records.aggregate(&path, op)
}

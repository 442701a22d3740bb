use std::sync::Arc;

use crate::collection::BackingCollection;
use crate::cube::base::SortKeyFn;
use crate::cube::{Aggregation, Coordinate, CubeError, DimensionSpec, Value};

/// Reusable shape of a cube: its dimensions, aggregation and defaults.
///
/// Build it once, then instantiate any number of independent cubes over
/// different collections with [`crate::cube::Cube::from_schema`].
///
/// ```rust
/// # use data_cube::collection::{count, Records};
/// # use data_cube::cube::{CubeSchema, DimensionSpec};
/// let schema: CubeSchema<Records> = CubeSchema::new(count)
///     .dimension("instrument", DimensionSpec::field("instrument__name"))
///     .dimension("firstname", DimensionSpec::new());
/// assert_eq!(schema.dimension_names(), vec!["instrument", "firstname"]);
/// ```
pub struct CubeSchema<C> {
    pub(crate) dimensions: Vec<(String, Arc<DimensionSpec<C>>)>,
    pub(crate) aggregation: Aggregation<C>,
    pub(crate) measure_on_empty: Value,
    pub(crate) sort_key: Option<SortKeyFn>,
}

impl<C: BackingCollection> CubeSchema<C> {
    pub fn new<F>(aggregation: F) -> Self
    where
        F: Fn(&C) -> Result<Option<Value>, CubeError> + Send + Sync + 'static,
    {
        CubeSchema {
            dimensions: Vec::new(),
            aggregation: Arc::new(aggregation),
            measure_on_empty: Value::Int(0),
            sort_key: None,
        }
    }

    /// Declares a dimension; a later declaration with the same name replaces it.
    pub fn dimension(mut self, name: &str, spec: DimensionSpec<C>) -> Self {
        let spec = Arc::new(spec);
        match self.dimensions.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = spec,
            None => self.dimensions.push((name.to_string(), spec)),
        }
        self
    }

    pub fn measure_on_empty(mut self, value: impl Into<Value>) -> Self {
        self.measure_on_empty = value.into();
        self
    }

    pub fn sort_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&Coordinate) -> Vec<Value> + Send + Sync + 'static,
    {
        self.sort_key = Some(Arc::new(f));
        self
    }

    /// Declared dimension names, in declaration order
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

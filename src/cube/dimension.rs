use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::collection::BackingCollection;
use crate::cube::{CubeError, FieldPath, Lookup, LookupOp, Value};

pub type SampleSpaceFn<C> = Arc<dyn Fn(&C) -> Result<Vec<Value>, CubeError> + Send + Sync>;
pub type PrettyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Where a dimension's sample space comes from
pub enum SampleSpaceSource<C> {
    /// A fixed list of values
    Explicit(Arc<Vec<Value>>),
    /// Computed from the dimension's backing collection
    Derived(SampleSpaceFn<C>),
    /// The distinct values of the dimension's field in its backing collection
    Default,
}

impl<C> Clone for SampleSpaceSource<C> {
    fn clone(&self) -> Self {
        match self {
            SampleSpaceSource::Explicit(values) => SampleSpaceSource::Explicit(values.clone()),
            SampleSpaceSource::Derived(f) => SampleSpaceSource::Derived(f.clone()),
            SampleSpaceSource::Default => SampleSpaceSource::Default,
        }
    }
}

impl<C> fmt::Debug for SampleSpaceSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSpaceSource::Explicit(values) => f.debug_tuple("Explicit").field(values).finish(),
            SampleSpaceSource::Derived(_) => f.write_str("Derived(..)"),
            SampleSpaceSource::Default => f.write_str("Default"),
        }
    }
}

/// Declaration of a dimension, before it is attached to a cube.
///
/// A spec is shared between every cube built from it and never changes;
/// per-cube state (name, bound collection, constraint) lives in [`Dimension`].
pub struct DimensionSpec<C> {
    field: Option<FieldPath>,
    sample_space: SampleSpaceSource<C>,
    collection: Option<C>,
    pretty: Option<PrettyFn>,
}

impl<C> Default for DimensionSpec<C> {
    fn default() -> Self {
        DimensionSpec {
            field: None,
            sample_space: SampleSpaceSource::Default,
            collection: None,
            pretty: None,
        }
    }
}

impl<C: Clone> Clone for DimensionSpec<C> {
    fn clone(&self) -> Self {
        DimensionSpec {
            field: self.field.clone(),
            sample_space: self.sample_space.clone(),
            collection: self.collection.clone(),
            pretty: self.pretty.clone(),
        }
    }
}

impl<C> DimensionSpec<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dimension reading `field` instead of the name it is attached under
    pub fn field(path: &str) -> Self {
        Self::new().with_field(path)
    }

    pub fn with_field(mut self, path: &str) -> Self {
        self.field = Some(FieldPath::parse(path));
        self
    }

    pub fn with_sample_space<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.sample_space = SampleSpaceSource::Explicit(Arc::new(values));
        self
    }

    pub fn with_sample_space_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> Result<Vec<Value>, CubeError> + Send + Sync + 'static,
    {
        self.sample_space = SampleSpaceSource::Derived(Arc::new(f));
        self
    }

    /// Binds the dimension to its own collection; it then ignores the cube's.
    pub fn with_collection(mut self, collection: C) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Renders this dimension's values for display, e.g. in table headers
    pub fn with_pretty<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.pretty = Some(Arc::new(f));
        self
    }
}

impl<C> fmt::Debug for DimensionSpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DimensionSpec")
            .field("field", &self.field)
            .field("sample_space", &self.sample_space)
            .field("own_collection", &self.collection.is_some())
            .finish()
    }
}

/// A dimension attached to one cube
pub struct Dimension<C> {
    name: String,
    field: FieldPath,
    spec: Arc<DimensionSpec<C>>,
    sample_space: SampleSpaceSource<C>,
    collection: C,
    constraint: Option<Value>,
    window: Option<Arc<Vec<Value>>>,
}

impl<C: Clone> Clone for Dimension<C> {
    fn clone(&self) -> Self {
        Dimension {
            name: self.name.clone(),
            field: self.field.clone(),
            spec: self.spec.clone(),
            sample_space: self.sample_space.clone(),
            collection: self.collection.clone(),
            constraint: self.constraint.clone(),
            window: self.window.clone(),
        }
    }
}

impl<C: BackingCollection> Dimension<C> {
    pub(crate) fn bind(name: &str, spec: Arc<DimensionSpec<C>>, cube_collection: &C) -> Self {
        let field = spec
            .field
            .clone()
            .unwrap_or_else(|| FieldPath::parse(name));
        let collection = spec
            .collection
            .clone()
            .unwrap_or_else(|| cube_collection.clone());
        Dimension {
            name: name.to_string(),
            field,
            sample_space: spec.sample_space.clone(),
            spec,
            collection,
            constraint: None,
            window: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field path used to discover and filter values; the name unless set
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn constraint(&self) -> Option<&Value> {
        self.constraint.as_ref()
    }

    pub fn is_free(&self) -> bool {
        self.constraint.is_none()
    }

    /// Sorted sample space; the constraint alone when the dimension is constrained.
    pub fn get_sample_space(&self) -> Result<Vec<Value>, CubeError> {
        match &self.constraint {
            Some(value) => Ok(vec![value.clone()]),
            None => self.unconstrained_sample_space(),
        }
    }

    /// Sorted sample space, ignoring any constraint
    pub fn unconstrained_sample_space(&self) -> Result<Vec<Value>, CubeError> {
        let mut values = match &self.sample_space {
            SampleSpaceSource::Explicit(values) => values.as_ref().clone(),
            SampleSpaceSource::Derived(f) => f(&self.collection)?,
            SampleSpaceSource::Default => {
                trace!(dimension = %self.name, field = %self.field, "deriving sample space");
                self.collection.distinct_values(&self.field)?
            }
        };
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// The values a resampled dimension is restricted to
    pub fn window(&self) -> Option<&[Value]> {
        self.window.as_ref().map(|w| w.as_slice())
    }

    /// The lookups restricting a collection to this dimension's constraint,
    /// or to its resampled window while it is free. Windows of fields compared
    /// with another operator than `exact` (e.g. `__regex`) do not filter.
    pub fn to_filter_predicate(&self) -> Vec<Lookup> {
        match (&self.constraint, &self.window) {
            (Some(value), _) => Lookup {
                path: self.field.clone(),
                value: value.clone(),
            }
            .expand(),
            (None, Some(window)) if self.field.op() == LookupOp::Exact => vec![Lookup {
                path: self.field.with_op(LookupOp::In),
                value: Value::List(window.as_ref().clone()),
            }],
            _ => Vec::new(),
        }
    }

    pub fn pretty(&self, value: &Value) -> String {
        match &self.spec.pretty {
            Some(f) => f(value),
            None => value.to_string(),
        }
    }

    pub fn pretty_constraint(&self) -> Option<String> {
        self.constraint.as_ref().map(|v| self.pretty(v))
    }

    pub(crate) fn constrained(&self, value: Value) -> Self {
        let mut dimension = self.clone();
        dimension.constraint = Some(value);
        dimension
    }

    pub(crate) fn resampled(&self, values: Vec<Value>) -> Self {
        let values = Arc::new(values);
        let mut dimension = self.clone();
        dimension.sample_space = SampleSpaceSource::Explicit(values.clone());
        dimension.window = Some(values);
        dimension
    }

    /// Rebinds to `collection` unless its `DimensionSpec` carries its own collection
    pub(crate) fn rebound(&self, collection: &C) -> Self {
        let mut dimension = self.clone();
        if self.spec.collection.is_none() {
            dimension.collection = collection.clone();
        }
        dimension
    }
}

impl<C> fmt::Debug for Dimension<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("sample_space", &self.sample_space)
            .field("constraint", &self.constraint)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{RecordTable, Records};
    use chrono::NaiveDate;

    fn records() -> Records {
        let day = |m, d| Value::Date(NaiveDate::from_ymd_opt(2021, m, d).unwrap());
        let table = RecordTable::from_rows(
            "song",
            &["title", "released"],
            vec![
                vec![Value::from("So What"), day(3, 2)],
                vec![Value::from("Blue in Green"), day(3, 2)],
                vec![Value::from("Airegin"), day(1, 15)],
            ],
        )
        .unwrap();
        Arc::new(table).records()
    }

    fn bind(name: &str, spec: DimensionSpec<Records>) -> Dimension<Records> {
        Dimension::bind(name, Arc::new(spec), &records())
    }

    #[test]
    fn test_default_sample_space_is_sorted_distinct() {
        let dimension = bind("title", DimensionSpec::new());
        assert_eq!(
            dimension.get_sample_space().unwrap(),
            vec![
                Value::from("Airegin"),
                Value::from("Blue in Green"),
                Value::from("So What"),
            ]
        );

        let months = bind("month", DimensionSpec::field("released__month"));
        assert_eq!(
            months.get_sample_space().unwrap(),
            vec![Value::Int(1), Value::Int(3)]
        );
    }

    #[test]
    fn test_explicit_and_derived_sample_spaces() {
        let explicit = bind("n", DimensionSpec::new().with_sample_space([3, 1, 3, 2]));
        assert_eq!(
            explicit.get_sample_space().unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );

        let derived = bind(
            "n",
            DimensionSpec::new().with_sample_space_fn(|r: &Records| {
                Ok((0..r.len() as i64).rev().map(Value::Int).collect())
            }),
        );
        assert_eq!(
            derived.get_sample_space().unwrap(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_constrained_sample_space_is_singleton() {
        let dimension = bind("title", DimensionSpec::new()).constrained(Value::from("Airegin"));
        assert!(!dimension.is_free());
        assert_eq!(
            dimension.get_sample_space().unwrap(),
            vec![Value::from("Airegin")]
        );
        assert_eq!(dimension.unconstrained_sample_space().unwrap().len(), 3);
    }

    #[test]
    fn test_absmonth_constraint_expands_to_year_and_month() {
        let dimension = bind("month", DimensionSpec::field("released__absmonth"));
        assert!(dimension.to_filter_predicate().is_empty());

        let first = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let lookups = dimension.constrained(Value::Date(first)).to_filter_predicate();
        let rendered: Vec<(String, Value)> = lookups
            .iter()
            .map(|l| (l.path.to_string(), l.value.clone()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("released__year".to_string(), Value::Int(2021)),
                ("released__month".to_string(), Value::Int(3)),
            ]
        );
    }

    #[test]
    fn test_pretty_hook() {
        let plain = bind("title", DimensionSpec::new());
        assert_eq!(plain.pretty(&Value::from("So What")), "So What");

        let loud = bind(
            "title",
            DimensionSpec::new().with_pretty(|v| v.to_string().to_uppercase()),
        )
        .constrained(Value::from("So What"));
        assert_eq!(loud.pretty_constraint().as_deref(), Some("SO WHAT"));
    }

    #[test]
    fn test_rebound_keeps_own_collection() {
        let all = records();
        let filtered = all.filter(&[Lookup::new("title", "Airegin")]).unwrap();

        let follows = bind("title", DimensionSpec::new()).rebound(&filtered);
        assert_eq!(follows.get_sample_space().unwrap().len(), 1);

        let pinned = bind("title", DimensionSpec::new().with_collection(all)).rebound(&filtered);
        assert_eq!(pinned.get_sample_space().unwrap().len(), 3);
    }

    #[test]
    fn test_resampled_free_dimension_filters_to_window() {
        let dimension = bind("title", DimensionSpec::new())
            .resampled(vec![Value::from("Airegin"), Value::from("So What")]);
        assert_eq!(
            dimension.get_sample_space().unwrap(),
            vec![Value::from("Airegin"), Value::from("So What")]
        );

        let lookups = dimension.to_filter_predicate();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].path.op(), LookupOp::In);
        assert_eq!(records().filter(&lookups).unwrap().len(), 2);

        // a constraint takes over from the window
        let fixed = dimension.constrained(Value::from("So What"));
        assert_eq!(
            fixed.to_filter_predicate(),
            vec![Lookup::new("title", "So What")]
        );
    }
}

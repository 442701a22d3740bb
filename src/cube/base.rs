//! The cube and its recursive decomposition into sub-cubes.
//!
//! Every operation returning a cube leaves the receiver untouched, so a caller
//! can branch into many sub-cubes from one parent.
//!
//! Cost model: nothing is cached. Each measure is one filter plus one
//! aggregation call on the backing collection, so a full breakdown over free
//! dimensions of sizes `n1..nk` costs about `n1 * ... * nk` backend calls.
//! Use [`Cube::resample`] to bound expensive axes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use itertools::{Itertools, MultiProduct};
use tracing::debug;

use crate::collection::BackingCollection;
use crate::cube::{
    Coordinate, CubeError, CubeSchema, Dimension, DimensionSpec, Lookup, MeasureDict, MeasureList,
    Value,
};

pub type Aggregation<C> = Arc<dyn Fn(&C) -> Result<Option<Value>, CubeError> + Send + Sync>;
pub type SortKeyFn = Arc<dyn Fn(&Coordinate) -> Vec<Value> + Send + Sync>;

/// Shape of [`Cube::get_sample_space`] results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSpaceFormat {
    /// One name -> value coordinate per point
    Dict,
    /// One positional tuple per point, in the order the names were given
    Tuple,
    /// Raw values; only valid for a single dimension
    Flat,
}

impl fmt::Display for SampleSpaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSpaceFormat::Dict => f.write_str("dict"),
            SampleSpaceFormat::Tuple => f.write_str("tuple"),
            SampleSpaceFormat::Flat => f.write_str("flat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplePoints {
    Dict(Vec<Coordinate>),
    Tuple(Vec<Vec<Value>>),
    Flat(Vec<Value>),
}

impl SamplePoints {
    pub fn len(&self) -> usize {
        match self {
            SamplePoints::Dict(v) => v.len(),
            SamplePoints::Tuple(v) => v.len(),
            SamplePoints::Flat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Override of one dimension's sample space, see [`Cube::resample`]
#[derive(Debug, Clone, Default)]
pub struct Resample {
    lower: Option<Value>,
    upper: Option<Value>,
    space: Option<Vec<Value>>,
}

impl Resample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound
    pub fn lower(mut self, value: impl Into<Value>) -> Self {
        self.lower = Some(value.into());
        self
    }

    /// Inclusive upper bound
    pub fn upper(mut self, value: impl Into<Value>) -> Self {
        self.upper = Some(value.into());
        self
    }

    /// Replaces the dimension's sample space before bounds are applied
    pub fn space<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.space = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A multi-dimensional view over a backing collection.
///
/// # Examples
///
/// ```rust
/// # use data_cube::collection::{count, RecordTable};
/// # use data_cube::cube::{Cube, Value};
/// # use std::sync::Arc;
/// let table = RecordTable::from_rows(
///     "musician",
///     &["firstname", "instrument"],
///     vec![
///         vec![Value::from("Miles"), Value::from("trumpet")],
///         vec![Value::from("Bill"), Value::from("piano")],
///     ],
/// )
/// .unwrap();
/// let cube = Cube::new(Arc::new(table).records(), count)
///     .with_dimensions(&["firstname", "instrument"]);
/// assert_eq!(cube.measure().unwrap(), Value::Int(2));
/// assert_eq!(
///     cube.measure_at([("firstname", "Miles"), ("instrument", "trumpet")]).unwrap(),
///     Value::Int(1)
/// );
/// ```
pub struct Cube<C: BackingCollection> {
    dimensions: BTreeMap<String, Dimension<C>>,
    collection: C,
    aggregation: Aggregation<C>,
    measure_on_empty: Value,
    sort_key: Option<SortKeyFn>,
}

impl<C: BackingCollection> Clone for Cube<C> {
    fn clone(&self) -> Self {
        Cube {
            dimensions: self.dimensions.clone(),
            collection: self.collection.clone(),
            aggregation: self.aggregation.clone(),
            measure_on_empty: self.measure_on_empty.clone(),
            sort_key: self.sort_key.clone(),
        }
    }
}

impl<C: BackingCollection> Cube<C> {
    pub fn new<F>(collection: C, aggregation: F) -> Self
    where
        F: Fn(&C) -> Result<Option<Value>, CubeError> + Send + Sync + 'static,
    {
        Cube {
            dimensions: BTreeMap::new(),
            collection,
            aggregation: Arc::new(aggregation),
            measure_on_empty: Value::Int(0),
            sort_key: None,
        }
    }

    /// Instantiates a schema over `collection`; every dimension is bound to it
    /// unless its `DimensionSpec` carries its own collection.
    pub fn from_schema(schema: &CubeSchema<C>, collection: C) -> Self {
        let dimensions = schema
            .dimensions
            .iter()
            .map(|(name, spec)| (name.clone(), Dimension::bind(name, spec.clone(), &collection)))
            .collect();
        Cube {
            dimensions,
            collection,
            aggregation: schema.aggregation.clone(),
            measure_on_empty: schema.measure_on_empty.clone(),
            sort_key: schema.sort_key.clone(),
        }
    }

    /// Adds (or replaces) a dimension
    pub fn with_dimension(mut self, name: &str, spec: DimensionSpec<C>) -> Self {
        let dimension = Dimension::bind(name, Arc::new(spec), &self.collection);
        self.dimensions.insert(name.to_string(), dimension);
        self
    }

    /// Adds dimensions reading the field named like them, with default sample spaces
    pub fn with_dimensions(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.with_dimension(name, DimensionSpec::new());
        }
        self
    }

    /// Value reported when the aggregation yields nothing
    pub fn with_measure_on_empty(mut self, value: impl Into<Value>) -> Self {
        self.measure_on_empty = value.into();
        self
    }

    /// Orders decomposition by a key derived from each candidate coordinate
    /// instead of by each dimension's natural order.
    pub fn with_sort_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&Coordinate) -> Vec<Value> + Send + Sync + 'static,
    {
        self.sort_key = Some(Arc::new(f));
        self
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn measure_on_empty(&self) -> &Value {
        &self.measure_on_empty
    }

    pub fn dimension(&self, name: &str) -> Result<&Dimension<C>, CubeError> {
        self.dimensions
            .get(name)
            .ok_or_else(|| CubeError::InvalidDimension(name.to_string()))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension<C>> {
        self.dimensions.values()
    }

    /// Dimension names, sorted
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.keys().map(String::as_str).collect()
    }

    /// The constrained dimensions and their values
    pub fn constraint(&self) -> Coordinate {
        self.dimensions
            .values()
            .filter_map(|d| d.constraint().map(|v| (d.name().to_string(), v.clone())))
            .collect()
    }

    /// Names of the unconstrained dimensions, sorted
    pub fn free_dimensions(&self) -> Vec<&str> {
        self.dimensions
            .values()
            .filter(|d| d.is_free())
            .map(Dimension::name)
            .collect()
    }

    /// Combined lookups of every constrained or resampled dimension
    pub fn lookups(&self) -> Vec<Lookup> {
        self.dimensions
            .values()
            .flat_map(Dimension::to_filter_predicate)
            .collect()
    }

    /// Aggregates the backing collection filtered by the cube's constraint.
    pub fn measure(&self) -> Result<Value, CubeError> {
        let lookups = self.lookups();
        debug!(cube = %self, lookups = lookups.len(), "computing measure");

        let result = if lookups.is_empty() {
            (self.aggregation)(&self.collection)?
        } else {
            let filtered = self.collection.filter(&lookups)?;
            (self.aggregation)(&filtered)?
        };
        Ok(result.unwrap_or_else(|| self.measure_on_empty.clone()))
    }

    /// Measure at extra coordinates. Dimensions already constrained must be
    /// given their current value.
    pub fn measure_at<I, K, V>(&self, coordinates: I) -> Result<Value, CubeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.constrain(coordinates)?.measure()
    }

    /// A new cube with extra constraints applied.
    ///
    /// Re-constraining a dimension to its current value is accepted; any
    /// other value fails with [`CubeError::ConflictingConstraint`].
    pub fn constrain<I, K, V>(&self, extra: I) -> Result<Cube<C>, CubeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut cube = self.clone();
        for (name, value) in extra {
            let name = name.into();
            let value = value.into();
            let dimension = cube.dimension(&name)?;
            let constrained = match dimension.constraint() {
                Some(existing) if *existing != value => {
                    return Err(CubeError::ConflictingConstraint {
                        dimension: name,
                        existing: existing.clone(),
                        requested: value,
                    });
                }
                Some(_) => continue,
                None => dimension.constrained(value),
            };
            cube.dimensions.insert(name, constrained);
        }
        Ok(cube)
    }

    /// A cube restricted to `dimension_subset` (all dimensions when `None`),
    /// with `extra` constraints on dimensions of that subset.
    ///
    /// Constraints on dropped dimensions are discarded.
    pub fn subcube(
        &self,
        dimension_subset: Option<&[&str]>,
        extra: &Coordinate,
    ) -> Result<Cube<C>, CubeError> {
        let mut cube = self.clone();
        if let Some(subset) = dimension_subset {
            let mut dimensions = BTreeMap::new();
            for name in subset {
                let dimension = self.dimension(name)?;
                dimensions.insert(name.to_string(), dimension.clone());
            }
            cube.dimensions = dimensions;
        }
        cube.constrain(extra)
    }

    /// A cube whose `name` dimension samples `space` (by default its current
    /// sample space) restricted to `[lower, upper]` (by default its extremes).
    ///
    /// The dimension stays free, but measures only count records whose value
    /// lies in the resampled space.
    pub fn resample(&self, name: &str, resample: Resample) -> Result<Cube<C>, CubeError> {
        let dimension = self.dimension(name)?;
        let mut space = match resample.space {
            Some(space) => space,
            None => dimension.unconstrained_sample_space()?,
        };
        space.sort();
        space.dedup();

        let lower = resample.lower.or_else(|| space.first().cloned());
        let upper = resample.upper.or_else(|| space.last().cloned());
        space.retain(|v| {
            lower.as_ref().map_or(true, |lo| v >= lo) && upper.as_ref().map_or(true, |hi| v <= hi)
        });

        let mut cube = self.clone();
        cube.dimensions
            .insert(name.to_string(), dimension.resampled(space));
        Ok(cube)
    }

    /// A copy over another collection. Dimensions without a collection of
    /// their own follow the new one.
    pub fn reset_backing_collection(&self, collection: C) -> Cube<C> {
        let mut cube = self.clone();
        cube.dimensions = self
            .dimensions
            .iter()
            .map(|(name, d)| (name.clone(), d.rebound(&collection)))
            .collect();
        cube.collection = collection;
        cube
    }

    /// Filters the backing collection, see [`Cube::reset_backing_collection`]
    pub fn filter(&self, lookups: &[Lookup]) -> Result<Cube<C>, CubeError> {
        let collection = self.collection.filter(lookups)?;
        Ok(self.reset_backing_collection(collection))
    }

    /// Sorted sample space of one dimension
    pub fn sample_space(&self, name: &str) -> Result<Vec<Value>, CubeError> {
        self.dimension(name)?.get_sample_space()
    }

    /// Cross product of the named dimensions' sample spaces.
    pub fn get_sample_space(
        &self,
        names: &[&str],
        format: SampleSpaceFormat,
    ) -> Result<SamplePoints, CubeError> {
        if format == SampleSpaceFormat::Flat && names.len() != 1 {
            return Err(CubeError::UnsupportedFormat {
                format: format.to_string(),
                count: names.len(),
            });
        }
        let spaces = names
            .iter()
            .map(|name| self.sample_space(name))
            .collect::<Result<Vec<_>, _>>()?;

        let tuples: Vec<Vec<Value>> = cross_product(spaces).collect();

        Ok(match format {
            SampleSpaceFormat::Tuple => SamplePoints::Tuple(tuples),
            SampleSpaceFormat::Flat => {
                SamplePoints::Flat(tuples.into_iter().flat_map(|t| t.into_iter()).collect())
            }
            SampleSpaceFormat::Dict => SamplePoints::Dict(
                tuples
                    .into_iter()
                    .map(|t| names.iter().copied().zip(t).collect())
                    .collect(),
            ),
        })
    }

    /// Lazily decomposes the cube over `names`.
    ///
    /// Yields one cube per point of the cross product of the named dimensions'
    /// sorted sample spaces, first name varying slowest. Names already
    /// constrained are kept fixed; with no free name left, yields one copy of
    /// the cube.
    pub fn subcubes(&self, names: &[&str]) -> Result<Subcubes<C>, CubeError> {
        let working = self.free_names(names)?;
        if working.is_empty() {
            return Ok(Subcubes {
                parent: self.clone(),
                state: SubcubesState::Single(true),
            });
        }

        let spaces = working
            .iter()
            .map(|name| self.sample_space(name))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            cube = %self,
            dimensions = ?working,
            sizes = ?spaces.iter().map(Vec::len).collect::<Vec<_>>(),
            "decomposing into subcubes"
        );

        let state = match &self.sort_key {
            None => SubcubesState::Product {
                points: cross_product(spaces),
                names: working,
            },
            Some(key) => {
                let constraint = self.constraint();
                let mut points: Vec<(Vec<Value>, Coordinate)> = cross_product(spaces)
                    .map(|values| {
                        let point = point_at(&working, values);
                        (key(&constraint.merged(&point)), point)
                    })
                    .collect();
                points.sort_by(|a, b| a.0.cmp(&b.0));
                SubcubesState::Sorted(
                    points
                        .into_iter()
                        .map(|(_, p)| p)
                        .collect::<Vec<_>>()
                        .into_iter(),
                )
            }
        };

        Ok(Subcubes {
            parent: self.clone(),
            state,
        })
    }

    /// Nested measures following `names`.
    ///
    /// With `full`, every level is `{measure, subcubes}`; otherwise only the
    /// leaves, where every named dimension is fixed, carry a measure.
    pub fn measure_dict(&self, names: &[&str], full: bool) -> Result<MeasureDict, CubeError> {
        self.check_names(names)?;
        let (first, rest) = match names.split_first() {
            None => return Ok(MeasureDict::Leaf(self.measure()?)),
            Some((first, rest)) => (*first, rest),
        };

        let mut entries = Vec::new();
        for subcube in self.subcubes(&[first])? {
            let key = subcube.dimension(first)?.get_sample_space()?;
            let key = key
                .into_iter()
                .next()
                .ok_or_else(|| CubeError::KeyNotFound(first.to_string()))?;
            entries.push((key, subcube.measure_dict(rest, full)?));
        }

        if full {
            Ok(MeasureDict::Node {
                measure: self.measure()?,
                subcubes: entries,
            })
        } else {
            Ok(MeasureDict::Branch(entries))
        }
    }

    /// Nested lists of measures following `names`; the whole-cube measure in
    /// a one-element list when `names` is empty.
    pub fn measure_list(&self, names: &[&str]) -> Result<MeasureList, CubeError> {
        self.check_names(names)?;
        let (first, rest) = match names.split_first() {
            None => return Ok(MeasureList::Level(vec![MeasureList::Measure(self.measure()?)])),
            Some((first, rest)) => (*first, rest),
        };

        let mut level = Vec::new();
        for subcube in self.subcubes(&[first])? {
            if rest.is_empty() {
                level.push(MeasureList::Measure(subcube.measure()?));
            } else {
                level.push(subcube.measure_list(rest)?);
            }
        }
        Ok(MeasureList::Level(level))
    }

    /// Ordered `(coordinate, measure)` pairs over the named free dimensions
    /// (all free dimensions when `names` is empty). Coordinates only hold
    /// those dimensions.
    pub fn measures(&self, names: &[&str]) -> Result<Vec<(Coordinate, Value)>, CubeError> {
        let names: Vec<&str> = if names.is_empty() {
            self.free_dimensions()
        } else {
            names.to_vec()
        };
        let working = self.free_names(&names)?;

        self.subcubes(&names)?
            .map(|subcube| {
                let coordinate = subcube.constraint().project(&working);
                subcube.measure().map(|m| (coordinate, m))
            })
            .collect()
    }

    /// [`Cube::measures`] as a map
    pub fn measure_map(&self, names: &[&str]) -> Result<HashMap<Coordinate, Value>, CubeError> {
        Ok(self.measures(names)?.into_iter().collect())
    }

    fn check_names(&self, names: &[&str]) -> Result<(), CubeError> {
        for name in names {
            self.dimension(name)?;
        }
        Ok(())
    }

    /// Validated, deduplicated names of `names` that are still free
    fn free_names(&self, names: &[&str]) -> Result<Vec<String>, CubeError> {
        let mut working: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if self.dimension(name)?.is_free() && !working.iter().any(|w| w == name) {
                working.push(name.to_string());
            }
        }
        Ok(working)
    }

    /// Constrains free dimensions already validated by the caller
    fn fixed_at(&self, point: &Coordinate) -> Cube<C> {
        let mut cube = self.clone();
        for (name, value) in point {
            if let Some(dimension) = self.dimensions.get(name) {
                cube.dimensions
                    .insert(name.clone(), dimension.constrained(value.clone()));
            }
        }
        cube
    }
}

impl<C: BackingCollection> fmt::Display for Cube<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .free_dimensions()
            .into_iter()
            .map(str::to_string)
            .collect();
        parts.extend(
            self.constraint()
                .iter()
                .map(|(name, value)| format!("{}={}", name, value)),
        );
        write!(f, "Cube({})", parts.join(", "))
    }
}

impl<C: BackingCollection> fmt::Debug for Cube<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cube")
            .field("dimensions", &self.dimensions)
            .field("measure_on_empty", &self.measure_on_empty)
            .field("sort_key", &self.sort_key.is_some())
            .finish()
    }
}

fn point_at(names: &[String], values: Vec<Value>) -> Coordinate {
    names.iter().cloned().zip(values).collect()
}

/// Cross product of `spaces`, last position varying fastest
enum CrossProduct {
    Empty,
    Unit(bool),
    Points(MultiProduct<std::vec::IntoIter<Value>>),
}

fn cross_product(spaces: Vec<Vec<Value>>) -> CrossProduct {
    if spaces.is_empty() {
        CrossProduct::Unit(true)
    } else if spaces.iter().any(Vec::is_empty) {
        CrossProduct::Empty
    } else {
        CrossProduct::Points(spaces.into_iter().map(Vec::into_iter).multi_cartesian_product())
    }
}

impl Iterator for CrossProduct {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Vec<Value>> {
        match self {
            CrossProduct::Empty => None,
            CrossProduct::Unit(pending) => {
                if !*pending {
                    return None;
                }
                *pending = false;
                Some(Vec::new())
            }
            CrossProduct::Points(points) => points.next(),
        }
    }
}

enum SubcubesState {
    Single(bool),
    Product {
        points: CrossProduct,
        names: Vec<String>,
    },
    Sorted(std::vec::IntoIter<Coordinate>),
}

/// Lazy sequence of sub-cubes, see [`Cube::subcubes`]
pub struct Subcubes<C: BackingCollection> {
    parent: Cube<C>,
    state: SubcubesState,
}

impl<C: BackingCollection> Iterator for Subcubes<C> {
    type Item = Cube<C>;

    fn next(&mut self) -> Option<Cube<C>> {
        match &mut self.state {
            SubcubesState::Single(pending) => {
                if !*pending {
                    return None;
                }
                *pending = false;
                Some(self.parent.clone())
            }
            SubcubesState::Product { points, names } => {
                let values = points.next()?;
                Some(self.parent.fixed_at(&point_at(names, values)))
            }
            SubcubesState::Sorted(points) => {
                let point = points.next()?;
                Some(self.parent.fixed_at(&point))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{count, RecordTable, Records};

    fn cube() -> Cube<Records> {
        let table = RecordTable::from_rows(
            "player",
            &["name", "instrument", "age"],
            vec![
                vec![Value::from("John"), Value::from("Trumpet"), Value::from(14)],
                vec![Value::from("Jack"), Value::from("Trumpet"), Value::from(89)],
                vec![Value::from("Jack"), Value::from("Trumpet"), Value::from(14)],
            ],
        )
        .unwrap();
        Cube::new(Arc::new(table).records(), count).with_dimensions(&["name", "instrument", "age"])
    }

    #[test]
    fn test_cross_product_last_position_fastest() {
        let spaces = vec![
            vec![Value::Int(0), Value::Int(1)],
            vec![Value::Int(0), Value::Int(1), Value::Int(2)],
        ];
        let points: Vec<Vec<Value>> = cross_product(spaces).collect();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], vec![Value::Int(0), Value::Int(0)]);
        assert_eq!(points[1], vec![Value::Int(0), Value::Int(1)]);
        assert_eq!(points[3], vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(points[5], vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_cross_product_empty_space_yields_nothing() {
        let spaces = vec![vec![Value::Int(0)], vec![]];
        assert_eq!(cross_product(spaces).count(), 0);
        // no dimensions: one empty point
        assert_eq!(cross_product(Vec::new()).collect::<Vec<_>>(), vec![Vec::<Value>::new()]);
    }

    #[test]
    fn test_subcubes_skip_constrained_and_duplicate_names() {
        let cube = cube().constrain([("instrument", "Trumpet")]).unwrap();
        let subs: Vec<Coordinate> = cube
            .subcubes(&["name", "instrument", "name"])
            .unwrap()
            .map(|s| s.constraint())
            .collect();
        assert_eq!(
            subs,
            vec![
                Coordinate::new([("name", "Jack"), ("instrument", "Trumpet")]),
                Coordinate::new([("name", "John"), ("instrument", "Trumpet")]),
            ]
        );
    }

    #[test]
    fn test_empty_sample_space_yields_no_subcube() {
        let cube = cube()
            .resample("age", Resample::new().lower(20).upper(30))
            .unwrap();
        assert!(cube.sample_space("age").unwrap().is_empty());
        assert_eq!(cube.subcubes(&["age"]).unwrap().count(), 0);
        assert_eq!(
            cube.measure_list(&["age"]).unwrap(),
            MeasureList::Level(Vec::new())
        );
    }

    #[test]
    fn test_sample_points_tuple_order() {
        let points = cube()
            .get_sample_space(&["age", "name"], SampleSpaceFormat::Tuple)
            .unwrap();
        assert_eq!(
            points,
            SamplePoints::Tuple(vec![
                vec![Value::Int(14), Value::from("Jack")],
                vec![Value::Int(14), Value::from("John")],
                vec![Value::Int(89), Value::from("Jack")],
                vec![Value::Int(89), Value::from("John")],
            ])
        );
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn test_display_lists_free_then_constrained() {
        let cube = cube().constrain([("age", 14)]).unwrap();
        assert_eq!(cube.to_string(), "Cube(instrument, name, age=14)");
    }

    #[test]
    fn test_measure_on_empty() {
        let cube = cube().with_measure_on_empty(-1);
        // count never reports "no value"
        assert_eq!(cube.measure_at([("age", 50)]).unwrap(), Value::Int(0));

        let empty_aware = Cube::new(cube.collection().clone(), |r: &Records| {
            Ok((!r.is_empty()).then(|| Value::Int(r.len() as i64)))
        })
        .with_dimensions(&["age"])
        .with_measure_on_empty(-1);
        assert_eq!(empty_aware.measure_at([("age", 50)]).unwrap(), Value::Int(-1));
    }
}

//! String-driven helpers over the cube API, forgiving about bad input.

use tracing::debug;

use crate::collection::BackingCollection;
use crate::cube::{Coordinate, Cube, Value};

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parses `"dim1=val1, dim2=val2"`; literals are typed with [`Value::infer`]
pub fn parse_coords(coords: &str) -> Option<Coordinate> {
    split_list(coords)
        .map(|pair| {
            let (name, literal) = pair.split_once('=')?;
            Some((name.trim().to_string(), Value::infer(literal.trim())))
        })
        .collect::<Option<Vec<_>>>()
        .map(Coordinate::new)
}

/// The sub-cube over `"dim1, dim2"`, or a copy of `cube` when a name is invalid
pub fn subcube<C: BackingCollection>(cube: &Cube<C>, dimensions: &str) -> Cube<C> {
    let names: Vec<&str> = split_list(dimensions).collect();
    match cube.subcube(Some(names.as_slice()), &Coordinate::default()) {
        Ok(sub) => sub,
        Err(e) => {
            debug!(error = %e, dimensions, "keeping cube unchanged");
            cube.clone()
        }
    }
}

/// The measure at `"dim1=val1, dim2=val2"`; `None` when a dimension is
/// invalid, a constraint conflicts or the aggregation fails.
pub fn coords<C: BackingCollection>(cube: &Cube<C>, coords: &str) -> Option<Value> {
    let coordinate = parse_coords(coords)?;
    match cube.measure_at(&coordinate) {
        Ok(measure) => Some(measure),
        Err(e) => {
            debug!(error = %e, coords, "no measure");
            None
        }
    }
}

/// The value `dimension` is constrained to, if any
pub fn constraint<C: BackingCollection>(cube: &Cube<C>, dimension: &str) -> Option<Value> {
    cube.dimension(dimension)
        .ok()
        .and_then(|d| d.constraint().cloned())
}

use serde::Serialize;
use tracing::debug;

use crate::collection::BackingCollection;
use crate::cube::{Cube, CubeError, Value};

/// One column or one row of a pivot table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableLine {
    pub name: Value,
    pub pretty_name: String,
    /// One measure per value of the other dimension
    pub values: Vec<Value>,
    pub overall: Value,
}

/// A two-dimensional pivot of a cube, with subtotals and a grand total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub col_names: Vec<(Value, String)>,
    pub row_names: Vec<(Value, String)>,
    pub cols: Vec<TableLine>,
    pub rows: Vec<TableLine>,
    pub col_overalls: Vec<Value>,
    pub row_overalls: Vec<Value>,
    pub col_dim_name: String,
    pub row_dim_name: String,
    pub overall: Value,
}

impl TableData {
    /// Pivots `cube` with `col_dim` values across and `row_dim` values down.
    ///
    /// Every cell, subtotal and the grand total is its own measure of the
    /// cube, so for a cube of sizes `c x r` this issues `2cr + c + r + 1`
    /// aggregation calls.
    ///
    /// # Arguments
    ///
    /// * `cube` - Cube holding both dimensions
    /// * `col_dim` - Dimension laid out as columns
    /// * `row_dim` - Dimension laid out as rows
    pub fn build<C: BackingCollection>(
        cube: &Cube<C>,
        col_dim: &str,
        row_dim: &str,
    ) -> Result<TableData, CubeError> {
        debug!(cube = %cube, col_dim, row_dim, "building table");

        let cols = lines(cube, col_dim, row_dim)?;
        let rows = lines(cube, row_dim, col_dim)?;

        Ok(TableData {
            col_names: cols
                .iter()
                .map(|l| (l.name.clone(), l.pretty_name.clone()))
                .collect(),
            row_names: rows
                .iter()
                .map(|l| (l.name.clone(), l.pretty_name.clone()))
                .collect(),
            col_overalls: cols.iter().map(|l| l.overall.clone()).collect(),
            row_overalls: rows.iter().map(|l| l.overall.clone()).collect(),
            cols,
            rows,
            col_dim_name: col_dim.to_string(),
            row_dim_name: row_dim.to_string(),
            overall: cube.measure()?,
        })
    }

    /// Measure at column `col`, row `row`
    pub fn cell(&self, col: usize, row: usize) -> Option<&Value> {
        self.cols.get(col).and_then(|c| c.values.get(row))
    }
}

/// One line per value of `outer`, each holding a measure per value of `inner`
fn lines<C: BackingCollection>(
    cube: &Cube<C>,
    outer: &str,
    inner: &str,
) -> Result<Vec<TableLine>, CubeError> {
    let outer_dim = cube.dimension(outer)?;
    let inner_space = cube.sample_space(inner)?;

    outer_dim
        .get_sample_space()?
        .into_iter()
        .map(|value| {
            let line_cube = cube.constrain([(outer, value.clone())])?;
            let values = inner_space
                .iter()
                .map(|inner_value| line_cube.measure_at([(inner, inner_value)]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TableLine {
                pretty_name: outer_dim.pretty(&value),
                overall: line_cube.measure()?,
                name: value,
                values,
            })
        })
        .collect()
}

impl<C: BackingCollection> Cube<C> {
    /// Shorthand for [`TableData::build`]
    pub fn table(&self, col_dim: &str, row_dim: &str) -> Result<TableData, CubeError> {
        TableData::build(self, col_dim, row_dim)
    }
}

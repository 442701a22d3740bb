use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::collection::column::{Column, ColumnType};
use crate::collection::{AggregateOp, BackingCollection, ParseError, ParseSummary, RecordError};
use crate::config::CsvConfig;
use crate::cube::{CubeError, EntityRef, FieldPath, Lookup, Value};

/// Typed columns parsed from one slice of a CSV file
struct BatchResult {
    int64_batches: Vec<Vec<i64>>,
    float64_batches: Vec<Vec<f64>>,
    date_batches: Vec<Vec<NaiveDate>>,
    str_batches: Vec<Vec<String>>,
    row_count: usize,
    /// Non-empty lines seen, well-formed or not
    line_count: usize,
    errors: Vec<ParseError>,
}

/// One segment of a resolved field path
struct Step<'a> {
    table: &'a RecordTable,
    column: usize,
    /// Target table when the column is a foreign key
    relation: Option<&'a RecordTable>,
}

/// In-memory columnar table of records of one model.
///
/// A column named `id` holding integers is the primary key; without it rows
/// are keyed by their index. Columns can be declared foreign keys into other
/// tables with [`RecordTable::with_relation`], which lets field paths such as
/// `instrument__name` traverse them.
///
/// # Examples
///
/// ```rust
/// # use data_cube::collection::{BackingCollection, RecordTable};
/// # use data_cube::cube::{FieldPath, Value};
/// # use std::sync::Arc;
/// let instruments = Arc::new(
///     RecordTable::from_rows(
///         "instrument",
///         &["id", "name"],
///         vec![vec![Value::from(1), Value::from("trumpet")]],
///     )
///     .unwrap(),
/// );
/// let musicians = RecordTable::from_rows(
///     "musician",
///     &["id", "firstname", "instrument"],
///     vec![vec![Value::from(1), Value::from("Miles"), Value::from(1)]],
/// )
/// .unwrap()
/// .with_relation("instrument", instruments)
/// .unwrap();
///
/// let records = Arc::new(musicians).records();
/// let names = records.distinct_values(&FieldPath::parse("instrument__name")).unwrap();
/// assert_eq!(names, vec![Value::from("trumpet")]);
/// ```
#[derive(Debug)]
pub struct RecordTable {
    model: Arc<str>,
    headers: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
    label_field: Option<usize>,
    relations: HashMap<String, Arc<RecordTable>>,
    pk_index: HashMap<i64, usize>,
}

impl RecordTable {
    /// Create an empty table
    pub fn new(model: &str) -> Self {
        RecordTable {
            model: Arc::from(model),
            headers: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            label_field: None,
            relations: HashMap::new(),
            pk_index: HashMap::new(),
        }
    }

    /// Builds a table from rows of values; column types come from the first row.
    ///
    /// Entity values are stored as their primary key. Integers are accepted
    /// in float columns.
    pub fn from_rows(
        model: &str,
        headers: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, RecordError> {
        let mut table = RecordTable::new(model);
        table.headers = headers.iter().map(|h| h.to_string()).collect();

        let first = rows.first();
        table.columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = first.and_then(|row| row.get(i));
                match value.map(stored) {
                    None => Ok(ColumnType::Str),
                    Some(v) => ColumnType::of_value(&v).ok_or_else(|| RecordError::TypeMismatch {
                        column: name.to_string(),
                        expected: "int64, float64, date or str".to_string(),
                        got: format!("{:?}", v),
                    }),
                }
            })
            .map(|t| t.map(Column::new))
            .collect::<Result<_, _>>()?;

        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != table.headers.len() {
                return Err(RecordError::Parse(format!(
                    "row {}: expected {} fields, got {}",
                    line,
                    table.headers.len(),
                    row.len()
                )));
            }
            for ((column, name), value) in table.columns.iter_mut().zip(&table.headers).zip(row) {
                column.push(name, stored(&value))?;
            }
            table.row_count += 1;
        }

        table.finish();
        Ok(table)
    }

    /// Loads a CSV file into memory using memory mapping
    ///
    /// Infers column types from the first data row (Int, Float, Date, Str).
    /// Rows with a wrong field count or unparsable fields are skipped and
    /// reported in the returned [`ParseSummary`].
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file
    /// * `config` - Delimiter, date format and parallelism
    ///
    /// # Errors
    /// Returns a [`RecordError`] if:
    /// - File cannot be opened or mapped
    /// - The header or first data row is missing
    /// - The first data row does not match the header
    pub fn load_csv(&mut self, path: &Path, config: &CsvConfig) -> Result<ParseSummary, RecordError> {
        let delimiter = config.delimiter_byte().map_err(RecordError::Parse)?;
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let buf: &[u8] = &mmap[..];

        // Parse header
        let header_end = memchr::memchr(b'\n', buf)
            .ok_or_else(|| RecordError::Parse("Missing header line".into()))?;
        let header_line = std::str::from_utf8(trim_cr(&buf[..header_end]))?;
        let headers: Vec<String> = header_line
            .split(delimiter as char)
            .map(|s| s.trim().to_string())
            .collect();

        let data = &buf[header_end + 1..];

        // Infer schema from first line
        let first_line_end = memchr::memchr(b'\n', data).unwrap_or(data.len());
        let first_line = trim_cr(&data[..first_line_end]);
        if first_line.is_empty() {
            return Err(RecordError::Parse("No data rows".into()));
        }
        let schema = infer_schema(first_line, &headers, delimiter, &config.date_format)?;

        let num_chunks = match config.workers {
            0 => rayon::current_num_threads(),
            n => n,
        };
        let chunks = find_chunk_boundaries(data, num_chunks);

        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .map(|(start, end)| {
                parse_chunk(
                    &data[*start..*end],
                    &schema,
                    &headers,
                    delimiter,
                    &config.date_format,
                )
            })
            .collect();

        // Merge batch results into chunked columns
        let mut columns: Vec<Column> = schema.iter().map(|t| Column::new(*t)).collect();
        let mut total_rows = 0;
        let mut lines_before = 0;
        let mut all_errors = Vec::new();

        for mut batch in batch_results {
            total_rows += batch.row_count;
            // header is line 1
            all_errors.extend(batch.errors.into_iter().map(|mut e| {
                e.line += lines_before + 2;
                e
            }));
            lines_before += batch.line_count;

            for (col_idx, column) in columns.iter_mut().enumerate() {
                match column.column_type() {
                    ColumnType::Int64 => {
                        column.push_chunk_int64(std::mem::take(&mut batch.int64_batches[col_idx]))?
                    }
                    ColumnType::Float64 => column
                        .push_chunk_float64(std::mem::take(&mut batch.float64_batches[col_idx]))?,
                    ColumnType::Date => {
                        column.push_chunk_date(std::mem::take(&mut batch.date_batches[col_idx]))?
                    }
                    ColumnType::Str => {
                        column.push_chunk_str(std::mem::take(&mut batch.str_batches[col_idx]))?
                    }
                }
            }
        }

        for error in &all_errors {
            warn!(
                model = %self.model,
                line = error.line,
                column = %error.column,
                value = %error.value,
                "skipped malformed row"
            );
        }
        info!(
            model = %self.model,
            path = %path.display(),
            rows = total_rows,
            errors = all_errors.len(),
            "loaded csv"
        );

        self.headers = headers;
        self.columns = columns;
        self.row_count = total_rows;
        self.finish();

        Ok(ParseSummary {
            rows_processed: total_rows,
            errors: all_errors,
        })
    }

    /// Declares `field` a foreign key holding primary keys of `target`
    pub fn with_relation(
        mut self,
        field: &str,
        target: Arc<RecordTable>,
    ) -> Result<Self, RecordError> {
        let idx = self.column_index(field)?;
        let column_type = self.columns[idx].column_type();
        if column_type != ColumnType::Int64 {
            return Err(RecordError::TypeMismatch {
                column: field.to_string(),
                expected: ColumnType::Int64.name().to_string(),
                got: column_type.name().to_string(),
            });
        }
        self.relations.insert(field.to_string(), target);
        Ok(self)
    }

    /// Field rendered as the label of entities of this model
    pub fn with_label(mut self, field: &str) -> Result<Self, RecordError> {
        self.label_field = Some(self.column_index(field)?);
        Ok(self)
    }

    /// A view over every record
    pub fn records(self: &Arc<Self>) -> Records {
        Records {
            table: self.clone(),
            rows: Arc::new((0..self.row_count).collect()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, name: &str) -> Result<&Column, RecordError> {
        Ok(&self.columns[self.column_index(name)?])
    }

    pub fn relation(&self, field: &str) -> Option<&Arc<RecordTable>> {
        self.relations.get(field)
    }

    /// The record at `row` as a reference other models can hold
    pub fn entity(&self, row: usize) -> EntityRef {
        let id = self.primary_key(row);
        let label = self
            .label_field
            .and_then(|idx| self.columns[idx].get(row))
            .map(|v| v.to_string())
            .unwrap_or_else(|| id.to_string());
        EntityRef::new(&self.model, id, &label)
    }

    fn primary_key(&self, row: usize) -> i64 {
        match self.pk_column() {
            Some(idx) => self.columns[idx].get_i64(row).unwrap_or(row as i64),
            None => row as i64,
        }
    }

    fn pk_column(&self) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == "id")
            .filter(|&idx| self.columns[idx].column_type() == ColumnType::Int64)
    }

    fn row_of(&self, key: i64) -> Option<usize> {
        if self.pk_column().is_some() {
            return self.pk_index.get(&key).copied();
        }
        usize::try_from(key).ok().filter(|&row| row < self.row_count)
    }

    fn column_index(&self, name: &str) -> Result<usize, RecordError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| RecordError::MissingColumn(name.to_string()))
    }

    /// Flattens columns, indexes primary keys and picks a default label
    fn finish(&mut self) {
        for column in &mut self.columns {
            column.flatten_in_place();
        }

        self.pk_index = match self.pk_column() {
            Some(idx) => self.columns[idx]
                .iter_i64()
                .enumerate()
                .map(|(row, id)| (id, row))
                .collect(),
            None => HashMap::new(),
        };

        if self.label_field.is_none() {
            self.label_field = ["name", "title", "label"]
                .iter()
                .find_map(|field| self.column_index(field).ok());
        }
    }

    fn plan<'a>(&'a self, path: &FieldPath) -> Result<Vec<Step<'a>>, CubeError> {
        let segments = path.segments();
        let invalid = |table: &RecordTable, segment: &str| CubeError::InvalidField {
            model: table.model.to_string(),
            path: path.to_string(),
            segment: segment.to_string(),
        };
        if segments.is_empty() {
            return Err(invalid(self, path.as_str()));
        }

        let mut table = self;
        let mut steps = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            let column = table
                .column_index(segment)
                .map_err(|_| invalid(table, segment.as_str()))?;
            let relation = table.relations.get(segment.as_str()).map(|t| &**t);
            steps.push(Step {
                table,
                column,
                relation,
            });

            if i + 1 < segments.len() {
                table = relation.ok_or_else(|| invalid(table, segment.as_str()))?;
            }
        }
        Ok(steps)
    }
}

/// Resolves a planned path on one row; `None` for a dangling foreign key or
/// a date part of a non-date field.
fn eval(steps: &[Step<'_>], path: &FieldPath, mut row: usize) -> Option<Value> {
    let (last, hops) = steps.split_last()?;
    for step in hops {
        let key = step.table.columns[step.column].get_i64(row)?;
        row = step.relation?.row_of(key)?;
    }

    let value = match last.relation {
        Some(target) => {
            let key = last.table.columns[last.column].get_i64(row)?;
            Value::Entity(target.entity(target.row_of(key)?))
        }
        None => last.table.columns[last.column].get(row)?,
    };
    path.project(value)
}

fn stored(value: &Value) -> Value {
    match value {
        Value::Entity(e) => Value::Int(e.id),
        other => other.clone(),
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn split_fields<'a>(line: &'a [u8], delimiter: u8, fields: &mut Vec<&'a [u8]>) {
    fields.clear();
    let mut field_start = 0;
    for pos in memchr_iter(delimiter, line) {
        fields.push(&line[field_start..pos]);
        field_start = pos + 1;
    }
    fields.push(&line[field_start..]);
}

fn infer_schema(
    first_line: &[u8],
    headers: &[String],
    delimiter: u8,
    date_format: &str,
) -> Result<Vec<ColumnType>, RecordError> {
    let mut fields = Vec::new();
    split_fields(first_line, delimiter, &mut fields);

    if fields.len() != headers.len() {
        return Err(RecordError::Parse(format!(
            "Header/data mismatch: {} vs {}",
            headers.len(),
            fields.len()
        )));
    }

    Ok(fields
        .iter()
        .map(|field| ColumnType::infer(field, date_format))
        .collect())
}

fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return vec![];
    }

    let num_chunks = num_chunks.max(1);
    let chunk_size = data.len() / num_chunks;
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;

    for i in 0..num_chunks - 1 {
        let mut end = ((i + 1) * chunk_size).max(start);

        // Find next newline
        end = match memchr::memchr(b'\n', &data[end..]) {
            Some(offset) => end + offset + 1,
            None => data.len(),
        };

        if start < end {
            boundaries.push((start, end));
        }
        start = end;
        if start >= data.len() {
            break;
        }
    }

    // Last chunk gets everything remaining
    if start < data.len() {
        boundaries.push((start, data.len()));
    }

    boundaries
}

fn parse_field(
    field: &[u8],
    column_type: ColumnType,
    date_format: &str,
) -> Result<Value, String> {
    match column_type {
        ColumnType::Int64 => atoi_simd::parse::<i64>(field)
            .map(Value::Int)
            .map_err(|e| e.to_string()),
        ColumnType::Float64 => fast_float::parse::<f64, _>(field)
            .map(Value::Float)
            .map_err(|e| e.to_string()),
        ColumnType::Date => {
            let text = std::str::from_utf8(field).map_err(|e| e.to_string())?;
            NaiveDate::parse_from_str(text, date_format)
                .map(Value::Date)
                .map_err(|e| e.to_string())
        }
        ColumnType::Str => std::str::from_utf8(field)
            .map(|s| Value::Str(s.to_string()))
            .map_err(|e| e.to_string()),
    }
}

fn parse_chunk(
    chunk: &[u8],
    schema: &[ColumnType],
    headers: &[String],
    delimiter: u8,
    date_format: &str,
) -> BatchResult {
    let num_cols = schema.len();

    let mut batch = BatchResult {
        int64_batches: vec![Vec::new(); num_cols],
        float64_batches: vec![Vec::new(); num_cols],
        date_batches: vec![Vec::new(); num_cols],
        str_batches: vec![Vec::new(); num_cols],
        row_count: 0,
        line_count: 0,
        errors: Vec::new(),
    };
    let mut fields = Vec::with_capacity(num_cols);
    let mut parsed = Vec::with_capacity(num_cols);

    // chunks end on a newline; every piece after stripping it is one file line
    let chunk = chunk.strip_suffix(b"\n").unwrap_or(chunk);
    for raw in chunk.split(|&b| b == b'\n') {
        let line_no = batch.line_count;
        batch.line_count += 1;
        let line = trim_cr(raw);
        if line.is_empty() {
            continue;
        }

        split_fields(line, delimiter, &mut fields);
        if fields.len() != num_cols {
            batch.errors.push(ParseError {
                line: line_no,
                column: String::new(),
                value: format!("Expected {} fields, got {}", num_cols, fields.len()),
                error: None,
            });
            continue;
        }

        // A row is kept only when every field parses
        parsed.clear();
        let mut failed = false;
        for col_idx in 0..num_cols {
            match parse_field(fields[col_idx], schema[col_idx], date_format) {
                Ok(value) => parsed.push(value),
                Err(e) => {
                    batch.errors.push(ParseError {
                        line: line_no,
                        column: headers[col_idx].clone(),
                        value: String::from_utf8_lossy(fields[col_idx]).to_string(),
                        error: Some(e),
                    });
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }

        for (col_idx, value) in parsed.drain(..).enumerate() {
            match value {
                Value::Int(v) => batch.int64_batches[col_idx].push(v),
                Value::Float(v) => batch.float64_batches[col_idx].push(v),
                Value::Date(v) => batch.date_batches[col_idx].push(v),
                Value::Str(v) => batch.str_batches[col_idx].push(v),
                Value::Bool(_) | Value::Entity(_) | Value::List(_) => {}
            }
        }
        batch.row_count += 1;
    }

    batch
}

/// Intersects two sorted row lists
fn intersect_sorted_vecs(a: Vec<usize>, b: Vec<usize>) -> Vec<usize> {
    let mut result = Vec::with_capacity(a.len().min(b.len()));
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    result
}

/// Helper to aggregate integer values
fn aggregate_int_values(values: &[i64], op: AggregateOp) -> Result<Option<Value>, CubeError> {
    if values.is_empty() {
        return Ok(None);
    }

    Ok(match op {
        AggregateOp::Sum => {
            let sum: i128 = values.iter().map(|&v| v as i128).sum();
            let sum = i64::try_from(sum).map_err(|_| {
                CubeError::Aggregation(format!("sum {} of {} values overflows i64", sum, values.len()))
            })?;
            Some(Value::Int(sum))
        }
        AggregateOp::Count => Some(Value::Int(values.len() as i64)),
        AggregateOp::Avg => {
            let sum: i128 = values.iter().map(|&v| v as i128).sum();
            Some(Value::Float(sum as f64 / values.len() as f64))
        }
        AggregateOp::Min => values.iter().min().map(|&v| Value::Int(v)),
        AggregateOp::Max => values.iter().max().map(|&v| Value::Int(v)),
    })
}

/// Helper to aggregate float values
fn aggregate_float_values(values: &[f64], op: AggregateOp) -> Option<Value> {
    if values.is_empty() {
        return None;
    }

    match op {
        AggregateOp::Sum => Some(Value::Float(values.iter().sum())),
        AggregateOp::Count => Some(Value::Int(values.len() as i64)),
        AggregateOp::Avg => {
            let sum: f64 = values.iter().sum();
            Some(Value::Float(sum / values.len() as f64))
        }
        AggregateOp::Min => Some(Value::Float(
            values.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
        )),
        AggregateOp::Max => Some(Value::Float(
            values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        )),
    }
}

/// A subset of the rows of a [`RecordTable`].
///
/// Filtering narrows the row list and shares the table, so views are cheap
/// to clone and to derive.
#[derive(Debug, Clone)]
pub struct Records {
    table: Arc<RecordTable>,
    rows: Arc<Vec<usize>>,
}

impl Records {
    pub fn table(&self) -> &Arc<RecordTable> {
        &self.table
    }

    /// Row indices in the table, ascending
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Resolved values of `path`, in row order, skipping rows it does not resolve on
    pub fn values(&self, path: &FieldPath) -> Result<Vec<Value>, CubeError> {
        let steps = self.table.plan(path)?;
        Ok(self
            .rows
            .par_iter()
            .filter_map(|&row| eval(&steps, path, row))
            .collect())
    }

    /// Aggregates the numeric values of `path`; `None` on an empty view.
    ///
    /// # Arguments
    /// * `path` - Field to aggregate
    /// * `op` - Aggregate operation
    ///
    /// # Example
    /// ```rust
    /// # use data_cube::collection::{AggregateOp, RecordTable};
    /// # use data_cube::cube::{FieldPath, Value};
    /// # use std::sync::Arc;
    /// let table = RecordTable::from_rows(
    ///     "sale",
    ///     &["amount"],
    ///     vec![vec![Value::from(10)], vec![Value::from(20)]],
    /// )
    /// .unwrap();
    /// let records = Arc::new(table).records();
    /// let sum = records.aggregate(&FieldPath::parse("amount"), AggregateOp::Sum).unwrap();
    /// assert_eq!(sum, Some(Value::Int(30)));
    /// ```
    pub fn aggregate(&self, path: &FieldPath, op: AggregateOp) -> Result<Option<Value>, CubeError> {
        let values = self.values(path)?;
        if op == AggregateOp::Count {
            return Ok((!values.is_empty()).then(|| Value::Int(values.len() as i64)));
        }

        if values.iter().all(|v| matches!(v, Value::Int(_))) {
            let ints: Vec<i64> = values.iter().filter_map(Value::as_i64).collect();
            return aggregate_int_values(&ints, op);
        }

        let floats = values
            .iter()
            .map(|v| {
                v.as_f64().ok_or_else(|| {
                    CubeError::Aggregation(format!(
                        "cannot aggregate non-numeric value '{}' of '{}'",
                        v, path
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        Ok(aggregate_float_values(&floats, op))
    }

    fn matching_rows(&self, lookup: &Lookup) -> Result<Vec<usize>, CubeError> {
        let steps = self.table.plan(&lookup.path)?;
        let matcher = lookup.matcher()?;
        Ok(self
            .rows
            .par_iter()
            .copied()
            .filter(|&row| {
                eval(&steps, &lookup.path, row).map_or(false, |value| matcher.matches(&value))
            })
            .collect())
    }
}

impl BackingCollection for Records {
    fn distinct_values(&self, path: &FieldPath) -> Result<Vec<Value>, CubeError> {
        let steps = self.table.plan(path)?;
        let distinct: HashSet<Value> = self
            .rows
            .par_iter()
            .filter_map(|&row| eval(&steps, path, row))
            .collect();
        Ok(distinct.into_iter().collect())
    }

    fn filter(&self, lookups: &[Lookup]) -> Result<Self, CubeError> {
        let lookups: Vec<Lookup> = lookups.iter().cloned().flat_map(Lookup::expand).collect();
        if lookups.is_empty() {
            return Ok(self.clone());
        }

        let matches = lookups
            .par_iter()
            .map(|lookup| self.matching_rows(lookup))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = matches
            .into_iter()
            .reduce(intersect_sorted_vecs)
            .unwrap_or_default();

        debug!(
            model = %self.table.model,
            lookups = lookups.len(),
            before = self.rows.len(),
            after = rows.len(),
            "filtered records"
        );
        Ok(Records {
            table: self.table.clone(),
            rows: Arc::new(rows),
        })
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

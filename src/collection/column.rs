use chrono::NaiveDate;

use crate::collection::RecordError;
use crate::cube::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Date,
    Str,
}

impl ColumnType {
    /// Infers the type of a raw CSV field: integer, then float, then date, then string.
    pub fn infer(field: &[u8], date_format: &str) -> Self {
        if atoi_simd::parse::<i64>(field).is_ok() {
            ColumnType::Int64
        } else if fast_float::parse::<f64, _>(field).is_ok() {
            ColumnType::Float64
        } else if std::str::from_utf8(field)
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(s, date_format).ok())
            .is_some()
        {
            ColumnType::Date
        } else {
            ColumnType::Str
        }
    }

    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(ColumnType::Int64),
            Value::Float(_) => Some(ColumnType::Float64),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Str(_) => Some(ColumnType::Str),
            Value::Bool(_) | Value::Entity(_) | Value::List(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Date => "date",
            ColumnType::Str => "str",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<i64>>),
    Float64(Vec<Vec<f64>>),
    Date(Vec<Vec<NaiveDate>>),
    Str(Vec<Vec<String>>),
}

impl Column {
    pub fn new(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Int64 => Column::Int64(Vec::new()),
            ColumnType::Float64 => Column::Float64(Vec::new()),
            ColumnType::Date => Column::Date(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Date(_) => ColumnType::Date,
            Column::Str(_) => ColumnType::Str,
        }
    }

    /// Appends one value to the last chunk, opening a chunk if there is none.
    pub fn push(&mut self, name: &str, value: Value) -> Result<(), RecordError> {
        let mismatch = |expected: ColumnType, got: &Value| RecordError::TypeMismatch {
            column: name.to_string(),
            expected: expected.name().to_string(),
            got: format!("{:?}", got),
        };

        match (self, value) {
            (Column::Int64(chunks), Value::Int(v)) => last_chunk(chunks).push(v),
            (Column::Float64(chunks), Value::Float(v)) => last_chunk(chunks).push(v),
            (Column::Float64(chunks), Value::Int(v)) => last_chunk(chunks).push(v as f64),
            (Column::Date(chunks), Value::Date(v)) => last_chunk(chunks).push(v),
            (Column::Str(chunks), Value::Str(v)) => last_chunk(chunks).push(v),
            (column, other) => return Err(mismatch(column.column_type(), &other)),
        }
        Ok(())
    }

    pub fn push_chunk_int64(&mut self, chunk: Vec<i64>) -> Result<(), RecordError> {
        match self {
            Column::Int64(chunks) => chunks.push(chunk),
            _ => return Err(self.chunk_mismatch(ColumnType::Int64)),
        }
        Ok(())
    }

    pub fn push_chunk_float64(&mut self, chunk: Vec<f64>) -> Result<(), RecordError> {
        match self {
            Column::Float64(chunks) => chunks.push(chunk),
            _ => return Err(self.chunk_mismatch(ColumnType::Float64)),
        }
        Ok(())
    }

    pub fn push_chunk_date(&mut self, chunk: Vec<NaiveDate>) -> Result<(), RecordError> {
        match self {
            Column::Date(chunks) => chunks.push(chunk),
            _ => return Err(self.chunk_mismatch(ColumnType::Date)),
        }
        Ok(())
    }

    pub fn push_chunk_str(&mut self, chunk: Vec<String>) -> Result<(), RecordError> {
        match self {
            Column::Str(chunks) => chunks.push(chunk),
            _ => return Err(self.chunk_mismatch(ColumnType::Str)),
        }
        Ok(())
    }

    fn chunk_mismatch(&self, got: ColumnType) -> RecordError {
        RecordError::TypeMismatch {
            column: String::new(),
            expected: self.column_type().name().to_string(),
            got: got.name().to_string(),
        }
    }

    // Random access
    pub fn get(&self, idx: usize) -> Option<Value> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).map(|v| Value::Int(*v)),
            Column::Float64(chunks) => locate(chunks, idx).map(|v| Value::Float(*v)),
            Column::Date(chunks) => locate(chunks, idx).map(|v| Value::Date(*v)),
            Column::Str(chunks) => locate(chunks, idx).map(|v| Value::Str(v.clone())),
        }
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).copied(),
            _ => None,
        }
    }

    pub fn iter_i64(&self) -> impl Iterator<Item = i64> + '_ {
        let chunks: &[Vec<i64>] = match self {
            Column::Int64(chunks) => chunks.as_slice(),
            _ => &[],
        };
        chunks.iter().flat_map(|chunk| chunk.iter().copied())
    }

    pub fn total_len(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Float64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Date(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Str(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }

    /// Merges all chunks into one so random access stops walking chunk lists.
    pub fn flatten_in_place(&mut self) {
        match self {
            Column::Int64(chunks) => flatten(chunks),
            Column::Float64(chunks) => flatten(chunks),
            Column::Date(chunks) => flatten(chunks),
            Column::Str(chunks) => flatten(chunks),
        }
    }
}

fn last_chunk<T>(chunks: &mut Vec<Vec<T>>) -> &mut Vec<T> {
    if chunks.is_empty() {
        chunks.push(Vec::new());
    }
    let last = chunks.len() - 1;
    &mut chunks[last]
}

fn locate<T>(chunks: &[Vec<T>], idx: usize) -> Option<&T> {
    let mut remaining = idx;
    for chunk in chunks {
        if remaining < chunk.len() {
            return Some(&chunk[remaining]);
        }
        remaining -= chunk.len();
    }
    None
}

fn flatten<T>(chunks: &mut Vec<Vec<T>>) {
    if chunks.len() <= 1 {
        return; // Already flat
    }

    // Take ownership of chunks, leaving empty vec
    let mut owned_chunks = std::mem::take(chunks);
    let mut flattened = owned_chunks.remove(0);

    let total: usize = owned_chunks.iter().map(|c| c.len()).sum();
    flattened.reserve(total);

    for chunk in owned_chunks {
        flattened.extend(chunk);
    }

    chunks.push(flattened);
}

//! Cube model: dimensions, coordinates, and the recursive sub-cube decomposition.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::collection::RecordError;

pub mod base;
pub mod coordinate;
pub mod dimension;
pub mod field_path;
pub mod measures;
pub mod schema;
pub mod table;

pub use base::{Aggregation, Cube, Resample, SamplePoints, SampleSpaceFormat, Subcubes};
pub use coordinate::Coordinate;
pub use dimension::{Dimension, DimensionSpec, SampleSpaceSource};
pub use field_path::{CalendarGranularity, DatePart, FieldPath, Lookup, LookupOp};
pub use measures::{MeasureDict, MeasureList};
pub use schema::CubeSchema;
pub use table::{TableData, TableLine};

/// Error type used across the cube model
#[derive(Debug, Error)]
pub enum CubeError {
    #[error("invalid dimension '{0}'")]
    InvalidDimension(String),

    #[error("dimension '{dimension}' is constrained to {existing}, cannot constrain it to {requested}")]
    ConflictingConstraint {
        dimension: String,
        existing: Value,
        requested: Value,
    },

    #[error("invalid field '{path}': '{segment}' is not a field of {model}")]
    InvalidField {
        model: String,
        path: String,
        segment: String,
    },

    #[error("sample space format '{format}' needs exactly one dimension, got {count}")]
    UnsupportedFormat { format: String, count: usize },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("aggregation failed: {0}")]
    Aggregation(String),

    #[error("collection error: {0}")]
    Collection(#[from] RecordError),
}

/// Reference to a record of a related model.
///
/// Two references are equal when they point at the same model and primary key;
/// the label only affects rendering.
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub model: Arc<str>,
    pub id: i64,
    pub label: Arc<str>,
}

impl EntityRef {
    pub fn new(model: &str, id: i64, label: &str) -> Self {
        EntityRef {
            model: Arc::from(model),
            id,
            label: Arc::from(label),
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.model == other.model
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.hash(state);
        self.id.hash(state);
    }
}

impl Ord for EntityRef {
    // primary key first, so related records sort by id rather than by label
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.model.cmp(&other.model))
    }
}

impl PartialOrd for EntityRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A dimension value, a constraint or a measure
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Bool(bool),
    Entity(EntityRef),
    /// Operand of an `in` lookup
    List(Vec<Value>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Str(_) => 4,
            Value::Entity(_) => 5,
            Value::List(_) => 6,
        }
    }

    /// Parses a literal the way CSV fields are typed: integer, boolean, float,
    /// ISO date, and string as the fallback.
    pub fn infer(literal: &str) -> Value {
        let bytes = literal.as_bytes();
        if let Ok(v) = atoi_simd::parse::<i64>(bytes) {
            return Value::Int(v);
        }
        match literal {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(v) = fast_float::parse::<f64, _>(bytes) {
            return Value::Float(v);
        }
        if let Ok(d) = NaiveDate::parse_from_str(literal, "%Y-%m-%d") {
            return Value::Date(d);
        }
        Value::Str(literal.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Entity(e) => Some(e.id),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Entity(a), Value::Entity(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Entity(v) => v.hash(state),
            Value::List(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Entity(v) => f.write_str(&v.label),
            Value::List(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Date(_) | Value::Entity(_) => serializer.collect_str(self),
            Value::List(values) => serializer.collect_seq(values),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<EntityRef> for Value {
    fn from(v: EntityRef) -> Self {
        Value::Entity(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_literals() {
        assert_eq!(Value::infer("12"), Value::Int(12));
        assert_eq!(Value::infer("1.5"), Value::Float(1.5));
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(
            Value::infer("1959-08-17"),
            Value::Date(NaiveDate::from_ymd_opt(1959, 8, 17).unwrap())
        );
        assert_eq!(Value::infer("trumpet"), Value::Str("trumpet".into()));
    }

    #[test]
    fn test_entities_sort_by_id_not_label() {
        let zebra = Value::Entity(EntityRef::new("instrument", 1, "zebra"));
        let alto = Value::Entity(EntityRef::new("instrument", 2, "alto"));
        let mut values = vec![alto.clone(), zebra.clone()];
        values.sort();
        assert_eq!(values, vec![zebra, alto]);
    }

    #[test]
    fn test_entity_equality_ignores_label() {
        let a = EntityRef::new("instrument", 3, "sax");
        let b = EntityRef::new("instrument", 3, "tenor sax");
        assert_eq!(Value::Entity(a), Value::Entity(b));
    }

    #[test]
    fn test_mixed_variants_order_by_rank() {
        let mut values = vec![Value::from("a"), Value::from(2.5), Value::from(1)];
        values.sort();
        assert_eq!(values, vec![Value::from(1), Value::from(2.5), Value::from("a")]);
    }
}

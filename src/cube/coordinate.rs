use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::cube::{CubeError, Value};

/// A point in a cube's sample space: dimension name -> value.
///
/// Pairs are kept sorted by name, so equality and hashing do not depend on
/// the order the pairs were given in. Coordinates are immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pairs: BTreeMap<String, Value>,
}

impl Coordinate {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Coordinate {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.pairs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value, CubeError> {
        self.pairs
            .get(name)
            .ok_or_else(|| CubeError::KeyNotFound(name.to_string()))
    }

    /// Coordinates cannot be changed after construction; build a new one with
    /// [`Coordinate::merged`] instead.
    pub fn set(&mut self, name: &str, _value: Value) -> Result<(), CubeError> {
        Err(CubeError::UnsupportedOperation(format!(
            "cannot assign '{}' on an immutable coordinate",
            name
        )))
    }

    /// Dimension names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.pairs.iter()
    }

    /// A new coordinate holding both sets of pairs; `other` wins on shared names.
    pub fn merged(&self, other: &Coordinate) -> Coordinate {
        let mut pairs = self.pairs.clone();
        pairs.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        Coordinate { pairs }
    }

    /// Only the pairs whose name is in `names`
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Coordinate {
        Coordinate {
            pairs: self
                .pairs
                .iter()
                .filter(|(k, _)| names.iter().any(|n| n.as_ref() == k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Coordinate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Coordinate::new(iter)
    }
}

impl<'a> IntoIterator for &'a Coordinate {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl IntoIterator for Coordinate {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "Coordinate({})", pairs.join(", "))
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(coord: &Coordinate) -> u64 {
        let mut hasher = DefaultHasher::new();
        coord.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = Coordinate::new([("x", Value::from("top")), ("altitude", "a lot".into()), ("y", 23.into())]);
        let b = Coordinate::new([("y", Value::from(23)), ("x", "top".into()), ("altitude", "a lot".into())]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_different_values_differ() {
        let a = Coordinate::new([("x", "top"), ("altitude", "a lot")]);
        let b = Coordinate::new([("x", "top"), ("altitude", "lot")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_mapping_contract() {
        let coord = Coordinate::new([("y", 2), ("x", 1)]);
        assert_eq!(coord.len(), 2);
        assert!(coord.contains_key("x"));
        assert_eq!(coord.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(coord.get("y").unwrap(), &Value::Int(2));
        assert!(matches!(coord.get("z"), Err(CubeError::KeyNotFound(_))));
    }

    #[test]
    fn test_assignment_is_unsupported() {
        let mut coord = Coordinate::new([("x", 1)]);
        assert!(matches!(
            coord.set("x", Value::Int(2)),
            Err(CubeError::UnsupportedOperation(_))
        ));
        assert_eq!(coord.get("x").unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_merge_and_project() {
        let base = Coordinate::new([("x", 1), ("y", 2)]);
        let merged = base.merged(&Coordinate::new([("y", 3), ("z", 4)]));
        assert_eq!(merged, Coordinate::new([("x", 1), ("y", 3), ("z", 4)]));
        assert_eq!(merged.project(&["x", "z"]), Coordinate::new([("x", 1), ("z", 4)]));
    }

    #[test]
    fn test_display_sorted() {
        let coord = Coordinate::new([("y", "bottom"), ("x", "0")]);
        assert_eq!(coord.to_string(), "Coordinate(x=0, y=bottom)");
    }
}

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::cube::Value;

/// Nested measures produced by [`crate::cube::Cube::measure_dict`].
///
/// Entries are kept in the sorted order of each level's sample space. In JSON,
/// keys are the values' display form; entities sharing a label get their
/// primary key appended (`Evans#4`).
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureDict {
    /// All requested dimensions fixed
    Leaf(Value),
    /// A level carrying its own measure
    Node {
        measure: Value,
        subcubes: Vec<(Value, MeasureDict)>,
    },
    /// A level without a measure of its own
    Branch(Vec<(Value, MeasureDict)>),
}

impl MeasureDict {
    /// The measure at this level, absent on a bare branch
    pub fn measure(&self) -> Option<&Value> {
        match self {
            MeasureDict::Leaf(value) => Some(value),
            MeasureDict::Node { measure, .. } => Some(measure),
            MeasureDict::Branch(_) => None,
        }
    }

    pub fn entries(&self) -> &[(Value, MeasureDict)] {
        match self {
            MeasureDict::Leaf(_) => &[],
            MeasureDict::Node { subcubes, .. } => subcubes,
            MeasureDict::Branch(entries) => entries,
        }
    }

    pub fn get(&self, key: &Value) -> Option<&MeasureDict> {
        self.entries()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, sub)| sub)
    }

    /// Leaf measures, depth first
    pub fn leaves(&self) -> Vec<&Value> {
        match self {
            MeasureDict::Leaf(value) => vec![value],
            _ => self
                .entries()
                .iter()
                .flat_map(|(_, sub)| sub.leaves())
                .collect(),
        }
    }
}

struct Entries<'a>(&'a [(Value, MeasureDict)]);

impl Serialize for Entries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys: Vec<String> = self.0.iter().map(|(key, _)| key.to_string()).collect();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for key in &keys {
            *seen.entry(key.as_str()).or_default() += 1;
        }

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for ((value, sub), key) in self.0.iter().zip(&keys) {
            match value {
                // entities sharing a label are told apart by primary key
                Value::Entity(e) if seen[key.as_str()] > 1 => {
                    map.serialize_entry(&format!("{}#{}", key, e.id), sub)?
                }
                _ => map.serialize_entry(key, sub)?,
            }
        }
        map.end()
    }
}

impl Serialize for MeasureDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MeasureDict::Leaf(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("measure", value)?;
                map.end()
            }
            MeasureDict::Node { measure, subcubes } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("measure", measure)?;
                map.serialize_entry("subcubes", &Entries(subcubes))?;
                map.end()
            }
            MeasureDict::Branch(entries) => Entries(entries).serialize(serializer),
        }
    }
}

/// Nested measures produced by [`crate::cube::Cube::measure_list`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasureList {
    Measure(Value),
    Level(Vec<MeasureList>),
}

impl MeasureList {
    pub fn as_measure(&self) -> Option<&Value> {
        match self {
            MeasureList::Measure(value) => Some(value),
            MeasureList::Level(_) => None,
        }
    }

    pub fn level(&self) -> &[MeasureList] {
        match self {
            MeasureList::Measure(_) => &[],
            MeasureList::Level(items) => items,
        }
    }

    /// Indexes into nested levels, e.g. `at(&[i, j])`
    pub fn at(&self, path: &[usize]) -> Option<&MeasureList> {
        path.iter()
            .try_fold(self, |node, &i| node.level().get(i))
    }

    /// Leaf measures in order
    pub fn flatten(&self) -> Vec<&Value> {
        match self {
            MeasureList::Measure(value) => vec![value],
            MeasureList::Level(items) => items.iter().flat_map(MeasureList::flatten).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_json_shape() {
        let dict = MeasureDict::Node {
            measure: Value::Int(3),
            subcubes: vec![
                (Value::from("piano"), MeasureDict::Leaf(Value::Int(2))),
                (Value::from("sax"), MeasureDict::Leaf(Value::Int(1))),
            ],
        };
        let json = serde_json::to_string(&dict).unwrap();
        assert_eq!(
            json,
            r#"{"measure":3,"subcubes":{"piano":{"measure":2},"sax":{"measure":1}}}"#
        );
        assert_eq!(dict.get(&Value::from("sax")).and_then(|d| d.measure()), Some(&Value::Int(1)));
    }

    #[test]
    fn test_branch_has_no_measure() {
        let dict = MeasureDict::Branch(vec![(Value::Int(1), MeasureDict::Leaf(Value::Int(4)))]);
        assert!(dict.measure().is_none());
        assert_eq!(dict.leaves(), vec![&Value::Int(4)]);
        assert_eq!(serde_json::to_string(&dict).unwrap(), r#"{"1":{"measure":4}}"#);
    }

    #[test]
    fn test_list_indexing() {
        let list = MeasureList::Level(vec![
            MeasureList::Level(vec![MeasureList::Measure(Value::Int(0)), MeasureList::Measure(Value::Int(1))]),
            MeasureList::Level(vec![MeasureList::Measure(Value::Int(2)), MeasureList::Measure(Value::Int(3))]),
        ]);
        assert_eq!(list.at(&[1, 0]).and_then(MeasureList::as_measure), Some(&Value::Int(2)));
        assert!(list.at(&[2]).is_none());
        assert_eq!(list.flatten().len(), 4);
        assert_eq!(serde_json::to_string(&list).unwrap(), "[[0,1],[2,3]]");
    }

    #[test]
    fn test_entities_with_same_label_keep_distinct_keys() {
        use crate::cube::EntityRef;

        let entity = |id| Value::Entity(EntityRef::new("musician", id, "Evans"));
        let dict = MeasureDict::Branch(vec![
            (Value::Entity(EntityRef::new("musician", 1, "Davis")), MeasureDict::Leaf(Value::Int(2))),
            (entity(4), MeasureDict::Leaf(Value::Int(1))),
            (entity(6), MeasureDict::Leaf(Value::Int(0))),
        ]);
        let json = serde_json::to_value(&dict).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 3);
        assert_eq!(json["Davis"]["measure"], 2);
        assert_eq!(json["Evans#4"]["measure"], 1);
        assert_eq!(json["Evans#6"]["measure"], 0);
    }
}

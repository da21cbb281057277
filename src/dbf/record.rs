//! Decoded table rows.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::dbf::value::FieldValue;

/// One row as ordered `(field name, value)` pairs.
///
/// Order follows the field descriptors. Serializes as a JSON object with
/// keys in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    items: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new(items: Vec<(String, FieldValue)>) -> Self {
        Record { items }
    }

    /// Value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.items.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<(String, FieldValue)> {
        self.items
    }
}

impl From<Vec<(String, FieldValue)>> for Record {
    fn from(items: Vec<(String, FieldValue)>) -> Self {
        Record::new(items)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (k, v) in &self.items {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_access() {
        let rec = Record::new(vec![
            ("NAME".to_string(), FieldValue::Str("John".into())),
            ("AGE".to_string(), FieldValue::Int(30)),
        ]);
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get("AGE"), Some(&FieldValue::Int(30)));
        assert!(rec.get("missing").is_none());
        assert_eq!(rec.names().collect::<Vec<_>>(), vec!["NAME", "AGE"]);
        let items = rec.into_items();
        assert_eq!(items[0].0, "NAME");
    }

    #[test]
    fn test_serialize_keeps_order() {
        let rec = Record::new(vec![
            ("Z".to_string(), FieldValue::Int(1)),
            ("A".to_string(), FieldValue::Null),
        ]);
        assert_eq!(serde_json::to_string(&rec).unwrap(), r#"{"Z":1,"A":null}"#);
    }
}

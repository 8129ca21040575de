use crate::snmp::SnmpValue;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Field name that carries the table index
pub const INDEX_FIELD: &str = "index";

/// Value of one record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    /// A secondary column had no row for this index, or the GET failed
    Missing,
    /// Counter went backwards between samples (reboot or wrap)
    CounterReset,
}

impl FieldValue {
    /// Unrounded text for file export. Missing is empty.
    pub fn export_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(v) => v.to_string(),
            FieldValue::Unsigned(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Missing => String::new(),
            FieldValue::CounterReset => "reset-detected".to_string(),
        }
    }
}

/// Console form: floats rounded to two decimals, missing shown as "-".
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:.2}", v),
            FieldValue::Missing => f.write_str("-"),
            FieldValue::CounterReset => f.write_str("reset"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Integer(v) => serializer.serialize_i64(*v),
            FieldValue::Unsigned(v) => serializer.serialize_u64(*v),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Missing => serializer.serialize_none(),
            FieldValue::CounterReset => serializer.serialize_str("reset-detected"),
        }
    }
}

impl From<SnmpValue> for FieldValue {
    fn from(value: SnmpValue) -> Self {
        match value {
            SnmpValue::Integer(v) => FieldValue::Integer(v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                FieldValue::Unsigned(u64::from(v))
            }
            SnmpValue::Counter64(v) => FieldValue::Unsigned(v),
            SnmpValue::Null
            | SnmpValue::NoSuchObject
            | SnmpValue::NoSuchInstance
            | SnmpValue::EndOfMibView => FieldValue::Missing,
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Unsigned(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Unsigned(u64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// One discovered row: an interface, a neighbor, or a traffic sample.
///
/// Fields keep insertion order, which is the column order for rendering and
/// CSV export. Serializes as a flat map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    index: Option<u32>,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a table row; `index` becomes the first field.
    pub fn with_index(index: u32) -> Self {
        Self {
            index: Some(index),
            fields: vec![(INDEX_FIELD.to_string(), FieldValue::from(index))],
        }
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Set a field, replacing an earlier value of the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_first_field() {
        let record = Record::with_index(7).with("description", "eth0");
        let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["index", "description"]);
        assert_eq!(record.index(), Some(7));
        assert_eq!(record.get("index"), Some(&FieldValue::Unsigned(7)));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new().with("a", 1u64).with("b", 2u64);
        record.set("a", "x");
        let fields: Vec<(&str, &FieldValue)> = record.fields().collect();
        assert_eq!(fields[0], ("a", &FieldValue::Text("x".into())));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_display_rounds_floats() {
        assert_eq!(FieldValue::Float(1234.5678).to_string(), "1234.57");
        assert_eq!(FieldValue::Missing.to_string(), "-");
        assert_eq!(FieldValue::CounterReset.to_string(), "reset");
    }

    #[test]
    fn test_export_text_keeps_raw_float() {
        assert_eq!(FieldValue::Float(1234.5678).export_text(), "1234.5678");
        assert_eq!(FieldValue::Missing.export_text(), "");
        assert_eq!(FieldValue::CounterReset.export_text(), "reset-detected");
    }

    #[test]
    fn test_serialize_record_as_ordered_map() {
        let record = Record::with_index(3)
            .with("description", "ge-0/0/1")
            .with("speed", FieldValue::Missing)
            .with("in_bps", 1600.125)
            .with("out_bps", FieldValue::CounterReset);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"index":3,"description":"ge-0/0/1","speed":null,"in_bps":1600.125,"out_bps":"reset-detected"}"#
        );
    }

    #[test]
    fn test_from_snmp_value() {
        assert_eq!(
            FieldValue::from(SnmpValue::Counter32(5)),
            FieldValue::Unsigned(5)
        );
        assert_eq!(
            FieldValue::from(SnmpValue::OctetString(b"uplink".to_vec())),
            FieldValue::Text("uplink".into())
        );
        assert_eq!(
            FieldValue::from(SnmpValue::NoSuchInstance),
            FieldValue::Missing
        );
    }
}

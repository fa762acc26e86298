//! Record shapes
//!
//! A field reads and writes its slot through [`RecordShape`]. Sequences are
//! addressed by `field_position`, mappings and attribute objects by
//! `field_key`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::schema::FieldSchema;
use crate::value::Value;

/// Slot-level access to a record
pub trait RecordShape {
    /// Read the raw (unconverted) value stored in the field's slot
    fn read_slot(&self, field: &FieldSchema) -> Result<Value>;

    /// Store `value` in the field's slot as-is
    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()>;
}

/// An object exposing named attributes
pub trait Attributes: fmt::Debug + Send + Sync {
    fn get_attr(&self, name: &str) -> Option<Value>;

    /// Fails with a field access error when `name` cannot be set
    fn set_attr(&mut self, name: &str, value: Value) -> Result<()>;
}

/// The three record shapes a schema can describe
#[derive(Debug)]
pub enum Record {
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    Object(Box<dyn Attributes>),
}

impl Record {
    /// Build a record from JSON: arrays become sequences, objects mappings
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Array(items) => Ok(Record::Sequence(
                items.into_iter().map(Value::from_json).collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(map) => Ok(Record::Mapping(
                map.into_iter()
                    .map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect::<Result<_>>()?,
            )),
            other => Err(SchemaError::conversion(
                "record",
                &other,
                "expected a JSON array or object",
            )),
        }
    }

    pub fn object(attrs: impl Attributes + 'static) -> Self {
        Record::Object(Box::new(attrs))
    }
}

impl RecordShape for Record {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        match self {
            Record::Sequence(items) => items.read_slot(field),
            Record::Mapping(map) => map.read_slot(field),
            Record::Object(obj) => read_attr(&**obj, field),
        }
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        match self {
            Record::Sequence(items) => items.write_slot(field, value),
            Record::Mapping(map) => map.write_slot(field, value),
            Record::Object(obj) => obj.set_attr(&field.field_key, value),
        }
    }
}

fn position(field: &FieldSchema) -> Result<usize> {
    field.field_position.map(|p| p as usize).ok_or_else(|| {
        SchemaError::Configuration(format!(
            "field '{}' has no position and cannot address a sequence",
            field.field_key
        ))
    })
}

fn read_attr(obj: &dyn Attributes, field: &FieldSchema) -> Result<Value> {
    obj.get_attr(&field.field_key)
        .ok_or_else(|| SchemaError::field_access(&field.field_key, "attribute is not defined"))
}

impl RecordShape for [Value] {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        let idx = position(field)?;
        self.get(idx).cloned().ok_or_else(|| {
            SchemaError::field_access(
                &field.field_key,
                format!("position {} out of bounds for sequence of length {}", idx, self.len()),
            )
        })
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        let idx = position(field)?;
        let len = self.len();
        let slot = self.get_mut(idx).ok_or_else(|| {
            SchemaError::field_access(
                &field.field_key,
                format!("position {} out of bounds for sequence of length {}", idx, len),
            )
        })?;
        *slot = value;
        Ok(())
    }
}

impl RecordShape for Vec<Value> {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        self.as_slice().read_slot(field)
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        self.as_mut_slice().write_slot(field, value)
    }
}

impl RecordShape for BTreeMap<String, Value> {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        self.get(&field.field_key)
            .cloned()
            .ok_or_else(|| SchemaError::field_access(&field.field_key, "key is absent"))
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        self.insert(field.field_key.clone(), value);
        Ok(())
    }
}

impl RecordShape for HashMap<String, Value> {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        self.get(&field.field_key)
            .cloned()
            .ok_or_else(|| SchemaError::field_access(&field.field_key, "key is absent"))
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        self.insert(field.field_key.clone(), value);
        Ok(())
    }
}

/// An attribute object whose attribute set grows on assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicObject {
    attrs: BTreeMap<String, Value>,
}

impl DynamicObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute assignment
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

impl Attributes for DynamicObject {
    fn get_attr(&self, name: &str) -> Option<Value> {
        self.attrs.get(name).cloned()
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        self.attrs.insert(name.to_string(), value);
        Ok(())
    }
}

impl RecordShape for DynamicObject {
    fn read_slot(&self, field: &FieldSchema) -> Result<Value> {
        read_attr(self, field)
    }

    fn write_slot(&mut self, field: &FieldSchema, value: Value) -> Result<()> {
        self.set_attr(&field.field_key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn field(key: &str, position: Option<u32>) -> FieldSchema {
        let mut f = FieldSchema::new(key, FieldType::String);
        f.field_position = position;
        f
    }

    /// A fixed-shape object that refuses unknown attributes
    #[derive(Debug)]
    struct Reading {
        sensor: String,
        count: i64,
    }

    impl Attributes for Reading {
        fn get_attr(&self, name: &str) -> Option<Value> {
            match name {
                "sensor" => Some(Value::from(self.sensor.as_str())),
                "count" => Some(Value::Int(self.count)),
                _ => None,
            }
        }

        fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
            match (name, value) {
                ("sensor", Value::String(s)) => self.sensor = s,
                ("count", Value::Int(i)) => self.count = i,
                (name, _) => return Err(SchemaError::field_access(name, "not settable on Reading")),
            }
            Ok(())
        }
    }

    #[test]
    fn test_sequence_slots() {
        let mut rec = Record::from_json(json!(["a", "b"])).unwrap();
        assert_eq!(rec.read_slot(&field("x", Some(1))).unwrap(), Value::from("b"));

        rec.write_slot(&field("x", Some(0)), Value::Int(1)).unwrap();
        assert_eq!(rec.read_slot(&field("x", Some(0))).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_sequence_out_of_bounds() {
        let mut rec = vec![Value::from("only")];
        assert!(rec.read_slot(&field("x", Some(3))).unwrap_err().is_field_access());
        assert!(rec.write_slot(&field("x", Some(1)), Value::Null).unwrap_err().is_field_access());
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_sequence_requires_position() {
        let rec = vec![Value::from("only")];
        assert!(rec.read_slot(&field("x", None)).unwrap_err().is_configuration());
    }

    #[test]
    fn test_mapping_slots() {
        let mut rec: HashMap<String, Value> = HashMap::new();
        assert!(rec.read_slot(&field("k", None)).unwrap_err().is_field_access());

        rec.write_slot(&field("k", None), Value::from("v")).unwrap();
        assert_eq!(rec.read_slot(&field("k", None)).unwrap(), Value::from("v"));
    }

    #[test]
    fn test_typed_object_refuses_unknown_attribute() {
        let mut rec = Record::object(Reading { sensor: "t1".into(), count: 3 });
        assert_eq!(rec.read_slot(&field("count", None)).unwrap(), Value::Int(3));
        assert!(rec.read_slot(&field("missing", None)).unwrap_err().is_field_access());
        assert!(rec.write_slot(&field("missing", None), Value::Int(1)).unwrap_err().is_field_access());

        rec.write_slot(&field("sensor", None), Value::from("t2")).unwrap();
        assert_eq!(rec.read_slot(&field("sensor", None)).unwrap(), Value::from("t2"));
    }

    #[test]
    fn test_record_from_json_rejects_scalars() {
        assert!(Record::from_json(json!(5)).is_err());
    }
}

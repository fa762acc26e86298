//! Schema types and structures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::convert::convert_value;
use crate::error::{Result, SchemaError};
use crate::record::RecordShape;
use crate::value::Value;

/// Identifier of a data schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u64);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTypeId(pub u64);

impl fmt::Display for ModelTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "STRING")]
    String,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Int,
        FieldType::Float,
        FieldType::String,
    ];

    /// Persisted name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Date => "DATE",
            FieldType::DateTime => "DATETIME",
            FieldType::Int => "INT",
            FieldType::Float => "FLOAT",
            FieldType::String => "STRING",
        }
    }

    /// Whether `value` already has this type's representation
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Date, Value::Date(_))
                | (FieldType::DateTime, Value::DateTime(_))
                | (FieldType::Int, Value::Int(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::String, Value::String(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SchemaError::Configuration(format!("unsupported field type '{}'", s)))
    }
}

/// The external entity type a schema describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelType {
    pub id: ModelTypeId,
    /// Application or namespace the model lives in
    pub app_label: String,
    /// Model name within the application
    pub model: String,
}

impl ModelType {
    /// Get the qualified name (e.g., "animals.weighin")
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}

/// Schema for a single field in a piece of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Key of the field in mappings and objects
    pub field_key: String,
    /// Place of this field in the uniqueness key, `None` if not part of it
    pub uniqueness_order: Option<u32>,
    /// Position of the field when the record is a sequence
    pub field_position: Option<u32>,
    pub field_type: FieldType,
    /// Parse pattern for string sources, e.g. "%Y-%m-%d"
    pub field_format: Option<String>,
}

impl FieldSchema {
    pub fn new(field_key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_key: field_key.into(),
            uniqueness_order: None,
            field_position: None,
            field_type,
            field_format: None,
        }
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.field_position = Some(position);
        self
    }

    pub fn with_uniqueness_order(mut self, order: u32) -> Self {
        self.uniqueness_order = Some(order);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.field_format = Some(format.into());
        self
    }

    /// Read the field from `record` and convert it to the field's type
    pub fn get_value<R: RecordShape + ?Sized>(&self, record: &R) -> Result<Value> {
        let raw = record.read_slot(self)?;
        convert_value(self.field_type, raw, self.field_format.as_deref())
    }

    /// Store `value` in `record` without conversion
    pub fn set_value<R: RecordShape + ?Sized>(&self, record: &mut R, value: impl Into<Value>) -> Result<()> {
        record.write_slot(self, value.into())
    }
}

/// A typed, ordered set of fields describing one kind of record
#[derive(Debug, Clone)]
pub struct DataSchema {
    pub id: SchemaId,
    /// `None` when the schema describes free-form mappings
    pub model_type: Option<ModelType>,
    fields: Vec<FieldSchema>,
    unique_fields: OnceLock<Vec<FieldSchema>>,
    sorted_fields: OnceLock<Vec<FieldSchema>>,
}

impl DataSchema {
    /// Create a schema, rejecting duplicate field keys
    pub fn new(id: SchemaId, model_type: Option<ModelType>, fields: Vec<FieldSchema>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.field_key.as_str()) {
                return Err(SchemaError::Configuration(format!(
                    "schema {} declares field '{}' more than once",
                    id, field.field_key
                )));
            }
        }

        Ok(Self {
            id,
            model_type,
            fields,
            unique_fields: OnceLock::new(),
            sorted_fields: OnceLock::new(),
        })
    }

    /// Whether this schema describes free-form data rather than a model
    pub fn is_free_form(&self) -> bool {
        self.model_type.is_none()
    }

    /// Get a field by key
    pub fn field(&self, field_key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.field_key == field_key)
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields that make up the uniqueness key, in uniqueness order.
    ///
    /// Computed once per schema instance.
    pub fn unique_fields(&self) -> &[FieldSchema] {
        self.unique_fields.get_or_init(|| {
            let mut unique: Vec<FieldSchema> = self
                .fields
                .iter()
                .filter(|f| f.uniqueness_order.is_some())
                .cloned()
                .collect();
            unique.sort_by_key(|f| f.uniqueness_order);
            unique
        })
    }

    /// All fields ordered by position. Fields without a position come last,
    /// in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        self.sorted_fields.get_or_init(|| {
            let mut sorted = self.fields.clone();
            sorted.sort_by_key(|f| (f.field_position.is_none(), f.field_position));
            sorted
        })
    }

    /// Typed values of the uniqueness key for `record`
    pub fn unique_key<R: RecordShape + ?Sized>(&self, record: &R) -> Result<Vec<Value>> {
        self.unique_fields().iter().map(|f| f.get_value(record)).collect()
    }

    /// Read every field of `record` into a mapping keyed by field key
    pub fn to_mapping<R: RecordShape + ?Sized>(&self, record: &R) -> Result<BTreeMap<String, Value>> {
        self.fields()
            .iter()
            .map(|f| f.get_value(record).map(|v| (f.field_key.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DynamicObject, Record};
    use serde_json::json;

    fn field_a() -> FieldSchema {
        FieldSchema::new("a", FieldType::Int).with_position(0).with_uniqueness_order(1)
    }

    fn field_b() -> FieldSchema {
        FieldSchema::new("b", FieldType::String).with_position(1).with_uniqueness_order(0)
    }

    fn schema_ab() -> DataSchema {
        DataSchema::new(SchemaId(1), None, vec![field_a(), field_b()]).unwrap()
    }

    fn keys(fields: &[FieldSchema]) -> Vec<&str> {
        fields.iter().map(|f| f.field_key.as_str()).collect()
    }

    #[test]
    fn test_unique_and_positional_ordering() {
        let schema = schema_ab();
        assert_eq!(keys(schema.unique_fields()), vec!["b", "a"]);
        assert_eq!(keys(schema.fields()), vec!["a", "b"]);
    }

    #[test]
    fn test_unique_fields_exclude_unordered() {
        let schema = DataSchema::new(
            SchemaId(2),
            None,
            vec![
                FieldSchema::new("z", FieldType::String).with_uniqueness_order(5),
                FieldSchema::new("free", FieldType::String),
                FieldSchema::new("y", FieldType::String).with_uniqueness_order(2),
            ],
        )
        .unwrap();
        assert_eq!(keys(schema.unique_fields()), vec!["y", "z"]);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let schema = DataSchema::new(
            SchemaId(3),
            None,
            vec![
                FieldSchema::new("first", FieldType::Int).with_uniqueness_order(0).with_position(4),
                FieldSchema::new("second", FieldType::Int).with_uniqueness_order(0).with_position(4),
            ],
        )
        .unwrap();
        assert_eq!(keys(schema.unique_fields()), vec!["first", "second"]);
        assert_eq!(keys(schema.fields()), vec!["first", "second"]);
    }

    #[test]
    fn test_unpositioned_fields_listed_last() {
        let schema = DataSchema::new(
            SchemaId(4),
            None,
            vec![
                FieldSchema::new("loose", FieldType::String),
                FieldSchema::new("second", FieldType::String).with_position(1),
                FieldSchema::new("first", FieldType::String).with_position(0),
            ],
        )
        .unwrap();
        assert_eq!(keys(schema.fields()), vec!["first", "second", "loose"]);
    }

    #[test]
    fn test_orderings_are_memoized() {
        let schema = schema_ab();
        assert!(std::ptr::eq(schema.fields().as_ptr(), schema.fields().as_ptr()));
        assert!(std::ptr::eq(
            schema.unique_fields().as_ptr(),
            schema.unique_fields().as_ptr()
        ));
    }

    #[test]
    fn test_duplicate_field_key_rejected() {
        let err = DataSchema::new(SchemaId(5), None, vec![field_a(), field_a()]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_field_type_parsing() {
        assert_eq!("DATETIME".parse::<FieldType>().unwrap(), FieldType::DateTime);
        assert!("BOOL".parse::<FieldType>().unwrap_err().is_configuration());
        assert_eq!(serde_json::to_value(FieldType::DateTime).unwrap(), json!("DATETIME"));
    }

    #[test]
    fn test_get_value_from_mapping_and_sequence() {
        let mapping = Record::from_json(json!({ "a": "5" })).unwrap();
        assert_eq!(field_a().get_value(&mapping).unwrap(), Value::Int(5));

        let sequence = Record::from_json(json!(["5", "x"])).unwrap();
        assert_eq!(field_a().get_value(&sequence).unwrap(), Value::Int(5));
        assert_eq!(field_b().get_value(&sequence).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_set_value_on_object_is_unconverted() {
        let mut obj = DynamicObject::new();
        field_a().set_value(&mut obj, "not an int").unwrap();
        assert_eq!(
            crate::record::Attributes::get_attr(&obj, "a"),
            Some(Value::from("not an int"))
        );
    }

    #[test]
    fn test_get_value_missing_slot() {
        let mapping = Record::from_json(json!({ "other": 1 })).unwrap();
        assert!(field_a().get_value(&mapping).unwrap_err().is_field_access());
    }

    #[test]
    fn test_unique_key_and_mapping() {
        let schema = schema_ab();
        let row = vec![Value::from("7"), Value::from("north")];
        assert_eq!(
            schema.unique_key(&row).unwrap(),
            vec![Value::from("north"), Value::Int(7)]
        );

        let mapping = schema.to_mapping(&row).unwrap();
        assert_eq!(mapping.get("a"), Some(&Value::Int(7)));
        assert_eq!(mapping.get("b"), Some(&Value::from("north")));
    }

    #[test]
    fn test_model_type_name() {
        let model = ModelType {
            id: ModelTypeId(9),
            app_label: "animals".into(),
            model: "weighin".into(),
        };
        let schema = DataSchema::new(SchemaId(6), Some(model), vec![]).unwrap();
        assert!(!schema.is_free_form());
        assert_eq!(schema.model_type.as_ref().unwrap().qualified_name(), "animals.weighin");
    }
}

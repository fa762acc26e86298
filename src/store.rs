//! Backing store for schema configuration
//!
//! Schemas are persisted as three tables: data schemas, their field schemas,
//! and the model types they reference. A [`SchemaStore`] serves each table in
//! one bulk fetch.
//!
//! ## Fixture layout
//!
//! ```text
//! schemas/
//! ├── animals.json
//! └── readings/
//!     └── sensors.json
//! ```
//!
//! Every file holds any subset of the tables:
//!
//! ```json
//! {
//!   "model_types": [{ "id": 1, "app_label": "animals", "model": "weighin" }],
//!   "data_schemas": [{ "id": 10, "model_type_id": 1 }],
//!   "field_schemas": [
//!     { "data_schema_id": 10, "field_key": "weight", "field_position": 0, "field_type": "FLOAT" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::schema::{FieldSchema, FieldType, ModelType, ModelTypeId, SchemaId};

/// Persisted data schema row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSchemaRow {
    pub id: SchemaId,
    #[serde(default)]
    pub model_type_id: Option<ModelTypeId>,
}

/// Persisted field schema row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchemaRow {
    pub data_schema_id: SchemaId,
    pub field_key: String,
    #[serde(default)]
    pub uniqueness_order: Option<i64>,
    #[serde(default)]
    pub field_position: Option<i64>,
    /// One of DATE, DATETIME, INT, FLOAT, STRING
    pub field_type: String,
    #[serde(default)]
    pub field_format: Option<String>,
}

impl FieldSchemaRow {
    /// Build the field this row configures
    pub fn to_field(&self) -> Result<FieldSchema> {
        let field_type: FieldType = self.field_type.parse().map_err(|_| {
            SchemaError::Configuration(format!(
                "field '{}' of schema {} has unsupported type '{}'",
                self.field_key, self.data_schema_id, self.field_type
            ))
        })?;

        Ok(FieldSchema {
            field_key: self.field_key.clone(),
            uniqueness_order: self.non_negative("uniqueness_order", self.uniqueness_order)?,
            field_position: self.non_negative("field_position", self.field_position)?,
            field_type,
            field_format: self.field_format.clone().filter(|f| !f.is_empty()),
        })
    }

    fn non_negative(&self, column: &str, value: Option<i64>) -> Result<Option<u32>> {
        value
            .map(|v| {
                u32::try_from(v).map_err(|_| {
                    SchemaError::Configuration(format!(
                        "field '{}' of schema {} has invalid {} {}",
                        self.field_key, self.data_schema_id, column, v
                    ))
                })
            })
            .transpose()
    }
}

/// Selects which schemas a bulk load returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFilter {
    /// Only these schema ids
    pub ids: Option<Vec<SchemaId>>,
    /// Only schemas describing this model type
    pub model_type: Option<ModelTypeId>,
    /// Only free-form (`true`) or only model-backed (`false`) schemas
    pub free_form: Option<bool>,
}

impl SchemaFilter {
    /// Match every schema
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(ids: impl IntoIterator<Item = SchemaId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn model_type(id: ModelTypeId) -> Self {
        Self {
            model_type: Some(id),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &DataSchemaRow) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&row.id) {
                return false;
            }
        }
        if let Some(model_type) = self.model_type {
            if row.model_type_id != Some(model_type) {
                return false;
            }
        }
        if let Some(free_form) = self.free_form {
            if row.model_type_id.is_none() != free_form {
                return false;
            }
        }
        true
    }
}

/// Bulk access to persisted schema configuration.
///
/// Each method is one round trip to the store.
pub trait SchemaStore {
    fn fetch_schemas(&self, filter: &SchemaFilter) -> Result<Vec<DataSchemaRow>>;

    /// Field rows belonging to any of `schema_ids`
    fn fetch_fields(&self, schema_ids: &[SchemaId]) -> Result<Vec<FieldSchemaRow>>;

    fn fetch_model_types(&self, ids: &[ModelTypeId]) -> Result<Vec<ModelType>>;
}

/// All three tables, as stored in a fixture file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub model_types: Vec<ModelType>,
    #[serde(default)]
    pub data_schemas: Vec<DataSchemaRow>,
    #[serde(default)]
    pub field_schemas: Vec<FieldSchemaRow>,
}

impl StoreDocument {
    /// Append another document's rows, rejecting duplicate identities
    pub fn merge(&mut self, other: StoreDocument) -> Result<()> {
        let mut schema_ids: HashSet<SchemaId> = self.data_schemas.iter().map(|r| r.id).collect();
        for row in &other.data_schemas {
            if !schema_ids.insert(row.id) {
                return Err(SchemaError::Configuration(format!(
                    "data schema {} is defined more than once",
                    row.id
                )));
            }
        }

        let mut model_ids: HashSet<ModelTypeId> = self.model_types.iter().map(|m| m.id).collect();
        for model in &other.model_types {
            if !model_ids.insert(model.id) {
                return Err(SchemaError::Configuration(format!(
                    "model type {} is defined more than once",
                    model.id
                )));
            }
        }

        self.model_types.extend(other.model_types);
        self.data_schemas.extend(other.data_schemas);
        self.field_schemas.extend(other.field_schemas);
        Ok(())
    }
}

/// In-memory store. Counts round trips so batching can be observed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: StoreDocument,
    round_trips: AtomicUsize,
}

impl MemoryStore {
    pub fn new(tables: StoreDocument) -> Self {
        Self {
            tables,
            round_trips: AtomicUsize::new(0),
        }
    }

    pub fn tables(&self) -> &StoreDocument {
        &self.tables
    }

    /// Number of fetches served so far
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }

    fn record_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }
}

impl SchemaStore for MemoryStore {
    fn fetch_schemas(&self, filter: &SchemaFilter) -> Result<Vec<DataSchemaRow>> {
        self.record_trip();
        let mut rows: Vec<_> = self
            .tables
            .data_schemas
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    fn fetch_fields(&self, schema_ids: &[SchemaId]) -> Result<Vec<FieldSchemaRow>> {
        self.record_trip();
        Ok(self
            .tables
            .field_schemas
            .iter()
            .filter(|row| schema_ids.contains(&row.data_schema_id))
            .cloned()
            .collect())
    }

    fn fetch_model_types(&self, ids: &[ModelTypeId]) -> Result<Vec<ModelType>> {
        self.record_trip();
        Ok(self
            .tables
            .model_types
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }
}

/// Store backed by a directory of JSON fixture files
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Read every `.json` file under `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_extension(root, "json")
    }

    /// Read every file with `extension` under `root`, in path order
    pub fn open_with_extension(root: impl AsRef<Path>, extension: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(SchemaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("schema store {} is not a directory", root.display()),
            )));
        }
        let mut tables = StoreDocument::default();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| SchemaError::Io(e.into()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e != extension).unwrap_or(true) {
                continue;
            }

            let content = fs::read_to_string(path)?;
            let document: StoreDocument = serde_json::from_str(&content)?;
            tables.merge(document).map_err(|e| match e {
                SchemaError::Configuration(msg) => {
                    SchemaError::Configuration(format!("{} ({})", msg, path.display()))
                }
                other => other,
            })?;
        }

        Ok(Self {
            root,
            inner: MemoryStore::new(tables),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn round_trips(&self) -> usize {
        self.inner.round_trips()
    }
}

impl SchemaStore for JsonFileStore {
    fn fetch_schemas(&self, filter: &SchemaFilter) -> Result<Vec<DataSchemaRow>> {
        self.inner.fetch_schemas(filter)
    }

    fn fetch_fields(&self, schema_ids: &[SchemaId]) -> Result<Vec<FieldSchemaRow>> {
        self.inner.fetch_fields(schema_ids)
    }

    fn fetch_model_types(&self, ids: &[ModelTypeId]) -> Result<Vec<ModelType>> {
        self.inner.fetch_model_types(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn row(field_type: &str) -> FieldSchemaRow {
        FieldSchemaRow {
            data_schema_id: SchemaId(1),
            field_key: "k".into(),
            uniqueness_order: None,
            field_position: Some(0),
            field_type: field_type.into(),
            field_format: None,
        }
    }

    #[test]
    fn test_row_to_field() {
        let field = row("INT").to_field().unwrap();
        assert_eq!(field.field_type, FieldType::Int);
        assert_eq!(field.field_position, Some(0));
    }

    #[test]
    fn test_unsupported_field_type() {
        let err = row("BOOL").to_field().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_negative_order_rejected() {
        let mut r = row("STRING");
        r.uniqueness_order = Some(-1);
        assert!(r.to_field().unwrap_err().is_configuration());
    }

    #[test]
    fn test_blank_format_is_none() {
        let mut r = row("DATE");
        r.field_format = Some(String::new());
        assert_eq!(r.to_field().unwrap().field_format, None);
    }

    #[test]
    fn test_filter_matching() {
        let free = DataSchemaRow { id: SchemaId(1), model_type_id: None };
        let backed = DataSchemaRow { id: SchemaId(2), model_type_id: Some(ModelTypeId(3)) };

        let filter = SchemaFilter { free_form: Some(true), ..SchemaFilter::all() };
        assert!(filter.matches(&free));
        assert!(!filter.matches(&backed));

        assert!(SchemaFilter::model_type(ModelTypeId(3)).matches(&backed));
        assert!(!SchemaFilter::ids([SchemaId(2)]).matches(&free));
    }

    #[test]
    fn test_json_file_store_merges_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("a.json"),
            json!({
                "model_types": [{ "id": 1, "app_label": "animals", "model": "weighin" }],
                "data_schemas": [{ "id": 10, "model_type_id": 1 }]
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("nested/b.json"),
            json!({
                "field_schemas": [
                    { "data_schema_id": 10, "field_key": "w", "field_type": "FLOAT" }
                ]
            })
            .to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = JsonFileStore::open(dir.path()).unwrap();
        let schemas = store.fetch_schemas(&SchemaFilter::all()).unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(store.fetch_fields(&[SchemaId(10)]).unwrap().len(), 1);
        assert_eq!(store.round_trips(), 2);
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = tempdir().unwrap();
        let err = JsonFileStore::open(dir.path().join("not-here")).unwrap_err();
        assert!(matches!(err, SchemaError::Io(_)));

        let file = dir.path().join("plain.json");
        fs::write(&file, "{}").unwrap();
        assert!(matches!(JsonFileStore::open(&file).unwrap_err(), SchemaError::Io(_)));
    }

    #[test]
    fn test_duplicate_schema_across_files() {
        let dir = tempdir().unwrap();
        let doc = json!({ "data_schemas": [{ "id": 1 }] }).to_string();
        fs::write(dir.path().join("a.json"), &doc).unwrap();
        fs::write(dir.path().join("b.json"), &doc).unwrap();

        let err = JsonFileStore::open(dir.path()).unwrap_err();
        assert!(err.is_configuration());
    }
}

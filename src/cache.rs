//! Schema cache
//!
//! Loads data schemas with their fields and model types attached. Every
//! load costs three store round trips no matter how many schemas or fields
//! it returns.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::{CacheConfig, ConvertConfig};
use crate::error::{Result, SchemaError};
use crate::schema::{DataSchema, FieldSchema, ModelType, ModelTypeId, SchemaId};
use crate::store::{SchemaFilter, SchemaStore};

/// Bulk loader for data schemas
pub struct SchemaCache<S> {
    store: S,
    cache: CacheConfig,
    convert: ConvertConfig,
    /// Schemas kept between calls when `cache.memoize` is set
    loaded: Mutex<HashMap<SchemaId, Arc<DataSchema>>>,
}

impl<S: SchemaStore> SchemaCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, CacheConfig::default(), ConvertConfig::default())
    }

    pub fn with_config(store: S, cache: CacheConfig, convert: ConvertConfig) -> Self {
        Self {
            store,
            cache,
            convert,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load one schema with its fields and model type
    pub fn load(&self, id: SchemaId) -> Result<Arc<DataSchema>> {
        if let Some(schema) = self.memoized().get(&id) {
            debug!(schema = %id, "schema served from cache");
            return Ok(Arc::clone(schema));
        }

        self.load_all(&SchemaFilter::ids([id]))?
            .into_iter()
            .next()
            .ok_or_else(|| SchemaError::NotFound(id.to_string()))
    }

    /// Load every schema matching `filter`, ordered by id
    pub fn load_all(&self, filter: &SchemaFilter) -> Result<Vec<Arc<DataSchema>>> {
        let rows = self.store.fetch_schemas(filter)?;
        let schema_ids: Vec<SchemaId> = rows.iter().map(|r| r.id).collect();
        debug!(count = rows.len(), "fetched data schema rows");

        let mut fields_by_schema: HashMap<SchemaId, Vec<FieldSchema>> = HashMap::new();
        for row in self.store.fetch_fields(&schema_ids)? {
            let mut field = row.to_field()?;
            if field.field_format.is_none() {
                field.field_format = self
                    .convert
                    .default_format(field.field_type)
                    .map(str::to_string);
            }
            fields_by_schema.entry(row.data_schema_id).or_default().push(field);
        }

        let model_type_ids: Vec<ModelTypeId> = rows
            .iter()
            .filter_map(|r| r.model_type_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let model_types: HashMap<ModelTypeId, ModelType> = self
            .store
            .fetch_model_types(&model_type_ids)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut schemas = Vec::with_capacity(rows.len());
        for row in rows {
            let model_type = match row.model_type_id {
                Some(model_id) => match model_types.get(&model_id) {
                    Some(model) => Some(model.clone()),
                    None => {
                        warn!(schema = %row.id, model_type = %model_id, "dangling model type reference");
                        return Err(SchemaError::Configuration(format!(
                            "schema {} references unknown model type {}",
                            row.id, model_id
                        )));
                    }
                },
                None => None,
            };

            let fields = fields_by_schema.remove(&row.id).unwrap_or_default();
            let schema = Arc::new(DataSchema::new(row.id, model_type, fields)?);
            debug!(schema = %row.id, fields = schema.len(), "loaded data schema");
            schemas.push(schema);
        }

        if self.cache.memoize {
            let mut loaded = self.memoized();
            for schema in &schemas {
                loaded.insert(schema.id, Arc::clone(schema));
            }
        }

        Ok(schemas)
    }

    /// Drop a memoized schema so the next load reads the store again
    pub fn invalidate(&self, id: SchemaId) {
        self.memoized().remove(&id);
    }

    pub fn clear(&self) {
        self.memoized().clear();
    }

    // Entries are immutable Arcs, so a poisoned lock still holds valid data.
    fn memoized(&self) -> MutexGuard<'_, HashMap<SchemaId, Arc<DataSchema>>> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

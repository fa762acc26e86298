//! Data Schemas
//!
//! Typed field schemas for tagging, converting and validating structured
//! records. A record is either backed by a model type or is free-form data
//! (a mapping, or a sequence of positional values).
//!
//! ## Features
//!
//! - **Typed Fields**: DATE, DATETIME, INT, FLOAT and STRING fields with
//!   optional parse formats
//! - **Uniqueness Keys**: an ordered subset of fields identifies a record
//! - **Record Shapes**: one field definition reads sequences, mappings and
//!   attribute objects alike
//! - **Bulk Loading**: schemas arrive with their fields and model types in a
//!   fixed number of store round trips
//!
//! ## Architecture
//!
//! ```text
//! SchemaStore ──► SchemaCache ──► DataSchema ──► FieldSchema ──► convert_value
//!   (rows)        (bulk load)     (orderings)    (slot access)   (typing)
//! ```

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod record;
pub mod schema;
pub mod store;
pub mod value;

pub use cache::SchemaCache;
pub use config::DataSchemaConfig;
pub use convert::convert_value;
pub use error::{Result, SchemaError};
pub use record::{Attributes, DynamicObject, Record, RecordShape};
pub use schema::{DataSchema, FieldSchema, FieldType, ModelType, ModelTypeId, SchemaId};
pub use store::{JsonFileStore, MemoryStore, SchemaFilter, SchemaStore};
pub use value::Value;

//! Schema registry and structural validation.

pub mod format;
pub mod infer;
pub mod registry;

pub use format::{RangeSource, SCHEMA_VIOLATION, format_errors, locate};
pub use infer::infer_type;
pub use registry::{
    LOCAL_SCHEMA_IDS, RawSchemaError, Schema, SchemaRegistry, StructuralReport, fallback_schema,
    schema_file_name,
};

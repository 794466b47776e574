//! Field-mapping transformer from ERP product payloads to the canonical model.
//!
//! Incoming payloads pass through the sanitizer before mapping; tenant
//! supplied `calculation` and `conditional` logic runs only through the
//! sandboxed expression evaluator.

mod config;
mod convert;
mod document;
mod error;
mod mapper;
mod transform;

pub use config::TransformConfig;
pub use document::{FieldRule, FieldType, MappingDocument, Mappings, Transformation};
pub use error::MappingError;
pub use mapper::{
    validate_canonical_product, BatchOutcome, FieldMapper, TransformedProduct,
    REQUIRED_CANONICAL_FIELDS,
};

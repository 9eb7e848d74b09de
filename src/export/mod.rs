//! Model archive export and loading
//!
//! Fitted pipelines are persisted as a single self-describing, versioned,
//! checksummed archive.

mod serializer;

pub use serializer::{
    from_archive_bytes, load_model, load_model_for_schema, save_model, to_archive_bytes,
    ModelArchive, ModelMetadata,
};

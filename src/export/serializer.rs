//! Model archive serialization
//!
//! An archive is a bincode-encoded [`ModelArchive`]: magic bytes, format
//! version, metadata, the bincode payload of the [`FittedPipeline`], and an
//! xxh3 checksum over that payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{ClassifierError, Result};
use crate::pipeline::FittedPipeline;
use crate::schema::{RecordSchema, TaskKind};
use crate::training::MetricsReport;

/// Archive metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Version of this crate that wrote the archive
    pub crate_version: String,
    pub schema: RecordSchema,
    pub schema_fingerprint: u64,
    pub task: TaskKind,
    pub feature_dim: usize,
    /// Category values in key order; empty for boolean labels
    pub labels: Vec<String>,
    /// Held-out metrics, when the model was evaluated before saving
    pub metrics: Option<MetricsReport>,
}

impl ModelMetadata {
    pub fn describe(model: &FittedPipeline) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            schema: model.schema().clone(),
            schema_fingerprint: model.schema().fingerprint(),
            task: model.task(),
            feature_dim: model.feature_dim(),
            labels: model
                .label_mapping()
                .map(|m| m.values().to_vec())
                .unwrap_or_default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<MetricsReport>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// On-disk archive layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArchive {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// bincode-encoded fitted pipeline
    pub payload: Vec<u8>,
    /// xxh3 of `payload`
    pub checksum: u64,
}

impl ModelArchive {
    pub const MAGIC: [u8; 4] = *b"TXPM";
    pub const VERSION: u32 = 1;

    pub fn new(model: &FittedPipeline, metadata: ModelMetadata) -> Result<Self> {
        let payload = bincode::serialize(model)?;
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            checksum: xxh3_64(&payload),
            payload,
        })
    }

    pub fn verify_checksum(&self) -> bool {
        xxh3_64(&self.payload) == self.checksum
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and verify magic, version and checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // bincode writes the fixed-size magic and the u32 version first
        if bytes.len() < 8 {
            return Err(ClassifierError::SerializationError(
                "archive is truncated".into(),
            ));
        }
        if bytes[..4] != Self::MAGIC {
            return Err(ClassifierError::SerializationError(
                "not a model archive (bad magic bytes)".into(),
            ));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != Self::VERSION {
            return Err(ClassifierError::SerializationError(format!(
                "unsupported archive format version {} (expected {})",
                version,
                Self::VERSION
            )));
        }

        let archive: Self = bincode::deserialize(bytes)
            .map_err(|e| ClassifierError::SerializationError(format!("corrupt archive: {}", e)))?;
        if !archive.verify_checksum() {
            return Err(ClassifierError::SerializationError(
                "checksum verification failed; archive may be corrupted".into(),
            ));
        }
        Ok(archive)
    }

    /// Decode the payload and check it against the metadata's schema
    pub fn into_model(self) -> Result<(FittedPipeline, ModelMetadata)> {
        let model: FittedPipeline = bincode::deserialize(&self.payload)
            .map_err(|e| ClassifierError::SerializationError(format!("corrupt payload: {}", e)))?;
        if model.schema().fingerprint() != self.metadata.schema_fingerprint {
            return Err(ClassifierError::SerializationError(
                "payload schema does not match archive metadata".into(),
            ));
        }
        Ok((model, self.metadata))
    }
}

/// Encode a fitted pipeline as archive bytes
pub fn to_archive_bytes(model: &FittedPipeline, metrics: Option<MetricsReport>) -> Result<Vec<u8>> {
    let metadata = ModelMetadata::describe(model).with_metrics(metrics);
    ModelArchive::new(model, metadata)?.to_bytes()
}

/// Decode archive bytes into a fitted pipeline
pub fn from_archive_bytes(bytes: &[u8]) -> Result<(FittedPipeline, ModelMetadata)> {
    ModelArchive::from_bytes(bytes)?.into_model()
}

/// Save a fitted pipeline to `path`
pub fn save_model(
    model: &FittedPipeline,
    path: impl AsRef<Path>,
    metrics: Option<MetricsReport>,
) -> Result<ModelMetadata> {
    let metadata = ModelMetadata::describe(model).with_metrics(metrics);
    let bytes = ModelArchive::new(model, metadata.clone())?.to_bytes()?;

    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!(
        path = %path.as_ref().display(),
        model_id = %metadata.model_id,
        bytes = bytes.len(),
        "model saved"
    );
    Ok(metadata)
}

/// Load a fitted pipeline from `path`
pub fn load_model(path: impl AsRef<Path>) -> Result<(FittedPipeline, ModelMetadata)> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let (model, metadata) = from_archive_bytes(&bytes)?;
    info!(
        path = %path.as_ref().display(),
        model_id = %metadata.model_id,
        task = %metadata.task,
        "model loaded"
    );
    Ok((model, metadata))
}

/// Load a fitted pipeline, rejecting archives fitted against a different schema
pub fn load_model_for_schema(
    path: impl AsRef<Path>,
    schema: &RecordSchema,
) -> Result<(FittedPipeline, ModelMetadata)> {
    let (model, metadata) = load_model(path)?;
    if metadata.schema_fingerprint != schema.fingerprint() {
        return Err(ClassifierError::SerializationError(format!(
            "archive was fitted for schema '{}', not '{}'",
            metadata.schema.name(),
            schema.name()
        )));
    }
    Ok((model, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_and_foreign_bytes() {
        assert!(matches!(
            ModelArchive::from_bytes(&[1, 2, 3]),
            Err(ClassifierError::SerializationError(_))
        ));
        assert!(matches!(
            ModelArchive::from_bytes(b"ABCD\x01\x00\x00\x00rest"),
            Err(ClassifierError::SerializationError(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = ModelArchive::MAGIC.to_vec();
        bytes.extend_from_slice(&99u32.to_le_bytes());
        let err = ModelArchive::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }
}

//! Prediction engine module
//!
//! Applies a fitted pipeline to unlabelled rows, one at a time or in
//! batches. Batches keep input order and isolate per-row failures.

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::{predict_record, predict_records, BatchPredictions, InferenceStats, Prediction, PredictionEngine};

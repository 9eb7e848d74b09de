//! textclass - text classification pipelines
//!
//! Trains, evaluates, persists and serves supervised text classifiers over
//! two problem shapes: binary sentiment and multi-class issue labelling.
//! A pipeline is a fixed sequence of deterministic transforms (label
//! encoding, text featurization, concatenation) ending in a trained
//! classifier; evaluation and prediction reuse that exact chain.
//!
//! # Modules
//!
//! ## Data
//! - [`schema`] - Record schemas, typed field values and task presets
//! - [`data`] - Column-oriented frames that flow between stages
//! - [`utils`] - Delimited file loading
//!
//! ## Pipeline
//! - [`feature_engineering`] - Tokenizer, n-grams, vocabulary and hashed featurizers
//! - [`preprocessing`] - Label encoding and key-to-value mapping
//! - [`pipeline`] - Pipeline assembly and fitted pipelines
//!
//! ## Learning
//! - [`training`] - Estimators, splitting, metrics, trainer and evaluator
//! - [`calibration`] - Platt scaling for boosted-tree scores
//!
//! ## Serving
//! - [`inference`] - Single and batch prediction
//! - [`export`] - Versioned model archives
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use textclass::prelude::*;
//!
//! # fn main() -> textclass::Result<()> {
//! let schema = RecordSchema::sentiment();
//! let (train, test) = textclass::load_and_split(
//!     "yelp_labelled.txt",
//!     &schema,
//!     &LoadOptions::sentiment(),
//!     &SplitConfig::default(),
//! )?;
//! let spec = textclass::build_pipeline(&schema, &PipelineConfig::sentiment())?;
//! let model = textclass::fit(&spec, &train)?;
//! println!("{}", textclass::evaluate(&model, &test)?);
//!
//! let row = schema.record().text("SentimentText", "This was a very bad steak").build()?;
//! println!("{:?}", textclass::predict(&model, &row)?);
//! textclass::save(&model, "sentiment.model")?;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod schema;
pub mod utils;

// Pipeline
pub mod feature_engineering;
pub mod pipeline;
pub mod preprocessing;

// Learning
pub mod calibration;
pub mod training;

// Serving
pub mod cli;
pub mod export;
pub mod inference;

use std::path::Path;

pub use error::{ClassifierError, Result};
pub use pipeline::build_pipeline;

use inference::{BatchPredictions, InferenceConfig, Prediction};
use pipeline::{FittedPipeline, PipelineSpec, DEFAULT_THRESHOLD};
use schema::{Record, RecordSchema};
use training::{Evaluator, MetricsReport, SplitConfig, Trainer};
use utils::LoadOptions;

/// Load a delimited file and split it into train and test rows
pub fn load_and_split(
    path: impl AsRef<Path>,
    schema: &RecordSchema,
    options: &LoadOptions,
    split: &SplitConfig,
) -> Result<(Vec<Record>, Vec<Record>)> {
    let records = utils::load_records(path, schema, options)?;
    training::train_test_split(&records, split)
}

/// Fit an unfit pipeline on training rows
pub fn fit(spec: &PipelineSpec, train: &[Record]) -> Result<FittedPipeline> {
    Trainer::new().fit(spec, train)
}

/// Evaluate a fitted pipeline on labelled rows
pub fn evaluate(model: &FittedPipeline, test: &[Record]) -> Result<MetricsReport> {
    Evaluator::new().evaluate(model, test)
}

/// Predict a single row
pub fn predict(model: &FittedPipeline, row: &Record) -> Result<Prediction> {
    inference::predict_record(model, row, DEFAULT_THRESHOLD)
}

/// Predict many rows, isolating per-row failures
pub fn predict_batch(model: &FittedPipeline, rows: &[Record]) -> BatchPredictions {
    inference::predict_records(model, rows, &InferenceConfig::default())
}

/// Save a fitted pipeline as a model archive
pub fn save(model: &FittedPipeline, path: impl AsRef<Path>) -> Result<()> {
    export::save_model(model, path, None).map(|_| ())
}

/// Load a fitted pipeline from a model archive
pub fn load(path: impl AsRef<Path>) -> Result<FittedPipeline> {
    export::load_model(path).map(|(model, _)| model)
}

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ClassifierError, Result};

    // Schema and data
    pub use crate::data::{Column, Frame, LabelPolicy};
    pub use crate::schema::{FieldSpec, FieldType, FieldValue, Record, RecordSchema, TaskKind};
    pub use crate::utils::{DataLoader, LoadOptions};

    // Featurization
    pub use crate::feature_engineering::{FeaturizerConfig, FeaturizerKind, SparseVector, TextTokenizer};

    // Pipeline
    pub use crate::pipeline::{build_pipeline, FittedPipeline, PipelineConfig, PipelineSpec};

    // Training
    pub use crate::training::{
        cross_validate, EstimatorConfig, Evaluator, GradientBoostingConfig, MetricsReport, SgdConfig,
        SplitConfig, Trainer,
    };

    // Inference
    pub use crate::inference::{BatchPredictions, InferenceConfig, Prediction, PredictionEngine};

    // Export
    pub use crate::export::{load_model, load_model_for_schema, save_model, ModelMetadata};
}

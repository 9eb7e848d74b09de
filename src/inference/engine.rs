//! Prediction engine implementation
//!
//! The engine holds an `Arc`-shared fitted pipeline and never mutates it.
//! Every call builds its own frame, so concurrent callers do not share any
//! scratch state.

use super::InferenceConfig;
use crate::data::{Frame, LabelPolicy};
use crate::error::{ClassifierError, Result};
use crate::pipeline::{FittedPipeline, PREDICTED_KEY, PREDICTED_LABEL, PROBABILITY, SCORE, SCORES};
use crate::schema::{Record, TaskKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A single row's prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Prediction {
    Binary {
        label: bool,
        /// Calibrated probability of the positive class
        probability: f64,
        /// Raw margin
        score: f64,
    },
    MultiClass {
        /// Predicted category, as it appeared in the training rows
        label: String,
        key: u32,
        /// Probability per class, in key order
        scores: Vec<f64>,
        /// Probability of the predicted class
        confidence: f64,
    },
}

impl Prediction {
    /// Human-readable predicted label
    pub fn label_text(&self) -> String {
        match self {
            Prediction::Binary { label, .. } => label.to_string(),
            Prediction::MultiClass { label, .. } => label.clone(),
        }
    }
}

/// Batch output: one result per input row, in input order
#[derive(Debug)]
pub struct BatchPredictions {
    results: Vec<Result<Prediction>>,
}

impl BatchPredictions {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[Result<Prediction>] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &Result<Prediction>> {
        self.results.iter()
    }

    /// Rows that failed, with their 0-based positions
    pub fn failures(&self) -> Vec<(usize, &ClassifierError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn into_results(self) -> Vec<Result<Prediction>> {
        self.results
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub error_count: u64,
}

#[derive(Debug, Default)]
struct Counters {
    predictions: AtomicU64,
    errors: AtomicU64,
}

/// Reusable prediction engine over a fitted pipeline
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    model: Arc<FittedPipeline>,
    config: InferenceConfig,
    counters: Arc<Counters>,
}

impl PredictionEngine {
    pub fn new(model: Arc<FittedPipeline>, config: InferenceConfig) -> Self {
        Self {
            model,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn from_pipeline(model: FittedPipeline) -> Self {
        Self::new(Arc::new(model), InferenceConfig::default())
    }

    pub fn model(&self) -> &Arc<FittedPipeline> {
        &self.model
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Predict one row; its label field, if any, is ignored
    pub fn predict_one(&self, record: &Record) -> Result<Prediction> {
        let result = predict_record(&self.model, record, self.config.classification_threshold);
        if self.config.track_stats {
            self.counters.predictions.fetch_add(1, Ordering::Relaxed);
            if result.is_err() {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Predict each row independently. A failing row yields an `Err` in its
    /// slot and does not affect the others.
    pub fn predict_batch(&self, records: &[Record]) -> BatchPredictions {
        run_batch(records, self.config.parallel, |r| self.predict_one(r))
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_predictions: self.counters.predictions.load(Ordering::Relaxed),
            error_count: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}

/// Predict one row through a fitted pipeline. Binary rows are labelled
/// positive when the calibrated probability reaches `threshold`.
pub fn predict_record(model: &FittedPipeline, record: &Record, threshold: f64) -> Result<Prediction> {
    let frame = Frame::from_records(model.schema(), std::slice::from_ref(record), LabelPolicy::Ignore)?;
    let frame = model.transform(frame)?;

    match model.task() {
        TaskKind::Binary => {
            let probability = first(frame.scalars(PROBABILITY)?)?;
            let score = first(frame.scalars(SCORE)?)?;
            Ok(Prediction::Binary {
                label: probability >= threshold,
                probability,
                score,
            })
        }
        TaskKind::MultiClass => {
            let key = first(frame.keys(PREDICTED_KEY)?)?
                .ok_or_else(|| ClassifierError::UnknownLabel("no predicted key".into()))?;
            let scores = first(frame.scores(SCORES)?)?;
            let label = first(frame.categories(PREDICTED_LABEL)?)?;
            let confidence = scores.get(key as usize).copied().unwrap_or(0.0);
            Ok(Prediction::MultiClass {
                label,
                key,
                scores,
                confidence,
            })
        }
    }
}

/// Batch prediction against a borrowed pipeline, without an engine or stats
pub fn predict_records(model: &FittedPipeline, records: &[Record], config: &InferenceConfig) -> BatchPredictions {
    run_batch(records, config.parallel, |r| {
        predict_record(model, r, config.classification_threshold)
    })
}

fn run_batch<F>(records: &[Record], parallel: bool, predict: F) -> BatchPredictions
where
    F: Fn(&Record) -> Result<Prediction> + Sync,
{
    let results: Vec<Result<Prediction>> = if parallel {
        records.par_iter().map(&predict).collect()
    } else {
        records.iter().map(&predict).collect()
    };

    for (row, result) in results.iter().enumerate() {
        if let Err(e) = result {
            warn!(row, error = %e, "prediction failed for row");
        }
    }
    BatchPredictions { results }
}

fn first<T: Clone>(values: &[T]) -> Result<T> {
    values.first().cloned().ok_or_else(|| ClassifierError::ShapeError {
        expected: "1 row".into(),
        actual: "0 rows".into(),
    })
}

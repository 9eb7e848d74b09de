//! Training and evaluation engine

use super::cross_validation::KFold;
use super::metrics::{BinaryMetrics, MetricsReport, MultiClassMetrics};
use crate::data::{Frame, LabelPolicy};
use crate::error::{ClassifierError, Result};
use crate::pipeline::{
    FittedPipeline, PipelineSpec, DEFAULT_THRESHOLD, LABEL_KEY, PREDICTED_KEY, PROBABILITY, SCORES,
};
use crate::schema::{Record, TaskKind};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fits unfit pipelines on training rows
#[derive(Debug, Clone, Default)]
pub struct Trainer;

impl Trainer {
    pub fn new() -> Self {
        Self
    }

    /// Fit every stage in declared order; each stage sees the previous
    /// stages' outputs on the same training rows.
    pub fn fit(&self, spec: &PipelineSpec, rows: &[Record]) -> Result<FittedPipeline> {
        if rows.is_empty() {
            return Err(ClassifierError::training("trainer", "no training rows"));
        }
        let start = Instant::now();
        let mut frame = Frame::from_records(spec.schema(), rows, LabelPolicy::Required)?;
        let mut fitted = Vec::with_capacity(spec.stages().len());

        for stage in spec.stages() {
            let stage_start = Instant::now();
            let fitted_stage = stage.fit(&frame, &fitted).map_err(|e| {
                warn!(stage = stage.name(), error = %e, "stage fit failed");
                e
            })?;
            fitted_stage.transform(&mut frame)?;
            debug!(
                stage = stage.name(),
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "stage fitted"
            );
            fitted.push(fitted_stage);
        }

        let model = FittedPipeline::new(spec.schema().clone(), fitted);
        info!(
            rows = rows.len(),
            task = %model.task(),
            features = model.feature_dim(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline fitted"
        );
        Ok(model)
    }
}

/// Scores fitted pipelines on held-out rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluator {
    /// `k` for multi-class top-k accuracy
    pub top_k: usize,
    /// Probability threshold for binary predictions
    pub threshold: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Transform labelled rows through the frozen pipeline and aggregate metrics
    pub fn evaluate(&self, model: &FittedPipeline, rows: &[Record]) -> Result<MetricsReport> {
        if rows.is_empty() {
            return Err(ClassifierError::InvalidInput("no rows to evaluate".into()));
        }
        let frame = model.transform_records(rows, LabelPolicy::Required)?;
        let truth = frame.keys(LABEL_KEY)?;

        let report = match model.task() {
            TaskKind::Binary => {
                let probabilities = frame.scalars(PROBABILITY)?;
                let y_true: Vec<bool> = truth.iter().map(|k| *k == Some(1)).collect();
                let y_pred: Vec<bool> = probabilities.iter().map(|&p| p >= self.threshold).collect();
                MetricsReport::Binary(BinaryMetrics::compute(&y_true, probabilities, &y_pred))
            }
            TaskKind::MultiClass => {
                let scores = frame.scores(SCORES)?;
                let predicted: Vec<u32> = frame
                    .keys(PREDICTED_KEY)?
                    .iter()
                    .map(|k| k.unwrap_or(0))
                    .collect();
                let class_names = model
                    .label_mapping()
                    .map(|m| m.values().to_vec())
                    .unwrap_or_default();
                let metrics = MultiClassMetrics::compute(truth, scores, &predicted, class_names, self.top_k);
                if metrics.unknown_label_rows > 0 {
                    warn!(
                        rows = metrics.unknown_label_rows,
                        "evaluation rows carry labels unseen during training; counted as incorrect"
                    );
                }
                MetricsReport::MultiClass(metrics)
            }
        };

        info!(rows = rows.len(), metrics = %report, "evaluation complete");
        Ok(report)
    }
}

/// Per-fold metrics from k-fold cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_reports: Vec<MetricsReport>,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
}

/// Fit and evaluate on each of `n_folds` folds. Each fold's featurizers and
/// label mapping are learned from that fold's training part only.
pub fn cross_validate(
    spec: &PipelineSpec,
    rows: &[Record],
    n_folds: usize,
    seed: Option<u64>,
) -> Result<CrossValidationResult> {
    let splits = KFold::new(n_folds).with_random_state(seed).split(rows.len())?;
    let trainer = Trainer::new();
    let evaluator = Evaluator::new();

    let mut fold_reports = Vec::with_capacity(splits.len());
    for split in &splits {
        let train: Vec<Record> = split.train_indices.iter().map(|&i| rows[i].clone()).collect();
        let test: Vec<Record> = split.test_indices.iter().map(|&i| rows[i].clone()).collect();
        let model = trainer.fit(spec, &train)?;
        let report = evaluator.evaluate(&model, &test)?;
        debug!(fold = split.fold_idx, accuracy = report.accuracy(), "fold evaluated");
        fold_reports.push(report);
    }

    let accuracies: Vec<f64> = fold_reports.iter().map(|r| r.accuracy()).collect();
    let n = accuracies.len() as f64;
    let mean_accuracy = accuracies.iter().sum::<f64>() / n;
    let std_accuracy = (accuracies.iter().map(|a| (a - mean_accuracy).powi(2)).sum::<f64>() / n).sqrt();

    Ok(CrossValidationResult {
        fold_reports,
        mean_accuracy,
        std_accuracy,
    })
}

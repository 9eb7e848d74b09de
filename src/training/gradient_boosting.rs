//! Gradient Boosting implementation
//!
//! Binary classifier built from leaf-wise regression trees on logistic loss.
//! Each round fits a tree to the loss gradients and hessians and adds its
//! Newton leaf values, shrunk by the learning rate, to the raw margin.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::{RegressionTree, TreeParams};
use crate::error::{ClassifierError, Result};
use crate::feature_engineering::SparseVector;

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum leaves per tree
    pub max_leaves: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// L2 regularization
    pub reg_lambda: f64,
    /// Minimum gain required to split a leaf
    pub min_split_gain: f64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.2,
            max_leaves: 20,
            min_samples_leaf: 10,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
        }
    }
}

impl GradientBoostingConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_leaves(mut self, n: usize) -> Self {
        self.max_leaves = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", self.n_estimators, "must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid("learning_rate", self.learning_rate, "must be a positive number"));
        }
        if self.max_leaves < 2 {
            return Err(invalid("max_leaves", self.max_leaves, "must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", self.min_samples_leaf, "must be positive"));
        }
        if self.reg_lambda < 0.0 {
            return Err(invalid("reg_lambda", self.reg_lambda, "must be non-negative"));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_leaves: self.max_leaves,
            min_samples_leaf: self.min_samples_leaf,
            reg_lambda: self.reg_lambda,
            min_split_gain: self.min_split_gain,
        }
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> ClassifierError {
    ClassifierError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Fitted gradient-boosted binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    learning_rate: f64,
    initial_log_odds: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingClassifier {
    /// Fit binary classification
    pub fn fit(config: &GradientBoostingConfig, x: &[SparseVector], y: &[bool]) -> Result<Self> {
        config.validate()?;
        let n_samples = x.len();
        if n_samples != y.len() {
            return Err(ClassifierError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        let n_pos = y.iter().filter(|&&v| v).count();
        if n_pos == 0 || n_pos == n_samples {
            return Err(ClassifierError::training(
                "gradient_boosting",
                "training labels contain a single class",
            ));
        }

        let p = n_pos as f64 / n_samples as f64;
        let initial_log_odds = (p / (1.0 - p)).ln();
        let targets: Vec<f64> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        let mut raw = Array1::from_elem(n_samples, initial_log_odds);

        let indices: Vec<usize> = (0..n_samples).collect();
        let params = config.tree_params();
        let mut trees = Vec::with_capacity(config.n_estimators);

        for round in 0..config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let gradients: Vec<f64> = probs.iter().zip(&targets).map(|(&p, &t)| p - t).collect();
            let hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let tree = RegressionTree::fit(x, &gradients, &hessians, &indices, &params);
            for (i, row) in x.iter().enumerate() {
                raw[i] += config.learning_rate * tree.predict(row);
            }
            if raw.iter().any(|r| !r.is_finite()) {
                return Err(ClassifierError::ConvergenceError { iterations: round + 1 });
            }
            debug!(
                round,
                leaves = tree.n_leaves(),
                log_loss = log_loss(&raw, &targets),
                "boosting round"
            );
            trees.push(tree);
        }

        Ok(Self {
            learning_rate: config.learning_rate,
            initial_log_odds,
            trees,
        })
    }

    /// Raw margin (log-odds scale)
    pub fn decision_function(&self, x: &SparseVector) -> f64 {
        self.initial_log_odds
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(x))
                .sum::<f64>()
    }

    pub fn decision_function_batch(&self, x: &[SparseVector]) -> Array1<f64> {
        x.iter().map(|row| self.decision_function(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn log_loss(raw: &Array1<f64>, targets: &[f64]) -> f64 {
    let n = targets.len().max(1) as f64;
    raw.iter()
        .zip(targets)
        .map(|(&r, &t)| {
            let p = sigmoid(r).clamp(1e-15, 1.0 - 1e-15);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

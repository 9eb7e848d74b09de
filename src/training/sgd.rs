//! Multinomial logistic (softmax) regression trained by SGD
//!
//! Processes one sample at a time over sparse inputs. L2 decay is applied
//! through a global weight scale so an update only touches the sample's
//! stored entries.

use crate::error::{ClassifierError, Result};
use crate::feature_engineering::SparseVector;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    Constant,
    Optimal,    // 1 / (alpha * (t + t0))
    InvScaling, // eta0 / t^power_t
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    pub learning_rate: LearningRateSchedule,
    pub eta0: f64,
    pub alpha: f64, // L2 regularization
    pub max_iter: usize,
    pub tol: f64,
    pub power_t: f64,
    pub random_state: Option<u64>,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            learning_rate: LearningRateSchedule::InvScaling,
            eta0: 0.5,
            alpha: 1e-4,
            max_iter: 30,
            tol: 1e-4,
            power_t: 0.25,
            random_state: Some(42),
        }
    }
}

impl SgdConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_eta0(mut self, eta0: f64) -> Self {
        self.eta0 = eta0;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(ClassifierError::InvalidParameter {
                name: "max_iter".into(),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if !(self.eta0 > 0.0 && self.eta0.is_finite()) {
            return Err(ClassifierError::InvalidParameter {
                name: "eta0".into(),
                value: self.eta0.to_string(),
                reason: "must be a positive number".into(),
            });
        }
        if self.alpha < 0.0 {
            return Err(ClassifierError::InvalidParameter {
                name: "alpha".into(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".into(),
            });
        }
        Ok(())
    }
}

fn get_lr(config: &SgdConfig, t: usize) -> f64 {
    match config.learning_rate {
        LearningRateSchedule::Constant => config.eta0,
        LearningRateSchedule::Optimal => {
            let alpha = config.alpha.max(1e-12);
            let t0 = 1.0 / (alpha * config.eta0);
            1.0 / (alpha * (t as f64 + t0))
        }
        LearningRateSchedule::InvScaling => config.eta0 / (t as f64).powf(config.power_t),
    }
}

/// Numerically stable softmax in place
fn softmax(z: &mut [f64]) {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in z.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in z.iter_mut() {
        *v /= sum;
    }
}

/// Fitted softmax regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// `n_classes x n_features`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl SoftmaxRegression {
    /// Fit on keys `0..n_classes`
    pub fn fit(config: &SgdConfig, x: &[SparseVector], y: &[u32], n_classes: usize) -> Result<Self> {
        config.validate()?;
        let n = x.len();
        if n != y.len() {
            return Err(ClassifierError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", y.len()),
            });
        }
        if let Some(&bad) = y.iter().find(|&&k| k as usize >= n_classes) {
            return Err(ClassifierError::training(
                "softmax",
                format!("label key {} outside 0..{}", bad, n_classes),
            ));
        }
        let mut seen = vec![false; n_classes];
        for &k in y {
            seen[k as usize] = true;
        }
        if seen.iter().filter(|&&s| s).count() < 2 {
            return Err(ClassifierError::training(
                "softmax",
                "training labels contain a single class",
            ));
        }

        let p = x.first().map(|v| v.dim()).unwrap_or(0);
        let mut w: Array2<f64> = Array2::zeros((n_classes, p));
        let mut b: Array1<f64> = Array1::zeros(n_classes);
        let mut scale = 1.0;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state.unwrap_or(42));
        let mut indices: Vec<usize> = (0..n).collect();
        let mut z = vec![0.0; n_classes];
        let mut prev_loss = f64::MAX;
        let mut t = 1usize;

        for epoch in 0..config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for &i in &indices {
                let xi = &x[i];
                let yi = y[i] as usize;
                for (c, zc) in z.iter_mut().enumerate() {
                    *zc = scale * xi.dot(&w.row(c)) + b[c];
                }
                softmax(&mut z);
                epoch_loss -= z[yi].max(1e-15).ln();

                let lr = get_lr(config, t);
                scale *= (1.0 - lr * config.alpha).max(0.0);
                if scale < 1e-9 {
                    w *= scale;
                    scale = 1.0;
                }
                for (c, &pc) in z.iter().enumerate() {
                    let grad = pc - if c == yi { 1.0 } else { 0.0 };
                    if grad == 0.0 {
                        continue;
                    }
                    let step = lr * grad / scale;
                    for (j, v) in xi.iter() {
                        w[[c, j as usize]] -= step * v;
                    }
                    b[c] -= lr * grad;
                }
                t += 1;
            }

            epoch_loss /= n as f64;
            if !epoch_loss.is_finite() {
                return Err(ClassifierError::ConvergenceError { iterations: epoch + 1 });
            }
            debug!(epoch, loss = epoch_loss, "softmax epoch");

            if (prev_loss - epoch_loss).abs() < config.tol && epoch > 0 {
                break;
            }
            prev_loss = epoch_loss;
        }

        w *= scale;
        if w.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(ClassifierError::ConvergenceError { iterations: config.max_iter });
        }

        Ok(Self { weights: w, bias: b })
    }

    pub fn n_classes(&self) -> usize {
        self.bias.len()
    }

    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    /// Per-class probabilities
    pub fn predict_proba(&self, x: &SparseVector) -> Vec<f64> {
        let mut z: Vec<f64> = (0..self.n_classes())
            .map(|c| x.dot(&self.weights.row(c)) + self.bias[c])
            .collect();
        softmax(&mut z);
        z
    }

    /// Arg-max key; ties go to the lower key
    pub fn predict(&self, x: &SparseVector) -> u32 {
        argmax(&self.predict_proba(x))
    }
}

pub(crate) fn argmax(values: &[f64]) -> u32 {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data() -> (Vec<SparseVector>, Vec<u32>) {
        let x = (0..90)
            .map(|i| SparseVector::from_pairs(6, vec![((i % 3) as u32 * 2, 1.0), (5, 0.3)]).unwrap())
            .collect();
        let y = (0..90).map(|i| (i % 3) as u32).collect();
        (x, y)
    }

    #[test]
    fn test_softmax_regression_learns() {
        let (x, y) = make_data();
        let model = SoftmaxRegression::fit(&SgdConfig::default(), &x, &y, 3).unwrap();
        assert_eq!(model.n_classes(), 3);
        let correct = x.iter().zip(&y).filter(|&(xi, &yi)| model.predict(xi) == yi).count();
        assert_eq!(correct, y.len());

        let proba = model.predict_proba(&x[0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = make_data();
        let a = SoftmaxRegression::fit(&SgdConfig::default(), &x, &y, 3).unwrap();
        let b = SoftmaxRegression::fit(&SgdConfig::default(), &x, &y, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, _) = make_data();
        let y = vec![1u32; x.len()];
        let result = SoftmaxRegression::fit(&SgdConfig::default(), &x, &y, 3);
        assert!(matches!(result, Err(ClassifierError::TrainingError { .. })));
    }

    #[test]
    fn test_diverging_learning_rate_reports_convergence_error() {
        let (x, y) = make_data();
        let config = SgdConfig {
            learning_rate: LearningRateSchedule::Constant,
            eta0: 1e308,
            ..SgdConfig::default()
        };
        let result = SoftmaxRegression::fit(&config, &x, &y, 3);
        assert!(matches!(result, Err(ClassifierError::ConvergenceError { .. })));
    }
}

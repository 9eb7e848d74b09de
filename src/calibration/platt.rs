//! Platt scaling (sigmoid calibration)

use crate::calibration::ScoreCalibrator;
use crate::error::{ClassifierError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

const RIDGE: f64 = 1e-6;
const MIN_STEP: f64 = 1e-10;
const SUFFICIENT_DECREASE: f64 = 1e-4;

/// Platt scaling fitter
///
/// Fits `P(y=1|f) = 1 / (1 + exp(-(a*f + b)))` over raw classifier scores `f`
/// with Newton's method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Maximum Newton iterations
    max_iter: usize,
    /// Convergence tolerance on parameter updates
    tol: f64,
}

impl PlattScaling {
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-9,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn fit(&self, scores: &Array1<f64>, labels: &[bool]) -> Result<PlattCalibrator> {
        let n = scores.len();
        if labels.len() != n {
            return Err(ClassifierError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if n == 0 {
            return Err(ClassifierError::training("calibrator", "no scores to calibrate"));
        }

        // Platt's smoothed targets
        let positives = labels.iter().filter(|&&y| y).count() as f64;
        let (hi, lo) = (
            (positives + 1.0) / (positives + 2.0),
            1.0 / (n as f64 - positives + 2.0),
        );
        let targets: Vec<f64> = labels.iter().map(|&y| if y { hi } else { lo }).collect();

        // start flat at the smoothed prior log-odds
        let (mut a, mut b) = (0.0, ((positives + 1.0) / (n as f64 - positives + 1.0)).ln());
        let mut loss = objective(scores, &targets, a, b);
        let mut iterations = 0;

        while iterations < self.max_iter {
            iterations += 1;
            let Some(step) = newton_step(scores, &targets, a, b) else {
                break;
            };

            // backtrack until the sufficient-decrease condition holds
            let mut scale = 1.0;
            let accepted = loop {
                if scale < MIN_STEP {
                    break false;
                }
                let (next_a, next_b) = (a - scale * step.da, b - scale * step.db);
                let next_loss = objective(scores, &targets, next_a, next_b);
                if next_loss <= loss - SUFFICIENT_DECREASE * scale * step.decrease {
                    a = next_a;
                    b = next_b;
                    loss = next_loss;
                    break true;
                }
                scale *= 0.5;
            };

            if !accepted || (scale * step.da).abs().max((scale * step.db).abs()) < self.tol {
                break;
            }
        }

        if !a.is_finite() || !b.is_finite() {
            return Err(ClassifierError::ConvergenceError { iterations });
        }

        Ok(PlattCalibrator { a, b })
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

/// Fitted sigmoid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCalibrator {
    a: f64,
    b: f64,
}

impl PlattCalibrator {
    pub fn parameters(&self) -> (f64, f64) {
        (self.a, self.b)
    }
}

impl ScoreCalibrator for PlattCalibrator {
    fn calibrate(&self, score: f64) -> f64 {
        sigmoid(self.a * score + self.b)
    }
}

/// Newton direction for `(a, b)`; the update is `a -= da`, `b -= db`
struct NewtonStep {
    da: f64,
    db: f64,
    /// Directional derivative `g . (da, db)`, positive for a descent step
    decrease: f64,
}

/// Newton step on the log-loss against smoothed targets.
/// `None` when the ridge-stabilised Hessian is singular.
fn newton_step(scores: &Array1<f64>, targets: &[f64], a: f64, b: f64) -> Option<NewtonStep> {
    // gradient (ga, gb) and Hessian [[haa, hab], [hab, hbb]]
    let (mut ga, mut gb) = (0.0, 0.0);
    let (mut haa, mut hab, mut hbb) = (RIDGE, 0.0, RIDGE);
    for (&f, &t) in scores.iter().zip(targets) {
        let p = sigmoid(a * f + b);
        let w = p * (1.0 - p);
        ga += (p - t) * f;
        gb += p - t;
        haa += w * f * f;
        hab += w * f;
        hbb += w;
    }

    let det = haa * hbb - hab * hab;
    if det.abs() < 1e-12 {
        return None;
    }
    let da = (hbb * ga - hab * gb) / det;
    let db = (haa * gb - hab * ga) / det;
    Some(NewtonStep {
        da,
        db,
        decrease: ga * da + gb * db,
    })
}

/// Negative log-likelihood of `sigmoid(a*f + b)` against soft targets
fn objective(scores: &Array1<f64>, targets: &[f64], a: f64, b: f64) -> f64 {
    scores
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let z = a * f + b;
            // overflow-free form of -t*ln(p) - (1-t)*ln(1-p)
            if z >= 0.0 {
                (1.0 - t) * z + (-z).exp().ln_1p()
            } else {
                -t * z + z.exp().ln_1p()
            }
        })
        .sum()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_calibrated_scores_are_monotone_probabilities() {
        let scores = array![-2.0, -0.4, -0.6, 1.5, 2.2, -1.4, 0.9, 0.4];
        let labels = [false, false, false, true, true, false, true, true];

        let calibrator = PlattScaling::new().fit(&scores, &labels).unwrap();
        let calibrated = calibrator.calibrate_batch(&scores);

        assert_eq!(calibrated.len(), scores.len());
        assert!(calibrated.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(calibrator.calibrate(2.0) > calibrator.calibrate(-2.0));
    }

    #[test]
    fn test_separated_margins_keep_a_finite_slope() {
        // +-m alternating, with two flipped labels
        for m in [5.0, 20.0, 50.0] {
            let scores: Array1<f64> = (0..200).map(|i| if i % 2 == 0 { m } else { -m }).collect();
            let mut labels: Vec<bool> = (0..200).map(|i| i % 2 == 0).collect();
            labels[0] = false;
            labels[1] = true;

            let calibrator = PlattScaling::new().fit(&scores, &labels).unwrap();
            let (a, _) = calibrator.parameters();
            assert!(a > 0.0 && a < 1.0, "m = {}: a = {}", m, a);

            let p = calibrator.calibrate(m);
            assert!(p > 0.9 && p < 1.0, "m = {}: p = {}", m, p);
            assert!(calibrator.calibrate(-m) < 0.1);
        }
    }

    #[test]
    fn test_platt_rejects_length_mismatch() {
        let scores = array![0.2, 0.8];
        assert!(PlattScaling::new().fit(&scores, &[true]).is_err());
    }
}

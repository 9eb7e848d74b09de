//! Estimator configuration and fitted classifier variants

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::sgd::{argmax, SgdConfig, SoftmaxRegression};
use crate::calibration::{PlattCalibrator, PlattScaling, ScoreCalibrator};
use crate::error::{ClassifierError, Result};
use crate::feature_engineering::SparseVector;
use crate::schema::TaskKind;
use serde::{Deserialize, Serialize};

/// Trainable estimator choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EstimatorConfig {
    /// Boosted trees with Platt-calibrated probabilities; binary tasks only
    GradientBoosting(GradientBoostingConfig),
    /// Softmax regression; binary or multi-class
    Softmax(SgdConfig),
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::GradientBoosting(GradientBoostingConfig::default())
    }
}

impl EstimatorConfig {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorConfig::GradientBoosting(_) => "gradient_boosting",
            EstimatorConfig::Softmax(_) => "softmax",
        }
    }

    pub fn validate(&self, task: TaskKind) -> Result<()> {
        match self {
            EstimatorConfig::GradientBoosting(config) => {
                if task != TaskKind::Binary {
                    return Err(ClassifierError::ConfigError(
                        "gradient boosting supports binary labels only; use the softmax estimator"
                            .into(),
                    ));
                }
                config.validate()
            }
            EstimatorConfig::Softmax(config) => config.validate(),
        }
    }

    /// Fit on feature vectors and label keys `0..n_classes`
    pub fn fit(
        &self,
        x: &[SparseVector],
        keys: &[u32],
        n_classes: usize,
        task: TaskKind,
        seed: Option<u64>,
    ) -> Result<TrainedClassifier> {
        self.validate(task)?;
        match self {
            EstimatorConfig::GradientBoosting(config) => {
                let y: Vec<bool> = keys.iter().map(|&k| k == 1).collect();
                let model = GradientBoostingClassifier::fit(config, x, &y)?;
                let scores = model.decision_function_batch(x);
                let calibrator = PlattScaling::new().fit(&scores, &y)?;
                Ok(TrainedClassifier::GradientBoosting { model, calibrator })
            }
            EstimatorConfig::Softmax(config) => {
                let mut config = config.clone();
                if seed.is_some() {
                    config.random_state = seed;
                }
                let model = SoftmaxRegression::fit(&config, x, keys, n_classes)?;
                Ok(TrainedClassifier::Softmax { model, task })
            }
        }
    }
}

/// Estimator output for one row
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutput {
    /// Raw margin and calibrated probability of the positive class
    Binary { score: f64, probability: f64 },
    /// Probability per class key
    MultiClass { scores: Vec<f64> },
}

impl ClassifierOutput {
    /// Predicted key: positive when the probability reaches `threshold`, else arg-max
    pub fn predicted_key(&self, threshold: f64) -> u32 {
        match self {
            ClassifierOutput::Binary { probability, .. } => u32::from(*probability >= threshold),
            ClassifierOutput::MultiClass { scores } => argmax(scores),
        }
    }
}

/// Fitted classifier variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedClassifier {
    GradientBoosting {
        model: GradientBoostingClassifier,
        calibrator: PlattCalibrator,
    },
    Softmax {
        model: SoftmaxRegression,
        task: TaskKind,
    },
}

impl TrainedClassifier {
    pub fn task(&self) -> TaskKind {
        match self {
            TrainedClassifier::GradientBoosting { .. } => TaskKind::Binary,
            TrainedClassifier::Softmax { task, .. } => *task,
        }
    }

    pub fn predict(&self, x: &SparseVector) -> ClassifierOutput {
        match self {
            TrainedClassifier::GradientBoosting { model, calibrator } => {
                let score = model.decision_function(x);
                ClassifierOutput::Binary {
                    score,
                    probability: calibrator.calibrate(score),
                }
            }
            TrainedClassifier::Softmax { model, task } => {
                let scores = model.predict_proba(x);
                match task {
                    TaskKind::Binary => {
                        let p0 = scores[0].max(1e-15);
                        let p1 = scores[1].max(1e-15);
                        ClassifierOutput::Binary {
                            score: p1.ln() - p0.ln(),
                            probability: scores[1],
                        }
                    }
                    TaskKind::MultiClass => ClassifierOutput::MultiClass { scores },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<SparseVector>, Vec<u32>) {
        let x = (0..40)
            .map(|i| SparseVector::from_pairs(3, vec![((i % 2) as u32, 1.0)]).unwrap())
            .collect();
        let y = (0..40).map(|i| (i % 2) as u32).collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_rejects_multiclass() {
        let config = EstimatorConfig::default();
        assert!(matches!(
            config.validate(TaskKind::MultiClass),
            Err(ClassifierError::ConfigError(_))
        ));
    }

    #[test]
    fn test_boosted_binary_output() {
        let (x, y) = data();
        let config = EstimatorConfig::GradientBoosting(
            GradientBoostingConfig::default()
                .with_n_estimators(10)
                .with_min_samples_leaf(2),
        );
        let model = config.fit(&x, &y, 2, TaskKind::Binary, None).unwrap();
        match model.predict(&x[1]) {
            ClassifierOutput::Binary { score, probability } => {
                assert!(score > 0.0);
                assert!(probability > 0.5 && probability <= 1.0);
            }
            other => panic!("unexpected output {:?}", other),
        }
        assert_eq!(model.predict(&x[0]).predicted_key(0.5), 0);
    }

    #[test]
    fn test_softmax_binary_output() {
        let (x, y) = data();
        let model = EstimatorConfig::Softmax(SgdConfig::default())
            .fit(&x, &y, 2, TaskKind::Binary, Some(3))
            .unwrap();
        assert_eq!(model.task(), TaskKind::Binary);
        assert_eq!(model.predict(&x[1]).predicted_key(0.5), 1);
    }
}

//! Training module
//!
//! Estimators, train/test splitting, metrics, and the [`Trainer`] /
//! [`Evaluator`] that drive fitting and scoring of pipelines.

pub mod cross_validation;
pub mod decision_tree;
pub mod engine;
pub mod gradient_boosting;
pub mod metrics;
pub mod models;
pub mod sgd;

pub use cross_validation::{train_test_split, CVSplit, KFold, SplitConfig};
pub use engine::{cross_validate, CrossValidationResult, Evaluator, Trainer};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use metrics::{BinaryMetrics, ConfusionMatrix, MetricsReport, MultiClassMetrics};
pub use models::{ClassifierOutput, EstimatorConfig, TrainedClassifier};
pub use sgd::{LearningRateSchedule, SgdConfig, SoftmaxRegression};

//! Inference configuration

use serde::{Deserialize, Serialize};

/// Configuration for the prediction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Probability at or above which a binary prediction is positive
    pub classification_threshold: f64,

    /// Spread batch rows across the rayon pool; output order is unchanged
    pub parallel: bool,

    /// Count predictions and per-row failures
    pub track_stats: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            classification_threshold: 0.5,
            parallel: false,
            track_stats: true,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set classification threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.classification_threshold = threshold;
        self
    }

    /// Builder method to enable parallel batch prediction
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_stats(mut self, track: bool) -> Self {
        self.track_stats = track;
        self
    }
}

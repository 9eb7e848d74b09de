//! Score calibration
//!
//! Maps raw classifier margins to probabilities.

mod platt;

pub use platt::{PlattCalibrator, PlattScaling};

use ndarray::Array1;

/// Maps a raw score to a probability in `[0, 1]`
pub trait ScoreCalibrator: Send + Sync {
    fn calibrate(&self, score: f64) -> f64;

    fn calibrate_batch(&self, scores: &Array1<f64>) -> Array1<f64> {
        scores.mapv(|s| self.calibrate(s))
    }
}

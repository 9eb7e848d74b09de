//! Data preprocessing module
//!
//! Label encoding for boolean and categorical targets.

pub mod label_encoder;

pub use label_encoder::{FittedLabelEncoder, KeyMapping, LabelEncoding};

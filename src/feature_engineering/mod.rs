//! Feature engineering
//!
//! Text featurization: tokenization, word and character n-grams, and
//! vocabulary or hashed term-to-slot mapping into [`SparseVector`]s.

pub mod text_features;

pub use text_features::{
    FeaturizerConfig, FeaturizerKind, FittedTextFeaturizer, SparseVector, TextFeaturizer,
    TextTokenizer, Vocabulary, MAX_BUCKETS,
};

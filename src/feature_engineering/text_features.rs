//! Text feature extraction
//!
//! A [`TextFeaturizer`] is configuration only. Fitting it on a training corpus
//! yields a [`FittedTextFeaturizer`] whose vocabulary is frozen: transforming
//! text afterwards never changes it, and terms it has not seen contribute
//! nothing.

use crate::error::{ClassifierError, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Sparse fixed-length vector with sorted, unique indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl SparseVector {
    /// All-zero vector of the given length
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from (index, value) pairs; duplicate indices are summed
    pub fn from_pairs(dim: usize, mut pairs: Vec<(u32, f64)>) -> Result<Self> {
        pairs.sort_by_key(|&(i, _)| i);
        let mut indices: Vec<u32> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (i, v) in pairs {
            if i as usize >= dim {
                return Err(ClassifierError::ShapeError {
                    expected: format!("index < {}", dim),
                    actual: format!("index {}", i),
                });
            }
            if indices.last() == Some(&i) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                indices.push(i);
                values.push(v);
            }
        }
        Ok(Self { dim, indices, values })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at `idx`, zero when absent
    pub fn get(&self, idx: usize) -> f64 {
        match self.indices.binary_search(&(idx as u32)) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn dot(&self, dense: &ArrayView1<f64>) -> f64 {
        self.iter()
            .map(|(i, v)| v * dense[i as usize])
            .sum()
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Scale to unit L2 norm; the zero vector stays zero
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    pub fn to_dense(&self) -> Array1<f64> {
        let mut out = Array1::zeros(self.dim);
        for (i, v) in self.iter() {
            out[i as usize] = v;
        }
        out
    }

    /// Concatenate in the given order, offsetting indices
    pub fn concat(parts: &[&SparseVector]) -> Self {
        let dim = parts.iter().map(|p| p.dim).sum();
        let nnz = parts.iter().map(|p| p.nnz()).sum();
        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        let mut offset = 0u32;
        for part in parts {
            indices.extend(part.indices.iter().map(|&i| i + offset));
            values.extend_from_slice(&part.values);
            offset += part.dim as u32;
        }
        Self { dim, indices, values }
    }
}

/// Simple text tokenizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTokenizer {
    lowercase: bool,
    min_token_length: usize,
    stop_words: Vec<String>,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_token_length: 1,
            stop_words: Vec::new(),
        }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    pub fn with_english_stop_words(mut self) -> Self {
        self.stop_words = [
            "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for",
            "of", "with", "by", "is", "was", "are", "were", "be", "have", "has",
            "it", "this", "that", "i", "you", "he", "she", "we", "they",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        self
    }

    /// Case normalization applied before tokenizing and before char n-grams
    pub fn normalize(&self, text: &str) -> String {
        if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.normalize(text)
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .filter(|s| s.chars().count() >= self.min_token_length)
            .filter(|s| !self.stop_words.iter().any(|w| w == s))
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest hashed bucket space
pub const MAX_BUCKETS: u64 = u32::MAX as u64 + 1;

/// How terms are mapped to vector slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeaturizerKind {
    /// Dictionary learned from the training corpus
    Vocabulary {
        /// Keep only the most document-frequent terms
        max_features: Option<usize>,
        /// Minimum number of training documents a term must appear in
        min_df: usize,
    },
    /// Fixed bucket space; nothing is learned
    Hashed { n_buckets: usize, seed: u64 },
}

/// Text featurizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturizerConfig {
    pub kind: FeaturizerKind,
    /// Inclusive word n-gram range
    pub word_ngrams: (usize, usize),
    /// Character n-gram length; `None` disables character grams
    pub char_ngrams: Option<usize>,
    pub tokenizer: TextTokenizer,
    /// L2-normalize each output vector
    pub normalize: bool,
}

impl Default for FeaturizerConfig {
    fn default() -> Self {
        Self {
            kind: FeaturizerKind::Vocabulary {
                max_features: Some(5000),
                min_df: 1,
            },
            word_ngrams: (1, 2),
            char_ngrams: Some(3),
            tokenizer: TextTokenizer::new(),
            normalize: true,
        }
    }
}

impl FeaturizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vocabulary(mut self, max_features: Option<usize>, min_df: usize) -> Self {
        self.kind = FeaturizerKind::Vocabulary { max_features, min_df };
        self
    }

    pub fn with_hashing(mut self, n_buckets: usize) -> Self {
        self.kind = FeaturizerKind::Hashed { n_buckets, seed: 0 };
        self
    }

    pub fn with_word_ngrams(mut self, min: usize, max: usize) -> Self {
        self.word_ngrams = (min.max(1), max.max(min.max(1)));
        self
    }

    pub fn with_char_ngrams(mut self, n: Option<usize>) -> Self {
        self.char_ngrams = n.filter(|&n| n > 0);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TextTokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.word_ngrams.0 == 0 || self.word_ngrams.0 > self.word_ngrams.1 {
            return Err(ClassifierError::InvalidParameter {
                name: "word_ngrams".into(),
                value: format!("{:?}", self.word_ngrams),
                reason: "range must satisfy 1 <= min <= max".into(),
            });
        }
        if self.char_ngrams == Some(0) {
            return Err(ClassifierError::InvalidParameter {
                name: "char_ngrams".into(),
                value: "0".into(),
                reason: "gram length must be positive; use null to disable".into(),
            });
        }
        if let FeaturizerKind::Hashed { n_buckets, .. } = self.kind {
            // slots are u32
            if n_buckets == 0 || n_buckets as u64 > MAX_BUCKETS {
                return Err(ClassifierError::InvalidParameter {
                    name: "n_buckets".into(),
                    value: n_buckets.to_string(),
                    reason: format!("must be in 1..={}", MAX_BUCKETS),
                });
            }
        }
        Ok(())
    }

    /// Term extraction shared by fit and transform
    fn terms(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenizer.tokenize(text);
        let mut terms = Vec::new();

        for n in self.word_ngrams.0..=self.word_ngrams.1 {
            if tokens.len() >= n {
                for window in tokens.windows(n) {
                    terms.push(window.join(" "));
                }
            }
        }

        if let Some(n) = self.char_ngrams.filter(|&n| n > 0) {
            let normalized = self.tokenizer.normalize(text);
            let collapsed: Vec<char> = normalized.split_whitespace().collect::<Vec<_>>().join(" ").chars().collect();
            if collapsed.len() >= n {
                for window in collapsed.windows(n) {
                    let gram: String = window.iter().collect();
                    terms.push(format!("#{}", gram));
                }
            }
        }

        terms
    }
}

/// Unfit text featurizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFeaturizer {
    config: FeaturizerConfig,
}

impl TextFeaturizer {
    pub fn new(config: FeaturizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeaturizerConfig {
        &self.config
    }

    /// Learn the vocabulary from the training corpus only
    pub fn fit(&self, corpus: &[String]) -> Result<FittedTextFeaturizer> {
        self.config.validate()?;
        let (vocabulary, dim) = match &self.config.kind {
            FeaturizerKind::Vocabulary { max_features, min_df } => {
                let vocab = Vocabulary::build(&self.config, corpus, *max_features, *min_df);
                let dim = vocab.len();
                (Some(vocab), dim)
            }
            FeaturizerKind::Hashed { n_buckets, .. } => (None, *n_buckets),
        };
        Ok(FittedTextFeaturizer {
            config: self.config.clone(),
            vocabulary,
            dim,
        })
    }
}

/// Frozen term dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: BTreeMap<String, u32>,
}

impl Vocabulary {
    fn build(config: &FeaturizerConfig, corpus: &[String], max_features: Option<usize>, min_df: usize) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let unique: HashSet<String> = config.terms(doc).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .collect();
        // lexical tie-break keeps slot assignment independent of hash order
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max_n) = max_features {
            ranked.truncate(max_n);
        }

        let terms: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { terms, index }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, term: &str) -> Option<u32> {
        self.index.get(term).copied()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// Fitted, transform-only featurizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTextFeaturizer {
    config: FeaturizerConfig,
    vocabulary: Option<Vocabulary>,
    dim: usize,
}

impl FittedTextFeaturizer {
    /// Output vector length
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    fn slot(&self, term: &str) -> Option<u32> {
        match (&self.vocabulary, &self.config.kind) {
            (Some(vocab), _) => vocab.get(term),
            (None, FeaturizerKind::Hashed { n_buckets, seed }) => {
                Some((xxh3_64_with_seed(term.as_bytes(), *seed) % *n_buckets as u64) as u32)
            }
            (None, _) => None,
        }
    }

    /// Featurize one text; unknown terms are skipped and empty text gives the zero vector
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<u32, f64> = HashMap::new();
        for term in self.config.terms(text) {
            if let Some(slot) = self.slot(&term) {
                *counts.entry(slot).or_insert(0.0) += 1.0;
            }
        }
        let mut pairs: Vec<(u32, f64)> = counts.into_iter().collect();
        pairs.sort_by_key(|&(i, _)| i);
        let (indices, values) = pairs.into_iter().unzip();
        let mut vector = SparseVector {
            dim: self.dim,
            indices,
            values,
        };
        if self.config.normalize {
            vector.normalize();
        }
        vector
    }

    pub fn transform_batch(&self, texts: &[String]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t)).collect()
    }

    /// Term name per slot (vocabulary featurizers only)
    pub fn get_feature_names(&self) -> Vec<String> {
        self.vocabulary
            .as_ref()
            .map(|v| v.terms().to_vec())
            .unwrap_or_default()
    }
}

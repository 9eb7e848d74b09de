//! Pipeline assembly
//!
//! [`build_pipeline`] turns a schema and a [`PipelineConfig`] into an unfit
//! [`PipelineSpec`]: label encoding, one text featurizer per text field,
//! concatenation, the estimator, and for categorical labels a key-to-value
//! output stage. Fitting a spec yields a [`FittedPipeline`], an immutable list
//! of [`FittedStage`]s that only transform.

use crate::data::{Column, Frame, LabelPolicy};
use crate::error::{ClassifierError, Result};
use crate::feature_engineering::{FeaturizerConfig, FittedTextFeaturizer, SparseVector, TextFeaturizer};
use crate::preprocessing::{FittedLabelEncoder, KeyMapping, LabelEncoding};
use crate::schema::{FieldType, Record, RecordSchema, TaskKind};
use crate::training::gradient_boosting::GradientBoostingConfig;
use crate::training::models::{ClassifierOutput, EstimatorConfig, TrainedClassifier};
use crate::training::sgd::SgdConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoded label keys
pub const LABEL_KEY: &str = "Label";
/// Concatenated feature vector
pub const FEATURES: &str = "Features";
/// Raw binary margin
pub const SCORE: &str = "Score";
/// Calibrated probability of the positive class
pub const PROBABILITY: &str = "Probability";
/// Per-class probabilities
pub const SCORES: &str = "Scores";
pub const PREDICTED_KEY: &str = "PredictedKey";
/// Predicted category string
pub const PREDICTED_LABEL: &str = "PredictedLabel";

/// Probability at or above which a binary row is predicted positive
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Pipeline configuration, passed explicitly to [`build_pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub featurizer: FeaturizerConfig,
    pub estimator: EstimatorConfig,
    /// Seed for stochastic estimators; overrides the estimator's own seed when set
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            featurizer: FeaturizerConfig::default(),
            estimator: EstimatorConfig::default(),
            seed: Some(42),
        }
    }
}

impl PipelineConfig {
    /// Boosted trees with 50 trees, 50 leaves, 20 rows per leaf
    pub fn sentiment() -> Self {
        Self {
            estimator: EstimatorConfig::GradientBoosting(
                GradientBoostingConfig::default()
                    .with_n_estimators(50)
                    .with_max_leaves(50)
                    .with_min_samples_leaf(20),
            ),
            ..Self::default()
        }
    }

    /// Softmax regression over concatenated title and description features
    pub fn issues() -> Self {
        Self {
            estimator: EstimatorConfig::Softmax(SgdConfig::default()),
            ..Self::default()
        }
    }

    /// Default configuration for a schema's task kind
    pub fn for_schema(schema: &RecordSchema) -> Self {
        match schema.task_kind() {
            TaskKind::Binary => Self::sentiment(),
            TaskKind::MultiClass => Self::issues(),
        }
    }

    pub fn with_featurizer(mut self, featurizer: FeaturizerConfig) -> Self {
        self.featurizer = featurizer;
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self, task: TaskKind) -> Result<()> {
        self.featurizer.validate()?;
        self.estimator.validate(task)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&text)
            .map_err(|e| ClassifierError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// One unfit stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageSpec {
    MapValueToKey {
        input: String,
        output: String,
        encoding: LabelEncoding,
    },
    FeaturizeText {
        input: String,
        output: String,
        config: FeaturizerConfig,
    },
    Concatenate {
        inputs: Vec<String>,
        output: String,
    },
    Train {
        features: String,
        label: String,
        estimator: EstimatorConfig,
        task: TaskKind,
        seed: Option<u64>,
    },
    /// Maps predicted keys back to category strings using the label encoder writing `source`
    MapKeyToValue {
        input: String,
        output: String,
        source: String,
    },
}

impl StageSpec {
    pub fn name(&self) -> &'static str {
        match self {
            StageSpec::MapValueToKey { .. } => "map_value_to_key",
            StageSpec::FeaturizeText { .. } => "featurize_text",
            StageSpec::Concatenate { .. } => "concatenate",
            StageSpec::Train { .. } => "train",
            StageSpec::MapKeyToValue { .. } => "map_key_to_value",
        }
    }

    /// Learn this stage's state from `frame`. `fitted` holds the stages fitted so far.
    pub fn fit(&self, frame: &Frame, fitted: &[FittedStage]) -> Result<FittedStage> {
        match self {
            StageSpec::MapValueToKey { input, output, encoding } => Ok(FittedStage::LabelEncoder {
                input: input.clone(),
                output: output.clone(),
                encoder: encoding.fit(frame.column(input)?)?,
            }),
            StageSpec::FeaturizeText { input, output, config } => Ok(FittedStage::Featurizer {
                input: input.clone(),
                output: output.clone(),
                featurizer: TextFeaturizer::new(config.clone()).fit(frame.text(input)?)?,
            }),
            StageSpec::Concatenate { inputs, output } => Ok(FittedStage::Concatenate {
                inputs: inputs.clone(),
                output: output.clone(),
            }),
            StageSpec::Train {
                features,
                label,
                estimator,
                task,
                seed,
            } => {
                let x = frame.vectors(features)?;
                let keys = frame
                    .keys(label)?
                    .iter()
                    .enumerate()
                    .map(|(i, k)| {
                        k.ok_or_else(|| ClassifierError::schema_at(i + 1, "training row has no label key"))
                    })
                    .collect::<Result<Vec<u32>>>()?;
                let n_classes = label_encoder(fitted, label)?.n_classes();
                let model = estimator.fit(x, &keys, n_classes, *task, *seed)?;
                Ok(FittedStage::Estimator {
                    features: features.clone(),
                    model,
                })
            }
            StageSpec::MapKeyToValue { input, output, source } => {
                let mapping = label_encoder(fitted, source)?
                    .mapping()
                    .cloned()
                    .ok_or_else(|| {
                        ClassifierError::ConfigError(format!(
                            "label encoder '{}' has no value mapping",
                            source
                        ))
                    })?;
                Ok(FittedStage::KeyToValue {
                    input: input.clone(),
                    output: output.clone(),
                    mapping,
                })
            }
        }
    }
}

fn label_encoder<'a>(fitted: &'a [FittedStage], output_name: &str) -> Result<&'a FittedLabelEncoder> {
    fitted
        .iter()
        .find_map(|stage| match stage {
            FittedStage::LabelEncoder { output, encoder, .. } if output == output_name => Some(encoder),
            _ => None,
        })
        .ok_or_else(|| ClassifierError::ConfigError(format!("no label encoder writes '{}'", output_name)))
}

/// Unfit pipeline: the schema it consumes plus its ordered stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    schema: RecordSchema,
    stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn task(&self) -> TaskKind {
        self.schema.task_kind()
    }
}

/// Assemble the unfit pipeline for `schema`. Performs no data access.
pub fn build_pipeline(schema: &RecordSchema, config: &PipelineConfig) -> Result<PipelineSpec> {
    let task = schema.task_kind();
    config.validate(task)?;

    let label = schema.label_field()?;
    let encoding = match label.field_type {
        FieldType::Boolean => LabelEncoding::Identity,
        _ => LabelEncoding::ValueToKey,
    };

    let mut stages = vec![StageSpec::MapValueToKey {
        input: label.name.clone(),
        output: LABEL_KEY.to_string(),
        encoding,
    }];

    let mut feature_columns = Vec::new();
    for field in schema.text_fields() {
        let output = format!("{}_Featurized", field.name);
        stages.push(StageSpec::FeaturizeText {
            input: field.name.clone(),
            output: output.clone(),
            config: config.featurizer.clone(),
        });
        feature_columns.push(output);
    }

    stages.push(StageSpec::Concatenate {
        inputs: feature_columns,
        output: FEATURES.to_string(),
    });
    stages.push(StageSpec::Train {
        features: FEATURES.to_string(),
        label: LABEL_KEY.to_string(),
        estimator: config.estimator.clone(),
        task,
        seed: config.seed,
    });

    if encoding == LabelEncoding::ValueToKey {
        stages.push(StageSpec::MapKeyToValue {
            input: PREDICTED_KEY.to_string(),
            output: PREDICTED_LABEL.to_string(),
            source: LABEL_KEY.to_string(),
        });
    }

    Ok(PipelineSpec {
        schema: schema.clone(),
        stages,
    })
}

/// One fitted, transform-only stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStage {
    LabelEncoder {
        input: String,
        output: String,
        encoder: FittedLabelEncoder,
    },
    Featurizer {
        input: String,
        output: String,
        featurizer: FittedTextFeaturizer,
    },
    Concatenate {
        inputs: Vec<String>,
        output: String,
    },
    Estimator {
        features: String,
        model: TrainedClassifier,
    },
    KeyToValue {
        input: String,
        output: String,
        mapping: KeyMapping,
    },
}

impl FittedStage {
    pub fn name(&self) -> &'static str {
        match self {
            FittedStage::LabelEncoder { .. } => "map_value_to_key",
            FittedStage::Featurizer { .. } => "featurize_text",
            FittedStage::Concatenate { .. } => "concatenate",
            FittedStage::Estimator { .. } => "train",
            FittedStage::KeyToValue { .. } => "map_key_to_value",
        }
    }

    /// Append this stage's output columns to `frame`
    pub fn transform(&self, frame: &mut Frame) -> Result<()> {
        match self {
            FittedStage::LabelEncoder { input, output, encoder } => {
                // inference rows carry no label
                if frame.contains(input) {
                    let keys = encoder.transform(frame.column(input)?)?;
                    frame.insert(output.clone(), keys)?;
                }
            }
            FittedStage::Featurizer { input, output, featurizer } => {
                let vectors = featurizer.transform_batch(frame.text(input)?);
                frame.insert(output.clone(), Column::Vector(vectors))?;
            }
            FittedStage::Concatenate { inputs, output } => {
                let parts = inputs
                    .iter()
                    .map(|name| frame.vectors(name))
                    .collect::<Result<Vec<_>>>()?;
                let joined: Vec<SparseVector> = (0..frame.n_rows())
                    .map(|row| {
                        let row_parts: Vec<&SparseVector> = parts.iter().map(|p| &p[row]).collect();
                        SparseVector::concat(&row_parts)
                    })
                    .collect();
                frame.insert(output.clone(), Column::Vector(joined))?;
            }
            FittedStage::Estimator { features, model } => {
                let outputs: Vec<ClassifierOutput> =
                    frame.vectors(features)?.iter().map(|x| model.predict(x)).collect();
                let keys = outputs
                    .iter()
                    .map(|o| Some(o.predicted_key(DEFAULT_THRESHOLD)))
                    .collect();
                match model.task() {
                    TaskKind::Binary => {
                        let (scores, probs): (Vec<f64>, Vec<f64>) = outputs
                            .iter()
                            .map(|o| match o {
                                ClassifierOutput::Binary { score, probability } => (*score, *probability),
                                ClassifierOutput::MultiClass { scores } => (scores[1], scores[1]),
                            })
                            .unzip();
                        frame.insert(SCORE, Column::Scalar(scores))?;
                        frame.insert(PROBABILITY, Column::Scalar(probs))?;
                    }
                    TaskKind::MultiClass => {
                        let scores = outputs
                            .into_iter()
                            .map(|o| match o {
                                ClassifierOutput::MultiClass { scores } => scores,
                                ClassifierOutput::Binary { probability, .. } => vec![1.0 - probability, probability],
                            })
                            .collect();
                        frame.insert(SCORES, Column::Scores(scores))?;
                    }
                }
                frame.insert(PREDICTED_KEY, Column::Key(keys))?;
            }
            FittedStage::KeyToValue { input, output, mapping } => {
                let values = frame
                    .keys(input)?
                    .iter()
                    .map(|key| match key {
                        Some(k) => mapping.value_of(*k).map(str::to_string),
                        None => Err(ClassifierError::UnknownLabel("missing key".into())),
                    })
                    .collect::<Result<Vec<String>>>()?;
                frame.insert(output.clone(), Column::Category(values))?;
            }
        }
        Ok(())
    }
}

/// Fitted pipeline: frozen stages plus the schema they were fitted against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    schema: RecordSchema,
    stages: Vec<FittedStage>,
}

impl FittedPipeline {
    pub fn new(schema: RecordSchema, stages: Vec<FittedStage>) -> Self {
        Self { schema, stages }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    pub fn task(&self) -> TaskKind {
        self.schema.task_kind()
    }

    /// Category mapping of the label, for categorical tasks
    pub fn label_mapping(&self) -> Option<&KeyMapping> {
        self.stages.iter().find_map(|stage| match stage {
            FittedStage::LabelEncoder { encoder, .. } => encoder.mapping(),
            _ => None,
        })
    }

    /// Length of the concatenated feature vector
    pub fn feature_dim(&self) -> usize {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                FittedStage::Featurizer { featurizer, .. } => Some(featurizer.dim()),
                _ => None,
            })
            .sum()
    }

    /// Run every stage's transform over `frame`
    pub fn transform(&self, mut frame: Frame) -> Result<Frame> {
        for stage in &self.stages {
            stage.transform(&mut frame)?;
        }
        Ok(frame)
    }

    /// Build a frame from records and transform it
    pub fn transform_records(&self, records: &[Record], policy: LabelPolicy) -> Result<Frame> {
        let frame = Frame::from_records(&self.schema, records, policy)?;
        self.transform(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_is_idempotent() {
        let schema = RecordSchema::github_issues();
        let config = PipelineConfig::issues();
        let a = build_pipeline(&schema, &config).unwrap();
        let b = build_pipeline(&schema, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stage_order_for_categorical_label() {
        let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
        let names: Vec<&str> = spec.stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "map_value_to_key",
                "featurize_text",
                "featurize_text",
                "concatenate",
                "train",
                "map_key_to_value"
            ]
        );
        match &spec.stages()[3] {
            StageSpec::Concatenate { inputs, .. } => {
                assert_eq!(inputs, &vec!["Title_Featurized".to_string(), "Description_Featurized".to_string()]);
            }
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_boolean_label_has_no_key_to_value_stage() {
        let spec = build_pipeline(&RecordSchema::sentiment(), &PipelineConfig::sentiment()).unwrap();
        assert_eq!(spec.stages().len(), 4);
        assert_eq!(spec.task(), TaskKind::Binary);
    }

    #[test]
    fn test_boosting_rejected_for_categorical_label() {
        let result = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::sentiment());
        assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = PipelineConfig::sentiment().with_seed(Some(9));
        config.to_json_file(file.path()).unwrap();
        let loaded = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_json_config_with_zero_char_ngrams_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut json = serde_json::to_value(PipelineConfig::sentiment()).unwrap();
        json["featurizer"]["char_ngrams"] = serde_json::json!(0);
        std::fs::write(file.path(), json.to_string()).unwrap();

        let loaded = PipelineConfig::from_json_file(file.path()).unwrap();
        let err = build_pipeline(&RecordSchema::sentiment(), &loaded).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidParameter { .. }));
    }
}

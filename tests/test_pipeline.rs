//! Integration tests for pipeline assembly, fitting and transform behaviour

mod common;

use common::*;
use textclass::data::LabelPolicy;
use textclass::feature_engineering::FeaturizerConfig;
use textclass::pipeline::{build_pipeline, FittedStage, PipelineConfig, StageSpec, FEATURES, PREDICTED_LABEL};
use textclass::schema::{FieldSpec, FieldType, Record, RecordSchema, TaskKind};
use textclass::training::{EstimatorConfig, MetricsReport, SgdConfig, Trainer};

// ============================================================================
// Assembly
// ============================================================================

#[test]
fn test_build_performs_no_fitting() {
    let spec = build_pipeline(&RecordSchema::sentiment(), &PipelineConfig::sentiment()).unwrap();
    assert_eq!(spec.task(), TaskKind::Binary);
    assert!(spec
        .stages()
        .iter()
        .any(|s| matches!(s, StageSpec::Train { features, .. } if features == FEATURES)));
}

#[test]
fn test_text_fields_featurized_in_declared_order() {
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let concat = spec
        .stages()
        .iter()
        .find_map(|s| match s {
            StageSpec::Concatenate { inputs, .. } => Some(inputs.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(concat, vec!["Title_Featurized", "Description_Featurized"]);
}

#[test]
fn test_custom_schema_with_three_text_fields() {
    let schema = RecordSchema::new(
        "tickets",
        vec![
            FieldSpec::new("Subject", FieldType::Text),
            FieldSpec::new("Body", FieldType::Text),
            FieldSpec::new("Footer", FieldType::Text),
            FieldSpec::new("Queue", FieldType::Categorical),
        ],
        "Queue",
    )
    .unwrap();
    let spec = build_pipeline(&schema, &PipelineConfig::for_schema(&schema)).unwrap();
    let featurizers = spec
        .stages()
        .iter()
        .filter(|s| matches!(s, StageSpec::FeaturizeText { .. }))
        .count();
    assert_eq!(featurizers, 3);
}

// ============================================================================
// Fitting
// ============================================================================

#[test]
fn test_fit_is_deterministic() {
    let rows = sentiment_rows(80);
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let a = Trainer::new().fit(&spec, &rows).unwrap();
    let b = Trainer::new().fit(&spec, &rows).unwrap();
    assert_eq!(a, b);

    let issues = issue_rows(60);
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let a = Trainer::new().fit(&spec, &issues).unwrap();
    let b = Trainer::new().fit(&spec, &issues).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_vocabulary_learned_from_training_rows_only() {
    let train = sentiment_rows(60);
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let model = Trainer::new().fit(&spec, &train).unwrap();

    let vocabulary = model
        .stages()
        .iter()
        .find_map(|s| match s {
            FittedStage::Featurizer { featurizer, .. } => featurizer.vocabulary().cloned(),
            _ => None,
        })
        .unwrap();
    assert!(vocabulary.get("steak").is_some());
    assert!(vocabulary.get("zzyzx").is_none());

    // an unseen word contributes nothing
    let frame = model
        .transform_records(&[sentiment_record("zzyzx qqq")], LabelPolicy::Ignore)
        .unwrap();
    let features = frame.vectors(FEATURES).unwrap();
    assert_eq!(features[0].nnz(), 0);
}

#[test]
fn test_fitted_state_frozen_by_evaluate_and_predict() {
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &issue_rows(60)).unwrap();
    let snapshot = model.clone();
    let dim = model.feature_dim();

    // novel words everywhere, and an Area never seen during fit
    let schema = RecordSchema::github_issues();
    let mut novel: Vec<Record> = ["Security", "Networking", "Security"]
        .iter()
        .map(|area| {
            schema
                .record()
                .category("Area", *area)
                .text("Title", "xylophone quasar")
                .text("Description", "zeppelin marmalade wobble")
                .build()
                .unwrap()
        })
        .collect();
    novel.extend(issue_rows(9));

    let report = textclass::evaluate(&model, &novel).unwrap();
    match report {
        MetricsReport::MultiClass(m) => assert_eq!(m.unknown_label_rows, 2),
        other => panic!("expected multi-class report, got {:?}", other),
    }
    let batch = textclass::predict_batch(&model, &novel);
    assert_eq!(batch.success_count(), novel.len());

    assert_eq!(model, snapshot);
    assert_eq!(model.feature_dim(), dim);
    assert_eq!(model.label_mapping().unwrap().values(), AREAS);
    assert_eq!(model.label_mapping().unwrap().key_of("Security"), None);
}

#[test]
fn test_label_keys_follow_first_seen_order() {
    let rows = issue_rows(30);
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &rows).unwrap();
    let mapping = model.label_mapping().unwrap();
    assert_eq!(mapping.values(), AREAS);
    assert_eq!(mapping.key_of("Networking"), Some(0));
}

#[test]
fn test_single_class_training_set_fails() {
    let rows: Vec<_> = sentiment_rows(40).into_iter().step_by(2).collect();
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let err = Trainer::new().fit(&spec, &rows).unwrap_err();
    assert!(matches!(err, textclass::ClassifierError::TrainingError { .. }));
}

#[test]
fn test_boosting_rejected_for_categorical_label() {
    let config = PipelineConfig::issues().with_estimator(EstimatorConfig::default());
    assert!(build_pipeline(&RecordSchema::github_issues(), &config).is_err());
}

#[test]
fn test_softmax_serves_binary_task() {
    let config = PipelineConfig::sentiment()
        .with_estimator(EstimatorConfig::Softmax(SgdConfig::default()))
        .with_featurizer(FeaturizerConfig::default().with_hashing(1 << 12));
    let spec = build_pipeline(&RecordSchema::sentiment(), &config).unwrap();
    let model = Trainer::new().fit(&spec, &sentiment_rows(80)).unwrap();
    let prediction = textclass::predict(&model, &sentiment_record("awful bland pizza")).unwrap();
    assert!(matches!(prediction, textclass::inference::Prediction::Binary { label: false, .. }));
}

// ============================================================================
// Transform
// ============================================================================

#[test]
fn test_transform_preserves_row_order() {
    let rows = issue_rows(60);
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &rows).unwrap();

    let queries = vec![
        issue_record("socket timeout", "http connection drops"),
        issue_record("button render", "window layout broken"),
        issue_record("sql query", "database transaction fails"),
    ];
    let frame = model.transform_records(&queries, LabelPolicy::Ignore).unwrap();
    let batch_labels = frame.categories(PREDICTED_LABEL).unwrap().to_vec();

    let single_labels: Vec<String> = queries
        .iter()
        .map(|q| textclass::predict(&model, q).unwrap().label_text())
        .collect();
    assert_eq!(batch_labels, single_labels);
    assert_eq!(batch_labels, vec!["Networking", "UI", "Database"]);
}

#[test]
fn test_transform_rejects_wrong_shape() {
    let rows = sentiment_rows(40);
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let model = Trainer::new().fit(&spec, &rows).unwrap();

    let foreign = issue_record("title", "description");
    let err = textclass::predict(&model, &foreign).unwrap_err();
    assert!(matches!(err, textclass::ClassifierError::SchemaMismatch { .. }));
}

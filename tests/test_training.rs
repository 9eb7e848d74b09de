//! Integration tests for training and evaluation
//! Tests: fit → evaluate for both task kinds, metrics, cross-validation

mod common;

use common::*;
use textclass::inference::Prediction;
use textclass::pipeline::{build_pipeline, PipelineConfig};
use textclass::schema::RecordSchema;
use textclass::training::{
    cross_validate, train_test_split, Evaluator, MetricsReport, SplitConfig, Trainer,
};

// ============================================================================
// Binary sentiment
// ============================================================================

#[test]
fn test_binary_end_to_end() {
    let rows = sentiment_rows(200);
    let (train, test) = train_test_split(&rows, &SplitConfig::default()).unwrap();
    assert_eq!(test.len(), 40);

    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let model = textclass::fit(&spec, &train).unwrap();
    let report = textclass::evaluate(&model, &test).unwrap();

    let metrics = match &report {
        MetricsReport::Binary(m) => m,
        other => panic!("expected binary metrics, got {:?}", other),
    };
    assert!(metrics.accuracy >= 0.8, "accuracy {}", metrics.accuracy);
    let auc = metrics.auc.unwrap();
    assert!((0.0..=1.0).contains(&auc));
    assert!(auc >= 0.8, "auc {}", auc);
    assert_eq!(metrics.n_samples, 40);
    assert_eq!(metrics.confusion_matrix.total(), 40);

    let prediction = textclass::predict(&model, &sentiment_record("This was a very bad steak")).unwrap();
    match prediction {
        Prediction::Binary { label, probability, .. } => {
            assert!(!label, "expected negative, probability {}", probability);
            assert!((0.0..=1.0).contains(&probability));
        }
        other => panic!("expected binary prediction, got {:?}", other),
    }
}

#[test]
fn test_probability_is_monotone_in_score() {
    let rows = sentiment_rows(120);
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let model = textclass::fit(&spec, &rows).unwrap();

    let mut pairs: Vec<(f64, f64)> = ["great steak", "bad steak", "the place", "awful rude waiter", "loved it"]
        .iter()
        .map(|text| match textclass::predict(&model, &sentiment_record(text)).unwrap() {
            Prediction::Binary { score, probability, .. } => (score, probability),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in pairs.windows(2) {
        assert!(w[0].1 <= w[1].1);
    }
}

#[test]
fn test_single_class_test_set_has_no_auc() {
    let rows = sentiment_rows(100);
    let spec = build_pipeline(&RecordSchema::sentiment(), &fast_sentiment_config()).unwrap();
    let model = textclass::fit(&spec, &rows).unwrap();

    let positives: Vec<_> = sentiment_rows(20).into_iter().step_by(2).collect();
    match Evaluator::new().evaluate(&model, &positives).unwrap() {
        MetricsReport::Binary(m) => assert!(m.auc.is_none()),
        other => panic!("expected binary metrics, got {:?}", other),
    }
}

// ============================================================================
// Multi-class issues
// ============================================================================

#[test]
fn test_multiclass_end_to_end() {
    let rows = issue_rows(150);
    let (train, test) = train_test_split(&rows, &SplitConfig::default().with_test_fraction(0.2)).unwrap();

    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &train).unwrap();
    let report = Evaluator::new().with_top_k(2).evaluate(&model, &test).unwrap();

    let metrics = match &report {
        MetricsReport::MultiClass(m) => m,
        other => panic!("expected multi-class metrics, got {:?}", other),
    };
    assert!(metrics.micro_accuracy >= 0.8, "micro accuracy {}", metrics.micro_accuracy);
    assert!(metrics.macro_accuracy >= 0.0 && metrics.macro_accuracy <= 1.0);
    assert!(metrics.top_k_accuracy >= metrics.micro_accuracy);
    assert_eq!(metrics.per_class_log_loss.len(), AREAS.len());
    assert_eq!(metrics.unknown_label_rows, 0);

    let prediction = textclass::predict(
        &model,
        &issue_record("Entity Framework crashes", "When connecting to the database, EF is crashing"),
    )
    .unwrap();
    match prediction {
        Prediction::MultiClass { label, scores, confidence, .. } => {
            assert!(AREAS.contains(&label.as_str()));
            assert_eq!(scores.len(), AREAS.len());
            assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(confidence > 0.0);
        }
        other => panic!("expected multi-class prediction, got {:?}", other),
    }
}

#[test]
fn test_unseen_test_label_counts_as_incorrect() {
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &issue_rows(60)).unwrap();

    let schema = RecordSchema::github_issues();
    let test = vec![
        schema
            .record()
            .category("Area", "Security")
            .text("Title", "socket timeout")
            .text("Description", "http connection drops")
            .build()
            .unwrap(),
        schema
            .record()
            .category("Area", "Networking")
            .text("Title", "socket timeout")
            .text("Description", "http connection drops")
            .build()
            .unwrap(),
    ];
    match Evaluator::new().evaluate(&model, &test).unwrap() {
        MetricsReport::MultiClass(m) => {
            assert_eq!(m.unknown_label_rows, 1);
            assert!((m.micro_accuracy - 0.5).abs() < 1e-12);
        }
        other => panic!("expected multi-class metrics, got {:?}", other),
    }
}

#[test]
fn test_evaluate_rejects_empty_rows() {
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let model = Trainer::new().fit(&spec, &issue_rows(30)).unwrap();
    assert!(Evaluator::new().evaluate(&model, &[]).is_err());
}

#[test]
fn test_fit_rejects_empty_rows() {
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    assert!(Trainer::new().fit(&spec, &[]).is_err());
}

// ============================================================================
// Cross-validation
// ============================================================================

#[test]
fn test_cross_validation_folds() {
    let rows = issue_rows(90);
    let spec = build_pipeline(&RecordSchema::github_issues(), &PipelineConfig::issues()).unwrap();
    let result = cross_validate(&spec, &rows, 3, Some(7)).unwrap();

    assert_eq!(result.fold_reports.len(), 3);
    let total: usize = result.fold_reports.iter().map(|r| r.n_samples()).sum();
    assert_eq!(total, 90);
    assert!(result.mean_accuracy >= 0.7, "mean accuracy {}", result.mean_accuracy);
    assert!(result.std_accuracy >= 0.0);
}

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use textclass::feature_engineering::{FeaturizerConfig, TextFeaturizer};
use textclass::inference::{InferenceConfig, PredictionEngine};
use textclass::pipeline::{build_pipeline, PipelineConfig};
use textclass::schema::{Record, RecordSchema};
use textclass::training::{EstimatorConfig, GradientBoostingConfig, Trainer};

const POSITIVE: &[&str] = &["great", "loved", "delicious", "amazing", "friendly", "fresh"];
const NEGATIVE: &[&str] = &["bad", "terrible", "awful", "rude", "bland", "stale"];
const FILLER: &[&str] = &["the", "steak", "service", "was", "and", "pizza", "really", "place"];

fn create_sentiment_rows(n_rows: usize) -> Vec<Record> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let schema = RecordSchema::sentiment();

    (0..n_rows)
        .map(|_| {
            let positive: bool = rng.gen();
            let words = if positive { POSITIVE } else { NEGATIVE };
            let mut text: Vec<&str> = (0..8).map(|_| *FILLER.choose(&mut rng).unwrap_or(&"the")).collect();
            let at = rng.gen_range(0..text.len());
            text.insert(at, *words.choose(&mut rng).unwrap_or(&"ok"));
            schema
                .record()
                .text("SentimentText", text.join(" "))
                .boolean("Sentiment", positive)
                .build()
                .unwrap()
        })
        .collect()
}

fn bench_featurize(c: &mut Criterion) {
    let rows = create_sentiment_rows(1000);
    let corpus: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get(0).and_then(|v| v.as_text()).map(str::to_string))
        .collect();

    let mut group = c.benchmark_group("featurize");
    group.bench_function("fit_vocabulary", |b| {
        let featurizer = TextFeaturizer::new(FeaturizerConfig::default());
        b.iter(|| featurizer.fit(black_box(&corpus)).unwrap())
    });

    let fitted = TextFeaturizer::new(FeaturizerConfig::default()).fit(&corpus).unwrap();
    group.bench_function("transform_batch", |b| {
        b.iter(|| fitted.transform_batch(black_box(&corpus)))
    });
    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let config = PipelineConfig::sentiment().with_estimator(EstimatorConfig::GradientBoosting(
        GradientBoostingConfig::default()
            .with_n_estimators(20)
            .with_max_leaves(20)
            .with_min_samples_leaf(10),
    ));
    let spec = build_pipeline(&RecordSchema::sentiment(), &config).unwrap();

    for n_rows in [250, 500, 1000].iter() {
        let rows = create_sentiment_rows(*n_rows);
        group.bench_with_input(BenchmarkId::new("fit", n_rows), &rows, |b, rows| {
            b.iter(|| Trainer::new().fit(&spec, black_box(rows)).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let spec = build_pipeline(&RecordSchema::sentiment(), &PipelineConfig::sentiment()).unwrap();
    let model = Trainer::new().fit(&spec, &create_sentiment_rows(1000)).unwrap();
    let rows = create_sentiment_rows(1000);

    let sequential = PredictionEngine::from_pipeline(model.clone());
    let parallel = PredictionEngine::new(
        std::sync::Arc::new(model),
        InferenceConfig::default().with_parallel(true),
    );

    group.bench_function("single", |b| b.iter(|| sequential.predict_one(black_box(&rows[0])).unwrap()));
    group.bench_function("batch_sequential", |b| b.iter(|| sequential.predict_batch(black_box(&rows))));
    group.bench_function("batch_parallel", |b| b.iter(|| parallel.predict_batch(black_box(&rows))));

    group.finish();
}

criterion_group!(benches, bench_featurize, bench_training, bench_prediction);
criterion_main!(benches);

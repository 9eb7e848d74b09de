//! textclass CLI Module
//!
//! Command-line interface for training, evaluation, prediction and archive
//! inspection.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::export::{load_model, save_model, ModelMetadata};
use crate::inference::{InferenceConfig, Prediction, PredictionEngine};
use crate::pipeline::{build_pipeline, PipelineConfig};
use crate::schema::{parse_bool, FieldType, Record, RecordSchema};
use crate::training::{cross_validate, train_test_split, Evaluator, MetricsReport, SplitConfig, Trainer};
use crate::utils::{DataLoader, LoadOptions};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<10}", key)), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_metrics(report: &MetricsReport) {
    for (name, value) in report.summary() {
        let shown = match value {
            Some(v) => format!("{:.4}", v).white().bold(),
            None => "n/a".truecolor(140, 140, 140),
        };
        println!("  {:<22} {}", muted(name), shown);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "textclass")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, evaluate and serve text classification pipelines")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Built-in schema and pipeline presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// SentimentText / Sentiment, header-less TSV, boosted trees
    Sentiment,
    /// ID / Area / Title / Description, TSV with header, softmax regression
    Issues,
}

impl Preset {
    pub fn schema(self) -> RecordSchema {
        match self {
            Preset::Sentiment => RecordSchema::sentiment(),
            Preset::Issues => RecordSchema::github_issues(),
        }
    }

    pub fn pipeline(self) -> PipelineConfig {
        match self {
            Preset::Sentiment => PipelineConfig::sentiment(),
            Preset::Issues => PipelineConfig::issues(),
        }
    }

    pub fn load_options(self) -> LoadOptions {
        match self {
            Preset::Sentiment => LoadOptions::sentiment(),
            Preset::Issues => LoadOptions::issues(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a pipeline, report held-out metrics and save the archive
    Train {
        /// Schema and pipeline preset
        #[arg(short, long, value_enum)]
        preset: Preset,

        /// Tab-delimited training file
        #[arg(short, long)]
        data: PathBuf,

        /// JSON pipeline configuration overriding the preset
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Seed for the split and the estimator
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Also run k-fold cross-validation with this many folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Output model archive
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate a saved model on a labelled file
    Evaluate {
        /// Model archive
        #[arg(short, long)]
        model: PathBuf,

        /// Tab-delimited labelled file
        #[arg(short, long)]
        data: PathBuf,

        /// The file starts with a header line
        #[arg(long)]
        header: bool,
    },

    /// Predict rows with a saved model
    Predict {
        /// Model archive
        #[arg(short, long)]
        model: PathBuf,

        /// Text for the first text field of the schema
        #[arg(short, long, conflicts_with = "data")]
        text: Option<String>,

        /// Field assignments as NAME=VALUE
        #[arg(short, long = "field", value_name = "NAME=VALUE", conflicts_with = "data")]
        fields: Vec<String>,

        /// Tab-delimited file of rows; the label column may be omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// The file starts with a header line
        #[arg(long)]
        header: bool,

        /// Predict file rows in parallel
        #[arg(long)]
        parallel: bool,

        /// Write predictions as TSV instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show model archive metadata
    Info {
        /// Model archive
        #[arg(short, long)]
        model: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    preset: Preset,
    data_path: &Path,
    config_path: Option<&Path>,
    test_fraction: f64,
    seed: u64,
    cv_folds: Option<usize>,
    output: &Path,
) -> anyhow::Result<()> {
    section("Train");

    let schema = preset.schema();
    let config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => preset.pipeline(),
    }
    .with_seed(Some(seed));

    step_run("Loading data");
    let start = Instant::now();
    let records = DataLoader::new(preset.load_options()).load(data_path, &schema)?;
    step_done(&format!("{} rows in {:?}", records.len(), start.elapsed()));

    let split = SplitConfig::default()
        .with_test_fraction(test_fraction)
        .with_seed(Some(seed));
    let (train, test) = train_test_split(&records, &split)?;
    println!("  {:<16} {} train / {} test", muted("Split"), train.len(), test.len());

    let spec = build_pipeline(&schema, &config)?;

    step_run(&format!("Fitting {}", config.estimator.name().cyan()));
    let start = Instant::now();
    let model = Trainer::new().fit(&spec, &train)?;
    step_done(&format!("{} features in {:?}", model.feature_dim(), start.elapsed()));

    step_run("Evaluating");
    let report = Evaluator::new().evaluate(&model, &test)?;
    step_done(&format!("{} rows", test.len()));

    section("Metrics");
    print_metrics(&report);

    if let Some(k) = cv_folds {
        step_run(&format!("Cross-validating ({} folds)", k));
        let start = Instant::now();
        let cv = cross_validate(&spec, &records, k, Some(seed))?;
        step_done(&format!("{:?}", start.elapsed()));
        println!(
            "  {:<22} {}",
            muted("CV accuracy"),
            format!("{:.4} ± {:.4}", cv.mean_accuracy, cv.std_accuracy).white().bold()
        );
    }

    step_run(&format!("Saving → {}", output.display()));
    let metadata = save_model(&model, output, Some(report))?;
    step_done(&metadata.model_id.to_string());

    println!();
    Ok(())
}

pub fn cmd_evaluate(model_path: &Path, data_path: &Path, header: bool) -> anyhow::Result<()> {
    section("Evaluate");

    let (model, metadata) = load_model(model_path)?;
    let options = LoadOptions::default().with_header(header);

    step_run("Loading data");
    let records = DataLoader::new(options).load(data_path, &metadata.schema)?;
    step_done(&format!("{} rows", records.len()));

    let report = Evaluator::new().evaluate(&model, &records)?;
    section("Metrics");
    print_metrics(&report);

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    text: Option<&str>,
    fields: &[String],
    data_path: Option<&Path>,
    header: bool,
    parallel: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let (model, metadata) = load_model(model_path)?;
    let schema = metadata.schema.clone();
    let config = InferenceConfig::default().with_parallel(parallel);
    let engine = PredictionEngine::new(Arc::new(model), config);

    let records = match data_path {
        Some(path) => DataLoader::new(LoadOptions::default().with_header(header)).load_unlabeled(path, &schema)?,
        None => vec![record_from_args(&schema, text, fields)?],
    };

    let batch = engine.predict_batch(&records);

    if let Some(path) = output {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["Row", "Prediction", "Confidence", "Error"])?;
        for (i, result) in batch.iter().enumerate() {
            let row = (i + 1).to_string();
            match result {
                Ok(p) => writer.write_record([row, p.label_text(), format!("{:.6}", confidence(p)), String::new()])?,
                Err(e) => writer.write_record([row, String::new(), String::new(), e.to_string()])?,
            }
        }
        writer.flush()?;
        println!("  {} {} predictions → {}", ok("✓"), batch.len(), path.display());
        return Ok(());
    }

    section("Predictions");
    for (i, result) in batch.iter().enumerate() {
        match result {
            Ok(p) => println!(
                "  {:>5}  {:<24} {}",
                muted(&(i + 1).to_string()),
                p.label_text().white().bold(),
                dim(&format!("{:.4}", confidence(p)))
            ),
            Err(e) => println!("  {:>5}  {}", muted(&(i + 1).to_string()), e.to_string().red()),
        }
    }
    let failures = batch.failures().len();
    if failures > 0 {
        println!();
        println!("  {}", format!("{} of {} rows failed", failures, batch.len()).yellow());
    }
    println!();
    Ok(())
}

pub fn cmd_info(model_path: &Path) -> anyhow::Result<()> {
    let (_, metadata) = load_model(model_path)?;
    print_metadata(&metadata);
    Ok(())
}

// ─── Helpers ───────────────────────────────────────────────────────────────────

fn confidence(prediction: &Prediction) -> f64 {
    match prediction {
        Prediction::Binary { probability, .. } => *probability,
        Prediction::MultiClass { confidence, .. } => *confidence,
    }
}

/// Build a record from `--text` and `--field NAME=VALUE` arguments
fn record_from_args(schema: &RecordSchema, text: Option<&str>, fields: &[String]) -> anyhow::Result<Record> {
    let mut builder = schema.record();
    if let Some(text) = text {
        let first = schema
            .text_fields()
            .next()
            .ok_or_else(|| anyhow::anyhow!("schema '{}' has no text field", schema.name()))?;
        builder = builder.text(&first.name, text);
    }
    for assignment in fields {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected NAME=VALUE, got '{}'", assignment))?;
        if name == schema.label_name() {
            anyhow::bail!("'{}' is the label; it is not an input", name);
        }
        builder = match schema.field(name).map(|f| f.field_type) {
            Some(FieldType::Text) | Some(FieldType::Ignored) => builder.text(name, value),
            Some(FieldType::Categorical) => builder.category(name, value),
            Some(FieldType::Boolean) => match parse_bool(value) {
                Some(flag) => builder.boolean(name, flag),
                None => anyhow::bail!("field '{}': cannot parse '{}' as boolean", name, value),
            },
            None => anyhow::bail!("unknown field '{}' for schema '{}'", name, schema.name()),
        };
    }
    if text.is_none() && fields.is_empty() {
        anyhow::bail!("nothing to predict: pass --text, --field or --data");
    }
    Ok(builder.build()?)
}

fn print_metadata(metadata: &ModelMetadata) {
    println!();
    line_box_top();
    line_box(&format!("{}", "Model archive".white().bold()));
    line_box_sep();
    line_box(&kv("Id", &metadata.model_id.to_string()));
    line_box(&kv("Created", &metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    line_box(&kv("Version", &metadata.crate_version));
    line_box(&kv("Schema", metadata.schema.name()));
    line_box(&kv("Task", &metadata.task.to_string()));
    line_box(&kv("Features", &metadata.feature_dim.to_string()));
    if !metadata.labels.is_empty() {
        line_box(&kv("Classes", &metadata.labels.len().to_string()));
    }
    line_box_bottom();

    section("Fields");
    for field in metadata.schema.fields() {
        let marker = if field.name == metadata.schema.label_name() { " (label)" } else { "" };
        println!("  {:<20} {}{}", field.name, muted(&field.field_type.to_string()), accent(marker));
    }

    if let Some(report) = &metadata.metrics {
        section("Held-out metrics");
        print_metrics(report);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "abc".red());
        assert_eq!(strip_ansi(&colored), "abc");
    }

    #[test]
    fn test_record_from_args() {
        let schema = RecordSchema::github_issues();
        let record = record_from_args(
            &schema,
            Some("Crash on startup"),
            &["Description=The app crashes".to_string()],
        )
        .unwrap();
        assert!(schema.validate_record(&record, 1, false).is_ok());

        assert!(record_from_args(&schema, None, &[]).is_err());
        assert!(record_from_args(&schema, None, &["Body=x".to_string()]).is_err());
    }

    #[test]
    fn test_label_field_is_not_an_input() {
        let issues = RecordSchema::github_issues();
        let err = record_from_args(&issues, Some("Crash"), &["Area=UI".to_string()]).unwrap_err();
        assert!(err.to_string().contains("label"), "{}", err);

        let sentiment = RecordSchema::sentiment();
        assert!(record_from_args(&sentiment, Some("great"), &["Sentiment=1".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "textclass", "train", "--preset", "issues", "--data", "issues.tsv", "--output", "m.bin",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Train { preset: Preset::Issues, .. }));
    }
}

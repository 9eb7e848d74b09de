//! Shared fixtures for integration tests

#![allow(dead_code)]

use textclass::pipeline::PipelineConfig;
use textclass::schema::{Record, RecordSchema};
use textclass::training::{EstimatorConfig, GradientBoostingConfig};

const POSITIVE: &[&str] = &["great", "loved", "delicious", "amazing", "friendly"];
const NEGATIVE: &[&str] = &["bad", "terrible", "awful", "rude", "bland"];
const NOUNS: &[&str] = &["steak", "service", "pizza", "waiter", "place", "burger", "salad", "dessert"];

/// Sentiment sentences: even rows positive, odd rows negative
pub fn sentiment_lines(n: usize) -> Vec<(String, bool)> {
    (0..n)
        .map(|i| {
            let positive = i % 2 == 0;
            let words = if positive { POSITIVE } else { NEGATIVE };
            let adj = words[(i / 2) % words.len()];
            let other = words[(i / 2 + 3) % words.len()];
            let noun = NOUNS[(i * 5 / 2) % NOUNS.len()];
            let text = match i % 3 {
                0 => format!("The {} was {}", noun, adj),
                1 => format!("{} {} and {} atmosphere", adj, noun, other),
                _ => format!("Really {} {}, so {}", adj, noun, other),
            };
            (text, positive)
        })
        .collect()
}

pub fn sentiment_rows(n: usize) -> Vec<Record> {
    let schema = RecordSchema::sentiment();
    sentiment_lines(n)
        .into_iter()
        .map(|(text, label)| {
            schema
                .record()
                .text("SentimentText", text)
                .boolean("Sentiment", label)
                .build()
                .unwrap()
        })
        .collect()
}

/// Header-less TSV in the sentiment layout
pub fn sentiment_tsv(n: usize) -> String {
    sentiment_lines(n)
        .into_iter()
        .map(|(text, label)| format!("{}\t{}\n", text, if label { 1 } else { 0 }))
        .collect()
}

pub const AREAS: &[&str] = &["Networking", "UI", "Database"];

const AREA_WORDS: &[&[&str]] = &[
    &["socket", "http", "connection", "timeout", "dns", "proxy"],
    &["button", "window", "render", "layout", "click", "font"],
    &["query", "database", "sql", "table", "transaction", "index"],
];

/// Issue rows cycling through [`AREAS`]: (id, area, title, description)
pub fn issue_fields(n: usize) -> Vec<(String, String, String, String)> {
    (0..n)
        .map(|i| {
            let area = i % AREAS.len();
            let words = AREA_WORDS[area];
            let a = words[(i / 3) % words.len()];
            let b = words[(i / 3 + 2) % words.len()];
            let c = words[(i / 3 + 4) % words.len()];
            (
                (i + 1).to_string(),
                AREAS[area].to_string(),
                format!("{} fails after {}", a, b),
                format!("When using the {} the {} breaks with {}", b, c, a),
            )
        })
        .collect()
}

pub fn issue_rows(n: usize) -> Vec<Record> {
    let schema = RecordSchema::github_issues();
    issue_fields(n)
        .into_iter()
        .map(|(_, area, title, description)| {
            schema
                .record()
                .category("Area", area)
                .text("Title", title)
                .text("Description", description)
                .build()
                .unwrap()
        })
        .collect()
}

/// TSV with header in the issue layout
pub fn issue_tsv(n: usize) -> String {
    let mut out = String::from("ID\tArea\tTitle\tDescription\n");
    for (id, area, title, description) in issue_fields(n) {
        out.push_str(&format!("{}\t{}\t{}\t{}\n", id, area, title, description));
    }
    out
}

/// Small boosted-tree configuration that fits quickly in tests
pub fn fast_sentiment_config() -> PipelineConfig {
    PipelineConfig::sentiment().with_estimator(EstimatorConfig::GradientBoosting(
        GradientBoostingConfig::default()
            .with_n_estimators(30)
            .with_max_leaves(8)
            .with_min_samples_leaf(2),
    ))
}

pub fn sentiment_record(text: &str) -> Record {
    RecordSchema::sentiment()
        .record()
        .text("SentimentText", text)
        .build()
        .unwrap()
}

pub fn issue_record(title: &str, description: &str) -> Record {
    RecordSchema::github_issues()
        .record()
        .text("Title", title)
        .text("Description", description)
        .build()
        .unwrap()
}

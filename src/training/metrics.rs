//! Evaluation metrics

use serde::{Deserialize, Serialize};
use std::fmt;

const EPS: f64 = 1e-15;

/// Counts indexed `[actual][predicted]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub class_names: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(class_names: Vec<String>) -> Self {
        let k = class_names.len();
        Self {
            class_names,
            counts: vec![vec![0; k]; k],
        }
    }

    pub fn add(&mut self, actual: usize, predicted: usize) {
        self.counts[actual][predicted] += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Recall per class; `None` for classes absent from the actual labels
    pub fn per_class_recall(&self) -> Vec<Option<f64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let n: usize = row.iter().sum();
                (n > 0).then(|| row[i] as f64 / n as f64)
            })
            .collect()
    }
}

/// Binary classification report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    /// Area under the ROC curve; `None` when the rows hold a single class
    pub auc: Option<f64>,
    /// Area under the precision-recall curve (average precision)
    pub auprc: Option<f64>,
    pub f1_score: f64,
    pub positive_precision: f64,
    pub positive_recall: f64,
    pub negative_precision: f64,
    pub negative_recall: f64,
    pub log_loss: f64,
    /// Relative improvement in log-loss over the label prior
    pub log_loss_reduction: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub n_samples: usize,
}

impl BinaryMetrics {
    /// Compute from true labels, probabilities of the positive class and predicted labels
    pub fn compute(y_true: &[bool], probabilities: &[f64], y_pred: &[bool]) -> Self {
        let n = y_true.len();
        let mut cm = ConfusionMatrix::new(vec!["false".into(), "true".into()]);
        for (&t, &p) in y_true.iter().zip(y_pred) {
            cm.add(usize::from(t), usize::from(p));
        }
        let tn = cm.counts[0][0] as f64;
        let fp = cm.counts[0][1] as f64;
        let fn_ = cm.counts[1][0] as f64;
        let tp = cm.counts[1][1] as f64;

        let positive_precision = ratio(tp, tp + fp);
        let positive_recall = ratio(tp, tp + fn_);
        let negative_precision = ratio(tn, tn + fn_);
        let negative_recall = ratio(tn, tn + fp);
        let f1_score = if positive_precision + positive_recall > 0.0 {
            2.0 * positive_precision * positive_recall / (positive_precision + positive_recall)
        } else {
            0.0
        };

        let log_loss = y_true
            .iter()
            .zip(probabilities)
            .map(|(&t, &p)| {
                let p = p.clamp(EPS, 1.0 - EPS);
                if t {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum::<f64>()
            / n.max(1) as f64;
        let prior = (tp + fn_) / n.max(1) as f64;
        let prior_log_loss = entropy(&[prior, 1.0 - prior]);

        Self {
            accuracy: ratio(tp + tn, n as f64),
            auc: roc_auc(y_true, probabilities),
            auprc: average_precision(y_true, probabilities),
            f1_score,
            positive_precision,
            positive_recall,
            negative_precision,
            negative_recall,
            log_loss,
            log_loss_reduction: reduction(log_loss, prior_log_loss),
            confusion_matrix: cm,
            n_samples: n,
        }
    }
}

/// Multi-class classification report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiClassMetrics {
    /// Fraction of all rows predicted correctly
    pub micro_accuracy: f64,
    /// Mean of per-class accuracies over classes present in the rows
    pub macro_accuracy: f64,
    pub log_loss: f64,
    pub log_loss_reduction: f64,
    /// Mean log-loss per true class; `None` for classes absent from the rows
    pub per_class_log_loss: Vec<Option<f64>>,
    pub top_k: usize,
    pub top_k_accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    /// Rows whose true label has no key in the fitted mapping
    pub unknown_label_rows: usize,
    pub n_samples: usize,
}

impl MultiClassMetrics {
    /// Compute from true keys (`None` for unseen labels), per-class scores and predicted keys.
    /// Rows with an unseen true label count as incorrect and are left out of
    /// log-loss and the confusion matrix.
    pub fn compute(
        y_true: &[Option<u32>],
        scores: &[Vec<f64>],
        y_pred: &[u32],
        class_names: Vec<String>,
        top_k: usize,
    ) -> Self {
        let n = y_true.len();
        let k = class_names.len();
        let mut cm = ConfusionMatrix::new(class_names);
        let mut correct = 0usize;
        let mut top_k_hits = 0usize;
        let mut unknown = 0usize;
        let mut class_loss = vec![0.0; k];
        let mut class_count = vec![0usize; k];

        for ((truth, row_scores), &pred) in y_true.iter().zip(scores).zip(y_pred) {
            let Some(t) = truth.map(|t| t as usize) else {
                unknown += 1;
                continue;
            };
            cm.add(t, pred as usize);
            if t == pred as usize {
                correct += 1;
            }
            if in_top_k(row_scores, t, top_k) {
                top_k_hits += 1;
            }
            let p = row_scores.get(t).copied().unwrap_or(0.0).clamp(EPS, 1.0);
            class_loss[t] -= p.ln();
            class_count[t] += 1;
        }

        let known = n - unknown;
        let log_loss = class_loss.iter().sum::<f64>() / known.max(1) as f64;
        let priors: Vec<f64> = class_count
            .iter()
            .map(|&c| c as f64 / known.max(1) as f64)
            .collect();
        let recalls: Vec<f64> = cm.per_class_recall().into_iter().flatten().collect();

        Self {
            micro_accuracy: ratio(correct as f64, n as f64),
            macro_accuracy: if recalls.is_empty() {
                0.0
            } else {
                recalls.iter().sum::<f64>() / recalls.len() as f64
            },
            log_loss,
            log_loss_reduction: reduction(log_loss, entropy(&priors)),
            per_class_log_loss: class_loss
                .iter()
                .zip(&class_count)
                .map(|(&l, &c)| (c > 0).then(|| l / c as f64))
                .collect(),
            top_k,
            top_k_accuracy: ratio(top_k_hits as f64, n as f64),
            confusion_matrix: cm,
            unknown_label_rows: unknown,
            n_samples: n,
        }
    }
}

/// Task-shaped metrics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricsReport {
    Binary(BinaryMetrics),
    MultiClass(MultiClassMetrics),
}

impl MetricsReport {
    /// Fraction of rows predicted correctly (micro accuracy for multi-class)
    pub fn accuracy(&self) -> f64 {
        match self {
            MetricsReport::Binary(m) => m.accuracy,
            MetricsReport::MultiClass(m) => m.micro_accuracy,
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            MetricsReport::Binary(m) => m.n_samples,
            MetricsReport::MultiClass(m) => m.n_samples,
        }
    }

    /// Headline metrics as (name, value) pairs, in display order
    pub fn summary(&self) -> Vec<(&'static str, Option<f64>)> {
        match self {
            MetricsReport::Binary(m) => vec![
                ("Accuracy", Some(m.accuracy)),
                ("AUC", m.auc),
                ("F1 Score", Some(m.f1_score)),
                ("AUPRC", m.auprc),
                ("Log-loss", Some(m.log_loss)),
            ],
            MetricsReport::MultiClass(m) => vec![
                ("MicroAccuracy", Some(m.micro_accuracy)),
                ("MacroAccuracy", Some(m.macro_accuracy)),
                ("LogLoss", Some(m.log_loss)),
                ("LogLossReduction", Some(m.log_loss_reduction)),
            ],
        }
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .summary()
            .into_iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{}: {:.4}", name, v),
                None => format!("{}: n/a", name),
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn entropy(priors: &[f64]) -> f64 {
    priors
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}

fn reduction(log_loss: f64, prior_log_loss: f64) -> f64 {
    if prior_log_loss > 0.0 {
        1.0 - log_loss / prior_log_loss
    } else {
        0.0
    }
}

fn in_top_k(scores: &[f64], target: usize, k: usize) -> bool {
    let Some(&target_score) = scores.get(target) else {
        return false;
    };
    // classes ranked ahead of the target: higher score, or equal score and lower key
    let ahead = scores
        .iter()
        .enumerate()
        .filter(|&(i, &s)| s > target_score || (s == target_score && i < target))
        .count();
    ahead < k
}

/// ROC AUC via the rank statistic, ties averaged
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Average precision over score thresholds, tied scores treated as one threshold
pub fn average_precision(y_true: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t).count();
    if n_pos == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        for &idx in &order[i..=j] {
            seen += 1;
            if y_true[idx] {
                tp += 1;
            }
        }
        let recall = tp as f64 / n_pos as f64;
        let precision = tp as f64 / seen as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
        i = j + 1;
    }
    Some(ap)
}

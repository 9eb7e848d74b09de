//! Regression trees over sparse feature vectors
//!
//! Trees are grown leaf-wise: the leaf whose best split has the largest gain
//! is expanded next, until `max_leaves` is reached or no split improves the
//! second-order objective. Entries absent from a sparse row are zeros and are
//! scanned as a single group, so split search only touches stored values.

use crate::feature_engineering::SparseVector;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Tree growth parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_leaves: usize,
    pub min_samples_leaf: usize,
    /// L2 regularization on leaf values
    pub reg_lambda: f64,
    /// Minimum gain required to split
    pub min_split_gain: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_leaves: 20,
            min_samples_leaf: 10,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
        }
    }
}

/// Arena node; children are indices into the tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: u32,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

fn compute_leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    -g / (h + lambda)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: u32,
    threshold: f64,
    gain: f64,
}

struct PendingSplit {
    gain: f64,
    node_id: usize,
    feature: u32,
    threshold: f64,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    // equal gains: the older node wins
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split {
        feature: u32,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Aggregated gradient statistics for one distinct feature value
struct Bin {
    value: f64,
    g: f64,
    h: f64,
    count: usize,
}

impl RegressionTree {
    /// Fit to gradients/hessians over `rows[indices]`
    pub fn fit(
        rows: &[SparseVector],
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
        let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();

        if let Some(best) = find_best_split(rows, gradients, hessians, indices, params) {
            heap.push(PendingSplit {
                gain: best.gain,
                node_id: 0,
                feature: best.feature,
                threshold: best.threshold,
            });
        }

        let mut n_leaves = 1usize;
        while n_leaves < params.max_leaves.max(1) {
            let split = match heap.pop() {
                Some(s) if s.gain > params.min_split_gain => s,
                _ => break,
            };

            let leaf_rows = match std::mem::replace(&mut nodes[split.node_id], NodeSlot::Leaf(Vec::new())) {
                NodeSlot::Leaf(r) => r,
                other => {
                    nodes[split.node_id] = other;
                    continue;
                }
            };
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf_rows
                .iter()
                .partition(|&&i| rows[i].get(split.feature as usize) <= split.threshold);

            let left_id = nodes.len();
            let right_id = left_id + 1;
            for (child_id, child_rows) in [(left_id, &left_rows), (right_id, &right_rows)] {
                if let Some(best) = find_best_split(rows, gradients, hessians, child_rows, params) {
                    heap.push(PendingSplit {
                        gain: best.gain,
                        node_id: child_id,
                        feature: best.feature,
                        threshold: best.threshold,
                    });
                }
            }

            nodes.push(NodeSlot::Leaf(left_rows));
            nodes.push(NodeSlot::Leaf(right_rows));
            nodes[split.node_id] = NodeSlot::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_id,
                right: right_id,
            };
            n_leaves += 1;
        }

        let nodes = nodes
            .into_iter()
            .map(|slot| match slot {
                NodeSlot::Leaf(idx) => {
                    let g: f64 = idx.iter().map(|&i| gradients[i]).sum();
                    let h: f64 = idx.iter().map(|&i| hessians[i]).sum();
                    TreeNode::Leaf {
                        value: compute_leaf_weight(g, h, params.reg_lambda),
                        n_samples: idx.len(),
                    }
                }
                NodeSlot::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                },
            })
            .collect();

        Self { nodes }
    }

    pub fn predict(&self, x: &SparseVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x.get(*feature as usize) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn get_depth(&self) -> usize {
        fn depth(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth(nodes, *left).max(depth(nodes, *right))
                }
            }
        }
        depth(&self.nodes, 0)
    }
}

fn find_best_split(
    rows: &[SparseVector],
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let min_leaf = params.min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let parent = compute_gain_single(total_g, total_h, params.reg_lambda);

    // (feature, value, row) for every stored entry of the leaf's rows
    let mut entries: Vec<(u32, f64, usize)> = indices
        .iter()
        .flat_map(|&i| rows[i].iter().map(move |(j, v)| (j, v, i)))
        .collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

    let mut best: Option<SplitCandidate> = None;
    let mut start = 0;
    while start < entries.len() {
        let feature = entries[start].0;
        let end = start + entries[start..].iter().take_while(|e| e.0 == feature).count();
        let bins = feature_bins(&entries[start..end], gradients, hessians, n, total_g, total_h);

        let mut left_g = 0.0;
        let mut left_h = 0.0;
        let mut left_n = 0usize;
        for pair in bins.windows(2) {
            left_g += pair[0].g;
            left_h += pair[0].h;
            left_n += pair[0].count;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let gain = compute_gain_single(left_g, left_h, params.reg_lambda)
                + compute_gain_single(total_g - left_g, total_h - left_h, params.reg_lambda)
                - parent;
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (pair[0].value + pair[1].value) / 2.0,
                    gain,
                });
            }
        }
        start = end;
    }

    best.filter(|b| b.gain > 0.0)
}

/// Distinct values of one feature, with the implicit zeros folded into one bin
fn feature_bins(
    entries: &[(u32, f64, usize)],
    gradients: &[f64],
    hessians: &[f64],
    n: usize,
    total_g: f64,
    total_h: f64,
) -> Vec<Bin> {
    let mut raw: Vec<Bin> = Vec::with_capacity(entries.len() + 1);
    let mut nz_g = 0.0;
    let mut nz_h = 0.0;
    for &(_, value, row) in entries {
        nz_g += gradients[row];
        nz_h += hessians[row];
        raw.push(Bin {
            value,
            g: gradients[row],
            h: hessians[row],
            count: 1,
        });
    }
    let zeros = n - entries.len();
    if zeros > 0 {
        let at = raw.partition_point(|b| b.value < 0.0);
        raw.insert(
            at,
            Bin {
                value: 0.0,
                g: total_g - nz_g,
                h: total_h - nz_h,
                count: zeros,
            },
        );
    }

    let mut bins: Vec<Bin> = Vec::with_capacity(raw.len());
    for bin in raw {
        match bins.last_mut() {
            Some(last) if last.value == bin.value => {
                last.g += bin.g;
                last.h += bin.h;
                last.count += bin.count;
            }
            _ => bins.push(bin),
        }
    }
    bins
}

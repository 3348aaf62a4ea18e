//! Gradient-boosted regression trees fitted on the binary log-loss.
//!
//! Trees are stored as flat node arrays addressed by index, and traversal sends a row left when
//! `row[feature] <= threshold`. Leaf weights use the Newton step `-G / (H + lambda)`.

use serde::{Deserialize, Serialize};

use super::{BoostingParams, ClassWeight, RunControl, TrainingError};

const PROBABILITY_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![TreeNode::Leaf { value }],
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Missing columns read as `0.0`, the standardized mean.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Additive ensemble of regression trees over a logit base score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

struct Gradients<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

struct TreeBuilder<'a> {
    matrix: &'a [Vec<f64>],
    gradients: Gradients<'a>,
    params: &'a BoostingParams,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl GradientBoostedClassifier {
    pub fn from_parts(base_score: f64, learning_rate: f64, trees: Vec<RegressionTree>) -> Self {
        Self {
            base_score,
            learning_rate,
            trees,
        }
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Fits one boosting round at a time, checking `control` before each round.
    pub(crate) fn fit(
        matrix: &[Vec<f64>],
        labels: &[bool],
        params: &BoostingParams,
        control: &RunControl,
    ) -> Result<Self, TrainingError> {
        let weights = sample_weights(labels, params.class_weight);
        let total_weight: f64 = weights.iter().sum();
        let positive_weight: f64 = labels
            .iter()
            .zip(&weights)
            .filter(|(label, _)| **label)
            .map(|(_, weight)| weight)
            .sum();

        let prior = if total_weight > 0.0 {
            positive_weight / total_weight
        } else {
            0.5
        };
        let base_score = logit(prior.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR));

        let mut model = Self {
            base_score,
            learning_rate: params.learning_rate,
            trees: Vec::with_capacity(params.n_estimators),
        };
        let mut raw = vec![base_score; labels.len()];
        let mut grad = vec![0.0; labels.len()];
        let mut hess = vec![0.0; labels.len()];

        for _ in 0..params.n_estimators {
            control.check()?;

            for idx in 0..labels.len() {
                let p = sigmoid(raw[idx]);
                let y = if labels[idx] { 1.0 } else { 0.0 };
                grad[idx] = weights[idx] * (p - y);
                hess[idx] = weights[idx] * (p * (1.0 - p)).max(PROBABILITY_FLOOR);
            }

            let tree = TreeBuilder {
                matrix,
                gradients: Gradients {
                    grad: &grad,
                    hess: &hess,
                },
                params,
                nodes: Vec::new(),
            }
            .build();

            for (idx, row) in matrix.iter().enumerate() {
                raw[idx] += params.learning_rate * tree.predict(row);
            }
            model.trees.push(tree);
        }

        Ok(model)
    }

    pub fn decision_function(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision_function(row))
    }
}

impl TreeBuilder<'_> {
    fn build(mut self) -> RegressionTree {
        let rows: Vec<usize> = (0..self.matrix.len()).collect();
        self.grow(rows, 0);
        RegressionTree::new(self.nodes)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let (g, h) = self.sums(&rows);
        self.nodes.push(TreeNode::Leaf {
            value: -g / (h + self.params.reg_lambda),
        });

        if depth >= self.params.max_depth {
            return idx;
        }

        if let Some(best) = self.best_split(&rows, g, h) {
            let left = self.grow(best.left, depth + 1);
            let right = self.grow(best.right, depth + 1);
            self.nodes[idx] = TreeNode::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };
        }

        idx
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &row| {
            (g + self.gradients.grad[row], h + self.gradients.hess[row])
        })
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<BestSplit> {
        let min_child = self.params.min_child_samples.max(1);
        if rows.len() < 2 * min_child {
            return None;
        }

        let lambda = self.params.reg_lambda;
        let parent = g_total * g_total / (h_total + lambda);
        let width = self.matrix.first().map(Vec::len).unwrap_or(0);
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..width {
            let mut order = rows.to_vec();
            order.sort_by(|a, b| self.matrix[*a][feature].total_cmp(&self.matrix[*b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pos in 0..order.len() - 1 {
                let row = order[pos];
                g_left += self.gradients.grad[row];
                h_left += self.gradients.hess[row];

                let left_count = pos + 1;
                let right_count = order.len() - left_count;
                if left_count < min_child || right_count < min_child {
                    continue;
                }

                let current = self.matrix[row][feature];
                let next = self.matrix[order[pos + 1]][feature];
                if next <= current {
                    continue;
                }

                let h_right = h_total - h_left;
                if h_left < self.params.min_sum_hessian || h_right < self.params.min_sum_hessian {
                    continue;
                }

                let g_right = g_total - g_left;
                let gain = g_left * g_left / (h_left + lambda)
                    + g_right * g_right / (h_right + lambda)
                    - parent;

                if gain > best.map(|(_, _, gain)| gain).unwrap_or(f64::EPSILON) {
                    best = Some((feature, (current + next) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, _) = best?;
        let (left, right) = rows
            .iter()
            .copied()
            .partition(|&row| self.matrix[row][feature] <= threshold);

        Some(BestSplit {
            feature,
            threshold,
            left,
            right,
        })
    }
}

fn sample_weights(labels: &[bool], class_weight: ClassWeight) -> Vec<f64> {
    let positives = labels.iter().filter(|label| **label).count();
    let negatives = labels.len() - positives;

    match class_weight {
        ClassWeight::Balanced if positives > 0 && negatives > 0 => {
            let total = labels.len() as f64;
            let positive = total / (2.0 * positives as f64);
            let negative = total / (2.0 * negatives as f64);
            labels
                .iter()
                .map(|label| if *label { positive } else { negative })
                .collect()
        }
        _ => vec![1.0; labels.len()],
    }
}

pub(crate) fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn logit(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}

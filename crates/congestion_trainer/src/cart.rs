//! CART (Classification and Regression Tree) builder
//!
//! Deterministic exact-greedy regression trees in fixed-point arithmetic.
//! Candidate thresholds sit on a quantization grid: a split sends every
//! sample whose value falls in a grid cell at or below the threshold left.

use congestion_core::gbdt::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Grid width for candidate thresholds (fixed-point, > 0)
    pub quant_step: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 8,
            quant_step: 1000,
        }
    }
}

/// Sample with features, gradient, and hessian
#[derive(Clone, Debug)]
struct Sample<'a> {
    features: &'a [i64],
    gradient: i64,
    hessian: i64,
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree on one round of gradients
pub struct CartBuilder<'a> {
    config: TreeConfig,
    samples: Vec<Sample<'a>>,
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    /// `features`, `gradients` and `hessians` are aligned by row
    pub fn new(
        features: &'a [Vec<i64>],
        gradients: &[i64],
        hessians: &[i64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let samples: Vec<Sample<'a>> = features
            .iter()
            .zip(gradients.iter().zip(hessians))
            .map(|(f, (&g, &h))| Sample {
                features: f.as_slice(),
                gradient: g,
                hessian: h,
            })
            .collect();

        let feature_count = samples.first().map_or(0, |s| s.features.len());

        Self {
            config,
            samples,
            feature_count,
        }
    }

    /// Build the tree; `weight` is its contribution factor in the ensemble
    pub fn build(&self, weight: i64) -> Tree {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.samples.len()).collect();

        self.build_node(&indices, 0, &mut nodes, 0);

        Tree::new(nodes, weight)
    }

    /// Recursively build tree nodes; children are always appended after
    /// their parent
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        node_id: usize,
    ) -> i32 {
        let current = nodes.len() as i32;

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(indices, node_id)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current, self.calculate_leaf_value(indices)));
            return current;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&idx| self.samples[idx].features[split.feature_idx] <= split.threshold);

        // Reserve the parent slot, patch child links once they exist
        nodes.push(Node::internal(current, split.feature_idx as i32, split.threshold, -1, -1));

        let left = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);

        let node = &mut nodes[current as usize];
        node.left = left;
        node.right = right;

        current
    }

    /// Exact-greedy search: sort by grid cell, sweep prefix sums
    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (g_parent, h_parent) = self.sum_gradients_hessians(indices);
        let parent_score = score(g_parent, h_parent);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<(i64, usize)> = Vec::with_capacity(indices.len());

        for feature_idx in 0..self.feature_count {
            order.clear();
            order.extend(
                indices
                    .iter()
                    .map(|&idx| (self.quantize(self.samples[idx].features[feature_idx]), idx)),
            );
            order.sort_unstable();

            let mut g_left = 0i64;
            let mut h_left = 0i64;
            for (pos, &(cell, idx)) in order.iter().enumerate() {
                g_left = g_left.saturating_add(self.samples[idx].gradient);
                h_left = h_left.saturating_add(self.samples[idx].hessian);

                let left_count = pos + 1;
                let right_count = order.len() - left_count;
                if right_count < min_leaf {
                    break;
                }
                // only split between distinct cells
                if left_count < min_leaf || order[pos + 1].0 == cell {
                    continue;
                }

                let gain = score(g_left, h_left) + score(g_parent - g_left, h_parent - h_left)
                    - parent_score;
                if gain <= 0 {
                    continue;
                }

                let threshold = cell.saturating_add(self.config.quant_step - 1);
                let candidate = SplitCandidate::new(feature_idx, threshold, gain, node_id);
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Lower edge of the grid cell holding `value`
    fn quantize(&self, value: i64) -> i64 {
        value.div_euclid(self.config.quant_step) * self.config.quant_step
    }

    /// Sum gradients and hessians for a set of samples
    fn sum_gradients_hessians(&self, indices: &[usize]) -> (i64, i64) {
        indices.iter().fold((0i64, 0i64), |(g, h), &idx| {
            (
                g.saturating_add(self.samples[idx].gradient),
                h.saturating_add(self.samples[idx].hessian),
            )
        })
    }

    /// Optimal leaf value: -G/H, at the hessian's scale of 1000
    fn calculate_leaf_value(&self, indices: &[usize]) -> i64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);

        if sum_h == 0 {
            return 0;
        }

        let value = -(sum_g as i128 * 1000) / sum_h as i128;
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// G²/H in i128
fn score(g: i64, h: i64) -> i128 {
    if h <= 0 {
        return 0;
    }
    (g as i128 * g as i128) / h as i128
}

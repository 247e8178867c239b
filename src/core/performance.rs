//! Classification accuracy and local stability of a tree over a dataset.
//!
//! A sample is *correct* when the tree answers exactly its true label, and
//! *ε-stable* when every leaf reachable under the symmetric perturbation
//! box `[s - ε, s + ε]` agrees with the unperturbed answer.

use crate::core::dataset::Dataset;
use crate::core::tree::{DecisionTree, NodeId};
use crate::core::LabelSet;

/// Counters accumulated over every sample of a dataset. `correct/wrong`
/// and `stable/unstable` each sum to `samples`, as do the four
/// cross-products `robust/vulnerable/fragile/broken`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Performance {
    pub samples: usize,
    pub correct: usize,
    pub wrong: usize,
    pub stable: usize,
    pub unstable: usize,
    /// correct ∧ stable
    pub robust: usize,
    /// wrong ∧ stable
    pub vulnerable: usize,
    /// correct ∧ unstable
    pub fragile: usize,
    /// wrong ∧ unstable
    pub broken: usize,
}

impl Performance {
    /// Classifies every sample of `data` with `tree` and accumulates the
    /// accuracy/stability counters for perturbation magnitude `epsilon`.
    pub fn evaluate(tree: &DecisionTree, data: &Dataset, epsilon: f64) -> Self {
        let mut performance = Performance {
            samples: data.size(),
            ..Performance::default()
        };

        let mut worklist: Vec<NodeId> = Vec::new();
        for sample in 0..data.size() {
            let point = data.point(sample);
            let labels = tree.classify(point);

            let is_correct = labels.count_ones() == 1 && labels[data.label_of(sample)];
            let is_stable = is_stable(tree, point, epsilon, labels, &mut worklist);

            performance.correct += usize::from(is_correct);
            performance.wrong += usize::from(!is_correct);
            performance.stable += usize::from(is_stable);
            performance.unstable += usize::from(!is_stable);
            performance.robust += usize::from(is_correct && is_stable);
            performance.vulnerable += usize::from(!is_correct && is_stable);
            performance.fragile += usize::from(is_correct && !is_stable);
            performance.broken += usize::from(!is_correct && !is_stable);
        }

        performance
    }
}

/// Visits every leaf reachable from the root when each coordinate of
/// `point` may move by up to `epsilon`, and reports whether they all carry
/// the reference majority set. Stops at the first disagreement.
fn is_stable(
    tree: &DecisionTree,
    point: &[f64],
    epsilon: f64,
    reference: LabelSet,
    worklist: &mut Vec<NodeId>,
) -> bool {
    worklist.clear();
    worklist.push(tree.root());

    while let Some(id) = worklist.pop() {
        let node = tree.node(id);
        match (node.left(), node.right()) {
            (Some(left), Some(right)) => {
                let value = point[node.feature()];
                if value - epsilon <= node.threshold() {
                    worklist.push(left);
                }
                if value + epsilon > node.threshold() {
                    worklist.push(right);
                }
            }
            _ => {
                if node.labels() != reference {
                    return false;
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use crate::core::dataset::Dataset;
    use crate::core::tree::DecisionTree;

    use super::*;

    fn split_tree() -> (Dataset, DecisionTree) {
        let data = Dataset::read("# 4 1\nA,0\nA,1\nB,2\nB,3\n".as_bytes()).unwrap();
        let mut tree = DecisionTree::new(&data);
        tree.split(&data, tree.root(), 0, 1.5);
        (data, tree)
    }

    #[test]
    fn test_stability_depends_on_epsilon() {
        let (data, tree) = split_tree();
        let mut worklist = Vec::new();

        // Sample 1 sits at x = 1, distance 0.5 from the threshold.
        let point = data.point(1);
        let labels = tree.classify(point);
        assert!(is_stable(&tree, point, 0.4, labels, &mut worklist));
        assert!(!is_stable(&tree, point, 0.6, labels, &mut worklist));
    }

    #[test]
    fn test_stability_is_monotone() {
        let (data, tree) = split_tree();
        let mut worklist = Vec::new();

        for sample in 0..data.size() {
            let point = data.point(sample);
            let labels = tree.classify(point);
            for epsilon in [0.6, 0.4, 0.2, 0.0] {
                if is_stable(&tree, point, epsilon, labels, &mut worklist) {
                    // Stable at some magnitude implies stable at every
                    // smaller one.
                    assert!(is_stable(&tree, point, epsilon / 2.0, labels, &mut worklist));
                }
            }
        }
    }

    #[test]
    fn test_counters_are_coherent() {
        let (data, tree) = split_tree();
        let performance = Performance::evaluate(&tree, &data, 0.7);

        assert_eq!(performance.samples, 4);
        assert_eq!(performance.correct + performance.wrong, 4);
        assert_eq!(performance.stable + performance.unstable, 4);
        assert_eq!(
            performance.robust + performance.vulnerable + performance.fragile + performance.broken,
            4
        );
    }

    #[test]
    fn test_perfect_tree_at_zero_epsilon() {
        let (data, tree) = split_tree();
        let performance = Performance::evaluate(&tree, &data, 0.0);

        assert_eq!(performance.correct, 4);
        assert_eq!(performance.stable, 4);
        assert_eq!(performance.robust, 4);
        assert_eq!(performance.broken, 0);
    }

    #[test]
    fn test_boundary_samples_are_fragile() {
        let (data, tree) = split_tree();
        // ε = 0.7 reaches across the threshold from x = 1 and x = 2 but
        // not from x = 0 or x = 3.
        let performance = Performance::evaluate(&tree, &data, 0.7);

        assert_eq!(performance.correct, 4);
        assert_eq!(performance.stable, 2);
        assert_eq!(performance.fragile, 2);
        assert_eq!(performance.robust, 2);
    }
}

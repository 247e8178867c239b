//! The axis-aligned binary decision tree and its in-place split operator.
//!
//! A tree owns an arena of nodes and a permutation `order` of the sample
//! indices of the dataset it is bound to. Every node covers a contiguous
//! range `[first, last]` of `order`; splitting a node partitions that range
//! in place, so no node ever stores its own sample container.

use std::fmt;

use crate::core::dataset::Dataset;
use crate::core::LabelSet;

/// Arena handle of a [`Node`] within its owning [`DecisionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// What [`DecisionTree::split`] did to the node's sample range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    /// Both sides were non-empty: the node gained two children.
    Both,
    /// Every sample satisfied `value <= threshold`. No children were
    /// created; apart from the (stable) permutation of its range the tree
    /// is unchanged.
    Left,
    /// Every sample exceeded the threshold. Same as [`SplitOutcome::Left`],
    /// mirrored.
    Right,
}

/// One node of a decision tree.
///
/// Invariants, maintained by [`DecisionTree`]:
/// * `frequencies` sums to `last - first + 1`;
/// * `probabilities[i] == frequencies[i] / (last - first + 1)`;
/// * `labels` is exactly the set of indices with maximal frequency;
/// * children are either both present or both absent.
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    feature: usize,
    threshold: f64,
    frequencies: Vec<u32>,
    probabilities: Vec<f64>,
    labels: LabelSet,
    first: usize,
    last: usize,
}

impl Node {
    fn new(frequencies: Vec<u32>, parent: Option<NodeId>, first: usize, last: usize) -> Self {
        let n_samples = (last - first + 1) as f64;
        let probabilities = frequencies.iter().map(|&f| f64::from(f) / n_samples).collect();
        let labels = majority_set(&frequencies);
        Node {
            parent,
            left: None,
            right: None,
            feature: 0,
            threshold: 0.0,
            frequencies,
            probabilities,
            labels,
            first,
            last,
        }
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Whether a single label dominates this node.
    pub fn is_pure(&self) -> bool {
        self.labels.count_ones() == 1
    }

    /// The number of samples in this node's range.
    pub fn n_samples(&self) -> usize {
        self.last - self.first + 1
    }

    /// The inclusive bounds of this node's range in the tree's `order`.
    pub fn range(&self) -> (usize, usize) {
        (self.first, self.last)
    }

    /// Per-label sample counts.
    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// Per-label sample fractions.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// The labels tied for the maximum frequency.
    pub fn labels(&self) -> LabelSet {
        self.labels
    }

    /// The split feature. Meaningful only for internal nodes.
    pub fn feature(&self) -> usize {
        self.feature
    }

    /// The split threshold. Meaningful only for internal nodes.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// Gini impurity `1 - Σ p²` of the label distribution.
    pub fn gini_impurity(&self) -> f64 {
        1.0 - self.probabilities.iter().map(|p| p * p).sum::<f64>()
    }

    /// Shannon entropy of the label distribution, normalized to log base L
    /// so that it lies in `[0, 1]`. Zero when fewer than two labels exist.
    pub fn entropy(&self) -> f64 {
        let n_labels = self.frequencies.len();
        if n_labels < 2 {
            return 0.0;
        }
        let log_base = (n_labels as f64).ln();
        -self
            .probabilities
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| p * p.ln() / log_base)
            .sum::<f64>()
    }
}

/// A decision tree bound to a [`Dataset`].
///
/// Construct a blank (single-leaf) tree with [`DecisionTree::new`] and grow
/// it with [`DecisionTree::split`]. The dataset is not stored; every
/// operation that needs sample data takes it by reference, and the caller
/// is responsible for always passing the dataset the tree was built on.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: NodeId,
    order: Vec<usize>,
}

impl DecisionTree {
    /// Creates a blank tree: a single root leaf covering every sample.
    ///
    /// # Panics
    ///
    /// * If the dataset is empty.
    pub fn new(data: &Dataset) -> Self {
        assert!(data.size() > 0, "cannot build a tree on an empty dataset");

        let mut frequencies = vec![0_u32; data.n_labels()];
        for sample in 0..data.size() {
            frequencies[data.label_of(sample)] += 1;
        }

        let root = Node::new(frequencies, None, 0, data.size() - 1);
        DecisionTree {
            nodes: vec![root],
            free: Vec::new(),
            root: NodeId(0),
            order: (0..data.size()).collect(),
        }
    }

    /// The root node handle.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The current sample permutation.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Partitions the node's range of `order` in place around
    /// `value(sample, feature) <= threshold` and, if both sides are
    /// non-empty, attaches two freshly built children.
    ///
    /// On a [`SplitOutcome::Left`]/[`SplitOutcome::Right`] outcome no node
    /// is created and the node keeps its leaf state; callers decide how to
    /// handle the trivial split.
    ///
    /// # Panics
    ///
    /// * If the node is not a leaf.
    pub fn split(
        &mut self,
        data: &Dataset,
        id: NodeId,
        feature: usize,
        threshold: f64,
    ) -> SplitOutcome {
        let (first, last) = {
            let node = self.node(id);
            assert!(node.is_leaf(), "can only split a leaf node");
            (node.first, node.last)
        };

        let mut left_frequencies = vec![0_u32; data.n_labels()];
        let mut right_frequencies = vec![0_u32; data.n_labels()];

        // Two-cursor in-place partition: everything before `i` has gone
        // left, everything after `j` has gone right, and `order[i..=j]` is
        // still unexamined.
        let mut i = first;
        let mut j = last;
        while i <= j {
            let sample = self.order[i];
            if data.value(sample, feature) <= threshold {
                left_frequencies[data.label_of(sample)] += 1;
                i += 1;
            } else {
                right_frequencies[data.label_of(sample)] += 1;
                self.order.swap(i, j);
                if j == first {
                    break;
                }
                j -= 1;
            }
        }

        let n_left = i - first;
        let n_right = last - first + 1 - n_left;
        if n_right == 0 {
            return SplitOutcome::Left;
        }
        if n_left == 0 {
            return SplitOutcome::Right;
        }

        let middle = first + n_left - 1;
        let left = self.alloc(Node::new(left_frequencies, Some(id), first, middle));
        let right = self.alloc(Node::new(right_frequencies, Some(id), middle + 1, last));

        let node = self.node_mut(id);
        node.feature = feature;
        node.threshold = threshold;
        node.left = Some(left);
        node.right = Some(right);

        SplitOutcome::Both
    }

    /// Destroys both subtrees of the node, turning it back into a leaf. The
    /// node's own frequencies, probabilities, majority set and range are
    /// untouched: they already describe its samples.
    pub fn prune(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        let mut stack: Vec<NodeId> = node.left.take().into_iter().chain(node.right.take()).collect();
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            stack.extend(node.left.into_iter().chain(node.right));
            self.free.push(current.0);
        }
    }

    /// The number of parent hops from the node to the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    /// Walks from the root to a leaf and returns that leaf's majority set.
    /// The set has more than one bit when labels tie.
    pub fn classify(&self, point: &[f64]) -> LabelSet {
        let mut node = self.node(self.root);
        while let (Some(left), Some(right)) = (node.left, node.right) {
            let child = if point[node.feature] <= node.threshold {
                left
            } else {
                right
            };
            node = self.node(child);
        }
        node.labels
    }

    /// The handles of every node reachable from the root.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut visited = Vec::with_capacity(self.nodes.len() - self.free.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            visited.push(id);
            let node = self.node(id);
            stack.extend(node.right.into_iter().chain(node.left));
        }
        visited
    }

    /// The handles of every leaf.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.reachable()
            .into_iter()
            .filter(|&id| self.node(id).is_leaf())
            .collect()
    }

    pub fn n_nodes(&self) -> usize {
        self.reachable().len()
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves().len()
    }

    /// The fraction of dataset samples on which the two trees produce
    /// bit-for-bit equal majority sets.
    pub fn similarity(tree_1: &DecisionTree, tree_2: &DecisionTree, data: &Dataset) -> f64 {
        let n_matches = (0..data.size())
            .filter(|&sample| {
                let point = data.point(sample);
                tree_1.classify(point) == tree_2.classify(point)
            })
            .count();
        n_matches as f64 / data.size() as f64
    }
}

impl fmt::Display for DecisionTree {
    /// Renders the tree in preorder, one node per line, indented by depth.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for id in self.reachable() {
            let node = self.node(id);
            for _ in 0..self.depth(id) {
                write!(f, "  ")?;
            }
            if node.is_leaf() {
                write!(f, "LEAF ")?;
            } else {
                write!(f, "SPLIT x_{} <= {} ", node.feature, node.threshold)?;
            }
            let frequencies: Vec<String> =
                node.frequencies.iter().map(|c| c.to_string()).collect();
            writeln!(f, "[{}]", frequencies.join(", "))?;
        }
        Ok(())
    }
}

/// The set of label indices holding the maximum of `frequencies`.
fn majority_set(frequencies: &[u32]) -> LabelSet {
    let max = frequencies.iter().copied().max().unwrap_or(0);
    let mut labels = LabelSet::ZERO;
    for (i, &frequency) in frequencies.iter().enumerate() {
        if frequency == max {
            labels.set(i, true);
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use crate::core::dataset::Dataset;

    use super::*;

    fn tiny_dataset() -> Dataset {
        Dataset::read("# 4 1\nA,0\nA,1\nB,2\nB,3\n".as_bytes()).unwrap()
    }

    fn label_set(indices: &[usize]) -> LabelSet {
        let mut labels = LabelSet::ZERO;
        for &i in indices {
            labels.set(i, true);
        }
        labels
    }

    #[test]
    fn test_blank_tree() {
        let data = tiny_dataset();
        let tree = DecisionTree::new(&data);
        let root = tree.node(tree.root());

        assert!(root.is_leaf());
        assert_eq!(root.frequencies(), &[2, 2]);
        assert_eq!(root.labels(), label_set(&[0, 1]));
        assert_eq!(root.range(), (0, 3));
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_split_both() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        let outcome = tree.split(&data, tree.root(), 0, 1.5);
        assert_eq!(outcome, SplitOutcome::Both);

        let root = tree.node(tree.root());
        let left = tree.node(root.left().unwrap());
        let right = tree.node(root.right().unwrap());

        assert_eq!(left.frequencies(), &[2, 0]);
        assert_eq!(left.labels(), label_set(&[0]));
        assert_eq!(left.range(), (0, 1));
        assert_eq!(right.frequencies(), &[0, 2]);
        assert_eq!(right.labels(), label_set(&[1]));
        assert_eq!(right.range(), (2, 3));

        assert_eq!(tree.classify(&[1.0]), label_set(&[0]));
        assert_eq!(tree.classify(&[2.0]), label_set(&[1]));
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(root.left().unwrap()), 1);
    }

    #[test]
    fn test_split_all_left_is_trivial() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        assert_eq!(tree.split(&data, tree.root(), 0, 10.0), SplitOutcome::Left);

        let root = tree.node(tree.root());
        assert!(root.is_leaf());
        assert_eq!(root.frequencies(), &[2, 2]);
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn test_split_all_right_is_trivial() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        assert_eq!(tree.split(&data, tree.root(), 0, -1.0), SplitOutcome::Right);
        assert!(tree.node(tree.root()).is_leaf());
    }

    #[test]
    fn test_partition_is_stable() {
        let data =
            Dataset::read("# 6 1\nA,5\nB,1\nA,4\nB,0\nA,3\nB,2\n".as_bytes()).unwrap();
        let mut tree = DecisionTree::new(&data);

        assert_eq!(tree.split(&data, tree.root(), 0, 2.5), SplitOutcome::Both);

        let root = tree.node(tree.root());
        let (_, middle) = tree.node(root.left().unwrap()).range();
        for (position, &sample) in tree.order().iter().enumerate() {
            if position <= middle {
                assert!(data.value(sample, 0) <= 2.5);
            } else {
                assert!(data.value(sample, 0) > 2.5);
            }
        }

        assert_eq!(tree.node(root.left().unwrap()).frequencies(), &[0, 3]);
        assert_eq!(tree.node(root.right().unwrap()).frequencies(), &[3, 0]);
    }

    #[test]
    fn test_split_single_sample_side() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        assert_eq!(tree.split(&data, tree.root(), 0, 0.5), SplitOutcome::Both);
        let root = tree.node(tree.root());
        assert_eq!(tree.node(root.left().unwrap()).frequencies(), &[1, 0]);
        assert_eq!(tree.node(root.right().unwrap()).frequencies(), &[1, 2]);
    }

    #[test]
    fn test_prune_restores_leaf() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        let before = tree.node(tree.root()).clone();
        tree.split(&data, tree.root(), 0, 1.5);
        tree.prune(tree.root());

        let after = tree.node(tree.root());
        assert!(after.is_leaf());
        assert_eq!(after.frequencies(), before.frequencies());
        assert_eq!(after.labels(), before.labels());
        assert_eq!(after.range(), before.range());
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn test_prune_releases_arena_slots() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        tree.split(&data, tree.root(), 0, 1.5);
        let allocated = tree.nodes.len();
        tree.prune(tree.root());
        tree.split(&data, tree.root(), 0, 0.5);

        assert_eq!(tree.nodes.len(), allocated);
    }

    #[test]
    fn test_similarity_is_reflexive() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);
        tree.split(&data, tree.root(), 0, 1.5);

        let same = DecisionTree::similarity(&tree, &tree, &data);
        assert!((same - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_counts_matches() {
        let data = tiny_dataset();
        let blank = DecisionTree::new(&data);
        let mut split = DecisionTree::new(&data);
        split.split(&data, split.root(), 0, 0.5);

        // The blank tree answers {A, B} everywhere; the split tree answers
        // {A} below 0.5 and {B} above it (labels tie 1:2 nowhere).
        let similarity = DecisionTree::similarity(&blank, &split, &data);
        assert!((similarity - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entropy_bounds() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);

        assert!((tree.node(tree.root()).entropy() - 1.0).abs() < 1e-12);

        tree.split(&data, tree.root(), 0, 1.5);
        let left = tree.node(tree.root()).left().unwrap();
        assert!(tree.node(left).entropy().abs() < 1e-12);
        assert!(tree.node(left).is_pure());
    }

    #[test]
    fn test_display_renders_preorder() {
        let data = tiny_dataset();
        let mut tree = DecisionTree::new(&data);
        tree.split(&data, tree.root(), 0, 1.5);

        let rendered = tree.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "SPLIT x_0 <= 1.5 [2, 2]");
        assert_eq!(lines[1], "  LEAF [2, 0]");
        assert_eq!(lines[2], "  LEAF [0, 2]");
    }
}

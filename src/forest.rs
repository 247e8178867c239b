//! An ordered collection of decision trees bound to the same dataset
//! shape.

use crate::core::tree::DecisionTree;

#[derive(Debug, Default)]
pub struct Forest {
    trees: Vec<DecisionTree>,
}

impl Forest {
    pub fn new() -> Self {
        Forest { trees: Vec::new() }
    }

    pub fn add_tree(&mut self, tree: DecisionTree) {
        self.trees.push(tree);
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Consumes the forest, yielding its trees in order.
    pub fn into_trees(self) -> Vec<DecisionTree> {
        self.trees
    }
}

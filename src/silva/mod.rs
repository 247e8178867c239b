//! The textual model format (`.silva` files).
//!
//! A tree record is a header line, the label alphabet, and a preorder
//! stream of node records:
//!
//! ```text
//! classifier-decision-tree <d> <L>
//! <label_0> ... <label_{L-1}>
//! SPLIT <feature> <threshold>
//! LEAF <freq_0> ... <freq_{L-1}>
//! ```
//!
//! A forest is `classifier-forest <n>` followed by `n` tree records.
//!
//! Loading *replays* each `SPLIT` against the binding dataset, so a loaded
//! tree always satisfies the sample-range invariants on that dataset. A
//! replayed split that turns out trivial cannot be materialized; the
//! unreachable child subtree in the file is consumed and discarded.

use std::io::Write;
use std::str::FromStr;

use crate::core::dataset::Dataset;
use crate::core::tree::{DecisionTree, NodeId, SplitOutcome};
use crate::error::{Error, Result};
use crate::forest::Forest;

const TREE_TAG: &str = "classifier-decision-tree";
const FOREST_TAG: &str = "classifier-forest";

/// Writes one tree record.
pub fn write_tree<W: Write>(writer: &mut W, tree: &DecisionTree, data: &Dataset) -> Result<()> {
    writeln!(writer, "{TREE_TAG} {} {}", data.space_size(), data.n_labels())?;
    writeln!(writer, "{}", data.labels().join(" "))?;

    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        match (node.left(), node.right()) {
            (Some(left), Some(right)) => {
                writeln!(writer, "SPLIT {} {}", node.feature(), node.threshold())?;
                stack.push(right);
                stack.push(left);
            }
            _ => {
                let frequencies: Vec<String> =
                    node.frequencies().iter().map(u32::to_string).collect();
                writeln!(writer, "LEAF {}", frequencies.join(" "))?;
            }
        }
    }
    Ok(())
}

/// Renders one tree record to a `String`.
pub fn tree_to_string(tree: &DecisionTree, data: &Dataset) -> Result<String> {
    let mut buffer = Vec::new();
    write_tree(&mut buffer, tree, data)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Reads one tree record and binds it to `data`.
pub fn read_tree(source: &str, data: &Dataset) -> Result<DecisionTree> {
    let mut tokens = Tokens::new(source);
    parse_tree(&mut tokens, data)
}

/// Writes a forest record.
pub fn write_forest<W: Write>(writer: &mut W, forest: &Forest, data: &Dataset) -> Result<()> {
    writeln!(writer, "{FOREST_TAG} {}", forest.n_trees())?;
    for tree in forest.trees() {
        write_tree(writer, tree, data)?;
    }
    Ok(())
}

/// Reads a forest record, binding every tree to `data`.
pub fn read_forest(source: &str, data: &Dataset) -> Result<Forest> {
    let mut tokens = Tokens::new(source);

    let tag = tokens.next()?;
    if tag != FOREST_TAG {
        return Err(Error::MalformedInput(format!(
            "expected \"{FOREST_TAG}\", found \"{tag}\""
        )));
    }
    let n_trees: usize = tokens.parse()?;

    let mut forest = Forest::new();
    for _ in 0..n_trees {
        forest.add_tree(parse_tree(&mut tokens, data)?);
    }
    Ok(forest)
}

/// A whitespace tokenizer over the model source.
struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(source: &'a str) -> Self {
        Tokens {
            inner: source.split_whitespace(),
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| Error::MalformedInput("unexpected end of model".to_string()))
    }

    fn parse<T: FromStr>(&mut self) -> Result<T> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| Error::MalformedInput(format!("cannot parse model token \"{token}\"")))
    }
}

/// Work items of the iterative node parser: either grow the given node
/// from the next record, or consume and discard a whole subtree record.
enum Work {
    Parse(NodeId),
    Skip,
}

fn parse_tree(tokens: &mut Tokens, data: &Dataset) -> Result<DecisionTree> {
    let tag = tokens.next()?;
    if tag != TREE_TAG {
        return Err(Error::MalformedInput(format!(
            "expected \"{TREE_TAG}\", found \"{tag}\""
        )));
    }

    let space_size: usize = tokens.parse()?;
    let n_labels: usize = tokens.parse()?;
    if space_size != data.space_size() || n_labels != data.n_labels() {
        return Err(Error::MalformedInput(format!(
            "model is over R^{space_size} with {n_labels} labels, dataset is over R^{} with {} labels",
            data.space_size(),
            data.n_labels()
        )));
    }
    for _ in 0..n_labels {
        tokens.next()?;
    }

    let mut tree = DecisionTree::new(data);
    let mut stack = vec![Work::Parse(tree.root())];
    while let Some(work) = stack.pop() {
        match tokens.next()? {
            "SPLIT" => {
                let feature: usize = tokens.parse()?;
                let threshold: f64 = tokens.parse()?;
                match work {
                    Work::Parse(id) => match tree.split(data, id, feature, threshold) {
                        SplitOutcome::Both => {
                            let node = tree.node(id);
                            let left = node.left().expect("split reported both sides");
                            let right = node.right().expect("split reported both sides");
                            stack.push(Work::Parse(right));
                            stack.push(Work::Parse(left));
                        }
                        // The node keeps growing from the record of its
                        // only populated side; the other side's subtree is
                        // discarded.
                        SplitOutcome::Left => {
                            stack.push(Work::Skip);
                            stack.push(Work::Parse(id));
                        }
                        SplitOutcome::Right => {
                            stack.push(Work::Parse(id));
                            stack.push(Work::Skip);
                        }
                    },
                    Work::Skip => {
                        stack.push(Work::Skip);
                        stack.push(Work::Skip);
                    }
                }
            }
            "LEAF" => {
                for _ in 0..n_labels {
                    tokens.parse::<u32>()?;
                }
            }
            "LEAF_LOGARITHMIC" => {
                // Accepted for compatibility; the values have no use here.
                for _ in 0..n_labels {
                    tokens.parse::<f64>()?;
                }
            }
            other => {
                return Err(Error::MalformedInput(format!(
                    "unknown node record \"{other}\""
                )));
            }
        }
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use crate::core::dataset::Dataset;
    use crate::core::tree::DecisionTree;

    use super::*;

    fn dataset() -> Dataset {
        Dataset::read("# 6 2\nA,0,4\nA,1,2\nB,2,0\nB,3,5\nC,4,1\nC,5,3\n".as_bytes()).unwrap()
    }

    fn grown_tree(data: &Dataset) -> DecisionTree {
        let mut tree = DecisionTree::new(data);
        tree.split(data, tree.root(), 0, 2.5);
        let right = tree.node(tree.root()).right().unwrap();
        tree.split(data, right, 1, 2.0);
        tree
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let data = dataset();
        let tree = grown_tree(&data);

        let text = tree_to_string(&tree, &data).unwrap();
        let loaded = read_tree(&text, &data).unwrap();

        assert_eq!(loaded.n_nodes(), tree.n_nodes());
        let original: Vec<_> = tree.reachable();
        let replayed: Vec<_> = loaded.reachable();
        for (&a, &b) in original.iter().zip(replayed.iter()) {
            assert_eq!(tree.node(a).frequencies(), loaded.node(b).frequencies());
        }
    }

    #[test]
    fn test_round_trip_is_classification_equivalent() {
        let data = dataset();
        let tree = grown_tree(&data);

        let text = tree_to_string(&tree, &data).unwrap();
        let loaded = read_tree(&text, &data).unwrap();

        for sample in 0..data.size() {
            let point = data.point(sample);
            assert_eq!(tree.classify(point), loaded.classify(point));
        }
    }

    #[test]
    fn test_trivial_split_is_collapsed() {
        let data = dataset();
        // Threshold 100 sends every sample left; the LEAF records are the
        // would-be children.
        let text = "classifier-decision-tree 2 3\nA B C\n\
                    SPLIT 0 100\nLEAF 2 2 2\nLEAF 0 0 0\n";

        let tree = read_tree(text, &data).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.node(tree.root()).is_leaf());
        assert_eq!(tree.node(tree.root()).frequencies(), &[2, 2, 2]);
    }

    #[test]
    fn test_logarithmic_leaf_is_skipped() {
        let data = dataset();
        let text = "classifier-decision-tree 2 3\nA B C\n\
                    SPLIT 0 2.5\nLEAF_LOGARITHMIC -0.1 -2.3 -4.5\nLEAF 0 2 2\n";

        let tree = read_tree(text, &data).unwrap();
        assert_eq!(tree.n_nodes(), 3);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let data = dataset();
        let text = "classifier-decision-tree 9 3\nA B C\nLEAF 2 2 2\n";
        assert!(read_tree(text, &data).is_err());
    }

    #[test]
    fn test_rejects_unknown_record() {
        let data = dataset();
        let text = "classifier-decision-tree 2 3\nA B C\nBRANCH 0 1\n";
        assert!(read_tree(text, &data).is_err());
    }

    #[test]
    fn test_forest_round_trip() {
        let data = dataset();
        let mut forest = Forest::new();
        forest.add_tree(DecisionTree::new(&data));
        forest.add_tree(grown_tree(&data));

        let mut buffer = Vec::new();
        write_forest(&mut buffer, &forest, &data).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("classifier-forest 2\n"));

        let loaded = read_forest(&text, &data).unwrap();
        assert_eq!(loaded.n_trees(), 2);
        assert_eq!(loaded.trees()[0].n_nodes(), 1);
        assert_eq!(loaded.trees()[1].n_nodes(), forest.trees()[1].n_nodes());
    }
}

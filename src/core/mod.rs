pub mod dataset;
pub mod performance;
pub mod tree;

use bitvec::prelude::*;

/// Upper bound on the number of distinct labels in a dataset. Keeps a
/// label set inside one machine word.
pub const MAX_LABELS: usize = 64;

/// Set of label indices, e.g. the labels tied for the maximum frequency in
/// a tree node. One `u64` word; `Dataset` loading rejects label alphabets
/// wider than [`MAX_LABELS`].
pub type LabelSet = BitArr!(for MAX_LABELS, in u64);

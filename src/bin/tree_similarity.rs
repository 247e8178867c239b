//! Prints the classification agreement of two saved trees on a dataset.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use silvae::{silva, Dataset, DecisionTree, Error, Result};

#[derive(Parser)]
#[command(about = "Compares the classifications of two decision trees")]
struct Args {
    /// First model path.
    first_tree: PathBuf,

    /// Second model path.
    second_tree: PathBuf,

    /// Dataset both models are bound to.
    dataset: PathBuf,
}

fn load_tree(path: &PathBuf, data: &Dataset) -> Result<DecisionTree> {
    let source = fs::read_to_string(path).map_err(|e| Error::missing_file(path, e))?;
    silva::read_tree(&source, data)
}

fn run(args: &Args) -> Result<()> {
    let data = Dataset::load(&args.dataset)?;
    let tree_1 = load_tree(&args.first_tree, &data)?;
    let tree_2 = load_tree(&args.second_tree, &data)?;

    println!(
        "Similarity: {}",
        DecisionTree::similarity(&tree_1, &tree_2, &data)
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("tree_similarity: {error}");
        process::exit(1);
    }
}

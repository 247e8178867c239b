//! Prints descriptive statistics of a saved tree over a dataset.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use silvae::utils::helpers::Distribution;
use silvae::{silva, Dataset, DecisionTree, Error, Result};

#[derive(Parser)]
#[command(about = "Displays structural statistics of a saved decision tree")]
struct Args {
    /// Model path.
    model: PathBuf,

    /// Dataset the model is bound to.
    dataset: PathBuf,
}

fn print_distribution(distribution: &Distribution) {
    println!("  min:          {:.6}", distribution.min());
    println!("  1st quartile: {:.6}", distribution.nth_percentile(25));
    println!("  median:       {:.6}", distribution.median());
    println!("  mean:         {:.6}", distribution.mean());
    println!("  3rd quartile: {:.6}", distribution.nth_percentile(75));
    println!("  max:          {:.6}", distribution.max());
    println!("  variance:     {:.6}", distribution.variance());
}

fn feature_frequencies(tree: &DecisionTree, space_size: usize) -> Vec<usize> {
    let mut frequencies = vec![0; space_size];
    for id in tree.reachable() {
        let node = tree.node(id);
        if !node.is_leaf() {
            frequencies[node.feature()] += 1;
        }
    }
    frequencies
}

fn run(args: &Args) -> Result<()> {
    let data = Dataset::load(&args.dataset)?;
    let source =
        fs::read_to_string(&args.model).map_err(|e| Error::missing_file(&args.model, e))?;
    let tree = silva::read_tree(&source, &data)?;

    let leaves = tree.leaves();
    let depths = leaves.iter().map(|&id| tree.depth(id) as f64).collect();
    let populations = leaves
        .iter()
        .map(|&id| tree.node(id).n_samples() as f64)
        .collect();
    let entropies = leaves.iter().map(|&id| tree.node(id).entropy()).collect();

    println!("Tree Info: {} leaves / {} nodes", leaves.len(), tree.n_nodes());
    println!("Heights:");
    print_distribution(&Distribution::new(depths));
    println!("Number of samples per leaf:");
    print_distribution(&Distribution::new(populations));
    println!("Entropy on leaves:");
    print_distribution(&Distribution::new(entropies));

    let frequencies: Vec<String> = feature_frequencies(&tree, data.space_size())
        .iter()
        .map(|f| f.to_string())
        .collect();
    println!("Feature frequencies: [ {} ]", frequencies.join(" "));

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("tree_info: {error}");
        process::exit(1);
    }
}

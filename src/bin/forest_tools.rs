//! Assembles individual tree files into a forest file and back.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use silvae::{silva, Dataset, Error, Forest, Result};

#[derive(Parser)]
#[command(about = "Assembles and disassembles decision-tree forests")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collects tree files into one forest file.
    Assemble {
        /// Dataset the trees are bound to.
        dataset: PathBuf,
        /// Output forest path.
        forest: PathBuf,
        /// Paths of the trees to assemble, in order.
        #[arg(required = true)]
        trees: Vec<PathBuf>,
    },
    /// Extracts every tree of a forest file into its own file.
    Disassemble {
        /// Dataset the forest is bound to.
        dataset: PathBuf,
        /// Input forest path.
        forest: PathBuf,
        /// Directory receiving `tree-NNN.silva` files.
        output_dir: PathBuf,
    },
}

fn assemble(dataset: &PathBuf, forest_path: &PathBuf, trees: &[PathBuf]) -> Result<()> {
    let data = Dataset::load(dataset)?;

    let mut forest = Forest::new();
    for path in trees {
        let source = fs::read_to_string(path).map_err(|e| Error::missing_file(path, e))?;
        forest.add_tree(silva::read_tree(&source, &data)?);
    }

    let mut output = File::create(forest_path)?;
    silva::write_forest(&mut output, &forest, &data)
}

fn disassemble(dataset: &PathBuf, forest_path: &PathBuf, output_dir: &PathBuf) -> Result<()> {
    let data = Dataset::load(dataset)?;
    let source =
        fs::read_to_string(forest_path).map_err(|e| Error::missing_file(forest_path, e))?;
    let forest = silva::read_forest(&source, &data)?;

    for (index, tree) in forest.trees().iter().enumerate() {
        let path = output_dir.join(format!("tree-{index:03}.silva"));
        let mut output = File::create(path)?;
        silva::write_tree(&mut output, tree, &data)?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Assemble {
            dataset,
            forest,
            trees,
        } => assemble(dataset, forest, trees),
        Command::Disassemble {
            dataset,
            forest,
            output_dir,
        } => disassemble(dataset, forest, output_dir),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("forest_tools: {error}");
        process::exit(1);
    }
}

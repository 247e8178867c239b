//! Trainer CLI: evolves a decision tree over a training set and saves it.

use std::fs::File;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use silvae::train::config::{
    Crossover, FeaturePolicy, FitnessFunction, Mutation, MutationSchedule, NextPopulationSize,
    PopulationGenerator, Selection,
};
use silvae::{silva, Dataset, Result, Trainer, TrainingConfig};

#[derive(Parser)]
#[command(name = "silvae", about = "Trains a decision tree with a genetic algorithm")]
struct Args {
    /// Training set path.
    training_set: PathBuf,

    /// Output model path.
    output_model: PathBuf,

    /// Fitness function: `linear <magnitude> <correct> <wrong> <stable>
    /// <unstable> <no-info> <robust> <vulnerable> <fragile> <broken>`.
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "KIND [PARAMS]")]
    fitness: Option<Vec<String>>,

    /// Parent selection: `uniform` or `roulette-wheel`.
    #[arg(long, value_name = "KIND")]
    select: Option<String>,

    /// Crossover function: `one-point`.
    #[arg(long, value_name = "KIND")]
    crossover: Option<String>,

    /// Mutation function: `none`, `grow` or `Z`.
    #[arg(long, value_name = "KIND")]
    mutation: Option<String>,

    /// Base mutation probability in [0, 1].
    #[arg(long, value_name = "P")]
    mutation_base_probability: Option<f64>,

    /// Mutation probability schedule: `constant` or `encourage-variance`.
    #[arg(long, value_name = "KIND")]
    mutation_probability: Option<String>,

    /// Number of trees in the initial population.
    #[arg(long, value_name = "N")]
    population_initial_size: Option<usize>,

    /// Maximum number of trees in the population.
    #[arg(long, value_name = "N")]
    population_max_size: Option<usize>,

    /// Next population size policy: `constant`.
    #[arg(long, value_name = "KIND")]
    population_next_size: Option<String>,

    /// Initial population source: `blank` or `from-forest <path>`.
    #[arg(long, num_args = 1..=2, value_name = "KIND [PATH]")]
    population_generator: Option<Vec<String>>,

    /// Number of generations to run.
    #[arg(long, value_name = "N")]
    max_iteration: Option<usize>,

    /// Number of best individuals copied verbatim to the next generation.
    #[arg(long, value_name = "N")]
    elitism: Option<usize>,

    /// Fraction of projection intervals tried per split search, in [0, 1].
    #[arg(long, value_name = "P")]
    split_search_aggressiveness: Option<f64>,

    /// Features allowed in splits: `all` or `uniform <n>`.
    #[arg(long, num_args = 1..=2, value_name = "KIND [N]")]
    allowed_features: Option<Vec<String>>,

    /// RNG seed.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
}

fn build_config(args: &Args) -> Result<TrainingConfig> {
    let mut config = TrainingConfig::default();

    if let Some(tokens) = &args.fitness {
        config.fitness = FitnessFunction::parse(tokens)?;
    }
    if let Some(token) = &args.select {
        config.selection = Selection::parse(token)?;
    }
    if let Some(token) = &args.crossover {
        config.crossover = Crossover::parse(token)?;
    }
    if let Some(token) = &args.mutation {
        config.mutation = Mutation::parse(token)?;
    }
    if let Some(p) = args.mutation_base_probability {
        config.base_mutation_probability = p;
    }
    if let Some(token) = &args.mutation_probability {
        config.mutation_schedule = MutationSchedule::parse(token)?;
    }
    if let Some(n) = args.population_initial_size {
        config.initial_population_size = n;
    }
    if let Some(n) = args.population_max_size {
        config.max_population_size = n;
    }
    if let Some(token) = &args.population_next_size {
        config.next_population_size = NextPopulationSize::parse(token)?;
    }
    if let Some(tokens) = &args.population_generator {
        config.population_generator = PopulationGenerator::parse(tokens)?;
    }
    if let Some(n) = args.max_iteration {
        config.max_iteration = n;
    }
    if let Some(n) = args.elitism {
        config.elitism = n;
    }
    if let Some(p) = args.split_search_aggressiveness {
        config.split_search_aggressiveness = p;
    }
    if let Some(tokens) = &args.allowed_features {
        config.feature_policy = FeaturePolicy::parse(tokens)?;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let training_set = Dataset::load(&args.training_set)?;
    info!("{training_set}");

    let mut trainer = Trainer::new(build_config(args)?);
    trainer.on_after_iter(|trainer| {
        let fitness: Vec<String> = trainer
            .population()
            .fitness_values()
            .iter()
            .map(|f| format!("{f:.3}"))
            .collect();
        info!(
            "iteration {}/{}, population {}/{}, fitness [{}]",
            trainer.current_iteration() + 1,
            trainer.config().max_iteration,
            trainer.population().size(),
            trainer.config().max_population_size,
            fitness.join(", ")
        );
    });

    let tree = trainer.train(&training_set)?;

    let mut output = File::create(&args.output_model)?;
    silva::write_tree(&mut output, &tree, &training_set)?;
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("silvae: {error}");
        process::exit(1);
    }
}

//! Typed training configuration.
//!
//! Every stochastic operator of the trainer is a tagged variant here;
//! option parsing is a pure mapping from CLI tokens to variants, and the
//! trainer dispatches on them without dynamic plumbing.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// How the fitness of an individual is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum FitnessFunction {
    /// A weighted sum of the performance rates. `parameters[0]` is *not* a
    /// weight: it is the perturbation magnitude ε handed to the stability
    /// evaluation. `parameters[1..=9]` weight, in order, the rates of
    /// correct, wrong, stable, unstable, no-info, robust, vulnerable,
    /// fragile and broken samples.
    Linear { parameters: [f64; 10] },
}

/// How parents are drawn from the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Uniform,
    RouletteWheel,
}

/// How two parents produce an offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// Swap one random subtree of the first parent for one of the second.
    OnePoint,
}

/// How an offspring is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    None,
    /// Walk to a leaf by entropy-weighted descent, then try to split it.
    Grow,
    /// Like `Grow`, but low-entropy internal nodes on the walk may be
    /// pruned instead.
    Z,
}

/// How the per-offspring mutation probability is derived from the base
/// probability and the population state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationSchedule {
    Constant,
    /// `1 - (max fitness - min fitness)`: mutate more when the population
    /// has converged.
    EncourageVariance,
}

/// How many individuals the next generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPopulationSize {
    Constant,
}

/// Where the initial population comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationGenerator {
    /// Single-leaf trees covering every sample.
    Blank,
    /// Trees loaded from a forest file.
    FromForest(PathBuf),
}

/// Which features split candidates may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeaturePolicy {
    All,
    /// A fixed-size subset drawn uniformly without replacement.
    Uniform(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub fitness: FitnessFunction,
    pub selection: Selection,
    pub crossover: Crossover,
    pub mutation: Mutation,
    pub base_mutation_probability: f64,
    pub mutation_schedule: MutationSchedule,
    pub initial_population_size: usize,
    pub max_population_size: usize,
    pub next_population_size: NextPopulationSize,
    pub population_generator: PopulationGenerator,
    pub max_iteration: usize,
    pub elitism: usize,
    pub split_search_aggressiveness: f64,
    pub feature_policy: FeaturePolicy,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            fitness: FitnessFunction::Linear {
                parameters: [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            },
            selection: Selection::RouletteWheel,
            crossover: Crossover::OnePoint,
            mutation: Mutation::Z,
            base_mutation_probability: 1.0,
            mutation_schedule: MutationSchedule::Constant,
            initial_population_size: 32,
            max_population_size: 32,
            next_population_size: NextPopulationSize::Constant,
            population_generator: PopulationGenerator::Blank,
            max_iteration: 64,
            elitism: 1,
            split_search_aggressiveness: 0.01,
            feature_policy: FeaturePolicy::All,
            seed: 0,
        }
    }
}

impl FitnessFunction {
    /// Parses `linear <magnitude> <w1> … <w9>`.
    pub fn parse(tokens: &[String]) -> Result<Self> {
        match tokens {
            [kind, rest @ ..] if kind == "linear" => {
                if rest.len() != 10 {
                    return Err(Error::MalformedInput(format!(
                        "fitness \"linear\" takes 10 parameters, found {}",
                        rest.len()
                    )));
                }
                let mut parameters = [0.0; 10];
                for (slot, token) in parameters.iter_mut().zip(rest) {
                    *slot = parse_number(token)?;
                }
                Ok(FitnessFunction::Linear { parameters })
            }
            [kind, ..] => Err(unknown("fitness", kind)),
            [] => Err(Error::MalformedInput("missing fitness".to_string())),
        }
    }
}

impl Selection {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "uniform" => Ok(Selection::Uniform),
            "roulette-wheel" => Ok(Selection::RouletteWheel),
            _ => Err(unknown("selection", token)),
        }
    }
}

impl Crossover {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "one-point" => Ok(Crossover::OnePoint),
            _ => Err(unknown("crossover", token)),
        }
    }
}

impl Mutation {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "none" => Ok(Mutation::None),
            "grow" => Ok(Mutation::Grow),
            "Z" => Ok(Mutation::Z),
            _ => Err(unknown("mutation", token)),
        }
    }
}

impl MutationSchedule {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "constant" => Ok(MutationSchedule::Constant),
            "encourage-variance" => Ok(MutationSchedule::EncourageVariance),
            _ => Err(unknown("mutation probability", token)),
        }
    }
}

impl NextPopulationSize {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "constant" => Ok(NextPopulationSize::Constant),
            _ => Err(unknown("next population size", token)),
        }
    }
}

impl PopulationGenerator {
    /// Parses `blank` or `from-forest <path>`.
    pub fn parse(tokens: &[String]) -> Result<Self> {
        match tokens {
            [kind] if kind == "blank" => Ok(PopulationGenerator::Blank),
            [kind, path] if kind == "from-forest" => {
                Ok(PopulationGenerator::FromForest(PathBuf::from(path)))
            }
            [kind, ..] => Err(unknown("population generator", kind)),
            [] => Err(Error::MalformedInput(
                "missing population generator".to_string(),
            )),
        }
    }
}

impl FeaturePolicy {
    /// Parses `all` or `uniform <n>`.
    pub fn parse(tokens: &[String]) -> Result<Self> {
        match tokens {
            [kind] if kind == "all" => Ok(FeaturePolicy::All),
            [kind, n] if kind == "uniform" => {
                let n = n.parse().map_err(|_| {
                    Error::MalformedInput(format!("bad feature count \"{n}\""))
                })?;
                Ok(FeaturePolicy::Uniform(n))
            }
            [kind, ..] => Err(unknown("allowed features", kind)),
            [] => Err(Error::MalformedInput("missing feature policy".to_string())),
        }
    }
}

fn parse_number(token: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| Error::MalformedInput(format!("cannot parse number \"{token}\"")))
}

fn unknown(option: &str, token: &str) -> Error {
    Error::UnknownOption(format!("unknown type of {option} \"{token}\""))
}

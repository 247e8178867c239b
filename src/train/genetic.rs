//! The genetic training loop.
//!
//! A [`Trainer`] evolves a population of decision trees against one
//! dataset: parents are selected, crossed over by subtree substitution,
//! occasionally mutated, and the offspring are staged in descending
//! fitness order. The staging buffer and the current population swap at
//! every generation boundary; the top `elitism` individuals cross the
//! boundary verbatim.
//!
//! Every stochastic choice draws from one seeded ChaCha generator in a
//! fixed order, so a (seed, dataset, config) triple reproduces the same
//! final tree.

use std::fs;
use std::mem;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::dataset::Dataset;
use crate::core::performance::Performance;
use crate::core::tree::{DecisionTree, NodeId, SplitOutcome};
use crate::error::{Error, Result};
use crate::silva;
use crate::train::config::{
    Crossover, FeaturePolicy, FitnessFunction, Mutation, MutationSchedule, NextPopulationSize,
    PopulationGenerator, Selection, TrainingConfig,
};
use crate::train::search::split_trial;

/// A generation: individuals with their fitness, kept in non-increasing
/// fitness order.
#[derive(Debug, Default)]
pub struct Population {
    individuals: Vec<DecisionTree>,
    fitness: Vec<f64>,
}

impl Population {
    fn with_capacity(capacity: usize) -> Self {
        Population {
            individuals: Vec::with_capacity(capacity),
            fitness: Vec::with_capacity(capacity),
        }
    }

    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    pub fn individual(&self, index: usize) -> &DecisionTree {
        &self.individuals[index]
    }

    pub fn fitness(&self, index: usize) -> f64 {
        self.fitness[index]
    }

    pub fn fitness_values(&self) -> &[f64] {
        &self.fitness
    }

    fn clear(&mut self) {
        self.individuals.clear();
        self.fitness.clear();
    }

    fn push(&mut self, tree: DecisionTree, fitness: f64) {
        self.individuals.push(tree);
        self.fitness.push(fitness);
    }

    /// Inserts before the first stored fitness that does not exceed the
    /// new one, keeping the buffer sorted by non-increasing fitness.
    fn insert_sorted(&mut self, tree: DecisionTree, fitness: f64) {
        let position = self
            .fitness
            .iter()
            .position(|&stored| stored <= fitness)
            .unwrap_or(self.fitness.len());
        self.individuals.insert(position, tree);
        self.fitness.insert(position, fitness);
    }

    fn sort_descending(&mut self) {
        let mut pairs: Vec<(f64, DecisionTree)> = self
            .fitness
            .drain(..)
            .zip(self.individuals.drain(..))
            .collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (fitness, tree) in pairs {
            self.push(tree, fitness);
        }
    }
}

/// A callback observing the trainer at a state-machine edge.
pub type Callback = Box<dyn FnMut(&Trainer)>;

#[derive(Default)]
struct Callbacks {
    start: Option<Callback>,
    before_iter: Option<Callback>,
    after_iter: Option<Callback>,
    end: Option<Callback>,
}

/// The state of one training run.
pub struct Trainer {
    config: TrainingConfig,
    population: Population,
    staging: Population,
    rng: ChaCha8Rng,
    allowed_features: Vec<usize>,
    scratch: Vec<f64>,
    current_iteration: usize,
    callbacks: Callbacks,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let capacity = config.max_population_size;
        Trainer {
            config,
            population: Population::with_capacity(capacity),
            staging: Population::with_capacity(capacity),
            rng,
            allowed_features: Vec::new(),
            scratch: Vec::new(),
            current_iteration: 0,
            callbacks: Callbacks::default(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// The generation currently being produced, starting at 0.
    pub fn current_iteration(&self) -> usize {
        self.current_iteration
    }

    pub fn on_start(&mut self, callback: impl FnMut(&Trainer) + 'static) {
        self.callbacks.start = Some(Box::new(callback));
    }

    pub fn on_before_iter(&mut self, callback: impl FnMut(&Trainer) + 'static) {
        self.callbacks.before_iter = Some(Box::new(callback));
    }

    pub fn on_after_iter(&mut self, callback: impl FnMut(&Trainer) + 'static) {
        self.callbacks.after_iter = Some(Box::new(callback));
    }

    pub fn on_end(&mut self, callback: impl FnMut(&Trainer) + 'static) {
        self.callbacks.end = Some(Box::new(callback));
    }

    /// Runs the configured number of generations over `data` and returns
    /// the fittest tree.
    pub fn train(&mut self, data: &Dataset) -> Result<DecisionTree> {
        self.allowed_features = self.resolve_features(data);
        self.scratch = vec![0.0; 2 * data.n_labels()];
        self.generate_initial_population(data)?;

        let mut callbacks = mem::take(&mut self.callbacks);
        if let Some(callback) = callbacks.start.as_mut() {
            callback(self);
        }

        for iteration in 0..self.config.max_iteration {
            self.current_iteration = iteration;
            if let Some(callback) = callbacks.before_iter.as_mut() {
                callback(self);
            }

            self.next_generation(data);
            debug!(
                "iteration {}/{}: best fitness {:.6}",
                iteration + 1,
                self.config.max_iteration,
                self.population.fitness(0)
            );

            if let Some(callback) = callbacks.after_iter.as_mut() {
                callback(self);
            }
        }

        if let Some(callback) = callbacks.end.as_mut() {
            callback(self);
        }
        self.callbacks = callbacks;

        Ok(self.population.individual(0).clone())
    }

    /// Produces the next generation in the staging buffer and swaps it in.
    fn next_generation(&mut self, data: &Dataset) {
        let next_size = match self.config.next_population_size {
            NextPopulationSize::Constant => self.population.size(),
        };

        self.staging.clear();
        for index in 0..self.config.elitism.min(self.population.size()).min(next_size) {
            let elite = self.population.individual(index).clone();
            let fitness = self.population.fitness(index);
            self.staging.push(elite, fitness);
        }

        while self.staging.size() < next_size {
            let parent_a = self.select();
            let parent_b = self.select();
            let mutation_probability = self.mutation_probability();

            let mut offspring = match self.config.crossover {
                Crossover::OnePoint => {
                    crossover_one_point(&self.population, parent_a, parent_b, data, &mut self.rng)
                }
            };
            if self.rng.gen::<f64>() < mutation_probability {
                self.mutate(&mut offspring, data);
            }

            let fitness = self.fitness_of(&offspring, data);
            self.staging.insert_sorted(offspring, fitness);
        }

        mem::swap(&mut self.population, &mut self.staging);
        self.staging.clear();
    }

    /// The index of a parent drawn from the current population.
    fn select(&mut self) -> usize {
        match self.config.selection {
            Selection::Uniform => self.rng.gen_range(0..self.population.size()),
            Selection::RouletteWheel => {
                let p: f64 = self.rng.gen();
                let total: f64 = self.population.fitness_values().iter().sum();
                if total == 0.0 {
                    return 0;
                }
                let mut cumulative = 0.0;
                for (index, &fitness) in self.population.fitness_values().iter().enumerate() {
                    cumulative += fitness;
                    if cumulative > p * total {
                        return index;
                    }
                }
                0
            }
        }
    }

    fn mutation_probability(&self) -> f64 {
        match self.config.mutation_schedule {
            MutationSchedule::Constant => self.config.base_mutation_probability,
            MutationSchedule::EncourageVariance => {
                let (min, max) = self
                    .population
                    .fitness_values()
                    .iter()
                    .fold((1.0_f64, 0.0_f64), |(min, max), &f| (min.min(f), max.max(f)));
                1.0 - (max - min)
            }
        }
    }

    fn mutate(&mut self, tree: &mut DecisionTree, data: &Dataset) {
        match self.config.mutation {
            Mutation::None => {}
            Mutation::Grow => {
                let leaf = self.descend_by_entropy(tree);
                self.try_split(tree, data, leaf);
            }
            Mutation::Z => {
                if let Some(leaf) = self.descend_or_prune(tree) {
                    self.try_split(tree, data, leaf);
                }
            }
        }
    }

    /// Walks from the root towards high-entropy leaves: at each internal
    /// node the left child is taken with probability `H(left) / (H(left) +
    /// H(right))`.
    fn descend_by_entropy(&mut self, tree: &DecisionTree) -> NodeId {
        let mut id = tree.root();
        loop {
            let node = tree.node(id);
            let (left, right) = match (node.left(), node.right()) {
                (Some(left), Some(right)) => (left, right),
                _ => return id,
            };
            let entropy_left = tree.node(left).entropy();
            let entropy_right = tree.node(right).entropy();
            let p: f64 = self.rng.gen();
            id = if p < entropy_left / (entropy_left + entropy_right) {
                left
            } else {
                right
            };
        }
    }

    /// The `Z` walk: each internal node may be pruned with probability
    /// `1 - H(node)` before the entropy-weighted descent continues; one
    /// draw decides both. Returns the reached leaf, or `None` if the walk
    /// ended in a prune.
    fn descend_or_prune(&mut self, tree: &mut DecisionTree) -> Option<NodeId> {
        let mut id = tree.root();
        loop {
            let node = tree.node(id);
            let (left, right) = match (node.left(), node.right()) {
                (Some(left), Some(right)) => (left, right),
                _ => return Some(id),
            };
            let entropy = node.entropy();
            let entropy_left = tree.node(left).entropy();
            let entropy_right = tree.node(right).entropy();
            let p: f64 = self.rng.gen();
            if p < 1.0 - entropy {
                tree.prune(id);
                return None;
            }
            id = if p < entropy_left / (entropy_left + entropy_right) {
                left
            } else {
                right
            };
        }
    }

    /// Runs a split-candidate search at `leaf` and applies the result. A
    /// trivial outcome leaves the tree unchanged.
    fn try_split(&mut self, tree: &mut DecisionTree, data: &Dataset, leaf: NodeId) {
        let (feature, threshold) = split_trial(
            tree,
            data,
            leaf,
            &self.allowed_features,
            self.config.split_search_aggressiveness,
            &mut self.scratch,
            &mut self.rng,
        );
        let _ = tree.split(data, leaf, feature, threshold);
    }

    fn fitness_of(&self, tree: &DecisionTree, data: &Dataset) -> f64 {
        match &self.config.fitness {
            FitnessFunction::Linear { parameters } => {
                let performance = Performance::evaluate(tree, data, parameters[0]);
                let n = performance.samples as f64;
                parameters[1] * performance.correct as f64 / n
                    + parameters[2] * performance.wrong as f64 / n
                    + parameters[3] * performance.stable as f64 / n
                    + parameters[4] * performance.unstable as f64 / n
                    + parameters[5]
                        * (1.0 - (performance.stable + performance.unstable) as f64 / n)
                    + parameters[6] * performance.robust as f64 / n
                    + parameters[7] * performance.vulnerable as f64 / n
                    + parameters[8] * performance.fragile as f64 / n
                    + parameters[9] * performance.broken as f64 / n
            }
        }
    }

    /// The feature subset split candidates may use, fixed for the whole
    /// run.
    fn resolve_features(&mut self, data: &Dataset) -> Vec<usize> {
        match self.config.feature_policy {
            FeaturePolicy::All => (0..data.space_size()).collect(),
            FeaturePolicy::Uniform(n) => {
                let mut pool: Vec<usize> = (0..data.space_size()).collect();
                let n = n.min(pool.len());
                let mut chosen = Vec::with_capacity(n);
                for _ in 0..n {
                    let next = self.rng.gen_range(0..pool.len());
                    chosen.push(pool.remove(next));
                }
                chosen
            }
        }
    }

    fn generate_initial_population(&mut self, data: &Dataset) -> Result<()> {
        self.population.clear();
        match &self.config.population_generator {
            PopulationGenerator::Blank => {
                let size = self
                    .config
                    .initial_population_size
                    .min(self.config.max_population_size);
                for _ in 0..size {
                    let tree = DecisionTree::new(data);
                    let fitness = self.fitness_of(&tree, data);
                    self.population.push(tree, fitness);
                }
            }
            PopulationGenerator::FromForest(path) => {
                let source =
                    fs::read_to_string(path).map_err(|e| Error::missing_file(path, e))?;
                let forest = silva::read_forest(&source, data)?;
                for tree in forest
                    .into_trees()
                    .into_iter()
                    .take(self.config.max_population_size)
                {
                    let fitness = self.fitness_of(&tree, data);
                    self.population.push(tree, fitness);
                }
            }
        }

        if self.population.size() == 0 {
            return Err(Error::MalformedInput(
                "initial population is empty".to_string(),
            ));
        }
        self.population.sort_descending();
        Ok(())
    }
}

/// Chooses a crossover point by a leaf-biased random walk: at each
/// internal node, descend left or right with probability 0.3 each, stop
/// with probability 0.4.
fn choose_subtree<R: Rng>(tree: &DecisionTree, rng: &mut R) -> NodeId {
    let mut id = tree.root();
    loop {
        let node = tree.node(id);
        let (left, right) = match (node.left(), node.right()) {
            (Some(left), Some(right)) => (left, right),
            _ => return id,
        };
        let p: f64 = rng.gen();
        if p < 0.3 {
            id = left;
        } else if p < 0.6 {
            id = right;
        } else {
            return id;
        }
    }
}

/// One-point subtree crossover.
///
/// The offspring is built blank over the full dataset and the splits of
/// parent A are replayed into it top-down; when the replay reaches the
/// crossover point of A, the subtree rooted at B's crossover point is
/// replayed instead. Because replaying respects the offspring's own sample
/// distribution, a copied split may turn out trivial; the offspring then
/// keeps growing from the record of its only populated side.
fn crossover_one_point<R: Rng>(
    population: &Population,
    index_a: usize,
    index_b: usize,
    data: &Dataset,
    rng: &mut R,
) -> DecisionTree {
    let parent_a = population.individual(index_a);
    let parent_b = population.individual(index_b);
    let subtree_a = choose_subtree(parent_a, rng);
    let subtree_b = choose_subtree(parent_b, rng);
    // When one individual plays both parents, node handles of A and B
    // would collide; the substitution is skipped and the offspring is a
    // replay of A.
    let same_individual = index_a == index_b;

    let mut offspring = DecisionTree::new(data);
    let mut parents: Vec<(bool, NodeId)> = vec![(true, parent_a.root())];
    let mut offsprings: Vec<NodeId> = vec![offspring.root()];

    while let Some((mut in_a, mut id)) = parents.pop() {
        let offspring_id = offsprings.pop().expect("parent and offspring stacks walk in lockstep");

        if in_a && id == subtree_a && !same_individual {
            in_a = false;
            id = subtree_b;
        }
        let parent = if in_a { parent_a } else { parent_b };
        let node = parent.node(id);
        let (left, right) = match (node.left(), node.right()) {
            (Some(left), Some(right)) => (left, right),
            _ => continue,
        };

        match offspring.split(data, offspring_id, node.feature(), node.threshold()) {
            SplitOutcome::Both => {
                let grown = offspring.node(offspring_id);
                let offspring_left = grown.left().expect("split reported both sides");
                let offspring_right = grown.right().expect("split reported both sides");
                offsprings.push(offspring_right);
                offsprings.push(offspring_left);
                parents.push((in_a, right));
                parents.push((in_a, left));
            }
            SplitOutcome::Left => {
                offsprings.push(offspring_id);
                parents.push((in_a, left));
            }
            SplitOutcome::Right => {
                offsprings.push(offspring_id);
                parents.push((in_a, right));
            }
        }
    }

    offspring
}

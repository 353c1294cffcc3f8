//! Core value types for the steady-state engine.
//!
//! [`Individual`] is the unit that flows between the store and the
//! tournament engine. [`FitnessFunction`] is the caller-supplied scoring
//! contract, and [`Algorithm`] picks the crossover variant.

use rand::Rng;
use std::fmt;

/// Operator variant used by the tournament engine.
///
/// - [`Algorithm::Ga`]: fixed-length genetic algorithm. Crossover uses one
///   cut point shared by both parents, so every child keeps the parent length.
/// - [`Algorithm::Gp`]: variable-length genetic programming. Each parent gets
///   its own cut point and child lengths drift over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Fixed-length single-point crossover.
    Ga,
    /// Variable-length two-point crossover.
    #[default]
    Gp,
}

/// A candidate solution: an integer gene sequence and its cached fitness.
///
/// Fitness is `None` until the tournament engine evaluates the individual.
/// Higher fitness is better.
///
/// # Examples
///
/// ```
/// use u_steadystate::steady::Individual;
///
/// let mut ind = Individual::from_genes(vec![1, 2, 3]);
/// assert!(!ind.is_evaluated());
/// ind.set_fitness(4.5);
/// assert_eq!(ind.fitness(), Some(4.5));
/// assert_eq!(ind.to_string(), "(4.50,3)->[1 2 3 ]");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Individual {
    /// Gene sequence. Length is fixed in GA mode and varies in GP mode.
    pub genes: Vec<i64>,

    /// Cached fitness, `None` while unevaluated.
    pub fitness: Option<f64>,
}

impl Individual {
    /// Creates an individual with `length` genes, each drawn uniformly over
    /// the full `i64` range.
    pub fn random<R: Rng>(length: usize, rng: &mut R) -> Self {
        Self {
            genes: (0..length).map(|_| rng.random::<i64>()).collect(),
            fitness: None,
        }
    }

    /// Creates an individual with `length` zero genes.
    pub fn empty(length: usize) -> Self {
        Self {
            genes: vec![0; length],
            fitness: None,
        }
    }

    /// Wraps an existing gene sequence as an unevaluated individual.
    pub fn from_genes(genes: Vec<i64>) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns `true` if the gene sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Cached fitness, if evaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Returns `true` once a fitness has been assigned.
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Stores an evaluated fitness.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Marks the individual as needing re-evaluation.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fitness {
            Some(v) => write!(f, "({:.2},{})->[", v, self.genes.len())?,
            None => write!(f, "(-,{})->[", self.genes.len())?,
        }
        for g in &self.genes {
            write!(f, "{g} ")?;
        }
        write!(f, "]")
    }
}

/// Scores an individual. Higher is better.
///
/// Implementations are called concurrently from every worker running
/// tournament rounds, so they must be `Send + Sync` and free of side
/// effects visible to the engine. Any `Fn(&Individual) -> f64` closure
/// qualifies through the blanket implementation.
///
/// ```
/// use u_steadystate::steady::{FitnessFunction, Individual};
///
/// let count_even = |ind: &Individual| ind.genes.iter().filter(|g| *g % 2 == 0).count() as f64;
/// assert_eq!(count_even.evaluate(&Individual::from_genes(vec![2, 3, 4])), 2.0);
/// ```
pub trait FitnessFunction: Send + Sync {
    /// Computes the fitness of `individual`.
    fn evaluate(&self, individual: &Individual) -> f64;
}

impl<F> FitnessFunction for F
where
    F: Fn(&Individual) -> f64 + Send + Sync,
{
    fn evaluate(&self, individual: &Individual) -> f64 {
        self(individual)
    }
}

//! Population configuration.
//!
//! [`PopulationConfig`] holds every parameter fixed at construction time.

use super::types::Algorithm;

/// Number of individuals a tournament round checks out.
pub const TOURNAMENT_SIZE: usize = 4;

/// What a checkout does when the pool has nothing resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExhaustionPolicy {
    /// Reply immediately with [`EvoError::PoolExhausted`](crate::EvoError::PoolExhausted).
    #[default]
    Fail,

    /// Park the request until a return makes an individual available.
    ///
    /// Parked requests are served in arrival order. Callers must keep the
    /// number of concurrent rounds at or below
    /// `population_size / TOURNAMENT_SIZE`, otherwise every worker can end up
    /// holding a partial tournament while waiting on the others.
    Block,
}

/// Configuration for a steady-state population.
///
/// # Defaults
///
/// ```
/// use u_steadystate::steady::{Algorithm, PopulationConfig};
///
/// let config = PopulationConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.algorithm, Algorithm::Gp);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_steadystate::steady::{Algorithm, ExhaustionPolicy, PopulationConfig};
///
/// let config = PopulationConfig::default()
///     .with_population_size(200)
///     .with_gene_length(32)
///     .with_algorithm(Algorithm::Ga)
///     .with_crossover_rate(0.8)
///     .with_mutation_rate(0.02)
///     .with_exhaustion_policy(ExhaustionPolicy::Block);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationConfig {
    /// Number of individuals created at start-up.
    pub population_size: usize,

    /// Gene count of every initial individual.
    ///
    /// Stays fixed in GA mode; only the starting length in GP mode.
    pub gene_length: usize,

    /// Probability that a crossover event recombines the parents (0.0–1.0).
    ///
    /// Otherwise the children are exact copies of the parents.
    pub crossover_rate: f64,

    /// Per-gene probability of replacement during mutation (0.0–1.0).
    pub mutation_rate: f64,

    /// Crossover variant.
    pub algorithm: Algorithm,

    /// Checkout behavior on an empty pool.
    pub exhaustion_policy: ExhaustionPolicy,

    /// Clears a child's fitness when mutation replaced at least one gene.
    ///
    /// Without this a mutated child keeps the fitness of its parent and is
    /// never re-scored.
    pub reset_fitness_on_mutation: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            gene_length: 10,
            crossover_rate: 0.9,
            mutation_rate: 0.01,
            algorithm: Algorithm::default(),
            exhaustion_policy: ExhaustionPolicy::default(),
            reset_fitness_on_mutation: true,
            seed: None,
        }
    }
}

impl PopulationConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the initial gene length.
    pub fn with_gene_length(mut self, n: usize) -> Self {
        self.gene_length = n;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the per-gene mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover variant.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the exhaustion policy.
    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion_policy = policy;
        self
    }

    /// Enables or disables fitness invalidation after mutation.
    pub fn with_reset_fitness_on_mutation(mut self, reset: bool) -> Self {
        self.reset_fitness_on_mutation = reset;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.population_size < TOURNAMENT_SIZE {
            return Err(format!(
                "population_size must be at least {TOURNAMENT_SIZE}"
            ));
        }
        if self.gene_length < 2 {
            return Err("gene_length must be at least 2".into());
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err("crossover_rate must be within [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err("mutation_rate must be within [0, 1]".into());
        }
        Ok(())
    }

    /// Largest number of rounds that may run at once without starving the
    /// pool.
    pub fn max_concurrent_rounds(&self) -> usize {
        self.population_size / TOURNAMENT_SIZE
    }
}

//! Population facade.
//!
//! [`Population`] builds the initial individuals, starts the store loop and
//! exposes round execution, sequential or on a worker pool. The caller
//! decides how many rounds to run; there is no termination criterion.

use super::config::PopulationConfig;
use super::store::{PopulationStore, StoreHandle, StoreSnapshot};
use super::tournament::{run_round, RoundOutcome};
use super::types::{FitnessFunction, Individual};
use crate::error::{EvoError, Result};
use crate::random::{create_rng, rng_from};
use log::info;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "parallel")]
use super::config::{ExhaustionPolicy, TOURNAMENT_SIZE};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Totals over a batch of rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rounds completed.
    pub rounds: usize,
    /// Fitness-function calls made.
    pub evaluations: usize,
    /// Rounds that set a new running best.
    pub improvements: usize,
}

impl RunSummary {
    fn absorb(mut self, outcome: &RoundOutcome) -> Self {
        self.rounds += 1;
        self.evaluations += outcome.evaluations;
        self.improvements += usize::from(outcome.improved);
        self
    }
}

/// Exported state of a population: its configuration, resident individuals
/// and best-fitness tracking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationSnapshot {
    /// Configuration the population was built with.
    pub config: PopulationConfig,
    /// Individuals resident in the store.
    pub individuals: Vec<Individual>,
    /// Individuals held by in-flight rounds.
    pub checked_out: usize,
    /// Fitness-function calls so far.
    pub evaluations: u64,
    /// Running best fitness.
    pub best_fitness: Option<f64>,
    /// Individuals that set the running best, keyed by their fitness text.
    pub best_history: BTreeMap<String, Individual>,
}

impl PopulationSnapshot {
    fn from_store(config: PopulationConfig, snapshot: StoreSnapshot) -> Self {
        Self {
            config,
            individuals: snapshot.individuals,
            checked_out: snapshot.checked_out,
            evaluations: snapshot.evaluations,
            best_fitness: snapshot.archive.best(),
            best_history: snapshot.archive.entries().clone(),
        }
    }

    /// Fails on the first NaN or infinite fitness, resident or archived.
    ///
    /// JSON has no spelling for those values, so they would come back as
    /// unevaluated.
    pub fn check_finite(&self) -> Result<()> {
        let scores = self
            .individuals
            .iter()
            .chain(self.best_history.values())
            .filter_map(Individual::fitness)
            .chain(self.best_fitness);
        for score in scores {
            if !score.is_finite() {
                return Err(EvoError::NonFiniteFitness(score));
            }
        }
        Ok(())
    }

    /// Renders the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    /// [`EvoError::NonFiniteFitness`] if [`check_finite`](Self::check_finite)
    /// fails.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        self.check_finite()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot previously produced by [`to_json`](Self::to_json).
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for PopulationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for ind in &self.individuals {
            writeln!(f, "{ind}")?;
        }
        write!(f, "}}")
    }
}

/// A live steady-state population.
///
/// # Usage
///
/// ```
/// use u_steadystate::steady::{Algorithm, Individual, Population, PopulationConfig};
///
/// let even_genes = |ind: &Individual| ind.genes.iter().filter(|g| *g % 2 == 0).count() as f64;
/// let config = PopulationConfig::default()
///     .with_population_size(40)
///     .with_gene_length(12)
///     .with_algorithm(Algorithm::Ga)
///     .with_seed(42);
///
/// let population = Population::new(config, even_genes).unwrap();
/// let summary = population.run(200).unwrap();
/// assert_eq!(summary.rounds, 200);
/// assert_eq!(population.snapshot().unwrap().individuals.len(), 40);
/// ```
pub struct Population<F: FitnessFunction> {
    config: PopulationConfig,
    fitness: F,
    handle: StoreHandle,
    rng: Mutex<StdRng>,
    // Dropped last: shuts the store loop down and joins it.
    _store: PopulationStore,
}

impl<F: FitnessFunction> Population<F> {
    /// Creates `population_size` random individuals of `gene_length` genes
    /// and starts the store loop.
    ///
    /// # Errors
    /// [`EvoError::InvalidConfig`] if validation fails, or
    /// [`EvoError::Io`] if the store thread cannot be spawned.
    pub fn new(config: PopulationConfig, fitness: F) -> Result<Self> {
        config.validate().map_err(EvoError::InvalidConfig)?;

        let mut rng = rng_from(config.seed);
        let individuals: Vec<Individual> = (0..config.population_size)
            .map(|_| Individual::random(config.gene_length, &mut rng))
            .collect();

        let store = PopulationStore::spawn(
            individuals,
            config.exhaustion_policy,
            create_rng(rng.random()),
        )?;
        info!(
            "population started: {} individuals, gene length {}, {:?}",
            config.population_size, config.gene_length, config.algorithm
        );

        Ok(Self {
            handle: store.handle(),
            rng: Mutex::new(create_rng(rng.random())),
            config,
            fitness,
            _store: store,
        })
    }

    /// The configuration this population was built with.
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// A handle to the underlying store.
    pub fn store(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// Runs one tournament round with the thread-local generator.
    ///
    /// May be called from many threads at once. Under
    /// [`ExhaustionPolicy::Block`](super::config::ExhaustionPolicy::Block)
    /// keep concurrent callers at or below
    /// [`PopulationConfig::max_concurrent_rounds`], or every caller can end
    /// up holding part of a tournament while waiting for the rest.
    pub fn tournament(&self) -> Result<RoundOutcome> {
        self.tournament_with_rng(&mut rand::rng())
    }

    /// Runs one tournament round drawing from `rng`.
    pub fn tournament_with_rng<R: Rng>(&self, rng: &mut R) -> Result<RoundOutcome> {
        run_round(&self.handle, &self.config, &self.fitness, rng)
    }

    /// Runs `rounds` rounds one after another.
    ///
    /// Uses the population's own generator, so a seeded population replays
    /// the same run.
    pub fn run(&self, rounds: usize) -> Result<RunSummary> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = RunSummary::default();
        for _ in 0..rounds {
            let outcome = self.tournament_with_rng(&mut *rng)?;
            summary = summary.absorb(&outcome);
        }
        Ok(summary)
    }

    /// Runs `rounds` rounds concurrently on a pool of `workers` threads.
    ///
    /// # Errors
    /// [`EvoError::InvalidConfig`] if `workers` is zero, or if the
    /// exhaustion policy is [`ExhaustionPolicy::Block`] and `workers`
    /// exceeds [`PopulationConfig::max_concurrent_rounds`]. Under
    /// [`ExhaustionPolicy::Fail`] an oversubscribed pool surfaces as
    /// [`EvoError::PoolExhausted`] from the first round that runs dry.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(&self, rounds: usize, workers: usize) -> Result<RunSummary> {
        self.check_workers(workers)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tournament-{i}"))
            .build()
            .map_err(|e| EvoError::ThreadPool(e.to_string()))?;

        let outcomes: Vec<RoundOutcome> = pool.install(|| {
            (0..rounds)
                .into_par_iter()
                .map(|_| self.tournament())
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(outcomes
            .iter()
            .fold(RunSummary::default(), |summary, outcome| summary.absorb(outcome)))
    }

    #[cfg(feature = "parallel")]
    fn check_workers(&self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(EvoError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.config.exhaustion_policy == ExhaustionPolicy::Block
            && workers > self.config.max_concurrent_rounds()
        {
            return Err(EvoError::InvalidConfig(format!(
                "{workers} workers need at least {} individuals under the Block policy",
                workers * TOURNAMENT_SIZE
            )));
        }
        Ok(())
    }

    /// Copies the current state for rendering or persistence.
    pub fn snapshot(&self) -> Result<PopulationSnapshot> {
        let snapshot = self.handle.snapshot()?;
        Ok(PopulationSnapshot::from_store(self.config.clone(), snapshot))
    }

    /// Running best fitness.
    pub fn best_fitness(&self) -> Result<Option<f64>> {
        self.handle.best()
    }

    /// Fitness-function calls so far.
    pub fn evaluations(&self) -> Result<u64> {
        Ok(self.handle.snapshot()?.evaluations)
    }

    /// Writes a JSON snapshot to `path`.
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let json = self.snapshot()?.to_json()?;
        std::fs::write(path.as_ref(), json)?;
        info!("population saved to {}", path.as_ref().display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Steady-state tournament evolution.
//!
//! A fixed pool of integer-gene individuals lives inside a store actor.
//! Any number of workers run tournament rounds against it concurrently:
//! each round borrows four individuals, scores the unevaluated ones with a
//! caller-supplied [`FitnessFunction`], keeps the two duel winners and
//! replaces the two losers with the winners' offspring.
//!
//! # Key Types
//!
//! - [`Population`]: builds the pool and runs rounds
//! - [`PopulationConfig`]: rates, sizes, operator variant, exhaustion policy
//! - [`PopulationStore`] / [`StoreHandle`]: the serialized checkout/return actor
//! - [`Individual`]: gene sequence plus cached fitness
//!
//! # Submodules
//!
//! - [`operators`]: GA and GP crossover, per-gene mutation
//!
//! # References
//!
//! - Syswerda (1991), "A Study of Reproduction in Generational and
//!   Steady-State Genetic Algorithms"
//! - Koza (1992), *Genetic Programming*

mod config;
pub mod operators;
mod population;
mod store;
mod tournament;
mod types;

pub use config::{ExhaustionPolicy, PopulationConfig, TOURNAMENT_SIZE};
pub use population::{Population, PopulationSnapshot, RunSummary};
pub use store::{EliteArchive, Lease, PopulationStore, Standing, StoreHandle, StoreSnapshot};
pub use tournament::{duel, run_round, RoundOutcome};
pub use types::{Algorithm, FitnessFunction, Individual};

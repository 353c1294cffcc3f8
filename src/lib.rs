//! Steady-state evolutionary computation over a concurrently shared pool.
//!
//! A population of integer-gene individuals is owned by a single store
//! loop. Tournament rounds, sequential or from many threads at once, borrow
//! individuals through serialized checkout/return requests, score them with
//! a caller-supplied fitness function, and breed replacements for the
//! losers:
//!
//! - **GA**: fixed-length single-point crossover.
//! - **GP**: variable-length crossover with an independent cut point per
//!   parent, so gene sequences grow and shrink over the run.
//!
//! Fitness evaluations are memoized per individual, and the running best is
//! archived alongside the pool.
//!
//! # Architecture
//!
//! - [`steady::operators`]: pure crossover and mutation functions
//! - [`steady::PopulationStore`]: the actor owning the pool
//! - [`steady::run_round`]: one tournament against a store
//! - [`steady::Population`]: construction, run loops, snapshots
//!
//! # Features
//!
//! - `parallel` (default): [`steady::Population::run_parallel`] on a rayon pool
//! - `serde`: serializable configuration and snapshots, JSON export

pub mod error;
pub mod random;
pub mod steady;

pub use error::{EvoError, Result};

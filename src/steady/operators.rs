//! Genetic operators over integer gene sequences.
//!
//! # Crossover Operators
//!
//! - [`crossover_gp`]: independent cut point per parent, child lengths vary
//! - [`crossover_ga`]: one shared cut point, child lengths equal parent length
//! - [`crossover`]: dispatches on [`Algorithm`]
//!
//! Both variants first draw `r` in `[0, 1)`. When `r >= rate` the children
//! are independent copies of the parents, fitness included.
//!
//! # Mutation Operators
//!
//! - [`mutate`]: per-gene replacement with a fresh random integer
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*

use super::types::{Algorithm, Individual};
use crate::error::{EvoError, Result};
use rand::Rng;

// ============================================================================
// Crossover operators
// ============================================================================

/// Variable-length crossover (GP).
///
/// With probability `rate`, draws `cut1` in parent1 and `cut2` in parent2
/// (see [`cut_point`]) and returns
///
/// - child A = `parent1[..cut1] ++ parent2[cut2..]`
/// - child B = `parent2[..cut2] ++ parent1[cut1..]`
///
/// Recombined children are unevaluated.
///
/// # Complexity
/// O(n + m) time and space
pub fn crossover_gp<R: Rng>(
    parent1: &Individual,
    parent2: &Individual,
    rate: f64,
    rng: &mut R,
) -> (Individual, Individual) {
    if rng.random::<f64>() >= rate {
        return (parent1.clone(), parent2.clone());
    }

    let cut1 = cut_point(parent1.len(), rng);
    let cut2 = cut_point(parent2.len(), rng);
    splice(parent1, parent2, cut1, cut2)
}

/// Fixed-length single-point crossover (GA).
///
/// With probability `rate`, draws one cut point `c` shared by both parents
/// and returns `parent1[..c] ++ parent2[c..]` and `parent2[..c] ++ parent1[c..]`.
///
/// # Errors
/// [`EvoError::LengthMismatch`] if the parents differ in length.
pub fn crossover_ga<R: Rng>(
    parent1: &Individual,
    parent2: &Individual,
    rate: f64,
    rng: &mut R,
) -> Result<(Individual, Individual)> {
    if parent1.len() != parent2.len() {
        return Err(EvoError::LengthMismatch {
            left: parent1.len(),
            right: parent2.len(),
        });
    }

    if rng.random::<f64>() >= rate {
        return Ok((parent1.clone(), parent2.clone()));
    }

    let cut = cut_point(parent1.len(), rng);
    Ok(splice(parent1, parent2, cut, cut))
}

/// Applies the crossover variant selected by `algorithm`.
pub fn crossover<R: Rng>(
    algorithm: Algorithm,
    parent1: &Individual,
    parent2: &Individual,
    rate: f64,
    rng: &mut R,
) -> Result<(Individual, Individual)> {
    match algorithm {
        Algorithm::Gp => Ok(crossover_gp(parent1, parent2, rate, rng)),
        Algorithm::Ga => crossover_ga(parent1, parent2, rate, rng),
    }
}

/// Exchanges tails at the given cut points.
///
/// `len(childA) == cut1 + len(parent2) - cut2` and
/// `len(childB) == cut2 + len(parent1) - cut1`.
///
/// # Panics
/// Panics if `cut1 > parent1.len()` or `cut2 > parent2.len()`.
pub fn splice(
    parent1: &Individual,
    parent2: &Individual,
    cut1: usize,
    cut2: usize,
) -> (Individual, Individual) {
    let (head1, tail1) = parent1.genes.split_at(cut1);
    let (head2, tail2) = parent2.genes.split_at(cut2);

    let mut child_a = Individual::empty(head1.len() + tail2.len());
    child_a.genes[..cut1].copy_from_slice(head1);
    child_a.genes[cut1..].copy_from_slice(tail2);

    let mut child_b = Individual::empty(head2.len() + tail1.len());
    child_b.genes[..cut2].copy_from_slice(head2);
    child_b.genes[cut2..].copy_from_slice(tail1);

    (child_a, child_b)
}

// ============================================================================
// Mutation operators
// ============================================================================

/// Per-gene mutation: each gene is independently replaced with a fresh
/// random `i64` when a draw `r` in `[0, 1)` satisfies `r <= rate`.
///
/// Fitness is left untouched; the caller decides whether to invalidate it.
/// Returns the number of genes replaced. A `rate` of zero never touches the
/// genes.
///
/// # Complexity
/// O(n)
pub fn mutate<R: Rng>(individual: &mut Individual, rate: f64, rng: &mut R) -> usize {
    if rate <= 0.0 {
        return 0;
    }
    let mut replaced = 0;
    for gene in individual.genes.iter_mut() {
        if rng.random::<f64>() <= rate {
            *gene = rng.random::<i64>();
            replaced += 1;
        }
    }
    replaced
}

// ============================================================================
// Helpers
// ============================================================================

/// Draws a cut point in `0..len-1`, excluding the last index.
///
/// Sequences of length 0 or 1 always cut at index 0 without consuming
/// randomness.
pub fn cut_point<R: Rng>(len: usize, rng: &mut R) -> usize {
    if len <= 1 {
        0
    } else {
        rng.random_range(0..len - 1)
    }
}

// ============================================================================
// Tests
// ============================================================================

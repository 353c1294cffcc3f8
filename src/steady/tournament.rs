//! One steady-state tournament round.
//!
//! A round checks out four individuals, scores any that are unevaluated,
//! pairs them off into two duels, breeds the two champions and returns the
//! champions plus their two children. Each child takes the place of a duel
//! loser, so the population size is unchanged while the weaker pair is
//! replaced.
//!
//! Every individual is held in a [`Lease`](super::store::Lease) until it is settled. If any step
//! fails, the unsettled leases go back to the store and nothing is lost.

use super::config::{PopulationConfig, TOURNAMENT_SIZE};
use super::operators::{crossover, mutate};
use super::store::StoreHandle;
use super::types::{FitnessFunction, Individual};
use crate::error::Result;
use log::{debug, info, log_enabled, Level};
use rand::Rng;
use std::ops::Deref;

/// What happened during one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Fitness of the four competitors, in checkout order.
    pub fitness: [f64; TOURNAMENT_SIZE],
    /// Gene lengths of the four competitors, in checkout order.
    pub lengths: [usize; TOURNAMENT_SIZE],
    /// Fitness-function calls made this round.
    pub evaluations: usize,
    /// Whether one of those calls set a new running best.
    pub improved: bool,
}

/// Picks the fitter of two competitors.
///
/// Returns `(champion, loser)`. A tie, or an incomparable score, keeps
/// `first` as the champion.
///
/// ```
/// use u_steadystate::steady::{duel, Individual};
///
/// let mut a = Individual::from_genes(vec![1]);
/// let mut b = Individual::from_genes(vec![2]);
/// a.set_fitness(1.0);
/// b.set_fitness(1.0);
/// let (champion, _) = duel(&a, &b);
/// assert_eq!(champion.genes, vec![1]);
/// ```
pub fn duel<T: Deref<Target = Individual>>(first: T, second: T) -> (T, T) {
    let score = |ind: &Individual| ind.fitness().unwrap_or(f64::NEG_INFINITY);
    if score(&*first) < score(&*second) {
        (second, first)
    } else {
        (first, second)
    }
}

/// Runs one tournament round against `store`.
///
/// The four checkouts are independent requests, so other rounds may
/// interleave with them.
///
/// # Errors
/// - [`EvoError::PoolExhausted`](crate::EvoError::PoolExhausted) if a
///   checkout finds the pool empty under the `Fail` policy.
/// - [`EvoError::LengthMismatch`](crate::EvoError::LengthMismatch) if GA
///   crossover meets champions of different lengths.
/// - [`EvoError::StoreClosed`](crate::EvoError::StoreClosed) if the store
///   has shut down.
pub fn run_round<F, R>(
    store: &StoreHandle,
    config: &PopulationConfig,
    fitness: &F,
    rng: &mut R,
) -> Result<RoundOutcome>
where
    F: FitnessFunction + ?Sized,
    R: Rng,
{
    let mut first = store.lease()?;
    let mut second = store.lease()?;
    let mut third = store.lease()?;
    let mut fourth = store.lease()?;

    let mut evaluations = 0;
    let mut improved = false;
    for competitor in [&mut first, &mut second, &mut third, &mut fourth] {
        if competitor.is_evaluated() {
            continue;
        }
        let score = fitness.evaluate(competitor);
        competitor.set_fitness(score);
        evaluations += 1;

        let standing = store.record_evaluation(competitor)?;
        if standing.improved {
            improved = true;
            info!(
                "new best fitness {score} (length {})",
                competitor.len()
            );
        }
    }

    let outcome = RoundOutcome {
        fitness: [&first, &second, &third, &fourth]
            .map(|c| c.fitness().unwrap_or(f64::NEG_INFINITY)),
        lengths: [&first, &second, &third, &fourth].map(|c| c.len()),
        evaluations,
        improved,
    };

    if log_enabled!(Level::Debug) {
        let best = store.best()?.unwrap_or(f64::NEG_INFINITY);
        debug!(
            "{:14.2}({:4}),{:14.2}({:4}),{:14.2}({:4}),{:14.2}({:4}),{:14.2}",
            outcome.fitness[0],
            outcome.lengths[0],
            outcome.fitness[1],
            outcome.lengths[1],
            outcome.fitness[2],
            outcome.lengths[2],
            outcome.fitness[3],
            outcome.lengths[3],
            best
        );
    }

    let (champion1, loser1) = duel(first, second);
    let (champion2, loser2) = duel(third, fourth);

    let (mut child1, mut child2) = crossover(
        config.algorithm,
        &champion1,
        &champion2,
        config.crossover_rate,
        rng,
    )?;
    for child in [&mut child1, &mut child2] {
        let replaced = mutate(child, config.mutation_rate, rng);
        if replaced > 0 && config.reset_fitness_on_mutation {
            child.invalidate();
        }
    }

    store.put(champion1.into_inner())?;
    store.put(champion2.into_inner())?;
    loser1.replace(child1)?;
    loser2.replace(child2)?;

    Ok(outcome)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvoError;
    use crate::random::create_rng;
    use crate::steady::config::ExhaustionPolicy;
    use crate::steady::store::PopulationStore;
    use crate::steady::types::Algorithm;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scored(genes: &[i64], fitness: f64) -> Individual {
        let mut ind = Individual::from_genes(genes.to_vec());
        ind.set_fitness(fitness);
        ind
    }

    fn sum_fitness(ind: &Individual) -> f64 {
        ind.genes.iter().map(|&g| g as f64).sum()
    }

    fn store_of(individuals: Vec<Individual>) -> PopulationStore {
        PopulationStore::spawn(individuals, ExhaustionPolicy::Fail, create_rng(42)).unwrap()
    }

    // ---- Champion selection ----

    #[test]
    fn test_duel_pairs_from_known_fitness() {
        let inds = [
            scored(&[1], 3.0),
            scored(&[2], 5.0),
            scored(&[3], 1.0),
            scored(&[4], 1.0),
        ];
        let (champion1, loser1) = duel(&inds[0], &inds[1]);
        let (champion2, loser2) = duel(&inds[2], &inds[3]);

        assert_eq!(champion1.genes, vec![2]);
        assert_eq!(loser1.genes, vec![1]);
        // Tie keeps the earlier competitor.
        assert_eq!(champion2.genes, vec![3]);
        assert_eq!(loser2.genes, vec![4]);
    }

    #[test]
    fn test_duel_with_leases() {
        let store = store_of(vec![scored(&[1], 9.0), scored(&[2], 2.0)]);
        let handle = store.handle();
        let a = handle.lease().unwrap();
        let b = handle.lease().unwrap();
        let (champion, loser) = duel(a, b);
        assert_eq!(champion.fitness(), Some(9.0));
        assert_eq!(loser.fitness(), Some(2.0));
    }

    // ---- Rounds ----

    #[test]
    fn test_round_conserves_population() {
        let mut rng = create_rng(42);
        let individuals = (0..12).map(|_| Individual::random(6, &mut rng)).collect();
        let store = store_of(individuals);
        let handle = store.handle();
        let config = PopulationConfig::default().with_gene_length(6);

        for _ in 0..50 {
            run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        }
        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.individuals.len(), 12);
        assert_eq!(snap.checked_out, 0);
    }

    #[test]
    fn test_round_accounting_with_overlapping_round() {
        let mut rng = create_rng(42);
        let individuals = (0..12).map(|_| Individual::random(6, &mut rng)).collect();
        let store = store_of(individuals);
        let handle = store.handle();
        let config = PopulationConfig::default().with_gene_length(6);

        // Another round is mid-flight holding four individuals.
        let held: Vec<_> = (0..4).map(|_| handle.lease().unwrap()).collect();

        run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.individuals.len(), 8);
        assert_eq!(snap.checked_out, 4);
        assert_eq!(snap.individuals.len() + snap.checked_out, 12);

        drop(held);
        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.individuals.len(), 12);
        assert_eq!(snap.checked_out, 0);
    }

    #[test]
    fn test_round_replaces_losers_with_children() {
        // Without crossover or mutation, children are copies of the champions.
        let store = store_of(vec![
            scored(&[10], 10.0),
            scored(&[20], 20.0),
            scored(&[30], 30.0),
            scored(&[40], 40.0),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default()
            .with_crossover_rate(0.0)
            .with_mutation_rate(0.0);
        let mut rng = create_rng(1);

        let outcome = run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        assert_eq!(outcome.evaluations, 0);

        let f = outcome.fitness;
        let champions = [f[0].max(f[1]), f[2].max(f[3])];
        let mut want = vec![champions[0], champions[0], champions[1], champions[1]];
        want.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut after: Vec<f64> = handle
            .snapshot()
            .unwrap()
            .individuals
            .iter()
            .map(|i| i.fitness().unwrap())
            .collect();
        after.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(after, want);
    }

    #[test]
    fn test_round_evaluates_only_unevaluated() {
        let calls = AtomicUsize::new(0);
        let counting = |ind: &Individual| {
            calls.fetch_add(1, Ordering::SeqCst);
            ind.len() as f64
        };
        let store = store_of(vec![
            scored(&[1, 1], 7.0),
            Individual::from_genes(vec![1, 2, 3]),
            scored(&[1, 1], 0.0),
            Individual::from_genes(vec![4, 5]),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default()
            .with_crossover_rate(0.0)
            .with_mutation_rate(0.0);
        let mut rng = create_rng(3);

        let outcome = run_round(&handle, &config, &counting, &mut rng).unwrap();
        // A stored zero is a real score, not a request for re-evaluation.
        assert_eq!(outcome.evaluations, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.snapshot().unwrap().evaluations, 2);
    }

    #[test]
    fn test_round_updates_running_best() {
        let store = store_of(vec![
            Individual::from_genes(vec![1]),
            Individual::from_genes(vec![2]),
            Individual::from_genes(vec![3]),
            Individual::from_genes(vec![4]),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default().with_mutation_rate(0.0);
        let mut rng = create_rng(5);

        let outcome = run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        assert!(outcome.improved);
        assert_eq!(outcome.evaluations, 4);

        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.archive.best(), Some(4.0));
        assert!(snap.archive.get("4").is_some());
    }

    #[test]
    fn test_mutated_children_are_rescored() {
        let store = store_of(vec![
            scored(&[1, 1, 1], 1.0),
            scored(&[2, 2, 2], 2.0),
            scored(&[3, 3, 3], 3.0),
            scored(&[4, 4, 4], 4.0),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default()
            .with_crossover_rate(0.0)
            .with_mutation_rate(1.0);
        let mut rng = create_rng(9);

        run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        let snap = handle.snapshot().unwrap();
        let unevaluated = snap.individuals.iter().filter(|i| !i.is_evaluated()).count();
        assert_eq!(unevaluated, 2);
    }

    #[test]
    fn test_stale_fitness_kept_when_reset_disabled() {
        let store = store_of(vec![
            scored(&[1, 1, 1], 1.0),
            scored(&[2, 2, 2], 2.0),
            scored(&[3, 3, 3], 3.0),
            scored(&[4, 4, 4], 4.0),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default()
            .with_crossover_rate(0.0)
            .with_mutation_rate(1.0)
            .with_reset_fitness_on_mutation(false);
        let mut rng = create_rng(9);

        run_round(&handle, &config, &sum_fitness, &mut rng).unwrap();
        let snap = handle.snapshot().unwrap();
        assert!(snap.individuals.iter().all(|i| i.is_evaluated()));
    }

    #[test]
    fn test_exhaustion_returns_partial_checkouts() {
        let store = store_of(vec![
            Individual::from_genes(vec![1, 2]),
            Individual::from_genes(vec![3, 4]),
            Individual::from_genes(vec![5, 6]),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default();
        let mut rng = create_rng(42);

        let err = run_round(&handle, &config, &sum_fitness, &mut rng).unwrap_err();
        assert!(matches!(err, EvoError::PoolExhausted { .. }));

        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.individuals.len(), 3);
        assert_eq!(snap.checked_out, 0);
    }

    #[test]
    fn test_ga_length_mismatch_restores_all_four() {
        let store = store_of(vec![
            scored(&[1, 2], 1.0),
            scored(&[1, 2, 3], 1.0),
            scored(&[1, 2, 3, 4], 1.0),
            scored(&[1, 2, 3, 4, 5], 1.0),
        ]);
        let handle = store.handle();
        let config = PopulationConfig::default()
            .with_algorithm(Algorithm::Ga)
            .with_crossover_rate(1.0);
        let mut rng = create_rng(42);

        let err = run_round(&handle, &config, &sum_fitness, &mut rng).unwrap_err();
        assert!(matches!(err, EvoError::LengthMismatch { .. }));

        let snap = handle.snapshot().unwrap();
        let mut lengths: Vec<usize> = snap.individuals.iter().map(|i| i.len()).collect();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![2, 3, 4, 5]);
        assert_eq!(snap.checked_out, 0);
    }
}

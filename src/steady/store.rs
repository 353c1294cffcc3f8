//! Population store actor.
//!
//! The store owns the resident individuals on a dedicated thread and
//! serves one request at a time, in arrival order, from a single FIFO
//! channel. Callers talk to it through a cloneable [`StoreHandle`]; every
//! request carries its own reply channel and the caller blocks until the
//! loop has answered it.
//!
//! The running best, the elite archive and the evaluation counter live in
//! the same loop, so they are serialized together with the collection.
//!
//! The loop keeps `resident + checked_out` equal to the population size.
//! [`StoreHandle::put`] settles a checkout with the same individual and
//! [`Lease::replace`] settles it with a newborn, in one message each.
//!
//! ```
//! use u_steadystate::random::create_rng;
//! use u_steadystate::steady::{ExhaustionPolicy, Individual, PopulationStore};
//!
//! let individuals = (0..4).map(|i| Individual::from_genes(vec![i])).collect();
//! let store = PopulationStore::spawn(individuals, ExhaustionPolicy::Fail, create_rng(1)).unwrap();
//! let handle = store.handle();
//!
//! let ind = handle.checkout().unwrap();
//! assert_eq!(handle.snapshot().unwrap().individuals.len(), 3);
//! handle.put(ind).unwrap();
//! assert_eq!(handle.snapshot().unwrap().individuals.len(), 4);
//! ```

use super::config::ExhaustionPolicy;
use super::types::Individual;
use crate::error::{EvoError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, SendError, Sender};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::thread::{self, JoinHandle};

// ============================================================================
// Elite archive
// ============================================================================

/// Running best fitness plus an archive of the individuals that set it.
///
/// Entries are keyed by the textual form of their fitness, so two
/// individuals with the same score share one slot and the later one wins.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EliteArchive {
    best: Option<f64>,
    entries: BTreeMap<String, Individual>,
}

impl EliteArchive {
    /// Creates an empty archive with no running best.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers an evaluated individual.
    ///
    /// Returns `true` and records the individual when its fitness is
    /// strictly greater than the running best (or when there is no best
    /// yet). Unevaluated individuals and NaN scores are ignored.
    pub fn offer(&mut self, individual: &Individual) -> bool {
        let Some(fitness) = individual.fitness else {
            return false;
        };
        if fitness.is_nan() || self.best.is_some_and(|best| fitness <= best) {
            return false;
        }
        self.best = Some(fitness);
        self.entries.insert(fitness.to_string(), individual.clone());
        true
    }

    /// Highest fitness seen so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// The archived individual whose fitness renders as `key`.
    pub fn get(&self, key: &str) -> Option<&Individual> {
        self.entries.get(key)
    }

    /// All archived individuals, ordered by key.
    pub fn entries(&self) -> &BTreeMap<String, Individual> {
        &self.entries
    }

    /// Number of archived individuals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been archived.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Outcome of recording one fitness evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    /// The evaluation set a new running best.
    pub improved: bool,
    /// Running best after the evaluation.
    pub best: Option<f64>,
}

/// Point-in-time copy of the store's state.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Individuals resident in the store.
    pub individuals: Vec<Individual>,
    /// Individuals handed out and not yet returned or discarded.
    pub checked_out: usize,
    /// Checkout requests parked under [`ExhaustionPolicy::Block`].
    pub waiting: usize,
    /// Number of fitness evaluations recorded.
    pub evaluations: u64,
    /// Running best and elite archive.
    pub archive: EliteArchive,
}

enum Message {
    Checkout {
        reply: Sender<Result<Individual>>,
    },
    Return {
        individual: Individual,
        reply: Sender<Result<()>>,
    },
    Replace {
        newborn: Individual,
        reply: Sender<Result<()>>,
    },
    Discard {
        reply: Sender<Result<()>>,
    },
    Evaluated {
        individual: Individual,
        reply: Sender<Standing>,
    },
    Best {
        reply: Sender<Option<f64>>,
    },
    Snapshot {
        reply: Sender<StoreSnapshot>,
    },
    Shutdown,
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Checkout { .. } => "checkout",
            Message::Return { .. } => "return",
            Message::Replace { .. } => "replace",
            Message::Discard { .. } => "discard",
            Message::Evaluated { .. } => "evaluated",
            Message::Best { .. } => "best",
            Message::Snapshot { .. } => "snapshot",
            Message::Shutdown => "shutdown",
        }
    }
}

// ============================================================================
// Store loop
// ============================================================================

struct StoreState {
    individuals: Vec<Individual>,
    waiting: VecDeque<Sender<Result<Individual>>>,
    checked_out: usize,
    evaluations: u64,
    archive: EliteArchive,
    policy: ExhaustionPolicy,
    rng: StdRng,
}

impl StoreState {
    fn serve(mut self, inbox: Receiver<Message>) {
        while let Ok(message) = inbox.recv() {
            trace!(
                "store: {} ({} resident, {} out)",
                message.kind(),
                self.individuals.len(),
                self.checked_out
            );
            match message {
                Message::Checkout { reply } => self.checkout(reply),
                Message::Return {
                    individual: incoming,
                    reply,
                }
                | Message::Replace {
                    newborn: incoming,
                    reply,
                } => {
                    let settled = self.settle();
                    if settled.is_ok() {
                        self.put(incoming);
                    }
                    let _ = reply.send(settled);
                }
                Message::Discard { reply } => {
                    let _ = reply.send(self.settle());
                }
                Message::Evaluated { individual, reply } => {
                    self.evaluations += 1;
                    let improved = self.archive.offer(&individual);
                    let _ = reply.send(Standing {
                        improved,
                        best: self.archive.best(),
                    });
                }
                Message::Best { reply } => {
                    let _ = reply.send(self.archive.best());
                }
                Message::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Message::Shutdown => break,
            }
        }
        debug!(
            "store loop stopped with {} resident, {} out",
            self.individuals.len(),
            self.checked_out
        );
    }

    fn checkout(&mut self, reply: Sender<Result<Individual>>) {
        if self.individuals.is_empty() {
            match self.policy {
                ExhaustionPolicy::Fail => {
                    warn!("checkout refused: pool exhausted");
                    let _ = reply.send(Err(EvoError::PoolExhausted { resident: 0 }));
                }
                ExhaustionPolicy::Block => {
                    debug!("checkout parked ({} already waiting)", self.waiting.len());
                    self.waiting.push_back(reply);
                }
            }
            return;
        }

        let idx = self.rng.random_range(0..self.individuals.len());
        let individual = self.individuals.swap_remove(idx);
        match deliver(&reply, individual) {
            None => self.checked_out += 1,
            // Requester went away before the reply; keep the individual.
            Some(undelivered) => self.individuals.push(undelivered),
        }
    }

    /// Closes one outstanding checkout.
    fn settle(&mut self) -> Result<()> {
        match self.checked_out.checked_sub(1) {
            Some(remaining) => {
                self.checked_out = remaining;
                Ok(())
            }
            None => {
                warn!("settle refused: nothing is checked out");
                Err(EvoError::NotCheckedOut)
            }
        }
    }

    /// Hands `individual` to the oldest parked checkout, or makes it resident.
    fn put(&mut self, mut individual: Individual) {
        while let Some(waiter) = self.waiting.pop_front() {
            match deliver(&waiter, individual) {
                None => {
                    self.checked_out += 1;
                    return;
                }
                Some(undelivered) => individual = undelivered,
            }
        }
        self.individuals.push(individual);
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            individuals: self.individuals.clone(),
            checked_out: self.checked_out,
            waiting: self.waiting.len(),
            evaluations: self.evaluations,
            archive: self.archive.clone(),
        }
    }
}

/// Sends a checked-out individual, giving it back if nobody is listening.
fn deliver(reply: &Sender<Result<Individual>>, individual: Individual) -> Option<Individual> {
    match reply.send(Ok(individual)) {
        Ok(()) => None,
        Err(SendError(unsent)) => unsent.ok(),
    }
}

// ============================================================================
// Public handles
// ============================================================================

/// Owner of the store thread.
///
/// Dropping it stops the loop and joins the thread. Handles that outlive
/// it get [`EvoError::StoreClosed`].
pub struct PopulationStore {
    handle: StoreHandle,
    thread: Option<JoinHandle<()>>,
}

impl PopulationStore {
    /// Starts the store loop with `individuals` resident.
    ///
    /// `rng` drives which resident individual each checkout picks.
    pub fn spawn(
        individuals: Vec<Individual>,
        policy: ExhaustionPolicy,
        rng: StdRng,
    ) -> Result<Self> {
        let (tx, rx) = unbounded();
        let state = StoreState {
            individuals,
            waiting: VecDeque::new(),
            checked_out: 0,
            evaluations: 0,
            archive: EliteArchive::new(),
            policy,
            rng,
        };
        let thread = thread::Builder::new()
            .name("population-store".into())
            .spawn(move || state.serve(rx))?;

        Ok(Self {
            handle: StoreHandle { tx },
            thread: Some(thread),
        })
    }

    /// Returns a handle for issuing requests.
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }
}

impl Drop for PopulationStore {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("population store thread panicked");
            }
        }
    }
}

/// Cloneable client of the store loop.
///
/// Every method blocks until the loop has processed the request.
#[derive(Clone)]
pub struct StoreHandle {
    tx: Sender<Message>,
}

impl StoreHandle {
    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Message) -> Result<T> {
        let (reply, response) = bounded(1);
        self.tx
            .send(build(reply))
            .map_err(|_| EvoError::StoreClosed)?;
        response.recv().map_err(|_| EvoError::StoreClosed)
    }

    /// Removes a pseudo-randomly chosen individual from the pool.
    ///
    /// # Errors
    /// [`EvoError::PoolExhausted`] on an empty pool under
    /// [`ExhaustionPolicy::Fail`]. Under [`ExhaustionPolicy::Block`] the call
    /// waits for a return instead.
    pub fn checkout(&self) -> Result<Individual> {
        self.request(|reply| Message::Checkout { reply })?
    }

    /// Like [`checkout`](Self::checkout), wrapped in a [`Lease`] that returns
    /// the individual if it is dropped unsettled.
    pub fn lease(&self) -> Result<Lease> {
        let individual = self.checkout()?;
        Ok(Lease {
            individual,
            store: self.clone(),
            armed: true,
        })
    }

    /// Returns a checked-out individual to the pool.
    ///
    /// # Errors
    /// [`EvoError::NotCheckedOut`] if no checkout is outstanding. The
    /// individual is not added in that case.
    pub fn put(&self, individual: Individual) -> Result<()> {
        self.request(|reply| Message::Return { individual, reply })?
    }

    fn replace(&self, newborn: Individual) -> Result<()> {
        self.request(|reply| Message::Replace { newborn, reply })?
    }

    /// Records that one checked-out individual will never come back.
    fn discard(&self) -> Result<()> {
        self.request(|reply| Message::Discard { reply })?
    }

    /// Records one fitness evaluation and offers the individual to the
    /// elite archive.
    pub(crate) fn record_evaluation(&self, individual: &Individual) -> Result<Standing> {
        let individual = individual.clone();
        self.request(|reply| Message::Evaluated { individual, reply })
    }

    /// Current running best.
    pub fn best(&self) -> Result<Option<f64>> {
        self.request(|reply| Message::Best { reply })
    }

    /// Copies the store's state.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        self.request(|reply| Message::Snapshot { reply })
    }

    /// Queues a return without waiting for the acknowledgment.
    fn release(&self, individual: Individual) {
        let (reply, _ack) = bounded(1);
        if self.tx.send(Message::Return { individual, reply }).is_err() {
            warn!("lease released after the store closed; individual lost");
        }
    }
}

/// A checked-out individual that goes back to the store unless settled.
///
/// Settle with [`Lease::into_inner`] to keep the individual,
/// [`Lease::replace`] to swap in a newborn, or [`Lease::discard`] to drop it
/// from the population for good. A lease
/// dropped any other way (an error or a panic mid-round) is returned.
pub struct Lease {
    individual: Individual,
    store: StoreHandle,
    armed: bool,
}

impl Lease {
    /// Takes ownership of the individual. The caller becomes responsible
    /// for returning it.
    pub fn into_inner(mut self) -> Individual {
        self.armed = false;
        std::mem::take(&mut self.individual)
    }

    /// Drops the individual and puts `newborn` in its place.
    pub fn replace(mut self, newborn: Individual) -> Result<()> {
        self.armed = false;
        self.store.replace(newborn)
    }

    /// Removes the individual from the population permanently.
    pub fn discard(mut self) -> Result<()> {
        self.armed = false;
        self.store.discard()
    }
}

impl Deref for Lease {
    type Target = Individual;

    fn deref(&self) -> &Individual {
        &self.individual
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Individual {
        &mut self.individual
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.armed {
            debug!("returning unsettled lease");
            self.store.release(std::mem::take(&mut self.individual));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Role assignment: who sends to whom.
//!
//! Matrix mode walks every ordered worker pair through a fixed schedule.
//! Bisection mode builds one table covering every worker: half of them send,
//! the other half receive, and with an odd worker count the highest rank sits
//! the test out.

use crate::error::{AppError, Result};
use crate::models::{PairId, Role, TestAssignment};
use crate::transport::Message;
use crate::types::{Rank, TestMode, MIN_WORLD_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn check_world_size(world_size: usize) -> Result<()> {
    if world_size < MIN_WORLD_SIZE {
        return Err(AppError::validation(format!(
            "This test needs at least {} processes, got {}",
            MIN_WORLD_SIZE, world_size
        )));
    }
    Ok(())
}

/// Role and peer of every worker rank for one bisection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTable {
    /// `entries[k]` belongs to worker rank `k + 1`
    entries: Vec<TestAssignment>,
}

impl AssignmentTable {
    /// Table where every worker is deactivated, to be filled in
    fn idle(worker_count: usize) -> Self {
        Self {
            entries: vec![TestAssignment::deactivated(); worker_count],
        }
    }

    fn pair(&mut self, sender: Rank, receiver: Rank) {
        self.entries[sender - 1] = TestAssignment::sender(receiver);
        self.entries[receiver - 1] = TestAssignment::receiver(sender);
    }

    pub fn worker_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, rank: Rank) -> Option<&TestAssignment> {
        self.entries.get(rank.checked_sub(1)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rank, &TestAssignment)> {
        self.entries.iter().enumerate().map(|(i, a)| (i + 1, a))
    }

    /// Sender -> receiver pairs, ordered by sender rank
    pub fn pairs(&self) -> Vec<PairId> {
        self.iter()
            .filter(|(_, a)| a.role == Role::Sender)
            .filter_map(|(sender, a)| a.peer.map(|receiver| PairId { sender, receiver }))
            .collect()
    }

    /// The rank left out with an odd worker count
    pub fn deactivated(&self) -> Option<Rank> {
        self.iter()
            .find(|(_, a)| a.role == Role::Deactivated)
            .map(|(rank, _)| rank)
    }

    /// One assignment message per worker, in rank order, ready to scatter
    pub fn into_messages(self) -> Vec<Message> {
        self.entries.into_iter().map(Message::Assignment).collect()
    }
}

/// Workers taking part in bisection pairing; drops the highest rank when odd
fn active_workers(world_size: usize) -> usize {
    let workers = world_size - 1;
    workers - workers % 2
}

/// Rank i sends to rank m + i, where m is half the active workers
pub fn deterministic_pairing(world_size: usize) -> Result<AssignmentTable> {
    check_world_size(world_size)?;
    let mut table = AssignmentTable::idle(world_size - 1);

    let half = active_workers(world_size) / 2;
    for i in 1..=half {
        table.pair(i, half + i);
    }
    Ok(table)
}

/// Draw sender/receiver pairs uniformly from the pool of active workers
pub fn random_pairing<R: Rng + ?Sized>(world_size: usize, rng: &mut R) -> Result<AssignmentTable> {
    check_world_size(world_size)?;
    let mut table = AssignmentTable::idle(world_size - 1);

    let mut pool: Vec<Rank> = (1..=active_workers(world_size)).collect();
    while pool.len() >= 2 {
        let sender = pool.swap_remove(rng.gen_range(0..pool.len()));
        let receiver = pool.swap_remove(rng.gen_range(0..pool.len()));
        table.pair(sender, receiver);
    }
    Ok(table)
}

/// Generator for random pairing, seeded once per run
pub fn pairing_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Bisection table for `mode`
pub fn bisection_table(mode: TestMode, world_size: usize, seed: Option<u64>) -> Result<AssignmentTable> {
    match mode {
        TestMode::Bisection => deterministic_pairing(world_size),
        TestMode::RandomBisection => random_pairing(world_size, &mut pairing_rng(seed)),
        TestMode::Matrix => Err(AppError::internal("Matrix mode has no bisection table")),
    }
}

/// Engagement order of matrix mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixSchedule {
    world_size: usize,
}

impl MatrixSchedule {
    pub fn new(world_size: usize) -> Result<Self> {
        check_world_size(world_size)?;
        Ok(Self { world_size })
    }

    pub fn senders(&self) -> std::ops::Range<Rank> {
        1..self.world_size
    }

    /// Workers that play receiver opposite `sender`, in engagement order
    pub fn receivers_for(&self, sender: Rank) -> impl Iterator<Item = Rank> {
        (1..self.world_size).filter(move |&rank| rank != sender)
    }

    /// Every directed pair in the order the coordinator runs them
    pub fn pairs(&self) -> impl Iterator<Item = PairId> + '_ {
        self.senders().flat_map(move |sender| {
            self.receivers_for(sender).map(move |receiver| PairId { sender, receiver })
        })
    }

    /// Assignments each worker receives over the whole sweep: one per other
    /// sender as receiver, one per other worker as sender
    pub fn assignments_per_worker(&self) -> usize {
        2 * (self.world_size - 2)
    }
}

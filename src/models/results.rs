//! Assignment and measurement records exchanged between ranks, and the
//! coordinator-side result containers

use crate::error::{AppError, Result};
use crate::types::{Rank, ROOT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latency/throughput value of a pair that was never measured
pub const UNMEASURED: f64 = -1.0;

/// What a worker does for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Receiver,
    /// Odd worker out in bisection mode; joins every collective, measures nothing
    Deactivated,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
            Self::Deactivated => f.write_str("deactivated"),
        }
    }
}

/// Role and peer handed to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAssignment {
    pub role: Role,
    /// `None` only for `Role::Deactivated`
    pub peer: Option<Rank>,
}

impl TestAssignment {
    pub fn sender(peer: Rank) -> Self {
        Self { role: Role::Sender, peer: Some(peer) }
    }

    pub fn receiver(peer: Rank) -> Self {
        Self { role: Role::Receiver, peer: Some(peer) }
    }

    pub fn deactivated() -> Self {
        Self { role: Role::Deactivated, peer: None }
    }

    /// The peer rank, or a protocol error when an active role has none
    pub fn require_peer(&self) -> Result<Rank> {
        self.peer.ok_or_else(|| {
            AppError::protocol(format!("{} assignment without a peer rank", self.role))
        })
    }
}

/// One retry's raw measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchSample {
    pub latency_us: f64,
    pub throughput_mibps: f64,
}

/// Stable identifier of a directed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairId {
    pub sender: Rank,
    pub receiver: Rank,
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender, self.receiver)
    }
}

/// Measurement record reported by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    /// Reporting rank; the sending side when the pair was measured
    pub sender: Rank,
    /// Set only when `sender` actually sent to a peer
    pub receiver: Option<Rank>,
    /// Short host name of the `sender` rank
    pub hostname: String,
    /// Mean latency in microseconds, or `UNMEASURED`
    pub latency: f64,
    /// Mean throughput in MiB/s, or `UNMEASURED`
    pub throughput: f64,
    pub samples: Vec<BenchSample>,
}

impl PairResult {
    /// A record with sentinel values
    pub fn unmeasured(sender: Rank, receiver: Option<Rank>, hostname: impl Into<String>) -> Self {
        Self {
            sender,
            receiver,
            hostname: hostname.into(),
            latency: UNMEASURED,
            throughput: UNMEASURED,
            samples: Vec::new(),
        }
    }

    pub fn is_measured(&self) -> bool {
        self.latency != UNMEASURED && self.receiver.is_some()
    }

    pub fn pair_id(&self) -> Option<PairId> {
        self.receiver.map(|receiver| PairId { sender: self.sender, receiver })
    }
}

/// Matrix-mode results: sender rank -> receiver rank over workers 1..N-1
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    world_size: usize,
    cells: Vec<Vec<Option<PairResult>>>,
}

impl ResultMatrix {
    pub fn new(world_size: usize) -> Self {
        let workers = world_size.saturating_sub(1);
        Self {
            world_size,
            cells: vec![vec![None; workers]; workers],
        }
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn worker_count(&self) -> usize {
        self.cells.len()
    }

    pub fn worker_ranks(&self) -> std::ops::RangeInclusive<Rank> {
        1..=self.worker_count()
    }

    fn index(&self, rank: Rank) -> Result<usize> {
        if rank == ROOT || rank > self.worker_count() {
            return Err(AppError::protocol(format!(
                "Rank {} is not a worker of a {}-process run",
                rank, self.world_size
            )));
        }
        Ok(rank - 1)
    }

    /// Store the result for `sender -> receiver`
    pub fn insert(&mut self, sender: Rank, receiver: Rank, result: PairResult) -> Result<()> {
        if sender == receiver {
            return Err(AppError::protocol(format!("Rank {} cannot be paired with itself", sender)));
        }
        let (s, r) = (self.index(sender)?, self.index(receiver)?);
        self.cells[s][r] = Some(result);
        Ok(())
    }

    pub fn get(&self, sender: Rank, receiver: Rank) -> Option<&PairResult> {
        let s = sender.checked_sub(1)?;
        let r = receiver.checked_sub(1)?;
        self.cells.get(s)?.get(r)?.as_ref()
    }

    /// Number of off-diagonal cells holding a result
    pub fn populated_count(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    /// Number of diagonal cells, which never hold a result
    pub fn unused_count(&self) -> usize {
        (0..self.worker_count()).filter(|&i| self.cells[i][i].is_none()).count()
    }

    /// All stored results in sender-major order
    pub fn iter(&self) -> impl Iterator<Item = &PairResult> {
        self.cells.iter().flatten().filter_map(|cell| cell.as_ref())
    }
}

/// Bisection-mode results, one entry per worker rank
#[derive(Debug, Clone, PartialEq)]
pub struct BisectionResults {
    entries: Vec<PairResult>,
}

impl BisectionResults {
    /// `entries[k]` must be the record of worker rank `k + 1`
    pub fn new(entries: Vec<PairResult>) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            if entry.sender != index + 1 {
                return Err(AppError::protocol(format!(
                    "Gathered record {} was reported by rank {}",
                    index + 1,
                    entry.sender
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn worker_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, rank: Rank) -> Option<&PairResult> {
        self.entries.get(rank.checked_sub(1)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairResult> {
        self.entries.iter()
    }

    /// Entries that carry measured data, i.e. the senders
    pub fn measured(&self) -> impl Iterator<Item = &PairResult> {
        self.entries.iter().filter(|entry| entry.is_measured())
    }
}

/// Final results of a run, owned by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum RunResults {
    Matrix(ResultMatrix),
    Bisection(BisectionResults),
}

impl RunResults {
    pub fn worker_count(&self) -> usize {
        match self {
            Self::Matrix(matrix) => matrix.worker_count(),
            Self::Bisection(results) => results.worker_count(),
        }
    }

    /// Denominator for averages: every ordered pair, or every bisection pair
    pub fn pair_count(&self) -> usize {
        let workers = self.worker_count();
        match self {
            Self::Matrix(_) => workers * workers.saturating_sub(1),
            Self::Bisection(_) => workers / 2,
        }
    }

    /// Every stored record, measured or not
    pub fn records(&self) -> Box<dyn Iterator<Item = &PairResult> + '_> {
        match self {
            Self::Matrix(matrix) => Box::new(matrix.iter()),
            Self::Bisection(results) => Box::new(results.iter()),
        }
    }

    /// Look up the record a `PairId` points at
    pub fn resolve(&self, id: PairId) -> Option<&PairResult> {
        match self {
            Self::Matrix(matrix) => matrix.get(id.sender, id.receiver),
            Self::Bisection(results) => results
                .get(id.sender)
                .filter(|entry| entry.receiver == Some(id.receiver)),
        }
    }
}

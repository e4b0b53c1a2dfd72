//! Bisection mode: all pairs run at once, one barrier per retry.
//!
//! The coordinator scatters the assignment table, joins every barrier and
//! gathers one record per worker at the end. Deactivated workers go through
//! the same collectives without measuring.

use super::RoundController;
use crate::assignment::{bisection_table, AssignmentTable};
use crate::error::{AppError, Result};
use crate::logging::LogLevel;
use crate::models::{BisectionResults, PairResult, Role, RunResults};
use crate::session::Session;
use crate::stats::finalize_pair;
use crate::transport::Message;
use crate::types::{TestMode, ROOT};
use async_trait::async_trait;

pub struct BisectionController {
    mode: TestMode,
    retries: usize,
    seed: Option<u64>,
}

impl BisectionController {
    pub fn new(mode: TestMode, retries: usize, seed: Option<u64>) -> Self {
        Self { mode, retries, seed }
    }

    /// A gathered record must match what its rank was told to do
    fn check_record(table: &AssignmentTable, record: &PairResult) -> Result<()> {
        let assignment = table.get(record.sender).ok_or_else(|| {
            AppError::protocol(format!("Record from unknown rank {}", record.sender))
        })?;
        let expected = match assignment.role {
            Role::Sender => assignment.peer,
            Role::Receiver | Role::Deactivated => None,
        };
        if record.receiver != expected {
            return Err(AppError::protocol(format!(
                "Rank {} was a {} but reported receiver {:?}",
                record.sender, assignment.role, record.receiver
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RoundController for BisectionController {
    fn mode(&self) -> TestMode {
        self.mode
    }

    async fn run_coordinator(&self, session: &mut Session) -> Result<RunResults> {
        let table = bisection_table(self.mode, session.world_size(), self.seed)?;
        for pair in table.pairs() {
            crate::log_at!(session.logger().logger(), LogLevel::Debug, "Pairing {}", pair);
        }
        if let Some(rank) = table.deactivated() {
            crate::log_at!(session.logger().logger(), LogLevel::Info, "Rank {} sits out (odd worker count)", rank);
        }

        session.transport().scatter(ROOT, Some(table.clone().into_messages())).await?;

        for retry in 0..self.retries {
            session.transport().synchronize(ROOT).await?;
            session.logger().log_barrier(retry).await;
        }

        let gathered = session
            .transport()
            .gather(ROOT, None)
            .await?
            .ok_or_else(|| AppError::internal("Coordinator gather returned nothing"))?;

        let mut entries = Vec::with_capacity(gathered.len());
        for message in gathered {
            let mut record = message.expect_result()?;
            Self::check_record(&table, &record)?;
            finalize_pair(&mut record);
            if record.is_measured() {
                session.logger().log_pair_complete(&record).await;
            }
            entries.push(record);
        }

        Ok(RunResults::Bisection(BisectionResults::new(entries)?))
    }

    async fn run_worker(&self, session: &mut Session) -> Result<()> {
        let assignment = session
            .transport()
            .scatter(ROOT, None)
            .await?
            .ok_or_else(|| AppError::internal("Worker scatter returned nothing"))?
            .expect_assignment()?;
        session.logger().log_assignment(&assignment).await;

        let mut record = PairResult::unmeasured(session.rank(), None, session.hostname());
        let peer = match assignment.role {
            Role::Deactivated => None,
            Role::Sender | Role::Receiver => Some(assignment.require_peer()?),
        };

        for retry in 0..self.retries {
            session.transport().synchronize(ROOT).await?;
            match (assignment.role, peer) {
                (Role::Sender, Some(peer)) => {
                    let sample = session.measure(peer).await?;
                    session.logger().log_sample(peer, retry, &sample).await;
                    record.samples.push(sample);
                }
                (Role::Receiver, Some(peer)) => session.serve(peer).await?,
                _ => {}
            }
        }

        if assignment.role == Role::Sender {
            record.receiver = peer;
        }
        session.transport().gather(ROOT, Some(Message::Result(record))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RoundLogger;
    use crate::models::{Config, PairId, TestAssignment};
    use crate::transport::{LocalCluster, Transport};
    use std::sync::Arc;

    async fn run_bisection(world_size: usize, mode: TestMode, retries: usize, seed: Option<u64>) -> BisectionResults {
        let config = Arc::new(Config {
            ranks: world_size,
            payload_size: 64 * 1024,
            mode,
            ..Config::default()
        });

        let handles: Vec<_> = LocalCluster::create_named(world_size, "node")
            .unwrap()
            .into_iter()
            .map(|transport| {
                let config = config.clone();
                tokio::spawn(async move {
                    let rank = transport.rank();
                    let mut session = Session::new(Box::new(transport), config.clone(), RoundLogger::new(&config, rank));
                    BisectionController::new(mode, retries, seed).run(&mut session).await.unwrap()
                })
            })
            .collect();

        let mut coordinator = None;
        for handle in handles {
            if let Some(RunResults::Bisection(results)) = handle.await.unwrap() {
                coordinator = Some(results);
            }
        }
        coordinator.unwrap()
    }

    #[tokio::test]
    async fn test_deterministic_bisection_with_odd_workers() {
        let results = run_bisection(6, TestMode::Bisection, 3, None).await;
        assert_eq!(results.worker_count(), 5);

        let measured: Vec<PairId> = results.measured().filter_map(|r| r.pair_id()).collect();
        assert_eq!(
            measured,
            vec![PairId { sender: 1, receiver: 3 }, PairId { sender: 2, receiver: 4 }]
        );
        for rank in 3..=5 {
            let entry = results.get(rank).unwrap();
            assert!(!entry.is_measured());
            assert!(entry.samples.is_empty());
        }
        assert_eq!(results.get(1).unwrap().samples.len(), 3);
    }

    #[tokio::test]
    async fn test_random_bisection_follows_seeded_table() {
        let results = run_bisection(7, TestMode::RandomBisection, 1, Some(7)).await;
        let table = bisection_table(TestMode::RandomBisection, 7, Some(7)).unwrap();

        let measured: Vec<PairId> = results.measured().filter_map(|r| r.pair_id()).collect();
        assert_eq!(measured, table.pairs());
    }

    #[tokio::test]
    async fn test_zero_retries_still_gathers() {
        let results = run_bisection(4, TestMode::Bisection, 0, None).await;
        assert_eq!(results.worker_count(), 3);
        assert_eq!(results.measured().count(), 0);
    }

    #[test]
    fn test_check_record() {
        let table = bisection_table(TestMode::Bisection, 5, None).unwrap();
        let good = PairResult::unmeasured(1, Some(3), "n1");
        assert!(BisectionController::check_record(&table, &good).is_ok());

        let receiver_claims_pair = PairResult::unmeasured(3, Some(1), "n3");
        assert!(BisectionController::check_record(&table, &receiver_claims_pair).is_err());

        let stranger = PairResult::unmeasured(9, None, "n9");
        assert!(BisectionController::check_record(&table, &stranger).is_err());
        assert_eq!(table.get(4), Some(&TestAssignment::receiver(2)));
    }
}

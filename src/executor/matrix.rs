//! Matrix mode: every ordered worker pair, one pair at a time.
//!
//! For each sender the coordinator first tells every other worker to receive
//! from it, then feeds the sender one receiver at a time and waits for the
//! pair's result before moving on.

use super::RoundController;
use crate::assignment::MatrixSchedule;
use crate::error::{AppError, Result};
use crate::models::{PairResult, ResultMatrix, Role, RunResults, TestAssignment};
use crate::session::Session;
use crate::stats::finalize_pair;
use crate::transport::Message;
use crate::types::{Rank, TestMode, ROOT};
use async_trait::async_trait;

pub struct MatrixController {
    retries: usize,
}

impl MatrixController {
    pub fn new(retries: usize) -> Self {
        Self { retries }
    }

    /// Sender side of one pair: all retries, then report the raw samples
    async fn send_to(&self, session: &mut Session, receiver: Rank) -> Result<()> {
        let mut result = PairResult::unmeasured(session.rank(), Some(receiver), session.hostname());
        for retry in 0..self.retries {
            let sample = session.measure(receiver).await?;
            session.logger().log_sample(receiver, retry, &sample).await;
            result.samples.push(sample);
        }
        session.transport().send(ROOT, Message::Result(result)).await
    }

    async fn receive_from(&self, session: &mut Session, sender: Rank) -> Result<()> {
        for _ in 0..self.retries {
            session.serve(sender).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RoundController for MatrixController {
    fn mode(&self) -> TestMode {
        TestMode::Matrix
    }

    async fn run_coordinator(&self, session: &mut Session) -> Result<RunResults> {
        let schedule = MatrixSchedule::new(session.world_size())?;
        let mut matrix = ResultMatrix::new(session.world_size());

        for sender in schedule.senders() {
            for receiver in schedule.receivers_for(sender) {
                session
                    .transport()
                    .send(receiver, Message::Assignment(TestAssignment::receiver(sender)))
                    .await?;
            }

            for receiver in schedule.receivers_for(sender) {
                session
                    .transport()
                    .send(sender, Message::Assignment(TestAssignment::sender(receiver)))
                    .await?;

                let mut result = session.transport().recv(sender).await?.expect_result()?;
                if result.sender != sender || result.receiver != Some(receiver) {
                    return Err(AppError::protocol(format!(
                        "Rank {} reported pair {}->{:?} while measuring {}->{}",
                        sender, result.sender, result.receiver, sender, receiver
                    )));
                }
                finalize_pair(&mut result);
                session.logger().log_pair_complete(&result).await;
                matrix.insert(sender, receiver, result)?;
            }
        }

        Ok(RunResults::Matrix(matrix))
    }

    async fn run_worker(&self, session: &mut Session) -> Result<()> {
        let schedule = MatrixSchedule::new(session.world_size())?;

        for _ in 0..schedule.assignments_per_worker() {
            let assignment = session.transport().recv(ROOT).await?.expect_assignment()?;
            session.logger().log_assignment(&assignment).await;

            let peer = assignment.require_peer();
            match assignment.role {
                Role::Sender => self.send_to(session, peer?).await?,
                Role::Receiver => self.receive_from(session, peer?).await?,
                Role::Deactivated => {
                    return Err(AppError::protocol("Matrix mode never deactivates a worker"));
                }
            }
        }
        Ok(())
    }
}

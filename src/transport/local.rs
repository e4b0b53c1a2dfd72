//! In-process backend: every rank is a task of this process.
//!
//! Each ordered pair of ranks has its own unbounded channel. A send hands over
//! an envelope with a completion handle and waits until the receiving rank
//! takes the message out, so sends rendezvous with their matching receive.

use super::{check_peer, local_processor_name, Message, Transport};
use crate::error::{AppError, Result};
use crate::types::{Rank, MIN_WORLD_SIZE};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

struct Envelope {
    message: Message,
    delivered: oneshot::Sender<()>,
}

/// Builder for a fully connected group of in-process ranks
pub struct LocalCluster;

impl LocalCluster {
    /// Create `size` connected transports, indexed by rank
    pub fn create(size: usize) -> Result<Vec<LocalTransport>> {
        Self::create_named(size, &local_processor_name())
    }

    /// Same as `create`, with every rank reporting `processor_name`
    pub fn create_named(size: usize, processor_name: &str) -> Result<Vec<LocalTransport>> {
        if size < MIN_WORLD_SIZE {
            return Err(AppError::validation(format!(
                "At least {} processes are needed, got {}",
                MIN_WORLD_SIZE, size
            )));
        }

        let mut outgoing: Vec<Vec<Option<mpsc::UnboundedSender<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut incoming: Vec<Vec<Option<mpsc::UnboundedReceiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for from in 0..size {
            for to in 0..size {
                if from != to {
                    let (tx, rx) = mpsc::unbounded_channel();
                    outgoing[from][to] = Some(tx);
                    incoming[to][from] = Some(rx);
                }
            }
        }

        Ok(outgoing
            .into_iter()
            .zip(incoming)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| LocalTransport {
                rank,
                size,
                processor_name: processor_name.to_string(),
                outgoing,
                incoming,
            })
            .collect())
    }
}

/// One rank of a `LocalCluster`
pub struct LocalTransport {
    rank: Rank,
    size: usize,
    processor_name: String,
    outgoing: Vec<Option<mpsc::UnboundedSender<Envelope>>>,
    incoming: Vec<Option<mpsc::UnboundedReceiver<Envelope>>>,
}

#[async_trait]
impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn processor_name(&self) -> &str {
        &self.processor_name
    }

    async fn send(&mut self, to: Rank, message: Message) -> Result<()> {
        check_peer(self.rank, self.size, to)?;
        let channel = self.outgoing[to]
            .as_ref()
            .ok_or_else(|| AppError::internal(format!("No channel {} -> {}", self.rank, to)))?;

        let (delivered, taken) = oneshot::channel();
        channel
            .send(Envelope { message, delivered })
            .map_err(|_| AppError::transport(format!("Rank {} has left the group", to)))?;

        taken
            .await
            .map_err(|_| AppError::transport(format!("Rank {} exited before receiving", to)))
    }

    async fn recv(&mut self, from: Rank) -> Result<Message> {
        check_peer(self.rank, self.size, from)?;
        let channel = self.incoming[from]
            .as_mut()
            .ok_or_else(|| AppError::internal(format!("No channel {} -> {}", from, self.rank)))?;

        let envelope = channel
            .recv()
            .await
            .ok_or_else(|| AppError::transport(format!("Rank {} has left the group", from)))?;

        // The sender may have given up already; the message is still valid
        let _ = envelope.delivered.send(());
        Ok(envelope.message)
    }
}

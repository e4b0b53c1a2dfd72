//! Message-passing layer: point-to-point messaging between ranks plus the
//! rooted collectives built on top of it

pub mod codec;
pub mod local;
pub mod tcp;

use crate::error::{AppError, Result};
use crate::models::{PairResult, TestAssignment};
use crate::types::Rank;
use async_trait::async_trait;
use std::sync::Arc;

pub use local::{LocalCluster, LocalTransport};
pub use tcp::TcpTransport;

/// Everything that travels between two ranks
#[derive(Debug, Clone)]
pub enum Message {
    Assignment(TestAssignment),
    Result(PairResult),
    /// Worker reached the barrier
    Ready,
    /// Barrier released
    Sync,
    /// Zero-length latency probe
    Probe,
    /// Reply to a probe
    Echo,
    Payload(Arc<[u8]>),
    /// Payload fully received
    Ack,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assignment(_) => "assignment",
            Self::Result(_) => "result",
            Self::Ready => "ready",
            Self::Sync => "sync",
            Self::Probe => "probe",
            Self::Echo => "echo",
            Self::Payload(_) => "payload",
            Self::Ack => "ack",
        }
    }

    fn unexpected(&self, wanted: &str) -> AppError {
        AppError::protocol(format!("Expected {} message, received {}", wanted, self.kind()))
    }

    pub fn expect_assignment(self) -> Result<TestAssignment> {
        match self {
            Self::Assignment(assignment) => Ok(assignment),
            other => Err(other.unexpected("assignment")),
        }
    }

    pub fn expect_result(self) -> Result<PairResult> {
        match self {
            Self::Result(result) => Ok(result),
            other => Err(other.unexpected("result")),
        }
    }

    pub fn expect_payload(self) -> Result<Arc<[u8]>> {
        match self {
            Self::Payload(bytes) => Ok(bytes),
            other => Err(other.unexpected("payload")),
        }
    }

    /// Check a body-less control message
    pub fn expect_control(self, wanted: &Message) -> Result<()> {
        if std::mem::discriminant(&self) == std::mem::discriminant(wanted) {
            Ok(())
        } else {
            Err(self.unexpected(wanted.kind()))
        }
    }
}

/// A participant's view of the group.
///
/// `recv` is source-selective and messages between one pair of ranks arrive
/// in the order they were sent. Collectives must be entered by every rank at
/// the same point of the protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    fn rank(&self) -> Rank;

    /// Number of processes in the group, coordinator included
    fn size(&self) -> usize;

    /// Host name of the node this rank runs on
    fn processor_name(&self) -> &str;

    async fn send(&mut self, to: Rank, message: Message) -> Result<()>;

    async fn recv(&mut self, from: Rank) -> Result<Message>;

    /// Ranks other than `root`, ascending
    fn non_root_ranks(&self, root: Rank) -> Vec<Rank> {
        (0..self.size()).filter(|&rank| rank != root).collect()
    }

    /// Deliver `items[k]` to the k-th non-root rank. Only the root passes items.
    async fn scatter(&mut self, root: Rank, items: Option<Vec<Message>>) -> Result<Option<Message>> {
        if self.rank() != root {
            return Ok(Some(self.recv(root).await?));
        }

        let items = items.ok_or_else(|| AppError::internal("Scatter root called without items"))?;
        let targets = self.non_root_ranks(root);
        if items.len() != targets.len() {
            return Err(AppError::internal(format!(
                "Scatter needs {} items, got {}",
                targets.len(),
                items.len()
            )));
        }
        for (target, item) in targets.into_iter().zip(items) {
            self.send(target, item).await?;
        }
        Ok(None)
    }

    /// Collect one message from every non-root rank, ordered by rank. The root
    /// contributes nothing and passes `None`.
    async fn gather(&mut self, root: Rank, item: Option<Message>) -> Result<Option<Vec<Message>>> {
        if self.rank() != root {
            let item = item.ok_or_else(|| AppError::internal("Gather called without an item"))?;
            self.send(root, item).await?;
            return Ok(None);
        }

        let mut collected = Vec::with_capacity(self.size().saturating_sub(1));
        for source in self.non_root_ranks(root) {
            collected.push(self.recv(source).await?);
        }
        Ok(Some(collected))
    }

    /// Every rank returns the root's message
    async fn broadcast(&mut self, root: Rank, message: Option<Message>) -> Result<Message> {
        if self.rank() != root {
            return self.recv(root).await;
        }

        let message = message.ok_or_else(|| AppError::internal("Broadcast root called without a message"))?;
        for target in self.non_root_ranks(root) {
            self.send(target, message.clone()).await?;
        }
        Ok(message)
    }

    /// Group barrier: ready fan-in to the root, then a release broadcast
    async fn synchronize(&mut self, root: Rank) -> Result<()> {
        if self.rank() == root {
            for source in self.non_root_ranks(root) {
                self.recv(source).await?.expect_control(&Message::Ready)?;
            }
            self.broadcast(root, Some(Message::Sync)).await?;
        } else {
            self.send(root, Message::Ready).await?;
            self.broadcast(root, None).await?.expect_control(&Message::Sync)?;
        }
        Ok(())
    }
}

/// Name of the machine this process runs on
pub fn local_processor_name() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Reject ranks outside the group and messages to oneself
pub(crate) fn check_peer(rank: Rank, size: usize, peer: Rank) -> Result<()> {
    if peer >= size {
        return Err(AppError::transport(format!(
            "Rank {} does not exist in a group of {}",
            peer, size
        )));
    }
    if peer == rank {
        return Err(AppError::transport(format!("Rank {} cannot message itself", rank)));
    }
    Ok(())
}

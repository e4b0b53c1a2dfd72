//! TCP backend: one process per rank, one persistent link per pair of ranks

use super::codec::{read_handshake, read_message, write_handshake, write_message};
use super::{check_peer, local_processor_name, Message, Transport};
use crate::error::{AppError, ErrorContext, Result};
use crate::types::Rank;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const DIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const LINK_BUFFER_SIZE: usize = 64 * 1024;

struct Link {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Link {
    fn new(stream: TcpStream) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|e| AppError::transport(format!("Cannot set TCP_NODELAY: {}", e)))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::with_capacity(LINK_BUFFER_SIZE, read),
            writer: BufWriter::with_capacity(LINK_BUFFER_SIZE, write),
        })
    }
}

/// One rank of a TCP mesh
pub struct TcpTransport {
    rank: Rank,
    size: usize,
    processor_name: String,
    links: Vec<Option<Link>>,
}

impl TcpTransport {
    /// Join the mesh described by `hosts` (index = rank) as `rank`.
    ///
    /// Every rank listens on its own address, dials the lower ranks and accepts
    /// the higher ones. The whole setup must finish within `connect_timeout`.
    pub async fn connect(rank: Rank, hosts: &[String], connect_timeout: Duration) -> Result<Self> {
        if rank >= hosts.len() {
            return Err(AppError::config(format!(
                "Rank {} has no entry in a host list of {}",
                rank,
                hosts.len()
            )));
        }

        tokio::time::timeout(connect_timeout, Self::establish(rank, hosts))
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Rank {} could not join the {}-rank mesh within {}s",
                    rank,
                    hosts.len(),
                    connect_timeout.as_secs()
                ))
            })?
    }

    async fn establish(rank: Rank, hosts: &[String]) -> Result<Self> {
        let size = hosts.len();
        let listener = TcpListener::bind(hosts[rank].as_str())
            .await
            .map_err(|e| AppError::transport(format!("Cannot listen on {}: {}", hosts[rank], e)))?;

        let mut links: Vec<Option<Link>> = (0..size).map(|_| None).collect();

        for peer in 0..rank {
            let mut stream = Self::dial(&hosts[peer]).await;
            write_handshake(&mut stream, rank, size)
                .await
                .with_context(|| format!("Handshake with rank {} at {}", peer, hosts[peer]))?;
            links[peer] = Some(Link::new(stream)?);
        }

        for _ in rank + 1..size {
            let (mut stream, address) = listener
                .accept()
                .await
                .map_err(|e| AppError::transport(format!("Accept failed on {}: {}", hosts[rank], e)))?;
            let peer = read_handshake(&mut stream, size)
                .await
                .with_context(|| format!("Handshake from {}", address))?;

            if peer <= rank || peer >= size {
                return Err(AppError::protocol(format!(
                    "Unexpected dial from rank {} ({}) to rank {}",
                    peer, address, rank
                )));
            }
            if links[peer].is_some() {
                return Err(AppError::protocol(format!("Rank {} connected twice", peer)));
            }
            links[peer] = Some(Link::new(stream)?);
        }

        Ok(Self {
            rank,
            size,
            processor_name: local_processor_name(),
            links,
        })
    }

    /// Keep dialing until the peer listens; the caller's timeout bounds this
    async fn dial(address: &str) -> TcpStream {
        loop {
            match TcpStream::connect(address).await {
                Ok(stream) => return stream,
                Err(_) => tokio::time::sleep(DIAL_RETRY_DELAY).await,
            }
        }
    }

    fn link(&mut self, peer: Rank) -> Result<&mut Link> {
        check_peer(self.rank, self.size, peer)?;
        self.links[peer]
            .as_mut()
            .ok_or_else(|| AppError::internal(format!("No link {} <-> {}", self.rank, peer)))
    }
}

#[async_trait]
impl Transport for TcpTransport {
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
        let link = self.link(to)?;
        write_message(&mut link.writer, &message).await
    }

    async fn recv(&mut self, from: Rank) -> Result<Message> {
        let link = self.link(from)?;
        read_message(&mut link.reader).await
    }
}

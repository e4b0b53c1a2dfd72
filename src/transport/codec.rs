//! Length-prefixed frame encoding for TCP links
//!
//! Frame format:
//! ```text
//! +-----------+----------------+------------------+
//! | kind (u8) | length (4 LE)  | body             |
//! +-----------+----------------+------------------+
//! ```
//!
//! Assignment and result bodies are bincode records, payload bodies are the raw
//! bytes, every other kind has an empty body.

use super::Message;
use crate::error::{AppError, Result};
use crate::types::{Rank, MAX_PAYLOAD_SIZE};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body accepted on a link: the biggest payload plus headroom for records
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + 4 * 1024;

const HEADER_LEN: usize = 5;
const HANDSHAKE_MAGIC: [u8; 4] = *b"LFT1";

const KIND_ASSIGNMENT: u8 = 1;
const KIND_RESULT: u8 = 2;
const KIND_READY: u8 = 3;
const KIND_SYNC: u8 = 4;
const KIND_PROBE: u8 = 5;
const KIND_ECHO: u8 = 6;
const KIND_PAYLOAD: u8 = 7;
const KIND_ACK: u8 = 8;

fn link_error(action: &str, error: std::io::Error) -> AppError {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        AppError::transport(format!("Peer closed the connection while {}", action))
    } else {
        AppError::transport(format!("Link failure while {}: {}", action, error))
    }
}

/// Write one message and flush it to the link
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (kind, body): (u8, Cow<'_, [u8]>) = match message {
        Message::Assignment(assignment) => (KIND_ASSIGNMENT, Cow::Owned(bincode::serialize(assignment)?)),
        Message::Result(result) => (KIND_RESULT, Cow::Owned(bincode::serialize(result)?)),
        Message::Ready => (KIND_READY, Cow::Borrowed(&[])),
        Message::Sync => (KIND_SYNC, Cow::Borrowed(&[])),
        Message::Probe => (KIND_PROBE, Cow::Borrowed(&[])),
        Message::Echo => (KIND_ECHO, Cow::Borrowed(&[])),
        Message::Payload(bytes) => (KIND_PAYLOAD, Cow::Borrowed(&bytes[..])),
        Message::Ack => (KIND_ACK, Cow::Borrowed(&[])),
    };

    if body.len() > MAX_FRAME_SIZE {
        return Err(AppError::protocol(format!(
            "Frame too large: {} bytes (max {} bytes)",
            body.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut header = [0u8; HEADER_LEN];
    header[0] = kind;
    header[1..].copy_from_slice(&(body.len() as u32).to_le_bytes());

    writer.write_all(&header).await.map_err(|e| link_error("writing a frame header", e))?;
    writer.write_all(&body).await.map_err(|e| link_error("writing a frame body", e))?;
    writer.flush().await.map_err(|e| link_error("flushing a frame", e))?;
    Ok(())
}

/// Read one message from the link
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.map_err(|e| link_error("reading a frame header", e))?;

    let kind = header[0];
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(AppError::protocol(format!(
            "Frame too large: {} bytes (max {} bytes)",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| link_error("reading a frame body", e))?;

    let message = match kind {
        KIND_ASSIGNMENT => Message::Assignment(bincode::deserialize(&body)?),
        KIND_RESULT => Message::Result(bincode::deserialize(&body)?),
        KIND_PAYLOAD => Message::Payload(Arc::from(body)),
        KIND_READY | KIND_SYNC | KIND_PROBE | KIND_ECHO | KIND_ACK => {
            if !body.is_empty() {
                return Err(AppError::protocol(format!(
                    "Control frame of kind {} carries {} unexpected bytes",
                    kind, len
                )));
            }
            match kind {
                KIND_READY => Message::Ready,
                KIND_SYNC => Message::Sync,
                KIND_PROBE => Message::Probe,
                KIND_ECHO => Message::Echo,
                _ => Message::Ack,
            }
        }
        other => return Err(AppError::protocol(format!("Unknown frame kind {}", other))),
    };

    Ok(message)
}

/// First bytes a dialing rank sends: magic, its rank and the world size it expects
pub async fn write_handshake<W>(writer: &mut W, rank: Rank, world_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = [0u8; 12];
    frame[..4].copy_from_slice(&HANDSHAKE_MAGIC);
    frame[4..8].copy_from_slice(&(rank as u32).to_le_bytes());
    frame[8..].copy_from_slice(&(world_size as u32).to_le_bytes());
    writer.write_all(&frame).await.map_err(|e| link_error("sending the handshake", e))?;
    writer.flush().await.map_err(|e| link_error("sending the handshake", e))?;
    Ok(())
}

/// Read a handshake and return the dialer's rank
pub async fn read_handshake<R>(reader: &mut R, world_size: usize) -> Result<Rank>
where
    R: AsyncRead + Unpin,
{
    let mut frame = [0u8; 12];
    reader.read_exact(&mut frame).await.map_err(|e| link_error("reading the handshake", e))?;

    if frame[..4] != HANDSHAKE_MAGIC {
        return Err(AppError::protocol("Handshake magic mismatch (not an lft peer?)"));
    }
    let rank = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]) as Rank;
    let peer_world = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]) as usize;
    if peer_world != world_size {
        return Err(AppError::protocol(format!(
            "Rank {} expects {} processes, this rank expects {}",
            rank, peer_world, world_size
        )));
    }
    Ok(rank)
}

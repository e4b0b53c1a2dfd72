//! Two-phase round-trip timing between a sender and a receiver.
//!
//! The latency phase bounces an empty probe off the receiver. The throughput
//! phase sends the payload and waits for an empty acknowledgment, then takes
//! the round-trip cost measured in the first phase off the elapsed time.

use crate::error::Result;
use crate::models::BenchSample;
use crate::transport::{Message, Transport};
use crate::types::Rank;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Shortest duration used as a divisor
const MIN_TRANSFER_SECONDS: f64 = 1e-9;

/// Transfer time left once both latency legs are taken off `elapsed`, or
/// `None` when nothing is left
pub fn effective_transfer_seconds(elapsed: Duration, latency_us: f64) -> Option<f64> {
    let effective = elapsed.as_secs_f64() - 2.0 * latency_us / 1e6;
    (effective > 0.0).then_some(effective)
}

/// Throughput in MiB/s of `payload_bytes` that took `elapsed` to deliver and
/// acknowledge, given a one-way latency of `latency_us`.
///
/// The two latency legs are removed from `elapsed`. When nothing is left the
/// raw elapsed time is used.
pub fn throughput_mibps(payload_bytes: usize, elapsed: Duration, latency_us: f64) -> f64 {
    let seconds = effective_transfer_seconds(elapsed, latency_us)
        .unwrap_or_else(|| elapsed.as_secs_f64().max(MIN_TRANSFER_SECONDS));
    payload_bytes as f64 / seconds / BYTES_PER_MIB
}

/// One sender-side retry and the throughput phase time it was derived from
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub sample: BenchSample,
    pub elapsed: Duration,
}

impl Measurement {
    /// True when the throughput was computed from the raw elapsed time
    pub fn used_raw_elapsed(&self) -> bool {
        effective_transfer_seconds(self.elapsed, self.sample.latency_us).is_none()
    }
}

/// Sender side of one retry against `peer`
pub async fn measure_sample(
    transport: &mut dyn Transport,
    peer: Rank,
    payload: &Arc<[u8]>,
) -> Result<Measurement> {
    let start = Instant::now();
    transport.send(peer, Message::Probe).await?;
    transport.recv(peer).await?.expect_control(&Message::Echo)?;
    let latency_us = start.elapsed().as_secs_f64() * 1e6 / 2.0;

    let start = Instant::now();
    transport.send(peer, Message::Payload(payload.clone())).await?;
    transport.recv(peer).await?.expect_control(&Message::Ack)?;
    let elapsed = start.elapsed();

    Ok(Measurement {
        sample: BenchSample {
            latency_us,
            throughput_mibps: throughput_mibps(payload.len(), elapsed, latency_us),
        },
        elapsed,
    })
}

/// Receiver side of one retry: echo the probe, acknowledge the payload
pub async fn serve_sample(transport: &mut dyn Transport, peer: Rank) -> Result<usize> {
    transport.recv(peer).await?.expect_control(&Message::Probe)?;
    transport.send(peer, Message::Echo).await?;

    let payload = transport.recv(peer).await?.expect_payload()?;
    transport.send(peer, Message::Ack).await?;
    Ok(payload.len())
}

/// Scratch buffer sent in the throughput phase
pub fn scratch_payload(size: usize) -> Arc<[u8]> {
    Arc::from(vec![0xA5u8; size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalCluster;

    #[test]
    fn test_throughput_formula() {
        // 1 MiB in 10 ms with 1 ms one-way latency: 8 ms effective
        let mibps = throughput_mibps(1024 * 1024, Duration::from_millis(10), 1000.0);
        assert!((mibps - 125.0).abs() < 1e-9);

        // No latency: plain size over time
        let mibps = throughput_mibps(64 * 1024, Duration::from_millis(1), 0.0);
        assert!((mibps - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_falls_back_to_raw_elapsed() {
        // Latency legs exceed the transfer time: use the elapsed time as is
        let mibps = throughput_mibps(1024 * 1024, Duration::from_millis(2), 5000.0);
        assert!((mibps - 500.0).abs() < 1e-9);

        let mibps = throughput_mibps(1024 * 1024, Duration::ZERO, 0.0);
        assert!(mibps.is_finite());
        assert!(mibps > 0.0);
    }

    #[test]
    fn test_raw_elapsed_fallback_is_detected() {
        assert_eq!(effective_transfer_seconds(Duration::from_millis(2), 5000.0), None);
        let left = effective_transfer_seconds(Duration::from_millis(3), 1000.0).unwrap();
        assert!((left - 0.001).abs() < 1e-12);

        let swallowed = Measurement {
            sample: BenchSample { latency_us: 5000.0, throughput_mibps: 500.0 },
            elapsed: Duration::from_millis(2),
        };
        assert!(swallowed.used_raw_elapsed());

        let normal = Measurement {
            sample: BenchSample { latency_us: 1000.0, throughput_mibps: 125.0 },
            elapsed: Duration::from_millis(10),
        };
        assert!(!normal.used_raw_elapsed());
    }

    #[tokio::test]
    async fn test_exchange_between_two_ranks() {
        let mut ranks = LocalCluster::create_named(3, "box").unwrap();
        let mut receiver = ranks.pop().unwrap();
        let mut sender = ranks.pop().unwrap();
        let payload = scratch_payload(64 * 1024);

        let serving = tokio::spawn(async move {
            let mut sizes = Vec::new();
            for _ in 0..3 {
                sizes.push(serve_sample(&mut receiver, 1).await.unwrap());
            }
            sizes
        });

        for _ in 0..3 {
            let measurement = measure_sample(&mut sender, 2, &payload).await.unwrap();
            assert!(measurement.sample.latency_us >= 0.0);
            assert!(measurement.sample.throughput_mibps > 0.0);
        }
        assert_eq!(serving.await.unwrap(), vec![64 * 1024; 3]);
    }

    #[tokio::test]
    async fn test_out_of_order_message_is_protocol_error() {
        let mut ranks = LocalCluster::create_named(3, "box").unwrap();
        let mut receiver = ranks.pop().unwrap();
        let mut sender = ranks.pop().unwrap();

        let rogue = tokio::spawn(async move {
            sender.send(2, Message::Ack).await.unwrap();
        });
        let err = serve_sample(&mut receiver, 1).await.unwrap_err();
        assert_eq!(err.category(), "PROTOCOL");
        rogue.await.unwrap();
    }
}

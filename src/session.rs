//! Per-participant execution context

use crate::error::Result;
use crate::logging::RoundLogger;
use crate::models::{BenchSample, Config};
use crate::timing::{measure_sample, scratch_payload, serve_sample};
use crate::transport::Transport;
use crate::types::{Rank, ROOT};
use std::sync::Arc;

/// Everything one rank needs while the run is in progress: its transport
/// handle, the run configuration, its scratch payload and its logger
pub struct Session {
    transport: Box<dyn Transport>,
    config: Arc<Config>,
    payload: Arc<[u8]>,
    logger: RoundLogger,
}

impl Session {
    /// Workers get a payload buffer of the configured size, the coordinator none
    pub fn new(transport: Box<dyn Transport>, config: Arc<Config>, logger: RoundLogger) -> Self {
        let payload = if transport.rank() == ROOT {
            Arc::from(Vec::new())
        } else {
            scratch_payload(config.payload_size)
        };
        Self { transport, config, payload, logger }
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank() == ROOT
    }

    pub fn world_size(&self) -> usize {
        self.transport.size()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logger(&self) -> &RoundLogger {
        &self.logger
    }

    pub fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Host name reported in result records
    pub fn hostname(&self) -> String {
        short_hostname(self.transport.processor_name()).to_string()
    }

    /// One timed retry against `peer`, as sender
    pub async fn measure(&mut self, peer: Rank) -> Result<BenchSample> {
        let measurement = measure_sample(self.transport.as_mut(), peer, &self.payload).await?;
        if measurement.used_raw_elapsed() {
            self.logger.log_raw_elapsed(peer, &measurement).await;
        }
        Ok(measurement.sample)
    }

    /// One retry against `peer`, as receiver
    pub async fn serve(&mut self, peer: Rank) -> Result<()> {
        serve_sample(self.transport.as_mut(), peer).await?;
        Ok(())
    }
}

/// First label of a host name: `node12.cluster.local` -> `node12`
pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().filter(|s| !s.is_empty()).unwrap_or(name)
}

//! Configuration data model and validation

use crate::logging::LogFormat;
use crate::types::{
    format_size, parse_size, AppError, Rank, Result, TestMode, TransportKind, MAX_PAYLOAD_SIZE,
    MIN_PAYLOAD_SIZE, MIN_WORLD_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bytes sent in the throughput phase
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,

    /// Retries per pair. Signed so that a negative request can be rejected.
    #[serde(default = "default_retries")]
    pub retries: i64,

    #[serde(default = "default_mode")]
    pub mode: TestMode,

    /// Print the gnuplot coordinate line instead of the table
    #[serde(default)]
    pub gnuplot: bool,

    /// Also write the results as YAML to this file
    #[serde(default)]
    pub yaml_path: Option<PathBuf>,

    /// Seed for random bisection pairing
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// World size of the local backend
    #[serde(default = "default_ranks")]
    pub ranks: usize,

    /// This process's rank on the TCP backend
    #[serde(default)]
    pub rank: Option<Rank>,

    /// `host:port` of every rank on the TCP backend, index = rank
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output (per-retry samples, info logs)
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_size: default_payload_size(),
            retries: default_retries(),
            mode: default_mode(),
            gnuplot: false,
            yaml_path: None,
            seed: None,
            transport: default_transport(),
            ranks: default_ranks(),
            rank: None,
            hosts: Vec::new(),
            connect_timeout_seconds: default_connect_timeout_secs(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            log_format: default_log_format(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of processes, coordinator included
    pub fn world_size(&self) -> usize {
        match self.transport {
            TransportKind::Local => self.ranks,
            TransportKind::Tcp => self.hosts.len(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.world_size().saturating_sub(1)
    }

    /// Retry count once validated
    pub fn retry_count(&self) -> usize {
        usize::try_from(self.retries).unwrap_or(0)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Check every rule that must hold before coordination starts
    pub fn validate(&self) -> Result<()> {
        if self.payload_size < MIN_PAYLOAD_SIZE {
            return Err(AppError::validation(format!(
                "Payload size {} is below the minimum of {}",
                format_size(self.payload_size),
                format_size(MIN_PAYLOAD_SIZE)
            )));
        }

        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(AppError::validation(format!(
                "Payload size {} exceeds the maximum of {}",
                format_size(self.payload_size),
                format_size(MAX_PAYLOAD_SIZE)
            )));
        }

        if self.retries < 0 {
            return Err(AppError::validation(format!(
                "Retry count must be positive, got {}",
                self.retries
            )));
        }

        if self.gnuplot && !self.mode.is_bisection() {
            return Err(AppError::config("Gnuplot output is only available in bisection mode"));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(AppError::config("Connect timeout must be greater than 0"));
        }

        if self.transport == TransportKind::Tcp {
            if self.hosts.is_empty() {
                return Err(AppError::config("The tcp transport needs a host list (--hosts or LFT_HOSTS)"));
            }
            for host in &self.hosts {
                validate_host_entry(host)?;
            }
            match self.rank {
                None => return Err(AppError::config("The tcp transport needs this process's rank (--rank or LFT_RANK)")),
                Some(rank) if rank >= self.hosts.len() => {
                    return Err(AppError::config(format!(
                        "Rank {} is outside the host list of {} entries",
                        rank,
                        self.hosts.len()
                    )));
                }
                Some(_) => {}
            }
        }

        if self.world_size() < MIN_WORLD_SIZE {
            return Err(AppError::validation(format!(
                "This test needs at least {} processes, got {}",
                MIN_WORLD_SIZE,
                self.world_size()
            )));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(size) = std::env::var("LFT_SIZE") {
            self.payload_size = parse_size(&size)?;
        }

        if let Ok(retries) = std::env::var("LFT_RETRIES") {
            self.retries = retries.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid LFT_RETRIES value '{}': {}", retries, e)))?;
        }

        if let Ok(mode) = std::env::var("LFT_MODE") {
            self.mode = mode.parse()?;
        }

        if let Ok(path) = std::env::var("LFT_YAML") {
            if !path.trim().is_empty() {
                self.yaml_path = Some(PathBuf::from(path.trim()));
            }
        }

        if let Ok(seed) = std::env::var("LFT_SEED") {
            self.seed = Some(seed.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid LFT_SEED value '{}': {}", seed, e)))?);
        }

        if let Ok(transport) = std::env::var("LFT_TRANSPORT") {
            self.transport = transport.parse()?;
        }

        if let Ok(ranks) = std::env::var("LFT_RANKS") {
            self.ranks = ranks.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid LFT_RANKS value '{}': {}", ranks, e)))?;
        }

        if let Ok(hosts) = std::env::var("LFT_HOSTS") {
            self.hosts = split_host_list(&hosts);
        }

        if let Ok(timeout) = std::env::var("LFT_CONNECT_TIMEOUT") {
            self.connect_timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid LFT_CONNECT_TIMEOUT value '{}': {}", timeout, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        self.rank = self.rank.or(rank_from_env()?);

        Ok(())
    }
}

/// Rank from `LFT_RANK`, falling back to the variables MPI launchers export
fn rank_from_env() -> Result<Option<Rank>> {
    for name in ["LFT_RANK", "OMPI_COMM_WORLD_RANK", "PMI_RANK"] {
        if let Ok(value) = std::env::var(name) {
            let rank = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", name, value, e)))?;
            return Ok(Some(rank));
        }
    }
    Ok(None)
}

/// Split a comma separated `host:port` list
pub fn split_host_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate_host_entry(entry: &str) -> Result<()> {
    let (host, port) = entry
        .rsplit_once(':')
        .ok_or_else(|| AppError::config(format!("Host entry '{}' must be host:port", entry)))?;
    if host.is_empty() {
        return Err(AppError::config(format!("Host entry '{}' has no host", entry)));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| AppError::config(format!("Host entry '{}' has an invalid port", entry)))?;
    if port == 0 {
        return Err(AppError::config(format!("Host entry '{}' needs a fixed port", entry)));
    }
    Ok(())
}

// Default value functions for serde
fn default_payload_size() -> usize {
    crate::defaults::DEFAULT_PAYLOAD_SIZE
}

fn default_retries() -> i64 {
    crate::defaults::DEFAULT_RETRIES
}

fn default_mode() -> TestMode {
    TestMode::Matrix
}

fn default_transport() -> TransportKind {
    TransportKind::Local
}

fn default_ranks() -> usize {
    crate::defaults::DEFAULT_LOCAL_RANKS
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_log_format() -> LogFormat {
    LogFormat::Console
}

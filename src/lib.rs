//! Latency Flow Tester
//!
//! Measures latency and throughput between the nodes of a cluster. Rank 0
//! coordinates, every other rank is a worker. Matrix mode measures every
//! ordered pair of workers in turn; bisection mode splits the workers into
//! sender/receiver pairs that all run at once.

pub mod app;
pub mod assignment;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod session;
pub mod stats;
pub mod timing;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{ExecutionResults, RoundController};
pub use models::{Config, PairResult, RunResults};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use session::Session;
pub use stats::{StatisticsEngine, StatsSummary};
pub use transport::{LocalCluster, TcpTransport, Transport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Version line with the build metadata recorded by build.rs
pub fn build_info() -> String {
    format!(
        "{} v{} ({}, {}, built {})",
        PKG_NAME,
        VERSION,
        option_env!("GIT_COMMIT").unwrap_or("no commit"),
        option_env!("TARGET_TRIPLE").unwrap_or("unknown target"),
        option_env!("BUILD_TIME").unwrap_or("unknown")
    )
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// 1 MiB
    pub const DEFAULT_PAYLOAD_SIZE: usize = 1 << 20;
    pub const DEFAULT_RETRIES: i64 = 10;
    pub const DEFAULT_LOCAL_RANKS: usize = 4;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}

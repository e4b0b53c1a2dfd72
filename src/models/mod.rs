//! Data models: run configuration and the records exchanged between ranks

pub mod config;
pub mod results;

// Re-export main model types
pub use config::Config;
pub use results::{
    BenchSample, BisectionResults, PairId, PairResult, ResultMatrix, Role, RunResults,
    TestAssignment, UNMEASURED,
};

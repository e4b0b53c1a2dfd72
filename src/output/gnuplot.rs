//! Coordinate line for gnuplot: process count against summed throughput.
//!
//! Runs with different node counts each print one line, which a wrapper
//! script collects into a data file.

use crate::executor::ExecutionResults;

pub struct GnuplotEmitter;

impl GnuplotEmitter {
    pub fn line(results: &ExecutionResults) -> String {
        format!("{}\t{:.3}", results.world_size, results.throughput_stats.sum)
    }
}

//! Result aggregation and summary statistics
//!
//! Per-retry samples are folded into one averaged value per pair, then the
//! measured pairs of a run are reduced to min/max/sum/avg for latency and
//! throughput. Unmeasured records never take part.

use crate::error::{AppError, Result};
use crate::models::{BenchSample, PairId, PairResult, RunResults};
use serde::{Deserialize, Serialize};

/// Which value of a pair result a summary is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Latency,
    Throughput,
}

impl Metric {
    pub fn value(&self, result: &PairResult) -> f64 {
        match self {
            Metric::Latency => result.latency,
            Metric::Throughput => result.throughput,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Latency => "us",
            Metric::Throughput => "MiB/s",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Latency => "Latency",
            Metric::Throughput => "Throughput",
        }
    }
}

/// Arithmetic mean of the samples, `None` without samples
pub fn average_samples(samples: &[BenchSample]) -> Option<BenchSample> {
    if samples.is_empty() {
        return None;
    }
    let count = samples.len() as f64;
    let (latency, throughput) = samples.iter().fold((0.0, 0.0), |(l, t), s| {
        (l + s.latency_us, t + s.throughput_mibps)
    });
    Some(BenchSample {
        latency_us: latency / count,
        throughput_mibps: throughput / count,
    })
}

/// Replace the pair's values with the mean of its samples.
///
/// A record without samples, or without a receiver, keeps the sentinel.
pub fn finalize_pair(result: &mut PairResult) {
    if result.receiver.is_none() {
        return;
    }
    if let Some(mean) = average_samples(&result.samples) {
        result.latency = mean.latency_us;
        result.throughput = mean.throughput_mibps;
    }
}

/// Min/max/sum/avg of one metric over a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub metric: Metric,
    /// Pair holding the smallest value; `None` when nothing was measured
    pub min: Option<PairId>,
    pub max: Option<PairId>,
    pub sum: f64,
    /// `sum` over the mode's pair count, 0 when that count is 0
    pub avg: f64,
    /// Measured records that contributed
    pub measured: usize,
}

impl StatsSummary {
    fn empty(metric: Metric) -> Self {
        Self { metric, min: None, max: None, sum: 0.0, avg: 0.0, measured: 0 }
    }

    /// Value of the minimum pair, looked up in `results`
    pub fn min_value(&self, results: &RunResults) -> Option<f64> {
        self.min.and_then(|id| results.resolve(id)).map(|r| self.metric.value(r))
    }

    pub fn max_value(&self, results: &RunResults) -> Option<f64> {
        self.max.and_then(|id| results.resolve(id)).map(|r| self.metric.value(r))
    }
}

/// Statistics of both metrics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub latency: StatsSummary,
    pub throughput: StatsSummary,
}

/// Reduces run results to summaries
pub struct StatisticsEngine;

impl StatisticsEngine {
    /// Summarize one metric over every measured record of `results`
    pub fn summarize(results: &RunResults, metric: Metric) -> Result<StatsSummary> {
        let mut summary = StatsSummary::empty(metric);
        let mut min_value = f64::INFINITY;
        let mut max_value = f64::NEG_INFINITY;

        for record in results.records().filter(|r| r.is_measured()) {
            let value = metric.value(record);
            if !value.is_finite() {
                return Err(AppError::statistics(format!(
                    "{} of pair {} is not a finite number",
                    metric.label(),
                    record.pair_id().map(|id| id.to_string()).unwrap_or_default()
                )));
            }
            let id = record.pair_id();

            if value < min_value {
                min_value = value;
                summary.min = id;
            }
            if value > max_value {
                max_value = value;
                summary.max = id;
            }
            summary.sum += value;
            summary.measured += 1;
        }

        let pair_count = results.pair_count();
        summary.avg = if pair_count == 0 { 0.0 } else { summary.sum / pair_count as f64 };
        Ok(summary)
    }

    /// Latency and throughput summaries
    pub fn analyze(results: &RunResults) -> Result<RunStatistics> {
        Ok(RunStatistics {
            latency: Self::summarize(results, Metric::Latency)?,
            throughput: Self::summarize(results, Metric::Throughput)?,
        })
    }
}

//! Core formatting trait and the plain text tables
//!
//! Matrix and bisection results are laid out in fixed-width cells: every
//! column is 22 characters between its borders, latency on the first line of
//! a cell and throughput on the second.

use super::hosts::HostDirectory;
use crate::{
    error::{AppError, Result},
    executor::ExecutionResults,
    models::{BisectionResults, PairResult, ResultMatrix, RunResults},
    stats::StatsSummary,
    types::format_size,
};
use std::fmt::Write as _;

/// Inner width of one table column
pub const CELL_WIDTH: usize = 22;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    fn options(&self) -> &FormattingOptions;

    /// One-line description of the run, shown in verbose mode
    fn format_run_header(&self, results: &ExecutionResults) -> Result<String>;

    /// All ordered pairs, one row per sender
    fn format_matrix(&self, matrix: &ResultMatrix, hosts: &HostDirectory) -> Result<String>;

    /// One block per measured sender
    fn format_bisection(&self, results: &BisectionResults, hosts: &HostDirectory) -> Result<String>;

    /// Max/min/sum/avg of both metrics
    fn format_statistics(&self, results: &ExecutionResults, hosts: &HostDirectory) -> Result<String>;

    /// Raw per-retry samples of every measured pair
    fn format_samples(&self, results: &RunResults, hosts: &HostDirectory) -> Result<String>;

    /// Complete console report: table, statistics and, when verbose, samples
    fn format_results(&self, results: &ExecutionResults) -> Result<String> {
        let hosts = HostDirectory::from_results(&results.results);
        let mut output = String::new();

        if self.options().verbose_mode {
            output.push_str(&self.format_run_header(results)?);
            output.push('\n');
        }

        match &results.results {
            RunResults::Matrix(matrix) => output.push_str(&self.format_matrix(matrix, &hosts)?),
            RunResults::Bisection(bisection) => output.push_str(&self.format_bisection(bisection, &hosts)?),
        }
        output.push_str(&self.format_statistics(results, &hosts)?);

        if self.options().show_samples {
            output.push('\n');
            output.push_str(&self.format_samples(&results.results, &hosts)?);
        }

        Ok(output)
    }
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    pub verbose_mode: bool,
    /// List every retry's sample under the statistics
    pub show_samples: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            show_samples: false,
        }
    }
}

/// Parts of the table a formatter may decorate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Border,
    Host,
    Latency,
    Throughput,
    Unmeasured,
    Heading,
}

fn format_failed(e: std::fmt::Error) -> AppError {
    AppError::output(format!("Failed to format results: {}", e))
}

/// Layout shared by the plain and colored formatters. `paint` receives each
/// already padded fragment, so decorations never disturb the column widths.
pub(crate) struct TableRenderer<'a> {
    pub hosts: &'a HostDirectory,
    pub paint: &'a dyn Fn(Highlight, &str) -> String,
}

impl<'a> TableRenderer<'a> {
    fn border_segment(&self) -> String {
        (self.paint)(Highlight::Border, &format!("+{}", "-".repeat(CELL_WIDTH)))
    }

    fn border_line(&self, columns: usize) -> String {
        let mut line = String::new();
        for _ in 0..columns {
            line.push_str(&self.border_segment());
        }
        line.push_str(&(self.paint)(Highlight::Border, "+"));
        line
    }

    fn bar(&self) -> String {
        (self.paint)(Highlight::Border, "|")
    }

    fn diagonal(&self) -> String {
        (self.paint)(Highlight::Border, &format!("|{}", "-".repeat(CELL_WIDTH)))
    }

    /// `| <17 wide> us ` or its throughput twin, 22 characters after the bar
    fn latency_cell(&self, result: &PairResult) -> String {
        let body = if result.is_measured() {
            (self.paint)(Highlight::Latency, &format!("{:>17.3}", result.latency)) + " us "
        } else {
            (self.paint)(Highlight::Unmeasured, &format!("{:>20}", "unmeasured")) + " "
        };
        format!("{} {}", self.bar(), body)
    }

    fn throughput_cell(&self, result: &PairResult) -> String {
        let body = if result.is_measured() {
            (self.paint)(Highlight::Throughput, &format!("{:>14.3}", result.throughput)) + " MiB/s "
        } else {
            (self.paint)(Highlight::Unmeasured, &format!("{:>20}", "-")) + " "
        };
        format!("{} {}", self.bar(), body)
    }

    fn host(&self, rank: usize, width: usize) -> String {
        (self.paint)(Highlight::Host, &format!("{:<width$}", self.hosts.label(rank), width = width))
    }

    pub fn matrix(&self, matrix: &ResultMatrix) -> Result<String> {
        let workers = matrix.worker_count();
        let margin = " ".repeat(CELL_WIDTH + 1);
        let mut out = String::new();

        // Header: one "To" column per receiver, offset by the sender column
        writeln!(out, "{}{}", margin, self.border_line(workers)).map_err(format_failed)?;
        write!(out, "{}", margin).map_err(format_failed)?;
        for receiver in matrix.worker_ranks() {
            write!(out, "{} To {} ", self.bar(), self.host(receiver, 17)).map_err(format_failed)?;
        }
        writeln!(out, "{}", self.bar()).map_err(format_failed)?;
        writeln!(out, "{}", self.border_line(workers + 1)).map_err(format_failed)?;

        for sender in matrix.worker_ranks() {
            write!(out, "{} From {} ", self.bar(), self.host(sender, 15)).map_err(format_failed)?;
            for receiver in matrix.worker_ranks() {
                match matrix.get(sender, receiver) {
                    Some(result) => out.push_str(&self.latency_cell(result)),
                    None => out.push_str(&self.diagonal()),
                }
            }
            writeln!(out, "{}", self.bar()).map_err(format_failed)?;

            write!(out, "{}{}", self.bar(), " ".repeat(CELL_WIDTH)).map_err(format_failed)?;
            for receiver in matrix.worker_ranks() {
                match matrix.get(sender, receiver) {
                    Some(result) => out.push_str(&self.throughput_cell(result)),
                    None => out.push_str(&self.diagonal()),
                }
            }
            writeln!(out, "{}", self.bar()).map_err(format_failed)?;
            writeln!(out, "{}", self.border_line(workers + 1)).map_err(format_failed)?;
        }

        Ok(out)
    }

    pub fn bisection(&self, results: &BisectionResults) -> Result<String> {
        let mut out = String::new();
        let blank = " ".repeat(CELL_WIDTH - 1);
        let border = (self.paint)(
            Highlight::Border,
            &format!("+{}+{}+", "-".repeat(CELL_WIDTH - 1), "-".repeat(CELL_WIDTH)),
        );

        let mut measured = results.measured().peekable();
        if measured.peek().is_none() {
            writeln!(out, "No pair was measured.").map_err(format_failed)?;
            return Ok(out);
        }

        for entry in measured {
            // is_measured guarantees a receiver
            let receiver = entry.receiver.unwrap_or_default();
            writeln!(out, "{}", border).map_err(format_failed)?;
            writeln!(
                out,
                "{} From {}{} To {} {}",
                self.bar(),
                self.host(entry.sender, 15),
                self.bar(),
                self.host(receiver, 17),
                self.bar()
            )
            .map_err(format_failed)?;
            writeln!(
                out,
                "{}{}{} {} us {}",
                self.bar(),
                blank,
                self.bar(),
                (self.paint)(Highlight::Latency, &format!("{:>17.3}", entry.latency)),
                self.bar()
            )
            .map_err(format_failed)?;
            writeln!(
                out,
                "{}{}{} {} MiB/s {}",
                self.bar(),
                blank,
                self.bar(),
                (self.paint)(Highlight::Throughput, &format!("{:>14.3}", entry.throughput)),
                self.bar()
            )
            .map_err(format_failed)?;
            writeln!(out, "{}", border).map_err(format_failed)?;
        }

        Ok(out)
    }

    fn summary(&self, out: &mut String, summary: &StatsSummary, results: &RunResults) -> Result<()> {
        let unit = summary.metric.unit();
        writeln!(out, "\n{} :", (self.paint)(Highlight::Heading, summary.metric.label())).map_err(format_failed)?;

        for (name, id, value) in [
            ("Max", summary.max, summary.max_value(results)),
            ("Min", summary.min, summary.min_value(results)),
        ] {
            match (id, value) {
                (Some(id), Some(value)) => writeln!(
                    out,
                    "{} : {:.3} {} \tFrom {} to {}",
                    name,
                    value,
                    unit,
                    (self.paint)(Highlight::Host, &self.hosts.label(id.sender)),
                    (self.paint)(Highlight::Host, &self.hosts.label(id.receiver))
                )
                .map_err(format_failed)?,
                _ => writeln!(out, "{} : {}", name, (self.paint)(Highlight::Unmeasured, "no measured pair"))
                    .map_err(format_failed)?,
            }
        }

        writeln!(out, "Sum : {:.3} {}", summary.sum, unit).map_err(format_failed)?;
        writeln!(out, "Avg : {:.3} {}", summary.avg, unit).map_err(format_failed)?;
        Ok(())
    }

    pub fn statistics(&self, results: &ExecutionResults) -> Result<String> {
        let mut out = String::new();
        self.summary(&mut out, &results.latency_stats, &results.results)?;
        self.summary(&mut out, &results.throughput_stats, &results.results)?;
        Ok(out)
    }

    pub fn samples(&self, results: &RunResults) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "{}", (self.paint)(Highlight::Heading, "Samples :")).map_err(format_failed)?;
        for record in results.records().filter(|r| r.is_measured()) {
            let receiver = record.receiver.unwrap_or_default();
            writeln!(out, "{} -> {}", self.hosts.label(record.sender), self.hosts.label(receiver))
                .map_err(format_failed)?;
            for (retry, sample) in record.samples.iter().enumerate() {
                writeln!(
                    out,
                    "  #{:<3} {:>12.3} us {:>12.3} MiB/s",
                    retry + 1,
                    sample.latency_us,
                    sample.throughput_mibps
                )
                .map_err(format_failed)?;
            }
        }
        Ok(out)
    }
}

/// Run description line, shared by both formatters
pub(crate) fn run_header(results: &ExecutionResults) -> String {
    format!(
        "{} run {}: {} workers, {} payload, {} retries, {}ms",
        results.mode,
        results.run_id,
        results.worker_count(),
        format_size(results.payload_size),
        results.retries,
        results.duration().num_milliseconds()
    )
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    fn with_renderer<T>(&self, hosts: &HostDirectory, render: impl FnOnce(&TableRenderer) -> T) -> T {
        let paint = |_: Highlight, text: &str| text.to_string();
        render(&TableRenderer { hosts, paint: &paint })
    }
}

impl OutputFormatter for PlainFormatter {
    fn options(&self) -> &FormattingOptions {
        &self.options
    }

    fn format_run_header(&self, results: &ExecutionResults) -> Result<String> {
        Ok(run_header(results))
    }

    fn format_matrix(&self, matrix: &ResultMatrix, hosts: &HostDirectory) -> Result<String> {
        self.with_renderer(hosts, |r| r.matrix(matrix))
    }

    fn format_bisection(&self, results: &BisectionResults, hosts: &HostDirectory) -> Result<String> {
        self.with_renderer(hosts, |r| r.bisection(results))
    }

    fn format_statistics(&self, results: &ExecutionResults, hosts: &HostDirectory) -> Result<String> {
        self.with_renderer(hosts, |r| r.statistics(results))
    }

    fn format_samples(&self, results: &RunResults, hosts: &HostDirectory) -> Result<String> {
        self.with_renderer(hosts, |r| r.samples(results))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::BenchSample;
    use crate::stats::{finalize_pair, StatisticsEngine};
    use crate::types::TestMode;
    use chrono::Utc;

    pub(crate) fn measured(sender: usize, receiver: usize, latency: f64, throughput: f64) -> PairResult {
        let mut result = PairResult::unmeasured(sender, Some(receiver), format!("node{}", sender));
        result.samples.push(BenchSample { latency_us: latency, throughput_mibps: throughput });
        finalize_pair(&mut result);
        result
    }

    pub(crate) fn execution(results: RunResults, mode: TestMode) -> ExecutionResults {
        let stats = StatisticsEngine::analyze(&results).unwrap();
        let now = Utc::now();
        ExecutionResults {
            run_id: "test-run".to_string(),
            mode,
            world_size: results.worker_count() + 1,
            payload_size: 1 << 20,
            retries: 1,
            results,
            latency_stats: stats.latency,
            throughput_stats: stats.throughput,
            started_at: now,
            completed_at: now,
        }
    }

    pub(crate) fn sample_matrix() -> RunResults {
        let mut matrix = ResultMatrix::new(4);
        for s in 1..=3 {
            for r in 1..=3 {
                if s != r {
                    matrix.insert(s, r, measured(s, r, (s * 10 + r) as f64, 1000.0 + r as f64)).unwrap();
                }
            }
        }
        RunResults::Matrix(matrix)
    }

    fn plain() -> PlainFormatter {
        PlainFormatter::new(FormattingOptions { enable_color: false, ..Default::default() })
    }

    #[test]
    fn test_matrix_layout() {
        let results = execution(sample_matrix(), TestMode::Matrix);
        let text = plain().format_results(&results).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        let border = format!("+{}", "-".repeat(CELL_WIDTH));
        assert_eq!(lines[0], format!("{}{}+", " ".repeat(23), border.repeat(3)));
        assert!(lines[1].starts_with(&format!("{}| To node1", " ".repeat(23))));
        assert_eq!(lines[2], format!("{}+", border.repeat(4)));
        assert!(lines[3].starts_with("| From node1           |----------------------|"));
        assert!(lines[3].contains("12.000 us"));
        assert!(lines[4].contains("1002.000 MiB/s"));

        // Every table line has the same width
        for line in &lines[2..12] {
            assert_eq!(line.len(), 4 * (CELL_WIDTH + 1) + 1, "{:?}", line);
        }
    }

    #[test]
    fn test_bisection_only_lists_senders() {
        let entries = vec![
            measured(1, 3, 5.0, 900.0),
            measured(2, 4, 7.0, 800.0),
            PairResult::unmeasured(3, None, "node3"),
            PairResult::unmeasured(4, None, "node4"),
        ];
        let results = RunResults::Bisection(BisectionResults::new(entries).unwrap());
        let text = plain().format_results(&execution(results, TestMode::Bisection)).unwrap();

        assert_eq!(text.matches("| From ").count(), 2);
        assert!(text.contains("| From node1          | To node3             |"));
        assert!(text.contains("|                     |             5.000 us |"));
        assert!(text.contains("|                     |        900.000 MiB/s |"));
        assert!(!text.contains("From node3 "));
    }

    #[test]
    fn test_statistics_block() {
        let text = plain().format_results(&execution(sample_matrix(), TestMode::Matrix)).unwrap();
        assert!(text.contains("\nLatency :\nMax : 32.000 us \tFrom node3 to node2\n"));
        assert!(text.contains("Min : 12.000 us \tFrom node1 to node2\n"));
        assert!(text.contains("Sum : 132.000 us\nAvg : 22.000 us\n"));
        assert!(text.contains("\nThroughput :\nMax : 1003.000 MiB/s \tFrom node1 to node3\n"));
    }

    #[test]
    fn test_unmeasured_run_renders_without_values() {
        let entries = vec![
            PairResult::unmeasured(1, None, "node1"),
            PairResult::unmeasured(2, None, "node2"),
        ];
        let results = RunResults::Bisection(BisectionResults::new(entries).unwrap());
        let text = plain().format_results(&execution(results, TestMode::Bisection)).unwrap();
        assert!(text.contains("No pair was measured."));
        assert!(text.contains("Max : no measured pair"));
        assert!(!text.contains("-1.000"));
    }

    #[test]
    fn test_samples_listing_when_requested() {
        let formatter = PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: true,
            show_samples: true,
        });
        let text = formatter.format_results(&execution(sample_matrix(), TestMode::Matrix)).unwrap();
        assert!(text.starts_with("matrix run test-run: 3 workers"));
        assert!(text.contains("Samples :\nnode1 -> node2\n  #1"));
    }
}

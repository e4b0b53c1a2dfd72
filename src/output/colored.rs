//! Colored formatter implementation with terminal color support

use super::formatter::{
    run_header, FormattingOptions, Highlight, OutputFormatter, TableRenderer,
};
use super::hosts::HostDirectory;
use crate::{
    error::Result,
    executor::ExecutionResults,
    models::{BisectionResults, ResultMatrix, RunResults},
};
use colored::*;

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub border: Color,
    pub host: Color,
    pub latency: Color,
    pub throughput: Color,
    pub unmeasured: Color,
    pub heading: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            border: Color::BrightBlack,
            host: Color::Cyan,
            latency: Color::Yellow,
            throughput: Color::Green,
            unmeasured: Color::BrightBlack,
            heading: Color::Blue,
        }
    }
}

impl ColorScheme {
    pub fn color_for(&self, highlight: Highlight) -> Color {
        match highlight {
            Highlight::Border => self.border,
            Highlight::Host => self.host,
            Highlight::Latency => self.latency,
            Highlight::Throughput => self.throughput,
            Highlight::Unmeasured => self.unmeasured,
            Highlight::Heading => self.heading,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, highlight: Highlight, text: &str) -> String {
        if !self.options.enable_color {
            return text.to_string();
        }
        let painted = text.color(self.color_scheme.color_for(highlight));
        match highlight {
            Highlight::Heading => painted.bold().to_string(),
            _ => painted.to_string(),
        }
    }

    fn with_renderer<T>(&self, hosts: &HostDirectory, render: impl FnOnce(&TableRenderer) -> T) -> T {
        let paint = |highlight: Highlight, text: &str| self.colorize(highlight, text);
        render(&TableRenderer { hosts, paint: &paint })
    }
}

impl OutputFormatter for ColoredFormatter {
    fn options(&self) -> &FormattingOptions {
        &self.options
    }

    fn format_run_header(&self, results: &ExecutionResults) -> Result<String> {
        Ok(self.colorize(Highlight::Heading, &run_header(results)))
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

//! Output formatting and display system
//!
//! The coordinator's results are printed either as tables plus statistics or,
//! in gnuplot mode, as one coordinate line. A YAML copy can be written on the
//! side; failing to write it never fails the run.

mod colored;
mod formatter;
mod gnuplot;
mod hosts;
mod yaml;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{FormattingOptions, Highlight, OutputFormatter, PlainFormatter, CELL_WIDTH};
pub use gnuplot::GnuplotEmitter;
pub use hosts::HostDirectory;
pub use yaml::YamlWriter;

use crate::{
    error::Result,
    executor::ExecutionResults,
    logging::ErrorEventLogger,
    models::Config,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            show_samples: verbose,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Formatter for scripts and logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    gnuplot: bool,
    yaml: Option<YamlWriter>,
    error_logger: Option<ErrorEventLogger>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self {
            formatter,
            gnuplot: false,
            yaml: None,
            error_logger: None,
        }
    }

    /// Coordinator set up from the run configuration
    pub fn from_config(config: &Config, error_logger: ErrorEventLogger) -> Self {
        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
        Self {
            formatter,
            gnuplot: config.gnuplot,
            yaml: config.yaml_path.as_ref().map(YamlWriter::new),
            error_logger: Some(error_logger),
        }
    }

    pub fn with_gnuplot(mut self, gnuplot: bool) -> Self {
        self.gnuplot = gnuplot;
        self
    }

    pub fn with_yaml(mut self, writer: YamlWriter) -> Self {
        self.yaml = Some(writer);
        self
    }

    /// Console text for `results`
    pub fn render(&self, results: &ExecutionResults) -> Result<String> {
        if self.gnuplot {
            Ok(format!("{}\n", GnuplotEmitter::line(results)))
        } else {
            self.formatter.format_results(results)
        }
    }

    /// Write the YAML copy, if any. Failures are logged and reported back
    /// as `false`.
    pub async fn export(&self, results: &ExecutionResults) -> bool {
        let writer = match &self.yaml {
            Some(writer) => writer,
            None => return true,
        };

        let hosts = HostDirectory::from_results(&results.results);
        match writer.write(&results.results, &hosts).await {
            Ok(()) => true,
            Err(error) => {
                match &self.error_logger {
                    Some(logger) => logger.log_nonfatal(&error, "YAML export").await,
                    None => eprintln!("ERROR: {}", error),
                }
                false
            }
        }
    }

    /// Print to stdout and export
    pub async fn display_results(&self, results: &ExecutionResults) -> Result<()> {
        let text = self.render(results)?;
        self.export(results).await;
        print!("{}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::{execution, sample_matrix};
    use crate::types::TestMode;

    #[test]
    fn test_gnuplot_replaces_table() {
        let results = execution(sample_matrix(), TestMode::Matrix);
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter()).with_gnuplot(true);
        assert_eq!(coordinator.render(&results).unwrap(), "4\t6012.000\n");
    }

    #[test]
    fn test_table_by_default() {
        let results = execution(sample_matrix(), TestMode::Matrix);
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        let text = coordinator.render(&results).unwrap();
        assert!(text.contains("| From node1"));
        assert!(text.contains("Throughput :"));
    }

    #[tokio::test]
    async fn test_yaml_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let results = execution(sample_matrix(), TestMode::Matrix);
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter())
            .with_yaml(YamlWriter::new(dir.path().join("nope").join("r.yaml")));

        assert!(!coordinator.export(&results).await);
        assert!(coordinator.display_results(&results).await.is_ok());
    }

    #[tokio::test]
    async fn test_from_config_writes_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yaml");
        let config = Config {
            yaml_path: Some(path.clone()),
            enable_color: false,
            ..Config::default()
        };
        let coordinator = OutputCoordinator::from_config(&config, ErrorEventLogger::new(&config));
        let results = execution(sample_matrix(), TestMode::Matrix);

        assert!(coordinator.export(&results).await);
        assert!(path.exists());
    }
}

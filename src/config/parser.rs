//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::{supports_color, Cli},
    config::env::EnvManager,
    error::Result,
    models::{config::split_host_list, Config},
    types::{format_size, parse_size, TransportKind},
};
use std::path::PathBuf;

/// Builds the run configuration: defaults, then `.env`, then the
/// environment, then the command line
pub struct ConfigParser {
    cli: Cli,
    env_file: Option<PathBuf>,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: Some(PathBuf::from(".env")),
        }
    }

    /// Skip the `.env` file
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(path) = &self.env_file {
            EnvManager::load_env_file_from(path, self.cli.debug)?;
        }
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let cli = &self.cli;

        if let Some(size) = &cli.size {
            config.payload_size = parse_size(size)?;
        }
        if let Some(retries) = cli.retries {
            config.retries = retries;
        }
        if let Some(mode) = cli.mode_override() {
            config.mode = mode;
        }
        if cli.wants_gnuplot() {
            config.gnuplot = true;
        }
        if let Some(path) = &cli.yaml {
            config.yaml_path = Some(path.clone());
        }
        if cli.seed.is_some() {
            config.seed = cli.seed;
        }
        if let Some(transport) = &cli.transport {
            config.transport = transport.parse()?;
        }
        if let Some(ranks) = cli.ranks {
            config.ranks = ranks;
        }
        if cli.rank.is_some() {
            config.rank = cli.rank;
        }
        if let Some(hosts) = &cli.hosts {
            config.hosts = split_host_list(hosts);
        }
        if let Some(timeout) = cli.connect_timeout {
            config.connect_timeout_seconds = timeout;
        }
        if let Some(format) = &cli.log_format {
            config.log_format = format.parse()?;
        }

        config.enable_color = match cli.color_choice() {
            Some(choice) => choice,
            None => config.enable_color && supports_color(),
        };

        // CLI-only switches
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }

        Ok(())
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = vec![
        format!("Mode: {}", config.mode),
        format!("Payload: {}", format_size(config.payload_size)),
        format!("Retries: {}", config.retries),
        format!("Transport: {}", config.transport),
        format!("Processes: {}", config.world_size()),
    ];

    if config.transport == TransportKind::Tcp {
        summary.push(format!(
            "Rank: {}",
            config.rank.map(|r| r.to_string()).unwrap_or_else(|| "unset".to_string())
        ));
        summary.push(format!("Hosts: {}", config.hosts.join(", ")));
    }
    if let Some(seed) = config.seed {
        summary.push(format!("Seed: {}", seed));
    }
    if let Some(path) = &config.yaml_path {
        summary.push(format!("YAML: {}", path.display()));
    }
    summary.push(format!("Gnuplot: {}", config.gnuplot));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use crate::types::TestMode;
    use clap::Parser;

    fn overridden(args: &[&str]) -> Result<Config> {
        let cli = Cli::parse_from(std::iter::once("lft").chain(args.iter().copied()));
        let mut config = Config::default();
        ConfigParser::new(cli).without_env_file().apply_cli_overrides(&mut config)?;
        Ok(config)
    }

    #[test]
    fn test_cli_overrides() {
        let config = overridden(&["-s", "2M", "-p", "4", "-r", "--seed", "11", "--no-color", "--verbose"]).unwrap();
        assert_eq!(config.payload_size, 2 * 1024 * 1024);
        assert_eq!(config.retries, 4);
        assert_eq!(config.mode, TestMode::RandomBisection);
        assert_eq!(config.seed, Some(11));
        assert!(!config.enable_color);
        assert!(config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gnuplot_implies_bisection() {
        let config = overridden(&["-g"]).unwrap();
        assert!(config.gnuplot);
        assert_eq!(config.mode, TestMode::Bisection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_size_unit() {
        let err = overridden(&["-s", "64X"]).unwrap_err();
        assert!(err.to_string().contains("Unit -s X unknown"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_negative_retries_fail_validation() {
        let config = overridden(&["-p", "-1"]).unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("Retry count must be positive"));
    }

    #[test]
    fn test_tcp_settings() {
        let config = overridden(&[
            "--transport", "tcp", "--rank", "1", "--hosts", "a:7700, b:7700,c:7700",
            "--connect-timeout", "5", "--log-format", "compact",
        ])
        .unwrap();
        assert_eq!(config.transport, TransportKind::Tcp);
        assert_eq!(config.hosts, vec!["a:7700", "b:7700", "c:7700"]);
        assert_eq!(config.world_size(), 3);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_transport() {
        assert!(overridden(&["--transport", "carrier-pigeon"]).is_err());
    }

    #[test]
    fn test_config_summary() {
        let config = overridden(&["-b", "-o", "r.yaml"]).unwrap();
        let summary = display_config_summary(&config);
        assert!(summary.contains("Mode: bisection"));
        assert!(summary.contains("YAML: r.yaml"));
        assert!(summary.contains("Processes: 4"));
    }
}

//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::config::split_host_list;
use crate::types::{parse_size, TestMode, TransportKind};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Apply `path` to the process environment when it exists
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }
        Ok(())
    }

    /// Check one variable's format without applying it
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let invalid = |e: &dyn std::fmt::Display| AppError::config(format!("Invalid {} value '{}': {}", key, value, e));
        let value = value.trim();

        match key {
            "LFT_SIZE" => {
                parse_size(value)?;
            }
            "LFT_RETRIES" => {
                let retries: i64 = value.parse().map_err(|e| invalid(&e))?;
                if retries < 0 {
                    return Err(AppError::config(format!("{} must not be negative, got {}", key, retries)));
                }
            }
            "LFT_MODE" => {
                value.parse::<TestMode>()?;
            }
            "LFT_TRANSPORT" => {
                value.parse::<TransportKind>()?;
            }
            "LFT_SEED" => {
                value.parse::<u64>().map_err(|e| invalid(&e))?;
            }
            "LFT_RANKS" | "LFT_RANK" | "LFT_CONNECT_TIMEOUT" => {
                value.parse::<usize>().map_err(|e| invalid(&e))?;
            }
            "LFT_HOSTS" => {
                if split_host_list(value).is_empty() {
                    return Err(AppError::config(format!("{} lists no host", key)));
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>().map_err(|e| invalid(&e))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Supported variables: name, description, example
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("LFT_SIZE", "Payload size with K/M/G suffix", "1M"),
            ("LFT_RETRIES", "Retries per pair", "10"),
            ("LFT_MODE", "matrix, bisection or random-bisection", "bisection"),
            ("LFT_YAML", "YAML output file", "results.yaml"),
            ("LFT_SEED", "Random pairing seed", "42"),
            ("LFT_TRANSPORT", "local or tcp", "tcp"),
            ("LFT_RANKS", "Local backend process count", "4"),
            ("LFT_RANK", "Rank of this process (tcp)", "0"),
            ("LFT_HOSTS", "host:port of every rank (tcp)", "n1:7700,n2:7700,n3:7700"),
            ("LFT_CONNECT_TIMEOUT", "TCP mesh setup timeout in seconds", "30"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Variable table for the verbose configuration hints
    pub fn display_env_help() -> String {
        let mut help = String::from("Environment variables (a .env file in the working directory is read first):\n");
        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<20} {:<40} e.g. {}\n", var, description, example));
        }
        help.push_str("Command-line options override the environment, which overrides the built-in defaults.\n");
        help
    }

    /// Problems with the variables currently set
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}

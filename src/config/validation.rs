//! Non-fatal configuration checks
//!
//! `Config::validate` rejects configurations that cannot run. The checks
//! here flag configurations that run but may not measure what the user
//! expects.

use crate::{
    error::Result,
    models::Config,
    types::{format_size, TestMode, TransportKind},
};
use colored::Colorize;

/// Payloads above this are legal but slow to move on every retry
pub const LARGE_PAYLOAD: usize = 256 * 1024 * 1024;

/// Matrix runs with more ordered pairs than this take a while
pub const LARGE_MATRIX_PAIRS: usize = 1000;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Fatal checks first, then the warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::check_retries(config));
        warnings.extend(Self::check_workers(config));
        warnings.extend(Self::check_payload(config));
        warnings.extend(Self::check_transport(config));
        Ok(warnings)
    }

    fn check_retries(config: &Config) -> Option<ValidationWarning> {
        match config.retries {
            0 => Some(ValidationWarning::new(
                ValidationLevel::Warning,
                "Retry count is 0: no pair will be measured and every result stays unset".to_string(),
            )),
            1 | 2 => Some(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} retries per pair give noisy averages", config.retries),
            )),
            _ => None,
        }
    }

    fn check_workers(config: &Config) -> Option<ValidationWarning> {
        let workers = config.worker_count();
        if config.mode.is_bisection() && workers % 2 == 1 {
            return Some(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} workers is odd: rank {} sits out of the bisection", workers, workers),
            ));
        }
        let pairs = workers * workers.saturating_sub(1);
        if config.mode == TestMode::Matrix && pairs > LARGE_MATRIX_PAIRS {
            return Some(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Matrix mode will measure {} pairs one after another", pairs),
            ));
        }
        None
    }

    fn check_payload(config: &Config) -> Option<ValidationWarning> {
        (config.payload_size > LARGE_PAYLOAD).then(|| {
            ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Payload of {} is held in memory by every worker",
                    format_size(config.payload_size)
                ),
            )
        })
    }

    fn check_transport(config: &Config) -> Option<ValidationWarning> {
        (config.transport == TransportKind::Local).then(|| {
            ValidationWarning::new(
                ValidationLevel::Info,
                "Local transport measures in-process channels, not the network".to_string(),
            )
        })
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        let tag = match (use_color, &self.level) {
            (false, _) => tag,
            (true, ValidationLevel::Info) => tag.blue().to_string(),
            (true, ValidationLevel::Warning) => tag.yellow().to_string(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &Config) -> Vec<String> {
        validate_config(config).unwrap().into_iter().map(|w| w.message).collect()
    }

    #[test]
    fn test_default_config_only_notes_local_transport() {
        let warnings = validate_config(&Config::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, ValidationLevel::Info);
        assert!(warnings[0].message.contains("in-process"));
    }

    #[test]
    fn test_zero_retries_warns() {
        let config = Config { retries: 0, ..Config::default() };
        assert!(messages(&config).iter().any(|m| m.contains("Retry count is 0")));
    }

    #[test]
    fn test_odd_bisection_warns() {
        let config = Config { ranks: 6, mode: TestMode::Bisection, ..Config::default() };
        assert!(messages(&config).iter().any(|m| m.contains("rank 5 sits out")));

        let even = Config { ranks: 5, mode: TestMode::Bisection, ..Config::default() };
        assert!(!messages(&even).iter().any(|m| m.contains("sits out")));
    }

    #[test]
    fn test_large_matrix_and_payload() {
        let config = Config { ranks: 40, payload_size: 512 * 1024 * 1024, ..Config::default() };
        let found = messages(&config);
        assert!(found.iter().any(|m| m.contains("1482 pairs")));
        assert!(found.iter().any(|m| m.contains("512M")));
    }

    #[test]
    fn test_fatal_errors_still_fail() {
        let config = Config { ranks: 2, ..Config::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "careful".to_string());
        assert_eq!(warning.format(false), "[WARNING] careful");
    }
}

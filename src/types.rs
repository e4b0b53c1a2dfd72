//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Identity of a participant in the run
pub type Rank = usize;

/// The coordinator rank. It assigns roles and reconciles results but never measures.
pub const ROOT: Rank = 0;

/// Smallest payload the throughput phase accepts (64 KiB)
pub const MIN_PAYLOAD_SIZE: usize = 64 * 1024;

/// Largest payload accepted on the command line (1 GiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024 * 1024;

/// A run needs a coordinator and at least two workers
pub const MIN_WORLD_SIZE: usize = 3;

/// Size unit suffixes and their multipliers
pub const SIZE_UNITS: &[(char, usize)] = &[
    ('K', 1024),
    ('M', 1024 * 1024),
    ('G', 1024 * 1024 * 1024),
];

/// How the workers are exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestMode {
    /// Every ordered worker pair, one pair at a time
    Matrix,
    /// Half the workers send to the other half, deterministic pairing
    Bisection,
    /// Bisection with pairs drawn at random
    RandomBisection,
}

impl TestMode {
    pub fn is_bisection(&self) -> bool {
        matches!(self, Self::Bisection | Self::RandomBisection)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Matrix => "matrix",
            Self::Bisection => "bisection",
            Self::RandomBisection => "random-bisection",
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matrix" => Ok(Self::Matrix),
            "bisection" | "bissection" => Ok(Self::Bisection),
            "random" | "random-bisection" => Ok(Self::RandomBisection),
            other => Err(AppError::parse(format!(
                "Unknown test mode '{}' (expected matrix, bisection or random-bisection)",
                other
            ))),
        }
    }
}

/// Message-passing backend used for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// All ranks as tasks in this process
    Local,
    /// One process per rank over TCP
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "tcp" => Ok(Self::Tcp),
            other => Err(AppError::parse(format!(
                "Unknown transport '{}' (expected local or tcp)",
                other
            ))),
        }
    }
}

/// Parse a payload size such as `64K`, `1M` or `2g`.
///
/// The unit suffix is mandatory. Range checks live in `Config::validate`.
pub fn parse_size(input: &str) -> Result<usize> {
    let input = input.trim();
    let unit = input
        .chars()
        .last()
        .ok_or_else(|| AppError::validation("Empty payload size"))?;

    let multiplier = SIZE_UNITS
        .iter()
        .find(|(suffix, _)| suffix.eq_ignore_ascii_case(&unit))
        .map(|(_, m)| *m)
        .ok_or_else(|| AppError::validation(format!("Unit -s {} unknown", unit)))?;

    let digits = &input[..input.len() - unit.len_utf8()];
    let value: usize = digits
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid payload size '{}'", input)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| AppError::validation(format!("Payload size '{}' overflows", input)))
}

/// Render a byte count with the largest unit that divides it exactly
pub fn format_size(bytes: usize) -> String {
    for (suffix, multiplier) in SIZE_UNITS.iter().rev() {
        if bytes >= *multiplier && bytes % multiplier == 0 {
            return format!("{}{}", bytes / multiplier, suffix);
        }
    }
    format!("{}B", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("64K").unwrap(), 65536);
        assert_eq!(parse_size("1M").unwrap(), 1 << 20);
        assert_eq!(parse_size("1g").unwrap(), 1 << 30);
        assert_eq!(parse_size(" 2m ").unwrap(), 2 << 20);
    }

    #[test]
    fn test_parse_size_rejects_unknown_unit() {
        let err = parse_size("10X").unwrap_err();
        assert_eq!(err.category(), "VALIDATION");
        assert!(err.to_string().contains("Unit -s X unknown"));

        // Bare numbers carry no unit
        assert!(parse_size("65536").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("-1M").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(65536), "64K");
        assert_eq!(format_size(1 << 20), "1M");
        assert_eq!(format_size(3 << 30), "3G");
        assert_eq!(format_size(1536 * 1024), "1536K");
        assert_eq!(format_size(100), "100B");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("matrix".parse::<TestMode>().unwrap(), TestMode::Matrix);
        assert_eq!("Bisection".parse::<TestMode>().unwrap(), TestMode::Bisection);
        assert_eq!("random".parse::<TestMode>().unwrap(), TestMode::RandomBisection);
        assert!("ring".parse::<TestMode>().is_err());

        assert!(TestMode::RandomBisection.is_bisection());
        assert!(!TestMode::Matrix.is_bisection());
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert_eq!("local".parse::<TransportKind>().unwrap(), TransportKind::Local);
        assert!("udp".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::Tcp.to_string(), "tcp");
    }
}

//! Command-line interface

use crate::types::TestMode;
use clap::Parser;
use std::path::PathBuf;

/// Latency Flow Tester - pairwise latency and throughput between cluster nodes
#[derive(Parser, Debug, Clone)]
#[command(name = "lft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Payload size of the throughput phase, with a K, M or G suffix (at least 64K)
    #[arg(short = 's', long = "size", value_name = "SIZE")]
    pub size: Option<String>,

    /// Retries per pair
    #[arg(short = 'p', long = "retries", value_name = "N", allow_negative_numbers = true)]
    pub retries: Option<i64>,

    /// Bisection mode: half the workers send to the other half at once
    #[arg(short = 'b', long)]
    pub bisection: bool,

    /// Random bisection pairing (implies -b)
    #[arg(short = 'r', long)]
    pub random: bool,

    /// Print "workers<TAB>throughput sum" instead of the tables (implies -b)
    #[arg(short = 'g', long)]
    pub gnuplot: bool,

    /// Also write the results to this YAML file
    #[arg(short = 'o', long = "yaml", value_name = "FILE")]
    pub yaml: Option<PathBuf>,

    /// Seed for random pairing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Message-passing backend: local or tcp
    #[arg(long, value_name = "KIND")]
    pub transport: Option<String>,

    /// Number of processes for the local backend, coordinator included
    #[arg(short = 'n', long)]
    pub ranks: Option<usize>,

    /// Rank of this process (tcp)
    #[arg(long)]
    pub rank: Option<usize>,

    /// Comma separated host:port of every rank, in rank order (tcp)
    #[arg(long, value_name = "LIST")]
    pub hosts: Option<String>,

    /// Seconds to wait for the tcp mesh to form
    #[arg(long = "connect-timeout", value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Info logs and per-retry samples
    #[arg(long)]
    pub verbose: bool,

    /// Debug logs
    #[arg(long)]
    pub debug: bool,

    /// Log encoding: console, json or compact
    #[arg(long = "log-format", value_name = "FORMAT")]
    pub log_format: Option<String>,
}

/// What a mode switch changes in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEffect {
    Bisection,
    RandomPairing,
    Gnuplot,
}

/// Mode switches and everything each of them turns on
pub const FLAG_EFFECTS: &[(char, &[FlagEffect])] = &[
    ('b', &[FlagEffect::Bisection]),
    ('r', &[FlagEffect::RandomPairing, FlagEffect::Bisection]),
    ('g', &[FlagEffect::Gnuplot, FlagEffect::Bisection]),
];

impl Cli {
    fn switch_set(&self, flag: char) -> bool {
        match flag {
            'b' => self.bisection,
            'r' => self.random,
            'g' => self.gnuplot,
            _ => false,
        }
    }

    /// Union of the effects of every switch given
    pub fn flag_effects(&self) -> Vec<FlagEffect> {
        let mut effects = Vec::new();
        for (flag, implied) in FLAG_EFFECTS {
            if self.switch_set(*flag) {
                for effect in implied.iter() {
                    if !effects.contains(effect) {
                        effects.push(*effect);
                    }
                }
            }
        }
        effects
    }

    /// Mode requested by the switches, `None` when none was given
    pub fn mode_override(&self) -> Option<TestMode> {
        let effects = self.flag_effects();
        if effects.contains(&FlagEffect::RandomPairing) {
            Some(TestMode::RandomBisection)
        } else if effects.contains(&FlagEffect::Bisection) {
            Some(TestMode::Bisection)
        } else {
            None
        }
    }

    pub fn wants_gnuplot(&self) -> bool {
        self.flag_effects().contains(&FlagEffect::Gnuplot)
    }

    /// Explicit color choice; `None` leaves it to the environment
    pub fn color_choice(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        self.color_choice().unwrap_or_else(supports_color)
    }
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    match std::env::var("TERM") {
        Ok(term) if term == "dumb" => false,
        _ => cfg!(unix),
    }
}

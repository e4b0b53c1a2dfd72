//! Structured logging for the latency flow tester
//!
//! Every entry goes to stderr so that stdout only carries results (the gnuplot
//! line in particular must stay machine readable). Entries can be rendered as
//! console lines, JSON objects or compact one-liners, and carry the run id plus
//! the rank that emitted them.

use crate::error::{AppError, Result};
use crate::models::{BenchSample, Config, PairResult, TestAssignment};
use crate::timing::Measurement;
use crate::types::Rank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Severity, ordered from chattiest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Per-retry barrier traffic
    Trace = 0,
    /// Assignments and raw samples
    Debug = 1,
    /// Finished pairs and phases
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

const LEVEL_NAMES: [(LogLevel, &str); 6] = [
    (LogLevel::Trace, "TRACE"),
    (LogLevel::Debug, "DEBUG"),
    (LogLevel::Info, "INFO"),
    (LogLevel::Warn, "WARN"),
    (LogLevel::Error, "ERROR"),
    (LogLevel::Fatal, "FATAL"),
];

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        LEVEL_NAMES[*self as usize].1
    }

    fn paint(&self, text: &str) -> String {
        use colored::Colorize;
        match self {
            LogLevel::Trace => text.dimmed().to_string(),
            LogLevel::Debug => text.cyan().to_string(),
            LogLevel::Info => text.green().to_string(),
            LogLevel::Warn => text.yellow().to_string(),
            LogLevel::Error => text.red().to_string(),
            LogLevel::Fatal => text.magenta().bold().to_string(),
        }
    }

    /// `--debug` wins over `--verbose`; neither leaves warnings only
    pub fn from_switches(debug: bool, verbose: bool) -> Self {
        match (debug, verbose) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Info,
            (false, false) => LogLevel::Warn,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        let wanted = if wanted == "WARNING" { "WARN".to_string() } else { wanted };
        LEVEL_NAMES
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(level, _)| *level)
            .ok_or_else(|| AppError::parse(format!("Invalid log level: {}", s)))
    }
}

/// Encoding of each stderr line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Console,
    /// One JSON object per line
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(AppError::parse(format!(
                "Invalid log format: {} (expected console, json or compact)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that wrote the entry (APP, ROUND, ERR)
    pub logger: String,
    pub rank: Option<Rank>,
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    /// Filled by `log_at!`, printed in debug mode
    pub location: Option<LogLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// State shared by all loggers of one run
#[derive(Debug, Default)]
struct LogContext {
    run_id: Option<String>,
    /// Operation opened by `start_operation` and not yet ended
    open_operation: Option<String>,
    fields: HashMap<String, serde_json::Value>,
}

/// Writes structured entries to stderr
pub struct Logger {
    name: String,
    rank: Option<Rank>,
    min_level: LogLevel,
    format: LogFormat,
    use_color: bool,
    show_location: bool,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Console logger at Info level with its own context
    pub fn new(name: String) -> Self {
        Self {
            name,
            rank: None,
            min_level: LogLevel::Info,
            format: LogFormat::Console,
            use_color: true,
            show_location: false,
            context: Arc::default(),
        }
    }

    /// Level, format and color taken from the run configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        Self {
            min_level: LogLevel::from_switches(config.debug, config.verbose),
            format: config.log_format,
            use_color: config.enable_color,
            show_location: config.debug,
            ..Self::new(name)
        }
    }

    fn sharing(mut self, context: Arc<RwLock<LogContext>>) -> Self {
        self.context = context;
        self
    }

    /// Tag every entry with `rank`
    pub fn for_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Attach `key` to every later entry of every logger sharing this context
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.write().await.fields.insert(key.to_string(), value);
        }
    }

    /// Open an operation; entries without an explicit correlation id join it
    pub async fn start_operation(&self, operation: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.context.write().await.open_operation = Some(id.clone());

        self.debug(&format!("{} started", operation))
            .correlation_id(&id)
            .field("operation", operation)
            .log()
            .await;
        id
    }

    pub async fn end_operation(&self, id: &str, operation: &str, success: bool) {
        self.debug(&format!("{} {}", operation, if success { "finished" } else { "failed" }))
            .correlation_id(id)
            .field("operation", operation)
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.open_operation.as_deref() == Some(id) {
            context.open_operation = None;
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message: message.to_string(),
                logger: self.name.clone(),
                rank: self.rank,
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    async fn emit(&self, mut entry: LogEntry) {
        if !self.enabled(entry.level) {
            return;
        }

        {
            let context = self.context.read().await;
            if let Some(run_id) = &context.run_id {
                entry.fields.insert("run_id".to_string(), run_id.clone().into());
            }
            if entry.correlation_id.is_none() {
                entry.correlation_id = context.open_operation.clone();
            }
            for (key, value) in &context.fields {
                entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let line = match self.format {
            LogFormat::Console => self.console_line(&entry),
            LogFormat::Json => self.json_line(&entry),
            LogFormat::Compact => self.compact_line(&entry),
        };
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }

    fn source(&self, entry: &LogEntry) -> String {
        match entry.rank {
            Some(rank) => format!("{}#{}", entry.logger, rank),
            None => entry.logger.clone(),
        }
    }

    fn console_line(&self, entry: &LogEntry) -> String {
        let level = format!("{:>5}", entry.level.as_str());
        let level = if self.use_color { entry.level.paint(&level) } else { level };
        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            self.source(entry),
            entry.message
        );

        if let Some(id) = &entry.correlation_id {
            line.push_str(&format!(" [{}]", id.get(..8).unwrap_or(id.as_str())));
        }

        let mut fields: Vec<String> = entry
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != "run_id")
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        if !fields.is_empty() {
            fields.sort();
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if let (true, Some(location)) = (self.show_location, &entry.location) {
            line.push_str(&format!(" @ {}:{}", location.file, location.line));
        }
        line
    }

    fn json_line(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|e| {
            serde_json::json!({ "message": entry.message, "serialize_error": e.to_string() }).to_string()
        })
    }

    fn compact_line(&self, entry: &LogEntry) -> String {
        format!(
            "{} {} {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            &entry.level.as_str()[..1],
            self.source(entry),
            entry.message
        )
    }
}

/// Fluent construction of one entry, written by `log()`
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Values that fail to serialize are skipped
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    pub fn sample(self, sample: &BenchSample) -> Self {
        self.field("latency_us", sample.latency_us)
            .field("throughput_mibps", sample.throughput_mibps)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.emit(self.entry).await;
    }
}

/// Protocol events of one rank: assignments, barriers, samples, finished pairs
pub struct RoundLogger {
    logger: Logger,
}

impl RoundLogger {
    /// Standalone round logger with its own context
    pub fn new(config: &Config, rank: Rank) -> Self {
        Self {
            logger: Logger::with_config("ROUND".to_string(), config).for_rank(rank),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn log_assignment(&self, assignment: &TestAssignment) {
        let message = match assignment.peer {
            Some(peer) => format!("{} opposite rank {}", assignment.role, peer),
            None => format!("{}", assignment.role),
        };
        self.logger
            .debug(&message)
            .field("role", assignment.role.to_string())
            .field("peer", assignment.peer)
            .log()
            .await;
    }

    pub async fn log_barrier(&self, retry: usize) {
        self.logger
            .trace(&format!("Group synchronized for retry {}", retry + 1))
            .field("retry", retry)
            .log()
            .await;
    }

    pub async fn log_sample(&self, peer: Rank, retry: usize, sample: &BenchSample) {
        self.logger
            .debug(&format!(
                "Retry {} with rank {}: {:.3} us, {:.3} MiB/s",
                retry + 1,
                peer,
                sample.latency_us,
                sample.throughput_mibps
            ))
            .field("peer", peer)
            .field("retry", retry)
            .sample(sample)
            .log()
            .await;
    }

    /// The latency legs covered the whole throughput phase, so the raw
    /// elapsed time stood in for the transfer time
    pub async fn log_raw_elapsed(&self, peer: Rank, measurement: &Measurement) {
        let elapsed_us = measurement.elapsed.as_secs_f64() * 1e6;
        self.logger
            .debug(&format!(
                "Transfer to rank {} took {:.3} us, within twice the {:.3} us latency; using raw elapsed time",
                peer, elapsed_us, measurement.sample.latency_us
            ))
            .field("peer", peer)
            .field("elapsed_us", elapsed_us)
            .sample(&measurement.sample)
            .log()
            .await;
    }

    /// Coordinator side: a pair's samples arrived and were averaged
    pub async fn log_pair_complete(&self, result: &PairResult) {
        let pair = match result.pair_id() {
            Some(id) => id.to_string(),
            None => format!("{}->?", result.sender),
        };
        self.logger
            .info(&format!(
                "Pair {} on {}: {:.3} us, {:.3} MiB/s from {} samples",
                pair,
                result.hostname,
                result.latency,
                result.throughput,
                result.samples.len()
            ))
            .field("pair", pair)
            .field("latency_us", result.latency)
            .field("throughput_mibps", result.throughput)
            .log()
            .await;
    }

    pub async fn log_phase(&self, phase: &str, started: DateTime<Utc>) {
        let elapsed_ms = (Utc::now() - started).num_milliseconds();
        self.logger
            .info(&format!("{} took {}ms", phase, elapsed_ms))
            .field("phase", phase)
            .field("duration_ms", elapsed_ms)
            .log()
            .await;
    }
}

/// Failures that are reported but do not go through `main`'s exit path
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    /// A failure the run continues past, such as the YAML export
    pub async fn log_nonfatal(&self, error: &AppError, context: &str) {
        self.logger
            .warn(&format!("{} failed, continuing: {}", context, error))
            .error_info(error)
            .field("context", context)
            .log()
            .await;
    }

    /// One rank of a local run stopped with an error
    pub async fn log_rank_failure(&self, rank: Rank, error: &AppError) {
        self.logger
            .error(&format!("Rank {} stopped: {}", rank, error))
            .field("failed_rank", rank)
            .error_info(error)
            .log()
            .await;
    }
}

/// Hands out loggers that share one run id
pub struct LoggerFactory {
    config: Config,
    run_id: String,
    context: Arc<RwLock<LogContext>>,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        let run_id = Uuid::new_v4().to_string();
        let context = LogContext {
            run_id: Some(run_id.clone()),
            ..LogContext::default()
        };
        Self {
            config,
            run_id,
            context: Arc::new(RwLock::new(context)),
        }
    }

    pub fn create_logger(&self, name: &str) -> Logger {
        Logger::with_config(name.to_string(), &self.config).sharing(self.context.clone())
    }

    pub fn create_round_logger(&self, rank: Rank) -> RoundLogger {
        RoundLogger {
            logger: self.create_logger("ROUND").for_rank(rank),
        }
    }

    pub fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger {
            logger: self.create_logger("ERR"),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.run_id
    }
}

/// Log at `level` with the caller's source location attached
#[macro_export]
macro_rules! log_at {
    ($logger:expr, $level:expr, $($arg:tt)*) => {
        $logger
            .log($level, &format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

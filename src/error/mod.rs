//! Error type shared by every rank, plus console reporting

use thiserror::Error;

/// Everything that can stop a run
#[derive(Error, Debug)]
pub enum AppError {
    /// Unusable settings from the command line, environment or `.env`
    #[error("Configuration error: {0}")]
    Config(String),

    /// A setting that parsed but breaks a rule (size unit, retry count, world size)
    #[error("Invalid setting: {0}")]
    Validation(String),

    #[error("Cannot parse: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Connect, send or receive failed between two ranks
    #[error("Transport error: {0}")]
    Transport(String),

    /// A peer sent something the round protocol does not allow at this point
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Mesh setup took longer than the connect timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Table, YAML or gnuplot rendering failed
    #[error("Output error: {0}")]
    Output(String),

    #[error("Statistics error: {0}")]
    Statistics(String),

    /// A broken assumption inside this process
    #[error("Internal error: {0}")]
    Internal(String),
}

macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant(message.into())
            }
        )*
    };
}

impl AppError {
    constructors! {
        config => Config,
        validation => Validation,
        parse => Parse,
        io => Io,
        transport => Transport,
        protocol => Protocol,
        timeout => Timeout,
        output => Output,
        statistics => Statistics,
        internal => Internal,
    }

    /// Short tag used in console output and structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Io(_) => "IO",
            Self::Transport(_) => "TRANSPORT",
            Self::Protocol(_) => "PROTOCOL",
            Self::Timeout(_) => "TIMEOUT",
            Self::Output(_) => "OUTPUT",
            Self::Statistics(_) => "STATS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// The bare message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Validation(m)
            | Self::Parse(m)
            | Self::Io(m)
            | Self::Transport(m)
            | Self::Protocol(m)
            | Self::Timeout(m)
            | Self::Output(m)
            | Self::Statistics(m)
            | Self::Internal(m) => m,
        }
    }

    /// Same category, different message
    fn map_message(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::Config(m) => Self::Config(f(m)),
            Self::Validation(m) => Self::Validation(f(m)),
            Self::Parse(m) => Self::Parse(f(m)),
            Self::Io(m) => Self::Io(f(m)),
            Self::Transport(m) => Self::Transport(f(m)),
            Self::Protocol(m) => Self::Protocol(f(m)),
            Self::Timeout(m) => Self::Timeout(f(m)),
            Self::Output(m) => Self::Output(f(m)),
            Self::Statistics(m) => Self::Statistics(f(m)),
            Self::Internal(m) => Self::Internal(f(m)),
        }
    }

    /// Whether starting the whole cluster again could succeed.
    ///
    /// Nothing is retried inside a run: a failed participant stalls or aborts
    /// the whole group.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Message plus a hint on what to change
    pub fn user_friendly_message(&self) -> String {
        let (headline, hint) = match self {
            Self::Config(_) => (
                "Configuration problem",
                "Check the LFT_* variables, your .env file and the command line (see --help).",
            ),
            Self::Validation(_) => (
                "Invalid input",
                "Sizes take a K, M or G suffix, retries cannot be negative, and a run needs 3 processes.",
            ),
            Self::Parse(_) => ("Failed to parse value", "Check the format of the value given."),
            Self::Io(_) => ("File operation failed", "Check file permissions and disk space."),
            Self::Transport(_) => (
                "Communication with another rank failed",
                "Start every rank with the same host list and make sure the ports are reachable.",
            ),
            Self::Protocol(_) => (
                "Unexpected message from a peer",
                "All ranks must run the same lft build with the same mode and retry count.",
            ),
            Self::Timeout(_) => (
                "The mesh did not come up in time",
                "Start all ranks together or raise --connect-timeout.",
            ),
            Self::Output(_) => ("Could not render results", "Check the YAML output path."),
            Self::Statistics(_) => (
                "Statistics calculation failed",
                "A measured value was not a finite number.",
            ),
            Self::Internal(_) => ("Internal error", "This is a bug; please report it with the command line used."),
        };
        format!("{}: {}\n\nSuggestion: {}", headline, self.message(), hint)
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Transport(_) => 2,
            Self::Timeout(_) => 3,
            Self::Protocol(_) => 4,
            Self::Io(_) | Self::Output(_) => 5,
            Self::Statistics(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// `[CATEGORY] message`, colored by how the run failed
    pub fn format_for_console(&self, use_color: bool) -> String {
        let plain = format!("[{}] {}", self.category(), self);
        if !use_color {
            return plain;
        }

        use colored::{Color, Colorize};
        let color = match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Transport(_) | Self::Protocol(_) => Color::Yellow,
            Self::Timeout(_) => Color::Blue,
            Self::Io(_) | Self::Output(_) | Self::Statistics(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        };
        format!("[{}] {}", self.category().color(color).bold(), self.to_string().color(color))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(error: bincode::Error) -> Self {
        Self::protocol(format!("Malformed record: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON: {}", error))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::output(format!("YAML: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Not an integer: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("Not a socket address: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::timeout(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix an error's message while keeping its category
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let prefix = f();
            e.into().map_message(|m| format!("{}: {}", prefix, m))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Writes fatal errors to stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// One line, or with `verbose` the hint and a rerun note as well
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));
        if !self.verbose {
            return;
        }

        eprintln!();
        eprintln!("{}", error.user_friendly_message());
        if error.is_recoverable() {
            let note = "Restarting every rank may get past this.";
            eprintln!();
            if self.use_color {
                use colored::Colorize;
                eprintln!("{}", note.green());
            } else {
                eprintln!("{}", note);
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_exit_codes() {
        let cases = [
            (AppError::config("c"), "CONFIG", 1),
            (AppError::validation("v"), "VALIDATION", 1),
            (AppError::parse("p"), "PARSE", 1),
            (AppError::io("i"), "IO", 5),
            (AppError::transport("t"), "TRANSPORT", 2),
            (AppError::protocol("p"), "PROTOCOL", 4),
            (AppError::timeout("t"), "TIMEOUT", 3),
            (AppError::output("o"), "OUTPUT", 5),
            (AppError::statistics("s"), "STATS", 6),
            (AppError::internal("i"), "INTERNAL", 99),
        ];
        for (error, category, code) in cases {
            assert_eq!(error.category(), category);
            assert_eq!(error.exit_code(), code, "{}", category);
        }
    }

    #[test]
    fn test_only_link_failures_are_recoverable() {
        assert!(AppError::transport("Connection reset").is_recoverable());
        assert!(AppError::timeout("mesh setup").is_recoverable());
        assert!(!AppError::validation("Unit -s X unknown").is_recoverable());
        assert!(!AppError::protocol("expected ack").is_recoverable());
    }

    #[test]
    fn test_display_and_message() {
        let error = AppError::validation("Unit -s X unknown");
        assert_eq!(error.to_string(), "Invalid setting: Unit -s X unknown");
        assert_eq!(error.message(), "Unit -s X unknown");
    }

    #[test]
    fn test_user_friendly_messages() {
        let message = AppError::validation("Unit -s X unknown").user_friendly_message();
        assert!(message.starts_with("Invalid input: Unit -s X unknown"));
        assert!(message.contains("Suggestion:"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        assert_eq!(AppError::from(io_error).category(), "IO");

        let parse_error = "not_a_number".parse::<i32>().unwrap_err();
        assert_eq!(AppError::from(parse_error).category(), "PARSE");

        let addr_error = "not-an-addr".parse::<std::net::SocketAddr>().unwrap_err();
        assert_eq!(AppError::from(addr_error).category(), "PARSE");

        let truncated: std::result::Result<(u64, u64), bincode::Error> = bincode::deserialize(&[1, 2, 3]);
        assert_eq!(AppError::from(truncated.unwrap_err()).category(), "PROTOCOL");

        let dotenv_error: AppError = dotenv::Error::LineParse(".env".to_string(), 1).into();
        assert_eq!(dotenv_error.category(), "CONFIG");
        assert!(dotenv_error.to_string().contains("Environment file error"));
    }

    #[test]
    fn test_error_context_keeps_category() {
        let result: Result<i32> = Err(AppError::transport("Connection refused"));
        let error = result.context("While dialing rank 2").unwrap_err();

        assert_eq!(error.category(), "TRANSPORT");
        assert_eq!(error.message(), "While dialing rank 2: Connection refused");
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::config("bad rank");
        assert_eq!(error.format_for_console(false), "[CONFIG] Configuration error: bad rank");
        assert!(error.format_for_console(true).contains("bad rank"));
    }

    #[test]
    fn test_error_reporter() {
        let reporter = ErrorReporter::default();
        assert!(reporter.use_color);
        assert!(!reporter.verbose);

        ErrorReporter::new(false, true).report_error(&AppError::timeout("mesh setup"));
    }
}

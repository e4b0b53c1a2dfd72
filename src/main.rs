//! Latency Flow Tester - Main CLI Application
//!
//! Measures pairwise latency and throughput between the worker ranks of a
//! cluster, one pair at a time (matrix) or half the workers at once
//! (bisection).

use clap::Parser;
use latency_flow_tester::{
    app::App,
    cli::Cli,
    config::EnvManager,
    error::{AppError, ErrorReporter},
    types::ROOT,
    build_info,
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue along with the command line used.");
        process::exit(99);
    }));

    let cli = Cli::parse();

    if cli.debug {
        eprintln!("{}", build_info());
    }

    let reporting_rank = App::reporting_rank(&cli);
    let verbose = cli.verbose;
    let reporter = ErrorReporter::new(cli.use_colors(), verbose);

    let outcome = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        // Workers exit with the same code but leave the talking to rank 0
        if reporting_rank == ROOT {
            reporter.report_error(&e);
            print_error_suggestions(&e, verbose);
        }
        process::exit(e.exit_code());
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError, verbose: bool) {
    match error {
        AppError::Config(_) | AppError::Validation(_) | AppError::Parse(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Sizes need a unit: 64K, 1M, 2G (at least 64K)");
            eprintln!("  - The retry count cannot be negative");
            eprintln!("  - A run needs at least 3 processes: the coordinator and two workers");
            eprintln!("  - Check LFT_* variables and your .env file");
            if verbose {
                eprintln!();
                eprint!("{}", EnvManager::display_env_help());
            }
        }
        AppError::Transport(_) | AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Transport troubleshooting:");
            eprintln!("  - Start every rank listed in --hosts, each with its own --rank");
            eprintln!("  - Check that every host:port is reachable and not in use");
            eprintln!("  - Raise --connect-timeout when ranks start far apart");
        }
        AppError::Protocol(_) => {
            eprintln!();
            eprintln!("Protocol troubleshooting:");
            eprintln!("  - Run the same lft version with the same options on every rank");
        }
        AppError::Io(_) | AppError::Output(_) => {
            eprintln!();
            eprintln!("Output help:");
            eprintln!("  - Check that the YAML output directory exists and is writable");
        }
        _ => {}
    }
}

//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    executor::{create_controller, execute, ExecutionConfig, ExecutionResults},
    logging::LoggerFactory,
    models::Config,
    output::OutputCoordinator,
    session::Session,
    transport::{LocalCluster, TcpTransport, Transport},
    types::{format_size, Rank, TransportKind, ROOT},
};
use std::sync::Arc;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Rank this process plays, as far as it can be told without a valid
    /// configuration. Used to keep error output on the coordinator only.
    pub fn reporting_rank(cli: &Cli) -> Rank {
        let transport = cli
            .transport
            .clone()
            .or_else(|| std::env::var("LFT_TRANSPORT").ok())
            .and_then(|kind| kind.parse::<TransportKind>().ok())
            .unwrap_or(TransportKind::Local);

        if transport == TransportKind::Local {
            return ROOT;
        }
        cli.rank
            .or_else(|| {
                ["LFT_RANK", "OMPI_COMM_WORLD_RANK", "PMI_RANK"]
                    .iter()
                    .find_map(|name| std::env::var(name).ok()?.trim().parse().ok())
            })
            .unwrap_or(ROOT)
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        let config = Arc::new(load_config(self.cli.clone())?);
        let factory = LoggerFactory::new(config.as_ref().clone());
        let logger = factory.create_logger("APP");
        let is_coordinator = match config.transport {
            TransportKind::Local => true,
            TransportKind::Tcp => config.rank == Some(ROOT),
        };

        if is_coordinator {
            for warning in validate_config(&config)? {
                eprintln!("{}", warning.format(config.enable_color));
            }
            if config.debug {
                eprintln!("{}", display_config_summary(&config));
                for problem in EnvManager::validate_current_env() {
                    eprintln!("{}", problem);
                }
            }
        }

        let run_id = factory.session_id().to_string();
        logger.add_context_field("mode", config.mode.to_string()).await;
        let operation = logger.start_operation("run").await;
        logger
            .info(&format!(
                "Starting {} run over {} processes ({} payload, {} retries)",
                config.mode,
                config.world_size(),
                format_size(config.payload_size),
                config.retries
            ))
            .correlation_id(&operation)
            .field("transport", config.transport.to_string())
            .log()
            .await;

        let outcome = match config.transport {
            TransportKind::Local => run_local(config.clone(), &factory, &run_id).await,
            TransportKind::Tcp => run_tcp(config.clone(), &factory, &run_id).await,
        };
        logger.end_operation(&operation, "run", outcome.is_ok()).await;

        if let Some(results) = outcome? {
            OutputCoordinator::from_config(&config, factory.create_error_logger())
                .display_results(&results)
                .await?;
        }

        Ok(())
    }
}

/// Every rank as a task of this process
async fn run_local(
    config: Arc<Config>,
    factory: &LoggerFactory,
    run_id: &str,
) -> Result<Option<ExecutionResults>> {
    let exec_config = ExecutionConfig::from(config.as_ref());
    let tasks = LocalCluster::create(config.world_size())?
        .into_iter()
        .map(|transport| {
            let rank = transport.rank();
            let mut session = Session::new(Box::new(transport), config.clone(), factory.create_round_logger(rank));
            let controller = create_controller(&exec_config);
            let run_id = run_id.to_string();
            tokio::spawn(async move { execute(&mut session, controller.as_ref(), &run_id).await })
        });

    let outcomes = futures::future::try_join_all(tasks)
        .await
        .map_err(|e| AppError::internal(format!("A rank task panicked: {}", e)))?;

    // A failing rank drops its channels, which fails its peers with
    // transport errors; report the failure that started it.
    let error_logger = factory.create_error_logger();
    let mut coordinator = None;
    let mut first_error: Option<AppError> = None;
    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Some(results)) => coordinator = Some(results),
            Ok(None) => {}
            Err(error) => {
                error_logger.log_rank_failure(rank, &error).await;
                let replace = match &first_error {
                    None => true,
                    Some(current) => {
                        matches!(current, AppError::Transport(_)) && !matches!(error, AppError::Transport(_))
                    }
                };
                if replace {
                    first_error = Some(error);
                }
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(coordinator),
    }
}

/// This process is one rank of a TCP mesh
async fn run_tcp(
    config: Arc<Config>,
    factory: &LoggerFactory,
    run_id: &str,
) -> Result<Option<ExecutionResults>> {
    let rank = config
        .rank
        .ok_or_else(|| AppError::config("The tcp transport needs this process's rank"))?;
    let transport = TcpTransport::connect(rank, &config.hosts, config.connect_timeout()).await?;

    let mut session = Session::new(Box::new(transport), config.clone(), factory.create_round_logger(rank));
    let controller = create_controller(&ExecutionConfig::from(config.as_ref()));
    execute(&mut session, controller.as_ref(), run_id).await
}

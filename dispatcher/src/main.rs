use std::sync::Arc;

use clap::Parser as _;
use dispatcher::cli::{Cli, Commands, RunCmd, SetupCmd, WatchCmd};
use dispatcher::core::config::Config;
use dispatcher::server::setup_server;
use dispatcher::setup::{setup, TopologyManager};
use dispatcher::types::params::WatchParams;
use dispatcher::utils::logging::init_logging;
use dispatcher::utils::signal_handler::SignalHandler;
use dispatcher::worker::initialize_worker;
use dispatcher::{DispatcherError, DispatcherResult};
use dispatcher_job_client::{HttpJobsApi, JobsApi, StatusPoller};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    if let Err(e) = init_logging() {
        panic!("Failed to initialize logging: {e}");
    }
    info!("Starting dispatcher");
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { run_command } => {
            info!("Executing run command with args: {:?}", run_command);
            if let Err(e) = run_dispatcher(run_command).await {
                error!(error = %e, error_chain = ?e, "Failed to run dispatcher service");
                panic!("Failed to run dispatcher service: {}", e);
            }
            info!("Dispatcher service stopped");
        }
        Commands::Setup { setup_command } => {
            info!("Executing setup command with args: {:?}", setup_command);
            if let Err(e) = setup_dispatcher(setup_command).await {
                error!(error = %e, error_chain = ?e, "Failed to setup dispatcher");
                panic!("Failed to setup dispatcher: {}", e);
            }
            info!("Dispatcher setup completed successfully");
        }
        Commands::Watch { watch_command } => {
            if let Err(e) = watch_jobs(watch_command).await {
                error!(error = %e, error_chain = ?e, "Failed to watch jobs");
                panic!("Failed to watch jobs: {}", e);
            }
        }
    }
}

/// Verifies the broker, then runs the REST server and the worker pool until a shutdown signal.
async fn run_dispatcher(run_cmd: &RunCmd) -> DispatcherResult<()> {
    let config = Arc::new(Config::setup(run_cmd).await?);
    debug!("Configuration initialized");

    // Refuse to run against a broker that does not match the declared topology.
    TopologyManager::new(config.broker_handle()).verify(config.topology()).await?;

    let server_enabled = config.server_config().enabled;
    let workers_enabled = config.worker_config().enabled;
    if !server_enabled && !workers_enabled {
        return Err(DispatcherError::ConfigError("both the server and the workers are disabled".to_string()));
    }

    let signal_handler = SignalHandler::new();
    let shutdown_token = CancellationToken::new();

    let server = if server_enabled {
        let (address, handle) = setup_server(config.clone(), signal_handler.get_shutdown_trigger()).await?;
        debug!(%address, "Application router initialized");
        Some(handle)
    } else {
        None
    };

    let worker_controller =
        if workers_enabled { Some(initialize_worker(config.clone(), shutdown_token.clone()).await?) } else { None };

    let signal = signal_handler.wait_for_shutdown().await?;
    info!(%signal, "Shutting down dispatcher");
    shutdown_token.cancel();

    if let Some(mut controller) = worker_controller {
        controller.shutdown().await?;
    }
    if let Some(server) = server {
        if let Err(e) = server.shutdown().await {
            warn!(error = %e, "API server task did not stop cleanly");
        }
    }
    Ok(())
}

async fn setup_dispatcher(setup_cmd: &SetupCmd) -> DispatcherResult<()> {
    let report = setup(setup_cmd).await?;
    info!(created = ?report.created, repaired = ?report.repaired, "Setup finished");
    Ok(())
}

/// Polls a running dispatcher and logs every job that finishes after the watch started.
async fn watch_jobs(watch_cmd: &WatchCmd) -> DispatcherResult<()> {
    let params = WatchParams::try_from(watch_cmd.clone())?;
    let api: Arc<dyn JobsApi> = Arc::new(HttpJobsApi::new(params.api_url.clone(), params.request_timeout)?);

    let poller = StatusPoller::new(api, |job| match &job.error_message {
        Some(reason) => warn!(job_id = %job.id, job_type = %job.job_type, status = %job.status, %reason, "Job finished"),
        None => info!(job_id = %job.id, job_type = %job.job_type, status = %job.status, "Job finished"),
    });
    info!(api_url = %params.api_url, interval_secs = params.interval.as_secs(), "Watching jobs");
    poller.start(params.interval);

    let signal = SignalHandler::new().wait_for_shutdown().await?;
    debug!(%signal, "Stopping status poller");
    poller.stop().await;

    info!(errors = poller.error_count(), tracked = poller.jobs().len(), "Stopped watching jobs");
    Ok(())
}

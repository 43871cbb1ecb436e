//! Simulator entry point.
//!
//! Registers a sample adder model with the simulator session service and
//! runs the advance loop until the service unregisters it, or, with
//! `--exported-brain`, drives the same model against an exported brain's
//! prediction endpoint.
//!
//! # Architecture
//!
//! ```text
//! CLI + SIM_* env --> ClientConfig --> SimulatorSession --advance--> service
//!                                  \-> PredictionLoop   --predict--> exported brain
//! ```
//!
//! Any fatal error ends the process with status 1 after a timestamped
//! diagnostic, written once: by the loop for loop failures, here for
//! startup failures. Ctrl-C requests a clean stop, which deletes the session.

mod adder;
mod cli;

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use simbridge_client::{
    BrainError, ClientConfig, ExportedBrainConfig, Handlers, HttpSimulatorApi, PredictionLoop,
    SessionError, SimulatorSession, StopHandle, log_prediction_end, log_session_end,
};
use simbridge_types::SimulatorInterface;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adder::AdderModel;
use crate::cli::Cli;

/// Application entry point.
///
/// Parses arguments, initializes logging, then runs the selected loop.
/// Returns exit status 1 on any fatal error.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = if cli.exported_brain { "exported-brain" } else { "session" },
        "simbridge-runner starting"
    );

    let result = if cli.exported_brain {
        run_exported_brain(&cli).await
    } else {
        run_session(&cli).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !reported_by_loop(&err) {
                error!(
                    timestamp = %Utc::now().to_rfc3339(),
                    error = %format!("{err:#}"),
                    "simbridge-runner failed to start"
                );
            }
            info!(exit_code = 1, "simbridge-runner exiting after fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Whether the session or prediction loop already logged this error with
/// its timestamp and cause chain.
fn reported_by_loop(err: &anyhow::Error) -> bool {
    err.is::<SessionError>() || err.is::<BrainError>()
}

/// Initialize structured logging.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Register the adder and advance until the session ends.
async fn run_session(cli: &Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env()?.with_logging(cli.enable_logging);
    config.apply_overrides(cli.overrides());
    info!(
        server = %config.server,
        workspace = %config.workspace,
        request_timeout_secs = config.request_timeout.as_secs(),
        max_retries = config.retry.max_retries,
        "configuration loaded"
    );

    let api = HttpSimulatorApi::new(&config)?;
    let interface = SimulatorInterface::new(cli.name.as_str())
        .with_description(AdderModel::description());
    let handlers = Handlers::new()
        .with_episode_start(|config| info!(config = %config, "episode starting"))
        .with_unregister(|reason, details| {
            if let Some(details) = details {
                info!(reason = ?reason, details, "unregister details");
            }
        });

    let mut session = SimulatorSession::new(&config, api, AdderModel::new(cli.episode_length))?
        .with_interface(interface)
        .with_observer(handlers);
    stop_on_ctrl_c(session.stop_handle());

    let outcome = session.run().await?;
    log_session_end(&outcome);
    info!(final_sum = session.model().current().sum, "adder final state");
    Ok(())
}

/// Drive the adder against an exported brain.
async fn run_exported_brain(cli: &Cli) -> anyhow::Result<()> {
    let mut config = ExportedBrainConfig::new("")
        .with_env()?
        .with_logging(cli.enable_logging);
    if let Some(url) = &cli.exported_brain_url {
        config.url.clone_from(url);
    }
    info!(
        url = %config.url,
        client_credentials = config.credentials.is_some(),
        "exported brain configuration loaded"
    );

    let mut brain = PredictionLoop::new(config, AdderModel::new(cli.episode_length))?;
    if let Some(iterations) = cli.iterations {
        brain = brain.with_max_iterations(iterations);
    }
    stop_on_ctrl_c(brain.stop_handle());

    let outcome = brain.run().await?;
    log_prediction_end(&outcome);
    info!(final_sum = brain.model().current().sum, "adder final state");
    Ok(())
}

/// Request a stop when the process receives Ctrl-C.
fn stop_on_ctrl_c(stop: StopHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping");
                stop.request_stop();
            }
            Err(err) => warn!(error = %err, "failed to listen for Ctrl-C"),
        }
    });
}

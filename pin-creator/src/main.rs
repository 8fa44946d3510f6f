use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use pin_creator::config::{LoggingConfig, RunConfig};
use pin_creator::observability::init_logging;
use pin_creator::prelude::*;

#[derive(Debug, Parser)]
#[command(
    name = "pin-creator",
    version,
    about = "Publishes the next scheduled pin to Pinterest"
)]
struct Cli {
    /// Path of the YAML configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PinCreatorError>() {
                Some(err) => error!(
                    kind = %err.kind(),
                    stage = ?err.stage(),
                    "{}: {err}",
                    err.summary()
                ),
                None => error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<PublishOutcome> {
    let config = RunConfig::load(&cli.config);
    let fallback_logging = LoggingConfig::default();
    init_logging(config.as_ref().map_or(&fallback_logging, |c| &c.logging));
    let config = config?;

    info!(
        path = %config.schedule_file_path.display(),
        "Checking for pins to create"
    );

    let token = load_access_token(&config.auth)?;
    let api = Arc::new(
        PinterestClient::new(&config.api, token).context("building the Pinterest client")?,
    );
    let store = Arc::new(CsvScheduleStore::new(config.schedule_file_path.clone()));
    let orchestrator = PublishOrchestrator::from_config(&config, store, api, Arc::new(TokioClock));

    let ctx = RunContext::new().with_timeout(Instant::now(), config.timeouts.run());
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel("interrupted by user");
        }
    });

    let outcome = orchestrator.run(&ctx).await?;
    if let PublishOutcome::Published { entry, pin, .. } = &outcome {
        info!(index = entry.index, pin_id = %pin.id, "Schedule entry published");
    }
    Ok(outcome)
}

//! Binary entry point for the `vastrent` CLI.

use std::io::{self, Write};
use std::process;

use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vastrent::report::{CLI_NAME, write_advisory, write_instance};
use vastrent::{
    CancelFlag, InstanceId, Marketplace, MarketplaceConfig, RentalConfig, RentalOrchestrator,
    RentalOutcome, VastError, VastMarketplace,
};

mod cli;

use cli::{Cli, InstanceCommand, RentCommand};

const DEFAULT_LOG_FILTER: &str = "vastrent=info,warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("marketplace error: {0}")]
    Marketplace(#[from] VastError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Rent(args) => exec_rent(&args).await,
        Cli::Status(args) => exec_status(&args).await,
        Cli::Stop(args) => exec_stop(&args).await,
        Cli::Destroy(args) => exec_destroy(&args).await,
    }
}

async fn exec_rent(args: &RentCommand) -> Result<i32, CliError> {
    let marketplace_config = load_marketplace_config()?;
    let mut rental_config =
        RentalConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    apply_overrides(&mut rental_config, args);
    let plan = rental_config
        .plan()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let marketplace = VastMarketplace::new(&marketplace_config)?;
    let cancel = CancelFlag::new();
    spawn_interrupt_listener(cancel.clone());

    let orchestrator = RentalOrchestrator::new(marketplace, plan.selection)
        .with_poll_policy(plan.poll)
        .with_cancel_flag(cancel);
    let outcome = orchestrator.execute(&plan.criteria, &plan.instance).await;

    emit_advisory(io::stdout(), io::stderr(), &outcome);
    Ok(outcome.exit_code())
}

async fn exec_status(args: &InstanceCommand) -> Result<i32, CliError> {
    let marketplace = connect()?;
    let instance = marketplace.get_instance(&InstanceId::new(args.id)).await?;
    write_instance(io::stdout(), &instance).ok();
    Ok(0)
}

async fn exec_stop(args: &InstanceCommand) -> Result<i32, CliError> {
    let marketplace = connect()?;
    let id = InstanceId::new(args.id);
    marketplace.stop(&id).await?;
    let mut stdout = io::stdout();
    writeln!(stdout, "Instance {id} stopped.").ok();
    writeln!(
        stdout,
        "Storage is still billed until you run: {CLI_NAME} destroy {id}"
    )
    .ok();
    Ok(0)
}

async fn exec_destroy(args: &InstanceCommand) -> Result<i32, CliError> {
    let marketplace = connect()?;
    let id = InstanceId::new(args.id);
    marketplace.destroy(&id).await?;
    writeln!(io::stdout(), "Instance {id} destroyed.").ok();
    Ok(0)
}

fn load_marketplace_config() -> Result<MarketplaceConfig, CliError> {
    let config = MarketplaceConfig::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    Ok(config)
}

fn connect() -> Result<VastMarketplace, CliError> {
    let config = load_marketplace_config()?;
    Ok(VastMarketplace::new(&config)?)
}

fn apply_overrides(config: &mut RentalConfig, args: &RentCommand) {
    if let Some(gpus) = args.gpus {
        config.gpu_count = gpus;
    }
    if let Some(image) = &args.image {
        config.image.clone_from(image);
    }
    if let Some(disk) = args.disk {
        config.disk_gb = disk;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(interval) = args.poll_interval {
        config.poll_interval_secs = interval;
    }
    if args.bid_price.is_some() {
        config.bid_price = args.bid_price;
    }
    if args.template.is_some() {
        config.template_ref.clone_from(&args.template);
    }
    if args.no_jupyter {
        config.jupyter = false;
    }
    if let Some(name) = args.strategy.and_then(|strategy| strategy.to_possible_value()) {
        config.strategy = name.get_name().to_owned();
    }
}

fn spawn_interrupt_listener(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current step");
            cancel.raise();
        }
    });
}

/// Writes the advisory to `primary`, or to `fallback` when that write fails.
fn emit_advisory(primary: impl Write, fallback: impl Write, outcome: &RentalOutcome) {
    if let Err(err) = write_advisory(primary, outcome) {
        error!(
            instance_id = ?outcome.instance_id(),
            error = %err,
            "failed to write the rental advisory to stdout"
        );
        write_advisory(fallback, outcome).ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

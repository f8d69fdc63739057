//! Command-line interface definitions for the `vastrent` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `vastrent` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vastrent",
    about = "Rent a GPU instance on Vast.ai and wait until it is reachable",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Search, rent the selected offer, and wait until it is ready.
    #[command(
        name = "rent",
        about = "Search, rent the selected offer, and wait until it is ready"
    )]
    Rent(RentCommand),
    /// Show the current status of an instance.
    #[command(name = "status", about = "Show the current status of an instance")]
    Status(InstanceCommand),
    /// Stop an instance. Storage is still billed until it is destroyed.
    #[command(
        name = "stop",
        about = "Stop an instance (storage is billed until destroyed)"
    )]
    Stop(InstanceCommand),
    /// Destroy an instance and release all its resources.
    #[command(name = "destroy", about = "Destroy an instance and release its resources")]
    Destroy(InstanceCommand),
}

/// Arguments for the `vastrent rent` subcommand.
///
/// Every flag overrides the matching value from `vastrent.toml` or the
/// `VASTRENT_*` environment for this run only.
#[derive(Debug, Default, Parser)]
pub(crate) struct RentCommand {
    /// Number of GPUs the machine must offer.
    #[arg(long, value_name = "COUNT")]
    pub(crate) gpus: Option<u32>,
    /// Container image to run.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Disk allocation in gigabytes.
    #[arg(long, value_name = "GB")]
    pub(crate) disk: Option<u32>,
    /// Maximum number of status checks while waiting for readiness.
    #[arg(long, value_name = "COUNT")]
    pub(crate) max_attempts: Option<u32>,
    /// Seconds to wait between status checks.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) poll_interval: Option<u64>,
    /// Bid price in dollars per hour for an interruptible rental.
    #[arg(long, value_name = "PRICE")]
    pub(crate) bid_price: Option<f64>,
    /// Marketplace template hash to start from.
    #[arg(long, value_name = "HASH")]
    pub(crate) template: Option<String>,
    /// Launch the instance with SSH only, without JupyterLab.
    #[arg(long)]
    pub(crate) no_jupyter: bool,
    /// How to choose among the matching offers.
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub(crate) strategy: Option<StrategyArg>,
}

/// Offer selection strategies accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum StrategyArg {
    /// First offer in price-ascending order.
    Cheapest,
    /// Lowest price per GPU.
    BestValue,
}

/// Arguments for subcommands that act on one instance.
#[derive(Debug, Parser)]
pub(crate) struct InstanceCommand {
    /// Instance identifier printed by `vastrent rent`.
    #[arg(value_name = "INSTANCE_ID")]
    pub(crate) id: u64,
}

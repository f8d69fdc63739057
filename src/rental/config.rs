//! Rental settings loaded via `ortho-config`.
//!
//! [`RentalConfig`] holds the search filter, the container settings and the
//! polling budget as flat, statically named fields. Values merge defaults,
//! configuration files and `VASTRENT_*` environment variables; the CLI
//! applies its own overrides on top before calling [`RentalConfig::plan`].

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::marketplace::{
    DEFAULT_GPU_COUNT, DEFAULT_MIN_BID_PRICE, DEFAULT_MIN_DIRECT_PORTS, DEFAULT_MIN_RELIABILITY,
    InstanceConfig, SearchCriteria, SortOrder, ValidationError,
};

use super::env::{EnvParseError, parse_env_vars};
use super::poll::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollPolicy};
use super::select::{SelectionPolicy, UnknownPolicy};

/// Default container image.
pub const DEFAULT_IMAGE: &str = "pytorch/pytorch:2.0.0-cuda11.7-cudnn8-runtime";
/// Default disk allocation in gigabytes.
pub const DEFAULT_DISK_GB: u32 = 10;

/// Search, container and polling settings for one rental.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq)]
#[ortho_config(
    prefix = "VASTRENT",
    discovery(
        app_name = "vastrent",
        env_var = "VASTRENT_CONFIG_PATH",
        config_file_name = "vastrent.toml",
        dotfile_name = ".vastrent.toml",
        project_file_name = "vastrent.toml"
    )
)]
pub struct RentalConfig {
    /// Exact number of GPUs to rent.
    #[ortho_config(default = DEFAULT_GPU_COUNT)]
    pub gpu_count: u32,
    /// Minimum bid price in dollars per hour.
    #[ortho_config(default = DEFAULT_MIN_BID_PRICE)]
    pub min_bid_price: f64,
    /// Upstream ordering (`price-asc`, `price-desc`, `reliability-desc`,
    /// `performance-desc`).
    #[ortho_config(default = "price-asc".to_owned())]
    pub sort_order: String,
    /// Minimum host reliability in `[0, 1]`.
    #[ortho_config(default = DEFAULT_MIN_RELIABILITY)]
    pub min_reliability: f64,
    /// Minimum number of directly reachable ports.
    #[ortho_config(default = DEFAULT_MIN_DIRECT_PORTS)]
    pub min_direct_ports: u32,
    /// Whether machines flagged as external may be rented.
    #[ortho_config(default = false)]
    pub external_allowed: bool,
    /// Container image reference.
    #[ortho_config(default = DEFAULT_IMAGE.to_owned())]
    pub image: String,
    /// Disk allocation in gigabytes.
    #[ortho_config(default = DEFAULT_DISK_GB)]
    pub disk_gb: u32,
    /// Whether to launch JupyterLab.
    #[ortho_config(default = true)]
    pub jupyter: bool,
    /// Environment variables as `KEY=VALUE,KEY2="quoted, value"`.
    pub env_vars: Option<String>,
    /// Command run when the container starts.
    pub startup_command: Option<String>,
    /// Marketplace template hash to start from.
    pub template_ref: Option<String>,
    /// Bid price for interruptible rentals; unset rents on demand.
    pub bid_price: Option<f64>,
    /// Registry login for private images.
    pub login: Option<String>,
    /// Label attached to the instance.
    pub label: Option<String>,
    /// Offer selection strategy (`cheapest` or `best-value`).
    #[ortho_config(default = "cheapest".to_owned())]
    pub strategy: String,
    /// Maximum number of status checks while waiting for readiness.
    #[ortho_config(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// Seconds to wait between status checks.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval_secs: u64,
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            gpu_count: DEFAULT_GPU_COUNT,
            min_bid_price: DEFAULT_MIN_BID_PRICE,
            sort_order: SortOrder::PriceAsc.to_string(),
            min_reliability: DEFAULT_MIN_RELIABILITY,
            min_direct_ports: DEFAULT_MIN_DIRECT_PORTS,
            external_allowed: false,
            image: DEFAULT_IMAGE.to_owned(),
            disk_gb: DEFAULT_DISK_GB,
            jupyter: true,
            env_vars: None,
            startup_command: None,
            template_ref: None,
            bid_price: None,
            login: None,
            label: None,
            strategy: SelectionPolicy::Cheapest.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

/// Everything the orchestrator needs, derived from a validated
/// [`RentalConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct RentalPlan {
    /// Offer search filter.
    pub criteria: SearchCriteria,
    /// Container settings for the new instance.
    pub instance: InstanceConfig,
    /// Readiness polling budget.
    pub poll: PollPolicy,
    /// Offer selection strategy.
    pub selection: SelectionPolicy,
}

/// Errors raised while loading or interpreting rental settings.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RentalConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("rental configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when a search or instance setting is invalid.
    #[error("invalid rental configuration: {0}")]
    Invalid(#[from] ValidationError),
    /// Raised when the environment list cannot be parsed.
    #[error("invalid env_vars: {0}")]
    Env(#[from] EnvParseError),
    /// Raised when the selection strategy is unknown.
    #[error("invalid strategy: {0}")]
    Strategy(#[from] UnknownPolicy),
    /// Raised when the polling budget allows no attempts.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

impl RentalConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RentalConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, RentalConfigError> {
        Self::load_from_iter([OsString::from("vastrent")])
            .map_err(|err| RentalConfigError::Parse(err.to_string()))
    }

    /// Builds the search filter.
    ///
    /// # Errors
    ///
    /// Returns [`RentalConfigError::Invalid`] when the sort order is unknown
    /// or a filter is out of range.
    pub fn search_criteria(&self) -> Result<SearchCriteria, RentalConfigError> {
        let criteria = SearchCriteria {
            gpu_count: self.gpu_count,
            min_bid_price: self.min_bid_price,
            sort_order: self.sort_order.parse()?,
            min_reliability: self.min_reliability,
            min_direct_ports: self.min_direct_ports,
            external_allowed: self.external_allowed,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    /// Builds the container settings.
    ///
    /// # Errors
    ///
    /// Returns [`RentalConfigError`] when the environment list is malformed
    /// or the instance settings fail validation.
    pub fn instance_config(&self) -> Result<InstanceConfig, RentalConfigError> {
        let env_vars = match self.env_vars.as_deref() {
            Some(raw) => parse_env_vars(raw)?,
            None => Vec::new(),
        };
        InstanceConfig::builder()
            .image(&self.image)
            .disk_gb(self.disk_gb)
            .enable_jupyter(self.jupyter)
            .env_vars(env_vars)
            .startup_command(self.startup_command.clone())
            .template_ref(self.template_ref.clone())
            .bid_price(self.bid_price)
            .login(self.login.clone())
            .label(self.label.clone())
            .build()
            .map_err(RentalConfigError::from)
    }

    /// Builds the polling budget.
    ///
    /// # Errors
    ///
    /// Returns [`RentalConfigError::ZeroAttempts`] when no attempt is allowed.
    pub const fn poll_policy(&self) -> Result<PollPolicy, RentalConfigError> {
        if self.max_attempts == 0 {
            return Err(RentalConfigError::ZeroAttempts);
        }
        Ok(PollPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.poll_interval_secs),
        ))
    }

    /// Checks every setting without keeping the derived plan.
    ///
    /// # Errors
    ///
    /// Returns the first [`RentalConfigError`] encountered.
    pub fn validate(&self) -> Result<(), RentalConfigError> {
        self.plan().map(|_| ())
    }

    /// Validates every setting and derives the [`RentalPlan`].
    ///
    /// # Errors
    ///
    /// Returns the first [`RentalConfigError`] encountered.
    pub fn plan(&self) -> Result<RentalPlan, RentalConfigError> {
        Ok(RentalPlan {
            criteria: self.search_criteria()?,
            instance: self.instance_config()?,
            poll: self.poll_policy()?,
            selection: self.strategy.parse()?,
        })
    }
}

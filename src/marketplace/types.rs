//! Value types exchanged with the marketplace.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Default number of GPUs requested per offer.
pub const DEFAULT_GPU_COUNT: u32 = 1;
/// Default minimum bid price in dollars per hour.
pub const DEFAULT_MIN_BID_PRICE: f64 = 0.05;
/// Default minimum host reliability score.
pub const DEFAULT_MIN_RELIABILITY: f64 = 0.95;
/// Default number of directly reachable ports required.
pub const DEFAULT_MIN_DIRECT_PORTS: u32 = 1;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw marketplace identifier.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a rentable offer (an "ask" in marketplace terms).
    OfferId
);
numeric_id!(
    /// Identifier assigned to an instance when it is created.
    InstanceId
);

/// Errors raised when request values are missing or out of range.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Raised when a required field is empty.
    #[error("missing or empty field: {0}")]
    Missing(String),
    /// Raised when a field holds a value outside its accepted range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Raised when a sort order name is not recognised.
    #[error("unknown sort order '{0}' (expected price-asc, price-desc, reliability-desc or performance-desc)")]
    UnknownSortOrder(String),
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Ordering requested from the upstream search endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortOrder {
    /// Cheapest offers first.
    #[default]
    PriceAsc,
    /// Most expensive offers first.
    PriceDesc,
    /// Most reliable hosts first.
    ReliabilityDesc,
    /// Highest deep-learning performance score first.
    PerformanceDesc,
}

impl SortOrder {
    /// Upstream field the ordering applies to.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::PriceAsc | Self::PriceDesc => "dph_total",
            Self::ReliabilityDesc => "reliability2",
            Self::PerformanceDesc => "dlperf",
        }
    }

    /// Upstream direction keyword.
    #[must_use]
    pub const fn direction(self) -> &'static str {
        match self {
            Self::PriceAsc => "asc",
            Self::PriceDesc | Self::ReliabilityDesc | Self::PerformanceDesc => "desc",
        }
    }

    /// Returns `true` when the ordering is keyed on price.
    #[must_use]
    pub const fn is_price_based(self) -> bool {
        matches!(self, Self::PriceAsc | Self::PriceDesc)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::ReliabilityDesc => "reliability-desc",
            Self::PerformanceDesc => "performance-desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price-asc" | "price" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            "reliability-desc" | "reliability" => Ok(Self::ReliabilityDesc),
            "performance-desc" | "performance" => Ok(Self::PerformanceDesc),
            _ => Err(ValidationError::UnknownSortOrder(value.to_owned())),
        }
    }
}

/// Filter applied when searching for offers. Built once per run.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCriteria {
    /// Exact number of GPUs the machine must offer.
    pub gpu_count: u32,
    /// Minimum bid price in dollars per hour.
    pub min_bid_price: f64,
    /// Ordering requested from the marketplace.
    pub sort_order: SortOrder,
    /// Minimum host reliability score in `[0, 1]`.
    pub min_reliability: f64,
    /// Minimum number of directly reachable ports.
    pub min_direct_ports: u32,
    /// Whether machines flagged as external may be returned.
    pub external_allowed: bool,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            gpu_count: DEFAULT_GPU_COUNT,
            min_bid_price: DEFAULT_MIN_BID_PRICE,
            sort_order: SortOrder::PriceAsc,
            min_reliability: DEFAULT_MIN_RELIABILITY,
            min_direct_ports: DEFAULT_MIN_DIRECT_PORTS,
            external_allowed: false,
        }
    }
}

impl SearchCriteria {
    /// Checks that every numeric filter is within range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Invalid`] for a zero GPU count, a negative
    /// or non-finite bid, or a reliability outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.gpu_count == 0 {
            return Err(ValidationError::invalid(
                "gpu_count",
                "must be at least 1",
            ));
        }
        if !(self.min_bid_price.is_finite() && self.min_bid_price >= 0.0) {
            return Err(ValidationError::invalid(
                "min_bid_price",
                format!("must be a non-negative price, got {}", self.min_bid_price),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_reliability) {
            return Err(ValidationError::invalid(
                "min_reliability",
                format!("must be between 0 and 1, got {}", self.min_reliability),
            ));
        }
        Ok(())
    }
}

/// A rentable machine advertised by the marketplace.
#[derive(Clone, Debug, PartialEq)]
pub struct Offer {
    /// Offer identifier used when provisioning.
    pub id: OfferId,
    /// Total price in dollars per hour.
    pub price_per_hour: f64,
    /// GPU model name, for example `RTX 4090`.
    pub gpu_name: String,
    /// Number of GPUs on the machine.
    pub gpu_count: u32,
}

impl Offer {
    /// Hourly price divided across the machine's GPUs.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "price per GPU is a ratio of two positive quantities"
    )]
    pub fn price_per_gpu(&self) -> f64 {
        self.price_per_hour / f64::from(self.gpu_count.max(1))
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "#{}: {} ({}x) at ${:.4}/hr",
            self.id, self.gpu_name, self.gpu_count, self.price_per_hour
        )
    }
}

/// Settings applied to the container started on the rented machine.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceConfig {
    /// Container image reference.
    pub image: String,
    /// Disk allocation in gigabytes.
    pub disk_gb: u32,
    /// Whether to launch JupyterLab alongside SSH.
    pub enable_jupyter: bool,
    /// Environment variables in the order they were declared.
    pub env_vars: Vec<(String, String)>,
    /// Command executed once the container starts.
    pub startup_command: Option<String>,
    /// Marketplace template to derive settings from.
    pub template_ref: Option<String>,
    /// Bid price for interruptible rentals; `None` rents on demand.
    pub bid_price: Option<f64>,
    /// Registry login used to pull a private image.
    pub login: Option<String>,
    /// Label attached to the instance for identification.
    pub label: Option<String>,
}

impl InstanceConfig {
    /// Starts a builder for an [`InstanceConfig`].
    #[must_use]
    pub fn builder() -> InstanceConfigBuilder {
        InstanceConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the image is empty, the disk size is
    /// zero, an environment key is malformed, or the bid price is negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.image.is_empty() {
            return Err(ValidationError::Missing("image".to_owned()));
        }
        if self.disk_gb == 0 {
            return Err(ValidationError::invalid("disk_gb", "must be at least 1"));
        }
        for (key, _) in &self.env_vars {
            if key.is_empty() || key.contains(|ch: char| ch == '=' || ch.is_whitespace()) {
                return Err(ValidationError::invalid(
                    "env_vars",
                    format!("invalid variable name '{key}'"),
                ));
            }
        }
        if let Some(price) = self.bid_price
            && !(price.is_finite() && price >= 0.0)
        {
            return Err(ValidationError::invalid(
                "bid_price",
                format!("must be a non-negative price, got {price}"),
            ));
        }
        Ok(())
    }
}

/// Builder for [`InstanceConfig`] that trims inputs and validates on build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceConfigBuilder {
    image: String,
    disk_gb: u32,
    enable_jupyter: bool,
    env_vars: Vec<(String, String)>,
    startup_command: Option<String>,
    template_ref: Option<String>,
    bid_price: Option<f64>,
    login: Option<String>,
    label: Option<String>,
}

impl InstanceConfigBuilder {
    /// Creates an empty builder; the image and disk size must be set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the container image.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = value.into();
        self
    }

    /// Sets the disk size in gigabytes.
    #[must_use]
    pub const fn disk_gb(mut self, value: u32) -> Self {
        self.disk_gb = value;
        self
    }

    /// Enables or disables JupyterLab.
    #[must_use]
    pub const fn enable_jupyter(mut self, value: bool) -> Self {
        self.enable_jupyter = value;
        self
    }

    /// Appends an environment variable.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Replaces the environment variables.
    #[must_use]
    pub fn env_vars(mut self, vars: Vec<(String, String)>) -> Self {
        self.env_vars = vars;
        self
    }

    /// Sets the startup command.
    #[must_use]
    pub fn startup_command(mut self, value: Option<String>) -> Self {
        self.startup_command = value;
        self
    }

    /// Sets the template reference.
    #[must_use]
    pub fn template_ref(mut self, value: Option<String>) -> Self {
        self.template_ref = value;
        self
    }

    /// Sets the bid price.
    #[must_use]
    pub const fn bid_price(mut self, value: Option<f64>) -> Self {
        self.bid_price = value;
        self
    }

    /// Sets the registry login.
    #[must_use]
    pub fn login(mut self, value: Option<String>) -> Self {
        self.login = value;
        self
    }

    /// Sets the instance label.
    #[must_use]
    pub fn label(mut self, value: Option<String>) -> Self {
        self.label = value;
        self
    }

    /// Builds and validates the [`InstanceConfig`]. Blank optional strings
    /// are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when validation fails.
    pub fn build(self) -> Result<InstanceConfig, ValidationError> {
        let config = InstanceConfig {
            image: self.image.trim().to_owned(),
            disk_gb: self.disk_gb,
            enable_jupyter: self.enable_jupyter,
            env_vars: self
                .env_vars
                .into_iter()
                .map(|(key, value)| (key.trim().to_owned(), value))
                .collect(),
            startup_command: non_blank(self.startup_command),
            template_ref: non_blank(self.template_ref),
            bid_price: self.bid_price,
            login: non_blank(self.login),
            label: non_blank(self.label),
        };
        config.validate()?;
        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Creation request derived from a chosen offer.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionRequest {
    /// Offer being rented.
    pub offer_id: OfferId,
    /// Container settings for the new instance.
    pub config: InstanceConfig,
}

impl ProvisionRequest {
    /// Pairs the chosen offer with the instance configuration.
    #[must_use]
    pub const fn new(offer: &Offer, config: InstanceConfig) -> Self {
        Self {
            offer_id: offer.id,
            config,
        }
    }
}

/// Lifecycle state reported for an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// Created but still scheduling, pulling, or booting.
    Provisioning,
    /// Booted and running.
    Running,
    /// Stopped or exited.
    Stopped,
    /// The marketplace reports a failure for this instance.
    Error,
    /// A status string this client does not recognise.
    Unknown(String),
}

impl InstanceStatus {
    /// Maps the upstream `actual_status` string. A missing status means the
    /// instance has not started booting yet.
    #[must_use]
    pub fn from_upstream(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Provisioning;
        };
        match value.to_ascii_lowercase().as_str() {
            "created" | "loading" | "scheduling" | "provisioning" | "starting" => {
                Self::Provisioning
            }
            "running" => Self::Running,
            "exited" | "stopped" | "stopping" | "offline" => Self::Stopped,
            "error" | "failed" => Self::Error,
            _ => Self::Unknown(value.to_owned()),
        }
    }

    /// Human readable name of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How to reach an instance once it is running.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionInfo {
    /// SSH host name or address.
    pub ssh_host: Option<String>,
    /// SSH port.
    pub ssh_port: Option<u16>,
    /// Web UI (JupyterLab) URL when one is exposed.
    pub web_url: Option<String>,
}

impl ConnectionInfo {
    /// Returns the SSH host and port when both are known.
    #[must_use]
    pub fn ssh_endpoint(&self) -> Option<(&str, u16)> {
        match (self.ssh_host.as_deref(), self.ssh_port) {
            (Some(host), Some(port)) if !host.is_empty() => Some((host, port)),
            _ => None,
        }
    }

    /// Returns `true` when the instance can be reached over SSH or the web UI.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.ssh_endpoint().is_some() || self.web_url.is_some()
    }
}

/// Snapshot of a rented instance as last observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Identifier assigned at creation.
    pub id: InstanceId,
    /// Last reported lifecycle state.
    pub status: InstanceStatus,
    /// Connection details known so far.
    pub connection: ConnectionInfo,
}

impl Instance {
    /// Returns `true` when the instance is running and reachable.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == InstanceStatus::Running && self.connection.is_reachable()
    }
}

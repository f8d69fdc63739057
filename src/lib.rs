//! Core library for the `vastrent` GPU rental tool.
//!
//! The crate exposes a marketplace abstraction for renting GPU instances, a
//! Vast.ai implementation of it, and the rental workflow that drives a run
//! from offer search to a ready instance (search → select → provision →
//! poll until reachable). Every run ends in a [`RentalOutcome`] that the
//! [`report`] module turns into operator guidance, including cleanup
//! commands whenever an instance may still be billed.

pub mod config;
pub mod marketplace;
pub mod rental;
pub mod report;
pub mod test_support;
pub mod vast;

pub use config::{ConfigError, MarketplaceConfig};
pub use marketplace::{
    ConnectionInfo, Instance, InstanceConfig, InstanceConfigBuilder, InstanceId, InstanceStatus,
    Marketplace, MarketplaceFuture, Offer, OfferId, ProvisionRequest, SearchCriteria, SortOrder,
    Transient, ValidationError,
};
pub use rental::{
    CancelFlag, PollPolicy, RentalConfig, RentalConfigError, RentalOrchestrator, RentalOutcome,
    RentalPlan, SelectionPolicy, SelectionStrategy,
};
pub use vast::{VastError, VastMarketplace};

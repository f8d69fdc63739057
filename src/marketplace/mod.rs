//! Marketplace abstraction consumed by the rental workflow.
//!
//! The orchestrator only ever talks to the marketplace through the
//! [`Marketplace`] trait so the HTTP client can be swapped for a scripted
//! double in tests.

use std::future::Future;
use std::pin::Pin;

mod types;

pub use types::{
    ConnectionInfo, DEFAULT_GPU_COUNT, DEFAULT_MIN_BID_PRICE, DEFAULT_MIN_DIRECT_PORTS,
    DEFAULT_MIN_RELIABILITY, Instance, InstanceConfig, InstanceConfigBuilder, InstanceId,
    InstanceStatus, Offer, OfferId, ProvisionRequest, SearchCriteria, SortOrder, ValidationError,
};

/// Future returned by marketplace operations.
pub type MarketplaceFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Classifies a failure as worth retrying or final.
///
/// Readiness polling retries transient failures within its attempt budget
/// and gives up immediately on anything else.
pub trait Transient {
    /// Returns `true` when retrying the same call may succeed.
    fn is_transient(&self) -> bool;
}

/// Operations offered by a compute marketplace.
pub trait Marketplace {
    /// Provider specific error type returned by the marketplace.
    type Error: std::error::Error + Transient + Send + Sync + 'static;

    /// Returns the offers matching `criteria` in upstream order.
    fn search<'a>(
        &'a self,
        criteria: &'a SearchCriteria,
    ) -> MarketplaceFuture<'a, Vec<Offer>, Self::Error>;

    /// Rents the offer named in `request` and returns the new instance id.
    ///
    /// Billing starts as soon as this succeeds. Implementations must not
    /// retry the creation call.
    fn provision<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> MarketplaceFuture<'a, InstanceId, Self::Error>;

    /// Fetches the current state of an instance.
    fn get_instance<'a>(&'a self, id: &'a InstanceId)
    -> MarketplaceFuture<'a, Instance, Self::Error>;

    /// Stops a running instance. Storage charges continue until destroyed.
    fn stop<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error>;

    /// Destroys an instance and releases every resource attached to it.
    fn destroy<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error>;
}

//! Orchestrates a single rental from search to readiness.
//!
//! The workflow runs strictly in order: search for offers, select one,
//! provision an instance on it, then poll until the instance is ready. Every
//! exit path is expressed as a [`RentalOutcome`]; once an instance exists its
//! identifier travels with the outcome so the caller can always print cleanup
//! instructions. Nothing is stopped or destroyed automatically.

mod config;
mod env;
mod guard;
mod outcome;
mod poll;
mod select;

use tracing::{info, warn};

use crate::marketplace::{InstanceConfig, Marketplace, ProvisionRequest, SearchCriteria};
use guard::InstanceGuard;

pub use config::{DEFAULT_DISK_GB, DEFAULT_IMAGE, RentalConfig, RentalConfigError, RentalPlan};
pub use env::{EnvParseError, parse_env_vars};
pub use outcome::{
    EXIT_INTERRUPTED, EXIT_NO_OFFERS, EXIT_POLLING_ABORTED, EXIT_PROVISIONING_FAILED,
    EXIT_SEARCH_FAILED, EXIT_TIMED_OUT, RentalOutcome,
};
pub use poll::{
    CancelFlag, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, Pause, PauseFuture, PollPolicy,
    PollResult, ReadinessPoller, TokioPause,
};
pub use select::{BestValue, CheapestFirst, SelectionPolicy, SelectionStrategy, UnknownPolicy};

/// Runs the rental workflow against a marketplace.
#[derive(Debug)]
pub struct RentalOrchestrator<M, S, P = TokioPause> {
    marketplace: M,
    strategy: S,
    pause: P,
    policy: PollPolicy,
    cancel: CancelFlag,
}

impl<M, S> RentalOrchestrator<M, S, TokioPause> {
    /// Creates an orchestrator that pauses with the tokio timer and uses the
    /// default polling budget.
    #[must_use]
    pub fn new(marketplace: M, strategy: S) -> Self {
        Self {
            marketplace,
            strategy,
            pause: TokioPause,
            policy: PollPolicy::default(),
            cancel: CancelFlag::new(),
        }
    }
}

impl<M, S, P> RentalOrchestrator<M, S, P> {
    /// Replaces the suspension used between poll attempts.
    ///
    /// Tests use this to count pauses without sleeping.
    #[must_use]
    pub fn with_pause<Q>(self, pause: Q) -> RentalOrchestrator<M, S, Q> {
        RentalOrchestrator {
            marketplace: self.marketplace,
            strategy: self.strategy,
            pause,
            policy: self.policy,
            cancel: self.cancel,
        }
    }

    /// Overrides the readiness polling budget.
    #[must_use]
    pub const fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares a cancel flag with the caller, observed between poll attempts.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the marketplace the orchestrator talks to.
    #[must_use]
    pub const fn marketplace(&self) -> &M {
        &self.marketplace
    }
}

impl<M, S, P> RentalOrchestrator<M, S, P>
where
    M: Marketplace,
    S: SelectionStrategy,
    P: Pause,
{
    /// Runs search, selection, provisioning and readiness polling.
    ///
    /// Never fails: every fault becomes a [`RentalOutcome`] variant, and any
    /// variant produced after provisioning carries the instance identifier.
    pub async fn execute(
        &self,
        criteria: &SearchCriteria,
        config: &InstanceConfig,
    ) -> RentalOutcome {
        let offers = match self.marketplace.search(criteria).await {
            Ok(offers) => offers,
            Err(err) => {
                warn!(error = %err, "offer search failed");
                return RentalOutcome::SearchFailed(err.to_string());
            }
        };
        info!(count = offers.len(), "found offers matching criteria");

        let Some(offer) = self.strategy.select(&offers) else {
            return RentalOutcome::NoOffersFound;
        };
        info!(offer = %offer, "selected offer");

        if self.cancel.is_raised() {
            return RentalOutcome::Interrupted {
                instance_id: None,
                last: None,
            };
        }

        let request = ProvisionRequest::new(offer, config.clone());
        let mut guard = InstanceGuard::new();
        let instance_id = match self.marketplace.provision(&request).await {
            Ok(id) => guard.track(id),
            Err(err) => {
                warn!(offer_id = %request.offer_id, error = %err, "provisioning failed");
                return RentalOutcome::ProvisioningFailed(err.to_string());
            }
        };
        info!(instance_id = %instance_id, "instance created");

        let poller =
            ReadinessPoller::new(&self.marketplace, &self.pause, self.policy, &self.cancel);
        let result = poller.wait_until_ready(&instance_id).await;
        guard.release();

        match result {
            PollResult::Ready(instance) => RentalOutcome::Ready(instance),
            PollResult::TimedOut { last, attempts } => RentalOutcome::TimedOutWaiting {
                instance_id,
                last,
                attempts,
            },
            PollResult::Aborted { last, reason } => RentalOutcome::PollingAborted {
                instance_id,
                last,
                reason,
            },
            PollResult::Interrupted { last } => RentalOutcome::Interrupted {
                instance_id: Some(instance_id),
                last,
            },
        }
    }
}

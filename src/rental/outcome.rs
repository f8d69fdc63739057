//! Terminal results of a rental run.

use crate::marketplace::{Instance, InstanceId};

/// Process exit code for a workflow that ended without finding offers.
pub const EXIT_NO_OFFERS: i32 = 2;
/// Process exit code for a failed offer search.
pub const EXIT_SEARCH_FAILED: i32 = 3;
/// Process exit code for a rejected provisioning request.
pub const EXIT_PROVISIONING_FAILED: i32 = 4;
/// Process exit code for an instance that never became ready.
pub const EXIT_TIMED_OUT: i32 = 5;
/// Process exit code for polling stopped by a non-transient failure.
pub const EXIT_POLLING_ABORTED: i32 = 6;
/// Process exit code for an operator interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// The single value a rental run returns to its caller.
///
/// Every variant produced after provisioning succeeded carries the
/// instance identifier so the operator can always be told what to clean up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RentalOutcome {
    /// The instance is running and reachable.
    Ready(Instance),
    /// The search returned no offers; nothing was rented.
    NoOffersFound,
    /// The search itself failed; nothing was rented.
    SearchFailed(String),
    /// The marketplace rejected the creation request. The reason is the
    /// upstream text, unmodified.
    ProvisioningFailed(String),
    /// The instance did not become ready within the attempt budget.
    TimedOutWaiting {
        /// Instance that is still billed.
        instance_id: InstanceId,
        /// Last snapshot read before giving up.
        last: Option<Instance>,
        /// Number of status fetches performed.
        attempts: u32,
    },
    /// Polling stopped early on a non-transient failure.
    PollingAborted {
        /// Instance that may still be billed.
        instance_id: InstanceId,
        /// Last snapshot read before the failure.
        last: Option<Instance>,
        /// Description of the failure.
        reason: String,
    },
    /// The operator interrupted the run.
    Interrupted {
        /// Instance created before the interrupt, if any.
        instance_id: Option<InstanceId>,
        /// Last snapshot read before the interrupt.
        last: Option<Instance>,
    },
}

impl RentalOutcome {
    /// Identifier of the rented instance, when one was created.
    #[must_use]
    pub const fn instance_id(&self) -> Option<InstanceId> {
        match self {
            Self::Ready(instance) => Some(instance.id),
            Self::TimedOutWaiting { instance_id, .. } | Self::PollingAborted { instance_id, .. } => {
                Some(*instance_id)
            }
            Self::Interrupted { instance_id, .. } => *instance_id,
            Self::NoOffersFound | Self::SearchFailed(_) | Self::ProvisioningFailed(_) => None,
        }
    }

    /// Returns `true` for [`RentalOutcome::Ready`].
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Last observed snapshot of the instance, when one was read.
    #[must_use]
    pub const fn last_snapshot(&self) -> Option<&Instance> {
        match self {
            Self::Ready(instance) => Some(instance),
            Self::TimedOutWaiting { last, .. }
            | Self::PollingAborted { last, .. }
            | Self::Interrupted { last, .. } => last.as_ref(),
            Self::NoOffersFound | Self::SearchFailed(_) | Self::ProvisioningFailed(_) => None,
        }
    }

    /// Process exit code for this outcome: zero only when ready.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Ready(_) => 0,
            Self::NoOffersFound => EXIT_NO_OFFERS,
            Self::SearchFailed(_) => EXIT_SEARCH_FAILED,
            Self::ProvisioningFailed(_) => EXIT_PROVISIONING_FAILED,
            Self::TimedOutWaiting { .. } => EXIT_TIMED_OUT,
            Self::PollingAborted { .. } => EXIT_POLLING_ABORTED,
            Self::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }
}

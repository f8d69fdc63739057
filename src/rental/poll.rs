//! Readiness polling for freshly provisioned instances.
//!
//! The poller fetches the instance status a bounded number of times with a
//! fixed pause in between. "Not running yet" and "the read failed
//! transiently" both lead to another attempt; a non-transient read failure
//! or an instance in the error state ends polling at once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::marketplace::{Instance, InstanceId, InstanceStatus, Marketplace, Transient};

/// Default number of status fetches before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
/// Default pause between status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Attempt budget and fixed interval used while waiting for readiness.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Maximum number of status fetches.
    pub max_attempts: u32,
    /// Pause between consecutive fetches.
    pub interval: Duration,
}

impl PollPolicy {
    /// Creates a policy with an explicit budget and interval.
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

/// Future returned by [`Pause::pause`].
pub type PauseFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Suspension point between poll attempts.
pub trait Pause {
    /// Suspends the workflow for `duration`.
    fn pause(&self, duration: Duration) -> PauseFuture<'_>;
}

/// Pauses with the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPause;

impl Pause for TokioPause {
    fn pause(&self, duration: Duration) -> PauseFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Shared flag raised when the operator asks the workflow to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    raised: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    /// Creates a flag that is not raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes any pending pause.
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of waiting for an instance to become ready.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollResult {
    /// The instance is running and reachable.
    Ready(Instance),
    /// The attempt budget ran out first.
    TimedOut {
        /// Last snapshot successfully read, if any.
        last: Option<Instance>,
        /// Number of status fetches performed.
        attempts: u32,
    },
    /// Polling stopped early on a non-transient failure.
    Aborted {
        /// Last snapshot successfully read, if any.
        last: Option<Instance>,
        /// Description of the failure.
        reason: String,
    },
    /// The cancel flag was raised between attempts.
    Interrupted {
        /// Last snapshot successfully read, if any.
        last: Option<Instance>,
    },
}

/// Polls a marketplace until an instance is ready or the budget runs out.
#[derive(Debug)]
pub struct ReadinessPoller<'a, M, P> {
    marketplace: &'a M,
    pause: &'a P,
    policy: PollPolicy,
    cancel: &'a CancelFlag,
}

impl<'a, M, P> ReadinessPoller<'a, M, P>
where
    M: Marketplace,
    P: Pause,
{
    /// Creates a poller over borrowed collaborators.
    #[must_use]
    pub const fn new(
        marketplace: &'a M,
        pause: &'a P,
        policy: PollPolicy,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            marketplace,
            pause,
            policy,
            cancel,
        }
    }

    /// Waits for `id` to become ready.
    ///
    /// Performs at most `max_attempts` fetches and pauses only between
    /// attempts, so a run that never becomes ready pauses
    /// `max_attempts - 1` times.
    pub async fn wait_until_ready(&self, id: &InstanceId) -> PollResult {
        let max_attempts = self.policy.max_attempts;
        let mut last: Option<Instance> = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_raised() {
                return PollResult::Interrupted { last };
            }

            match self.marketplace.get_instance(id).await {
                Ok(instance) => {
                    info!(
                        instance_id = %id,
                        attempt,
                        max_attempts,
                        status = %instance.status,
                        "checked instance status"
                    );
                    if instance.is_ready() {
                        return PollResult::Ready(instance);
                    }
                    if instance.status == InstanceStatus::Error {
                        return PollResult::Aborted {
                            reason: format!("instance {id} reported status {}", instance.status),
                            last: Some(instance),
                        };
                    }
                    last = Some(instance);
                }
                Err(err) if err.is_transient() => {
                    warn!(instance_id = %id, attempt, error = %err, "status check failed, will retry");
                }
                Err(err) => {
                    return PollResult::Aborted {
                        last,
                        reason: err.to_string(),
                    };
                }
            }

            if attempt < max_attempts {
                debug!(interval_secs = self.policy.interval.as_secs(), "instance not ready yet");
                tokio::select! {
                    () = self.pause.pause(self.policy.interval) => {}
                    () = self.cancel.raised() => return PollResult::Interrupted { last },
                }
            }
        }

        PollResult::TimedOut {
            last,
            attempts: max_attempts,
        }
    }
}

//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::marketplace::{
    ConnectionInfo, Instance, InstanceId, InstanceStatus, Marketplace, MarketplaceFuture, Offer,
    OfferId, ProvisionRequest, SearchCriteria, Transient,
};
use crate::rental::{Pause, PauseFuture};

/// Failure returned by [`ScriptedMarketplace`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedError {
    /// A failure the poller should retry.
    #[error("{0}")]
    Transient(String),
    /// A failure that ends the current step.
    #[error("{0}")]
    Fatal(String),
}

impl Transient for ScriptedError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Records a single call made through [`ScriptedMarketplace`].
#[derive(Clone, Debug, PartialEq)]
pub enum MarketplaceCall {
    /// `search` was called with these criteria.
    Search(SearchCriteria),
    /// `provision` was called with this request.
    Provision(ProvisionRequest),
    /// `get_instance` was called for this id.
    GetInstance(InstanceId),
    /// `stop` was called for this id.
    Stop(InstanceId),
    /// `destroy` was called for this id.
    Destroy(InstanceId),
}

#[derive(Debug, Default)]
struct ScriptState {
    search: Option<Result<Vec<Offer>, ScriptedError>>,
    provisions: VecDeque<Result<InstanceId, ScriptedError>>,
    statuses: VecDeque<Result<Instance, ScriptedError>>,
    calls: Vec<MarketplaceCall>,
}

/// Scripted marketplace that answers from pre-seeded queues in FIFO order.
///
/// Clones share state, so a test can keep a handle for assertions after
/// moving a clone into the orchestrator. An exhausted status queue answers
/// with a transient error, which keeps a poller retrying until its budget
/// runs out.
#[derive(Clone, Debug, Default)]
pub struct ScriptedMarketplace {
    state: Arc<StdMutex<ScriptState>>,
}

impl ScriptedMarketplace {
    /// Creates a marketplace with no offers and empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StdMutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the offers returned by every search.
    pub fn set_offers(&self, offers: Vec<Offer>) {
        self.state().search = Some(Ok(offers));
    }

    /// Makes every search fail with `error`.
    pub fn fail_search(&self, error: ScriptedError) {
        self.state().search = Some(Err(error));
    }

    /// Queues the id returned by the next provisioning call.
    pub fn push_provisioned(&self, id: u64) {
        self.state()
            .provisions
            .push_back(Ok(InstanceId::new(id)));
    }

    /// Returns the most recently queued instance id, if any.
    #[must_use]
    pub fn peek_provisioned(&self) -> Option<u64> {
        self.state()
            .provisions
            .iter()
            .rev()
            .find_map(|entry| entry.as_ref().ok().map(|id| id.get()))
    }

    /// Queues a provisioning failure.
    pub fn push_provision_error(&self, error: ScriptedError) {
        self.state().provisions.push_back(Err(error));
    }

    /// Queues a status snapshot.
    pub fn push_status(&self, instance: Instance) {
        self.state().statuses.push_back(Ok(instance));
    }

    /// Queues a failed status read.
    pub fn push_status_error(&self, error: ScriptedError) {
        self.state().statuses.push_back(Err(error));
    }

    /// Returns a snapshot of every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<MarketplaceCall> {
        self.state().calls.clone()
    }

    /// Counts the provisioning calls recorded so far.
    #[must_use]
    pub fn provision_count(&self) -> usize {
        self.count(|call| matches!(call, MarketplaceCall::Provision(_)))
    }

    /// Counts the status reads recorded so far.
    #[must_use]
    pub fn status_count(&self) -> usize {
        self.count(|call| matches!(call, MarketplaceCall::GetInstance(_)))
    }

    /// Returns the provisioning requests recorded so far.
    #[must_use]
    pub fn provision_requests(&self) -> Vec<ProvisionRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MarketplaceCall::Provision(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&MarketplaceCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: MarketplaceCall) {
        self.state().calls.push(call);
    }
}

impl Marketplace for ScriptedMarketplace {
    type Error = ScriptedError;

    fn search<'a>(
        &'a self,
        criteria: &'a SearchCriteria,
    ) -> MarketplaceFuture<'a, Vec<Offer>, Self::Error> {
        Box::pin(async move {
            self.record(MarketplaceCall::Search(criteria.clone()));
            self.state().search.clone().unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    fn provision<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> MarketplaceFuture<'a, InstanceId, Self::Error> {
        Box::pin(async move {
            self.record(MarketplaceCall::Provision(request.clone()));
            self.state().provisions.pop_front().unwrap_or_else(|| {
                Err(ScriptedError::Fatal(String::from(
                    "no scripted provisioning response available",
                )))
            })
        })
    }

    fn get_instance<'a>(
        &'a self,
        id: &'a InstanceId,
    ) -> MarketplaceFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            self.record(MarketplaceCall::GetInstance(*id));
            self.state().statuses.pop_front().unwrap_or_else(|| {
                Err(ScriptedError::Transient(String::from(
                    "no scripted status available",
                )))
            })
        })
    }

    fn stop<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(MarketplaceCall::Stop(*id));
            Ok(())
        })
    }

    fn destroy<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(MarketplaceCall::Destroy(*id));
            Ok(())
        })
    }
}

/// Builds an offer with a single GPU.
#[must_use]
pub fn offer(id: u64, price_per_hour: f64) -> Offer {
    offer_with_gpus(id, price_per_hour, 1)
}

/// Builds an offer with an explicit GPU count.
#[must_use]
pub fn offer_with_gpus(id: u64, price_per_hour: f64, gpu_count: u32) -> Offer {
    Offer {
        id: OfferId::new(id),
        price_per_hour,
        gpu_name: String::from("RTX 4090"),
        gpu_count,
    }
}

/// Builds an instance snapshot without connection details.
#[must_use]
pub fn instance(id: u64, status: InstanceStatus) -> Instance {
    Instance {
        id: InstanceId::new(id),
        status,
        connection: ConnectionInfo::default(),
    }
}

/// Builds a running instance reachable over SSH.
#[must_use]
pub fn running_instance(id: u64, host: &str, port: u16) -> Instance {
    Instance {
        id: InstanceId::new(id),
        status: InstanceStatus::Running,
        connection: ConnectionInfo {
            ssh_host: Some(host.to_owned()),
            ssh_port: Some(port),
            web_url: None,
        },
    }
}

/// Pause that returns immediately and records every requested duration.
#[derive(Clone, Debug, Default)]
pub struct RecordingPause {
    durations: Arc<StdMutex<Vec<Duration>>>,
}

impl RecordingPause {
    /// Creates a pause with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pauses requested so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.durations().len()
    }

    /// Durations requested so far, in call order.
    #[must_use]
    pub fn durations(&self) -> Vec<Duration> {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) -> PauseFuture<'_> {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        Box::pin(std::future::ready(()))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

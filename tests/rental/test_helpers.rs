//! Shared fixtures for rental BDD scenarios.

use std::time::Duration;

use rstest::fixture;
use thiserror::Error;
use vastrent::rental::CancelFlag;
use vastrent::test_support::{RecordingPause, ScriptedMarketplace};
use vastrent::{InstanceConfig, Offer, PollPolicy, RentalOutcome, SearchCriteria, ValidationError};

#[derive(Clone, Debug)]
pub struct RentalContext {
    pub marketplace: ScriptedMarketplace,
    pub pause: RecordingPause,
    pub offers: Vec<Offer>,
    pub criteria: SearchCriteria,
    pub instance: InstanceConfig,
    pub policy: PollPolicy,
    pub cancel: CancelFlag,
    pub outcome: Option<RentalResult>,
}

#[derive(Clone, Debug)]
pub struct RentalResult {
    pub outcome: RentalOutcome,
    pub advisory: String,
}

#[derive(Clone, Debug, Error)]
pub enum RentalTestError {
    #[error(transparent)]
    Config(#[from] ValidationError),
}

#[fixture]
pub fn rental_context_result() -> Result<RentalContext, RentalTestError> {
    build_rental_context()
}

#[fixture]
pub fn rental_context(
    rental_context_result: Result<RentalContext, RentalTestError>,
) -> RentalContext {
    rental_context_result
        .unwrap_or_else(|err| panic!("rental context fixture should initialise: {err}"))
}

pub fn build_rental_context() -> Result<RentalContext, RentalTestError> {
    let instance = InstanceConfig::builder()
        .image("pytorch/pytorch:2.0.0-cuda11.7-cudnn8-runtime")
        .disk_gb(10)
        .enable_jupyter(true)
        .build()?;

    Ok(RentalContext {
        marketplace: ScriptedMarketplace::new(),
        pause: RecordingPause::new(),
        offers: Vec::new(),
        criteria: SearchCriteria::default(),
        instance,
        policy: PollPolicy::new(20, Duration::from_secs(15)),
        cancel: CancelFlag::new(),
        outcome: None,
    })
}

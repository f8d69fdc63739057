//! BDD step definitions for the `vastrent rent` workflow.

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use vastrent::report::write_advisory;
use vastrent::test_support::{
    MarketplaceCall, ScriptedError, instance, offer, running_instance,
};
use vastrent::{InstanceStatus, PollPolicy, RentalOrchestrator, RentalOutcome, SelectionPolicy};

use super::test_helpers::{RentalContext, RentalResult, RentalTestError};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] RentalTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a rental workflow")]
fn rental_workflow(rental_context: RentalContext) -> RentalContext {
    rental_context
}

#[given("an offer \"{id}\" priced at \"{price}\"")]
fn an_offer(mut rental_context: RentalContext, id: u64, price: f64) -> RentalContext {
    rental_context.offers.push(offer(id, price));
    rental_context
}

#[given("the marketplace provisions instance \"{id}\"")]
fn provisions_instance(rental_context: RentalContext, id: u64) -> RentalContext {
    rental_context.marketplace.push_provisioned(id);
    rental_context
}

#[given("provisioning is rejected with \"{reason}\"")]
fn provisioning_rejected(rental_context: RentalContext, reason: String) -> RentalContext {
    rental_context
        .marketplace
        .push_provision_error(ScriptedError::Fatal(reason));
    rental_context
}

#[given("the instance reports provisioning \"{count}\" times")]
fn reports_provisioning(rental_context: RentalContext, count: usize) -> RentalContext {
    let id = provisioned_id(&rental_context);
    for _ in 0..count {
        rental_context
            .marketplace
            .push_status(instance(id, InstanceStatus::Provisioning));
    }
    rental_context
}

#[given("the instance then runs with SSH at \"{host}\" port \"{port}\"")]
fn then_runs(rental_context: RentalContext, host: String, port: u16) -> RentalContext {
    let id = provisioned_id(&rental_context);
    rental_context
        .marketplace
        .push_status(running_instance(id, &host, port));
    rental_context
}

#[given("the instance reports status \"{status}\"")]
fn reports_status(rental_context: RentalContext, status: String) -> RentalContext {
    let id = provisioned_id(&rental_context);
    rental_context
        .marketplace
        .push_status(instance(id, InstanceStatus::from_upstream(Some(&status))));
    rental_context
}

#[given("every status check fails transiently")]
fn status_checks_fail(rental_context: RentalContext) -> RentalContext {
    for _ in 0..rental_context.policy.max_attempts {
        rental_context
            .marketplace
            .push_status_error(ScriptedError::Transient(String::from("HTTP 503")));
    }
    rental_context
}

#[given("the polling budget is \"{attempts}\" attempts")]
fn polling_budget(mut rental_context: RentalContext, attempts: u32) -> RentalContext {
    rental_context.policy = PollPolicy::new(attempts, rental_context.policy.interval);
    rental_context
}

#[given("the operator has interrupted the run")]
fn operator_interrupt(rental_context: RentalContext) -> RentalContext {
    rental_context.cancel.raise();
    rental_context
}

#[when("I run the rental workflow")]
fn run_workflow(rental_context: RentalContext) -> Result<RentalContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    rental_context
        .marketplace
        .set_offers(rental_context.offers.clone());
    let orchestrator =
        RentalOrchestrator::new(rental_context.marketplace.clone(), SelectionPolicy::Cheapest)
            .with_pause(rental_context.pause.clone())
            .with_poll_policy(rental_context.policy)
            .with_cancel_flag(rental_context.cancel.clone());

    let outcome = runtime.block_on(async {
        orchestrator
            .execute(&rental_context.criteria, &rental_context.instance)
            .await
    });
    let mut buffer = Vec::new();
    write_advisory(&mut buffer, &outcome).map_err(|err| StepError::Assertion(err.to_string()))?;
    let advisory =
        String::from_utf8(buffer).map_err(|err| StepError::Assertion(err.to_string()))?;

    Ok(RentalContext {
        outcome: Some(RentalResult { outcome, advisory }),
        ..rental_context
    })
}

#[then("the outcome is \"{kind}\"")]
fn outcome_kind(rental_context: &RentalContext, kind: String) -> Result<(), StepError> {
    let result = recorded_result(rental_context)?;
    let actual = match result.outcome {
        RentalOutcome::Ready(_) => "ready",
        RentalOutcome::NoOffersFound => "no-offers",
        RentalOutcome::SearchFailed(_) => "search-failed",
        RentalOutcome::ProvisioningFailed(_) => "provisioning-failed",
        RentalOutcome::TimedOutWaiting { .. } => "timed-out",
        RentalOutcome::PollingAborted { .. } => "aborted",
        RentalOutcome::Interrupted { .. } => "interrupted",
    };
    if actual == kind {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected outcome {kind}, got {:?}",
            result.outcome
        )))
    }
}

#[then("offer \"{id}\" was provisioned")]
fn offer_provisioned(rental_context: &RentalContext, id: u64) -> Result<(), StepError> {
    let offers: Vec<u64> = rental_context
        .marketplace
        .provision_requests()
        .iter()
        .map(|request| request.offer_id.get())
        .collect();
    if offers == vec![id] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected offer {id} to be provisioned once, got {offers:?}"
        )))
    }
}

#[then("no instance was provisioned")]
fn nothing_provisioned(rental_context: &RentalContext) -> Result<(), StepError> {
    let provisioned = rental_context
        .marketplace
        .calls()
        .iter()
        .any(|call| matches!(call, MarketplaceCall::Provision(_)));
    if provisioned {
        return Err(StepError::Assertion(String::from(
            "expected no provisioning call",
        )));
    }
    Ok(())
}

#[then("the instance status was checked \"{count}\" times")]
fn status_checked(rental_context: &RentalContext, count: usize) -> Result<(), StepError> {
    let actual = rental_context.marketplace.status_count();
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} status checks, got {actual}"
        )))
    }
}

#[then("the workflow paused \"{count}\" times")]
fn paused(rental_context: &RentalContext, count: usize) -> Result<(), StepError> {
    let actual = rental_context.pause.count();
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} pauses, got {actual}"
        )))
    }
}

#[then("the advisory mentions \"{text}\"")]
fn advisory_mentions(rental_context: &RentalContext, text: String) -> Result<(), StepError> {
    let result = recorded_result(rental_context)?;
    if result.advisory.contains(&text) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "advisory should mention {text:?}: {}",
            result.advisory
        )))
    }
}

#[then("the advisory does not mention \"{text}\"")]
fn advisory_omits(rental_context: &RentalContext, text: String) -> Result<(), StepError> {
    let result = recorded_result(rental_context)?;
    if result.advisory.contains(&text) {
        Err(StepError::Assertion(format!(
            "advisory should not mention {text:?}: {}",
            result.advisory
        )))
    } else {
        Ok(())
    }
}

#[then("the exit code is \"{code}\"")]
fn exit_code(rental_context: &RentalContext, code: i32) -> Result<(), StepError> {
    let actual = recorded_result(rental_context)?.outcome.exit_code();
    if actual == code {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exit code {code}, got {actual}"
        )))
    }
}

fn recorded_result(rental_context: &RentalContext) -> Result<&RentalResult, StepError> {
    rental_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

fn provisioned_id(rental_context: &RentalContext) -> u64 {
    rental_context
        .marketplace
        .peek_provisioned()
        .unwrap_or_else(|| panic!("provision an instance before scripting its status"))
}

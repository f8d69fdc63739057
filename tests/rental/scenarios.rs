//! BDD scenarios for the rental workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RentalContext, rental_context};

#[scenario(
    path = "tests/features/rental.feature",
    name = "Rent the cheapest offer and wait for readiness"
)]
fn scenario_rent_until_ready(rental_context: RentalContext) {
    let _ = rental_context;
}

#[scenario(
    path = "tests/features/rental.feature",
    name = "Stop when no offers match"
)]
fn scenario_no_offers(rental_context: RentalContext) {
    let _ = rental_context;
}

#[scenario(
    path = "tests/features/rental.feature",
    name = "Report the upstream reason when provisioning is rejected"
)]
fn scenario_provisioning_rejected(rental_context: RentalContext) {
    let _ = rental_context;
}

#[scenario(
    path = "tests/features/rental.feature",
    name = "Give up after the polling budget and print cleanup commands"
)]
fn scenario_polling_budget(rental_context: RentalContext) {
    let _ = rental_context;
}

#[scenario(
    path = "tests/features/rental.feature",
    name = "Abort polling when the instance reports an error"
)]
fn scenario_error_status(rental_context: RentalContext) {
    let _ = rental_context;
}

#[scenario(
    path = "tests/features/rental.feature",
    name = "Honour an interrupt raised before provisioning"
)]
fn scenario_interrupt(rental_context: RentalContext) {
    let _ = rental_context;
}

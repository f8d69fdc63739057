//! Unit tests for advisory rendering.

use rstest::rstest;

use super::*;
use crate::marketplace::{ConnectionInfo, InstanceStatus};
use crate::test_support::{instance, running_instance};

fn render(outcome: &RentalOutcome) -> String {
    Advisory::new(outcome).to_string()
}

#[rstest]
fn ready_advisory_lists_connection_and_cleanup() {
    let outcome = RentalOutcome::Ready(running_instance(555, "ssh4.vast.ai", 22));

    let text = render(&outcome);

    assert!(text.contains("Instance 555 is running."), "text: {text}");
    assert!(text.contains("SSH: ssh -p 22 root@ssh4.vast.ai"), "text: {text}");
    assert!(text.contains("incurring charges"), "text: {text}");
    assert!(text.contains("vastrent stop 555"), "text: {text}");
    assert!(text.contains("vastrent destroy 555"), "text: {text}");
}

#[rstest]
fn ready_advisory_includes_web_url_when_present() {
    let mut ready = running_instance(4, "host", 2200);
    ready.connection.web_url = Some(String::from("https://host:8080/lab"));

    let text = render(&RentalOutcome::Ready(ready));

    assert!(text.contains("JupyterLab: https://host:8080/lab"), "text: {text}");
}

#[rstest]
fn provisioning_failure_has_no_cleanup_commands() {
    let outcome = RentalOutcome::ProvisioningFailed(String::from("offer unavailable"));

    let text = render(&outcome);

    assert!(text.contains("Provisioning failed: offer unavailable"), "text: {text}");
    assert!(!text.contains("destroy"), "text: {text}");
}

#[rstest]
fn timeout_reports_last_status_and_cleanup() {
    let outcome = RentalOutcome::TimedOutWaiting {
        instance_id: InstanceId::new(555),
        last: Some(instance(555, InstanceStatus::Provisioning)),
        attempts: 20,
    };

    let text = render(&outcome);

    assert!(text.contains("after 20 status checks"), "text: {text}");
    assert!(text.contains("Last observed status: provisioning"), "text: {text}");
    assert!(text.contains("Instance 555 may still be billed"), "text: {text}");
    assert!(text.contains("vastrent destroy 555"), "text: {text}");
}

#[rstest]
fn aborted_without_snapshot_says_so() {
    let outcome = RentalOutcome::PollingAborted {
        instance_id: InstanceId::new(9),
        last: None,
        reason: String::from("instance 9 not found"),
    };

    let text = render(&outcome);

    assert!(text.contains("Stopped waiting for instance 9: instance 9 not found"));
    assert!(text.contains("No status could be read"));
    assert!(text.contains("vastrent stop 9"));
}

#[rstest]
#[case(RentalOutcome::NoOffersFound, "No offers matched")]
#[case(RentalOutcome::SearchFailed(String::from("HTTP 500")), "Offer search failed: HTTP 500")]
#[case(
    RentalOutcome::Interrupted { instance_id: None, last: None },
    "Interrupted before an instance was created"
)]
fn outcomes_without_instance_mention_no_commands(
    #[case] outcome: RentalOutcome,
    #[case] expected: &str,
) {
    let text = render(&outcome);

    assert!(text.contains(expected), "text: {text}");
    assert!(!text.contains(CLI_NAME), "text: {text}");
}

#[rstest]
fn interrupted_with_instance_prints_cleanup() {
    let outcome = RentalOutcome::Interrupted {
        instance_id: Some(InstanceId::new(77)),
        last: Some(instance(77, InstanceStatus::Provisioning)),
    };

    let text = render(&outcome);

    assert!(text.contains("Interrupted while waiting for instance 77."));
    assert!(text.contains("vastrent destroy 77"));
}

#[rstest]
fn ssh_command_quotes_unusual_hosts() {
    assert_eq!(ssh_command("h", 22), "ssh -p 22 root@h");
    assert_eq!(ssh_command("bad host", 22), "ssh -p 22 root@'bad host'");
}

#[rstest]
fn instance_report_without_ssh_says_not_reported() {
    let snapshot = Instance {
        id: InstanceId::new(5),
        status: InstanceStatus::Provisioning,
        connection: ConnectionInfo::default(),
    };
    let mut buffer = Vec::new();

    write_instance(&mut buffer, &snapshot).expect("write should succeed");

    let text = String::from_utf8(buffer).expect("utf-8");
    assert!(text.starts_with("Instance 5: provisioning"), "text: {text}");
    assert!(text.contains("SSH: not reported yet"), "text: {text}");
}

#[rstest]
fn orphan_notice_names_the_instance() {
    let mut buffer = Vec::new();

    write_orphan_notice(&mut buffer, InstanceId::new(42)).expect("write should succeed");

    let text = String::from_utf8(buffer).expect("utf-8");
    assert!(text.contains("after creating instance 42"), "text: {text}");
    assert!(text.contains("vastrent destroy 42"), "text: {text}");
}

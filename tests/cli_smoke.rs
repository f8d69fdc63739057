//! Behavioural smoke test for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("vastrent");
    cmd.assert().failure().code(2).stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("vastrent");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("rent"))
        .stdout(contains("status"))
        .stdout(contains("destroy"));
}

#[test]
fn rent_help_lists_overrides() {
    let mut cmd = cargo_bin_cmd!("vastrent");
    cmd.args(["rent", "--help"]);
    cmd.assert()
        .success()
        .stdout(contains("--max-attempts"))
        .stdout(contains("--strategy"))
        .stdout(contains("--no-jupyter"));
}

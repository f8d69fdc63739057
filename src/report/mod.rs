//! Operator-facing advisory text.
//!
//! Every rental run ends here. A ready instance gets its connection details
//! and a billing reminder; any failure that happened after an instance was
//! created gets explicit stop and destroy commands naming that instance.

use std::fmt::{self, Display};
use std::io::{self, Write};

use shell_escape::unix::escape;

use crate::marketplace::{Instance, InstanceId};
use crate::rental::RentalOutcome;

/// Name of the binary used in suggested commands.
pub const CLI_NAME: &str = "vastrent";

/// Renders the advisory for a [`RentalOutcome`].
#[derive(Clone, Copy, Debug)]
pub struct Advisory<'a> {
    outcome: &'a RentalOutcome,
}

impl<'a> Advisory<'a> {
    /// Wraps an outcome for rendering.
    #[must_use]
    pub const fn new(outcome: &'a RentalOutcome) -> Self {
        Self { outcome }
    }
}

impl Display for Advisory<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            RentalOutcome::Ready(instance) => write_ready(formatter, instance),
            RentalOutcome::NoOffersFound => {
                writeln!(
                    formatter,
                    "No offers matched the search criteria. Nothing was rented."
                )?;
                writeln!(
                    formatter,
                    "Loosen the criteria (for example a lower reliability or bid) and try again."
                )
            }
            RentalOutcome::SearchFailed(reason) => {
                writeln!(formatter, "Offer search failed: {reason}")?;
                writeln!(formatter, "Nothing was rented.")
            }
            RentalOutcome::ProvisioningFailed(reason) => {
                writeln!(formatter, "Provisioning failed: {reason}")?;
                writeln!(
                    formatter,
                    "The marketplace did not create an instance, so there is nothing to clean up."
                )
            }
            RentalOutcome::TimedOutWaiting {
                instance_id,
                last,
                attempts,
            } => {
                writeln!(
                    formatter,
                    "Instance {instance_id} did not become ready after {attempts} status checks."
                )?;
                write_last_status(formatter, last.as_ref())?;
                write_cleanup(formatter, *instance_id)
            }
            RentalOutcome::PollingAborted {
                instance_id,
                last,
                reason,
            } => {
                writeln!(
                    formatter,
                    "Stopped waiting for instance {instance_id}: {reason}"
                )?;
                write_last_status(formatter, last.as_ref())?;
                write_cleanup(formatter, *instance_id)
            }
            RentalOutcome::Interrupted {
                instance_id: Some(instance_id),
                last,
            } => {
                writeln!(
                    formatter,
                    "Interrupted while waiting for instance {instance_id}."
                )?;
                write_last_status(formatter, last.as_ref())?;
                write_cleanup(formatter, *instance_id)
            }
            RentalOutcome::Interrupted {
                instance_id: None, ..
            } => writeln!(
                formatter,
                "Interrupted before an instance was created. Nothing was rented."
            ),
        }
    }
}

fn write_ready(formatter: &mut fmt::Formatter<'_>, instance: &Instance) -> fmt::Result {
    writeln!(formatter, "Instance {} is running.", instance.id)?;
    write_connection(formatter, instance)?;
    writeln!(
        formatter,
        "It keeps running and incurring charges until you stop and destroy it:"
    )?;
    write_commands(formatter, instance.id)
}

fn write_connection(formatter: &mut fmt::Formatter<'_>, instance: &Instance) -> fmt::Result {
    writeln!(formatter, "Connection information:")?;
    match instance.connection.ssh_endpoint() {
        Some((host, port)) => writeln!(formatter, "  SSH: {}", ssh_command(host, port))?,
        None => writeln!(formatter, "  SSH: not reported yet")?,
    }
    if let Some(url) = &instance.connection.web_url {
        writeln!(formatter, "  JupyterLab: {url}")?;
    }
    Ok(())
}

fn write_last_status(formatter: &mut fmt::Formatter<'_>, last: Option<&Instance>) -> fmt::Result {
    match last {
        Some(instance) => writeln!(formatter, "Last observed status: {}", instance.status),
        None => writeln!(formatter, "No status could be read for the instance."),
    }
}

fn write_cleanup(formatter: &mut fmt::Formatter<'_>, instance_id: InstanceId) -> fmt::Result {
    writeln!(
        formatter,
        "Instance {instance_id} may still be billed. Clean it up manually:"
    )?;
    write_commands(formatter, instance_id)
}

fn write_commands(formatter: &mut fmt::Formatter<'_>, instance_id: InstanceId) -> fmt::Result {
    writeln!(formatter, "  {CLI_NAME} stop {instance_id}")?;
    writeln!(formatter, "  {CLI_NAME} destroy {instance_id}")
}

/// Builds the SSH command for a host and port.
#[must_use]
pub fn ssh_command(host: &str, port: u16) -> String {
    format!("ssh -p {port} root@{}", escape(host.into()))
}

/// Writes the advisory for `outcome` to `target`.
///
/// # Errors
///
/// Returns the underlying I/O error when writing fails.
pub fn write_advisory(mut target: impl Write, outcome: &RentalOutcome) -> io::Result<()> {
    write!(target, "{}", Advisory::new(outcome))
}

/// Writes a one-off status report for an instance, as used by the `status`
/// subcommand.
///
/// # Errors
///
/// Returns the underlying I/O error when writing fails.
pub fn write_instance(mut target: impl Write, instance: &Instance) -> io::Result<()> {
    write!(target, "{}", InstanceReport(instance))
}

/// Writes the notice emitted when a run unwinds after creating an instance.
///
/// # Errors
///
/// Returns the underlying I/O error when writing fails.
pub fn write_orphan_notice(mut target: impl Write, instance_id: InstanceId) -> io::Result<()> {
    write!(target, "{}", OrphanNotice(instance_id))
}

struct InstanceReport<'a>(&'a Instance);

impl Display for InstanceReport<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = self.0;
        writeln!(formatter, "Instance {}: {}", instance.id, instance.status)?;
        write_connection(formatter, instance)
    }
}

struct OrphanNotice(InstanceId);

impl Display for OrphanNotice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            formatter,
            "The rental workflow ended unexpectedly after creating instance {}.",
            self.0
        )?;
        write_cleanup(formatter, self.0)
    }
}

#[cfg(test)]
mod tests;

//! Tracks the rented instance until the workflow hands it to the caller.

use std::io;

use tracing::error;

use crate::marketplace::InstanceId;
use crate::report::write_orphan_notice;

/// Holds the instance identifier while the workflow is in flight.
///
/// If the guard is dropped while still tracking an instance (a panic, or
/// the workflow future being dropped mid-poll), it prints cleanup
/// instructions to stderr so the billed instance is never lost silently.
#[derive(Debug)]
pub(crate) struct InstanceGuard {
    tracked: Option<InstanceId>,
}

impl InstanceGuard {
    pub(crate) const fn new() -> Self {
        Self { tracked: None }
    }

    pub(crate) fn track(&mut self, id: InstanceId) -> InstanceId {
        self.tracked = Some(id);
        id
    }

    pub(crate) fn release(&mut self) -> Option<InstanceId> {
        self.tracked.take()
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Some(id) = self.tracked.take() {
            error!(instance_id = %id, "rental workflow ended without an outcome");
            write_orphan_notice(io::stderr(), id).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_hands_back_the_tracked_instance() {
        let mut guard = InstanceGuard::new();
        let id = guard.track(InstanceId::new(555));

        assert_eq!(guard.release(), Some(id));
        assert_eq!(guard.release(), None);
    }
}

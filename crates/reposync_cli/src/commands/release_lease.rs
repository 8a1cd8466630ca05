//! Release-lease command implementation.

use super::{report, Context, Options};
use reposync_engine::{LogNotifier, SyncResult};
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

/// Runs the release-lease command.
///
/// Only for leases left by a crashed run: releasing a lease whose holder is
/// still running lets a second operation start next to it.
pub fn run(repo: &Path) -> ExitCode {
    report("Releasing the lease failed", &LogNotifier, release(repo))
}

fn release(repo: &Path) -> SyncResult<()> {
    let state = Context::open(repo, &Options::default())?.state()?;
    match state.read_lease()? {
        Some(lease) => warn!(
            owner = %lease.owner,
            operation = %lease.operation,
            pid = lease.pid,
            acquired_at_ms = lease.acquired_at_ms,
            "releasing lease"
        ),
        None if state.lease_exists() => warn!("releasing unreadable lease"),
        None => {}
    }
    if state.release_lease()? {
        println!("Lease released");
    } else {
        info!("no lease held");
        println!("No lease held");
    }
    Ok(())
}

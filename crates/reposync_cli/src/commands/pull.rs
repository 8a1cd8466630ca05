//! Pull command implementation.

use super::{notifier, report, Context, SyncArgs};
use reposync_engine::{Notifier, Severity, SyncResult};
use std::process::ExitCode;

const FAILURE: &str = "Downloading notes failed";

/// Runs the pull command.
pub fn run(args: &SyncArgs) -> ExitCode {
    let ctx = match Context::open(&args.repo, &args.options) {
        Ok(ctx) => ctx,
        Err(e) => return report(FAILURE, &*notifier(args.options.no_notify), Err(e)),
    };
    let notifier = ctx.notifier();
    let result = pull(&ctx, &args.instance_id, &*notifier);
    report(FAILURE, &*notifier, result)
}

fn pull(ctx: &Context, instance_id: &str, notifier: &dyn Notifier) -> SyncResult<()> {
    let applied = ctx.engine(instance_id)?.pull()?;
    notifier.notify(&pulled_message(applied), Severity::Normal);
    Ok(())
}

fn pulled_message(applied: usize) -> String {
    match applied {
        1 => "Notes: Pulled 1 link".to_string(),
        n => format!("Notes: Pulled {n} links"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_counts_links() {
        assert_eq!(pulled_message(0), "Notes: Pulled 0 links");
        assert_eq!(pulled_message(1), "Notes: Pulled 1 link");
        assert_eq!(pulled_message(7), "Notes: Pulled 7 links");
    }
}

//! Push command implementation.

use super::{notifier, report, Context, SyncArgs};
use reposync_engine::{Notifier, PushOutcome, Severity, SyncResult};
use std::process::ExitCode;
use tracing::info;

const FAILURE: &str = "Uploading notes failed";

/// Runs the push command.
pub fn run(args: &SyncArgs) -> ExitCode {
    let ctx = match Context::open(&args.repo, &args.options) {
        Ok(ctx) => ctx,
        Err(e) => return report(FAILURE, &*notifier(args.options.no_notify), Err(e)),
    };
    let notifier = ctx.notifier();
    let result = push(&ctx, &args.instance_id, &*notifier);
    report(FAILURE, &*notifier, result)
}

fn push(ctx: &Context, instance_id: &str, notifier: &dyn Notifier) -> SyncResult<()> {
    let engine = ctx.engine(instance_id)?;
    match engine.push()? {
        PushOutcome::UpToDate => info!("nothing to upload"),
        PushOutcome::Pushed {
            name,
            mode,
            collected,
            ..
        } => {
            info!(%name, ?mode, collected, store = ctx.store_target(), "pushed");
            notifier.notify("Notes: Upload successful", Severity::Normal);
        }
    }
    Ok(())
}

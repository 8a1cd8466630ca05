//! Status command implementation.

use super::{report, Context, Options};
use reposync_engine::{
    GitCli, Lease, LogNotifier, SyncError, SyncResult, SyncStatus, VersionControl,
};
use reposync_protocol::build_canonical_chain;
use reposync_storage::BlobStore;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

/// What `status` prints.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Repository path.
    pub repo: String,
    /// Store target.
    pub store: String,
    /// Synchronized branch.
    pub branch: String,
    /// Branch tip.
    pub head: Option<String>,
    /// Last link pushed or applied here.
    pub last_link: Option<String>,
    /// Commit carried by that link.
    pub last_included: Option<String>,
    /// Canonical link names in chain order.
    pub chain: Vec<String>,
    /// Losing or superseded uploads still in the store.
    pub leftovers: Vec<String>,
    /// Store objects that are not links.
    pub ignored: usize,
    /// Canonical links not yet applied here.
    pub pending_links: usize,
    /// Whether the branch has commits that were never pushed.
    pub unpushed_commits: bool,
    /// Lease left by a running or interrupted operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
}

/// Runs the status command.
///
/// Reads only; needs neither an instance id nor the passphrase.
pub fn run(repo: &Path, options: &Options, format: &str) -> ExitCode {
    let result = collect(repo, options).and_then(|status| {
        match format {
            "json" => println!(
                "{}",
                serde_json::to_string_pretty(&status).map_err(|e| SyncError::State(e.to_string()))?
            ),
            _ => print_text_output(&status),
        }
        Ok(())
    });
    report("Reading sync status failed", &LogNotifier, result)
}

fn collect(repo: &Path, options: &Options) -> SyncResult<StatusReport> {
    let ctx = Context::open(repo, options)?;
    let branch = ctx.branch().to_string();
    let state = ctx.state()?;
    let listing = ctx.store()?.list()?;

    let status = SyncStatus {
        state: state.read()?,
        head: GitCli::new(repo).head_commit(&branch)?,
        chain: build_canonical_chain(listing.iter().map(|o| (o.name.as_str(), o.upload_timestamp))),
        lease: state.read_lease()?,
    };

    Ok(StatusReport {
        repo: repo.display().to_string(),
        store: ctx.store_target().to_string(),
        branch,
        head: status.head.as_ref().map(ToString::to_string),
        last_link: status
            .state
            .as_ref()
            .and_then(|s| s.last_link.as_ref())
            .map(ToString::to_string),
        last_included: status
            .state
            .as_ref()
            .and_then(|s| s.last_included.as_ref())
            .map(ToString::to_string),
        chain: status.chain.names().into_iter().map(str::to_string).collect(),
        leftovers: status
            .chain
            .leftovers()
            .iter()
            .map(|e| e.name.clone())
            .collect(),
        ignored: status.chain.ignored().len(),
        pending_links: status.pending_links(),
        unpushed_commits: status.has_unpushed_commits(),
        lease: status.lease,
    })
}

fn print_text_output(report: &StatusReport) {
    let none = "-".to_string();
    println!("Repository: {}", report.repo);
    println!("  Store:         {}", report.store);
    println!("  Branch:        {}", report.branch);
    println!("  Head:          {}", report.head.as_ref().unwrap_or(&none));
    println!("  Last link:     {}", report.last_link.as_ref().unwrap_or(&none));
    println!("  Last included: {}", report.last_included.as_ref().unwrap_or(&none));
    println!("  Pending links: {}", report.pending_links);
    println!(
        "  Unpushed:      {}",
        if report.unpushed_commits { "yes" } else { "no" }
    );
    if let Some(lease) = &report.lease {
        println!(
            "  Lease:         held by {} for {} since {} (pid {})",
            lease.owner, lease.operation, lease.acquired_at_ms, lease.pid
        );
    }

    println!();
    println!("Canonical chain ({} links):", report.chain.len());
    for name in &report.chain {
        println!("  {name}");
    }
    if !report.leftovers.is_empty() {
        println!("Leftovers ({}):", report.leftovers.len());
        for name in &report.leftovers {
            println!("  {name}");
        }
    }
    if report.ignored > 0 {
        println!("Ignored objects: {}", report.ignored);
    }
}

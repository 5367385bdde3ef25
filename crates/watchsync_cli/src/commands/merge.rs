//! Merge command implementation.

use super::{read_document, write_document, CommandResult};
use serde::Serialize;
use std::path::Path;
use watchsync_engine::{Clock, SyncSettings, SystemClock, SETTINGS_KEY};
use watchsync_protocol::{MergePolicy, RawSnapshot, Timestamp, WritePlan};

/// Outcome of an offline merge.
#[derive(Debug, Serialize)]
pub struct MergeSummary {
    /// Merge time used.
    pub now: Timestamp,
    /// Last sync time used.
    pub last_sync: Timestamp,
    /// Whether the staleness fail-safe replaced local with remote.
    pub fail_safe: bool,
    /// Items in the merged result.
    pub items: usize,
    /// Records kept from the local side.
    pub kept_local: usize,
    /// Records taken from the remote side.
    pub taken_remote: usize,
    /// Records dropped because of a tombstone.
    pub suppressed: usize,
    /// Tombstones carried into the result.
    pub tombstones_kept: usize,
    /// Tombstones dropped for age.
    pub tombstones_purged: usize,
    /// Items skipped as malformed.
    pub malformed: usize,
    /// Keys the local document would have written.
    pub local_writes: usize,
    /// Keys the local document would have removed.
    pub local_removals: usize,
}

/// Runs the merge command.
pub fn run(
    local: &Path,
    remote: &Path,
    now: Option<Timestamp>,
    last_sync: Option<Timestamp>,
    out: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let local_raw = read_document(local)?;
    let remote_raw = read_document(remote)?;
    let now = now.unwrap_or_else(|| SystemClock.now_ms());
    let last_sync = last_sync.unwrap_or_else(|| {
        SyncSettings::from_stored(local_raw.get(SETTINGS_KEY)).last_sync_time
    });

    let (merged, summary) = merge_documents(&local_raw, &remote_raw, now, last_sync);
    if let Some(out) = out {
        write_document(out, &merged)?;
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_text_output(&summary, out),
    }

    Ok(())
}

/// Merges `remote` into `local` the way a full cycle's local half would.
///
/// Keys that are not items, such as the sync settings, are carried over
/// from `local` untouched.
pub fn merge_documents(
    local: &RawSnapshot,
    remote: &RawSnapshot,
    now: Timestamp,
    last_sync: Timestamp,
) -> (RawSnapshot, MergeSummary) {
    let outcome = MergePolicy::default().merge(local, remote, now, last_sync);
    let plan = WritePlan::between(local, &outcome.items);

    let mut document = local.clone();
    for key in &plan.remove {
        document.remove(key);
    }
    document.extend(plan.set.clone());

    let report = outcome.report;
    let summary = MergeSummary {
        now,
        last_sync,
        fail_safe: report.fail_safe,
        items: outcome.items.len(),
        kept_local: report.kept_local,
        taken_remote: report.taken_remote,
        suppressed: report.suppressed,
        tombstones_kept: report.tombstones_kept,
        tombstones_purged: report.tombstones_purged,
        malformed: report.malformed.len(),
        local_writes: plan.set.len(),
        local_removals: plan.remove.len(),
    };
    (document, summary)
}

fn print_text_output(summary: &MergeSummary, out: Option<&Path>) {
    println!("watchsync Merge");
    println!("===============");
    println!();
    println!("Now:       {}", summary.now);
    println!("Last sync: {}", summary.last_sync);
    if summary.fail_safe {
        println!();
        println!("Local state is stale; remote was taken verbatim.");
    }
    println!();
    println!("Result:");
    println!("  Items:             {}", summary.items);
    println!("  Kept local:        {}", summary.kept_local);
    println!("  Taken remote:      {}", summary.taken_remote);
    println!("  Suppressed:        {}", summary.suppressed);
    println!("  Tombstones kept:   {}", summary.tombstones_kept);
    println!("  Tombstones purged: {}", summary.tombstones_purged);
    println!("  Malformed:         {}", summary.malformed);
    println!();
    println!("Local changes:");
    println!("  Writes:   {}", summary.local_writes);
    println!("  Removals: {}", summary.local_removals);
    if let Some(out) = out {
        println!();
        println!("Merged document written to {}", out.display());
    }
}

//! Sync command implementation.

use super::{CommandError, CommandResult};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use watchsync_engine::{SyncConfig, SyncScheduler, SyncStatus};
use watchsync_protocol::Timestamp;
use watchsync_storage::{ChangeScope, FileArea};

/// What the sync command did.
#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    /// Final status.
    pub status: String,
    /// Whether sync is switched on.
    pub enabled: bool,
    /// Last successful sync in epoch milliseconds.
    pub last_sync_time: Timestamp,
    /// Keys written to the local document.
    pub local_written: usize,
    /// Keys removed from the local document.
    pub local_removed: usize,
    /// Keys written or removed in the remote document.
    pub remote_touched: usize,
    /// Items kept local for exceeding the per-item ceiling.
    pub oversized: usize,
}

/// Runs the sync command.
pub fn run(
    local: &Path,
    remote: &Path,
    disable: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(sync_documents(local, remote, disable))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => print_text_output(&outcome),
    }

    Ok(())
}

/// Enables sync between two documents and runs the initial full cycle,
/// or switches sync off when `disable` is set.
pub async fn sync_documents(
    local: &Path,
    remote: &Path,
    disable: bool,
) -> CommandResult<SyncOutcome> {
    let config = SyncConfig::default();
    let local_area = FileArea::open(local, ChangeScope::Local)?;
    let remote_area =
        FileArea::open_with_limits(remote, ChangeScope::Sync, config.remote.area_limits())?;

    let scheduler = SyncScheduler::new(config, Arc::new(local_area), Arc::new(remote_area));

    if disable {
        scheduler.initialize().await;
        if !scheduler.disable().await {
            return Err(CommandError::SyncFailed(
                "could not persist sync settings".into(),
            ));
        }
    } else if !scheduler.enable().await {
        return Err(CommandError::NotAvailable(remote.to_path_buf()));
    }

    let status = scheduler.status();
    if status.status == SyncStatus::Error {
        let reason = scheduler
            .stats()
            .last_error
            .unwrap_or_else(|| "unknown error".into());
        return Err(CommandError::SyncFailed(reason));
    }

    let report = scheduler.last_report();
    Ok(SyncOutcome {
        status: status.status.to_string(),
        enabled: status.enabled,
        last_sync_time: status.last_sync_time,
        local_written: report.as_ref().map_or(0, |r| r.local_written),
        local_removed: report.as_ref().map_or(0, |r| r.local_removed),
        remote_touched: report.as_ref().map_or(0, |r| r.remote_touched()),
        oversized: report.as_ref().map_or(0, |r| r.oversized),
    })
}

fn print_text_output(outcome: &SyncOutcome) {
    println!("watchsync Sync");
    println!("==============");
    println!();
    println!("Status:    {}", outcome.status);
    println!("Enabled:   {}", outcome.enabled);
    println!("Last sync: {}", outcome.last_sync_time);
    if outcome.enabled {
        println!();
        println!("Local:  {} written, {} removed", outcome.local_written, outcome.local_removed);
        println!("Remote: {} touched", outcome.remote_touched);
        if outcome.oversized > 0 {
            println!("Oversized items kept local: {}", outcome.oversized);
        }
    }
}

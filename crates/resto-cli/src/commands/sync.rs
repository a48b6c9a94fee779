use std::time::Duration;

use resto_core::sync::PassReport;
use resto_core::{Reconciler, SyncContext, SyncTrigger};

use crate::commands::common::{
    format_sync_conflict_lines, sync_conflict_to_item, SyncConflictItem,
};
use crate::error::CliError;

pub fn format_pass_report(report: &PassReport) -> Vec<String> {
    if report.is_noop() {
        return vec!["Already up to date".to_string()];
    }

    let mut lines = vec![format!(
        "Pulled {} restaurants and {} reviews, pushed {} changes",
        report.restaurants_pulled,
        report.reviews_pulled,
        report.pushed()
    )];
    if report.reviews_removed > 0 {
        lines.push(format!(
            "Removed {} reviews deleted on the server",
            report.reviews_removed
        ));
    }
    if report.temporary_purged > 0 {
        lines.push(format!(
            "Discarded {} unsent reviews the server rejected",
            report.temporary_purged
        ));
    }
    if report.conflicts > 0 {
        lines.push(format!(
            "Resolved {} conflicts (see `resto sync conflicts`)",
            report.conflicts
        ));
    }
    for failure in &report.push_failures {
        lines.push(format!(
            "Failed to {} {}: {}",
            failure.operation, failure.id, failure.message
        ));
    }
    lines
}

pub async fn run_sync(context: &SyncContext) -> Result<(), CliError> {
    let report = Reconciler::new(context.clone()).run_pass().await?;
    for line in format_pass_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    context: &SyncContext,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let conflicts = context.store().await?.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

/// Sync every `interval` until Ctrl-C, reporting local data changes.
pub async fn run_sync_watch(context: &SyncContext, interval: Duration) -> Result<(), CliError> {
    let trigger = SyncTrigger::new(context.clone());
    let mut changes = context.subscribe();
    let ticker = trigger.spawn_periodic(interval);
    println!(
        "Syncing every {}s, press Ctrl-C to stop",
        interval.as_secs()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = changes.recv() => match changed {
                Ok(change) => {
                    let mut collections = Vec::new();
                    if change.restaurants {
                        collections.push("restaurants");
                    }
                    if change.reviews {
                        collections.push("reviews");
                    }
                    println!("[{}] {} updated", trigger.state(), collections.join(" and "));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Missed {skipped} change notifications");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    ticker.abort();
    println!("Stopped");
    Ok(())
}

//! Periodic maintenance: heartbeat-miss sweeps and snapshot fanout.

use crate::state::AppState;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const FANOUT_INTERVAL: Duration = Duration::from_secs(30);

pub fn spawn_heartbeat_sweep(state: AppState, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match state.heartbeat.sweep().await {
                        Ok(flipped) if flipped > 0 => info!(flipped, "heartbeat sweep flipped instances to DOWN"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "heartbeat sweep failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("heartbeat sweep task shutting down");
                    return;
                }
            }
        }
    })
}

/// Periodically re-pushes the full snapshot to every live instance, in
/// addition to the fire-and-forget push after each registration. Catches
/// instances that missed the registration-triggered push (e.g. they were
/// briefly down) and reconverges the fleet's view of the registry.
pub fn spawn_periodic_fanout(state: AppState, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FANOUT_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = match ledger_fanout::build_snapshot(&state.repository).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(error = %e, "failed to build snapshot for periodic fanout");
                            continue;
                        }
                    };
                    match ledger_fanout::fanout_snapshot(&state.repository, &state.secrets, &state.http, &snapshot).await {
                        Ok(report) => info!(total = report.total_targets, ok = report.ok_count, "periodic fanout complete"),
                        Err(e) => warn!(error = %e, "periodic fanout failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("periodic fanout task shutting down");
                    return;
                }
            }
        }
    })
}

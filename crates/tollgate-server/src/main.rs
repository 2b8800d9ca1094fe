//! Tollgate Server: connects to SurrealDB, applies migrations and runs
//! the periodic session and group-reference maintenance sweeps.

use std::future::Future;
use std::time::Duration;

use tollgate_core::clock::{Clock, SystemClock};
use tollgate_core::repository::{GroupRefSync, SessionRepository};
use tollgate_db::repository::{SurrealGroupRefSync, SurrealSessionRepository};
use tollgate_db::{DbConfig, DbManager};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// `TOLLGATE_SWEEP_INTERVAL_SECS`, falling back to the default when unset,
/// unparsable or zero.
fn sweep_interval() -> Duration {
    let secs = std::env::var("TOLLGATE_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    Duration::from_secs(secs)
}

/// Sweeps expired sessions and stale group refs every `interval` until
/// `shutdown` resolves. A shutdown that arrives mid-sweep ends the loop
/// once that sweep finishes. Returns the number of sweeps run.
async fn run_sweeps<S, G>(
    sessions: &S,
    group_refs: &G,
    clock: &dyn Clock,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> u64
where
    S: SessionRepository,
    G: GroupRefSync,
{
    let mut ticker = tokio::time::interval(interval);
    let mut sweeps = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = sessions.cleanup_expired(clock.now()).await {
                    error!(error = %e, "Session cleanup failed");
                }
                if let Err(e) = group_refs.reconcile().await {
                    error!(error = %e, "Group reference reconcile failed");
                }
                sweeps += 1;
            }
        }
    }
    sweeps
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tollgate=info")),
        )
        .json()
        .init();

    info!("Starting Tollgate server...");

    let db_config = DbConfig::from_env();
    let manager = DbManager::connect(&db_config).await?;
    tollgate_db::run_migrations(manager.client()).await?;

    let sessions = SurrealSessionRepository::new(manager.client().clone());
    let group_refs = SurrealGroupRefSync::new(manager.client().clone());

    // Spawned so the handler is installed before the first sweep starts.
    let ctrl_c = tokio::spawn(tokio::signal::ctrl_c());
    let shutdown = async move {
        match ctrl_c.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Failed to listen for Ctrl-C"),
            Err(e) => error!(error = %e, "Signal listener task failed"),
        }
    };

    let interval = sweep_interval();
    info!(interval_secs = interval.as_secs(), "Maintenance sweeps scheduled");
    let sweeps = run_sweeps(&sessions, &group_refs, &SystemClock, interval, shutdown).await;

    info!(sweeps, "Tollgate server stopped.");
    Ok(())
}

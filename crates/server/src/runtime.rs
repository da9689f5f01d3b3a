//! Supervision of the gRPC and HTTP server tasks

use anyhow::anyhow;
use netwatch_lib::health::HealthRegistry;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, warn};

/// Server tasks, each labelled with the health component it backs
pub type ServerTasks = JoinSet<(&'static str, anyhow::Result<()>)>;

/// Run until `signal` resolves or any server task stops
///
/// Readiness is dropped and every task is told to shut down either way. A
/// task that stops before the signal marks its component unhealthy and makes
/// this return an error, so the process exits instead of running half-alive.
pub async fn supervise(
    mut tasks: ServerTasks,
    shutdown: broadcast::Sender<()>,
    health: &HealthRegistry,
    signal: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let early_exit = tokio::select! {
        _ = signal => None,
        Some(joined) = tasks.join_next() => Some(joined),
    };

    health.set_ready(false).await;
    let _ = shutdown.send(());

    let failure = match early_exit {
        Some(joined) => {
            let (component, err) = early_exit_error(joined);
            error!(component = %component, error = %err, "Server task stopped unexpectedly");
            health.mark_unhealthy(component, err.to_string()).await;
            Some(err)
        }
        None => None,
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((component, Err(e))) => {
                warn!(component = %component, error = %e, "Server exited with error")
            }
            Err(e) => warn!(error = %e, "Server task panicked"),
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn early_exit_error(
    joined: Result<(&'static str, anyhow::Result<()>), JoinError>,
) -> (&'static str, anyhow::Error) {
    match joined {
        Ok((component, Ok(()))) => (component, anyhow!("{} server stopped", component)),
        Ok((component, Err(e))) => (component, e),
        Err(e) => ("server", anyhow!("server task panicked: {}", e)),
    }
}

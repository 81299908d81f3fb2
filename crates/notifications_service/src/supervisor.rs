//! Runs the HTTP server and the event dispatcher as one unit.
//!
//! The service is only useful while both are alive: if the dispatcher task
//! ends on its own, the process exits with an error instead of serving a
//! healthy-looking API while events pile up in the queue.

use anyhow::anyhow;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Drive `server` until it finishes, or fail as soon as `dispatcher` exits.
///
/// When the server finishes (graceful shutdown), the dispatcher is signalled
/// through `shutdown_tx` and awaited before returning.
pub async fn supervise<S>(
    server: S,
    mut dispatcher: JoinHandle<anyhow::Result<()>>,
    shutdown_tx: mpsc::Sender<()>,
) -> anyhow::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = server => {
            info!("Shutting down dispatcher...");
            let _ = shutdown_tx.send(()).await;
            match dispatcher.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Dispatcher stopped with error: {:?}", e),
                Err(e) => warn!("Dispatcher task failed: {}", e),
            }
            result?;
            Ok(())
        }

        result = &mut dispatcher => {
            let reason = match result {
                Ok(Ok(())) => "stopped without a shutdown signal".to_string(),
                Ok(Err(e)) => format!("{:#}", e),
                Err(e) => e.to_string(),
            };
            error!("Event dispatcher exited: {}", reason);
            Err(anyhow!("event dispatcher exited: {}", reason))
        }
    }
}

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that probes every socket and evicts the silent ones
pub fn spawn_liveness_sweeper(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let evicted = state.sweep().await;
            if evicted > 0 {
                tracing::info!("Liveness sweep evicted {} connections", evicted);
            } else {
                tracing::debug!("Liveness sweep done");
            }
        }
    });
}

use super::AppState;
use crate::types::ConnectionId;

impl AppState {
    /// The socket answered a probe
    pub async fn mark_alive(&self, conn: ConnectionId) {
        self.connections.write().await.mark_alive(conn);
    }

    /// Probe every tracked socket and evict the ones that missed the last
    /// probe. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let dead = self.connections.write().await.probe();

        for &conn in &dead {
            tracing::info!("Connection {} missed its probe, evicting", conn);
            self.connections.read().await.close(conn);
            self.disconnect(conn).await;
        }
        dead.len()
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use super::repository::RoomRepository;

/// Periodically flushes every resident room to disk, then offloads the
/// ones with no active sites. Runs until aborted; callers should still
/// call `RoomRepository::flush_all` once more after aborting, since the
/// abort can land mid-sleep.
pub fn spawn_flush_loop(repository: Arc<RoomRepository>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            repository.flush_all().await;
            repository.gc().await;
        }
    })
}

/// Purges snapshots past their TTL once at startup, then once an hour
/// thereafter. A no-op loop body when TTL purging is disabled, but the
/// task itself still runs so it behaves identically under abort.
pub fn spawn_ttl_purge_loop(repository: Arc<RoomRepository>) -> JoinHandle<()> {
    tokio::spawn(async move {
        repository.purge_stale_rooms().await;
        let mut ticker = tokio::time::interval(Duration::from_secs(60 * 60));
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            repository.purge_stale_rooms().await;
        }
    })
}

/// Aborts both background loops and performs one final flush so nothing
/// written since the last loop iteration is lost.
pub async fn shutdown(
    repository: &RoomRepository,
    flush_handle: JoinHandle<()>,
    ttl_handle: JoinHandle<()>,
) {
    flush_handle.abort();
    ttl_handle.abort();
    repository.flush_all().await;
    info!("flushed all rooms on shutdown");
}

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::wire::WsMessage;

use super::phonetic::generate_phonetic_name;
use super::room::{Room, RoomLimits};

/// Owns every live `Room` plus its on-disk snapshot directory. The sole
/// writer of its `rooms` map; rooms themselves own their own interior
/// mutability, so most repository operations only need a read lock here.
pub struct RoomRepository {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    config: ServerConfig,
    /// Memoized `(unix_day, count)` for `total_rooms`, so repeated calls
    /// within the same day don't re-walk the data directory.
    room_count_cache: AsyncMutex<Option<(u64, usize)>>,
}

impl RoomRepository {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            room_count_cache: AsyncMutex::new(None),
        }
    }

    fn limits(&self) -> RoomLimits {
        RoomLimits {
            events_limit: self.config.room_events_limit,
            sites_limit: self.config.room_sites_limit,
            document_length_limit: self.config.document_length_limit,
            compaction_threshold: self.config.room_compaction_threshold,
        }
    }

    fn snapshot_path(&self, room_id: &str) -> PathBuf {
        self.config.data_root.join(format!("{room_id}.txt.gz"))
    }

    pub async fn exists(&self, room_id: &str) -> bool {
        if self.rooms.read().await.contains_key(room_id) {
            return true;
        }
        tokio::fs::try_exists(self.snapshot_path(room_id)).await.unwrap_or(false)
    }

    /// Generate an unused phonetic id and register an empty room under it.
    pub async fn create(&self) -> Arc<Room> {
        loop {
            let candidate = generate_phonetic_name(self.config.room_name_length);
            if self.exists(&candidate).await {
                continue;
            }
            let room = Arc::new(Room::new(candidate.clone(), self.limits()));
            self.rooms.write().await.insert(candidate, room.clone());
            return room;
        }
    }

    /// Register `room_id` as live before the first site connects to it:
    /// reuse the resident room if there is one, or reload it from its
    /// snapshot if it was offloaded. Does not invent a room for an id that
    /// is resident nowhere; callers must reject those before upgrading.
    /// The eager persist here is what keeps `create()` itself free of disk
    /// I/O: a room someone actually connects to gets its initial snapshot
    /// written immediately, rather than waiting for the next flush tick.
    pub async fn claim(&self, room_id: &str) -> Result<Arc<Room>, ApiError> {
        let room = self.get(room_id).await?;
        if let Err(e) = self.flush(&room).await {
            warn!(room_id, error = %e, "failed to persist initial snapshot on claim");
        }
        Ok(room)
    }

    /// Look up a room, loading it from its on-disk snapshot if it is not
    /// already resident in memory.
    pub async fn get(&self, room_id: &str) -> Result<Arc<Room>, ApiError> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Ok(room.clone());
        }

        let path = self.snapshot_path(room_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return Err(ApiError::RoomNotFound(room_id.to_string())),
        };

        let text = decompress(&bytes).map_err(|e| ApiError::Internal(e.to_string()))?;
        let room = Arc::new(Room::from_text(room_id.to_string(), &text, self.limits()));

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_insert(room).clone();
        Ok(room)
    }

    /// Write `room`'s current document to its snapshot file, skipping the
    /// write entirely if nothing changed since the last flush.
    pub async fn flush(&self, room: &Room) -> std::io::Result<()> {
        let text = room.materialize().await;
        let path = self.snapshot_path(&room.room_id);

        if let Ok(existing) = tokio::fs::read(&path).await {
            if let Ok(existing_text) = decompress(&existing) {
                if existing_text == text {
                    return Ok(());
                }
            }
        }

        let compressed = compress(&text)?;
        let tmp_path = path.with_extension("txt.gz.tmp");
        tokio::fs::write(&tmp_path, &compressed).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub async fn flush_all(&self) {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();
        for room in rooms {
            if let Err(e) = self.flush(&room).await {
                warn!(room_id = %room.room_id, error = %e, "failed to flush room");
            }
        }
    }

    /// Drop a room from memory without touching its snapshot on disk. Safe
    /// to call once `Room::has_active_sites` is false and the room has
    /// just been flushed.
    pub async fn offload(&self, room_id: &str) {
        self.rooms.write().await.remove(room_id);
    }

    /// Flush and offload every room with no connected sites.
    pub async fn gc(&self) {
        let idle: Vec<Arc<Room>> = {
            let rooms = self.rooms.read().await;
            let mut idle = Vec::new();
            for room in rooms.values() {
                if !room.has_active_sites().await {
                    idle.push(room.clone());
                }
            }
            idle
        };

        for room in idle {
            if let Err(e) = self.flush(&room).await {
                warn!(room_id = %room.room_id, error = %e, "failed to flush idle room before offload");
                continue;
            }
            self.offload(&room.room_id).await;
        }
    }

    /// Rewrite the room's event log down to the document's current
    /// contents if its log has grown past the compaction threshold.
    pub async fn try_compact(&self, room_id: &str) -> bool {
        let Some(room) = self.rooms.read().await.get(room_id).cloned() else {
            return false;
        };
        if room.events_len().await <= room.limits.compaction_threshold {
            return false;
        }
        self.compact(&room).await;
        true
    }

    /// Signal every connected site to reconnect, disconnect them, flush the
    /// current text, and drop the room from memory. The next `get`/`claim`
    /// reconstructs it from that snapshot with a fresh tombstone-free log.
    async fn compact(&self, room: &Arc<Room>) {
        room.broadcast(WsMessage::compaction_required(), None).await;
        for site_id in room.connected_site_ids().await {
            room.disconnect(site_id).await;
        }
        if let Err(e) = self.flush(room).await {
            warn!(room_id = %room.room_id, error = %e, "failed to flush room before compaction offload");
        }
        self.offload(&room.room_id).await;
        info!(room_id = %room.room_id, "compacted event log");
    }

    /// Delete snapshot files untouched for longer than `room_ttl_days`.
    /// No-op when TTL purging is disabled.
    pub async fn purge_stale_rooms(&self) {
        let Some(ttl_days) = self.config.room_ttl_days else {
            return;
        };
        let ttl = std::time::Duration::from_secs(ttl_days * 24 * 60 * 60);

        let mut entries = match tokio::fs::read_dir(&self.config.data_root).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("gz") {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let Ok(age) = modified.elapsed() else {
                continue;
            };
            if age > ttl {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to purge stale room snapshot");
                } else {
                    info!(path = %path.display(), "purged stale room snapshot");
                }
            }
        }
    }

    /// Number of distinct rooms ever created, memoized per calendar day
    /// (`bucket`) since it requires walking the data directory.
    pub async fn total_rooms(&self, bucket: u64) -> usize {
        let mut cache = self.room_count_cache.lock().await;
        if let Some((cached_bucket, count)) = *cache {
            if cached_bucket == bucket {
                return count;
            }
        }

        let mut count = self.rooms.read().await.len();
        if let Ok(mut entries) = tokio::fs::read_dir(&self.config.data_root).await {
            let resident: std::collections::HashSet<String> =
                self.rooms.read().await.keys().cloned().collect();
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("gz") {
                    continue;
                }
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.trim_end_matches(".txt").to_string());
                if let Some(stem) = stem {
                    if !resident.contains(&stem) {
                        count += 1;
                    }
                }
            }
        }

        *cache = Some((bucket, count));
        count
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn compress(text: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()
}

fn decompress(bytes: &[u8]) -> std::io::Result<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

use std::collections::HashMap;

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::crdt::{CrdtDocument, CrdtEvent, GlobalId};
use crate::error::{RoomError, RoomResult};
use crate::wire::{SitePresence, WsMessage};

use super::site::Site;

/// Reserved originator id used to synthesize insert events when a room is
/// reconstructed from a stored text snapshot. Never assigned to a real
/// participant: `Room::next_site_id` always returns at least 1.
pub const UTIL_SITE_ID: u32 = 0;

#[derive(Debug, Clone, Copy)]
pub struct RoomLimits {
    pub events_limit: usize,
    pub sites_limit: u32,
    pub document_length_limit: usize,
    pub compaction_threshold: usize,
}

struct RoomState {
    sites: HashMap<u32, Site>,
    log: Vec<CrdtEvent>,
    document: CrdtDocument,
}

impl RoomState {
    /// Send `msg` to every site except `except`; sites whose send fails are
    /// returned for the caller to disconnect. Never recurses into
    /// `disconnect` itself, so cascading failures stay bounded to one pass.
    async fn send_to_all(&mut self, msg: &WsMessage, except: Option<u32>) -> Vec<u32> {
        let mut failed = Vec::new();
        let ids: Vec<u32> = self.sites.keys().copied().collect();
        for id in ids {
            if Some(id) == except {
                continue;
            }
            if let Some(site) = self.sites.get(&id) {
                if site.send(msg).await.is_err() {
                    failed.push(id);
                }
            }
        }
        failed
    }

    async fn broadcast(&mut self, msg: &WsMessage, except: Option<u32>) {
        let failed = self.send_to_all(msg, except).await;
        for id in failed {
            self.disconnect(id).await;
        }
    }

    async fn disconnect(&mut self, site_id: u32) {
        let Some(site) = self.sites.remove(&site_id) else {
            return;
        };
        site.close().await;
        info!(site_id, "site disconnected");

        let failed = self
            .send_to_all(&WsMessage::site_disconnected(site_id), None)
            .await;
        for id in failed {
            if let Some(site) = self.sites.remove(&id) {
                site.close().await;
            }
        }
    }
}

/// Orchestrates a room's sites, event log, and document. Every mutating
/// operation locks `state` for its full async duration, which is what
/// makes the "snapshot-then-iterate-with-re-check" rule trivially true:
/// nothing else can touch this room's sites while a connect, broadcast, or
/// disconnect is in flight.
pub struct Room {
    pub room_id: String,
    pub limits: RoomLimits,
    state: AsyncMutex<RoomState>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("room_id", &self.room_id)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(room_id: impl Into<String>, limits: RoomLimits) -> Self {
        Self {
            room_id: room_id.into(),
            limits,
            state: AsyncMutex::new(RoomState {
                sites: HashMap::new(),
                log: Vec::new(),
                document: CrdtDocument::new(),
            }),
        }
    }

    /// Reconstruct a room from a stored text snapshot by synthesizing one
    /// insert per character, anchored to the previous one, authored by the
    /// reserved utility site id. Panics (a reconstruction-time sanity
    /// check, not a client-facing fault) if the result fails to
    /// materialize back to the input.
    pub fn from_text(room_id: impl Into<String>, text: &str, limits: RoomLimits) -> Self {
        let mut document = CrdtDocument::new();
        let mut log = Vec::with_capacity(text.chars().count());
        let mut prev_gid: Option<GlobalId> = None;

        for (i, ch) in text.chars().enumerate() {
            let gid = GlobalId::new(i as u32, UTIL_SITE_ID);
            let event = CrdtEvent::Insert {
                gid,
                char: ch,
                after_gid: prev_gid,
            };
            document
                .apply(&event)
                .expect("synthetic snapshot inserts never name an unknown anchor");
            log.push(event);
            prev_gid = Some(gid);
        }

        assert_eq!(
            document.materialize(),
            text,
            "room reconstructed from snapshot must materialize back to the snapshot"
        );

        Self {
            room_id: room_id.into(),
            limits,
            state: AsyncMutex::new(RoomState {
                sites: HashMap::new(),
                log,
                document,
            }),
        }
    }

    /// `max(site ids ever seen in the log, site ids currently connected) + 1`.
    /// Starts at 1 even for an empty room: `UTIL_SITE_ID` (0) is reserved.
    pub async fn next_site_id(&self) -> u32 {
        let state = self.state.lock().await;
        let max_from_log = state.log.iter().map(|e| e.gid().site_id).max().unwrap_or(0);
        let max_from_sites = state.sites.keys().copied().max().unwrap_or(0);
        max_from_log.max(max_from_sites) + 1
    }

    /// Pick the next site id and connect a freshly-split socket to it in
    /// one lock acquisition. Separate `next_site_id` + `connect` calls
    /// would race two concurrent upgrades onto the same id; this doesn't.
    pub async fn connect_new_site(
        &self,
        socket: axum::extract::ws::WebSocket,
        offset: usize,
    ) -> RoomResult<(Site, super::site::SiteReceiver, u32)> {
        let mut state = self.state.lock().await;

        let max_from_log = state.log.iter().map(|e| e.gid().site_id).max().unwrap_or(0);
        let max_from_sites = state.sites.keys().copied().max().unwrap_or(0);
        let site_id = max_from_log.max(max_from_sites) + 1;

        if state.sites.len() >= self.limits.sites_limit as usize {
            return Err(RoomError::RoomFull);
        }

        let (site, receiver) = Site::new(site_id, socket);
        state.sites.insert(site_id, site.clone());
        info!(site_id, room_id = %self.room_id, "site connected");

        Self::send_catch_up_and_presence(&mut state, &site, site_id, offset).await?;

        Ok((site, receiver, site_id))
    }

    async fn send_catch_up_and_presence(
        state: &mut RoomState,
        site: &Site,
        site_id: u32,
        offset: usize,
    ) -> RoomResult<()> {
        let from = offset.min(state.log.len());
        let catch_up = state.log[from..].to_vec();
        site.send(&WsMessage::crdt_events(catch_up)).await?;

        let peer_ids: Vec<u32> = state.sites.keys().copied().filter(|&id| id != site_id).collect();
        for peer_id in peer_ids {
            let Some(peer) = state.sites.get(&peer_id) else {
                continue;
            };
            if let Some(presence) = peer.last_presence.clone() {
                if let Some(new_site) = state.sites.get(&site_id) {
                    let _ = new_site.send(&WsMessage::site_presence(presence)).await;
                }
            }
        }
        Ok(())
    }

    /// Connect a site whose id is already known. Used by tests that need
    /// to pick a specific site id; production connects always go through
    /// `connect_new_site` so id assignment and insertion are atomic.
    #[cfg(test)]
    pub async fn connect(&self, site: Site, offset: usize) -> RoomResult<()> {
        let mut state = self.state.lock().await;

        let site_id = site.site_id();
        if state.sites.contains_key(&site_id) {
            return Err(RoomError::AlreadyConnected(site_id));
        }
        if state.sites.len() >= self.limits.sites_limit as usize {
            return Err(RoomError::RoomFull);
        }

        state.sites.insert(site_id, site.clone());
        info!(site_id, room_id = %self.room_id, "site connected");

        Self::send_catch_up_and_presence(&mut state, &site, site_id, offset).await?;

        Ok(())
    }

    pub async fn apply_events(&self, events: Vec<CrdtEvent>, sender: u32) -> RoomResult<()> {
        let mut state = self.state.lock().await;

        let site = state
            .sites
            .get(&sender)
            .ok_or_else(|| RoomError::ProtocolViolation(format!("sender {sender} is not connected")))?;
        let sender_present = site.last_presence.is_some();

        for event in &events {
            if let CrdtEvent::Insert { gid, .. } = event {
                if gid.site_id != sender {
                    return Err(RoomError::ProtocolViolation(format!(
                        "insert gid site {} does not match sender {sender}",
                        gid.site_id
                    )));
                }
                if !sender_present {
                    return Err(RoomError::ProtocolViolation(format!(
                        "sender {sender} must advertise presence before inserting"
                    )));
                }
            }
        }

        if state.log.len() + events.len() > self.limits.events_limit {
            return Err(RoomError::LogFull {
                current: state.log.len(),
                incoming: events.len(),
                limit: self.limits.events_limit,
            });
        }

        for event in &events {
            state.document.apply(event)?;
            state.log.push(event.clone());
        }

        state.broadcast(&WsMessage::crdt_events(events), Some(sender)).await;
        Ok(())
    }

    pub async fn apply_presence(&self, presence: SitePresence, sender: u32) -> RoomResult<()> {
        if presence.site_id != sender {
            return Err(RoomError::ProtocolViolation(format!(
                "presence siteId {} does not match sender {sender}",
                presence.site_id
            )));
        }

        let mut state = self.state.lock().await;
        let site = state
            .sites
            .get_mut(&sender)
            .ok_or_else(|| RoomError::ProtocolViolation(format!("sender {sender} is not connected")))?;
        site.last_presence = Some(presence.clone());

        state.broadcast(&WsMessage::site_presence(presence), None).await;
        Ok(())
    }

    pub async fn broadcast(&self, msg: WsMessage, except: Option<u32>) {
        let mut state = self.state.lock().await;
        state.broadcast(&msg, except).await;
    }

    pub async fn disconnect(&self, site_id: u32) {
        let mut state = self.state.lock().await;
        state.disconnect(site_id).await;
    }

    pub async fn gc_sites(&self) {
        let dead: Vec<u32> = {
            let state = self.state.lock().await;
            state
                .sites
                .iter()
                .filter(|(_, site)| !site.is_alive())
                .map(|(id, _)| *id)
                .collect()
        };
        for site_id in dead {
            self.disconnect(site_id).await;
        }
    }

    pub async fn has_active_sites(&self) -> bool {
        !self.state.lock().await.sites.is_empty()
    }

    pub async fn connected_site_ids(&self) -> Vec<u32> {
        self.state.lock().await.sites.keys().copied().collect()
    }

    pub async fn events_len(&self) -> usize {
        self.state.lock().await.log.len()
    }

    pub async fn events_from(&self, offset: usize) -> Vec<CrdtEvent> {
        let state = self.state.lock().await;
        let from = offset.min(state.log.len());
        state.log[from..].to_vec()
    }

    pub async fn materialize(&self) -> String {
        self.state.lock().await.document.materialize()
    }
}

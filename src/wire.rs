//! JSON text-frame schema shared by the room runtime and the websocket
//! transport. Every frame is a sparse object; absent fields are omitted on
//! the wire rather than serialized as `null`.

use serde::{Deserialize, Serialize};

use crate::crdt::CrdtEvent;

/// The literal, non-JSON text frame a client must send right after the
/// connection is accepted, before the server will hand out a site id.
pub const HELLO_FRAME: &str = "Hello";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetSiteId {
    #[serde(rename = "siteId")]
    pub site_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteDisconnected {
    #[serde(rename = "siteId")]
    pub site_id: u32,
}

/// A site's self-description, periodically advertised to peers. The server
/// validates only `site_id`; every other field (display name, cursor, ...)
/// is implementation-defined on the client and echoed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SitePresence {
    #[serde(rename = "siteId")]
    pub site_id: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsMessage {
    #[serde(rename = "setSiteId", skip_serializing_if = "Option::is_none")]
    pub set_site_id: Option<SetSiteId>,
    #[serde(rename = "sitePresence", skip_serializing_if = "Option::is_none")]
    pub site_presence: Option<SitePresence>,
    #[serde(rename = "siteDisconnected", skip_serializing_if = "Option::is_none")]
    pub site_disconnected: Option<SiteDisconnected>,
    #[serde(rename = "crdtEvents", skip_serializing_if = "Option::is_none")]
    pub crdt_events: Option<Vec<CrdtEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbit: Option<bool>,
    #[serde(
        rename = "compactionRequired",
        skip_serializing_if = "Option::is_none"
    )]
    pub compaction_required: Option<bool>,
}

impl WsMessage {
    pub fn crdt_events(events: Vec<CrdtEvent>) -> Self {
        Self {
            crdt_events: Some(events),
            ..Default::default()
        }
    }

    pub fn site_presence(presence: SitePresence) -> Self {
        Self {
            site_presence: Some(presence),
            ..Default::default()
        }
    }

    pub fn set_site_id(site_id: u32) -> Self {
        Self {
            set_site_id: Some(SetSiteId { site_id }),
            ..Default::default()
        }
    }

    pub fn site_disconnected(site_id: u32) -> Self {
        Self {
            site_disconnected: Some(SiteDisconnected { site_id }),
            ..Default::default()
        }
    }

    pub fn heartbit() -> Self {
        Self {
            heartbit: Some(true),
            ..Default::default()
        }
    }

    pub fn compaction_required() -> Self {
        Self {
            compaction_required: Some(true),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_on_the_wire() {
        let json = serde_json::to_string(&WsMessage::heartbit()).unwrap();
        assert_eq!(json, r#"{"heartbit":true}"#);
    }

    #[test]
    fn site_presence_carries_opaque_extra_fields() {
        let raw = r#"{"siteId":3,"name":"ada","cursor":42}"#;
        let presence: SitePresence = serde_json::from_str(raw).unwrap();
        assert_eq!(presence.site_id, 3);
        assert_eq!(presence.extra.get("name").unwrap(), "ada");
        let back = serde_json::to_string(&presence).unwrap();
        let reparsed: SitePresence = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, presence);
    }
}

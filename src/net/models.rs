use serde::Serialize;

use crate::crdt::CrdtEvent;
use crate::config::ServerConfig;

#[derive(Debug, Serialize)]
pub struct RoomSettings {
    #[serde(rename = "documentLimit")]
    pub document_limit: usize,
    #[serde(rename = "heartbitInterval")]
    pub heartbit_interval: u64,
}

impl RoomSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            document_limit: config.document_length_limit,
            heartbit_interval: config.heartbit_interval,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomModel {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub events: Vec<CrdtEvent>,
    pub settings: RoomSettings,
}

#[derive(Debug, Serialize)]
pub struct HealthModel {
    pub status: &'static str,
}

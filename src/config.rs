use std::path::PathBuf;

use clap::Parser;

/// Process configuration, assembled from CLI flags with environment-variable
/// fallbacks on every option.
#[derive(Parser, Debug, Clone)]
#[command(name = "livecoding-server")]
#[command(about = "Real-time collaborative text editing server")]
pub struct Cli {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "DATA_ROOT", default_value = "./data")]
    pub data_root: PathBuf,

    #[arg(long, env = "HEARTBIT_INTERVAL", default_value_t = 5)]
    pub heartbit_interval: u64,

    #[arg(long, env = "DOCUMENT_LENGTH_LIMIT", default_value_t = 25_000)]
    pub document_length_limit: usize,

    #[arg(long, env = "ROOM_SITES_LIMIT", default_value_t = 20)]
    pub room_sites_limit: u32,

    #[arg(long, env = "ROOM_TTL_DAYS", default_value_t = 30)]
    pub room_ttl_days: u64,

    #[arg(long, env = "FLUSH_INTERVAL", default_value_t = 10)]
    pub flush_interval: u64,

    #[arg(long, env = "ROOM_NAME_LENGTH", default_value_t = 14)]
    pub room_name_length: usize,
}

/// Resolved, process-wide configuration shared through `AppState`. Kept
/// separate from `Cli` so unit tests can build one without going through
/// argument parsing.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_root: PathBuf,
    pub heartbit_interval: u64,
    pub document_length_limit: usize,
    pub room_compaction_threshold: usize,
    pub room_events_limit: usize,
    pub room_sites_limit: u32,
    /// `None` disables TTL purging (the CLI's `0` maps to this).
    pub room_ttl_days: Option<u64>,
    pub flush_interval: u64,
    pub room_name_length: usize,
}

impl From<&Cli> for ServerConfig {
    fn from(cli: &Cli) -> Self {
        // Compaction fires after pasting the whole document length, then
        // deleting it and pasting again. The hard limit leaves enough
        // headroom to paste the full document once more after compaction
        // starts before the session gets disconnected.
        let room_compaction_threshold = cli.document_length_limit * 3;
        let room_events_limit = room_compaction_threshold + cli.document_length_limit;

        Self {
            data_root: cli.data_root.clone(),
            heartbit_interval: cli.heartbit_interval,
            document_length_limit: cli.document_length_limit,
            room_compaction_threshold,
            room_events_limit,
            room_sites_limit: cli.room_sites_limit,
            room_ttl_days: (cli.room_ttl_days > 0).then_some(cli.room_ttl_days),
            flush_interval: cli.flush_interval,
            room_name_length: cli.room_name_length,
        }
    }
}

impl ServerConfig {
    /// A fully-populated config for unit and integration tests, so callers
    /// only need to supply the one thing that must vary per test: where
    /// snapshots live.
    pub fn for_tests(data_root: PathBuf) -> Self {
        Self {
            data_root,
            heartbit_interval: 5,
            document_length_limit: 25_000,
            room_compaction_threshold: 75_000,
            room_events_limit: 100_000,
            room_sites_limit: 20,
            room_ttl_days: Some(30),
            flush_interval: 10,
            room_name_length: 14,
        }
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.data_root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_compaction_and_events_limit_from_document_length() {
        let cli = Cli {
            host: "0.0.0.0".into(),
            port: 5000,
            data_root: "./data".into(),
            heartbit_interval: 5,
            document_length_limit: 25_000,
            room_sites_limit: 20,
            room_ttl_days: 30,
            flush_interval: 10,
            room_name_length: 14,
        };
        let config = ServerConfig::from(&cli);
        assert_eq!(config.room_compaction_threshold, 75_000);
        assert_eq!(config.room_events_limit, 100_000);
        assert_eq!(config.room_ttl_days, Some(30));
    }

    #[test]
    fn zero_ttl_days_disables_purging() {
        let cli = Cli {
            host: "0.0.0.0".into(),
            port: 5000,
            data_root: "./data".into(),
            heartbit_interval: 5,
            document_length_limit: 25_000,
            room_sites_limit: 20,
            room_ttl_days: 0,
            flush_interval: 10,
            room_name_length: 14,
        };
        let config = ServerConfig::from(&cli);
        assert_eq!(config.room_ttl_days, None);
    }
}

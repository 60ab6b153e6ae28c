use std::time::{Duration, SystemTime};

use livecoding_server::config::ServerConfig;
use livecoding_server::room::RoomRepository;

#[tokio::test]
async fn purge_removes_snapshots_older_than_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::for_tests(dir.path().to_path_buf());
    config.room_ttl_days = Some(1);
    let repo = RoomRepository::new(config);

    let stale_path = dir.path().join("stale.txt.gz");
    let fresh_path = dir.path().join("fresh.txt.gz");
    tokio::fs::write(&stale_path, b"stale").await.unwrap();
    tokio::fs::write(&fresh_path, b"fresh").await.unwrap();

    let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60);
    filetime::set_file_mtime(&stale_path, filetime::FileTime::from_system_time(two_days_ago)).unwrap();

    repo.purge_stale_rooms().await;

    assert!(!stale_path.exists());
    assert!(fresh_path.exists());
}

#[tokio::test]
async fn purge_is_a_no_op_when_ttl_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::for_tests(dir.path().to_path_buf());
    config.room_ttl_days = None;
    let repo = RoomRepository::new(config);

    let path = dir.path().join("ancient.txt.gz");
    tokio::fs::write(&path, b"ancient").await.unwrap();
    let long_ago = SystemTime::now() - Duration::from_secs(365 * 24 * 60 * 60);
    filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(long_ago)).unwrap();

    repo.purge_stale_rooms().await;

    assert!(path.exists());
}

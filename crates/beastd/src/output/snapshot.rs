//! Serialized snapshot files (§6), written atomically via a temp-name +
//! rename dance so a reader never observes a half-written file. The
//! original writes protobuf `.pb` files; this crate keeps the same
//! atomic-write contract but serializes with `serde_json` instead (see
//! DESIGN.md).

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const HISTORY_SLOTS: u32 = 120;

#[derive(Debug, Serialize)]
pub struct AircraftSnapshot {
    pub hex: String,
    pub callsign: Option<String>,
    pub squawk: Option<u16>,
    pub altitude: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub seen_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct AircraftFile {
    pub now_ms: u64,
    pub messages: u64,
    pub aircraft: Vec<AircraftSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct StatsFile {
    pub now_ms: u64,
    pub tracks: usize,
    pub messages_total: u64,
}

#[derive(Debug, Serialize)]
pub struct ReceiverFile {
    pub version: &'static str,
    pub refresh_ms: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Serializes `value` to a `{name}.tmp` file in `dir` and renames it onto
/// `{name}.json`, so concurrent readers never see a partial write.
pub async fn write_atomic<T: Serialize>(dir: &Path, name: &str, value: &T) -> std::io::Result<()> {
    let final_path = dir.join(format!("{name}.json"));
    let tmp_path = dir.join(format!("{name}.tmp"));
    let body = serde_json::to_vec(value)?;
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&body).await?;
        file.flush().await?;
    }
    tokio::fs::rename(&tmp_path, &final_path).await
}

/// The rotating `history_N.json` path for generation `n`, `n` in `[0, 120)`
/// (§6).
pub fn history_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("history_{}.json", n % HISTORY_SLOTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_leaves_no_tmp_file_behind() {
        let dir = std::env::temp_dir().join(format!("beastd-snapshot-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let stats = StatsFile { now_ms: 1, tracks: 0, messages_total: 0 };
        write_atomic(&dir, "stats", &stats).await.unwrap();
        assert!(dir.join("stats.json").exists());
        assert!(!dir.join("stats.tmp").exists());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn history_path_wraps_at_120() {
        let dir = Path::new("/tmp");
        assert_eq!(history_path(dir, 120), history_path(dir, 0));
    }
}

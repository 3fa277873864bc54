//! File-backed cache of the latest good snapshot per tournament.
//!
//! # Layout
//!
//! ```text
//! data_dir/
//! ├── big_rock_participants.json        # [Participant, ...]
//! ├── big_rock_participants.meta.json   # CacheMeta
//! ├── big_rock_events.json              # [Event, ...] ascending timestamp
//! └── big_rock_events.meta.json
//! ```
//!
//! Every file is replaced whole: bytes go to a temporary file in the same
//! directory, are synced, and the temporary file is renamed over the target.
//! Readers therefore see either the previous snapshot or the new one, never a
//! torn write, and no record-level locking is needed.
//!
//! The metadata file is written only after its snapshot has been renamed into
//! place, so `last_scraped` never advances for a batch that was not
//! persisted.

use crate::error::ScrapeError;
use crate::models::{CacheMeta, Kind};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct CacheStore {
    data_dir: PathBuf,
}

impl CacheStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn snapshot_path(&self, tournament_id: &str, kind: Kind) -> PathBuf {
        self.data_dir.join(format!("{}_{}.json", tournament_id, kind))
    }

    fn meta_path(&self, tournament_id: &str, kind: Kind) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.meta.json", tournament_id, kind))
    }

    /// Replace the snapshot for `(tournament_id, kind)` and stamp it with
    /// `scraped_at`.
    ///
    /// # Errors
    ///
    /// Serialization or I/O failures. On error the previous snapshot and its
    /// metadata are left untouched (or, if only the metadata write failed,
    /// the new snapshot is visible but `last_scraped` has not advanced).
    #[instrument(level = "info", skip(self, records), fields(count = records.len()))]
    pub async fn write<T: Serialize>(
        &self,
        tournament_id: &str,
        kind: Kind,
        records: &[T],
        scraped_at: DateTime<Utc>,
    ) -> Result<(), ScrapeError> {
        let snapshot = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.snapshot_path(tournament_id, kind), &snapshot).await?;

        let meta = CacheMeta {
            tournament_id: tournament_id.to_string(),
            kind,
            last_scraped: scraped_at,
            count: records.len(),
        };
        write_atomic(
            &self.meta_path(tournament_id, kind),
            &serde_json::to_vec_pretty(&meta)?,
        )
        .await?;

        info!(%tournament_id, %kind, count = records.len(), "Snapshot persisted");
        Ok(())
    }

    /// The current snapshot, or an empty list if none was ever written or
    /// the file cannot be decoded.
    pub async fn read<T: DeserializeOwned>(&self, tournament_id: &str, kind: Kind) -> Vec<T> {
        let path = self.snapshot_path(tournament_id, kind);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot unreadable");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot corrupt; serving empty");
                Vec::new()
            }
        }
    }

    pub async fn meta(&self, tournament_id: &str, kind: Kind) -> Option<CacheMeta> {
        let bytes = fs::read(self.meta_path(tournament_id, kind)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether the snapshot was persisted less than `ttl` before `now`.
    pub async fn is_fresh_at(
        &self,
        tournament_id: &str,
        kind: Kind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        match self.meta(tournament_id, kind).await {
            Some(meta) => {
                let age = now - meta.last_scraped;
                debug!(%tournament_id, %kind, age_secs = age.num_seconds(), "Freshness check");
                age < ttl
            }
            None => false,
        }
    }
}

/// Write `bytes` to `path` through a synced temporary sibling and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

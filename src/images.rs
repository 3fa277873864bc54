//! Boat photo downloads.
//!
//! Photos are stored once per uid as `{image_dir}/{uid}.{ext}` and exposed to
//! clients as `{public_base}/{uid}.{ext}`. A photo that already exists on
//! disk is never downloaded again. Every failure degrades to the default
//! asset path instead of failing the roster batch.

use crate::http::Fetch;
use crate::models::Participant;
use crate::scrapers::RawParticipant;
use crate::store::write_atomic;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_IMAGE: &str = "default.jpg";

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

#[derive(Clone)]
pub struct ImageFetcher {
    fetch: Arc<dyn Fetch>,
    image_dir: PathBuf,
    public_base: String,
    timeout: Duration,
    workers: usize,
}

impl ImageFetcher {
    /// # Arguments
    ///
    /// * `image_dir` - Directory photos are written to
    /// * `public_base` - URL path prefix clients use to reach `image_dir`
    /// * `workers` - Maximum downloads in flight for one roster batch
    pub fn new(
        fetch: Arc<dyn Fetch>,
        image_dir: impl Into<PathBuf>,
        public_base: &str,
        timeout: Duration,
        workers: usize,
    ) -> Self {
        Self {
            fetch,
            image_dir: image_dir.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
            timeout,
            workers: workers.max(1),
        }
    }

    /// Public path of the fallback asset.
    pub fn default_path(&self) -> String {
        format!("{}/{}", self.public_base, DEFAULT_IMAGE)
    }

    /// Make sure the photo for `uid` is on disk and return its public path.
    ///
    /// Never fails: any download or write error returns [`Self::default_path`].
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, uid: &str, image_url: Option<&str>) -> String {
        let Some(image_url) = image_url else {
            return self.default_path();
        };
        let file_name = format!("{}.{}", uid, extension_of(image_url));
        let local = self.image_dir.join(&file_name);
        let public = format!("{}/{}", self.public_base, file_name);

        if tokio::fs::try_exists(&local).await.unwrap_or(false) {
            debug!(%uid, "Photo already cached");
            return public;
        }

        let bytes = match self.fetch.bytes(image_url, self.timeout).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!(%uid, %image_url, "Empty photo body; using default");
                return self.default_path();
            }
            Err(e) => {
                warn!(%uid, %image_url, error = %e, "Photo download failed; using default");
                return self.default_path();
            }
        };
        match write_atomic(&local, &bytes).await {
            Ok(()) => {
                debug!(%uid, bytes = bytes.len(), "Saved photo");
                public
            }
            Err(e) => {
                warn!(%uid, path = %local.display(), error = %e, "Photo write failed; using default");
                self.default_path()
            }
        }
    }

    /// Resolve photos for a whole roster with at most `workers` downloads in
    /// flight. Output order matches input order.
    #[instrument(level = "info", skip_all, fields(count = raws.len()))]
    pub async fn fetch_all(&self, raws: Vec<RawParticipant>) -> Vec<Participant> {
        let participants: Vec<Participant> = stream::iter(raws)
            .map(|raw| async move {
                let image_path = self.fetch(&raw.uid, raw.image_url.as_deref()).await;
                Participant {
                    uid: raw.uid,
                    display_name: raw.display_name,
                    boat_type: raw.boat_type,
                    image_path,
                }
            })
            .buffered(self.workers)
            .collect()
            .await;

        let defaulted = participants
            .iter()
            .filter(|p| p.image_path == self.default_path())
            .count();
        info!(count = participants.len(), defaulted, "Resolved boat photos");
        participants
    }
}

/// File extension from the URL path, ignoring query and fragment.
fn extension_of(image_url: &str) -> &'static str {
    let path = url::Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| image_url.split(['?', '#']).next().unwrap_or("").to_string());
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("jpg")
}

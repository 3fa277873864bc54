//! Outbound HTTP behind a small [`Fetch`] capability.
//!
//! The scheduler, settings client and image fetcher all go through this
//! trait, so every external call carries its own timeout and tests can swap
//! in [`testing::StubFetch`] instead of touching the network.

use crate::error::ScrapeError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("tourney_scrape/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body as text. Non-2xx is an error.
    async fn text(&self, url: &str, timeout: Duration) -> Result<String, ScrapeError>;

    /// GET `url` and return the raw body. Non-2xx is an error.
    async fn bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, ScrapeError>;
}

/// [`Fetch`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, ScrapeError> {
        let t0 = Instant::now();
        let resp = self.client.get(url).timeout(timeout).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Upstream returned non-success status");
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(%url, elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched");
        Ok(resp)
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    #[instrument(level = "debug", skip(self))]
    async fn text(&self, url: &str, timeout: Duration) -> Result<String, ScrapeError> {
        Ok(self.get(url, timeout).await?.text().await?)
    }

    #[instrument(level = "debug", skip(self))]
    async fn bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, ScrapeError> {
        Ok(self.get(url, timeout).await?.bytes().await?.to_vec())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned responses keyed by URL. Unknown URLs answer 404.
    #[derive(Default)]
    pub struct StubFetch {
        pages: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
        hits: Mutex<HashMap<String, usize>>,
    }

    impl StubFetch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.set(url, body);
            self
        }

        pub fn failing(self, url: &str, status: u16) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), Err(status));
            self
        }

        pub fn set(&self, url: &str, body: impl Into<Vec<u8>>) {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), Ok(body.into()));
        }

        pub fn hits(&self, url: &str) -> usize {
            self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        fn respond(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
            *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
            match self.pages.lock().unwrap().get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(ScrapeError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
                None => Err(ScrapeError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    #[async_trait]
    impl Fetch for StubFetch {
        async fn text(&self, url: &str, _timeout: Duration) -> Result<String, ScrapeError> {
            let body = self.respond(url)?;
            Ok(String::from_utf8_lossy(&body).into_owned())
        }

        async fn bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, ScrapeError> {
            self.respond(url)
        }
    }

    /// Wraps a [`StubFetch`], delays every call and records the most calls
    /// ever in flight at once.
    pub struct GaugedFetch {
        inner: StubFetch,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GaugedFetch {
        pub fn new(inner: StubFetch, delay: Duration) -> Self {
            Self {
                inner,
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        async fn gauged<T>(&self, call: impl Future<Output = T>) -> T {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let out = call.await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            out
        }
    }

    #[async_trait]
    impl Fetch for GaugedFetch {
        async fn text(&self, url: &str, timeout: Duration) -> Result<String, ScrapeError> {
            self.gauged(self.inner.text(url, timeout)).await
        }

        async fn bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, ScrapeError> {
            self.gauged(self.inner.bytes(url, timeout)).await
        }
    }
}

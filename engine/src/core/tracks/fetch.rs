//! Track File Loading
//!
//! Fetchers retrieve track files; the [`LoadTracker`] runs each fetch as a
//! spawned task and hands completions back to the owner through a channel,
//! so state is only ever mutated by the owner.
//!
//! Every load carries a ticket. Cancelling a load aborts its task and
//! forgets the ticket, so a completion that was already queued is
//! discarded instead of applied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::core::{CoreError, CoreResult, TrackId};

/// Default timeout for a single track fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Fetchers
// =============================================================================

/// Retrieves the content of a track file
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CoreResult<String>;
}

/// Reads track files from the local filesystem.
///
/// Relative paths and `file://` URLs are resolved against the root.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl TrackFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        let path = self.resolve(url);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Serves canned responses, optionally after a delay.
///
/// Useful for headless embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Result<String, String>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.responses.insert(url.to_string(), Err(reason.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TrackFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(CoreError::FetchFailed {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            None => Err(CoreError::FetchFailed {
                url: url.to_string(),
                reason: "not found".to_string(),
            }),
        }
    }
}

/// Fetches track files over HTTP(S)
#[cfg(feature = "http-fetch")]
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http-fetch")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http-fetch")]
#[async_trait]
impl TrackFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        let failed = |e: reqwest::Error| CoreError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?;
        response.text().await.map_err(failed)
    }
}

// =============================================================================
// Load Tracking
// =============================================================================

/// Outcome of one track fetch
#[derive(Debug)]
pub struct LoadCompletion {
    pub track_id: TrackId,
    pub url: String,
    pub result: CoreResult<String>,
    ticket: u64,
}

/// Sends exactly one completion for a load task, including when the task
/// panics or is dropped before finishing.
struct CompletionGuard {
    tx: mpsc::UnboundedSender<LoadCompletion>,
    track_id: TrackId,
    url: String,
    ticket: u64,
    sent: bool,
}

impl CompletionGuard {
    fn complete(mut self, result: CoreResult<String>) {
        self.send(result);
    }

    fn send(&mut self, result: CoreResult<String>) {
        if self.sent {
            return;
        }
        self.sent = true;
        let _ = self.tx.send(LoadCompletion {
            track_id: std::mem::take(&mut self.track_id),
            url: std::mem::take(&mut self.url),
            result,
            ticket: self.ticket,
        });
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.sent {
            let url = self.url.clone();
            self.send(Err(CoreError::FetchFailed {
                url,
                reason: "fetch task ended without a result".to_string(),
            }));
        }
    }
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    generation: u64,
    handle: AbortHandle,
}

/// Owns in-flight track fetches, at most one per track
pub struct LoadTracker {
    fetcher: Arc<dyn TrackFetcher>,
    timeout: Duration,
    tx: mpsc::UnboundedSender<LoadCompletion>,
    rx: mpsc::UnboundedReceiver<LoadCompletion>,
    in_flight: HashMap<TrackId, InFlight>,
    next_ticket: u64,
}

impl std::fmt::Debug for LoadTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTracker")
            .field("timeout", &self.timeout)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl LoadTracker {
    pub fn new(fetcher: Arc<dyn TrackFetcher>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            timeout,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Starts fetching a track file, replacing any load for the same track.
    ///
    /// Fails without starting anything when called outside a tokio runtime.
    pub fn start(&mut self, generation: u64, track_id: &str, url: &str) -> CoreResult<()> {
        self.cancel(track_id);
        let runtime = Handle::try_current().map_err(|e| CoreError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.timeout;
        let guard = CompletionGuard {
            tx: self.tx.clone(),
            track_id: track_id.to_string(),
            url: url.to_string(),
            ticket,
            sent: false,
        };

        let task = runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, fetcher.fetch(&guard.url)).await {
                Ok(result) => result,
                Err(_) => Err(CoreError::FetchTimeout {
                    url: guard.url.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            guard.complete(result);
        });

        debug!(target: "captions", track_id, generation, ticket, "Started track load");
        self.in_flight.insert(
            track_id.to_string(),
            InFlight {
                ticket,
                generation,
                handle: task.abort_handle(),
            },
        );
        Ok(())
    }

    /// Cancels the load of one track. Returns false if none was in flight.
    pub fn cancel(&mut self, track_id: &str) -> bool {
        match self.in_flight.remove(track_id) {
            Some(load) => {
                load.handle.abort();
                debug!(target: "captions", track_id, "Cancelled track load");
                true
            }
            None => false,
        }
    }

    /// Cancels every load started for the given generation
    pub fn cancel_generation(&mut self, generation: u64) -> usize {
        let ids: Vec<TrackId> = self
            .in_flight
            .iter()
            .filter(|(_, load)| load.generation == generation)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.in_flight.len();
        for (_, load) in self.in_flight.drain() {
            load.handle.abort();
        }
        count
    }

    /// Number of loads still in flight
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_loading(&self, track_id: &str) -> bool {
        self.in_flight.contains_key(track_id)
    }

    /// Waits for the next live completion.
    ///
    /// Returns `None` once nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<LoadCompletion> {
        while !self.in_flight.is_empty() {
            let completion = self.rx.recv().await?;
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    /// Returns a live completion that is already queued, without waiting
    pub fn try_next_completion(&mut self) -> Option<LoadCompletion> {
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    fn accept(&mut self, completion: LoadCompletion) -> Option<LoadCompletion> {
        let live = self
            .in_flight
            .get(&completion.track_id)
            .is_some_and(|load| load.ticket == completion.ticket);
        if !live {
            debug!(target: "captions", track_id = %completion.track_id, "Discarding stale track load");
            return None;
        }
        self.in_flight.remove(&completion.track_id);
        Some(completion)
    }
}

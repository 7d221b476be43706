use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::error::Result;
use crate::fetch::Reading;

use super::{ErrorCategory, FetchState};

/// Polls the facade with at most one outstanding request at a time. A
/// generation counter acts as the cancellation token: every state mutation
/// re-checks it, so a superseded fetch resolves into a no-op instead of
/// overwriting state owned by a newer request.
pub struct FetchCoordinator {
    client: Client,
    url: String,
    state: Arc<Mutex<FetchState>>,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl FetchCoordinator {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/", endpoint.trim_end_matches('/')),
            state: Arc::new(Mutex::new(FetchState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
        })
    }

    /// Snapshot of the current state for the presentation layer.
    pub fn state(&self) -> FetchState {
        self.state.lock().unwrap().clone()
    }

    /// Start a fetch unless one is already outstanding. Returns whether a
    /// new fetch was started; a request arriving while loading is ignored.
    pub fn fetch_requested(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_loading {
                return false;
            }
            state.is_loading = true;
            state.error = None;
        }

        // Invalidate whatever might still be winding down before starting.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.in_flight.lock().unwrap().take() {
            handle.abort();
        }

        let client = self.client.clone();
        let url = self.url.clone();
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.generation);

        let handle = tokio::spawn(async move {
            let outcome = perform_fetch(&client, &url).await;
            apply_outcome(&state, &latest, generation, outcome);
        });
        *self.in_flight.lock().unwrap() = Some(handle);
        true
    }

    /// Cancel the in-flight fetch, if any, recording neither success nor
    /// failure. Loading clears so the next tick can start fresh.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.in_flight.lock().unwrap().take() {
            handle.abort();
        }
        self.state.lock().unwrap().is_loading = false;
    }
}

async fn perform_fetch(client: &Client, url: &str) -> std::result::Result<Reading, ErrorCategory> {
    let response = client.get(url).send().await.map_err(classify_transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ErrorCategory::ServerError(status.as_u16()));
    }

    response.json::<Reading>().await.map_err(classify_decode)
}

/// Resolve a finished fetch against the state, unless a newer request has
/// taken over in the meantime.
fn apply_outcome(
    state: &Mutex<FetchState>,
    latest: &AtomicU64,
    generation: u64,
    outcome: std::result::Result<Reading, ErrorCategory>,
) {
    let mut state = state.lock().unwrap();
    if latest.load(Ordering::SeqCst) != generation {
        return;
    }

    state.is_loading = false;
    match outcome {
        Ok(reading) => {
            state.data = Some(reading);
            state.error = None;
            state.last_update = Some(Utc::now());
            log::info!(
                "Reading updated: inside {:.1}C outside {:.1}C",
                reading.inside,
                reading.outside
            );
        }
        Err(category) => {
            state.error = Some(category);
            log::warn!("Fetch failed: {}", category);
        }
    }
}

fn classify_transport(err: reqwest::Error) -> ErrorCategory {
    if err.is_timeout() {
        ErrorCategory::TimedOut
    } else if err.is_connect() {
        ErrorCategory::NoConnectivity
    } else if err.is_body() {
        ErrorCategory::ConnectionLost
    } else {
        ErrorCategory::NetworkError
    }
}

fn classify_decode(err: reqwest::Error) -> ErrorCategory {
    if err.is_timeout() {
        ErrorCategory::TimedOut
    } else if err.is_decode() {
        ErrorCategory::InvalidResponse
    } else {
        ErrorCategory::ConnectionLost
    }
}

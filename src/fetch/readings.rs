use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::config::{expand_env_vars, UpstreamConfig};
use crate::error::Result;

/// One inside/outside temperature pair produced by a single aggregation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub inside: f64,
    pub outside: f64,
}

/// Failures surfaced by one aggregation cycle. Transport errors fold into
/// `Upstream` since the caller treats them the same as a vendor-side error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API rate limit exceeded. Please wait before trying again.")]
    RateLimited,
    #[error("{0}")]
    Upstream(String),
    #[error("Temperature not found in API response")]
    MalformedResponse,
}

/// Queries the two device-status endpoints sequentially, merging both values
/// into one `Reading`. No retries here; retry policy belongs to the caller.
pub struct ReadingFetcher {
    client: Client,
    base_url: String,
    auth_key: String,
    inside_device_id: String,
    outside_device_id: String,
    call_gap: Duration,
}

impl ReadingFetcher {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth_key: expand_env_vars(&cfg.auth_key)?,
            inside_device_id: cfg.inside_device_id.clone(),
            outside_device_id: cfg.outside_device_id.clone(),
            call_gap: Duration::from_millis(cfg.call_gap_ms),
        })
    }

    /// Fetch both devices. The calls are strictly sequential with a pause in
    /// between: issuing them back to back trips the upstream rate limit.
    pub async fn fetch(&self) -> std::result::Result<Reading, FetchError> {
        let inside = self.device_temperature(&self.inside_device_id).await?;
        sleep(self.call_gap).await;
        let outside = self.device_temperature(&self.outside_device_id).await?;
        Ok(Reading { inside, outside })
    }

    async fn device_temperature(&self, device_id: &str) -> std::result::Result<f64, FetchError> {
        let url = format!("{}/device/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", device_id), ("auth_key", self.auth_key.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        extract_temperature(&body)
    }
}

/// Pull the Celsius value out of a device-status payload, mapping the vendor
/// failure shapes onto the fetch error taxonomy.
fn extract_temperature(body: &Value) -> std::result::Result<f64, FetchError> {
    if !body["isok"].as_bool().unwrap_or(false) {
        if body["error"].as_str() == Some("TOO_MANY_REQUESTS")
            || !body["errors"]["TOO_MANY_REQUESTS"].is_null()
        {
            return Err(FetchError::RateLimited);
        }

        let details = if body["errors"].is_null() {
            body
        } else {
            &body["errors"]
        };
        return Err(FetchError::Upstream(details.to_string()));
    }

    body["data"]["device_status"]["temperature:0"]["tC"]
        .as_f64()
        .ok_or(FetchError::MalformedResponse)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    fn test_upstream_config(base_url: String, call_gap_ms: u64) -> UpstreamConfig {
        UpstreamConfig {
            base_url,
            inside_device_id: "inside-dev".to_string(),
            outside_device_id: "outside-dev".to_string(),
            auth_key: "test-key".to_string(),
            call_gap_ms,
        }
    }

    fn device_ok(temp: f64) -> Value {
        json!({
            "isok": true,
            "data": { "device_status": { "temperature:0": { "tC": temp } } }
        })
    }

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn extracts_temperature_from_status_payload() {
        let temp = extract_temperature(&device_ok(21.3)).unwrap();
        assert!((temp - 21.3).abs() < 1e-9);
    }

    #[test]
    fn maps_rate_limit_error_field() {
        let body = json!({ "isok": false, "error": "TOO_MANY_REQUESTS" });
        assert!(matches!(
            extract_temperature(&body),
            Err(FetchError::RateLimited)
        ));
    }

    #[test]
    fn maps_rate_limit_errors_key() {
        let body = json!({ "isok": false, "errors": { "TOO_MANY_REQUESTS": true } });
        assert!(matches!(
            extract_temperature(&body),
            Err(FetchError::RateLimited)
        ));
    }

    #[test]
    fn maps_other_upstream_errors_with_details() {
        let body = json!({ "isok": false, "errors": { "DEVICE_OFFLINE": true } });
        match extract_temperature(&body) {
            Err(FetchError::Upstream(details)) => assert!(details.contains("DEVICE_OFFLINE")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_temperature_field_is_malformed() {
        let body = json!({ "isok": true, "data": { "device_status": {} } });
        assert!(matches!(
            extract_temperature(&body),
            Err(FetchError::MalformedResponse)
        ));
    }

    #[tokio::test]
    async fn waits_between_device_calls() {
        let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/device/status",
            get({
                let starts = Arc::clone(&starts);
                move |Query(params): Query<HashMap<String, String>>| {
                    let starts = Arc::clone(&starts);
                    async move {
                        starts.lock().unwrap().push(Instant::now());
                        let temp = if params["id"] == "inside-dev" { 21.0 } else { 9.0 };
                        Json(device_ok(temp))
                    }
                }
            }),
        );

        let base = spawn_upstream(app).await;
        let fetcher = ReadingFetcher::new(&test_upstream_config(base, 150)).unwrap();

        let reading = fetcher.fetch().await.unwrap();
        assert_eq!(
            reading,
            Reading {
                inside: 21.0,
                outside: 9.0
            }
        );

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 2);
        assert!(starts[1].duration_since(starts[0]) >= std::time::Duration::from_millis(150));
    }

    #[tokio::test]
    async fn rate_limited_inside_call_skips_outside_call() {
        let calls: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
        let app = Router::new().route(
            "/device/status",
            get({
                let calls = Arc::clone(&calls);
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        *calls.lock().unwrap() += 1;
                        Json(json!({ "isok": false, "error": "TOO_MANY_REQUESTS" }))
                    }
                }
            }),
        );

        let base = spawn_upstream(app).await;
        let fetcher = ReadingFetcher::new(&test_upstream_config(base, 10)).unwrap();

        assert!(matches!(fetcher.fetch().await, Err(FetchError::RateLimited)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn passes_device_id_and_auth_key_as_query_params() {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/device/status",
            get({
                let seen = Arc::clone(&seen);
                move |Query(params): Query<HashMap<String, String>>| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.lock()
                            .unwrap()
                            .push((params["id"].clone(), params["auth_key"].clone()));
                        Json(device_ok(10.0))
                    }
                }
            }),
        );

        let base = spawn_upstream(app).await;
        let fetcher = ReadingFetcher::new(&test_upstream_config(base, 1)).unwrap();
        fetcher.fetch().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("inside-dev".to_string(), "test-key".to_string()));
        assert_eq!(seen[1], ("outside-dev".to_string(), "test-key".to_string()));
    }
}

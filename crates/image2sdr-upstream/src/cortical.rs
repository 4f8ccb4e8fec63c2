//! Cortical.io semantic fingerprint client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use image2sdr_core::{CorticalIoConfig, Fingerprint, FingerprintResolver, Result, SdrError};

const SERVICE: &str = "cortical.io";

/// One entry of the `terms` response.
#[derive(Debug, Deserialize)]
struct TermEntry {
    fingerprint: Option<RawFingerprint>,
}

#[derive(Debug, Deserialize)]
struct RawFingerprint {
    positions: Option<Vec<u32>>,
}

fn first_fingerprint(entries: Vec<TermEntry>) -> Option<Fingerprint> {
    entries
        .into_iter()
        .next()
        .and_then(|entry| entry.fingerprint)
        .and_then(|fp| fp.positions)
        .map(Fingerprint::new)
}

/// Resolves term fingerprints through the Cortical.io `terms` endpoint.
pub struct CorticalIoResolver {
    client: Client,
    base_url: String,
    api_key: String,
    retina: String,
}

impl CorticalIoResolver {
    /// Create a resolver with a per-request timeout.
    pub fn new(config: &CorticalIoConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(crate::http_client(SERVICE, timeout)?, config))
    }

    /// Create a resolver sharing an existing HTTP client.
    pub fn with_client(client: Client, config: &CorticalIoConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retina: config.retina.clone(),
        }
    }
}

#[async_trait]
impl FingerprintResolver for CorticalIoResolver {
    async fn fingerprint(&self, term: &str) -> Result<Option<Fingerprint>> {
        let started = Instant::now();
        let url = format!("{}/terms", self.base_url);

        let resp = self
            .client
            .get(&url)
            .header("api-key", &self.api_key)
            .query(&[
                ("retina_name", self.retina.as_str()),
                ("term", term),
                ("start_index", "0"),
                ("max_results", "1"),
                ("get_fingerprint", "true"),
            ])
            .send()
            .await
            .map_err(|e| SdrError::upstream(SERVICE, e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(
                service = SERVICE,
                term,
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "fingerprint lookup returned non-success status"
            );
            return Err(SdrError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let entries: Vec<TermEntry> = resp
            .json()
            .await
            .map_err(|e| SdrError::upstream(SERVICE, format!("Invalid response: {}", e)))?;
        let fingerprint = first_fingerprint(entries);

        debug!(
            service = SERVICE,
            term,
            bits = fingerprint.as_ref().map_or(0, |fp| fp.positions.len()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fingerprint resolved"
        );

        Ok(fingerprint)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::test_support::spawn_mock_server;

    #[derive(Clone)]
    struct MockCortical {
        status: HttpStatus,
        reply: Value,
        seen: Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>,
    }

    async fn handle_terms(
        State(state): State<MockCortical>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (HttpStatus, Json<Value>) {
        let key = headers
            .get("api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        state.seen.lock().unwrap().push((params, key));
        (state.status, Json(state.reply.clone()))
    }

    async fn spawn(status: HttpStatus, reply: Value) -> Option<(CorticalIoResolver, MockCortical)> {
        let state = MockCortical {
            status,
            reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/rest/terms", get(handle_terms))
            .with_state(state.clone());
        let base = spawn_mock_server(app).await?;

        let config = CorticalIoConfig {
            url: format!("{base}/rest/"),
            api_key: "cortical-key".to_string(),
            retina: "en_associative".to_string(),
            sdr_size: 16384,
        };
        let resolver = CorticalIoResolver::new(&config, Duration::from_secs(5)).unwrap();
        Some((resolver, state))
    }

    #[tokio::test]
    async fn test_fingerprint_parses_positions() {
        let reply = json!([{"term": "dog", "fingerprint": {"positions": [3, 99, 1024]}}]);
        let Some((resolver, state)) = spawn(HttpStatus::OK, reply).await else {
            return;
        };

        let fingerprint = resolver.fingerprint("dog").await.unwrap();
        assert_eq!(fingerprint, Some(Fingerprint::new(vec![3, 99, 1024])));

        let seen = state.seen.lock().unwrap();
        let (params, key) = &seen[0];
        assert_eq!(params["term"], "dog");
        assert_eq!(params["retina_name"], "en_associative");
        assert_eq!(params["max_results"], "1");
        assert_eq!(params["get_fingerprint"], "true");
        assert_eq!(key.as_deref(), Some("cortical-key"));
    }

    #[tokio::test]
    async fn test_fingerprint_missing_is_none() {
        for reply in [
            json!([]),
            json!([{"term": "zzz"}]),
            json!([{"term": "zzz", "fingerprint": {}}]),
        ] {
            let Some((resolver, _)) = spawn(HttpStatus::OK, reply).await else {
                return;
            };
            assert_eq!(resolver.fingerprint("zzz").await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_fingerprint_non_success_status() {
        let Some((resolver, _)) = spawn(HttpStatus::BAD_REQUEST, json!({"error": "no"})).await
        else {
            return;
        };

        let err = resolver.fingerprint("dog").await.unwrap_err();
        assert!(matches!(err, SdrError::UpstreamStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_fingerprint_malformed_body() {
        let Some((resolver, _)) = spawn(HttpStatus::OK, json!({"unexpected": true})).await else {
            return;
        };

        let err = resolver.fingerprint("dog").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_fingerprint_times_out() {
        let app = Router::new().route(
            "/rest/terms",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!([]))
            }),
        );
        let Some(base) = spawn_mock_server(app).await else {
            return;
        };
        let config = CorticalIoConfig {
            url: format!("{base}/rest/"),
            ..Default::default()
        };
        let resolver = CorticalIoResolver::new(&config, Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let err = resolver.fingerprint("dog").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}

//! Clarifai image classifier client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use image2sdr_core::{ClarifaiConfig, Classifier, Concept, Result, SdrError};

use crate::http_client;

const SERVICE: &str = "clarifai";

/// `POST models/{model}/outputs` response. Every level may be absent.
#[derive(Debug, Deserialize)]
struct OutputsResponse {
    outputs: Option<Vec<Output>>,
}

#[derive(Debug, Deserialize)]
struct Output {
    data: Option<OutputData>,
}

#[derive(Debug, Deserialize)]
struct OutputData {
    concepts: Option<Vec<RawConcept>>,
}

#[derive(Debug, Deserialize)]
struct RawConcept {
    name: Option<String>,
    #[serde(default)]
    value: f64,
}

impl OutputsResponse {
    /// Concepts of the first output; empty when any level is missing.
    fn into_concepts(self) -> Vec<Concept> {
        self.outputs
            .and_then(|outputs| outputs.into_iter().next())
            .and_then(|output| output.data)
            .and_then(|data| data.concepts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| raw.name.map(|name| Concept::new(name, raw.value)))
            .collect()
    }
}

/// Classifies images through the Clarifai model outputs API.
pub struct ClarifaiClassifier {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClarifaiClassifier {
    /// Create a classifier with a per-request timeout.
    pub fn new(config: &ClarifaiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(http_client(SERVICE, timeout)?, config))
    }

    /// Create a classifier sharing an existing HTTP client.
    pub fn with_client(client: Client, config: &ClarifaiConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn outputs_url(&self) -> String {
        format!("{}/models/{}/outputs", self.base_url, self.model)
    }
}

#[async_trait]
impl Classifier for ClarifaiClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Vec<Concept>> {
        let started = Instant::now();
        let body = serde_json::json!({
            "inputs": [{ "data": { "image": { "base64": BASE64.encode(image) } } }]
        });

        let resp = self
            .client
            .post(self.outputs_url())
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SdrError::upstream(SERVICE, e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(
                service = SERVICE,
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "classifier returned non-success status"
            );
            return Err(SdrError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: OutputsResponse = resp
            .json()
            .await
            .map_err(|e| SdrError::upstream(SERVICE, format!("Invalid response: {}", e)))?;
        let concepts = parsed.into_concepts();

        debug!(
            service = SERVICE,
            concepts = concepts.len(),
            bytes = image.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image classified"
        );

        Ok(concepts)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

//! Configuration types for image2sdr.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SdrError};

/// Environment name that disables per-request logging.
pub const PRODUCTION: &str = "Production";

/// Main configuration for the image2sdr service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Deployment environment ("Production" silences request logs).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// HTTP bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Target fraction of active bits in the merged SDR.
    #[serde(default = "default_sparsity")]
    pub sparsity: f64,

    /// Clarifai classifier configuration.
    #[serde(default)]
    pub clarifai: ClarifaiConfig,

    /// Cortical.io fingerprint configuration.
    #[serde(default)]
    pub cortical_io: CorticalIoConfig,

    /// Server limits and timeouts.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            host: default_host(),
            port: default_port(),
            sparsity: default_sparsity(),
            clarifai: ClarifaiConfig::default(),
            cortical_io: CorticalIoConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Clarifai configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifaiConfig {
    /// API base URL.
    #[serde(default = "default_clarifai_url")]
    pub url: String,

    /// API key, sent as `Authorization: Key <api_key>`.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier.
    #[serde(default = "default_clarifai_model")]
    pub model: String,
}

impl Default for ClarifaiConfig {
    fn default() -> Self {
        Self {
            url: default_clarifai_url(),
            api_key: String::new(),
            model: default_clarifai_model(),
        }
    }
}

/// Cortical.io configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorticalIoConfig {
    /// API base URL.
    #[serde(default = "default_cortical_url")]
    pub url: String,

    /// API key, sent as the `api-key` header.
    #[serde(default)]
    pub api_key: String,

    /// Retina (semantic space) name.
    #[serde(default = "default_retina")]
    pub retina: String,

    /// Size of the retina's fingerprint space.
    #[serde(default = "default_sdr_size")]
    pub sdr_size: usize,
}

impl Default for CorticalIoConfig {
    fn default() -> Self {
        Self {
            url: default_cortical_url(),
            api_key: String::new(),
            retina: default_retina(),
            sdr_size: default_sdr_size(),
        }
    }
}

/// Server limits and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Timeout for each outbound upstream call.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Hard timeout for one upload, covering every upstream call and the merge.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted multipart body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upstream_timeout_secs: default_upstream_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// Default value functions

fn default_environment() -> String {
    "Development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_sparsity() -> f64 {
    0.02
}

fn default_clarifai_url() -> String {
    "https://api.clarifai.com/v2/".to_string()
}

fn default_clarifai_model() -> String {
    // Clarifai "general" model
    "aaa03c23b3724a16a56b629203edc62c".to_string()
}

fn default_cortical_url() -> String {
    "https://api.cortical.io/rest/".to_string()
}

fn default_retina() -> String {
    "en_associative".to_string()
}

fn default_sdr_size() -> usize {
    16384
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServiceConfig {
    /// Load configuration from file.
    ///
    /// `.toml` files are parsed as TOML, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config: Self = if is_toml {
            toml::from_str(&content)
                .map_err(|e| SdrError::config(format!("Failed to parse config: {}", e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| SdrError::config(format!("Failed to parse config: {}", e)))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("image2sdr").join("config.yml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        for local in ["config.yml", "image2sdr.toml"] {
            let local_config = PathBuf::from(local);
            if local_config.exists() {
                return Self::load(&local_config);
            }
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.sparsity.is_finite() || !(0.0..=1.0).contains(&self.sparsity) {
            return Err(SdrError::config(format!(
                "sparsity must be within [0, 1], got {}",
                self.sparsity
            )));
        }
        if self.cortical_io.sdr_size == 0 {
            return Err(SdrError::config("cortical_io.sdr_size must be positive"));
        }
        if self.cortical_io.retina.trim().is_empty() {
            return Err(SdrError::config("cortical_io.retina must be set"));
        }
        if self.clarifai.model.trim().is_empty() {
            return Err(SdrError::config("clarifai.model must be set"));
        }
        if self.server.upstream_timeout_secs == 0 || self.server.request_timeout_secs == 0 {
            return Err(SdrError::config("timeouts must be positive"));
        }
        Ok(())
    }

    /// Whether this deployment runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

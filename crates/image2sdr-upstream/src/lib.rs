//! image2sdr-upstream - Upstream service clients
//!
//! This crate provides the HTTP clients for the two collaborators of the
//! image2sdr pipeline:
//!
//! - [`ClarifaiClassifier`]: labels an image with weighted concepts
//! - [`CorticalIoResolver`]: looks up the semantic fingerprint of a term
//!
//! Response shapes are parsed into explicit optional types; a response that
//! lacks the expected fields yields an empty result, not an error. Static
//! implementations for tests live in [`StaticClassifier`] and
//! [`StaticResolver`].

mod clarifai;
mod cortical;
mod mock;

pub use clarifai::ClarifaiClassifier;
pub use cortical::CorticalIoResolver;
pub use mock::{StaticClassifier, StaticResolver};

// Re-export the collaborator traits for convenience
pub use image2sdr_core::{Classifier, FingerprintResolver};

use std::time::Duration;

use image2sdr_core::{Result, SdrError};

/// Build an HTTP client with a per-request timeout.
pub(crate) fn http_client(service: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SdrError::upstream(service, format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod test_support;

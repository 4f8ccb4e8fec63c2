//! image2sdr-server - Image to SDR HTTP service
//!
//! This crate wires the upstream collaborators and the merge engine into a
//! request pipeline and exposes it over HTTP.
//!
//! # Endpoints
//!
//! - `POST /image` - multipart upload of one or more images, answers `{"sdr": [...]}`
//! - `GET /health` - liveness and merge parameters

mod http;
mod pipeline;

pub use http::{router, run_http, ApiError, HealthResponse};
pub use pipeline::{qualifying_terms, Image2SdrService};

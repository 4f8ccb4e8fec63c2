//! image2sdr-core - Core types and traits for image2sdr
//!
//! This crate provides the shared data model (weighted SDRs, concepts,
//! fingerprints), the collaborator traits for the two upstream services,
//! error handling and service configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, SdrError};
pub use traits::*;
pub use types::*;

//! image2sdr-merge - Weighted SDR merge engine
//!
//! This crate combines any number of weighted fingerprints into a single
//! SDR of fixed size and density.
//!
//! # Features
//!
//! - Additive scoring of every index across all inputs
//! - Top-k selection with a bounded min-heap
//! - Random, position-unbiased tie-breaking
//! - Circular and shuffled index sampling
//!
//! # Example
//!
//! ```rust
//! use image2sdr_merge::{SdrMerger, WeightedSdr};
//!
//! let merger = SdrMerger::new(10, 0.3).unwrap();
//! let sdr = merger.merge(&[
//!     WeightedSdr::new(vec![1, 2, 3], 0.5),
//!     WeightedSdr::new(vec![3, 4], 0.9),
//! ]);
//! assert_eq!(sdr.len(), 3);
//! ```

mod merge;
mod sampler;

pub use merge::{max_bits, merge_weighted_sdrs, merge_weighted_sdrs_with_rng, ScoredUniverse, SdrMerger};
pub use sampler::{sample_indexes, sample_indexes_with_rng};

// Re-export for convenience
pub use image2sdr_core::WeightedSdr;

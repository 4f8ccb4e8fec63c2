//! Weighted merge of fingerprints into a single sparse SDR.

use std::cmp::{Ordering, Reverse};
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use rand::Rng;
use tracing::debug;

use image2sdr_core::{Result, SdrError, ServiceConfig, WeightedSdr};

use crate::sampler::sample_indexes_with_rng;

/// Accumulated score for every index seen across a set of weighted SDRs.
///
/// Each occurrence of an index adds the weight of the SDR it occurs in.
/// Indexes are kept in first-seen order; that order carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct ScoredUniverse {
    /// (index, score) in first-seen order.
    entries: Vec<(u32, f64)>,

    /// Index -> position in `entries`.
    positions: HashMap<u32, usize>,
}

impl ScoredUniverse {
    /// Score every index in `inputs`.
    pub fn from_inputs(inputs: &[WeightedSdr]) -> Self {
        let mut universe = Self::default();
        for input in inputs {
            for &index in &input.sdr {
                universe.add(index, input.weight);
            }
        }
        universe
    }

    fn add(&mut self, index: u32, weight: f64) {
        match self.positions.entry(index) {
            Entry::Occupied(entry) => self.entries[*entry.get()].1 += weight,
            Entry::Vacant(entry) => {
                entry.insert(self.entries.len());
                self.entries.push((index, weight));
            }
        }
    }

    /// Number of distinct indexes (size of the union).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no index was seen.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accumulated score of `index`, if it was seen.
    pub fn score(&self, index: u32) -> Option<f64> {
        self.positions.get(&index).map(|&pos| self.entries[pos].1)
    }

    /// Iterate over (index, score) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.entries.iter().copied()
    }
}

/// A scored index competing for a slot in the result.
///
/// Higher score wins; on equal scores the candidate visited earlier wins.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    visit: usize,
    index: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.visit.cmp(&self.visit))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Number of bits the merged SDR will carry.
///
/// `round(sdr_size * sparsity)`, clamped to the union size. Negative or NaN
/// products yield 0.
pub fn max_bits(sdr_size: usize, sparsity: f64, union_len: usize) -> usize {
    let target = (sdr_size as f64 * sparsity).round();
    (target as usize).min(union_len)
}

/// Merge weighted SDRs using the thread RNG for tie-breaks.
///
/// See [`merge_weighted_sdrs_with_rng`].
pub fn merge_weighted_sdrs(inputs: &[WeightedSdr], sdr_size: usize, sparsity: f64) -> Vec<u32> {
    merge_weighted_sdrs_with_rng(inputs, sdr_size, sparsity, &mut rand::thread_rng())
}

/// Merge weighted SDRs into one SDR of `round(sdr_size * sparsity)` bits.
///
/// Every index is scored by the sum of the weights of the SDRs containing
/// it, and the highest-scoring indexes are kept. Equal scores are resolved
/// by a random traversal order so no index is favoured by its position.
/// A sparsity of 1.0 keeps the whole union (up to `sdr_size` bits).
///
/// The result is sorted ascending. Parameters are not validated here; use
/// [`SdrMerger::new`] at the boundary.
pub fn merge_weighted_sdrs_with_rng<R: Rng + ?Sized>(
    inputs: &[WeightedSdr],
    sdr_size: usize,
    sparsity: f64,
    rng: &mut R,
) -> Vec<u32> {
    let universe = ScoredUniverse::from_inputs(inputs);
    let capacity = max_bits(sdr_size, sparsity, universe.len());

    debug!(
        "Merging {} SDRs: union={}, max_bits={}",
        inputs.len(),
        universe.len(),
        capacity
    );

    if capacity == 0 {
        return Vec::new();
    }

    // Min-heap holding the best `capacity` candidates seen so far
    let mut best: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(capacity);
    let traversal = sample_indexes_with_rng(rng, universe.len(), universe.len(), false);

    for (visit, position) in traversal.into_iter().enumerate() {
        let (index, score) = universe.entries[position];
        let candidate = Candidate {
            score,
            visit,
            index,
        };

        if best.len() < capacity {
            best.push(Reverse(candidate));
        } else if let Some(mut lowest) = best.peek_mut() {
            if candidate > lowest.0 {
                *lowest = Reverse(candidate);
            }
        }
    }

    let mut sdr: Vec<u32> = best.into_iter().map(|Reverse(c)| c.index).collect();
    sdr.sort_unstable();
    sdr
}

/// Validated merge parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdrMerger {
    sdr_size: usize,
    sparsity: f64,
}

impl SdrMerger {
    /// Create a merger for SDRs of `sdr_size` bits at `sparsity` density.
    pub fn new(sdr_size: usize, sparsity: f64) -> Result<Self> {
        if sdr_size == 0 {
            return Err(SdrError::invalid_argument("sdr_size must be positive"));
        }
        if !sparsity.is_finite() || !(0.0..=1.0).contains(&sparsity) {
            return Err(SdrError::invalid_argument(format!(
                "sparsity must be within [0, 1], got {}",
                sparsity
            )));
        }
        Ok(Self { sdr_size, sparsity })
    }

    /// Create a merger from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(config.cortical_io.sdr_size, config.sparsity)
    }

    /// Addressable size of the output SDR.
    pub fn sdr_size(&self) -> usize {
        self.sdr_size
    }

    /// Target density.
    pub fn sparsity(&self) -> f64 {
        self.sparsity
    }

    /// Bits in a merged SDR when the union is large enough.
    pub fn target_bits(&self) -> usize {
        max_bits(self.sdr_size, self.sparsity, usize::MAX)
    }

    /// Merge using the thread RNG.
    pub fn merge(&self, inputs: &[WeightedSdr]) -> Vec<u32> {
        merge_weighted_sdrs(inputs, self.sdr_size, self.sparsity)
    }

    /// Merge using the given RNG for tie-breaks.
    pub fn merge_with_rng<R: Rng + ?Sized>(&self, inputs: &[WeightedSdr], rng: &mut R) -> Vec<u32> {
        merge_weighted_sdrs_with_rng(inputs, self.sdr_size, self.sparsity, rng)
    }
}

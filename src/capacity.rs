//! Memory budget and the choice between dense and streaming graph construction.

use std::fs;

use log::{debug, warn};

use crate::{
    error::{Error, Result},
    kmer::node_space,
};

/// Count tensors store `u32` entries.
pub const BYTES_PER_ENTRY: u128 = 4;

pub const DEFAULT_MEMORY_BUDGET: u64 = 4 << 30;

const MEMINFO_PATH: &str = "/proc/meminfo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    available: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Adjacency lists plus a count tensor over all (k-1)-mers.
    Dense,
    /// Adjacency lists only.
    Streaming,
}

impl MemoryBudget {
    pub fn new(available: u64) -> Self {
        Self { available }
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    /// Queries the memory currently available on the system.
    pub fn detect() -> Option<Self> {
        let meminfo = fs::read_to_string(MEMINFO_PATH).ok()?;
        parse_meminfo(&meminfo).map(Self::new)
    }

    pub fn detect_or_default() -> Self {
        if let Some(budget) = Self::detect() {
            debug!("Detected {} bytes of available memory", budget.available);
            budget
        } else {
            warn!(
                "Could not read available memory from {MEMINFO_PATH}, assuming {DEFAULT_MEMORY_BUDGET} bytes"
            );
            Self::new(DEFAULT_MEMORY_BUDGET)
        }
    }

    pub fn fits(&self, required: u128) -> bool {
        required <= u128::from(self.available)
    }

    pub fn ensure(&self, stage: &'static str, required: u128) -> Result<()> {
        if self.fits(required) {
            Ok(())
        } else {
            Err(Error::ResourceExceeded {
                stage,
                required,
                available: self.available,
            })
        }
    }
}

/// Extracts `MemAvailable` in bytes from the contents of `/proc/meminfo`.
fn parse_meminfo(meminfo: &str) -> Option<u64> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))?;
    let mut fields = line.split_whitespace().skip(1);
    let amount: u64 = fields.next()?.parse().ok()?;
    let multiplier = match fields.next() {
        Some("kB") => 1024,
        Some(_) => return None,
        None => 1,
    };
    amount.checked_mul(multiplier)
}

/// Bytes needed for a square count matrix over `nodes` nodes with `bins` positional bins.
pub fn dense_matrix_bytes(nodes: u128, bins: usize) -> u128 {
    nodes
        .saturating_mul(nodes)
        .saturating_mul(bins as u128)
        .saturating_mul(BYTES_PER_ENTRY)
}

/// Bytes needed for the count tensor over all (k-1)-mers and both sentinels.
pub fn dense_tensor_bytes(k: usize, bins: usize) -> u128 {
    dense_matrix_bytes(u128::from(node_space(k)) + 2, bins)
}

pub fn select_strategy(k: usize, bins: usize, budget: MemoryBudget) -> BuildStrategy {
    if budget.fits(dense_tensor_bytes(k, bins)) {
        BuildStrategy::Dense
    } else {
        BuildStrategy::Streaming
    }
}

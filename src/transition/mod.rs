//! Transition probabilities between graph nodes.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    capacity::{dense_matrix_bytes, MemoryBudget},
    error::{Error, Result},
    graph::{builder::DenseCounts, unitig::Unitig, DeBruijnGraph, NodeId},
    kmer::node_space,
};

pub mod file;

/// Maps node identifiers to matrix indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeIndex {
    /// Every (k-1)-mer is addressed by its own value, followed by START and END.
    Direct { kmer_nodes: u64 },
    /// A sorted node table starting with START and ending with END.
    Table { nodes: Vec<NodeId> },
}

/// A sparse probability vector over node indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    entries: Vec<(usize, f64)>,
}

/// Row-stochastic transition matrix with one block of rows per positional bin.
///
/// Rows are stored sparsely. A row without observed out-edges is empty.
/// Each row also keeps the number of edges it was estimated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    node_count: usize,
    bins: usize,
    rows: Vec<Vec<(usize, f32)>>,
    row_mass: Vec<u64>,
}

/// Everything needed to sample and decode new sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionModel {
    k: usize,
    index: NodeIndex,
    unitigs: Vec<Unitig>,
    matrix: TransitionMatrix,
    start: Distribution,
    end: Distribution,
}

impl NodeIndex {
    pub fn len(&self) -> usize {
        match self {
            NodeIndex::Direct { kmer_nodes } => *kmer_nodes as usize + 2,
            NodeIndex::Table { nodes } => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> usize {
        match self {
            NodeIndex::Direct { kmer_nodes } => *kmer_nodes as usize,
            NodeIndex::Table { .. } => 0,
        }
    }

    pub fn end(&self) -> usize {
        self.len() - 1
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        match (self, node) {
            (NodeIndex::Direct { .. }, NodeId::Start) => Some(self.start()),
            (NodeIndex::Direct { .. }, NodeId::End) => Some(self.end()),
            (NodeIndex::Direct { kmer_nodes }, NodeId::Kmer(value)) => {
                (value < *kmer_nodes).then_some(value as usize)
            }
            (NodeIndex::Direct { .. }, NodeId::Unitig(_)) => None,
            (NodeIndex::Table { nodes }, node) => nodes.binary_search(&node).ok(),
        }
    }

    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        match self {
            NodeIndex::Direct { kmer_nodes } => {
                let kmer_nodes = *kmer_nodes as usize;
                if index < kmer_nodes {
                    Some(NodeId::Kmer(index as u64))
                } else if index == kmer_nodes {
                    Some(NodeId::Start)
                } else if index == kmer_nodes + 1 {
                    Some(NodeId::End)
                } else {
                    None
                }
            }
            NodeIndex::Table { nodes } => nodes.get(index).copied(),
        }
    }
}

impl Distribution {
    /// Normalises `(index, count)` pairs. Zero counts are dropped, and an all-zero input
    /// gives an empty distribution.
    pub fn from_counts(counts: impl IntoIterator<Item = (usize, u64)>) -> Self {
        let counts: Vec<_> = counts.into_iter().filter(|(_, count)| *count > 0).collect();
        let total: u64 = counts.iter().map(|(_, count)| count).sum();
        let entries = counts
            .into_iter()
            .map(|(index, count)| (index, count as f64 / total as f64))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn probability(&self, index: usize) -> f64 {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == index)
            .map(|(_, probability)| *probability)
            .unwrap_or(0.0)
    }
}

impl TransitionMatrix {
    /// Normalises `bins` consecutive square count matrices over `node_count` nodes.
    fn from_counts<'counts>(
        node_count: usize,
        bins: usize,
        count_row: impl Fn(usize, usize) -> &'counts [u32],
    ) -> Self {
        let mut rows = Vec::with_capacity(node_count * bins);
        let mut row_mass = Vec::with_capacity(node_count * bins);
        let mut degenerate_rows = 0;
        for bin in 0..bins {
            for from in 0..node_count {
                let counts = count_row(bin, from);
                let sum: u64 = counts.iter().map(|&count| u64::from(count)).sum();
                row_mass.push(sum);
                if sum == 0 {
                    degenerate_rows += 1;
                    rows.push(Vec::new());
                    continue;
                }
                rows.push(
                    counts
                        .iter()
                        .enumerate()
                        .filter(|(_, &count)| count > 0)
                        .map(|(to, &count)| (to, (f64::from(count) / sum as f64) as f32))
                        .collect(),
                );
            }
        }
        debug!("{degenerate_rows} of {} rows have no outgoing edges", rows.len());

        Self {
            node_count,
            bins,
            rows,
            row_mass,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// The non-zero `(target, probability)` entries of a row.
    pub fn row(&self, bin: usize, from: usize) -> &[(usize, f32)] {
        self.rows
            .get(bin * self.node_count + from)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The number of observed edges a row was normalised from.
    pub fn row_mass(&self, bin: usize, from: usize) -> u64 {
        self.row_mass
            .get(bin * self.node_count + from)
            .copied()
            .unwrap_or(0)
    }

    /// The transitions of `from` over all bins, each bin weighted by its row mass.
    ///
    /// This equals normalising the edge counts summed over all bins.
    pub fn marginal_row(&self, from: usize) -> Vec<(usize, f32)> {
        let total: u64 = (0..self.bins).map(|bin| self.row_mass(bin, from)).sum();
        if total == 0 {
            return Vec::new();
        }

        let mut sums = Vec::<(usize, f64)>::new();
        for bin in 0..self.bins {
            let weight = self.row_mass(bin, from) as f64 / total as f64;
            for &(to, probability) in self.row(bin, from) {
                let weighted = weight * f64::from(probability);
                match sums.binary_search_by_key(&to, |(target, _)| *target) {
                    Ok(position) => sums[position].1 += weighted,
                    Err(position) => sums.insert(position, (to, weighted)),
                }
            }
        }
        sums.into_iter()
            .map(|(to, probability)| (to, probability as f32))
            .collect()
    }

    pub fn probability(&self, bin: usize, from: usize, to: usize) -> f32 {
        self.row(bin, from)
            .iter()
            .find(|(target, _)| *target == to)
            .map(|(_, probability)| *probability)
            .unwrap_or(0.0)
    }

    pub fn row_sum(&self, bin: usize, from: usize) -> f64 {
        self.row(bin, from)
            .iter()
            .map(|(_, probability)| f64::from(*probability))
            .sum()
    }
}

impl TransitionModel {
    /// Normalises the count tensor of a dense build.
    pub fn from_dense_counts(k: usize, counts: &DenseCounts) -> Self {
        let node_count = counts.node_count();
        let matrix =
            TransitionMatrix::from_counts(node_count, counts.bins(), |bin, from| {
                counts.row(bin, from)
            });

        let start = Distribution::from_counts(
            counts
                .start_counts()
                .iter()
                .enumerate()
                .map(|(index, &count)| (index, u64::from(count))),
        );
        let end_index = counts.end_index();
        let end = Distribution::from_counts((0..node_count).map(|from| {
            let count: u64 = (0..counts.bins())
                .map(|bin| u64::from(counts.row(bin, from)[end_index]))
                .sum();
            (from, count)
        }));

        Self {
            k,
            index: NodeIndex::Direct {
                kmer_nodes: node_space(k),
            },
            unitigs: Vec::new(),
            matrix,
            start,
            end,
        }
    }

    /// Counts the edge multiplicities of `graph` in a dense matrix and normalises it.
    ///
    /// Fails if a count matrix with `bins` positional bins would not fit into `budget`.
    /// The graph carries no positions, so the estimated matrix has a single bin.
    pub fn from_graph(graph: DeBruijnGraph, bins: usize, budget: MemoryBudget) -> Result<Self> {
        let mut nodes = graph.nodes();
        nodes.insert(NodeId::Start);
        nodes.insert(NodeId::End);
        let index = NodeIndex::Table {
            nodes: nodes.into_iter().collect(),
        };
        let node_count = index.len();

        let required = dense_matrix_bytes(node_count as u128, bins);
        budget.ensure("transition matrix estimation", required)?;
        let entries = node_count
            .checked_mul(node_count)
            .ok_or(Error::ResourceExceeded {
                stage: "transition matrix estimation",
                required,
                available: budget.available(),
            })?;

        let mut counts = vec![0u32; entries];
        for (&from, successors) in graph.adjacency() {
            let Some(from) = index.index_of(from) else {
                continue;
            };
            for &to in successors {
                if let Some(to) = index.index_of(to) {
                    let count = &mut counts[from * node_count + to];
                    *count = count.saturating_add(1);
                }
            }
        }

        let matrix = TransitionMatrix::from_counts(node_count, 1, |_, from| {
            &counts[from * node_count..(from + 1) * node_count]
        });
        let start_row = index.start() * node_count;
        let start = Distribution::from_counts(
            counts[start_row..start_row + node_count]
                .iter()
                .enumerate()
                .map(|(to, &count)| (to, u64::from(count))),
        );
        let end_index = index.end();
        let end = Distribution::from_counts(
            (0..node_count)
                .map(|from| (from, u64::from(counts[from * node_count + end_index]))),
        );

        Ok(Self {
            k: graph.k(),
            index,
            unitigs: graph.into_unitigs(),
            matrix,
            start,
            end,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &NodeIndex {
        &self.index
    }

    pub fn unitigs(&self) -> &[Unitig] {
        &self.unitigs
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    pub fn start(&self) -> &Distribution {
        &self.start
    }

    pub fn end(&self) -> &Distribution {
        &self.end
    }
}

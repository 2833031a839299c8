use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::kmer::decode_packed;

pub mod builder;
pub mod compaction;
pub mod unitig;

use unitig::{genome_to_string, Unitig};

/// Identifier of a graph node.
///
/// Raw (k-1)-mers carry their packed value. Compacted nodes are indices into the unitig arena
/// of the graph that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Start,
    Kmer(u64),
    Unitig(u32),
    End,
}

impl NodeId {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Start | Self::End)
    }
}

/// A directed De Bruijn graph over (k-1)-mers or unitigs.
///
/// Adjacency lists keep duplicate successors, one per observed k-mer occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeBruijnGraph {
    k: usize,
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    unitigs: Vec<Unitig>,
}

impl DeBruijnGraph {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            adjacency: Default::default(),
            unitigs: Default::default(),
        }
    }

    fn from_parts(
        k: usize,
        adjacency: BTreeMap<NodeId, Vec<NodeId>>,
        unitigs: Vec<Unitig>,
    ) -> Self {
        Self {
            k,
            adjacency,
            unitigs,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.adjacency.entry(from).or_default().push(to);
    }

    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        self.adjacency
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn adjacency(&self) -> &BTreeMap<NodeId, Vec<NodeId>> {
        &self.adjacency
    }

    pub fn unitigs(&self) -> &[Unitig] {
        &self.unitigs
    }

    pub fn into_unitigs(self) -> Vec<Unitig> {
        self.unitigs
    }

    /// All nodes that have an edge, in order.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.adjacency
            .iter()
            .flat_map(|(node, successors)| std::iter::once(node).chain(successors))
            .copied()
            .collect()
    }

    /// Number of edges, counting multiplicity.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Number of distinct raw (k-1)-mers in the graph.
    pub fn kmer_node_count(&self) -> usize {
        self.nodes()
            .into_iter()
            .filter(|node| matches!(node, NodeId::Kmer(_)))
            .count()
    }

    /// The nucleotides a node stands for, or `None` for sentinels and unknown unitigs.
    pub fn symbols(&self, node: NodeId) -> Option<String> {
        match node {
            NodeId::Kmer(value) => Some(decode_packed(value, self.k - 1)),
            NodeId::Unitig(index) => self.unitigs.get(index as usize).map(genome_to_string),
            NodeId::Start | NodeId::End => None,
        }
    }
}

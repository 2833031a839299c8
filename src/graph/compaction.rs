//! Contraction of unary chains into unitigs.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    error::Result,
    progress::{ProgressObserver, Stage},
};

use super::{unitig::genome_from_ascii, DeBruijnGraph, NodeId};

/// Per-node degree information, indexed by position in the sorted node list.
struct Topology {
    nodes: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    unique_successor: Vec<Option<NodeId>>,
    predecessor_count: Vec<usize>,
    single_predecessor: Vec<Option<NodeId>>,
}

impl Topology {
    fn new(graph: &DeBruijnGraph) -> Self {
        let nodes: Vec<_> = graph
            .nodes()
            .into_iter()
            .filter(|node| !node.is_sentinel())
            .collect();
        let positions: HashMap<_, _> = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (*node, position))
            .collect();

        let mut unique_successor = vec![None; nodes.len()];
        let mut predecessor_count = vec![0; nodes.len()];
        let mut single_predecessor = vec![None; nodes.len()];

        for (&from, successors) in graph.adjacency() {
            let mut distinct = successors.clone();
            distinct.sort_unstable();
            distinct.dedup();

            if let (Some(&position), [successor]) = (positions.get(&from), distinct.as_slice()) {
                unique_successor[position] = Some(*successor);
            }
            for to in distinct {
                if let Some(&position) = positions.get(&to) {
                    predecessor_count[position] += 1;
                    single_predecessor[position] = Some(from);
                }
            }
        }

        Self {
            nodes,
            positions,
            unique_successor,
            predecessor_count,
            single_predecessor,
        }
    }

    /// True if `position` cannot be the continuation of another node's chain.
    fn is_chain_head(&self, position: usize) -> bool {
        if self.predecessor_count[position] != 1 {
            return true;
        }
        match self.single_predecessor[position] {
            Some(predecessor @ NodeId::Kmer(_)) | Some(predecessor @ NodeId::Unitig(_)) => {
                self.unique_successor[self.positions[&predecessor]] != Some(self.nodes[position])
            }
            _ => true,
        }
    }

    /// The position of the node continuing the chain at `position`, if it is unvisited.
    fn continuation(&self, position: usize, visited: &[bool]) -> Option<usize> {
        let successor = self.unique_successor[position]?;
        if successor.is_sentinel() {
            return None;
        }
        let next = self.positions[&successor];
        (!visited[next] && self.predecessor_count[next] == 1).then_some(next)
    }
}

/// Contracts every maximal unary chain of `graph` into a single unitig node.
///
/// A chain continues from a node to its successor while the node has exactly one distinct
/// successor, and that successor is unvisited and has exactly one distinct predecessor.
/// Chain heads are expanded first, so each chain is maximal; pure cycles are expanded
/// afterwards from their smallest node. Edge multiplicities of the chain ends are kept.
pub fn compact(
    graph: &DeBruijnGraph,
    progress: &mut impl ProgressObserver,
) -> Result<DeBruijnGraph> {
    let topology = Topology::new(graph);
    let node_count = topology.nodes.len();
    let overlap = graph.k() - 2;

    let mut visited = vec![false; node_count];
    let mut chain_of = vec![0u32; node_count];
    let mut chains: Vec<Vec<usize>> = Vec::new();

    let heads = (0..node_count).filter(|&position| topology.is_chain_head(position));
    let worklist: Vec<_> = heads.chain(0..node_count).collect();

    let mut covered = 0;
    for start in worklist {
        if visited[start] {
            continue;
        }

        let chain_index = chains.len() as u32;
        let mut chain = vec![start];
        visited[start] = true;
        chain_of[start] = chain_index;
        let mut current = start;
        while let Some(next) = topology.continuation(current, &visited) {
            visited[next] = true;
            chain_of[next] = chain_index;
            chain.push(next);
            current = next;
        }

        covered += chain.len();
        progress.report(Stage::Compaction, covered, node_count);
        chains.push(chain);
    }

    let rewire = |node: NodeId| match node {
        NodeId::Start | NodeId::End => node,
        NodeId::Kmer(_) | NodeId::Unitig(_) => {
            NodeId::Unitig(chain_of[topology.positions[&node]])
        }
    };

    let mut adjacency = BTreeMap::new();
    let start_successors: Vec<_> = graph
        .successors(NodeId::Start)
        .iter()
        .copied()
        .map(rewire)
        .collect();
    if !start_successors.is_empty() {
        adjacency.insert(NodeId::Start, start_successors);
    }

    let mut unitigs = Vec::with_capacity(chains.len());
    for (chain_index, chain) in chains.iter().enumerate() {
        let mut symbols = Vec::new();
        for (offset, &position) in chain.iter().enumerate() {
            if let Some(node_symbols) = graph.symbols(topology.nodes[position]) {
                let skip = if offset == 0 { 0 } else { overlap };
                symbols.extend(node_symbols.bytes().skip(skip));
            }
        }
        unitigs.push(genome_from_ascii(&symbols)?);

        let last = topology.nodes[chain[chain.len() - 1]];
        let successors: Vec<_> = graph
            .successors(last)
            .iter()
            .copied()
            .map(rewire)
            .collect();
        if !successors.is_empty() {
            adjacency.insert(NodeId::Unitig(chain_index as u32), successors);
        }
    }

    debug!(
        "Compacted {node_count} nodes into {} unitigs",
        unitigs.len()
    );

    Ok(DeBruijnGraph::from_parts(graph.k(), adjacency, unitigs))
}

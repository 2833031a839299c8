use log::debug;
use rayon::prelude::*;

use crate::{
    capacity::{dense_tensor_bytes, BuildStrategy},
    error::{Error, Result},
    kmer::{node_space, prefix, suffix, KmerStream},
    progress::{ProgressObserver, Stage},
};

use super::{DeBruijnGraph, NodeId};

/// Number of sequences whose k-mers are extracted in parallel before being merged.
const CHUNK_SIZE: usize = 256;

/// Edge counts over all (k-1)-mers and both sentinels, split by positional bin.
///
/// A (k-1)-mer is addressed by its packed value, START by `4^(k-1)` and END by `4^(k-1) + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseCounts {
    node_count: usize,
    bins: usize,
    counts: Vec<u32>,
    start_counts: Vec<u32>,
}

/// The result of graph construction.
#[derive(Debug)]
pub struct BuiltGraph {
    pub graph: DeBruijnGraph,
    /// Present if the dense strategy was used.
    pub dense: Option<DenseCounts>,
}

/// The k-mers of one sequence, each with its positional bin.
struct SequenceKmers {
    kmers: Vec<(u64, usize)>,
}

impl DenseCounts {
    fn new(k: usize, bins: usize) -> Result<Self> {
        let required = dense_tensor_bytes(k, bins);
        let overflow = || Error::ResourceExceeded {
            stage: "dense count tensor",
            required,
            available: 0,
        };
        let node_count = usize::try_from(node_space(k) + 2).map_err(|_| overflow())?;
        let entries = node_count
            .checked_mul(node_count)
            .and_then(|entries| entries.checked_mul(bins))
            .ok_or_else(overflow)?;

        Ok(Self {
            node_count,
            bins,
            counts: vec![0; entries],
            start_counts: vec![0; node_count],
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn start_index(&self) -> usize {
        self.node_count - 2
    }

    pub fn end_index(&self) -> usize {
        self.node_count - 1
    }

    pub fn row(&self, bin: usize, from: usize) -> &[u32] {
        let offset = (bin * self.node_count + from) * self.node_count;
        &self.counts[offset..offset + self.node_count]
    }

    /// How often each node started a sequence.
    pub fn start_counts(&self) -> &[u32] {
        &self.start_counts
    }

    fn add(&mut self, from: usize, to: usize, bin: usize) {
        let index = (bin * self.node_count + from) * self.node_count + to;
        self.counts[index] = self.counts[index].saturating_add(1);
    }
}

/// The positional bin of the k-mer at `index` in a sequence of `length` symbols.
pub fn positional_bin(index: usize, length: usize, bins: usize) -> usize {
    if bins <= 1 || length == 0 {
        return 0;
    }
    let bin = (index as f64 / length as f64 * (bins - 1) as f64).round() as usize;
    bin.min(bins - 1)
}

impl SequenceKmers {
    fn extract(sequence: &[u8], k: usize, bins: usize) -> Result<Self> {
        let kmers = KmerStream::new(sequence, k)?
            .enumerate()
            .map(|(index, kmer)| (kmer, positional_bin(index, sequence.len(), bins)))
            .collect();
        Ok(Self { kmers })
    }
}

/// Builds the De Bruijn graph of `sequences` with the given strategy.
///
/// Every sequence is validated before anything is returned.
pub fn build_graph<Sequence: AsRef<[u8]> + Sync>(
    sequences: &[Sequence],
    k: usize,
    bins: usize,
    strategy: BuildStrategy,
    progress: &mut impl ProgressObserver,
) -> Result<BuiltGraph> {
    if bins == 0 {
        return Err(Error::ZeroBins);
    }
    crate::kmer::check_k(k)?;

    let mut graph = DeBruijnGraph::new(k);
    let mut dense = match strategy {
        BuildStrategy::Dense => Some(DenseCounts::new(k, bins)?),
        BuildStrategy::Streaming => None,
    };

    let mut processed = 0;
    for chunk in sequences.chunks(CHUNK_SIZE) {
        let extracted = chunk
            .par_iter()
            .map(|sequence| SequenceKmers::extract(sequence.as_ref(), k, bins))
            .collect::<Result<Vec<_>>>()?;

        for sequence in extracted {
            merge_sequence(&mut graph, dense.as_mut(), &sequence, k);
        }

        processed += chunk.len();
        progress.report(Stage::BuildGraph, processed, sequences.len());
    }

    debug!(
        "Built graph with {} nodes and {} edges using the {strategy:?} strategy",
        graph.adjacency().len(),
        graph.edge_count()
    );

    Ok(BuiltGraph { graph, dense })
}

fn merge_sequence(
    graph: &mut DeBruijnGraph,
    mut dense: Option<&mut DenseCounts>,
    sequence: &SequenceKmers,
    k: usize,
) {
    let (Some(&(first, _)), Some(&(last, last_bin))) =
        (sequence.kmers.first(), sequence.kmers.last())
    else {
        debug!("Skipping a sequence shorter than k = {k}");
        return;
    };

    let first_node = prefix(first);
    let last_node = suffix(last, k);
    graph.add_edge(NodeId::Start, NodeId::Kmer(first_node));
    if let Some(dense) = dense.as_deref_mut() {
        let start = dense.start_index();
        dense.add(start, first_node as usize, 0);
        let count = &mut dense.start_counts[first_node as usize];
        *count = count.saturating_add(1);
    }

    for &(kmer, bin) in &sequence.kmers {
        let from = prefix(kmer);
        let to = suffix(kmer, k);
        graph.add_edge(NodeId::Kmer(from), NodeId::Kmer(to));
        if let Some(dense) = dense.as_deref_mut() {
            dense.add(from as usize, to as usize, bin);
        }
    }

    graph.add_edge(NodeId::Kmer(last_node), NodeId::End);
    if let Some(dense) = dense {
        let end = dense.end_index();
        dense.add(last_node as usize, end, last_bin);
    }
}

#[cfg(test)]
mod tests {
    use super::{build_graph, positional_bin};
    use crate::{
        capacity::BuildStrategy,
        error::Error,
        graph::NodeId,
        progress::{tests::RecordingProgress, NoProgress, Stage},
    };

    const SEQUENCES: [&str; 4] = [
        "ACGTACGGTCAGTTACGA",
        "ACGTACGTTCAGTTACGA",
        "TTGACCAGT",
        "AC",
    ];

    #[test]
    fn actg() {
        let built = build_graph(&["ACTG"], 3, 1, BuildStrategy::Streaming, &mut NoProgress)
            .unwrap();
        let graph = built.graph;
        assert!(built.dense.is_none());
        // AC -> CT -> TG
        assert_eq!(graph.successors(NodeId::Start), [NodeId::Kmer(0b0001)]);
        assert_eq!(graph.successors(NodeId::Kmer(0b0001)), [NodeId::Kmer(0b0110)]);
        assert_eq!(graph.successors(NodeId::Kmer(0b0110)), [NodeId::Kmer(0b1011)]);
        assert_eq!(graph.successors(NodeId::Kmer(0b1011)), [NodeId::End]);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.kmer_node_count(), 3);
    }

    #[test]
    fn shift_overlap() {
        for k in 3..=8 {
            let built =
                build_graph(&SEQUENCES, k, 1, BuildStrategy::Streaming, &mut NoProgress).unwrap();
            let overlap_mask = (1u64 << (2 * (k - 2))) - 1;
            for (from, successors) in built.graph.adjacency() {
                for to in successors {
                    if let (NodeId::Kmer(from), NodeId::Kmer(to)) = (from, to) {
                        assert_eq!(from & overlap_mask, to >> 2);
                    }
                }
            }
        }
    }

    #[test]
    fn strategies_build_the_same_graph() {
        let streaming =
            build_graph(&SEQUENCES, 4, 3, BuildStrategy::Streaming, &mut NoProgress).unwrap();
        let dense = build_graph(&SEQUENCES, 4, 3, BuildStrategy::Dense, &mut NoProgress).unwrap();
        assert_eq!(streaming.graph, dense.graph);
    }

    #[test]
    fn dense_counts_match_multiplicities() {
        let k = 4;
        let built = build_graph(&SEQUENCES, k, 1, BuildStrategy::Dense, &mut NoProgress).unwrap();
        let dense = built.dense.unwrap();
        assert_eq!(dense.node_count(), 64 + 2);

        let mut total = 0;
        for (from, successors) in built.graph.adjacency() {
            let from = match from {
                NodeId::Start => dense.start_index(),
                NodeId::Kmer(value) => *value as usize,
                other => panic!("unexpected node {other:?}"),
            };
            for to in successors {
                let to = match to {
                    NodeId::End => dense.end_index(),
                    NodeId::Kmer(value) => *value as usize,
                    other => panic!("unexpected node {other:?}"),
                };
                let expected = successors
                    .iter()
                    .filter(|successor| match successor {
                        NodeId::End => to == dense.end_index(),
                        NodeId::Kmer(value) => *value as usize == to,
                        _ => false,
                    })
                    .count();
                assert_eq!(dense.row(0, from)[to] as usize, expected);
            }
            total += successors.len();
        }
        let tensor_total: u32 = (0..dense.node_count())
            .map(|from| dense.row(0, from).iter().sum::<u32>())
            .sum();
        assert_eq!(tensor_total as usize, total);
        // "AC" is too short, so three sequences start.
        assert_eq!(dense.start_counts().iter().sum::<u32>(), 3);
    }

    #[test]
    fn positional_bins() {
        assert_eq!(positional_bin(0, 100, 1), 0);
        assert_eq!(positional_bin(99, 100, 1), 0);
        assert_eq!(positional_bin(0, 100, 5), 0);
        assert_eq!(positional_bin(50, 100, 5), 2);
        assert_eq!(positional_bin(99, 100, 5), 4);
        assert_eq!(positional_bin(12, 100, 5), 0);
        assert_eq!(positional_bin(13, 100, 5), 1);
    }

    #[test]
    fn binned_counts_cover_all_edges() {
        let built = build_graph(&SEQUENCES, 3, 4, BuildStrategy::Dense, &mut NoProgress).unwrap();
        let dense = built.dense.unwrap();
        let tensor_total: u32 = (0..dense.bins())
            .flat_map(|bin| (0..dense.node_count()).map(move |from| (bin, from)))
            .map(|(bin, from)| dense.row(bin, from).iter().sum::<u32>())
            .sum();
        assert_eq!(tensor_total as usize, built.graph.edge_count());
        // START edges are counted in the first bin.
        assert_eq!(
            dense.row(0, dense.start_index()).iter().sum::<u32>(),
            3
        );
    }

    #[test]
    fn invalid_symbols_abort_construction() {
        let result = build_graph(
            &["ACGT", "ACNGT"],
            3,
            1,
            BuildStrategy::Streaming,
            &mut NoProgress,
        );
        assert!(matches!(result, Err(Error::InvalidSymbol { symbol: 'N', .. })));
    }

    #[test]
    fn zero_bins() {
        let result = build_graph(&["ACGT"], 3, 0, BuildStrategy::Dense, &mut NoProgress);
        assert!(matches!(result, Err(Error::ZeroBins)));
    }

    #[test]
    fn reports_progress() {
        let sequences = vec!["ACGTT"; 600];
        let mut progress = RecordingProgress::default();
        build_graph(&sequences, 3, 1, BuildStrategy::Streaming, &mut progress).unwrap();
        assert_eq!(
            progress.events,
            [
                (Stage::BuildGraph, 256, 600),
                (Stage::BuildGraph, 512, 600),
                (Stage::BuildGraph, 600, 600)
            ]
        );
    }
}

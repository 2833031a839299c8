//! Wires graph construction, compaction, estimation, sampling and decoding together.

use log::{info, warn};
use rand::Rng;

use crate::{
    capacity::{select_strategy, MemoryBudget},
    decoder::SequenceDecoder,
    error::{Error, Result},
    graph::{
        builder::{build_graph, BuiltGraph},
        compaction::compact,
    },
    kmer::{check_k, node_space},
    progress::ProgressObserver,
    sampler::{CancellationToken, SamplerConfig, SequenceSampler, WalkerState},
    transition::TransitionModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub k: usize,
    pub bins: usize,
    pub memory_budget: MemoryBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSequence {
    pub sequence: String,
    pub state: WalkerState,
}

/// Builds the De Bruijn graph of `sequences` and estimates its transition model.
///
/// The graph is compacted unless every (k-1)-mer was observed. In that case the dense counts
/// are normalised directly if they were collected, and otherwise the uncompacted graph is
/// counted, which may exceed the memory budget.
pub fn estimate_model<Sequence: AsRef<[u8]> + Sync>(
    sequences: &[Sequence],
    config: &PipelineConfig,
    progress: &mut impl ProgressObserver,
) -> Result<TransitionModel> {
    check_k(config.k)?;
    if config.bins == 0 {
        return Err(Error::ZeroBins);
    }

    let strategy = select_strategy(config.k, config.bins, config.memory_budget);
    info!(
        "Building De Bruijn graph of {} sequences with k = {} using the {strategy:?} strategy",
        sequences.len(),
        config.k
    );
    let BuiltGraph { graph, dense } =
        build_graph(sequences, config.k, config.bins, strategy, progress)?;

    let observed = graph.kmer_node_count();
    let model = if (observed as u64) < node_space(config.k) {
        drop(dense);
        let compacted = compact(&graph, progress)?;
        drop(graph);
        info!(
            "Compacted {observed} distinct (k-1)-mers into {} unitigs",
            compacted.unitigs().len()
        );
        TransitionModel::from_graph(compacted, config.bins, config.memory_budget)?
    } else if let Some(dense) = dense {
        info!("All {observed} (k-1)-mers were observed, the graph is not compacted");
        TransitionModel::from_dense_counts(config.k, &dense)
    } else {
        info!("All {observed} (k-1)-mers were observed, counting the uncompacted graph");
        TransitionModel::from_graph(graph, config.bins, config.memory_budget)?
    };

    info!(
        "Estimated transition model over {} nodes with {} positional bins",
        model.matrix().node_count(),
        model.matrix().bins()
    );
    Ok(model)
}

/// Samples `config.samples` walks from `model` and decodes them.
///
/// Walks that did not reach END are returned truncated, with their final state.
pub fn generate_sequences(
    model: &TransitionModel,
    config: SamplerConfig,
    rng: &mut impl Rng,
    cancellation: &CancellationToken,
    progress: &mut impl ProgressObserver,
) -> Result<Vec<GeneratedSequence>> {
    let sampler = SequenceSampler::new(model, config)?;
    let outcome = sampler.sample(rng, cancellation, progress);
    info!(
        "Sampled {} walks in {} rounds",
        outcome.walks.len(),
        outcome.rounds
    );
    for state in [
        WalkerState::DeadEnd,
        WalkerState::TimedOut,
        WalkerState::Cancelled,
    ] {
        let count = outcome.count(state);
        if count > 0 {
            warn!("{count} walks are truncated ({state:?})");
        }
    }

    let decoder = SequenceDecoder::new(model.k(), model.unitigs());
    outcome
        .walks
        .into_iter()
        .map(|walk| {
            Ok(GeneratedSequence {
                sequence: decoder.decode(&walk.path)?,
                state: walk.state,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::{estimate_model, generate_sequences, PipelineConfig};
    use crate::{
        capacity::MemoryBudget,
        error::Error,
        progress::NoProgress,
        sampler::{BinSelection, CancellationToken, SamplerConfig, WalkerState},
        transition::NodeIndex,
    };

    /// Contains every dinucleotide.
    const ALL_DINUCLEOTIDES: &str = "AACAGATCCGCTGGTTA";

    fn config(k: usize, bins: usize, memory_budget: u64) -> PipelineConfig {
        PipelineConfig {
            k,
            bins,
            memory_budget: MemoryBudget::new(memory_budget),
        }
    }

    fn sampler_config(samples: usize) -> SamplerConfig {
        SamplerConfig {
            samples,
            max_rounds: 10_000,
            bin_selection: BinSelection::Marginal,
        }
    }

    fn kmers(sequence: &str, k: usize) -> impl '_ + Iterator<Item = &str> {
        (0..=sequence.len().saturating_sub(k)).map(move |offset| &sequence[offset..offset + k])
    }

    #[test]
    fn unique_sequence_is_reproduced() {
        let sequence = "GATTACACCGTGGGTACAGTTTAGACA";
        let model = estimate_model(&[sequence], &config(6, 1, u64::MAX), &mut NoProgress).unwrap();
        assert!(matches!(model.index(), NodeIndex::Table { .. }));
        assert_eq!(model.unitigs().len(), 1);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let generated = generate_sequences(
            &model,
            sampler_config(10),
            &mut rng,
            &CancellationToken::default(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(generated.len(), 10);
        for generated in generated {
            assert_eq!(generated.sequence, sequence);
            assert_eq!(generated.state, WalkerState::Ended);
        }
    }

    #[test]
    fn generated_kmers_were_observed() {
        let sequences = [
            "ACGTACGGTCAGTTACGAGGCATTAC",
            "ACGTACGTTCAGTTACGAGGCATTAC",
            "ACGTACGGTCAGATACGAGGCATTAC",
        ];
        let k = 5;
        let observed: HashSet<_> = sequences
            .iter()
            .flat_map(|sequence| kmers(sequence, k))
            .collect();

        let model = estimate_model(&sequences, &config(k, 1, u64::MAX), &mut NoProgress).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let generated = generate_sequences(
            &model,
            sampler_config(50),
            &mut rng,
            &CancellationToken::default(),
            &mut NoProgress,
        )
        .unwrap();
        for generated in generated {
            assert_eq!(generated.state, WalkerState::Ended);
            assert!(generated.sequence.starts_with("ACGT"));
            assert!(generated.sequence.ends_with("TTAC"));
            for kmer in kmers(&generated.sequence, k) {
                assert!(observed.contains(kmer), "{kmer} was never observed");
            }
        }
    }

    #[test]
    fn saturated_graph_uses_dense_counts() {
        let model =
            estimate_model(&[ALL_DINUCLEOTIDES], &config(3, 2, u64::MAX), &mut NoProgress)
                .unwrap();
        assert_eq!(model.index(), &NodeIndex::Direct { kmer_nodes: 16 });
        assert_eq!(model.matrix().bins(), 2);

        let observed: HashSet<_> = kmers(ALL_DINUCLEOTIDES, 3).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let generated = generate_sequences(
            &model,
            sampler_config(20),
            &mut rng,
            &CancellationToken::default(),
            &mut NoProgress,
        )
        .unwrap();
        for generated in generated {
            assert!(generated.sequence.starts_with("AA"));
            for kmer in kmers(&generated.sequence, 3) {
                assert!(observed.contains(kmer), "{kmer} was never observed");
            }
        }
    }

    #[test]
    fn saturated_graph_without_dense_counts_can_exceed_memory() {
        let result = estimate_model(&[ALL_DINUCLEOTIDES], &config(3, 1, 1000), &mut NoProgress);
        assert!(matches!(result, Err(Error::ResourceExceeded { .. })));
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(
            estimate_model(&["ACGTX"], &config(3, 1, u64::MAX), &mut NoProgress),
            Err(Error::InvalidSymbol { symbol: 'X', position: 4 })
        ));
        assert!(matches!(
            estimate_model(&["ACGT"], &config(3, 0, u64::MAX), &mut NoProgress),
            Err(Error::ZeroBins)
        ));
        assert!(matches!(
            estimate_model(&["ACGT"], &config(40, 1, u64::MAX), &mut NoProgress),
            Err(Error::UnsupportedK(40))
        ));
    }
}

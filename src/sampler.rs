//! Lockstep random walks over a transition model.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, warn};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};
use rand_distr::WeightedAliasIndex;

use crate::{
    error::{Error, Result},
    graph::NodeId,
    progress::{ProgressObserver, Stage},
    transition::TransitionModel,
};

/// Which positional bin of the transition matrix drives the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinSelection {
    /// Always the first bin.
    First,
    /// All bins together, each weighted by the number of edges it holds.
    #[default]
    Marginal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub samples: usize,
    pub max_rounds: usize,
    pub bin_selection: BinSelection,
}

/// Cooperative cancellation, checked once per sampling round.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    Active,
    /// Drew END.
    Ended,
    /// Reached a node without out-edges.
    DeadEnd,
    /// Still active after the maximum number of rounds.
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    /// Visited nodes, excluding END.
    pub path: Vec<NodeId>,
    pub state: WalkerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingOutcome {
    pub walks: Vec<Walk>,
    /// Number of completed rounds.
    pub rounds: usize,
}

/// Categorical sampler over the non-zero entries of one row.
struct RowSampler {
    targets: Vec<usize>,
    alias: WeightedAliasIndex<f32>,
}

/// Runs independent walkers over the rows of a transition model.
pub struct SequenceSampler<'model> {
    model: &'model TransitionModel,
    config: SamplerConfig,
    start: WeightedIndex<f64>,
    rows: Vec<Option<RowSampler>>,
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl RowSampler {
    fn new(entries: Vec<(usize, f32)>) -> Option<Self> {
        let (targets, weights): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .filter(|(_, weight)| *weight > 0.0)
            .unzip();
        let alias = WeightedAliasIndex::new(weights).ok()?;
        Some(Self { targets, alias })
    }

    fn sample(&self, rng: &mut impl Rng) -> usize {
        self.targets[self.alias.sample(rng)]
    }
}

impl SamplingOutcome {
    pub fn count(&self, state: WalkerState) -> usize {
        self.walks.iter().filter(|walk| walk.state == state).count()
    }
}

impl<'model> SequenceSampler<'model> {
    pub fn new(model: &'model TransitionModel, config: SamplerConfig) -> Result<Self> {
        let start = WeightedIndex::new(
            model
                .start()
                .entries()
                .iter()
                .map(|(_, probability)| *probability),
        )
        .map_err(|_| Error::EmptyModel)?;

        let matrix = model.matrix();
        let rows = (0..matrix.node_count())
            .map(|from| RowSampler::new(selected_row(model, config.bin_selection, from)))
            .collect();

        Ok(Self {
            model,
            config,
            start,
            rows,
        })
    }

    /// Walks `config.samples` walkers in lockstep rounds until none is active.
    pub fn sample(
        &self,
        rng: &mut impl Rng,
        cancellation: &CancellationToken,
        progress: &mut impl ProgressObserver,
    ) -> SamplingOutcome {
        let index = self.model.index();
        let end = index.end();
        let start_entries = self.model.start().entries();

        let mut current: Vec<usize> = (0..self.config.samples)
            .map(|_| start_entries[self.start.sample(rng)].0)
            .collect();
        let mut paths: Vec<Vec<usize>> = current.iter().map(|&node| vec![node]).collect();
        let mut states = vec![WalkerState::Active; self.config.samples];

        let mut rounds = 0;
        let mut active = self.config.samples;
        while active > 0 {
            if cancellation.is_cancelled() {
                debug!("Sampling cancelled after {rounds} rounds");
                finish_active(&mut states, WalkerState::Cancelled);
                break;
            }
            if rounds == self.config.max_rounds {
                warn!(
                    "{active} of {} walkers did not reach END within {rounds} rounds",
                    self.config.samples
                );
                finish_active(&mut states, WalkerState::TimedOut);
                break;
            }

            for walker in 0..self.config.samples {
                if states[walker] != WalkerState::Active {
                    continue;
                }
                match &self.rows[current[walker]] {
                    Some(row) => {
                        let next = row.sample(rng);
                        if next == end {
                            states[walker] = WalkerState::Ended;
                        } else {
                            current[walker] = next;
                            paths[walker].push(next);
                        }
                    }
                    None => states[walker] = WalkerState::DeadEnd,
                }
            }

            rounds += 1;
            active = states
                .iter()
                .filter(|&&state| state == WalkerState::Active)
                .count();
            progress.report(
                Stage::Sampling,
                self.config.samples - active,
                self.config.samples,
            );
        }

        let walks = paths
            .into_iter()
            .zip(states)
            .map(|(path, state)| Walk {
                path: path
                    .into_iter()
                    .filter_map(|node| index.node_at(node))
                    .collect(),
                state,
            })
            .collect();
        SamplingOutcome { walks, rounds }
    }
}

fn finish_active(states: &mut [WalkerState], final_state: WalkerState) {
    for state in states
        .iter_mut()
        .filter(|state| **state == WalkerState::Active)
    {
        *state = final_state;
    }
}

fn selected_row(
    model: &TransitionModel,
    bin_selection: BinSelection,
    from: usize,
) -> Vec<(usize, f32)> {
    let matrix = model.matrix();
    match bin_selection {
        BinSelection::First => matrix.row(0, from).to_vec(),
        BinSelection::Marginal => matrix.marginal_row(from),
    }
}

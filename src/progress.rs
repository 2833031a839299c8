use std::fmt::{self, Display};

use log::{debug, info};

/// A named pipeline stage, used in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BuildGraph,
    Compaction,
    Sampling,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::BuildGraph => write!(f, "building De Bruijn graph"),
            Stage::Compaction => write!(f, "compacting graph"),
            Stage::Sampling => write!(f, "sampling"),
        }
    }
}

/// Receives discrete progress events from the pipeline.
pub trait ProgressObserver {
    fn report(&mut self, stage: Stage, current: usize, total: usize);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&mut self, _stage: Stage, _current: usize, _total: usize) {}
}

/// Logs progress events, at most once per percent of progress and stage.
#[derive(Debug, Default)]
pub struct LogProgress {
    last: Option<(Stage, usize)>,
}

impl ProgressObserver for LogProgress {
    fn report(&mut self, stage: Stage, current: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            current.saturating_mul(100) / total
        };
        if self.last == Some((stage, percent)) {
            return;
        }
        self.last = Some((stage, percent));

        if current >= total {
            info!("Finished {stage} ({current}/{total})");
        } else {
            debug!("{stage}: {current}/{total} ({percent}%)");
        }
    }
}

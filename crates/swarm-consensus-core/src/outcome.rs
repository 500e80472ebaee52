use crate::agent::Transition;
use serde::{Deserialize, Serialize};

fn default_schema_version() -> u32 {
    1
}

/// Aggregate counts recorded at one snapshot checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSample {
    pub time: u64,
    /// Index 0 counts uncommitted agents, index `k` agents committed to colour `k`.
    pub state_counts: Vec<usize>,
    /// Empirical proportion of each colour on the grid; index `i` is colour `i + 1`.
    pub grid_proportions: Vec<f64>,
}

/// Running totals of opinion-update transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionTally {
    pub discoveries: usize,
    pub recruitments: usize,
    pub cross_inhibitions: usize,
}

impl TransitionTally {
    pub fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Discovery => self.discoveries += 1,
            Transition::Recruitment => self.recruitments += 1,
            Transition::CrossInhibition => self.cross_inhibitions += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.discoveries + self.recruitments + self.cross_inhibitions
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub converged: bool,
    /// First time the majority fraction crossed the threshold in the window
    /// that led to success; `None` when the run did not converge.
    pub adaptation_time: Option<u64>,
    /// Per-snapshot state counts, aligned with `time_history`.
    pub state_history: Vec<Vec<usize>>,
    pub time_history: Vec<u64>,
    pub grid_colour_history: Vec<Vec<f64>>,
    /// Time of the last simulated tick.
    pub final_time: u64,
    #[serde(default)]
    pub majority_colour: u8,
    #[serde(default)]
    pub transitions: TransitionTally,
}

/// One row of the long-form state table: agents in `state` at `time`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRow {
    pub time: u64,
    pub state: usize,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummaryRow {
    pub converged: bool,
    pub adaptation_time: Option<u64>,
    pub final_time: u64,
    pub snapshots: usize,
    /// Fraction of agents committed to the majority colour at the last snapshot.
    pub final_majority_fraction: f64,
    pub discoveries: usize,
    pub recruitments: usize,
    pub cross_inhibitions: usize,
}

impl RunOutcome {
    pub(crate) fn from_samples(
        samples: &[StateSample],
        adaptation_time: Option<u64>,
        final_time: u64,
        majority_colour: u8,
        transitions: TransitionTally,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            converged: adaptation_time.is_some(),
            adaptation_time,
            state_history: samples.iter().map(|s| s.state_counts.clone()).collect(),
            time_history: samples.iter().map(|s| s.time).collect(),
            grid_colour_history: samples
                .iter()
                .map(|s| s.grid_proportions.clone())
                .collect(),
            final_time,
            majority_colour,
            transitions,
        }
    }

    /// Flatten the state history into `(time, state, count)` rows.
    pub fn state_rows(&self) -> Vec<StateRow> {
        self.time_history
            .iter()
            .zip(&self.state_history)
            .flat_map(|(&time, counts)| {
                counts
                    .iter()
                    .enumerate()
                    .map(move |(state, &count)| StateRow { time, state, count })
            })
            .collect()
    }

    pub fn summary(&self) -> RunSummaryRow {
        let final_majority_fraction = self
            .state_history
            .last()
            .map(|counts| {
                let total: usize = counts.iter().sum();
                let majority = counts
                    .get(usize::from(self.majority_colour))
                    .copied()
                    .unwrap_or(0);
                if total == 0 {
                    0.0
                } else {
                    majority as f64 / total as f64
                }
            })
            .unwrap_or(0.0);
        RunSummaryRow {
            converged: self.converged,
            adaptation_time: self.adaptation_time,
            final_time: self.final_time,
            snapshots: self.time_history.len(),
            final_majority_fraction,
            discoveries: self.transitions.discoveries,
            recruitments: self.transitions.recruitments,
            cross_inhibitions: self.transitions.cross_inhibitions,
        }
    }
}

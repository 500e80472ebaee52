use super::super::Environment;
use crate::constants::{ADAPTATION_DWELL, CONVERGENCE_THRESHOLD, SNAPSHOT_INTERVAL};
use crate::outcome::StateSample;
use rand::Rng;

/// Tracks how long the majority fraction has stayed above the consensus threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConvergenceTracker {
    first_crossing: Option<u64>,
    adaptation_time: Option<u64>,
}

impl ConvergenceTracker {
    /// Feed the majority fraction observed at `now`. Returns `true` on the
    /// checkpoint where the swarm first counts as adapted; frozen afterwards.
    pub(crate) fn observe(&mut self, now: u64, majority_fraction: f64) -> bool {
        if self.adaptation_time.is_some() {
            return false;
        }
        if majority_fraction > CONVERGENCE_THRESHOLD {
            let first = *self.first_crossing.get_or_insert(now);
            if now - first >= ADAPTATION_DWELL {
                self.adaptation_time = Some(first);
                return true;
            }
        } else {
            self.first_crossing = None;
        }
        false
    }

    pub(crate) fn first_crossing(&self) -> Option<u64> {
        self.first_crossing
    }

    pub(crate) fn adaptation_time(&self) -> Option<u64> {
        self.adaptation_time
    }

    pub(crate) fn is_adapted(&self) -> bool {
        self.adaptation_time.is_some()
    }
}

impl<R: Rng> Environment<R> {
    /// On snapshot ticks, record aggregate counts and update convergence.
    pub(in crate::environment) fn step_snapshot_phase(&mut self, now: u64) -> Option<StateSample> {
        if !now.is_multiple_of(SNAPSHOT_INTERVAL) {
            return None;
        }
        let state_counts = self.state_counts();
        let committed_to_majority = state_counts
            .get(usize::from(self.majority_colour))
            .copied()
            .unwrap_or(0);
        let majority_fraction = committed_to_majority as f64 / self.agents.len().max(1) as f64;
        let sample = StateSample {
            time: now,
            state_counts,
            grid_proportions: self
                .grid
                .colour_proportions(self.distribution.colour_count()),
        };

        if self.convergence.observe(now, majority_fraction) {
            tracing::info!(
                time = now,
                adaptation_time = ?self.convergence.adaptation_time(),
                "swarm adapted"
            );
        }
        tracing::debug!(
            time = now,
            majority_fraction,
            first_crossing = ?self.convergence.first_crossing(),
            counts = ?sample.state_counts,
            "snapshot"
        );
        self.history.push(sample.clone());
        Some(sample)
    }
}

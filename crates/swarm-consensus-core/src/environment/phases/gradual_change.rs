use super::super::{Environment, SimulationError};
use crate::config::GradualChange;
use crate::constants::GRADUAL_CHANGE_CHECKPOINT;
use crate::grid::{Colour, Grid};
use rand::Rng;

/// Linear drift of the majority colour's share, applied every 300 time units.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GradualSchedule {
    colour: Colour,
    initial_share: f64,
    target_share: f64,
    increment: f64,
    duration: u64,
    checkpoints: u64,
    applied: u64,
}

impl GradualSchedule {
    pub(crate) fn new(change: &GradualChange, colour: Colour, initial_share: f64) -> Self {
        let checkpoints = change.checkpoints();
        let increment = if checkpoints == 0 {
            0.0
        } else {
            (change.target_proportion - initial_share) / checkpoints as f64
        };
        Self {
            colour,
            initial_share,
            target_share: change.target_proportion,
            increment,
            duration: change.duration,
            checkpoints,
            applied: 0,
        }
    }

    pub(crate) fn is_due(&self, now: u64) -> bool {
        now > 0
            && now.is_multiple_of(GRADUAL_CHANGE_CHECKPOINT)
            && now <= self.duration
            && self.applied < self.checkpoints
    }

    /// Record one more checkpoint and return the share it sets. The last
    /// checkpoint lands exactly on the target.
    pub(crate) fn advance(&mut self) -> f64 {
        self.applied += 1;
        if self.applied >= self.checkpoints {
            self.target_share
        } else {
            self.initial_share + self.increment * self.applied as f64
        }
    }

    pub(crate) fn colour(&self) -> Colour {
        self.colour
    }

    pub(crate) fn applied(&self) -> u64 {
        self.applied
    }
}

impl<R: Rng> Environment<R> {
    /// Shift the colour distribution and regenerate the grid on checkpoint ticks.
    pub(in crate::environment) fn step_gradual_change_phase(
        &mut self,
        now: u64,
    ) -> Result<(), SimulationError> {
        let Some(schedule) = self.gradual.as_mut() else {
            return Ok(());
        };
        if !schedule.is_due(now) {
            return Ok(());
        }
        let share = schedule.advance();
        self.distribution = self
            .initial_distribution
            .with_share(schedule.colour(), share)?;
        self.grid = Grid::generate(
            self.grid.width(),
            self.grid.height(),
            &self.distribution,
            &mut self.rng,
        )?;
        tracing::debug!(
            time = now,
            checkpoint = schedule.applied(),
            share,
            "regenerated grid"
        );
        Ok(())
    }
}

use super::super::{Environment, SimulationError};
use rand::Rng;

impl<R: Rng> Environment<R> {
    /// Move every agent, then run its sampling routine if one is due.
    pub(in crate::environment) fn step_motion_phase(
        &mut self,
        now: u64,
    ) -> Result<(), SimulationError> {
        let bounds = self.grid.bounds();
        let tick = self.config.tick_interval as f64;
        for agent in &mut self.agents {
            agent.step_motion(tick * agent.speed, bounds, &mut self.rng);
            agent.run_sampling(now, &self.grid)?;
        }
        Ok(())
    }
}

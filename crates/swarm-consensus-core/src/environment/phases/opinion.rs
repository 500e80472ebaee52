use super::super::Environment;
use rand::Rng;

impl<R: Rng> Environment<R> {
    /// Run every due opinion update and tally the transitions.
    pub(in crate::environment) fn step_opinion_phase(&mut self, now: u64) {
        for agent in &mut self.agents {
            if let Some(transition) = agent.run_opinion_update(now, &mut self.rng) {
                self.transitions.record(transition);
                tracing::trace!(
                    time = now,
                    agent = agent.id,
                    ?transition,
                    decision = ?agent.decision(),
                    "opinion changed"
                );
            }
        }
    }
}

use super::super::Environment;
use crate::spatial;
use rand::Rng;

impl<R: Rng> Environment<R> {
    /// Collect the broadcasts due this tick and deliver them once every
    /// sender has been visited, so a later sender overwrites an earlier one.
    pub(in crate::environment) fn step_broadcast_phase(&mut self, now: u64) {
        if !self.agents.iter().any(|a| a.broadcast_due(now).is_some()) {
            return;
        }

        let tree = spatial::build_index(&self.agents);
        let outbox = &mut self.outbox;
        outbox.clear();
        for agent in &self.agents {
            let Some(colour) = agent.broadcast_due(now) else {
                continue;
            };
            spatial::for_each_neighbor(
                &tree,
                agent.position(),
                agent.communication_range(),
                agent.id,
                |recipient| outbox.push((recipient, colour)),
            );
        }

        tracing::trace!(time = now, messages = outbox.len(), "delivering broadcasts");
        for (recipient, colour) in outbox.drain(..) {
            if let Some(agent) = self.agents.get_mut(recipient as usize) {
                agent.receive(colour);
            }
        }
    }
}

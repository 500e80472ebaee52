pub mod agent;
pub mod config;
pub mod constants;
pub mod environment;
pub mod grid;
pub mod outcome;
pub mod rng;
pub mod spatial;

pub use agent::{Agent, DecisionState, Transition};
pub use config::{AgentParams, GradualChange, SimConfig, SimConfigError};
pub use environment::{Environment, SimulationError, TickReport};
pub use grid::{Colour, ColourDistribution, Grid};
pub use outcome::{RunOutcome, RunSummaryRow, StateRow, StateSample, TransitionTally};

/// Run one replicate to completion with the RNG seeded from `config.seed`.
pub fn run(config: SimConfig) -> Result<RunOutcome, SimulationError> {
    Environment::new(config)?.run()
}

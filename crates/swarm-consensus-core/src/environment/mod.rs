use crate::agent::{Agent, SampleCounterError};
use crate::config::{SimConfig, SimConfigError};
use crate::grid::{Colour, ColourDistribution, Grid};
use crate::outcome::{RunOutcome, StateSample, TransitionTally};
use crate::rng::create_rng;
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};

use phases::{ConvergenceTracker, GradualSchedule};

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Config(SimConfigError),
    InvariantViolation(SampleCounterError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(e) => write!(f, "{}", e),
            SimulationError::InvariantViolation(e) => write!(f, "invariant violated: {}", e),
        }
    }
}

impl From<SimConfigError> for SimulationError {
    fn from(err: SimConfigError) -> Self {
        SimulationError::Config(err)
    }
}

impl From<SampleCounterError> for SimulationError {
    fn from(err: SampleCounterError) -> Self {
        SimulationError::InvariantViolation(err)
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationError::Config(e) => Some(e),
            SimulationError::InvariantViolation(e) => Some(e),
        }
    }
}

/// What happened during one call to [`Environment::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub time: u64,
    /// Present on snapshot ticks (every 200 time units).
    pub snapshot: Option<StateSample>,
    /// Whether the swarm has held consensus long enough to count as adapted.
    pub adapted: bool,
}

/// One simulation instance: the grid, the swarm and the clock.
pub struct Environment<R = ChaCha12Rng> {
    // Keep config private to preserve constructor invariants.
    config: SimConfig,
    rng: R,
    grid: Grid,
    agents: Vec<Agent>,
    initial_distribution: ColourDistribution,
    distribution: ColourDistribution,
    majority_colour: Colour,
    /// Time of the next tick to simulate.
    time: u64,
    last_tick: Option<u64>,
    gradual: Option<GradualSchedule>,
    convergence: ConvergenceTracker,
    history: Vec<StateSample>,
    transitions: TransitionTally,

    // Reused across ticks: (recipient id, colour) pairs in sender order.
    outbox: Vec<(u32, Colour)>,
}

impl Environment<ChaCha12Rng> {
    /// Build an environment seeded from `config.seed`.
    pub fn new(config: SimConfig) -> Result<Self, SimulationError> {
        let rng = create_rng(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Environment<R> {
    /// Build an environment drawing every random decision from `rng`.
    pub fn with_rng(config: SimConfig, mut rng: R) -> Result<Self, SimulationError> {
        config.validate()?;
        let distribution = config.colour_distribution()?;
        let grid = Grid::generate(
            config.grid_width,
            config.grid_height,
            &distribution,
            &mut rng,
        )?;
        let bounds = grid.bounds();
        let agents: Vec<Agent> = (0..config.num_agents)
            .map(|i| Agent::new(i as u32, &config.agent, bounds, &mut rng))
            .collect();
        let majority_colour = distribution.majority_colour();
        let gradual = config.gradual_change.as_ref().map(|change| {
            GradualSchedule::new(
                change,
                majority_colour,
                distribution.probability(majority_colour),
            )
        });
        tracing::debug!(
            agents = agents.len(),
            width = grid.width(),
            height = grid.height(),
            majority_colour,
            "environment initialised"
        );
        Ok(Self {
            config,
            rng,
            grid,
            agents,
            initial_distribution: distribution.clone(),
            distribution,
            majority_colour,
            time: 0,
            last_tick: None,
            gradual,
            convergence: ConvergenceTracker::default(),
            history: Vec::new(),
            transitions: TransitionTally::default(),
            outbox: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Time of the next tick; equals the simulated duration so far.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Time of the most recently simulated tick.
    pub fn last_tick_time(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn majority_colour(&self) -> Colour {
        self.majority_colour
    }

    /// Distribution the current grid was drawn from.
    pub fn colour_distribution(&self) -> &ColourDistribution {
        &self.distribution
    }

    pub fn history(&self) -> &[StateSample] {
        &self.history
    }

    pub fn transitions(&self) -> TransitionTally {
        self.transitions
    }

    pub fn adaptation_time(&self) -> Option<u64> {
        self.convergence.adaptation_time()
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.config.experiment_length
    }

    /// Agents per decision state; index 0 is uncommitted, index `k` colour `k`.
    pub fn state_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.distribution.colour_count() + 1];
        for agent in &self.agents {
            counts[agent.decision().index()] += 1;
        }
        counts
    }

    /// Agents per sampling target; index 0 counts agents with no cycle running.
    pub fn sampling_colour_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.distribution.colour_count() + 1];
        for agent in &self.agents {
            counts[agent.sample_colour().map_or(0, usize::from)] += 1;
        }
        counts
    }

    /// Advance one tick. Returns `Ok(None)` once the experiment length is reached.
    pub fn step(&mut self) -> Result<Option<TickReport>, SimulationError> {
        if self.is_finished() {
            return Ok(None);
        }
        let now = self.time;

        self.step_gradual_change_phase(now)?;
        self.step_motion_phase(now)?;
        self.step_broadcast_phase(now);
        self.step_opinion_phase(now);
        let snapshot = self.step_snapshot_phase(now);

        self.last_tick = Some(now);
        self.time = now + self.config.tick_interval;
        Ok(Some(TickReport {
            time: now,
            snapshot,
            adapted: self.convergence.is_adapted(),
        }))
    }

    /// Lazily step until the experiment length; an error ends the iteration.
    pub fn ticks(&mut self) -> Ticks<'_, R> {
        Ticks {
            env: self,
            done: false,
        }
    }

    /// Step until the swarm adapts or the experiment length is reached.
    pub fn run(&mut self) -> Result<RunOutcome, SimulationError> {
        while !self.convergence.is_adapted() {
            if self.step()?.is_none() {
                break;
            }
        }
        let outcome = self.outcome();
        tracing::info!(
            converged = outcome.converged,
            adaptation_time = ?outcome.adaptation_time,
            final_time = outcome.final_time,
            "run finished"
        );
        Ok(outcome)
    }

    /// Result of the ticks simulated so far.
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome::from_samples(
            &self.history,
            self.convergence.adaptation_time(),
            self.last_tick.unwrap_or(0),
            self.majority_colour,
            self.transitions,
        )
    }
}

/// Iterator over [`Environment::step`] results.
pub struct Ticks<'a, R> {
    env: &'a mut Environment<R>,
    done: bool,
}

impl<R: Rng> Iterator for Ticks<'_, R> {
    type Item = Result<TickReport, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.env.step() {
            Ok(Some(report)) => Some(Ok(report)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

mod phases;
#[cfg(test)]
mod tests;

use crate::constants::{
    GRADUAL_CHANGE_CHECKPOINT, MAX_AGENTS, MAX_EXPERIMENT_LENGTH, MAX_GRID_DIMENSION,
    SNAPSHOT_INTERVAL,
};
use crate::grid::{Colour, ColourDistribution};
use serde::{Deserialize, Serialize};

/// Behavioural parameters shared by every agent of a run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentParams {
    /// Time between opinion updates.
    pub update_interval: u64,
    /// Time between two samples of the cell under the agent.
    pub sample_interval: u64,
    /// Number of samples that make up one sampling cycle.
    pub sample_cycle_length: u32,
    /// Distance travelled per time unit.
    pub speed: f64,
    /// Broadcasts reach agents strictly closer than this.
    pub communication_range: f64,
    /// Decision state every agent starts in (0 = uncommitted, k = colour k).
    pub initial_decision_state: Colour,
    /// Starting belief in the concentration of the committed colour.
    pub initial_estimate: f64,
    /// Fixed start position for every agent; drawn uniformly over the grid when absent.
    pub initial_position: Option<[f64; 2]>,
    /// Colour targeted by the first sampling cycle; when absent the agent
    /// targets whatever colour it is standing on at its first sampling tick.
    pub initial_sample_colour: Option<Colour>,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            update_interval: 200,
            sample_interval: 400,
            sample_cycle_length: 15,
            speed: 0.01,
            communication_range: 2.0,
            initial_decision_state: 2,
            initial_estimate: 0.8,
            initial_position: None,
            initial_sample_colour: None,
        }
    }
}

/// Scheduled linear drift of the majority colour's share of the grid.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct GradualChange {
    /// Share of the majority colour once the change completes.
    pub target_proportion: f64,
    /// Time over which the share moves from its initial value to the target.
    pub duration: u64,
}

impl GradualChange {
    /// Number of checkpoints at which the distribution is shifted.
    pub fn checkpoints(&self) -> u64 {
        self.duration / GRADUAL_CHANGE_CHECKPOINT
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// Number of grid columns.
    pub grid_width: usize,
    /// Number of grid rows.
    pub grid_height: usize,
    /// Probability of each colour; index `i` is colour `i + 1`.
    pub colour_distribution: Vec<f64>,
    /// Number of agents in the swarm.
    pub num_agents: usize,
    /// Simulation time advanced per tick.
    pub tick_interval: u64,
    /// Run stops once simulation time reaches this value.
    pub experiment_length: u64,
    pub agent: AgentParams,
    /// Optional drift of the colour distribution during the run.
    pub gradual_change: Option<GradualChange>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid_width: 20,
            grid_height: 40,
            colour_distribution: vec![0.8, 0.2],
            num_agents: 50,
            tick_interval: 1,
            experiment_length: 20_000,
            agent: AgentParams::default(),
            gradual_change: None,
        }
    }
}

macro_rules! define_sim_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SimConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SimConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_sim_config_error! {
    InvalidNumAgents => "num_agents must be greater than 0";
    TooManyAgents { max: usize, actual: usize } => "Too many agents: {} > max {}", actual, max;
    InvalidGridSize => "grid_width and grid_height must be greater than 0";
    GridTooLarge { max: usize, actual: usize } => "grid dimension ({actual}) exceeds supported maximum ({max})";
    EmptyColourDistribution => "colour_distribution must contain at least one colour";
    TooManyColours { max: usize, actual: usize } => "Too many colours: {} > max {}", actual, max;
    InvalidColourProbability => "colour probabilities must be finite and within [0,1]";
    ColourDistributionSum { sum: f64 } => "colour probabilities must sum to 1 (got {sum})";
    InvalidTickInterval => "tick_interval must be positive and divide both 200 and 300";
    ExperimentTooLong { max: u64, actual: u64 } => "experiment_length ({actual}) exceeds supported maximum ({max})";
    InvalidUpdateInterval => "update_interval must be a positive multiple of tick_interval";
    InvalidSampleInterval => "sample_interval must be a positive multiple of tick_interval";
    InvalidSampleCycleLength => "sample_cycle_length must be greater than 0";
    InvalidSpeed => "speed must be positive and finite";
    InvalidCommunicationRange => "communication_range must be non-negative and finite";
    InvalidInitialDecisionState { colours: usize, actual: Colour } => "initial_decision_state ({actual}) must be 0 or a colour in 1..={colours}";
    InvalidInitialEstimate => "initial_estimate must be finite and within [0,1]";
    UncommittedInitialEstimate => "initial_estimate must be 0 when initial_decision_state is 0";
    InitialPositionOutOfBounds => "initial_position must lie inside the grid";
    InvalidInitialSampleColour { colours: usize, actual: Colour } => "initial_sample_colour ({actual}) must be a colour in 1..={colours}";
    InvalidGradualChangeTarget => "gradual_change.target_proportion must be finite and within [0,1]";
    InvalidGradualChangeDuration => "gradual_change.duration must be at least 300";
}

impl std::error::Error for SimConfigError {}

impl SimConfig {
    pub const MAX_GRID_DIMENSION: usize = MAX_GRID_DIMENSION;

    pub const MAX_AGENTS: usize = MAX_AGENTS;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_population()?;
        self.validate_grid()?;
        let distribution = self.colour_distribution()?;
        self.validate_timing()?;
        self.validate_motion()?;
        self.validate_initial_state(distribution.colour_count())?;
        self.validate_gradual_change()?;
        Ok(())
    }

    /// Parse the configured probability vector into a validated distribution.
    pub fn colour_distribution(&self) -> Result<ColourDistribution, SimConfigError> {
        ColourDistribution::new(self.colour_distribution.clone())
    }

    fn validate_population(&self) -> Result<(), SimConfigError> {
        if self.num_agents == 0 {
            return Err(SimConfigError::InvalidNumAgents);
        }
        if self.num_agents > Self::MAX_AGENTS {
            return Err(SimConfigError::TooManyAgents {
                max: Self::MAX_AGENTS,
                actual: self.num_agents,
            });
        }
        Ok(())
    }

    fn validate_grid(&self) -> Result<(), SimConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(SimConfigError::InvalidGridSize);
        }
        let largest = self.grid_width.max(self.grid_height);
        if largest > Self::MAX_GRID_DIMENSION {
            return Err(SimConfigError::GridTooLarge {
                max: Self::MAX_GRID_DIMENSION,
                actual: largest,
            });
        }
        Ok(())
    }

    fn validate_timing(&self) -> Result<(), SimConfigError> {
        let tick = self.tick_interval;
        if tick == 0
            || !SNAPSHOT_INTERVAL.is_multiple_of(tick)
            || !GRADUAL_CHANGE_CHECKPOINT.is_multiple_of(tick)
        {
            return Err(SimConfigError::InvalidTickInterval);
        }
        if self.experiment_length > MAX_EXPERIMENT_LENGTH {
            return Err(SimConfigError::ExperimentTooLong {
                max: MAX_EXPERIMENT_LENGTH,
                actual: self.experiment_length,
            });
        }
        if self.agent.update_interval == 0 || !self.agent.update_interval.is_multiple_of(tick) {
            return Err(SimConfigError::InvalidUpdateInterval);
        }
        if self.agent.sample_interval == 0 || !self.agent.sample_interval.is_multiple_of(tick) {
            return Err(SimConfigError::InvalidSampleInterval);
        }
        if self.agent.sample_cycle_length == 0 {
            return Err(SimConfigError::InvalidSampleCycleLength);
        }
        Ok(())
    }

    fn validate_motion(&self) -> Result<(), SimConfigError> {
        if !(self.agent.speed.is_finite() && self.agent.speed > 0.0) {
            return Err(SimConfigError::InvalidSpeed);
        }
        if !(self.agent.communication_range.is_finite() && self.agent.communication_range >= 0.0)
        {
            return Err(SimConfigError::InvalidCommunicationRange);
        }
        Ok(())
    }

    fn validate_initial_state(&self, colours: usize) -> Result<(), SimConfigError> {
        let params = &self.agent;
        if params.initial_decision_state as usize > colours {
            return Err(SimConfigError::InvalidInitialDecisionState {
                colours,
                actual: params.initial_decision_state,
            });
        }
        if !(params.initial_estimate.is_finite() && (0.0..=1.0).contains(&params.initial_estimate))
        {
            return Err(SimConfigError::InvalidInitialEstimate);
        }
        if params.initial_decision_state == 0 && params.initial_estimate != 0.0 {
            return Err(SimConfigError::UncommittedInitialEstimate);
        }
        if let Some([x, y]) = params.initial_position {
            let inside = x.is_finite()
                && y.is_finite()
                && (0.0..self.grid_width as f64).contains(&x)
                && (0.0..self.grid_height as f64).contains(&y);
            if !inside {
                return Err(SimConfigError::InitialPositionOutOfBounds);
            }
        }
        if let Some(colour) = params.initial_sample_colour {
            if colour == 0 || colour as usize > colours {
                return Err(SimConfigError::InvalidInitialSampleColour {
                    colours,
                    actual: colour,
                });
            }
        }
        Ok(())
    }

    fn validate_gradual_change(&self) -> Result<(), SimConfigError> {
        let Some(change) = self.gradual_change else {
            return Ok(());
        };
        if !(change.target_proportion.is_finite()
            && (0.0..=1.0).contains(&change.target_proportion))
        {
            return Err(SimConfigError::InvalidGradualChangeTarget);
        }
        if change.checkpoints() == 0 {
            return Err(SimConfigError::InvalidGradualChangeDuration);
        }
        Ok(())
    }
}

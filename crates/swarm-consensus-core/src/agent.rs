//! Per-agent behaviour: motion, sampling, broadcast scheduling and the
//! opinion-update state machine.

use crate::config::AgentParams;
use crate::constants::{BROADCAST_PERIOD_SCALE, BROADCAST_PHASE_TOLERANCE, WAYPOINT_TOLERANCE};
use crate::grid::{Colour, Grid};
use rand::Rng;
use std::fmt;

/// An agent's current commitment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DecisionState {
    #[default]
    Uncommitted,
    Committed(Colour),
}

impl DecisionState {
    /// Map the numeric encoding (0 = uncommitted, k = colour k) onto a state.
    pub fn from_colour(colour: Colour) -> Self {
        if colour == 0 {
            Self::Uncommitted
        } else {
            Self::Committed(colour)
        }
    }

    pub fn colour(self) -> Option<Colour> {
        match self {
            Self::Uncommitted => None,
            Self::Committed(colour) => Some(colour),
        }
    }

    /// Index into per-state count vectors: 0 for uncommitted, `k` for colour `k`.
    pub fn index(self) -> usize {
        self.colour().map_or(0, usize::from)
    }

    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Outcome of a finished sampling cycle, held until the next opinion update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelfEvidence {
    pub colour: Colour,
    pub estimate: f64,
}

/// Which kind of evidence an opinion update acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvidenceSource {
    Discovery,
    Social,
}

/// A change of decision state applied by an opinion update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Adopted the colour found by the agent's own sampling.
    Discovery,
    /// Adopted a neighbour's colour while uncommitted.
    Recruitment,
    /// Dropped its commitment after hearing a conflicting colour.
    CrossInhibition,
}

/// Choose the evidence an opinion update acts on. `coin` is only drawn when
/// both kinds are present and returns `true` for discovery.
pub fn select_transition(
    has_self_evidence: bool,
    has_message: bool,
    coin: impl FnOnce() -> bool,
) -> Option<EvidenceSource> {
    match (has_self_evidence, has_message) {
        (true, true) => Some(if coin() {
            EvidenceSource::Discovery
        } else {
            EvidenceSource::Social
        }),
        (true, false) => Some(EvidenceSource::Discovery),
        (false, true) => Some(EvidenceSource::Social),
        (false, false) => None,
    }
}

/// `2 * min(2 * estimate, 1)`: confident agents broadcast up to twice per 100 time units.
pub fn broadcast_frequency_for(estimate: f64) -> f64 {
    2.0 * (2.0 * estimate).min(1.0)
}

/// A finished sampling cycle reported more matches than samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCounterError {
    pub agent_id: u32,
    pub matches: u32,
    pub samples: u32,
}

impl fmt::Display for SampleCounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "agent {} sampled a concentration above 1 ({} matches in {} samples)",
            self.agent_id, self.matches, self.samples
        )
    }
}

impl std::error::Error for SampleCounterError {}

#[derive(Clone, Debug)]
pub struct Agent {
    /// Index of the agent in its environment; stable for the whole run.
    pub id: u32,
    pub(crate) position: [f64; 2],
    pub(crate) waypoint: [f64; 2],
    /// Unit vector from the position toward the waypoint.
    pub(crate) direction: [f64; 2],
    pub(crate) speed: f64,
    pub(crate) decision: DecisionState,
    pub(crate) committed_estimate: f64,
    pub(crate) broadcast_frequency: f64,
    pub(crate) communication_range: f64,
    pub(crate) sample_colour: Option<Colour>,
    pub(crate) sample_count: u32,
    pub(crate) sample_matches: u32,
    pub(crate) sample_cycle_length: u32,
    pub(crate) evidence: Option<SelfEvidence>,
    /// Last colour heard from a neighbour since the previous opinion update.
    pub(crate) inbox: Option<Colour>,
    pub(crate) new_recruit: bool,
    pub(crate) sample_interval: u64,
    pub(crate) update_interval: u64,
    pub(crate) next_sample_at: u64,
    pub(crate) next_update_at: u64,
}

impl Agent {
    /// Create an agent with the shared behavioural `params`. Draws a start
    /// position (unless fixed by `params`) and a first waypoint from `rng`.
    pub fn new<R: Rng + ?Sized>(
        id: u32,
        params: &AgentParams,
        bounds: [f64; 2],
        rng: &mut R,
    ) -> Self {
        let position = params
            .initial_position
            .unwrap_or_else(|| random_point(bounds, rng));
        let decision = DecisionState::from_colour(params.initial_decision_state);
        let committed_estimate = if decision.is_committed() {
            params.initial_estimate
        } else {
            0.0
        };
        let mut agent = Self {
            id,
            position,
            waypoint: position,
            direction: [0.0, 0.0],
            speed: params.speed,
            decision,
            committed_estimate,
            broadcast_frequency: broadcast_frequency_for(committed_estimate),
            communication_range: params.communication_range,
            sample_colour: params.initial_sample_colour,
            sample_count: 0,
            sample_matches: 0,
            sample_cycle_length: params.sample_cycle_length,
            evidence: None,
            inbox: None,
            new_recruit: false,
            sample_interval: params.sample_interval,
            update_interval: params.update_interval,
            next_sample_at: 0,
            next_update_at: 0,
        };
        agent.choose_waypoint(bounds, rng);
        agent
    }

    pub fn position(&self) -> [f64; 2] {
        self.position
    }

    pub fn waypoint(&self) -> [f64; 2] {
        self.waypoint
    }

    pub fn direction(&self) -> [f64; 2] {
        self.direction
    }

    pub fn decision(&self) -> DecisionState {
        self.decision
    }

    pub fn committed_estimate(&self) -> f64 {
        self.committed_estimate
    }

    pub fn broadcast_frequency(&self) -> f64 {
        self.broadcast_frequency
    }

    pub fn communication_range(&self) -> f64 {
        self.communication_range
    }

    /// Colour targeted by the current sampling cycle, if one is running.
    pub fn sample_colour(&self) -> Option<Colour> {
        self.sample_colour
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn sample_matches(&self) -> u32 {
        self.sample_matches
    }

    pub fn staged_evidence(&self) -> Option<SelfEvidence> {
        self.evidence
    }

    pub fn pending_message(&self) -> Option<Colour> {
        self.inbox
    }

    pub fn is_new_recruit(&self) -> bool {
        self.new_recruit
    }

    pub fn distance_to(&self, point: [f64; 2]) -> f64 {
        distance(self.position, point)
    }

    // --- motion -----------------------------------------------------------

    /// Move toward the waypoint by `travel`, landing exactly on it when closer
    /// than one step, and pick a fresh waypoint once sitting on it.
    pub(crate) fn step_motion<R: Rng + ?Sized>(
        &mut self,
        travel: f64,
        bounds: [f64; 2],
        rng: &mut R,
    ) {
        let remaining = self.distance_to(self.waypoint);
        if remaining < travel {
            if remaining <= WAYPOINT_TOLERANCE {
                self.choose_waypoint(bounds, rng);
            } else {
                self.position = self.waypoint;
            }
        } else {
            self.position = [
                clamp_below(self.position[0] + self.direction[0] * travel, bounds[0]),
                clamp_below(self.position[1] + self.direction[1] * travel, bounds[1]),
            ];
        }
    }

    /// Draw waypoints until one is clear of the current position, then point at it.
    fn choose_waypoint<R: Rng + ?Sized>(&mut self, bounds: [f64; 2], rng: &mut R) {
        loop {
            let candidate = random_point(bounds, rng);
            let dist = self.distance_to(candidate);
            if dist > WAYPOINT_TOLERANCE {
                self.waypoint = candidate;
                self.direction = [
                    (candidate[0] - self.position[0]) / dist,
                    (candidate[1] - self.position[1]) / dist,
                ];
                return;
            }
        }
    }

    // --- sampling ---------------------------------------------------------

    /// Run the sampling routine if one is due at `now`.
    pub(crate) fn run_sampling(&mut self, now: u64, grid: &Grid) -> Result<(), SampleCounterError> {
        if now < self.next_sample_at {
            return Ok(());
        }
        self.next_sample_at = now + self.sample_interval;
        match self.sample_colour {
            None => self.start_sample_cycle(grid),
            Some(target) if self.sample_count < self.sample_cycle_length => {
                self.take_sample(target, grid)
            }
            Some(target) => self.finish_sample_cycle(target)?,
        }
        Ok(())
    }

    fn start_sample_cycle(&mut self, grid: &Grid) {
        self.sample_colour = Some(grid.colour_at(self.position));
        self.sample_count = 0;
        self.sample_matches = 0;
    }

    fn take_sample(&mut self, target: Colour, grid: &Grid) {
        if grid.colour_at(self.position) == target {
            self.sample_matches += 1;
        }
        self.sample_count += 1;
        if self.new_recruit {
            // Recruits broadcast on partial evidence before their first cycle completes.
            let provisional = self.sample_matches as f64 / self.sample_cycle_length as f64;
            self.broadcast_frequency = broadcast_frequency_for(provisional);
        }
    }

    fn finish_sample_cycle(&mut self, target: Colour) -> Result<(), SampleCounterError> {
        if self.sample_count == 0 || self.sample_matches > self.sample_count {
            return Err(SampleCounterError {
                agent_id: self.id,
                matches: self.sample_matches,
                samples: self.sample_count,
            });
        }
        let concentration = self.sample_matches as f64 / self.sample_count as f64;
        if self.decision == DecisionState::Committed(target) {
            self.committed_estimate = concentration;
        } else if (concentration > self.committed_estimate || !self.decision.is_committed())
            && concentration > 0.0
        {
            self.evidence = Some(SelfEvidence {
                colour: target,
                estimate: concentration,
            });
        }
        self.new_recruit = false;
        self.refresh_broadcast_frequency();
        self.sample_colour = None;
        Ok(())
    }

    // --- broadcasting -----------------------------------------------------

    /// Colour to broadcast at `now`, if the agent is committed and `now` is an
    /// integer multiple of its broadcast period `100 / frequency`.
    pub(crate) fn broadcast_due(&self, now: u64) -> Option<Colour> {
        let colour = self.decision.colour()?;
        if self.broadcast_frequency <= 0.0 {
            return None;
        }
        let period = BROADCAST_PERIOD_SCALE / self.broadcast_frequency;
        let phase = now as f64 / period;
        ((phase - phase.round()).abs() <= BROADCAST_PHASE_TOLERANCE).then_some(colour)
    }

    /// Store a neighbour's broadcast; a later message overwrites an earlier one.
    pub(crate) fn receive(&mut self, colour: Colour) {
        self.inbox = Some(colour);
    }

    // --- opinion update ---------------------------------------------------

    /// Run the opinion update if one is due at `now`. The received message is
    /// consumed whether or not a transition fires.
    pub(crate) fn run_opinion_update<R: Rng + ?Sized>(
        &mut self,
        now: u64,
        rng: &mut R,
    ) -> Option<Transition> {
        if now < self.next_update_at {
            return None;
        }
        self.next_update_at = now + self.update_interval;
        let message = self.inbox.take();
        let source = select_transition(self.evidence.is_some(), message.is_some(), || {
            rng.random::<f64>() > 0.5
        })?;
        match (source, message) {
            (EvidenceSource::Discovery, _) => self.apply_discovery(),
            (EvidenceSource::Social, Some(colour)) => self.apply_social(colour),
            (EvidenceSource::Social, None) => None,
        }
    }

    pub(crate) fn apply_discovery(&mut self) -> Option<Transition> {
        let evidence = self.evidence.take()?;
        self.decision = DecisionState::Committed(evidence.colour);
        self.committed_estimate = evidence.estimate;
        self.new_recruit = false;
        self.refresh_broadcast_frequency();
        self.sample_colour = None;
        Some(Transition::Discovery)
    }

    pub(crate) fn apply_social(&mut self, message: Colour) -> Option<Transition> {
        match self.decision {
            DecisionState::Uncommitted => {
                self.decision = DecisionState::from_colour(message);
                self.sample_colour = self.decision.colour();
                self.sample_count = 0;
                self.sample_matches = 0;
                self.evidence = None;
                self.committed_estimate = 0.0;
                self.refresh_broadcast_frequency();
                self.new_recruit = true;
                Some(Transition::Recruitment)
            }
            DecisionState::Committed(current) if current != message => {
                self.decision = DecisionState::Uncommitted;
                self.committed_estimate = 0.0;
                self.new_recruit = false;
                self.refresh_broadcast_frequency();
                self.evidence = None;
                self.sample_colour = None;
                Some(Transition::CrossInhibition)
            }
            DecisionState::Committed(_) => None,
        }
    }

    fn refresh_broadcast_frequency(&mut self) {
        self.broadcast_frequency = broadcast_frequency_for(self.committed_estimate);
    }
}

fn random_point<R: Rng + ?Sized>(bounds: [f64; 2], rng: &mut R) -> [f64; 2] {
    [
        rng.random_range(0.0..bounds[0]),
        rng.random_range(0.0..bounds[1]),
    ]
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Clamp into `[0, bound)`.
fn clamp_below(value: f64, bound: f64) -> f64 {
    let largest = f64::from_bits(bound.to_bits() - 1);
    value.clamp(0.0, largest)
}

/// Time units between aggregate state snapshots (and convergence checks).
pub const SNAPSHOT_INTERVAL: u64 = 200;

/// Time units between gradual-change checkpoints.
pub const GRADUAL_CHANGE_CHECKPOINT: u64 = 300;

/// An agent broadcasting at frequency `f` fires once every `BROADCAST_PERIOD_SCALE / f` time units.
pub const BROADCAST_PERIOD_SCALE: f64 = 100.0;

/// Fraction of the swarm committed to the majority colour that counts as consensus.
pub const CONVERGENCE_THRESHOLD: f64 = 0.7;

/// Time consensus must hold before the swarm is considered adapted (2 simulated minutes).
pub const ADAPTATION_DWELL: u64 = 12_000;

/// Distance at or below which an agent is sitting on its waypoint.
pub const WAYPOINT_TOLERANCE: f64 = 1e-8;

/// Slack accepted when checking that colour probabilities sum to one.
pub const DISTRIBUTION_SUM_TOLERANCE: f64 = 1e-6;

/// Slack used when deciding whether a time is a whole multiple of the broadcast period.
pub const BROADCAST_PHASE_TOLERANCE: f64 = 1e-9;

/// Largest supported grid width or height, in cells.
pub const MAX_GRID_DIMENSION: usize = 4096;

/// Colour ids are `u8` with 0 reserved for "uncommitted".
pub const MAX_COLOURS: usize = 254;

pub const MAX_AGENTS: usize = 100_000;

pub const MAX_EXPERIMENT_LENGTH: u64 = 100_000_000;

/// Prime multiplier used to derive per-replicate seeds from a base seed.
/// Chosen so streams for consecutive replicate indices have minimal overlap.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

mod broadcast;
mod convergence;
mod gradual_change;
mod motion;
mod opinion;

pub(crate) use convergence::ConvergenceTracker;
pub(crate) use gradual_change::GradualSchedule;

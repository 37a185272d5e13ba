//! Global configuration constants for the Jiggle Bones simulation.

/// Default simulation rate of a chain (sub-steps per second).
pub const DEFAULT_UPDATE_RATE: f32 = 60.0;

/// Hard cap on sub-steps run in a single frame. Hitting it discards leftover time.
pub const MAX_SUBSTEPS_PER_FRAME: u32 = 3;

/// Default fraction of verlet velocity removed every sub-step.
pub const DEFAULT_DAMPING: f32 = 0.1;

/// Default pull towards the rest-relative offset.
pub const DEFAULT_ELASTICITY: f32 = 0.1;

/// Default shape preservation (1.0 = no slack around the rest offset).
pub const DEFAULT_STIFFNESS: f32 = 0.1;

/// Default share of owner movement that is ignored by the simulation.
pub const DEFAULT_INERT: f32 = 0.0;

/// Minimum number of particles handed to one rayon task.
pub const PARALLEL_MIN_LEN: usize = 8;

/// Frame budget (milliseconds) above which a warning is emitted.
pub const DEFAULT_FRAME_BUDGET_MS: f32 = 2.0;

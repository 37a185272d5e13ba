//! Simulation dynamics: sub-step scheduling, verlet integration, constraints and stage execution.

pub mod integrator;
pub mod parallel;
pub mod scheduler;
pub mod solver;

pub use integrator::{follow_animation, integrate_particle, ChainFrame};
pub use parallel::{
    carry_stage, constrain_stage, integrate_stage, run_per_chain, run_substeps, ExecutionStrategy,
};
pub use scheduler::SubstepScheduler;
pub use solver::{carry_particle, constrain_particle, ParentView};

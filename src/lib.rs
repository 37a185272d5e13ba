//! Jiggle Bones – verlet secondary motion for transform hierarchies.
//!
//! Chains of nodes (hair, tails, cloth strips) are flattened into particle
//! arrays and simulated every frame: Prepare samples the animated pose,
//! a fixed-rate scheduler decides how many verlet sub-steps to run, and
//! Write-back turns and moves the nodes onto the simulated positions.

pub mod batch;
pub mod component;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod host;
pub mod utils;

pub use glam::{Mat4, Quat, Vec3};

pub use batch::{Batch, BatchConfig, ChainId, ChainRecord, FrameReport};
pub use component::{shared_batch, JiggleChain, SharedBatch};
pub use crate::core::{
    chain::ChainConfig,
    flatten::{flatten_hierarchy, FlattenedChain},
    particle::{Particle, ParticleMeta, PoseSnapshot, VerletState},
    soa::{ChainSpan, ParticleRef, ParticleStore},
    types::{CoefficientCurves, Coefficients, Curve, Transform},
};
pub use dynamics::{ChainFrame, ExecutionStrategy, SubstepScheduler};
pub use error::{Result, SetupError};
pub use host::{Hierarchy, NodeId, SceneGraph, SceneNode};
pub use utils::allocator::{Arena, EntityId, GenerationalId};

/// High-level convenience wrapper that owns a [`Batch`].
///
/// Chains are queued with [`add_chain`](Self::add_chain) and registered in one
/// go by [`prepare_setup`](Self::prepare_setup); afterwards the host calls
/// [`advance`](Self::advance) once per frame.
pub struct JiggleEngine {
    batch: Batch,
    pending: Vec<ChainConfig>,
}

impl Default for JiggleEngine {
    fn default() -> Self {
        Self::with_config(BatchConfig::default())
    }
}

impl JiggleEngine {
    /// Creates an engine whose batch scheduler runs at `update_rate` sub-steps per second.
    pub fn new(update_rate: f32) -> Self {
        Self::with_config(BatchConfig {
            update_rate,
            ..BatchConfig::default()
        })
    }

    pub fn with_config(config: BatchConfig) -> Self {
        Self {
            batch: Batch::new(config),
            pending: Vec::new(),
        }
    }

    /// Queues a chain for the next [`prepare_setup`](Self::prepare_setup).
    ///
    /// A configuration with extra roots queues one chain per subtree.
    pub fn add_chain(&mut self, config: ChainConfig) -> &mut Self {
        self.pending.extend(config.trees());
        self
    }

    /// Registers every queued chain, in queue order.
    ///
    /// Each chain succeeds or fails on its own; a failing chain is not
    /// registered and does not stop the others.
    pub fn prepare_setup<H: Hierarchy>(&mut self, host: &H) -> Vec<Result<ChainId>> {
        self.pending
            .drain(..)
            .map(|config| {
                let result = self.batch.register_chain(host, config);
                if let Err(err) = &result {
                    log::warn!("chain setup failed: {err}");
                }
                result
            })
            .collect()
    }

    /// Simulates one frame of `dt` seconds against `host`.
    pub fn advance<H: Hierarchy>(&mut self, host: &mut H, dt: f32) -> FrameReport {
        self.batch.advance(host, dt)
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    /// Enables or disables the rayon passes.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.batch.set_parallel_enabled(enabled);
    }

    /// Returns whether the engine is currently using parallel execution.
    pub fn parallel_enabled(&self) -> bool {
        self.batch.parallel_enabled()
    }
}

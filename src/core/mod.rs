//! Core types describing particles, chains, and their storage.

pub mod chain;
pub mod flatten;
pub mod particle;
pub mod soa;
pub mod types;

pub use chain::ChainConfig;
pub use flatten::{flatten_hierarchy, FlattenedChain};
pub use particle::{Particle, ParticleMeta, PoseSnapshot, VerletState};
pub use soa::{ChainSpan, ColumnsMut, ParticleRef, ParticleStore};
pub use types::{CoefficientCurves, Coefficients, Curve, Transform};

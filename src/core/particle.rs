use glam::{Mat4, Quat, Vec3};

use super::types::Coefficients;

/// Setup-time data of a particle. Never mutated after flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleMeta {
    /// Chain-relative index of the parent particle; `None` for the chain root.
    pub parent_index: Option<usize>,
    /// Number of particles whose parent is this one.
    pub child_count: u32,
    pub coefficients: Coefficients,
    /// Distance from the chain root along the chain at setup time.
    pub bone_length: f32,
    pub init_local_position: Vec3,
    pub init_local_rotation: Quat,
    /// Offset of a node-less tip particle in its parent's local space.
    pub end_offset: Vec3,
}

impl ParticleMeta {
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }
}

/// Verlet state carried across frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerletState {
    pub position: Vec3,
    pub prev_position: Vec3,
}

impl VerletState {
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            prev_position: position,
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.position - self.prev_position
    }
}

/// Animated pose sampled from the host every Prepare, before any displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub world_position: Vec3,
    pub local_position: Vec3,
    pub local_to_world: Mat4,
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self {
            world_position: Vec3::ZERO,
            local_position: Vec3::ZERO,
            local_to_world: Mat4::IDENTITY,
        }
    }
}

/// Complete particle record as produced by the flattener.
///
/// The [`ParticleStore`](super::soa::ParticleStore) splits records into
/// columns so stages can borrow state mutably while reading metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub meta: ParticleMeta,
    pub state: VerletState,
    pub snapshot: PoseSnapshot,
}

impl Particle {
    pub fn parent_index(&self) -> Option<usize> {
        self.meta.parent_index
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }
}

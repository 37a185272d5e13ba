use glam::Vec3;

use crate::core::particle::{ParticleMeta, PoseSnapshot, VerletState};

/// Per-chain values computed once per frame by Prepare.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainFrame {
    /// Disabled chains are left untouched by every stage.
    pub enabled: bool,
    /// `|lossy_scale(owner).x|`.
    pub object_scale: f32,
    /// Owner translation since the previous Prepare.
    pub object_move: Vec3,
    /// `(gravity + force) * object_scale`, added every sub-step.
    pub external: Vec3,
}

impl Default for ChainFrame {
    fn default() -> Self {
        Self {
            enabled: true,
            object_scale: 1.0,
            object_move: Vec3::ZERO,
            external: Vec3::ZERO,
        }
    }
}

/// Roots are driven by animation: they jump to the sampled pose.
#[inline]
pub fn follow_animation(snapshot: &PoseSnapshot, state: &mut VerletState) {
    state.prev_position = state.position;
    state.position = snapshot.world_position;
}

/// Damped verlet step of one particle.
///
/// `first_substep` gates the inertia compensation, which consumes the owner's
/// movement once per frame rather than once per sub-step.
#[inline]
pub fn integrate_particle(
    meta: &ParticleMeta,
    snapshot: &PoseSnapshot,
    state: &mut VerletState,
    frame: &ChainFrame,
    first_substep: bool,
) {
    if meta.is_root() {
        follow_animation(snapshot, state);
        return;
    }

    let velocity = state.velocity();
    state.prev_position = state.position;
    state.position += velocity * (1.0 - meta.coefficients.damping) + frame.external;

    if first_substep && meta.coefficients.inert > 0.0 {
        let carried = frame.object_move * meta.coefficients.inert;
        state.prev_position += carried;
        state.position += carried;
    }
}

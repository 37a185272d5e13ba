use glam::Vec3;

use crate::core::particle::{ParticleMeta, PoseSnapshot, VerletState};
use crate::utils::math::with_translation;

/// What a child reads from its parent while being constrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentView {
    /// Parent position after its own constraint in this sub-step.
    pub position: Vec3,
    /// Parent position in the animated pose.
    pub snapshot_world_position: Vec3,
}

/// Pulls a particle back towards its animated rest pose relative to `parent`.
///
/// Applies elasticity, then the stiffness clamp, then the length fix. Returns
/// `true` when the segment to the parent collapsed and the length fix was
/// skipped.
#[inline]
pub fn constrain_particle(
    meta: &ParticleMeta,
    snapshot: &PoseSnapshot,
    state: &mut VerletState,
    parent: ParentView,
) -> bool {
    let coefficients = meta.coefficients;
    let rest_length = (parent.snapshot_world_position - snapshot.world_position).length();

    let rest_pos = with_translation(snapshot.local_to_world, parent.position)
        .transform_point3(snapshot.local_position);

    state.position += (rest_pos - state.position) * coefficients.elasticity;

    let d = rest_pos - state.position;
    let len = d.length();
    let max_len = rest_length * (1.0 - coefficients.stiffness) * 2.0;
    if len > max_len {
        state.position += d * ((len - max_len) / len);
    }

    let dd = parent.position - state.position;
    let leng = dd.length();
    if leng > 0.0 {
        state.position += dd * ((leng - rest_length) / leng);
        false
    } else {
        true
    }
}

/// Skip-path update for a frame that runs no sub-step: carry the particle
/// along with its owner so it does not lag a teleporting object.
#[inline]
pub fn carry_particle(state: &mut VerletState, object_move: Vec3) {
    state.prev_position += object_move;
    state.position += object_move;
}

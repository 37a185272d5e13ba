//! Interface to the host transform hierarchy, plus a reference implementation.
//!
//! The simulation never owns nodes. It reads the animated pose through
//! [`Hierarchy`] during Prepare and writes displaced positions and rotations
//! back during Write-back.

pub mod scene;

pub use scene::{SceneGraph, SceneNode};

use glam::{Mat4, Quat, Vec3};

use crate::utils::allocator::EntityId;

/// Handle of a node in the host hierarchy.
pub type NodeId = EntityId;

/// Capability set the simulation consumes from the host scene graph.
///
/// Getters on nodes the host no longer knows may return anything; stages
/// check [`Hierarchy::contains`] first and skip such nodes.
pub trait Hierarchy: Sync {
    fn contains(&self, node: NodeId) -> bool;

    fn world_position(&self, node: NodeId) -> Vec3;
    fn set_world_position(&mut self, node: NodeId, position: Vec3);

    fn local_position(&self, node: NodeId) -> Vec3;
    fn set_local_position(&mut self, node: NodeId, position: Vec3);

    fn local_rotation(&self, node: NodeId) -> Quat;
    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat);

    fn world_rotation(&self, node: NodeId) -> Quat;
    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat);

    fn local_to_world(&self, node: NodeId) -> Mat4;

    fn child_count(&self, node: NodeId) -> usize;
    fn child(&self, node: NodeId, index: usize) -> Option<NodeId>;

    /// World scale, approximated when rotated non-uniform scale is involved.
    fn lossy_scale(&self, node: NodeId) -> Vec3;
}

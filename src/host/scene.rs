use glam::{Mat4, Quat, Vec3};

use super::{Hierarchy, NodeId};
use crate::core::types::Transform;
use crate::utils::allocator::Arena;

/// One node of a [`SceneGraph`].
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Transform,
}

/// Minimal transform tree implementing [`Hierarchy`].
///
/// World transforms are composed on demand from the root down, so the graph
/// never holds stale cached state.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Arena<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, name: impl Into<String>, local: Transform) -> NodeId {
        self.nodes.insert(SceneNode {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            local,
        })
    }

    /// Appends a child after the existing children of `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local: Transform,
    ) -> Option<NodeId> {
        if !self.nodes.contains(parent) {
            return None;
        }
        let id = self.nodes.insert(SceneNode {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            local,
        });
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(id);
        }
        Some(id)
    }

    /// Builds a straight chain of `segments` children below `parent`, each
    /// offset by `step` in its parent's space. Returns the created nodes.
    pub fn add_chain(
        &mut self,
        parent: NodeId,
        name: &str,
        segments: usize,
        step: Vec3,
    ) -> Vec<NodeId> {
        let mut created = Vec::with_capacity(segments);
        let mut current = parent;
        for i in 0..segments {
            match self.add_child(current, format!("{name}.{i}"), Transform::from_position(step)) {
                Some(id) => {
                    created.push(id);
                    current = id;
                }
                None => break,
            }
        }
        created
    }

    /// Removes `node` and its whole subtree.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let Some(removed) = self.nodes.remove(node) else {
            return false;
        };
        if let Some(parent) = removed.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|child| *child != node);
        }
        let mut stack = removed.children;
        while let Some(id) = stack.pop() {
            if let Some(child) = self.nodes.remove(id) {
                stack.extend(child.children);
            }
        }
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn local_transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(id).map(|node| node.local)
    }

    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.local = local;
        }
    }

    /// Moves a node by `delta` in its parent's space.
    pub fn translate(&mut self, id: NodeId, delta: Vec3) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.local.position += delta;
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn world_transform(&self, id: NodeId) -> Transform {
        let mut lineage = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.nodes.get(current) {
                Some(node) => {
                    lineage.push(node.local);
                    cursor = node.parent;
                }
                None => break,
            }
        }
        lineage
            .iter()
            .rev()
            .fold(Transform::default(), |world, local| world.combine(local))
    }

    fn parent_world(&self, id: NodeId) -> Transform {
        self.parent(id)
            .map(|parent| self.world_transform(parent))
            .unwrap_or_default()
    }
}

impl Hierarchy for SceneGraph {
    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    fn world_position(&self, node: NodeId) -> Vec3 {
        self.world_transform(node).position
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) {
        let local = self.parent_world(node).inverse_transform_point(position);
        if let Some(n) = self.nodes.get_mut(node) {
            n.local.position = local;
        }
    }

    fn local_position(&self, node: NodeId) -> Vec3 {
        self.nodes
            .get(node)
            .map(|n| n.local.position)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.local.position = position;
        }
    }

    fn local_rotation(&self, node: NodeId) -> Quat {
        self.nodes
            .get(node)
            .map(|n| n.local.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.local.rotation = rotation;
        }
    }

    fn world_rotation(&self, node: NodeId) -> Quat {
        self.world_transform(node).rotation
    }

    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat) {
        let parent_rotation = self.parent_world(node).rotation;
        if let Some(n) = self.nodes.get_mut(node) {
            n.local.rotation = (parent_rotation.inverse() * rotation).normalize();
        }
    }

    fn local_to_world(&self, node: NodeId) -> Mat4 {
        self.world_transform(node).to_matrix()
    }

    fn child_count(&self, node: NodeId) -> usize {
        self.nodes.get(node).map_or(0, |n| n.children.len())
    }

    fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.nodes
            .get(node)
            .and_then(|n| n.children.get(index).copied())
    }

    fn lossy_scale(&self, node: NodeId) -> Vec3 {
        self.world_transform(node).scale
    }
}

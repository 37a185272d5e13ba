//! Hierarchy flattening: turns a node subtree into an indexed particle array.
//!
//! Traversal is an explicit-stack depth-first pre-order walk (children left to
//! right), so every particle's parent sits at a strictly smaller index and
//! deep hierarchies cannot overflow the call stack.

use std::collections::HashSet;

use glam::{Mat4, Vec3};

use crate::core::chain::ChainConfig;
use crate::core::particle::{Particle, ParticleMeta, PoseSnapshot, VerletState};
use crate::error::{Result, SetupError};
use crate::host::{Hierarchy, NodeId};

/// Output of [`flatten_hierarchy`]: particles plus their backing nodes.
#[derive(Debug, Clone, Default)]
pub struct FlattenedChain {
    pub particles: Vec<Particle>,
    /// Backing node per particle; `None` for tip particles.
    pub nodes: Vec<Option<NodeId>>,
    /// Longest root-to-particle distance along the chain.
    pub total_length: f32,
}

impl FlattenedChain {
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Flattens the subtree below `config.root` into particles.
pub fn flatten_hierarchy<H: Hierarchy>(host: &H, config: &ChainConfig) -> Result<FlattenedChain> {
    config.coefficients.validate()?;
    let root = config.root.ok_or(SetupError::MissingRoot)?;
    if !host.contains(root) {
        return Err(SetupError::UnknownRoot { node: root });
    }

    let excluded: HashSet<NodeId> = config.exclusions.iter().copied().collect();
    let capacity = count_particles(host, root, &excluded, config.has_tips());

    let mut chain = FlattenedChain {
        particles: Vec::with_capacity(capacity),
        nodes: Vec::with_capacity(capacity),
        total_length: 0.0,
    };
    let mut visited = HashSet::with_capacity(capacity);
    let mut stack: Vec<(NodeId, Option<usize>)> = vec![(root, None)];

    while let Some((node, parent)) = stack.pop() {
        if !visited.insert(node) {
            log::warn!("node {node:?} reached twice while flattening; skipping the repeat");
            continue;
        }

        let index = chain.particles.len();
        let world = host.world_position(node);
        let local_to_world = host.local_to_world(node);
        let local = host.local_position(node);

        let bone_length = match parent {
            Some(p) => {
                let parent_particle = &mut chain.particles[p];
                parent_particle.meta.child_count += 1;
                parent_particle.meta.bone_length + (parent_particle.state.position - world).length()
            }
            None => 0.0,
        };
        chain.total_length = chain.total_length.max(bone_length);

        chain.particles.push(Particle {
            meta: ParticleMeta {
                parent_index: parent,
                child_count: 0,
                coefficients: config.coefficients,
                bone_length,
                init_local_position: local,
                init_local_rotation: host.local_rotation(node),
                end_offset: Vec3::ZERO,
            },
            state: VerletState::at_rest(world),
            snapshot: PoseSnapshot {
                world_position: world,
                local_position: local,
                local_to_world,
            },
        });
        chain.nodes.push(Some(node));

        let children = live_children(host, node, &excluded);
        if children.is_empty() {
            if config.has_tips() {
                append_tip(&mut chain, config, index, parent, local_to_world);
            }
            continue;
        }
        for child in children.into_iter().rev() {
            stack.push((child, Some(index)));
        }
    }

    if !config.curves.is_empty() {
        let total = chain.total_length;
        for particle in &mut chain.particles {
            let t = if total > 0.0 {
                particle.meta.bone_length / total
            } else {
                0.0
            };
            particle.meta.coefficients = config.coefficients.distributed(&config.curves, t);
        }
    }

    Ok(chain)
}

fn live_children<H: Hierarchy>(host: &H, node: NodeId, excluded: &HashSet<NodeId>) -> Vec<NodeId> {
    (0..host.child_count(node))
        .filter_map(|i| host.child(node, i))
        .filter(|child| !excluded.contains(child) && host.contains(*child))
        .collect()
}

fn count_particles<H: Hierarchy>(
    host: &H,
    root: NodeId,
    excluded: &HashSet<NodeId>,
    tips: bool,
) -> usize {
    let mut count = 0;
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        count += 1;
        let children = live_children(host, node, excluded);
        if children.is_empty() && tips {
            count += 1;
        }
        stack.extend(children);
    }
    count
}

/// Appends the node-less particle extending leaf `leaf_index`.
fn append_tip(
    chain: &mut FlattenedChain,
    config: &ChainConfig,
    leaf_index: usize,
    leaf_parent: Option<usize>,
    leaf_to_world: Mat4,
) {
    let leaf_world = chain.particles[leaf_index].state.position;
    let end_offset = if config.end_length > 0.0 {
        match leaf_parent {
            Some(p) if leaf_to_world.determinant().abs() > f32::EPSILON => {
                let parent_world = chain.particles[p].state.position;
                let tip_world = leaf_world + (leaf_world - parent_world) * config.end_length;
                leaf_to_world.inverse().transform_point3(tip_world)
            }
            _ => Vec3::new(config.end_length, 0.0, 0.0),
        }
    } else {
        config.end_offset
    };

    let tip_world = leaf_to_world.transform_point3(end_offset);
    let leaf = &mut chain.particles[leaf_index];
    leaf.meta.child_count += 1;
    let bone_length = leaf.meta.bone_length + (tip_world - leaf_world).length();
    chain.total_length = chain.total_length.max(bone_length);

    chain.particles.push(Particle {
        meta: ParticleMeta {
            parent_index: Some(leaf_index),
            child_count: 0,
            coefficients: config.coefficients,
            bone_length,
            init_local_position: end_offset,
            init_local_rotation: glam::Quat::IDENTITY,
            end_offset,
        },
        state: VerletState::at_rest(tip_world),
        snapshot: PoseSnapshot {
            world_position: tip_world,
            local_position: end_offset,
            local_to_world: leaf_to_world,
        },
    });
    chain.nodes.push(None);
}

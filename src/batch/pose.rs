//! Prepare and Write-back: the two stages that talk to the host hierarchy.

use glam::Vec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::Batch;
#[cfg(feature = "parallel")]
use crate::config::PARALLEL_MIN_LEN;
use crate::core::particle::{PoseSnapshot, VerletState};
use crate::core::soa::ChainSpan;
use crate::dynamics::integrator::ChainFrame;
use crate::host::{Hierarchy, NodeId};
use crate::utils::math::from_to_rotation;

fn sample<H: Hierarchy>(host: &H, node: NodeId, snapshot: &mut PoseSnapshot) -> bool {
    if !host.contains(node) {
        return false;
    }
    *snapshot = PoseSnapshot {
        world_position: host.world_position(node),
        local_position: host.local_position(node),
        local_to_world: host.local_to_world(node),
    };
    true
}

fn is_live(frames: &[ChainFrame], span: &ChainSpan) -> bool {
    frames
        .get(span.chain as usize)
        .is_some_and(|frame| frame.enabled)
}

/// Samples the animated pose of every node-backed particle of the enabled
/// chains. Returns the number of nodes the host no longer knows.
#[cfg(feature = "parallel")]
fn sample_snapshots<H: Hierarchy>(
    host: &H,
    snapshots: &mut [PoseSnapshot],
    nodes: &[Option<NodeId>],
    spans: &[ChainSpan],
    frames: &[ChainFrame],
    parallel: bool,
) -> usize {
    let read = |i: usize, snapshot: &mut PoseSnapshot| -> bool {
        match nodes[i] {
            Some(node) if is_live(frames, &spans[i]) => !sample(host, node, snapshot),
            _ => false,
        }
    };
    if parallel {
        snapshots
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .enumerate()
            .map(|(i, snapshot)| read(i, snapshot))
            .filter(|missing| *missing)
            .count()
    } else {
        snapshots
            .iter_mut()
            .enumerate()
            .map(|(i, snapshot)| read(i, snapshot))
            .filter(|missing| *missing)
            .count()
    }
}

#[cfg(not(feature = "parallel"))]
fn sample_snapshots<H: Hierarchy>(
    host: &H,
    snapshots: &mut [PoseSnapshot],
    nodes: &[Option<NodeId>],
    spans: &[ChainSpan],
    frames: &[ChainFrame],
    _parallel: bool,
) -> usize {
    snapshots
        .iter_mut()
        .enumerate()
        .map(|(i, snapshot)| match nodes[i] {
            Some(node) if is_live(frames, &spans[i]) => !sample(host, node, snapshot),
            _ => false,
        })
        .filter(|missing| *missing)
        .count()
}

impl Batch {
    /// Prepare stage.
    ///
    /// Puts every simulated node back on its initial local pose, samples the
    /// resulting animated pose into the snapshots, derives the tip snapshots
    /// and refreshes the per-chain owner movement, scale and external force.
    /// Returns the number of particles whose node is missing from the host.
    pub fn prepare<H: Hierarchy>(&mut self, host: &mut H) -> usize {
        for (index, node) in self.store.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            if !is_live(&self.frames, &self.store.spans[index]) || !host.contains(*node) {
                continue;
            }
            let meta = &self.store.meta[index];
            host.set_local_position(*node, meta.init_local_position);
            host.set_local_rotation(*node, meta.init_local_rotation);
        }

        let host: &H = host;
        let missing = sample_snapshots(
            host,
            &mut self.store.snapshots,
            &self.store.nodes,
            &self.store.spans,
            &self.frames,
            self.config.parallel,
        );

        for index in 0..self.store.len() {
            if self.store.nodes[index].is_some() || !is_live(&self.frames, &self.store.spans[index]) {
                continue;
            }
            let Some(parent) = self.store.global_parent(index) else {
                continue;
            };
            let leaf = self.store.snapshots[parent].local_to_world;
            let end_offset = self.store.meta[index].end_offset;
            self.store.snapshots[index] = PoseSnapshot {
                world_position: leaf.transform_point3(end_offset),
                local_position: end_offset,
                local_to_world: leaf,
            };
        }

        for (slot, id) in self.order.iter().enumerate() {
            let Some(record) = self.chains.get_mut(*id) else {
                continue;
            };
            let frame = &mut self.frames[slot];
            if !frame.enabled {
                continue;
            }

            match record.config.owner_node().filter(|owner| host.contains(*owner)) {
                Some(owner) => {
                    let position = host.world_position(owner);
                    frame.object_move = record
                        .owner_position
                        .map_or(Vec3::ZERO, |previous| position - previous);
                    frame.object_scale = host.lossy_scale(owner).x.abs();
                    record.owner_position = Some(position);
                }
                None => frame.object_move = Vec3::ZERO,
            }
            frame.external = (record.config.gravity + record.config.force) * frame.object_scale;

            if record.pending_reset {
                record.pending_reset = false;
                frame.object_move = Vec3::ZERO;
                for index in record.span.range() {
                    self.store.states[index] =
                        VerletState::at_rest(self.store.snapshots[index].world_position);
                }
                log::debug!("chain {:?} reset to the animated pose", id);
            }
        }

        missing
    }

    /// Write-back stage.
    ///
    /// Walks each enabled chain in index order. A parent with at most one child
    /// is turned so that its bone points at the simulated child, then the
    /// child's node is moved onto its simulated position.
    pub fn write_back<H: Hierarchy>(&self, host: &mut H) {
        let store = &self.store;
        for (slot, id) in self.order.iter().enumerate() {
            if !self.frames.get(slot).is_some_and(|frame| frame.enabled) {
                continue;
            }
            let Some(record) = self.chains.get(*id) else {
                continue;
            };

            for index in record.span.range() {
                let Some(parent) = store.global_parent(index) else {
                    continue;
                };
                let node = store.nodes[index].filter(|node| host.contains(*node));
                if store.nodes[index].is_some() && node.is_none() {
                    continue;
                }

                let parent_node = store.nodes[parent].filter(|node| host.contains(*node));
                if let Some(parent_node) = parent_node.filter(|_| store.meta[parent].child_count <= 1) {
                    let local = match node {
                        Some(node) => host.local_position(node),
                        None => store.meta[index].end_offset,
                    };
                    let parent_rotation = host.world_rotation(parent_node);
                    let v0 = parent_rotation * local;
                    let v1 = store.states[index].position - store.states[parent].position;
                    if let Some(turn) = from_to_rotation(v0, v1) {
                        host.set_world_rotation(parent_node, turn * parent_rotation);
                    }
                }

                if let Some(node) = node {
                    host.set_world_position(node, store.states[index].position);
                }
            }
        }
    }
}

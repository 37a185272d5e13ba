use std::ops::Range;

use glam::{Quat, Vec3};

use crate::core::particle::{Particle, ParticleMeta, PoseSnapshot, VerletState};
use crate::core::types::Coefficients;
use crate::host::NodeId;

/// Location of one chain inside the batch store.
///
/// Every particle carries the span of its chain, which is the local-to-global
/// index base the flattened executor needs to resolve chain-relative parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainSpan {
    /// Dense slot of the chain in batch order.
    pub chain: u32,
    /// Global index of the chain root.
    pub base: u32,
    /// Number of particles in the chain.
    pub len: u32,
}

impl ChainSpan {
    pub fn range(&self) -> Range<usize> {
        let base = self.base as usize;
        base..base + self.len as usize
    }

    pub fn contains(&self, global: usize) -> bool {
        self.range().contains(&global)
    }

    /// Maps a chain-relative parent index to an index into columns starting at
    /// global index `origin`.
    ///
    /// The result is always inside this chain and strictly before `own`; any
    /// other value is rejected rather than wrapped into a neighbouring chain.
    pub fn resolve(&self, origin: usize, own: usize, parent: usize) -> Option<usize> {
        if parent >= self.len as usize {
            return None;
        }
        let global = self.base as usize + parent;
        let local = global.checked_sub(origin)?;
        (local < own).then_some(local)
    }
}

/// Structure-of-Arrays storage for the particles of every chain in a batch.
///
/// Chains occupy contiguous ranges in registration order. Metadata is
/// write-once, snapshots are refreshed every Prepare and verlet state is the
/// only data stepped by the simulation.
#[derive(Debug, Default)]
pub struct ParticleStore {
    pub meta: Vec<ParticleMeta>,
    pub spans: Vec<ChainSpan>,
    pub states: Vec<VerletState>,
    pub snapshots: Vec<PoseSnapshot>,
    pub nodes: Vec<Option<NodeId>>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Appends a flattened chain and returns its span.
    pub fn push_chain(
        &mut self,
        chain: u32,
        particles: &[Particle],
        nodes: &[Option<NodeId>],
    ) -> ChainSpan {
        debug_assert_eq!(particles.len(), nodes.len());
        let span = ChainSpan {
            chain,
            base: self.len() as u32,
            len: particles.len() as u32,
        };

        self.meta.reserve(particles.len());
        self.spans.reserve(particles.len());
        self.states.reserve(particles.len());
        self.snapshots.reserve(particles.len());
        self.nodes.reserve(particles.len());

        for (particle, node) in particles.iter().zip(nodes) {
            self.meta.push(particle.meta);
            self.spans.push(span);
            self.states.push(particle.state);
            self.snapshots.push(particle.snapshot);
            self.nodes.push(*node);
        }
        span
    }

    /// Releases the particles of `span` and rebases every chain stored after it.
    pub fn remove_chain(&mut self, span: ChainSpan) {
        let range = span.range();
        if range.end > self.len() {
            return;
        }
        self.meta.drain(range.clone());
        self.spans.drain(range.clone());
        self.states.drain(range.clone());
        self.snapshots.drain(range.clone());
        self.nodes.drain(range.clone());

        for moved in self.spans.iter_mut().skip(range.start) {
            moved.base -= span.len;
            moved.chain -= 1;
        }
    }

    /// Global index of the parent of particle `index`, if it has a valid one.
    pub fn global_parent(&self, index: usize) -> Option<usize> {
        let parent = self.meta.get(index)?.parent_index?;
        self.spans[index].resolve(0, index, parent)
    }

    pub fn get(&self, index: usize) -> Option<ParticleRef<'_>> {
        (index < self.len()).then_some(ParticleRef {
            store: self,
            index,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticleRef<'_>> {
        (0..self.len()).map(move |index| ParticleRef {
            store: self,
            index,
        })
    }

    /// Particles of one chain in flattening order.
    pub fn chain(&self, span: ChainSpan) -> impl Iterator<Item = ParticleRef<'_>> {
        let range = span.range();
        let end = range.end.min(self.len());
        (range.start.min(end)..end).map(move |index| ParticleRef {
            store: self,
            index,
        })
    }

    /// Splits the store into the borrows the simulation stages need.
    pub fn columns_mut(&mut self) -> ColumnsMut<'_> {
        ColumnsMut {
            origin: 0,
            meta: &self.meta,
            spans: &self.spans,
            snapshots: &self.snapshots,
            states: &mut self.states,
        }
    }
}

/// Disjoint column borrows of a contiguous particle range starting at global index `origin`.
pub struct ColumnsMut<'a> {
    pub origin: usize,
    pub meta: &'a [ParticleMeta],
    pub spans: &'a [ChainSpan],
    pub snapshots: &'a [PoseSnapshot],
    pub states: &'a mut [VerletState],
}

impl<'a> ColumnsMut<'a> {
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Index of the parent of local particle `index` within these columns.
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        let parent = self.meta[index].parent_index?;
        self.spans[index].resolve(self.origin, index, parent)
    }

    /// Shorter-lived copy of these borrows, for passes that consume columns.
    pub fn reborrow(&mut self) -> ColumnsMut<'_> {
        ColumnsMut {
            origin: self.origin,
            meta: self.meta,
            spans: self.spans,
            snapshots: self.snapshots,
            states: &mut *self.states,
        }
    }

    /// Spans of the chains covered by these columns, in storage order.
    pub fn chain_spans(&self) -> Vec<ChainSpan> {
        let mut chains: Vec<ChainSpan> = Vec::new();
        for span in self.spans {
            if chains.last() != Some(span) {
                chains.push(*span);
            }
        }
        chains
    }

    /// Splits the columns into one independent borrow per chain.
    ///
    /// `chains` must be sorted by base; spans outside these columns are skipped.
    pub fn split_chains(self, chains: &[ChainSpan]) -> Vec<ColumnsMut<'a>> {
        let ColumnsMut {
            origin,
            meta,
            spans,
            snapshots,
            mut states,
        } = self;

        let end = origin + meta.len();
        let mut cursor = origin;
        let mut parts = Vec::with_capacity(chains.len());

        for span in chains {
            let range = span.range();
            if range.start < cursor || range.end > end {
                continue;
            }
            let gap = range.start - cursor;
            let len = range.len();

            let (_, rest) = std::mem::take(&mut states).split_at_mut(gap);
            let (chain_states, rest) = rest.split_at_mut(len);
            states = rest;

            let lo = range.start - origin;
            let hi = lo + len;
            parts.push(ColumnsMut {
                origin: range.start,
                meta: &meta[lo..hi],
                spans: &spans[lo..hi],
                snapshots: &snapshots[lo..hi],
                states: chain_states,
            });
            cursor = range.end;
        }
        parts
    }
}

/// Read-only view of one particle inside a [`ParticleStore`].
#[derive(Clone, Copy)]
pub struct ParticleRef<'a> {
    store: &'a ParticleStore,
    index: usize,
}

impl<'a> ParticleRef<'a> {
    /// Global index inside the store.
    pub fn index(&self) -> usize {
        self.index
    }
    /// Chain-relative parent index.
    pub fn parent_index(&self) -> Option<usize> {
        self.store.meta[self.index].parent_index
    }
    pub fn global_parent(&self) -> Option<usize> {
        self.store.global_parent(self.index)
    }
    pub fn span(&self) -> ChainSpan {
        self.store.spans[self.index]
    }
    pub fn node(&self) -> Option<NodeId> {
        self.store.nodes[self.index]
    }
    pub fn meta(&self) -> &'a ParticleMeta {
        &self.store.meta[self.index]
    }
    pub fn coefficients(&self) -> Coefficients {
        self.store.meta[self.index].coefficients
    }
    pub fn position(&self) -> Vec3 {
        self.store.states[self.index].position
    }
    pub fn prev_position(&self) -> Vec3 {
        self.store.states[self.index].prev_position
    }
    pub fn init_local_position(&self) -> Vec3 {
        self.store.meta[self.index].init_local_position
    }
    pub fn init_local_rotation(&self) -> Quat {
        self.store.meta[self.index].init_local_rotation
    }
    pub fn snapshot(&self) -> &'a PoseSnapshot {
        &self.store.snapshots[self.index]
    }
}

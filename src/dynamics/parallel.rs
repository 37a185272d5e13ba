//! Stage execution over the particle columns of a batch.
//!
//! Integrate and the skip-path carry touch only the particle's own verlet
//! state and run as one pass over every particle. Constrain walks each chain
//! in index order so a child is fitted against its parent's already
//! constrained position; chains are independent and run concurrently.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use crate::config::PARALLEL_MIN_LEN;
use crate::core::particle::VerletState;
use crate::core::soa::{ChainSpan, ColumnsMut};
use crate::dynamics::integrator::{follow_animation, integrate_particle, ChainFrame};
use crate::dynamics::solver::{carry_particle, constrain_particle, ParentView};

/// How a batch spreads its chains over the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// One scheduler for the batch; each stage is a single pass over the
    /// particles of all chains.
    #[default]
    Flattened,
    /// One scheduler per chain; chains run concurrently, each one sequentially.
    PerChain,
}

#[cfg(feature = "parallel")]
fn for_each_state<F>(states: &mut [VerletState], parallel: bool, op: F)
where
    F: Fn(usize, &mut VerletState) + Send + Sync,
{
    if parallel {
        states
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .enumerate()
            .for_each(|(i, state)| op(i, state));
    } else {
        states
            .iter_mut()
            .enumerate()
            .for_each(|(i, state)| op(i, state));
    }
}

#[cfg(not(feature = "parallel"))]
fn for_each_state<F>(states: &mut [VerletState], _parallel: bool, op: F)
where
    F: Fn(usize, &mut VerletState) + Send + Sync,
{
    states
        .iter_mut()
        .enumerate()
        .for_each(|(i, state)| op(i, state));
}

fn frame_of(frames: &[ChainFrame], span: &ChainSpan) -> Option<ChainFrame> {
    frames
        .get(span.chain as usize)
        .copied()
        .filter(|frame| frame.enabled)
}

/// Verlet step of every particle of the enabled chains.
pub fn integrate_stage(
    cols: &mut ColumnsMut<'_>,
    frames: &[ChainFrame],
    first_substep: bool,
    parallel: bool,
) {
    let meta = cols.meta;
    let spans = cols.spans;
    let snapshots = cols.snapshots;
    for_each_state(cols.states, parallel, |i, state| {
        if let Some(frame) = frame_of(frames, &spans[i]) {
            integrate_particle(&meta[i], &snapshots[i], state, &frame, first_substep);
        }
    });
}

/// Constrains the non-root particles of one chain, parents first.
///
/// `part` must cover exactly one chain. Returns the number of collapsed
/// segments that were skipped.
fn constrain_chain(part: &mut ColumnsMut<'_>, frames: &[ChainFrame]) -> usize {
    match part.spans.first() {
        Some(span) if frame_of(frames, span).is_some() => {}
        _ => return 0,
    }

    let mut degenerate = 0;
    for i in 0..part.len() {
        let Some(parent) = part.parent_of(i) else {
            continue;
        };
        let view = ParentView {
            position: part.states[parent].position,
            snapshot_world_position: part.snapshots[parent].world_position,
        };
        if constrain_particle(&part.meta[i], &part.snapshots[i], &mut part.states[i], view) {
            degenerate += 1;
        }
    }
    degenerate
}

/// Constrains every non-root particle against its parent.
///
/// Returns the number of collapsed segments that were skipped.
pub fn constrain_stage(cols: &mut ColumnsMut<'_>, frames: &[ChainFrame], parallel: bool) -> usize {
    let chains = cols.chain_spans();
    let parts = cols.reborrow().split_chains(&chains);
    sum_over_chains(parts, parallel, |mut part| constrain_chain(&mut part, frames))
}

/// Skip-path pass: roots follow the animation, everything else is carried
/// along with the owner's movement.
pub fn carry_stage(cols: &mut ColumnsMut<'_>, frames: &[ChainFrame], parallel: bool) {
    let meta = cols.meta;
    let spans = cols.spans;
    let snapshots = cols.snapshots;
    for_each_state(cols.states, parallel, |i, state| {
        let Some(frame) = frame_of(frames, &spans[i]) else {
            return;
        };
        if meta[i].is_root() {
            follow_animation(&snapshots[i], state);
        } else {
            carry_particle(state, frame.object_move);
        }
    });
}

/// Runs `steps` sub-steps over the columns, or the skip path when `steps` is 0.
///
/// Returns the number of degenerate segments met along the way.
pub fn run_substeps(
    cols: &mut ColumnsMut<'_>,
    frames: &[ChainFrame],
    steps: u32,
    parallel: bool,
) -> usize {
    if steps == 0 {
        carry_stage(cols, frames, parallel);
        return constrain_stage(cols, frames, parallel);
    }

    let mut degenerate = 0;
    for step in 0..steps {
        integrate_stage(cols, frames, step == 0, parallel);
        degenerate += constrain_stage(cols, frames, parallel);
    }
    degenerate
}

/// Runs every chain on its own sub-step count.
///
/// `steps` is indexed by chain slot. Chains are split into disjoint column
/// borrows and, when `parallel` is set, simulated concurrently.
pub fn run_per_chain(
    cols: ColumnsMut<'_>,
    chains: &[ChainSpan],
    frames: &[ChainFrame],
    steps: &[u32],
    parallel: bool,
) -> usize {
    let parts = cols.split_chains(chains);
    let run = |mut part: ColumnsMut| -> usize {
        let Some(slot) = part.spans.first().map(|span| span.chain as usize) else {
            return 0;
        };
        let count = steps.get(slot).copied().unwrap_or(0);
        run_substeps(&mut part, frames, count, false)
    };

    sum_over_chains(parts, parallel, run)
}

#[cfg(feature = "parallel")]
fn sum_over_chains<'a, F>(parts: Vec<ColumnsMut<'a>>, parallel: bool, run: F) -> usize
where
    F: Fn(ColumnsMut<'a>) -> usize + Send + Sync,
{
    if parallel {
        parts.into_par_iter().map(run).sum()
    } else {
        parts.into_iter().map(run).sum()
    }
}

#[cfg(not(feature = "parallel"))]
fn sum_over_chains<'a, F>(parts: Vec<ColumnsMut<'a>>, _parallel: bool, run: F) -> usize
where
    F: Fn(ColumnsMut<'a>) -> usize + Send + Sync,
{
    parts.into_iter().map(run).sum()
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_FRAME_BUDGET_MS, DEFAULT_UPDATE_RATE},
    core::{
        chain::ChainConfig,
        flatten::flatten_hierarchy,
        soa::{ChainSpan, ParticleRef, ParticleStore},
    },
    dynamics::{
        integrator::ChainFrame,
        parallel::{run_per_chain, run_substeps, ExecutionStrategy},
        scheduler::SubstepScheduler,
    },
    error::{Result, SetupError},
    host::{Hierarchy, NodeId},
    utils::{
        allocator::{Arena, EntityId},
        logging::{check_frame_budget, Stage, StageTrace},
        profiling::{self, FrameProfiler},
    },
};

mod pose;

/// Handle of a chain registered in a [`Batch`].
pub type ChainId = EntityId;

/// Batch-wide execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Sub-steps per second of the batch scheduler used by
    /// [`ExecutionStrategy::Flattened`].
    pub update_rate: f32,
    pub strategy: ExecutionStrategy,
    /// Runtime switch for the rayon passes; ignored without the `parallel` feature.
    pub parallel: bool,
    /// Frames slower than this log a warning; `<= 0` disables the check.
    pub frame_budget_ms: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            update_rate: DEFAULT_UPDATE_RATE,
            strategy: ExecutionStrategy::default(),
            parallel: cfg!(feature = "parallel"),
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
        }
    }
}

/// What happened during one [`Batch::advance`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Sub-steps run; the largest count across chains under
    /// [`ExecutionStrategy::PerChain`].
    pub substeps: u32,
    /// A scheduler hit its sub-step cap and dropped leftover time.
    pub overrun: bool,
    /// Collapsed parent/child segments skipped by the length fix.
    pub degenerate_segments: usize,
    /// Particles whose node vanished from the host.
    pub missing_nodes: usize,
}

/// Bookkeeping of one registered chain.
#[derive(Debug, Clone)]
pub struct ChainRecord {
    config: ChainConfig,
    span: ChainSpan,
    scheduler: SubstepScheduler,
    owner_position: Option<Vec3>,
    total_length: f32,
    pending_reset: bool,
}

impl ChainRecord {
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn span(&self) -> ChainSpan {
        self.span
    }

    pub fn scheduler(&self) -> &SubstepScheduler {
        &self.scheduler
    }

    /// Longest root-to-particle distance measured at setup.
    pub fn total_length(&self) -> f32 {
        self.total_length
    }
}

/// A set of chains simulated together.
///
/// The batch owns the particle storage of every registered chain, the node to
/// particle map and the schedulers, and runs the frame pipeline
/// Prepare → sub-steps → Write-back against a host [`Hierarchy`].
pub struct Batch {
    config: BatchConfig,
    chains: Arena<ChainRecord>,
    /// Chain handles in slot order; slot `i` owns `frames[i]`.
    order: Vec<ChainId>,
    frames: Vec<ChainFrame>,
    store: ParticleStore,
    node_index: HashMap<NodeId, usize>,
    scheduler: SubstepScheduler,
    profiler: FrameProfiler,
    last_report: FrameReport,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl Batch {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            chains: Arena::new(),
            order: Vec::new(),
            frames: Vec::new(),
            store: ParticleStore::new(),
            node_index: HashMap::new(),
            scheduler: SubstepScheduler::new(config.update_rate),
            profiler: FrameProfiler::default(),
            last_report: FrameReport::default(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.config.parallel = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.config.parallel
    }

    pub fn set_strategy(&mut self, strategy: ExecutionStrategy) {
        self.config.strategy = strategy;
    }

    pub fn set_update_rate(&mut self, update_rate: f32) {
        self.config.update_rate = update_rate;
        self.scheduler.set_rate(update_rate);
    }

    pub fn set_frame_budget_ms(&mut self, budget_ms: f32) {
        self.config.frame_budget_ms = budget_ms;
    }

    pub fn chain_count(&self) -> usize {
        self.order.len()
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn chain_ids(&self) -> &[ChainId] {
        &self.order
    }

    pub fn chain(&self, id: ChainId) -> Option<&ChainRecord> {
        self.chains.get(id)
    }

    pub fn is_chain_enabled(&self, id: ChainId) -> bool {
        self.slot_of(id)
            .and_then(|slot| self.frames.get(slot))
            .is_some_and(|frame| frame.enabled)
    }

    /// Sub-step rate a chain runs at: the batch rate under
    /// [`ExecutionStrategy::Flattened`], the chain's own under `PerChain`.
    pub fn effective_update_rate(&self, id: ChainId) -> Option<f32> {
        let record = self.chains.get(id)?;
        Some(match self.config.strategy {
            ExecutionStrategy::Flattened => self.config.update_rate,
            ExecutionStrategy::PerChain => record.config.update_rate,
        })
    }

    /// Per-frame values of a chain as computed by the last Prepare.
    pub fn chain_frame(&self, id: ChainId) -> Option<ChainFrame> {
        self.slot_of(id).and_then(|slot| self.frames.get(slot).copied())
    }

    /// Particles of a chain in flattening order.
    pub fn particles(&self, id: ChainId) -> Option<impl Iterator<Item = ParticleRef<'_>>> {
        self.chains.get(id).map(|record| self.store.chain(record.span))
    }

    pub fn particle_for_node(&self, node: NodeId) -> Option<ParticleRef<'_>> {
        self.node_index
            .get(&node)
            .and_then(|index| self.store.get(*index))
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    pub fn last_report(&self) -> FrameReport {
        self.last_report
    }

    fn slot_of(&self, id: ChainId) -> Option<usize> {
        self.chains.get(id).map(|record| record.span.chain as usize)
    }

    /// Flattens the subtree below `config.root` and adds it to the batch.
    ///
    /// Fails without touching the batch when the configuration is invalid or
    /// a node is already simulated by another chain.
    pub fn register_chain<H: Hierarchy>(&mut self, host: &H, config: ChainConfig) -> Result<ChainId> {
        if !config.extra_roots.is_empty() {
            return Err(SetupError::SeveralRoots {
                count: config.root_count(),
            });
        }
        let flattened = flatten_hierarchy(host, &config)?;
        if let Some(node) = flattened
            .nodes
            .iter()
            .flatten()
            .find(|node| self.node_index.contains_key(node))
        {
            return Err(SetupError::NodeAlreadySimulated { node: *node });
        }

        let slot = self.order.len() as u32;
        let span = self
            .store
            .push_chain(slot, &flattened.particles, &flattened.nodes);
        for (offset, node) in flattened.nodes.iter().enumerate() {
            if let Some(node) = node {
                self.node_index.insert(*node, span.base as usize + offset);
            }
        }

        let owner_position = config
            .owner_node()
            .filter(|owner| host.contains(*owner))
            .map(|owner| host.world_position(owner));
        let record = ChainRecord {
            scheduler: SubstepScheduler::new(config.update_rate),
            config,
            span,
            owner_position,
            total_length: flattened.total_length,
            pending_reset: false,
        };
        let chain_rate = record.config.update_rate;
        let id = self.chains.insert(record);
        self.order.push(id);
        self.frames.push(ChainFrame::default());

        if let Some(rate) = self
            .effective_update_rate(id)
            .filter(|rate| *rate != chain_rate)
        {
            log::debug!(
                "chain {:?} asks for {} sub-steps/s but the flattened batch runs it at {}",
                id,
                chain_rate,
                rate
            );
        }

        log::debug!(
            "registered chain {:?}: {} particles, length {:.3}",
            id,
            span.len,
            flattened.total_length
        );
        Ok(id)
    }

    /// Registers one chain per subtree of `config`, see [`ChainConfig::trees`].
    ///
    /// Either every tree is registered or, on the first failure, the trees
    /// registered so far are removed again and the error is returned.
    pub fn register_trees<H: Hierarchy>(&mut self, host: &H, config: ChainConfig) -> Result<Vec<ChainId>> {
        let mut ids = Vec::with_capacity(config.root_count());
        for tree in config.trees() {
            match self.register_chain(host, tree) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    for id in ids.into_iter().rev() {
                        self.remove_chain(id).ok();
                    }
                    return Err(err);
                }
            }
        }
        Ok(ids)
    }

    /// Removes a chain and releases its particles.
    pub fn remove_chain(&mut self, id: ChainId) -> Result<ChainConfig> {
        let record = self
            .chains
            .remove(id)
            .ok_or(SetupError::UnknownChain { chain: id })?;
        let span = record.span;
        let slot = span.chain as usize;

        self.store.remove_chain(span);
        self.order.remove(slot);
        self.frames.remove(slot);
        for moved in &self.order[slot..] {
            if let Some(other) = self.chains.get_mut(*moved) {
                other.span.base -= span.len;
                other.span.chain -= 1;
            }
        }
        self.rebuild_node_index();

        log::debug!("removed chain {:?}: {} particles released", id, span.len);
        Ok(record.config)
    }

    /// Disabled chains are skipped by every stage. Re-enabling a chain resets it
    /// to the animated pose on the next Prepare.
    pub fn set_chain_enabled(&mut self, id: ChainId, enabled: bool) -> Result<()> {
        let slot = self
            .slot_of(id)
            .ok_or(SetupError::UnknownChain { chain: id })?;
        let frame = &mut self.frames[slot];
        let was_enabled = frame.enabled;
        frame.enabled = enabled;
        if enabled && !was_enabled {
            self.reset_chain(id)?;
        }
        Ok(())
    }

    /// Drops the verlet history of a chain; the next Prepare puts every
    /// particle back on the animated pose at rest.
    pub fn reset_chain(&mut self, id: ChainId) -> Result<()> {
        let record = self
            .chains
            .get_mut(id)
            .ok_or(SetupError::UnknownChain { chain: id })?;
        record.pending_reset = true;
        record.owner_position = None;
        record.scheduler.reset();
        Ok(())
    }

    fn rebuild_node_index(&mut self) {
        self.node_index.clear();
        for (index, node) in self.store.nodes.iter().enumerate() {
            if let Some(node) = node {
                self.node_index.insert(*node, index);
            }
        }
    }

    fn spans(&self) -> Vec<ChainSpan> {
        self.order
            .iter()
            .filter_map(|id| self.chains.get(*id))
            .map(|record| record.span)
            .collect()
    }

    /// Runs `steps` sub-steps on every enabled chain, or the skip path when
    /// `steps` is 0. Returns the number of degenerate segments met.
    pub fn simulate(&mut self, steps: u32) -> usize {
        let parallel = self.config.parallel;
        match self.config.strategy {
            ExecutionStrategy::Flattened => {
                run_substeps(&mut self.store.columns_mut(), &self.frames, steps, parallel)
            }
            ExecutionStrategy::PerChain => {
                let spans = self.spans();
                let steps = vec![steps; spans.len()];
                run_per_chain(self.store.columns_mut(), &spans, &self.frames, &steps, parallel)
            }
        }
    }

    /// Asks the schedulers for this frame's sub-steps and runs them.
    fn simulate_frame(&mut self, dt: f32, report: &mut FrameReport) {
        let parallel = self.config.parallel;
        match self.config.strategy {
            ExecutionStrategy::Flattened => {
                let steps = self.scheduler.steps_for(dt);
                report.substeps = steps;
                report.overrun = self.scheduler.overran();
                report.degenerate_segments =
                    run_substeps(&mut self.store.columns_mut(), &self.frames, steps, parallel);
            }
            ExecutionStrategy::PerChain => {
                let spans = self.spans();
                let mut steps = Vec::with_capacity(self.order.len());
                for id in &self.order {
                    let count = match self.chains.get_mut(*id) {
                        Some(record) => {
                            let count = record.scheduler.steps_for(dt);
                            report.overrun |= record.scheduler.overran();
                            count
                        }
                        None => 0,
                    };
                    steps.push(count);
                }
                report.substeps = steps.iter().copied().max().unwrap_or(0);
                report.degenerate_segments = run_per_chain(
                    self.store.columns_mut(),
                    &spans,
                    &self.frames,
                    &steps,
                    parallel,
                );
            }
        }
        if report.overrun {
            log::debug!("sub-step cap reached; leftover frame time discarded");
        }
    }

    /// Runs one frame: Prepare, the scheduled sub-steps, then Write-back.
    pub fn advance<H: Hierarchy>(&mut self, host: &mut H, dt: f32) -> FrameReport {
        let frame_start = Instant::now();
        let mut report = FrameReport::default();
        let mut prepare_time = Duration::ZERO;
        let mut simulate_time = Duration::ZERO;
        let mut write_back_time = Duration::ZERO;

        if !self.order.is_empty() {
            {
                let _timer = profiling::ScopedTimer::new(&mut prepare_time);
                let _trace = StageTrace::begin(Stage::Prepare, self.store.len());
                report.missing_nodes = self.prepare(host);
            }
            {
                let _timer = profiling::ScopedTimer::new(&mut simulate_time);
                let _trace = StageTrace::begin(
                    Stage::Simulate {
                        parallel: self.config.parallel,
                    },
                    self.store.len(),
                );
                self.simulate_frame(dt, &mut report);
            }
            {
                let _timer = profiling::ScopedTimer::new(&mut write_back_time);
                let _trace = StageTrace::begin(Stage::WriteBack, self.store.len());
                self.write_back(host);
            }
        }

        let total = frame_start.elapsed();
        self.profiler = FrameProfiler {
            prepare_time,
            simulate_time,
            write_back_time,
            total_frame_time: total,
            chain_count: self.order.len(),
            particle_count: self.store.len(),
            substeps: report.substeps,
        };
        check_frame_budget(total, self.config.frame_budget_ms, self.order.len());

        if report.missing_nodes > 0 {
            log::debug!("{} simulated nodes are missing from the host", report.missing_nodes);
        }
        self.last_report = report;
        report
    }
}

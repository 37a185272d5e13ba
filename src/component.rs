//! Shared batches and the per-chain handles that register into them.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::{Batch, BatchConfig, ChainId};
use crate::core::chain::ChainConfig;
use crate::error::Result;
use crate::host::Hierarchy;

/// One batch driven from several owners.
pub type SharedBatch = Arc<Mutex<Batch>>;

pub fn shared_batch(config: BatchConfig) -> SharedBatch {
    Arc::new(Mutex::new(Batch::new(config)))
}

/// Registration of one chain in a [`SharedBatch`].
///
/// The chain lives exactly as long as the handle: dropping it removes the
/// chain and releases its particles.
pub struct JiggleChain {
    batch: SharedBatch,
    id: ChainId,
    detached: bool,
}

impl JiggleChain {
    pub fn attach<H: Hierarchy>(batch: &SharedBatch, host: &H, config: ChainConfig) -> Result<Self> {
        let id = batch.lock().register_chain(host, config)?;
        Ok(Self {
            batch: Arc::clone(batch),
            id,
            detached: false,
        })
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn batch(&self) -> &SharedBatch {
        &self.batch
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.batch.lock().set_chain_enabled(self.id, enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.batch.lock().is_chain_enabled(self.id)
    }

    pub fn reset(&self) -> Result<()> {
        self.batch.lock().reset_chain(self.id)
    }

    /// Removes the chain now and hands back its configuration.
    pub fn detach(mut self) -> Result<ChainConfig> {
        self.detached = true;
        self.batch.lock().remove_chain(self.id)
    }
}

impl Drop for JiggleChain {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Err(err) = self.batch.lock().remove_chain(self.id) {
            log::debug!("dropping chain handle: {err}");
        }
    }
}

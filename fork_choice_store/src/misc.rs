use std::sync::Arc;

use anyhow::Result;
use types::phase0::{containers::Checkpoint, primitives::Gwei};

/// Justified and finalized checkpoints together with the balances fork choice weighs votes by.
///
/// Snapshots are never mutated. [`Store`] replaces the whole snapshot and increments `version`.
///
/// [`Store`]: crate::Store
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BalancesSnapshot {
    pub version: u64,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    /// Effective balances of validators in the justified state, indexed by validator index.
    /// Validators inactive in that state have a balance of 0.
    pub balances: Arc<[Gwei]>,
}

impl BalancesSnapshot {
    pub(crate) fn with_justified(&self, checkpoint: Checkpoint, balances: Arc<[Gwei]>) -> Self {
        Self {
            version: self.version + 1,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: self.finalized_checkpoint,
            balances,
        }
    }

    pub(crate) fn with_finalized(&self, checkpoint: Checkpoint) -> Self {
        Self {
            version: self.version + 1,
            finalized_checkpoint: checkpoint,
            balances: Arc::clone(&self.balances),
            ..*self
        }
    }
}

/// Source of justified balances, usually backed by a cache of checkpoint states.
pub trait BalancesProvider {
    fn justified_balances(&self, checkpoint: Checkpoint) -> Result<Arc<[Gwei]>>;
}

impl<F: Fn(Checkpoint) -> Result<Arc<[Gwei]>>> BalancesProvider for F {
    fn justified_balances(&self, checkpoint: Checkpoint) -> Result<Arc<[Gwei]>> {
        self(checkpoint)
    }
}

// Guarded by one lock in `Store`.
// `applied` are the balances the weights currently stored in the proto-array were computed with.
#[derive(Default)]
pub struct Balances {
    pub snapshot: Arc<BalancesSnapshot>,
    pub applied: Arc<[Gwei]>,
}

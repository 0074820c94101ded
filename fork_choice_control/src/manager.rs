use std::sync::Arc;

use features::Feature;
use log::{debug, trace, warn};
use operation_pools::{
    AttestationAggPool, AttestationDataValidator, BlockAttestationDataValidator,
    ValidateableAttestation,
};
use parking_lot::Mutex;
use prometheus_metrics::Metrics;
use types::{
    phase0::primitives::{Slot, H256},
    preset::Preset,
};

use crate::{
    manager_config::ManagerConfig,
    messages::GossipMessage,
    misc::ProcessingResult,
    pending::{FutureAttestations, PendingAttestations},
    processor::AttestationProcessor,
    unbounded_sink::UnboundedSink,
};

/// Routes attestations between fork choice, the aggregation pool and the network.
///
/// Attestations for unknown blocks are retried when the block is imported.
/// Attestations from the current slot are retried once the next slot starts.
pub struct AttestationManager<P: Preset, A, G, V = BlockAttestationDataValidator> {
    processor: A,
    pool: Arc<AttestationAggPool<P, V>>,
    deferred: Mutex<Deferred<P>>,
    gossip_tx: G,
    metrics: Option<Arc<Metrics>>,
}

struct Deferred<P: Preset> {
    until_block: PendingAttestations<P>,
    until_slot: FutureAttestations<P>,
}

impl<P, A, G, V> AttestationManager<P, A, G, V>
where
    P: Preset,
    A: AttestationProcessor<P>,
    G: UnboundedSink<GossipMessage<P>>,
    V: AttestationDataValidator<P>,
{
    #[must_use]
    pub fn new(
        config: ManagerConfig,
        processor: A,
        pool: Arc<AttestationAggPool<P, V>>,
        gossip_tx: G,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let deferred = Deferred {
            until_block: PendingAttestations::new(
                config.max_pending_attestations,
                config.pending_retention_slots,
            ),
            until_slot: FutureAttestations::default(),
        };

        Self {
            processor,
            pool,
            deferred: Mutex::new(deferred),
            gossip_tx,
            metrics,
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &Arc<AttestationAggPool<P, V>> {
        &self.pool
    }

    #[must_use]
    pub const fn processor(&self) -> &A {
        &self.processor
    }

    pub fn on_attestation(&self, attestation: Arc<ValidateableAttestation<P>>) -> ProcessingResult {
        if self.deferred.lock().until_block.contains(&attestation) {
            trace!("attestation is already waiting for a block: {attestation:?}");
            return ProcessingResult::UnknownBlock(attestation.data().beacon_block_root);
        }

        let result = self.processor.process_attestation(&attestation);

        match &result {
            ProcessingResult::Successful => {
                trace!(
                    "processed attestation successfully (data root: {:?})",
                    attestation.data_root(),
                );
                self.register_outcome(&result);
                self.add_to_pool(Arc::clone(&attestation));
                self.gossip_if_needed(&attestation);
            }
            ProcessingResult::UnknownBlock(block_root) => {
                if Feature::IgnoreAttestationsForUnknownBlocks.is_enabled() {
                    self.register_ignored();
                    return result;
                }

                debug!(
                    "attestation delayed until block {block_root:?} (data root: {:?})",
                    attestation.data_root(),
                );

                self.register_outcome(&result);

                let mut deferred = self.deferred.lock();
                deferred.until_block.add(*block_root, attestation);
                self.update_deferred_metrics(&deferred);
            }
            ProcessingResult::SavedForFuture => {
                if Feature::IgnoreFutureAttestations.is_enabled() {
                    self.register_ignored();
                    return result;
                }

                debug!(
                    "attestation delayed until slot after {} (data root: {:?})",
                    attestation.data().slot,
                    attestation.data_root(),
                );

                self.register_outcome(&result);
                self.add_to_pool(Arc::clone(&attestation));

                let mut deferred = self.deferred.lock();
                deferred.until_slot.add(attestation);
                self.update_deferred_metrics(&deferred);
            }
            ProcessingResult::Invalid(error) => {
                debug!(
                    "attestation rejected (error: {error}, data root: {:?})",
                    attestation.data_root(),
                );

                self.register_outcome(&result);
            }
        }

        result
    }

    /// Retries attestations that were waiting for the block with root `block_root`.
    pub fn on_block_imported(&self, block_root: H256) {
        let attestations = {
            let mut deferred = self.deferred.lock();
            let attestations = deferred.until_block.take(block_root);
            self.update_deferred_metrics(&deferred);
            attestations
        };

        if attestations.is_empty() {
            return;
        }

        debug!(
            "retrying {} attestations delayed until block {block_root:?}",
            attestations.len(),
        );

        for attestation in attestations {
            self.on_attestation(attestation);
        }
    }

    /// Applies attestations from earlier slots to fork choice and prunes stale ones.
    pub fn on_slot(&self, slot: Slot) {
        self.processor.on_slot(slot);
        self.pool.on_slot(slot);

        let due = {
            let mut deferred = self.deferred.lock();
            let due = deferred.until_slot.take_due(slot);
            deferred.until_block.prune(slot);
            self.update_deferred_metrics(&deferred);
            due
        };

        if !due.is_empty() {
            debug!("applying {} attestations delayed until slot {slot}", due.len());
        }

        for attestation in &due {
            match attestation.indexed_attestation() {
                Some(indexed_attestation) => self
                    .processor
                    .apply_indexed_attestation_to_fork_choice(indexed_attestation),
                None => warn!(
                    "delayed attestation has no indexed attestation (data root: {:?})",
                    attestation.data_root(),
                ),
            }
        }

        for attestation in &due {
            self.gossip_if_needed(attestation);
        }
    }

    #[must_use]
    pub fn pending_attestation_count(&self) -> usize {
        self.deferred.lock().until_block.len()
    }

    #[must_use]
    pub fn future_attestation_count(&self) -> usize {
        self.deferred.lock().until_slot.len()
    }

    fn add_to_pool(&self, attestation: Arc<ValidateableAttestation<P>>) {
        if let Err(error) = self.pool.add(attestation) {
            warn!("unable to add attestation to pool: {error}");
        }
    }

    fn gossip_if_needed(&self, attestation: &Arc<ValidateableAttestation<P>>) {
        if !attestation.mark_gossiped() {
            return;
        }

        let message = if attestation.is_aggregate() {
            GossipMessage::PublishAggregate(Arc::clone(attestation))
        } else {
            GossipMessage::PublishAttestation(Arc::clone(attestation))
        };

        message.send(&self.gossip_tx);
    }

    fn register_outcome(&self, result: &ProcessingResult) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.register_attestation_outcome(&[result.as_ref()]);
        }
    }

    fn register_ignored(&self) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.register_attestation_outcome(&["ignored"]);
        }
    }

    fn update_deferred_metrics(&self, deferred: &Deferred<P>) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_pending_attestations(deferred.until_block.len());
            metrics.set_future_attestations(deferred.until_slot.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use anyhow::{anyhow, Result};
    use factory::TestState;
    use futures::channel::mpsc::{self, UnboundedReceiver};
    use operation_pools::PoolConfig;
    use types::{
        phase0::containers::{AttestationData, Checkpoint, IndexedAttestation},
        preset::Minimal,
    };

    use super::*;

    const BLOCK_ROOT: H256 = H256::repeat_byte(1);

    // Classifies attestations by their committee index and records applied attestations.
    #[derive(Default)]
    struct ScriptedProcessor {
        known_block: AtomicBool,
        applied: AtomicU64,
    }

    impl AttestationProcessor<Minimal> for ScriptedProcessor {
        fn process_attestation(
            &self,
            attestation: &ValidateableAttestation<Minimal>,
        ) -> ProcessingResult {
            let data = attestation.data();

            attestation.set_committee_shuffling_seed(H256::zero());

            match data.index {
                0 if !self.known_block.load(Ordering::SeqCst) => {
                    ProcessingResult::UnknownBlock(BLOCK_ROOT)
                }
                0 => ProcessingResult::Successful,
                1 => {
                    // Saved attestations have been validated and indexed.
                    attestation
                        .indexed_attestation_or_try_init(|| {
                            Ok(IndexedAttestation {
                                attesting_indices: vec![data.slot],
                                data,
                                ..IndexedAttestation::default()
                            })
                        })
                        .expect("initialization cannot fail");

                    ProcessingResult::SavedForFuture
                }
                _ => ProcessingResult::Invalid(anyhow!("committee index too high")),
            }
        }

        fn apply_indexed_attestation_to_fork_choice(&self, _indexed: &IndexedAttestation) {
            self.applied.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slot(&self, _slot: Slot) {}
    }

    type Manager = AttestationManager<
        Minimal,
        ScriptedProcessor,
        mpsc::UnboundedSender<GossipMessage<Minimal>>,
    >;

    fn manager() -> (Manager, UnboundedReceiver<GossipMessage<Minimal>>) {
        let (gossip_tx, gossip_rx) = mpsc::unbounded();
        let pool = Arc::new(AttestationAggPool::<Minimal>::new(PoolConfig::default(), None));

        let manager = AttestationManager::new(
            ManagerConfig::default(),
            ScriptedProcessor::default(),
            pool,
            gossip_tx,
            None,
        );

        (manager, gossip_rx)
    }

    // 3 committees per slot. Every committee has 2 or 3 members.
    fn attestation(
        state: &TestState<Minimal>,
        slot: Slot,
        index: u64,
    ) -> Result<Arc<ValidateableAttestation<Minimal>>> {
        let data = AttestationData {
            slot,
            index,
            beacon_block_root: BLOCK_ROOT,
            target: Checkpoint {
                epoch: 0,
                root: BLOCK_ROOT,
            },
            ..AttestationData::default()
        };

        let attestation = state.attestation(data, &[0])?;

        Ok(Arc::new(ValidateableAttestation::from_network(attestation)))
    }

    fn state() -> Result<TestState<Minimal>> {
        Ok(TestState::new(64)?.with_committees_per_slot(3))
    }

    fn gossiped(gossip_rx: &mut UnboundedReceiver<GossipMessage<Minimal>>) -> usize {
        core::iter::from_fn(|| gossip_rx.try_next().ok().flatten()).count()
    }

    #[test]
    fn successful_attestations_are_pooled_and_gossiped() -> Result<()> {
        let state = state()?;
        let (manager, mut gossip_rx) = manager();
        manager.processor().known_block.store(true, Ordering::SeqCst);

        let attestation = attestation(&state, 3, 0)?;
        let result = manager.on_attestation(Arc::clone(&attestation));

        assert!(result.is_successful());
        assert_eq!(manager.pool().size(), 1);
        assert_eq!(gossiped(&mut gossip_rx), 1);

        // The same attestation is not gossiped twice.
        manager.on_attestation(attestation);

        assert_eq!(gossiped(&mut gossip_rx), 0);

        Ok(())
    }

    #[test]
    fn attestations_for_unknown_blocks_are_retried_on_import() -> Result<()> {
        let state = state()?;
        let (manager, mut gossip_rx) = manager();

        let result = manager.on_attestation(attestation(&state, 3, 0)?);

        assert!(matches!(result, ProcessingResult::UnknownBlock(root) if root == BLOCK_ROOT));
        assert_eq!(manager.pending_attestation_count(), 1);
        assert_eq!(manager.pool().size(), 0);

        // Attestations already waiting are not processed again.
        let result = manager.on_attestation(attestation(&state, 3, 0)?);

        assert!(matches!(result, ProcessingResult::UnknownBlock(_)));
        assert_eq!(manager.pending_attestation_count(), 1);

        manager.on_block_imported(H256::repeat_byte(2));

        assert_eq!(manager.pending_attestation_count(), 1);

        manager.processor().known_block.store(true, Ordering::SeqCst);
        manager.on_block_imported(BLOCK_ROOT);

        assert_eq!(manager.pending_attestation_count(), 0);
        assert_eq!(manager.pool().size(), 1);
        assert_eq!(gossiped(&mut gossip_rx), 1);

        Ok(())
    }

    #[test]
    fn future_attestations_are_applied_on_later_slot() -> Result<()> {
        let state = state()?;
        let (manager, mut gossip_rx) = manager();

        let result = manager.on_attestation(attestation(&state, 3, 1)?);

        assert!(matches!(result, ProcessingResult::SavedForFuture));
        assert_eq!(manager.future_attestation_count(), 1);

        // Saved attestations are available for aggregation right away.
        assert_eq!(manager.pool().size(), 1);
        assert_eq!(gossiped(&mut gossip_rx), 0);

        manager.on_slot(3);

        assert_eq!(manager.processor().applied.load(Ordering::SeqCst), 0);
        assert_eq!(manager.future_attestation_count(), 1);

        manager.on_slot(4);

        assert_eq!(manager.processor().applied.load(Ordering::SeqCst), 1);
        assert_eq!(manager.future_attestation_count(), 0);
        assert_eq!(gossiped(&mut gossip_rx), 1);

        Ok(())
    }

    #[test]
    fn invalid_attestations_are_dropped() -> Result<()> {
        let state = state()?;
        let (manager, mut gossip_rx) = manager();

        let result = manager.on_attestation(attestation(&state, 3, 2)?);

        assert!(matches!(result, ProcessingResult::Invalid(_)));
        assert_eq!(manager.pool().size(), 0);
        assert_eq!(manager.pending_attestation_count(), 0);
        assert_eq!(manager.future_attestation_count(), 0);
        assert_eq!(gossiped(&mut gossip_rx), 0);

        Ok(())
    }

    #[test]
    fn manager_works_with_metrics_and_without_gossip() -> Result<()> {
        let state = state()?;
        let metrics = Arc::new(Metrics::new()?);
        let pool = Arc::new(AttestationAggPool::<Minimal>::new(PoolConfig::default(), None));

        let manager = AttestationManager::new(
            ManagerConfig::default(),
            ScriptedProcessor::default(),
            pool,
            None::<mpsc::UnboundedSender<GossipMessage<Minimal>>>,
            Some(Arc::clone(&metrics)),
        );

        manager.on_attestation(attestation(&state, 3, 0)?);
        manager.on_attestation(attestation(&state, 3, 1)?);
        manager.on_attestation(attestation(&state, 3, 2)?);

        assert_eq!(manager.pending_attestation_count(), 1);
        assert_eq!(manager.future_attestation_count(), 1);

        Ok(())
    }
}

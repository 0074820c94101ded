use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use anyhow::Result;
use hashing::SszHash as _;
use itertools::Itertools as _;
use log::debug;
use parking_lot::Mutex;
use prometheus_metrics::Metrics;
use typenum::Unsigned as _;
use types::{
    phase0::{
        containers::Attestation,
        primitives::{Slot, H256},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{
    attestation_agg_pool::{
        group::MatchingDataAttestationGroup,
        types::ValidateableAttestation,
        validation::{AttestationDataValidator, AttestationForkChecker, BlockAttestationDataValidator},
    },
    error::Error,
    pool_config::PoolConfig,
};

/// Attestations waiting to be included in blocks, grouped by [`AttestationData`].
///
/// All state is guarded by a single lock.
///
/// [`AttestationData`]: types::phase0::containers::AttestationData
pub struct AttestationAggPool<P: Preset, V = BlockAttestationDataValidator> {
    config: PoolConfig,
    validator: V,
    state: Mutex<PoolState<P>>,
    metrics: Option<Arc<Metrics>>,
}

#[derive(Default)]
struct PoolState<P: Preset> {
    groups: HashMap<H256, MatchingDataAttestationGroup<P>>,
    // Data roots are kept ordered within a slot to make block packing deterministic.
    data_roots_by_slot: BTreeMap<Slot, BTreeSet<H256>>,
    size: usize,
}

impl<P: Preset, V: AttestationDataValidator<P>> AttestationAggPool<P, V> {
    #[must_use]
    pub fn new(config: PoolConfig, metrics: Option<Arc<Metrics>>) -> Self
    where
        V: Default,
    {
        Self::with_validator(config, V::default(), metrics)
    }

    #[must_use]
    pub fn with_validator(config: PoolConfig, validator: V, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            config,
            validator,
            state: Mutex::default(),
            metrics,
        }
    }

    /// Adds an attestation to the group with the same data.
    ///
    /// Returns `true` if the attestation added attesters not covered by ones already present.
    /// Fails if the committee shuffling seed of the attestation has not been recorded.
    pub fn add(&self, attestation: Arc<ValidateableAttestation<P>>) -> Result<bool> {
        let data = attestation.data();
        let data_root = attestation.data_root();

        let seed = attestation
            .committee_shuffling_seed()
            .ok_or(Error::MissingShufflingSeed { data_root })?;

        let mut state = self.state.lock();

        let added = state
            .groups
            .entry(data_root)
            .or_insert_with(|| MatchingDataAttestationGroup::new(data, data_root, seed))
            .add(attestation);

        if added {
            state.size += 1;
        }

        state
            .data_roots_by_slot
            .entry(data.slot)
            .or_default()
            .insert(data_root);

        self.update_metrics(&state);

        Ok(added)
    }

    /// Removes attestations exactly equal to `attestation`, usually because it was included in
    /// a block.
    pub fn remove(&self, attestation: &Attestation<P>) {
        let mut state = self.state.lock();
        state.remove(attestation);
        self.update_metrics(&state);
    }

    pub fn remove_all<'attestations>(
        &self,
        attestations: impl IntoIterator<Item = &'attestations Attestation<P>>,
    ) {
        let mut state = self.state.lock();

        for attestation in attestations {
            state.remove(attestation);
        }

        self.update_metrics(&state);
    }

    /// Drops attestations too old to be included in a block proposed at `slot` or later.
    pub fn on_slot(&self, slot: Slot) {
        let retention_slots =
            P::SlotsPerEpoch::U64.saturating_mul(self.config.attestation_retention_epochs);

        if slot <= retention_slots {
            return;
        }

        let first_valid_slot = slot - retention_slots;

        let mut state = self.state.lock();
        let retained = state.data_roots_by_slot.split_off(&first_valid_slot);
        let evicted = core::mem::replace(&mut state.data_roots_by_slot, retained);

        let evicted_count = evicted
            .into_values()
            .flatten()
            .filter_map(|data_root| state.groups.remove(&data_root))
            .map(|group| group.len())
            .sum::<usize>();

        state.size = state.size.saturating_sub(evicted_count);

        if evicted_count > 0 {
            debug!("evicted {evicted_count} attestations from slots before {first_valid_slot}");
        }

        self.update_metrics(&state);
    }

    /// Selects aggregates to include in a block built on `state`.
    ///
    /// Attestations from the most recent slots come first. Groups whose data cannot be included
    /// on top of `state` or that were made on another fork are skipped. No more than
    /// [`Preset::MaxAttestations`] aggregates are returned.
    pub fn attestations_for_block(
        &self,
        state: &impl BeaconState<P>,
        fork_checker: &impl AttestationForkChecker<P>,
    ) -> Vec<Attestation<P>> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.attestation_pool_pack_times.start_timer());

        let pool = self.state.lock();

        let PoolState {
            groups,
            data_roots_by_slot,
            ..
        } = &*pool;

        let attestations = data_roots_by_slot
            .values()
            .rev()
            .flatten()
            .filter_map(|data_root| groups.get(data_root))
            .filter(|group| match self.validator.validate(state, group.data()) {
                Ok(()) => true,
                Err(reason) => {
                    features::log!(
                        DebugAttestationPacker,
                        "skipping attestations with data root {:?}: {reason}",
                        group.data_root(),
                    );

                    false
                }
            })
            .filter(|group| {
                let from_correct_fork = fork_checker.is_from_correct_fork(group);

                if !from_correct_fork {
                    features::log!(
                        DebugAttestationPacker,
                        "skipping attestations with data root {:?} from another fork",
                        group.data_root(),
                    );
                }

                from_correct_fork
            })
            .flat_map(MatchingDataAttestationGroup::aggregates)
            .take(P::MaxAttestations::USIZE)
            .collect_vec();

        features::log!(
            DebugAttestationPacker,
            "packed {} attestations for block at slot {}",
            attestations.len(),
            state.slot(),
        );

        attestations
    }

    /// Returns the best aggregate of attestations with data matching `data_root`.
    #[must_use]
    pub fn create_aggregate_for(&self, data_root: H256) -> Option<Attestation<P>> {
        self.state
            .lock()
            .groups
            .get(&data_root)?
            .aggregates()
            .next()
    }

    /// Number of attestations in the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    fn update_metrics(&self, state: &PoolState<P>) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_attestation_pool_size(state.size);
            metrics.set_attestation_pool_groups(state.groups.len());
        }
    }
}

impl<P: Preset> PoolState<P> {
    fn remove(&mut self, attestation: &Attestation<P>) {
        let data_root = attestation.data.hash_tree_root();

        let Some(group) = self.groups.get_mut(&data_root) else {
            return;
        };

        let removed = group.remove(attestation);
        let now_empty = group.is_empty();

        self.size = self.size.saturating_sub(removed);

        if now_empty {
            self.groups.remove(&data_root);

            let slot = attestation.data.slot;

            if let Some(data_roots) = self.data_roots_by_slot.get_mut(&slot) {
                data_roots.remove(&data_root);

                if data_roots.is_empty() {
                    self.data_roots_by_slot.remove(&slot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use factory::TestState;
    use types::{
        phase0::containers::{AttestationData, Checkpoint},
        preset::Minimal,
    };

    use crate::attestation_agg_pool::validation::{InvalidReason, ShufflingForkChecker};

    use super::*;

    // 8 committees of 8 validators per epoch in `Minimal`.
    const VALIDATOR_COUNT: u64 = 64;

    struct AcceptAll;

    impl AttestationDataValidator<Minimal> for AcceptAll {
        fn validate(
            &self,
            _state: &impl BeaconState<Minimal>,
            _data: AttestationData,
        ) -> Result<(), InvalidReason> {
            Ok(())
        }
    }

    struct SameFork;

    impl AttestationForkChecker<Minimal> for SameFork {
        fn is_from_correct_fork(&self, _group: &MatchingDataAttestationGroup<Minimal>) -> bool {
            true
        }
    }

    fn test_state() -> TestState<Minimal> {
        TestState::new(VALIDATOR_COUNT).expect("keys can be generated")
    }

    fn pool() -> AttestationAggPool<Minimal, AcceptAll> {
        AttestationAggPool::with_validator(PoolConfig::default(), AcceptAll, None)
    }

    fn data(slot: Slot) -> AttestationData {
        AttestationData {
            slot,
            beacon_block_root: H256::repeat_byte(1),
            ..AttestationData::default()
        }
    }

    fn attestation(
        state: &TestState<Minimal>,
        data: AttestationData,
        positions: &[usize],
    ) -> Arc<ValidateableAttestation<Minimal>> {
        let attestation = state
            .attestation(data, positions)
            .expect("positions are within the committee");

        let attestation = ValidateableAttestation::from_network(attestation);
        attestation.set_committee_shuffling_seed(state.shuffling_seed(data.target.epoch));
        Arc::new(attestation)
    }

    fn positions(attestation: &Attestation<Minimal>) -> Vec<usize> {
        attestation.aggregation_bits.iter_ones().collect()
    }

    #[test]
    fn aggregate_subsumes_overlapping_attestations() -> Result<()> {
        let state = test_state();
        let pool = pool();

        let first = attestation(&state, data(5), &[0]);
        let second = attestation(&state, data(5), &[0, 1]);

        assert!(pool.add(Arc::clone(&first))?);
        assert!(pool.add(Arc::clone(&second))?);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.group_count(), 1);

        let packed = pool.attestations_for_block(&state, &SameFork);

        assert_eq!(packed.len(), 1);
        assert_eq!(positions(&packed[0]), [0, 1]);

        pool.remove(first.attestation());

        assert_eq!(pool.size(), 1);
        assert_eq!(
            pool.create_aggregate_for(second.data_root()).as_ref(),
            Some(second.attestation()),
        );

        Ok(())
    }

    #[test]
    fn subsets_do_not_change_size() -> Result<()> {
        let state = test_state();
        let pool = pool();

        assert!(pool.add(attestation(&state, data(5), &[0, 1, 2]))?);
        assert!(!pool.add(attestation(&state, data(5), &[1, 2]))?);
        assert_eq!(pool.size(), 1);

        Ok(())
    }

    #[test]
    fn attestations_without_shuffling_seed_are_rejected() -> Result<()> {
        let state = test_state();
        let pool = pool();

        let attestation = state.attestation(data(5), &[0])?;

        pool.add(Arc::new(ValidateableAttestation::from_network(attestation)))
            .expect_err("shuffling seed is required");

        assert_eq!(pool.size(), 0);

        Ok(())
    }

    #[test]
    fn removing_last_attestation_removes_group() -> Result<()> {
        let state = test_state();
        let pool = pool();
        let attestation = attestation(&state, data(5), &[3]);

        pool.add(Arc::clone(&attestation))?;
        pool.remove_all([attestation.attestation(), attestation.attestation()]);

        assert_eq!(pool.size(), 0);
        assert_eq!(pool.group_count(), 0);
        assert_eq!(pool.create_aggregate_for(attestation.data_root()), None);
        assert!(pool.attestations_for_block(&state, &SameFork).is_empty());

        Ok(())
    }

    #[test]
    fn removing_unknown_attestation_is_a_no_op() -> Result<()> {
        let state = test_state();
        let pool = pool();

        pool.add(attestation(&state, data(5), &[0]))?;
        pool.remove(&state.attestation(data(6), &[0])?);

        assert_eq!(pool.size(), 1);

        Ok(())
    }

    #[test]
    fn on_slot_evicts_old_attestations_once() -> Result<()> {
        let state = test_state();
        let pool = pool();

        pool.add(attestation(&state, data(1), &[0]))?;
        pool.add(attestation(&state, data(1), &[1]))?;
        pool.add(attestation(&state, data(3), &[0]))?;

        // Nothing is evicted while within the retention window of 16 slots.
        pool.on_slot(16);
        assert_eq!(pool.size(), 3);

        pool.on_slot(18);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.group_count(), 1);

        pool.on_slot(18);
        assert_eq!(pool.size(), 1);

        pool.on_slot(20);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.group_count(), 0);

        Ok(())
    }

    #[test]
    fn recent_slots_are_packed_first() -> Result<()> {
        let state = test_state();
        let pool = pool();

        pool.add(attestation(&state, data(2), &[0]))?;
        pool.add(attestation(&state, data(4), &[0]))?;
        pool.add(attestation(&state, data(3), &[0]))?;

        let slots = pool
            .attestations_for_block(&state, &SameFork)
            .into_iter()
            .map(|attestation| attestation.data.slot)
            .collect_vec();

        assert_eq!(slots, [4, 3, 2]);

        Ok(())
    }

    #[test]
    fn attestations_from_other_forks_are_not_packed() -> Result<()> {
        let state = test_state();
        let other_fork = TestState::<Minimal>::new(0)?.with_shuffling_salt(7);
        let pool = pool();

        pool.add(attestation(&state, data(2), &[0]))?;

        assert_eq!(
            pool.attestations_for_block(&state, &ShufflingForkChecker::new(&state))
                .len(),
            1,
        );

        assert!(pool
            .attestations_for_block(&state, &ShufflingForkChecker::new(&other_fork))
            .is_empty());

        Ok(())
    }

    #[test]
    fn invalid_data_is_not_packed() -> Result<()> {
        let justified = Checkpoint {
            epoch: 0,
            root: H256::repeat_byte(9),
        };

        let state = test_state()
            .with_slot(6)
            .with_justified_checkpoints(justified, justified);

        let pool = AttestationAggPool::<Minimal>::new(PoolConfig::default(), None);

        let includable = AttestationData {
            source: justified,
            ..data(4)
        };

        // Wrong source checkpoint.
        let excluded = data(5);

        pool.add(attestation(&state, includable, &[0]))?;
        pool.add(attestation(&state, excluded, &[0]))?;

        let packed = pool.attestations_for_block(&state, &ShufflingForkChecker::new(&state));

        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].data, includable);

        Ok(())
    }
}

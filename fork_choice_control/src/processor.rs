use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use features::Feature;
use fork_choice_store::Store;
use helper_functions::{
    accessors, misc, predicates,
    verifier::{NullVerifier, SingleVerifier},
};
use log::trace;
use operation_pools::ValidateableAttestation;
use types::{
    phase0::{
        containers::{Checkpoint, IndexedAttestation},
        primitives::Slot,
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{manager_config::ManagerConfig, misc::ProcessingResult};

pub trait AttestationProcessor<P: Preset>: Send + Sync {
    fn process_attestation(&self, attestation: &ValidateableAttestation<P>) -> ProcessingResult;

    /// Applies an attestation that was validated earlier.
    fn apply_indexed_attestation_to_fork_choice(&self, indexed_attestation: &IndexedAttestation);

    fn on_slot(&self, slot: Slot);
}

/// Source of the states attestations are validated against.
pub trait StateProvider<P: Preset>: Send + Sync {
    type State: BeaconState<P>;

    /// Returns the state at the start of the target epoch.
    ///
    /// Committees and public keys of attesters are looked up in it.
    fn checkpoint_state(&self, checkpoint: Checkpoint) -> Result<Arc<Self::State>>;
}

pub struct ForkChoiceAttestationProcessor<S> {
    config: ManagerConfig,
    store: Arc<Store>,
    state_provider: S,
    current_slot: AtomicU64,
}

impl<S> ForkChoiceAttestationProcessor<S> {
    #[must_use]
    pub const fn new(config: ManagerConfig, store: Arc<Store>, state_provider: S) -> Self {
        Self {
            config,
            store,
            state_provider,
            current_slot: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn current_slot(&self) -> Slot {
        self.current_slot.load(Ordering::Acquire)
    }

    fn validate<P: Preset>(
        &self,
        attestation: &ValidateableAttestation<P>,
        current_slot: Slot,
    ) -> Result<Option<ProcessingResult>>
    where
        S: StateProvider<P>,
    {
        let data = attestation.data();
        let target = data.target;

        ensure!(
            target.epoch == misc::compute_epoch_at_slot::<P>(data.slot),
            "attestation target epoch {} does not match slot {}",
            target.epoch,
            data.slot,
        );

        ensure!(
            attestation.aggregation_bits().count_ones() > 0,
            "attestation has no aggregation bits set",
        );

        ensure!(
            data.slot <= current_slot.saturating_add(self.config.max_future_slots),
            "attestation from slot {} is too far ahead of current slot {current_slot}",
            data.slot,
        );

        let current_epoch = misc::compute_epoch_at_slot::<P>(current_slot);
        let previous_epoch = current_epoch.saturating_sub(1);

        ensure!(
            target.epoch >= previous_epoch,
            "attestation target epoch {} is older than previous epoch {previous_epoch}",
            target.epoch,
        );

        for block_root in [target.root, data.beacon_block_root] {
            if !self.store.contains_block(block_root) {
                return Ok(Some(ProcessingResult::UnknownBlock(block_root)));
            }
        }

        let block_slot = self
            .store
            .block_slot(data.beacon_block_root)
            .ok_or_else(|| anyhow!("block {:?} was pruned", data.beacon_block_root))?;

        ensure!(
            block_slot <= data.slot,
            "attestation from slot {} votes for block from later slot {block_slot}",
            data.slot,
        );

        let epoch_start_slot = misc::compute_start_slot_at_epoch::<P>(target.epoch);

        ensure!(
            self.store
                .ancestor_at_slot(data.beacon_block_root, epoch_start_slot)
                == Some(target.root),
            "attestation target {target:?} is not an ancestor of block {:?}",
            data.beacon_block_root,
        );

        let state = self.state_provider.checkpoint_state(target)?;

        let indexed_attestation = attestation.indexed_attestation_or_try_init(|| {
            accessors::get_indexed_attestation::<P>(state.as_ref(), attestation.attestation())
        })?;

        if attestation.produced_locally() && Feature::TrustOwnAttestationSignatures.is_enabled() {
            predicates::validate_received_indexed_attestation::<P>(
                state.as_ref(),
                indexed_attestation,
                NullVerifier,
            )?;
        } else {
            predicates::validate_received_indexed_attestation::<P>(
                state.as_ref(),
                indexed_attestation,
                SingleVerifier,
            )?;
        }

        let seed = BeaconState::<P>::shuffling_seed(state.as_ref(), target.epoch);
        attestation.set_committee_shuffling_seed(seed);

        Ok(None)
    }
}

impl<P: Preset, S: StateProvider<P>> AttestationProcessor<P> for ForkChoiceAttestationProcessor<S> {
    fn process_attestation(&self, attestation: &ValidateableAttestation<P>) -> ProcessingResult {
        let current_slot = self.current_slot();

        match self.validate(attestation, current_slot) {
            Ok(Some(result)) => return result,
            Ok(None) => {}
            Err(error) => return ProcessingResult::Invalid(error),
        }

        // Attestations only affect fork choice from the slot after the one they were made in.
        if attestation.data().slot >= current_slot {
            return ProcessingResult::SavedForFuture;
        }

        if let Some(indexed_attestation) = attestation.indexed_attestation() {
            self.store.on_attestation(indexed_attestation);
        }

        ProcessingResult::Successful
    }

    fn apply_indexed_attestation_to_fork_choice(&self, indexed_attestation: &IndexedAttestation) {
        trace!(
            "applying attestation from slot {} with {} attesters",
            indexed_attestation.data.slot,
            indexed_attestation.attesting_indices.len(),
        );

        self.store.on_attestation(indexed_attestation);
    }

    fn on_slot(&self, slot: Slot) {
        self.current_slot.fetch_max(slot, Ordering::AcqRel);
    }
}

use bls::PublicKeyBytes;

use crate::{
    phase0::{
        containers::{Checkpoint, Fork},
        primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
};

/// The checkpoints a post-state carries for fork choice.
///
/// Implemented by whatever the state transition produces after applying a block.
pub trait PostState {
    fn current_justified_checkpoint(&self) -> Checkpoint;

    fn finalized_checkpoint(&self) -> Checkpoint;
}

/// Read-only view of a beacon state as needed to validate and aggregate attestations.
///
/// Committees and shuffling seeds are expected to be precomputed by the implementor.
pub trait BeaconState<P: Preset>: PostState + Send + Sync {
    fn slot(&self) -> Slot;

    fn fork(&self) -> Fork;

    fn genesis_validators_root(&self) -> H256;

    fn previous_justified_checkpoint(&self) -> Checkpoint;

    fn committee_count_at_slot(&self, slot: Slot) -> u64;

    fn beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Option<&[ValidatorIndex]>;

    fn public_key(&self, validator_index: ValidatorIndex) -> Option<&PublicKeyBytes>;

    /// The seed used to shuffle committees in `epoch`.
    ///
    /// Attestations with the same data but from different forks are told apart by this.
    fn shuffling_seed(&self, epoch: Epoch) -> H256;
}

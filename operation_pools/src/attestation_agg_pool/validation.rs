use helper_functions::{accessors, misc};
use typenum::Unsigned as _;
use types::{
    phase0::{
        consts::MIN_ATTESTATION_INCLUSION_DELAY,
        containers::{AttestationData, Checkpoint},
        primitives::{CommitteeIndex, Epoch, Slot},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::attestation_agg_pool::group::MatchingDataAttestationGroup;

// `thiserror` treats any field named `source` as the error source, which `Checkpoint` is not.
// `Display` and `Error` are implemented manually for that reason.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InvalidReason {
    CommitteeIndexTooHigh {
        index: CommitteeIndex,
        committee_count: u64,
    },
    NotFromCurrentOrPreviousEpoch { target_epoch: Epoch },
    SlotNotInEpoch { slot: Slot, target_epoch: Epoch },
    SubmittedTooQuickly { slot: Slot, state_slot: Slot },
    SubmittedTooLate { slot: Slot, state_slot: Slot },
    IncorrectCurrentJustifiedCheckpoint {
        source: Checkpoint,
        expected: Checkpoint,
    },
    IncorrectPreviousJustifiedCheckpoint {
        source: Checkpoint,
        expected: Checkpoint,
    },
}

impl core::fmt::Display for InvalidReason {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CommitteeIndexTooHigh {
                index,
                committee_count,
            } => write!(
                formatter,
                "committee index too high (index: {index}, committee count: {committee_count})",
            ),
            Self::NotFromCurrentOrPreviousEpoch { target_epoch } => write!(
                formatter,
                "attestation not from current or previous epoch (target epoch: {target_epoch})",
            ),
            Self::SlotNotInEpoch { slot, target_epoch } => write!(
                formatter,
                "attestation slot {slot} not in target epoch {target_epoch}",
            ),
            Self::SubmittedTooQuickly { slot, state_slot } => write!(
                formatter,
                "attestation from slot {slot} submitted too quickly (state slot: {state_slot})",
            ),
            Self::SubmittedTooLate { slot, state_slot } => write!(
                formatter,
                "attestation from slot {slot} submitted too late (state slot: {state_slot})",
            ),
            Self::IncorrectCurrentJustifiedCheckpoint { source, expected } => write!(
                formatter,
                "attestation source does not match current justified checkpoint \
                 (source: {source:?}, expected: {expected:?})",
            ),
            Self::IncorrectPreviousJustifiedCheckpoint { source, expected } => write!(
                formatter,
                "attestation source does not match previous justified checkpoint \
                 (source: {source:?}, expected: {expected:?})",
            ),
        }
    }
}

impl std::error::Error for InvalidReason {}

/// Decides whether attestations with some data can be included in a block built on a state.
pub trait AttestationDataValidator<P: Preset> {
    fn validate(
        &self,
        state: &impl BeaconState<P>,
        data: AttestationData,
    ) -> Result<(), InvalidReason>;
}

/// The checks `process_attestation` performs on `AttestationData` that do not depend on
/// aggregation bits or signatures.
#[derive(Clone, Copy, Default, Debug)]
pub struct BlockAttestationDataValidator;

impl<P: Preset> AttestationDataValidator<P> for BlockAttestationDataValidator {
    fn validate(
        &self,
        state: &impl BeaconState<P>,
        data: AttestationData,
    ) -> Result<(), InvalidReason> {
        let AttestationData {
            slot,
            index,
            source,
            target,
            ..
        } = data;

        let committee_count = state.committee_count_at_slot(slot);

        if index >= committee_count {
            return Err(InvalidReason::CommitteeIndexTooHigh {
                index,
                committee_count,
            });
        }

        let current_epoch = accessors::get_current_epoch::<P>(state);
        let previous_epoch = accessors::get_previous_epoch::<P>(state);

        if target.epoch != previous_epoch && target.epoch != current_epoch {
            return Err(InvalidReason::NotFromCurrentOrPreviousEpoch {
                target_epoch: target.epoch,
            });
        }

        if target.epoch != misc::compute_epoch_at_slot::<P>(slot) {
            return Err(InvalidReason::SlotNotInEpoch {
                slot,
                target_epoch: target.epoch,
            });
        }

        let state_slot = state.slot();

        if slot.saturating_add(MIN_ATTESTATION_INCLUSION_DELAY) > state_slot {
            return Err(InvalidReason::SubmittedTooQuickly { slot, state_slot });
        }

        if state_slot > slot.saturating_add(P::SlotsPerEpoch::U64) {
            return Err(InvalidReason::SubmittedTooLate { slot, state_slot });
        }

        if target.epoch == current_epoch {
            let expected = state.current_justified_checkpoint();

            if source != expected {
                return Err(InvalidReason::IncorrectCurrentJustifiedCheckpoint { source, expected });
            }
        } else {
            let expected = state.previous_justified_checkpoint();

            if source != expected {
                return Err(InvalidReason::IncorrectPreviousJustifiedCheckpoint { source, expected });
            }
        }

        Ok(())
    }
}

/// Decides whether the attestations in a group were made on the same fork as a block.
pub trait AttestationForkChecker<P: Preset> {
    fn is_from_correct_fork(&self, group: &MatchingDataAttestationGroup<P>) -> bool;
}

/// Compares committee shuffling seeds.
///
/// Attestations made on a different fork may have identical data but different committees.
/// Their aggregation bits would then refer to different validators.
pub struct ShufflingForkChecker<'state, S> {
    state: &'state S,
}

impl<'state, S> ShufflingForkChecker<'state, S> {
    #[must_use]
    pub const fn new(state: &'state S) -> Self {
        Self { state }
    }
}

impl<P: Preset, S: BeaconState<P>> AttestationForkChecker<P> for ShufflingForkChecker<'_, S> {
    fn is_from_correct_fork(&self, group: &MatchingDataAttestationGroup<P>) -> bool {
        let seed = self.state.shuffling_seed(group.data().target.epoch);
        group.committee_shuffling_seed() == seed
    }
}

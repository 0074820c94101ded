use bls::AggregateSignatureBytes;

use crate::{
    bit_list::BitList,
    phase0::primitives::{CommitteeIndex, Domain, Epoch, Slot, ValidatorIndex, Version, H256},
    preset::Preset,
};

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Attestation<P: Preset> {
    pub aggregation_bits: BitList<P::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: AggregateSignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// The fields of a block that fork choice reads.
///
/// The body is only represented by its root. This makes the root of a `BeaconBlock`
/// equal to the root of the full block it summarizes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ForkData {
    pub current_version: Version,
    pub genesis_validators_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct IndexedAttestation {
    pub attesting_indices: Vec<ValidatorIndex>,
    pub data: AttestationData,
    pub signature: AggregateSignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct SigningData {
    pub object_root: H256,
    pub domain: Domain,
}

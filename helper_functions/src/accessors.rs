use anyhow::{ensure, Result};
use itertools::Itertools as _;
use types::{
    bit_list::BitList,
    phase0::{
        consts::{DOMAIN_BEACON_ATTESTER, GENESIS_EPOCH},
        containers::{Attestation, AttestationData, IndexedAttestation},
        primitives::{Domain, DomainType, Epoch, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{error::Error, misc};

#[must_use]
pub fn get_current_epoch<P: Preset>(state: &impl BeaconState<P>) -> Epoch {
    misc::compute_epoch_at_slot::<P>(state.slot())
}

#[must_use]
pub fn get_previous_epoch<P: Preset>(state: &impl BeaconState<P>) -> Epoch {
    get_current_epoch(state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_domain<P: Preset>(
    state: &impl BeaconState<P>,
    domain_type: DomainType,
    epoch: Epoch,
) -> Domain {
    let fork = state.fork();

    let fork_version = if epoch < fork.epoch {
        fork.previous_version
    } else {
        fork.current_version
    };

    misc::compute_domain(domain_type, fork_version, state.genesis_validators_root())
}

/// The message validators sign when attesting to `data`.
#[must_use]
pub fn attestation_signing_root<P: Preset>(
    state: &impl BeaconState<P>,
    data: &AttestationData,
) -> H256 {
    let domain = get_domain(state, DOMAIN_BEACON_ATTESTER, data.target.epoch);
    misc::compute_signing_root(data, domain)
}

pub fn get_attesting_indices<'all, P: Preset>(
    state: &'all impl BeaconState<P>,
    attestation_data: AttestationData,
    aggregation_bits: &'all BitList<P::MaxValidatorsPerCommittee>,
) -> Result<impl Iterator<Item = ValidatorIndex> + 'all> {
    let AttestationData { slot, index, .. } = attestation_data;

    let committee = state
        .beacon_committee(slot, index)
        .ok_or(Error::CommitteeIndexOutOfBounds { slot, index })?;

    ensure!(
        committee.len() == aggregation_bits.len(),
        Error::CommitteeLengthMismatch {
            aggregation_bitlist_length: aggregation_bits.len(),
            committee_length: committee.len(),
        },
    );

    let attesting_indices = aggregation_bits
        .iter()
        .by_vals()
        .zip(committee.iter().copied())
        .filter_map(|(present, validator_index)| present.then_some(validator_index));

    Ok(attesting_indices)
}

pub fn get_indexed_attestation<P: Preset>(
    state: &impl BeaconState<P>,
    attestation: &Attestation<P>,
) -> Result<IndexedAttestation> {
    let attesting_indices =
        get_attesting_indices(state, attestation.data, &attestation.aggregation_bits)?
            .sorted_unstable()
            .dedup()
            .collect();

    Ok(IndexedAttestation {
        attesting_indices,
        data: attestation.data,
        signature: attestation.signature,
    })
}

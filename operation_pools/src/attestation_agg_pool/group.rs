use std::sync::Arc;

use bls::Signature;
use log::debug;
use types::{
    bit_list::BitList,
    phase0::{
        containers::{Attestation, AttestationData},
        primitives::H256,
    },
    preset::Preset,
};

use crate::attestation_agg_pool::types::ValidateableAttestation;

/// Attestations with the same [`AttestationData`].
///
/// Attestations are kept ordered by the number of attesters, largest first.
/// Attestations that are already covered by another one in the group are not added.
pub struct MatchingDataAttestationGroup<P: Preset> {
    data: AttestationData,
    data_root: H256,
    committee_shuffling_seed: H256,
    attestations: Vec<Arc<ValidateableAttestation<P>>>,
}

impl<P: Preset> MatchingDataAttestationGroup<P> {
    #[must_use]
    pub const fn new(
        data: AttestationData,
        data_root: H256,
        committee_shuffling_seed: H256,
    ) -> Self {
        Self {
            data,
            data_root,
            committee_shuffling_seed,
            attestations: vec![],
        }
    }

    #[must_use]
    pub const fn data(&self) -> AttestationData {
        self.data
    }

    #[must_use]
    pub const fn data_root(&self) -> H256 {
        self.data_root
    }

    #[must_use]
    pub const fn committee_shuffling_seed(&self) -> H256 {
        self.committee_shuffling_seed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attestations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ValidateableAttestation<P>>> {
        self.attestations.iter()
    }

    /// Adds `attestation` unless its attesters are a subset of those of an attestation already
    /// in the group.
    ///
    /// Returns `true` if the attestation was added.
    pub fn add(&mut self, attestation: Arc<ValidateableAttestation<P>>) -> bool {
        let bits = attestation.aggregation_bits();

        if let Some(first) = self.attestations.first() {
            // All attestations in a group come from the same committee.
            if first.aggregation_bits().len() != bits.len() {
                debug!(
                    "attestation has {} aggregation bits but others with the same data have {} \
                     (data: {:?})",
                    bits.len(),
                    first.aggregation_bits().len(),
                    self.data,
                );

                return false;
            }
        }

        if self
            .attestations
            .iter()
            .any(|existing| bits.is_subset_of(existing.aggregation_bits()))
        {
            return false;
        }

        let count = bits.count_ones();

        let position = self
            .attestations
            .partition_point(|existing| existing.aggregation_bits().count_ones() >= count);

        self.attestations.insert(position, attestation);

        true
    }

    /// Removes attestations equal to `attestation`.
    ///
    /// Returns the number of attestations removed.
    pub fn remove(&mut self, attestation: &Attestation<P>) -> usize {
        let length_before = self.attestations.len();

        self.attestations
            .retain(|existing| existing.attestation() != attestation);

        length_before - self.attestations.len()
    }

    /// Iterates over aggregates built from the attestations in the group.
    ///
    /// Each aggregate combines as many attestations with disjoint attesters as possible,
    /// starting from the largest one that adds attesters not covered by earlier aggregates.
    /// Iteration ends when every attester in the group is covered.
    pub fn aggregates(&self) -> impl Iterator<Item = Attestation<P>> + '_ {
        let mut covered = self
            .attestations
            .first()
            .and_then(|first| BitList::with_length(first.aggregation_bits().len()).ok());

        core::iter::from_fn(move || {
            let covered = covered.as_mut()?;

            let mut candidates = self
                .attestations
                .iter()
                .filter(|attestation| !attestation.aggregation_bits().is_subset_of(covered));

            let first = candidates.next()?;
            let mut members = vec![first];
            let mut bits = first.aggregation_bits().clone();

            for candidate in candidates {
                if !candidate.aggregation_bits().any_in_common(&bits) {
                    bits |= candidate.aggregation_bits();
                    members.push(candidate);
                }
            }

            let aggregate = match aggregate_signatures(&members) {
                Some(signature) => Attestation {
                    aggregation_bits: bits,
                    data: self.data,
                    signature: signature.to_bytes(),
                },
                None => first.attestation().clone(),
            };

            *covered |= &aggregate.aggregation_bits;

            Some(aggregate)
        })
    }
}

// Returns `None` if there is nothing to aggregate or a signature cannot be decompressed.
fn aggregate_signatures<P: Preset>(
    members: &[&Arc<ValidateableAttestation<P>>],
) -> Option<Signature> {
    let (first, rest) = members.split_first()?;

    if rest.is_empty() {
        return None;
    }

    let mut signature = Signature::try_from(first.attestation().signature).ok()?;

    for member in rest {
        signature.aggregate_in_place(Signature::try_from(member.attestation().signature).ok()?);
    }

    Some(signature)
}

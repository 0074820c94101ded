use core::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use hashing::SszHash as _;
use once_cell::sync::OnceCell;
use types::{
    bit_list::BitList,
    phase0::{
        containers::{Attestation, AttestationData, IndexedAttestation},
        primitives::H256,
    },
    preset::Preset,
};

/// An attestation along with facts learned about it while it is being processed.
///
/// The indexed attestation and shuffling seed are filled in once by whoever validates the
/// attestation and never change afterwards.
#[derive(Debug)]
pub struct ValidateableAttestation<P: Preset> {
    attestation: Attestation<P>,
    data_root: H256,
    is_aggregate: bool,
    produced_locally: bool,
    gossiped: AtomicBool,
    // `once_cell::sync::OnceCell` provides `get_or_try_init`, which `std::sync::OnceLock` does not
    // have on stable Rust yet.
    indexed_attestation: OnceCell<IndexedAttestation>,
    committee_shuffling_seed: OnceCell<H256>,
}

impl<P: Preset> ValidateableAttestation<P> {
    #[must_use]
    pub fn from_network(attestation: Attestation<P>) -> Self {
        Self::new(attestation, false, false)
    }

    #[must_use]
    pub fn aggregate_from_network(attestation: Attestation<P>) -> Self {
        Self::new(attestation, true, false)
    }

    #[must_use]
    pub fn from_validator(attestation: Attestation<P>) -> Self {
        Self::new(attestation, false, true)
    }

    fn new(attestation: Attestation<P>, is_aggregate: bool, produced_locally: bool) -> Self {
        let data_root = attestation.data.hash_tree_root();

        Self {
            attestation,
            data_root,
            is_aggregate,
            produced_locally,
            gossiped: AtomicBool::new(false),
            indexed_attestation: OnceCell::new(),
            committee_shuffling_seed: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn attestation(&self) -> &Attestation<P> {
        &self.attestation
    }

    #[must_use]
    pub const fn data(&self) -> AttestationData {
        self.attestation.data
    }

    #[must_use]
    pub const fn data_root(&self) -> H256 {
        self.data_root
    }

    #[must_use]
    pub const fn aggregation_bits(&self) -> &BitList<P::MaxValidatorsPerCommittee> {
        &self.attestation.aggregation_bits
    }

    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.is_aggregate
    }

    #[must_use]
    pub const fn produced_locally(&self) -> bool {
        self.produced_locally
    }

    #[must_use]
    pub fn is_gossiped(&self) -> bool {
        self.gossiped.load(Ordering::SeqCst)
    }

    /// Marks the attestation as gossiped.
    ///
    /// Returns `true` if it had not been gossiped before.
    pub fn mark_gossiped(&self) -> bool {
        !self.gossiped.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn indexed_attestation(&self) -> Option<&IndexedAttestation> {
        self.indexed_attestation.get()
    }

    pub fn indexed_attestation_or_try_init(
        &self,
        init: impl FnOnce() -> Result<IndexedAttestation>,
    ) -> Result<&IndexedAttestation> {
        self.indexed_attestation.get_or_try_init(init)
    }

    #[must_use]
    pub fn committee_shuffling_seed(&self) -> Option<H256> {
        self.committee_shuffling_seed.get().copied()
    }

    /// Records the shuffling seed of the committee the attestation is from.
    ///
    /// Has no effect if a seed has already been recorded.
    pub fn set_committee_shuffling_seed(&self, seed: H256) {
        // The seed is derived from the target checkpoint, so any later value would be the same.
        let _ = self.committee_shuffling_seed.set(seed);
    }
}

#[cfg(test)]
mod tests {
    use types::preset::Minimal;

    use super::*;

    #[test]
    fn mark_gossiped_reports_first_call_only() {
        let attestation = ValidateableAttestation::<Minimal>::from_network(Attestation::default());

        assert!(!attestation.is_gossiped());
        assert!(attestation.mark_gossiped());
        assert!(!attestation.mark_gossiped());
        assert!(attestation.is_gossiped());
    }

    #[test]
    fn shuffling_seed_is_set_once() {
        let attestation = ValidateableAttestation::<Minimal>::from_network(Attestation::default());

        assert_eq!(attestation.committee_shuffling_seed(), None);

        attestation.set_committee_shuffling_seed(H256::repeat_byte(1));
        attestation.set_committee_shuffling_seed(H256::repeat_byte(2));

        assert_eq!(
            attestation.committee_shuffling_seed(),
            Some(H256::repeat_byte(1)),
        );
    }

    #[test]
    fn indexed_attestation_is_computed_once() -> Result<()> {
        let attestation = ValidateableAttestation::<Minimal>::from_network(Attestation::default());

        attestation.indexed_attestation_or_try_init(|| {
            Ok(IndexedAttestation {
                attesting_indices: vec![1],
                ..IndexedAttestation::default()
            })
        })?;

        let indexed = attestation
            .indexed_attestation_or_try_init(|| anyhow::bail!("already initialized"))?;

        assert_eq!(indexed.attesting_indices, [1]);

        Ok(())
    }

    #[test]
    fn origin_flags() {
        let data = AttestationData {
            slot: 3,
            ..AttestationData::default()
        };

        let attestation = Attestation::<Minimal> {
            data,
            ..Attestation::default()
        };

        let local = ValidateableAttestation::from_validator(attestation.clone());
        let aggregate = ValidateableAttestation::aggregate_from_network(attestation);

        assert!(local.produced_locally());
        assert!(!local.is_aggregate());
        assert!(aggregate.is_aggregate());
        assert!(!aggregate.produced_locally());
        assert_eq!(local.data_root(), data.hash_tree_root());
        assert_eq!(local.data_root(), aggregate.data_root());
    }
}

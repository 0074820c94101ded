//! Deterministic beacon states and signed attestations for tests.
//!
//! Committees do not change between epochs. The committee for `(slot, index)` consists of every
//! validator whose index is congruent to `slot_in_epoch * committees_per_slot + index` modulo the
//! total number of committees in an epoch.

use core::marker::PhantomData;

use anyhow::{ensure, Result};
use bls::{PublicKeyBytes, SecretKey, Signature};
use hashing::SszHash as _;
use helper_functions::accessors;
use itertools::Itertools as _;
use typenum::Unsigned as _;
use types::{
    bit_list::BitList,
    phase0::{
        containers::{Attestation, AttestationData, Checkpoint, Fork},
        primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::{BeaconState, PostState},
};

pub struct TestState<P: Preset> {
    slot: Slot,
    fork: Fork,
    genesis_validators_root: H256,
    current_justified_checkpoint: Checkpoint,
    previous_justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    committees_per_slot: u64,
    committees: Vec<Vec<ValidatorIndex>>,
    secret_keys: Vec<SecretKey>,
    public_keys: Vec<PublicKeyBytes>,
    shuffling_salt: u64,
    phantom: PhantomData<P>,
}

impl<P: Preset> TestState<P> {
    pub fn new(validator_count: u64) -> Result<Self> {
        let secret_keys = (0..validator_count)
            .map(secret_key)
            .collect::<Result<Vec<_>>>()?;

        let public_keys = secret_keys
            .iter()
            .map(|secret_key| secret_key.to_public_key().to_bytes())
            .collect();

        let mut state = Self {
            slot: 0,
            fork: Fork::default(),
            genesis_validators_root: H256::repeat_byte(0x42),
            current_justified_checkpoint: Checkpoint::default(),
            previous_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            committees_per_slot: 1,
            committees: vec![],
            secret_keys,
            public_keys,
            shuffling_salt: 0,
            phantom: PhantomData,
        };

        state.assign_committees();

        Ok(state)
    }

    #[must_use]
    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = slot;
        self
    }

    #[must_use]
    pub fn with_justified_checkpoints(
        mut self,
        current: Checkpoint,
        previous: Checkpoint,
    ) -> Self {
        self.current_justified_checkpoint = current;
        self.previous_justified_checkpoint = previous;
        self
    }

    #[must_use]
    pub fn with_finalized_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.finalized_checkpoint = checkpoint;
        self
    }

    /// Changes the shuffling seed of every epoch, simulating a state from a different fork.
    #[must_use]
    pub fn with_shuffling_salt(mut self, salt: u64) -> Self {
        self.shuffling_salt = salt;
        self
    }

    #[must_use]
    pub fn with_committees_per_slot(mut self, committees_per_slot: u64) -> Self {
        self.committees_per_slot = committees_per_slot.max(1);
        self.assign_committees();
        self
    }

    pub fn set_slot(&mut self, slot: Slot) {
        self.slot = slot;
    }

    pub fn committee(&self, slot: Slot, index: CommitteeIndex) -> Result<&[ValidatorIndex]> {
        self.beacon_committee(slot, index)
            .ok_or_else(|| anyhow::anyhow!("no committee at slot {slot} with index {index}"))
    }

    /// Builds an attestation signed by the committee members at `positions`.
    pub fn attestation(
        &self,
        data: AttestationData,
        positions: &[usize],
    ) -> Result<Attestation<P>> {
        ensure!(!positions.is_empty(), "attestation must have at least one signer");

        let committee = self.committee(data.slot, data.index)?;
        let mut aggregation_bits = BitList::with_length(committee.len())?;
        let signing_root = accessors::attestation_signing_root(self, &data);
        let mut signature: Option<Signature> = None;

        for position in positions.iter().copied().unique() {
            aggregation_bits.set(position, true)?;

            let validator_index = usize::try_from(committee[position])?;
            let member_signature = self.secret_keys[validator_index].sign(signing_root);

            match signature.as_mut() {
                Some(aggregate) => aggregate.aggregate_in_place(member_signature),
                None => signature = Some(member_signature),
            }
        }

        let signature = signature
            .map(Signature::to_bytes)
            .ok_or_else(|| anyhow::anyhow!("attestation has no signers"))?;

        Ok(Attestation {
            aggregation_bits,
            data,
            signature,
        })
    }

    /// Builds an attestation signed by the whole committee.
    pub fn full_attestation(&self, data: AttestationData) -> Result<Attestation<P>> {
        let committee_length = self.committee(data.slot, data.index)?.len();
        self.attestation(data, &(0..committee_length).collect_vec())
    }

    fn assign_committees(&mut self) {
        let committee_count = P::SlotsPerEpoch::U64 * self.committees_per_slot;
        let validator_count = self.public_keys.len() as u64;

        self.committees = (0..committee_count)
            .map(|position| {
                (0..validator_count)
                    .filter(|validator_index| validator_index % committee_count == position)
                    .collect()
            })
            .collect();
    }
}

impl<P: Preset> PostState for TestState<P> {
    fn current_justified_checkpoint(&self) -> Checkpoint {
        self.current_justified_checkpoint
    }

    fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }
}

impl<P: Preset> BeaconState<P> for TestState<P> {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn fork(&self) -> Fork {
        self.fork
    }

    fn genesis_validators_root(&self) -> H256 {
        self.genesis_validators_root
    }

    fn previous_justified_checkpoint(&self) -> Checkpoint {
        self.previous_justified_checkpoint
    }

    fn committee_count_at_slot(&self, _slot: Slot) -> u64 {
        self.committees_per_slot
    }

    fn beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Option<&[ValidatorIndex]> {
        if index >= self.committees_per_slot {
            return None;
        }

        let position = (slot % P::SlotsPerEpoch::U64) * self.committees_per_slot + index;

        self.committees
            .get(usize::try_from(position).ok()?)
            .map(Vec::as_slice)
    }

    fn public_key(&self, validator_index: ValidatorIndex) -> Option<&PublicKeyBytes> {
        self.public_keys.get(usize::try_from(validator_index).ok()?)
    }

    fn shuffling_seed(&self, epoch: Epoch) -> H256 {
        hashing::hash_256_256(epoch.hash_tree_root(), self.shuffling_salt.hash_tree_root())
    }
}

/// A post-state that carries nothing but checkpoints.
#[derive(Clone, Copy, Default, Debug)]
pub struct Checkpoints {
    pub justified: Checkpoint,
    pub finalized: Checkpoint,
}

impl PostState for Checkpoints {
    fn current_justified_checkpoint(&self) -> Checkpoint {
        self.justified
    }

    fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized
    }
}

fn secret_key(validator_index: ValidatorIndex) -> Result<SecretKey> {
    let ikm = hashing::hash_256_256(validator_index.hash_tree_root(), H256::zero());
    SecretKey::key_gen(ikm.as_bytes()).map_err(Into::into)
}

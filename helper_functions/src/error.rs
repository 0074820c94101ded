use parse_display::Display;
use thiserror::Error;
use types::phase0::primitives::{CommitteeIndex, Slot, ValidatorIndex};

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("attestation has no attesting indices")]
    AttestationHasNoAttestingIndices,
    #[error("attesting indices are not sorted and unique")]
    AttestingIndicesNotSortedAndUnique,
    #[error("committee {index} at slot {slot} does not exist")]
    CommitteeIndexOutOfBounds { slot: Slot, index: CommitteeIndex },
    #[error(
        "aggregation bitlist length {aggregation_bitlist_length} \
         does not match committee length {committee_length}"
    )]
    CommitteeLengthMismatch {
        aggregation_bitlist_length: usize,
        committee_length: usize,
    },
    #[error("no public key for validator {validator_index}")]
    PublicKeyNotFound { validator_index: ValidatorIndex },
    #[error("{0} is invalid")]
    SignatureInvalid(SignatureKind),
}

#[derive(Clone, Copy, Debug, Display)]
pub enum SignatureKind {
    #[display("aggregate attestation signature")]
    AggregateAttestation,
    #[display("attestation signature")]
    Attestation,
}

use anyhow::{ensure, Result};
use bls::PublicKey;
use itertools::Itertools as _;
use types::{phase0::containers::IndexedAttestation, preset::Preset, traits::BeaconState};

use crate::{
    accessors,
    error::{Error, SignatureKind},
    verifier::Verifier,
};

pub fn validate_constructed_indexed_attestation<P: Preset>(
    state: &impl BeaconState<P>,
    indexed_attestation: &IndexedAttestation,
    verifier: impl Verifier,
) -> Result<()> {
    validate_indexed_attestation(state, indexed_attestation, verifier, false)
}

pub fn validate_received_indexed_attestation<P: Preset>(
    state: &impl BeaconState<P>,
    indexed_attestation: &IndexedAttestation,
    verifier: impl Verifier,
) -> Result<()> {
    validate_indexed_attestation(state, indexed_attestation, verifier, true)
}

fn validate_indexed_attestation<P: Preset>(
    state: &impl BeaconState<P>,
    indexed_attestation: &IndexedAttestation,
    mut verifier: impl Verifier,
    validate_indices_sorted_and_unique: bool,
) -> Result<()> {
    let indices = &indexed_attestation.attesting_indices;

    ensure!(!indices.is_empty(), Error::AttestationHasNoAttestingIndices);

    if validate_indices_sorted_and_unique {
        // > Verify indices are sorted and unique
        ensure!(
            indices.iter().tuple_windows().all(|(a, b)| a < b),
            Error::AttestingIndicesNotSortedAndUnique,
        );
    }

    if verifier_is_null(&verifier) {
        return Ok(());
    }

    // > Verify aggregate signature
    let public_keys = indices
        .iter()
        .copied()
        .map(|validator_index| {
            let bytes = state
                .public_key(validator_index)
                .ok_or(Error::PublicKeyNotFound { validator_index })?;

            PublicKey::try_from(*bytes).map_err(anyhow::Error::new)
        })
        .collect::<Result<Vec<_>>>()?;

    verifier.verify_aggregate(
        accessors::attestation_signing_root(state, &indexed_attestation.data),
        indexed_attestation.signature,
        &public_keys,
        SignatureKind::Attestation,
    )
}

const fn verifier_is_null<V: Verifier>(_verifier: &V) -> bool {
    V::IS_NULL
}

use anyhow::{ensure, Result};
use bls::{PublicKey, Signature, SignatureBytes};
use types::phase0::primitives::H256;

use crate::error::{Error, SignatureKind};

pub trait Verifier {
    const IS_NULL: bool;

    fn verify_aggregate<'keys>(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
        signature_kind: SignatureKind,
    ) -> Result<()>;
}

impl<V: Verifier> Verifier for &mut V {
    const IS_NULL: bool = V::IS_NULL;

    #[inline]
    fn verify_aggregate<'keys>(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        (*self).verify_aggregate(message, signature_bytes, public_keys, signature_kind)
    }
}

/// Accepts every signature.
///
/// Used for objects that were already verified or were produced by the application itself.
pub struct NullVerifier;

impl Verifier for NullVerifier {
    const IS_NULL: bool = true;

    #[inline]
    fn verify_aggregate<'keys>(
        &mut self,
        _message: H256,
        _signature_bytes: SignatureBytes,
        _public_keys: impl IntoIterator<Item = &'keys PublicKey>,
        _signature_kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }
}

pub struct SingleVerifier;

impl Verifier for SingleVerifier {
    const IS_NULL: bool = false;

    #[inline]
    fn verify_aggregate<'keys>(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        let signature = Signature::try_from(signature_bytes)?;

        ensure!(
            signature.fast_aggregate_verify(message, public_keys),
            Error::SignatureInvalid(signature_kind),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bls::SecretKey;

    use super::*;

    fn secret_key(seed: u8) -> SecretKey {
        SecretKey::key_gen(&[seed; 32]).expect("32 bytes of keying material are enough")
    }

    #[test]
    fn single_verifier_checks_aggregate_signature() {
        let message = H256::repeat_byte(1);
        let secret_keys = [secret_key(1), secret_key(2)];
        let public_keys = secret_keys.each_ref().map(SecretKey::to_public_key);

        let signature = secret_keys[0]
            .sign(message)
            .aggregate(secret_keys[1].sign(message))
            .to_bytes();

        SingleVerifier
            .verify_aggregate(message, signature, &public_keys, SignatureKind::Attestation)
            .expect("signature should be valid");

        SingleVerifier
            .verify_aggregate(
                H256::repeat_byte(2),
                signature,
                &public_keys,
                SignatureKind::Attestation,
            )
            .expect_err("signature should not be valid for another message");
    }

    #[test]
    fn null_verifier_accepts_garbage() {
        NullVerifier
            .verify_aggregate(
                H256::zero(),
                SignatureBytes::zero(),
                [],
                SignatureKind::Attestation,
            )
            .expect("NullVerifier accepts everything");
    }
}

use blst::min_pk::SecretKey as RawSecretKey;

use crate::{
    consts::DOMAIN_SEPARATION_TAG, error::Error, public_key::PublicKey, signature::Signature,
};

pub const SIZE: usize = 32;

// `RawSecretKey` zeroizes itself on drop.
// This deliberately does not implement `Debug` or `PartialEq`.
#[derive(Clone)]
pub struct SecretKey(RawSecretKey);

impl TryFrom<[u8; SIZE]> for SecretKey {
    type Error = Error;

    #[inline]
    fn try_from(bytes: [u8; SIZE]) -> Result<Self, Self::Error> {
        RawSecretKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }
}

impl SecretKey {
    /// Derives a key from input keying material as described in EIP-2333.
    ///
    /// `ikm` must be at least 32 bytes long.
    pub fn key_gen(ikm: &[u8]) -> Result<Self, Error> {
        RawSecretKey::key_gen(ikm, &[])
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }

    #[inline]
    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        self.0.sk_to_pk().into()
    }

    #[inline]
    #[must_use]
    pub fn sign(&self, message: impl AsRef<[u8]>) -> Signature {
        self.0
            .sign(message.as_ref(), DOMAIN_SEPARATION_TAG, &[])
            .into()
    }
}

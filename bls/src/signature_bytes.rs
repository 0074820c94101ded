use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;

use crate::signature::Signature;

pub const COMPRESSED_SIZE: usize = 96;

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct SignatureBytes(COMPRESSED_SIZE);
}

impl hex::FromHex for SignatureBytes {
    type Error = <[u8; COMPRESSED_SIZE] as hex::FromHex>::Error;

    fn from_hex<T: AsRef<[u8]>>(digits: T) -> Result<Self, Self::Error> {
        hex::FromHex::from_hex(digits).map(Self)
    }
}

impl From<Signature> for SignatureBytes {
    #[inline]
    fn from(signature: Signature) -> Self {
        Self(signature.as_raw().compress())
    }
}

impl SignatureBytes {
    /// The compressed point at infinity.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.as_mut()[0] = 0xc0;
        bytes
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::empty()
    }
}

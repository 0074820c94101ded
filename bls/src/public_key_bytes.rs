use derive_more::AsRef;
use fixed_hash::construct_fixed_hash;

use crate::public_key::PublicKey;

pub const COMPRESSED_SIZE: usize = 48;

construct_fixed_hash! {
    #[derive(AsRef)]
    pub struct PublicKeyBytes(COMPRESSED_SIZE);
}

impl hex::FromHex for PublicKeyBytes {
    type Error = <[u8; COMPRESSED_SIZE] as hex::FromHex>::Error;

    fn from_hex<T: AsRef<[u8]>>(digits: T) -> Result<Self, Self::Error> {
        hex::FromHex::from_hex(digits).map(Self)
    }
}

impl From<PublicKey> for PublicKeyBytes {
    #[inline]
    fn from(public_key: PublicKey) -> Self {
        Self(public_key.as_raw().compress())
    }
}

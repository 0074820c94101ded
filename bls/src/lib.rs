//! BLS12-381 signatures as used by the beacon chain (public keys in G1, signatures in G2).
//!
//! Only the operations needed to verify and aggregate attestations are exposed.

pub use crate::{
    consts::DOMAIN_SEPARATION_TAG,
    error::Error,
    public_key::PublicKey,
    public_key_bytes::{PublicKeyBytes, COMPRESSED_SIZE as PUBLIC_KEY_COMPRESSED_SIZE},
    secret_key::SecretKey,
    signature::Signature,
    signature_bytes::{SignatureBytes, COMPRESSED_SIZE as SIGNATURE_COMPRESSED_SIZE},
};

pub type AggregatePublicKey = PublicKey;
pub type AggregateSignature = Signature;
pub type AggregateSignatureBytes = SignatureBytes;

mod consts;
mod error;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod signature;
mod signature_bytes;

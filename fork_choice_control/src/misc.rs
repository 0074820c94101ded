use strum::AsRefStr;
use types::phase0::primitives::H256;

/// How an attestation was classified by an [`AttestationProcessor`].
///
/// [`AttestationProcessor`]: crate::AttestationProcessor
#[derive(Debug, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingResult {
    /// The attestation was applied to fork choice.
    Successful,
    /// The attestation depends on a block that has not been imported yet.
    UnknownBlock(H256),
    /// The attestation is valid but may only be applied to fork choice in a later slot.
    SavedForFuture,
    Invalid(anyhow::Error),
}

impl ProcessingResult {
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::Successful)
    }
}

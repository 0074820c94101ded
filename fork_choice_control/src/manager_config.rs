use derivative::Derivative;

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct ManagerConfig {
    /// Maximum number of attestations waiting for blocks.
    #[derivative(Default(value = "10_000"))]
    pub max_pending_attestations: usize,
    /// Number of slots an attestation may wait for a block before it is dropped.
    #[derivative(Default(value = "32"))]
    pub pending_retention_slots: u64,
    /// Attestations for slots further ahead of the current slot are rejected.
    #[derivative(Default(value = "2"))]
    pub max_future_slots: u64,
}

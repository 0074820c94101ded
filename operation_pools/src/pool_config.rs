use derivative::Derivative;

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct PoolConfig {
    /// Number of epochs attestations are kept for after their slot.
    #[derivative(Default(value = "2"))]
    pub attestation_retention_epochs: u64,
}

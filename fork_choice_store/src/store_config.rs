use derivative::Derivative;

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct StoreConfig {
    /// Number of nodes that must precede the finalized block before the proto-array is pruned.
    #[derivative(Default(value = "256"))]
    pub prune_threshold: usize,
}

impl StoreConfig {
    /// Prunes on every finalization. Useful in tests.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            prune_threshold: 0,
        }
    }
}

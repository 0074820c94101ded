pub use crate::{
    attestation_agg_pool::{
        AttestationAggPool, AttestationDataValidator, AttestationForkChecker,
        BlockAttestationDataValidator, InvalidReason, MatchingDataAttestationGroup,
        ShufflingForkChecker, ValidateableAttestation,
    },
    error::Error,
    pool_config::PoolConfig,
};

mod attestation_agg_pool {
    pub use group::MatchingDataAttestationGroup;
    pub use pool::AttestationAggPool;
    pub use self::types::ValidateableAttestation;
    pub use validation::{
        AttestationDataValidator, AttestationForkChecker, BlockAttestationDataValidator,
        InvalidReason, ShufflingForkChecker,
    };

    mod group;
    mod pool;
    mod types;
    mod validation;
}

mod error;
mod pool_config;

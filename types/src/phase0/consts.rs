use hex_literal::hex;

use crate::phase0::primitives::{DomainType, Epoch, Slot, H32};

pub const DOMAIN_BEACON_ATTESTER: DomainType = H32(hex!("01000000"));
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;

pub use ethereum_types::{H256, H32};

pub type CommitteeIndex = u64;
pub type Domain = H256;
pub type DomainType = H32;
pub type Epoch = u64;
pub type Gwei = u64;
pub type Slot = u64;
pub type ValidatorIndex = u64;
pub type Version = H32;

use thiserror::Error;
use types::phase0::primitives::H256;

#[derive(Debug, Error)]
pub enum Error {
    #[error("attestation has no committee shuffling seed (data root: {data_root:?})")]
    MissingShufflingSeed { data_root: H256 },
}

//! Thread-safe wrapper around [`proto_array`] implementing LMD GHOST fork choice.
//!
//! The [`Store`] keeps blocks, votes and justified balances behind separate locks so that
//! attestations can be processed while blocks are being imported. Head computation takes all
//! three locks, always in the order blocks, votes, balances.
//!
//! Blocks and attestations are expected to be validated before they reach the [`Store`].
//! A vote whose block is unknown at the time of the next head update is not counted.

pub use crate::{
    misc::{BalancesProvider, BalancesSnapshot},
    store::Store,
    store_config::StoreConfig,
};

mod misc;
mod store;
mod store_config;

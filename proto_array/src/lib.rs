//! An implementation of the [proto-array] optimization of LMD GHOST.
//!
//! Blocks are stored in a single append-only array in insertion order.
//! Parents always precede their children, so weights can be propagated to ancestors in one
//! reverse pass without a pointer-based tree.
//!
//! [proto-array]: https://github.com/protolambda/lmd-ghost

pub use crate::{
    error::Error,
    proto_array::{NodeIndex, ProtoArray, ProtoNode},
    votes::{commit_votes, compute_deltas, Difference, ElasticList, VoteTracker},
};

mod error;
mod proto_array;
mod votes;

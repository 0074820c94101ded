use thiserror::Error;
use types::phase0::primitives::{Epoch, H256};

use crate::proto_array::NodeIndex;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("block {root:?} has already been added")]
    BlockAlreadyKnown { root: H256 },
    #[error("number of deltas ({deltas}) does not match number of nodes ({nodes})")]
    InvalidDeltaLength { deltas: usize, nodes: usize },
    #[error("node index {index} is out of bounds")]
    InvalidNodeIndex { index: NodeIndex },
    #[error("delta index {index} is out of bounds")]
    InvalidNodeDelta { index: NodeIndex },
    #[error("parent delta index {index} is out of bounds")]
    InvalidParentDelta { index: NodeIndex },
    #[error("best child index {index} is out of bounds")]
    InvalidBestChild { index: NodeIndex },
    #[error("best descendant index {index} is out of bounds")]
    InvalidBestDescendant { index: NodeIndex },
    #[error("weight or delta of node {index} overflowed")]
    DeltaOverflow { index: NodeIndex },
    #[error("index {index} points into the pruned part of the array")]
    IndexUnderflow { index: NodeIndex },
    #[error("justified root {root:?} is not known")]
    UnknownJustifiedRoot { root: H256 },
    #[error("finalized root {root:?} is not known")]
    FinalizedNodeUnknown { root: H256 },
    #[error(
        "best node {root:?} is not viable for head \
         (node justified epoch: {node_justified_epoch}, \
         node finalized epoch: {node_finalized_epoch}, \
         store justified epoch: {justified_epoch}, \
         store finalized epoch: {finalized_epoch})"
    )]
    InvalidBestNode {
        root: H256,
        node_justified_epoch: Epoch,
        node_finalized_epoch: Epoch,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    },
}

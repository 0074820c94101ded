use hashing::{merkleize, uint64_chunk, SszHash};

use crate::phase0::{
    containers::{AttestationData, BeaconBlock, Checkpoint, ForkData, SigningData},
    primitives::{Version, H256},
};

impl SszHash for AttestationData {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[
            uint64_chunk(self.slot),
            uint64_chunk(self.index),
            self.beacon_block_root,
            self.source.hash_tree_root(),
            self.target.hash_tree_root(),
        ])
    }
}

impl SszHash for BeaconBlock {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[
            uint64_chunk(self.slot),
            uint64_chunk(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

impl SszHash for Checkpoint {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[uint64_chunk(self.epoch), self.root])
    }
}

impl SszHash for ForkData {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[version_chunk(self.current_version), self.genesis_validators_root])
    }
}

impl SszHash for SigningData {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[self.object_root, self.domain])
    }
}

fn version_chunk(version: Version) -> H256 {
    let mut chunk = H256::zero();
    chunk[..Version::len_bytes()].copy_from_slice(version.as_bytes());
    chunk
}

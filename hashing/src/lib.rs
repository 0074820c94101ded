//! SHA-256 based Merkleization for the fixed-size containers used in fork choice.
//!
//! Only containers made entirely of 32-byte chunks or `uint64` fields are supported.
//! Lists and bitfields are never hashed here.

use ethereum_types::H256;
use sha2::{Digest as _, Sha256};

pub trait SszHash {
    fn hash_tree_root(&self) -> H256;
}

impl SszHash for H256 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl SszHash for u64 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        uint64_chunk(*self)
    }
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    H256(hasher.finalize().into())
}

/// Packs a `uint64` into a chunk the way SSZ does for basic values.
#[inline]
#[must_use]
pub fn uint64_chunk(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Computes the root of a tree whose leaves are `chunks` padded with zero chunks
/// to the next power of 2.
#[must_use]
pub fn merkleize(chunks: &[H256]) -> H256 {
    match chunks {
        [] => H256::zero(),
        [chunk] => *chunk,
        _ => {
            let mut layer = chunks.to_vec();
            let mut zero_hash = H256::zero();

            while layer.len() > 1 {
                if layer.len() % 2 == 1 {
                    layer.push(zero_hash);
                }

                layer = layer
                    .chunks_exact(2)
                    .map(|pair| hash_256_256(pair[0], pair[1]))
                    .collect();

                zero_hash = hash_256_256(zero_hash, zero_hash);
            }

            layer[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use test_case::test_case;

    use super::*;

    const ZERO_HASH_1: H256 = H256(hex!(
        "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
    ));

    const ZERO_HASH_2: H256 = H256(hex!(
        "db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71"
    ));

    #[test_case(&[H256::zero(); 2] => ZERO_HASH_1)]
    #[test_case(&[H256::zero(); 3] => ZERO_HASH_2)]
    #[test_case(&[H256::zero(); 4] => ZERO_HASH_2)]
    fn merkleize_pads_with_zero_subtrees(chunks: &[H256]) -> H256 {
        merkleize(chunks)
    }

    #[test]
    fn merkleize_of_single_chunk_is_the_chunk() {
        assert_eq!(merkleize(&[H256::repeat_byte(7)]), H256::repeat_byte(7));
    }

    #[test]
    fn odd_layers_are_padded_with_zero_hash_of_matching_height() {
        let leaves = [1, 2, 3, 4, 5].map(uint64_chunk);

        let left = hash_256_256(
            hash_256_256(leaves[0], leaves[1]),
            hash_256_256(leaves[2], leaves[3]),
        );
        let right = hash_256_256(hash_256_256(leaves[4], H256::zero()), ZERO_HASH_1);

        assert_eq!(merkleize(&leaves), hash_256_256(left, right));
        assert_eq!(ZERO_HASH_2, hash_256_256(ZERO_HASH_1, ZERO_HASH_1));
    }

    #[test]
    fn uint64_chunk_is_little_endian() {
        let chunk = uint64_chunk(0x0102);

        assert_eq!(chunk[0], 0x02);
        assert_eq!(chunk[1], 0x01);
        assert!(chunk[2..].iter().all(|byte| *byte == 0));
    }
}

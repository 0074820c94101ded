use std::collections::HashMap;

use derive_more::{Deref, From};
use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelRefIterator as _, IntoParallelRefMutIterator as _,
    ParallelIterator as _,
};
use types::phase0::primitives::{Epoch, Gwei, ValidatorIndex, H256};

use crate::{error::Error, proto_array::NodeIndex};

pub type Difference = i64;

/// The latest message of a single validator.
///
/// `current_root` is the root the validator's balance is currently counted toward.
/// `next_root` is the root it will be moved to by [`commit_votes`] once the deltas returned by
/// [`compute_deltas`] have been applied.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct VoteTracker {
    pub current_root: H256,
    pub next_root: H256,
    pub next_epoch: Epoch,
}

impl VoteTracker {
    /// Records a vote for `block_root` in `target_epoch` if it is newer than the last one.
    ///
    /// Returns `true` if the tracker was updated.
    pub fn update(&mut self, block_root: H256, target_epoch: Epoch) -> bool {
        if target_epoch > self.next_epoch || *self == Self::default() {
            self.next_root = block_root;
            self.next_epoch = target_epoch;
            return true;
        }

        false
    }
}

/// A `Vec` that grows with default values when accessed past its end.
#[derive(Clone, Default, Debug, Deref, From)]
pub struct ElasticList<T>(Vec<T>);

impl<T: Default> ElasticList<T> {
    pub fn get_mut(&mut self, validator_index: ValidatorIndex) -> Option<&mut T> {
        let index = usize::try_from(validator_index).ok()?;

        if index >= self.0.len() {
            self.0.resize_with(index + 1, T::default);
        }

        self.0.get_mut(index)
    }

    #[must_use]
    pub fn get(&self, validator_index: ValidatorIndex) -> Option<&T> {
        self.0.get(usize::try_from(validator_index).ok()?)
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0
    }
}

/// Converts changes in votes and balances into per-node weight changes.
///
/// The returned vector has one entry per node in `indices`. Votes are not modified.
/// Call [`commit_votes`] after the deltas have been applied. Votes for roots that are not in
/// `indices` (either pruned or never seen) contribute nothing. Validators missing from a balance
/// list are treated as having a balance of 0.
pub fn compute_deltas(
    indices: &HashMap<H256, NodeIndex>,
    votes: &[VoteTracker],
    old_balances: &[Gwei],
    new_balances: &[Gwei],
) -> Result<Vec<Difference>, Error> {
    let node_count = indices.len();
    let empty_deltas = || -> Vec<Difference> { vec![0; node_count] };

    votes
        .par_iter()
        .enumerate()
        .try_fold(
            empty_deltas,
            |mut deltas, (validator_index, vote)| -> Result<_, Error> {
                // A validator that has never voted has no effect.
                if vote.current_root.is_zero() && vote.next_root.is_zero() {
                    return Ok(deltas);
                }

                let old_balance = old_balances.get(validator_index).copied().unwrap_or_default();
                let new_balance = new_balances.get(validator_index).copied().unwrap_or_default();

                if vote.current_root == vote.next_root && old_balance == new_balance {
                    return Ok(deltas);
                }

                if let Some(&index) = indices.get(&vote.current_root) {
                    let delta = deltas
                        .get_mut(index)
                        .ok_or(Error::InvalidNodeDelta { index })?;

                    *delta = Difference::try_from(old_balance)
                        .ok()
                        .and_then(|balance| delta.checked_sub(balance))
                        .ok_or(Error::DeltaOverflow { index })?;
                }

                if let Some(&index) = indices.get(&vote.next_root) {
                    let delta = deltas
                        .get_mut(index)
                        .ok_or(Error::InvalidNodeDelta { index })?;

                    *delta = Difference::try_from(new_balance)
                        .ok()
                        .and_then(|balance| delta.checked_add(balance))
                        .ok_or(Error::DeltaOverflow { index })?;
                }

                Ok(deltas)
            },
        )
        .try_reduce(
            empty_deltas,
            |mut left, right| -> Result<_, Error> {
                for (index, (left, right)) in left.iter_mut().zip(right).enumerate() {
                    *left = left
                        .checked_add(right)
                        .ok_or(Error::DeltaOverflow { index })?;
                }

                Ok(left)
            },
        )
}

/// Marks the votes of all validators as counted toward their `next_root`.
pub fn commit_votes(votes: &mut [VoteTracker]) {
    votes.par_iter_mut().for_each(|vote| vote.current_root = vote.next_root);
}

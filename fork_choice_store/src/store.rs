use std::sync::Arc;

use anyhow::Result;
use hashing::SszHash as _;
use log::debug;
use parking_lot::RwLock;
use prometheus_metrics::Metrics;
use proto_array::{commit_votes, compute_deltas, ElasticList, ProtoArray, VoteTracker};
use types::{
    phase0::{
        containers::{BeaconBlock, Checkpoint, IndexedAttestation},
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    traits::PostState,
};

use crate::{
    misc::{Balances, BalancesProvider, BalancesSnapshot},
    store_config::StoreConfig,
};

pub struct Store {
    // Lock order: `proto_array`, `votes`, `balances`.
    proto_array: RwLock<ProtoArray>,
    votes: RwLock<ElasticList<VoteTracker>>,
    balances: RwLock<Balances>,
    metrics: Option<Arc<Metrics>>,
}

impl Store {
    /// Creates an empty store.
    ///
    /// The anchor block (genesis or a checkpoint sync block) has to be added with
    /// [`Self::on_block`] before a head can be found.
    #[must_use]
    pub fn new(
        config: StoreConfig,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let proto_array = ProtoArray::new(
            justified_checkpoint.epoch,
            finalized_checkpoint.epoch,
            config.prune_threshold,
        );

        let snapshot = BalancesSnapshot {
            justified_checkpoint,
            finalized_checkpoint,
            ..BalancesSnapshot::default()
        };

        Self {
            proto_array: RwLock::new(proto_array),
            votes: RwLock::default(),
            balances: RwLock::new(Balances {
                snapshot: Arc::new(snapshot),
                applied: Arc::default(),
            }),
            metrics,
        }
    }

    /// Adds a block that has already passed the state transition.
    ///
    /// Returns the root of the block.
    pub fn on_block(&self, block: &BeaconBlock, post_state: &impl PostState) -> Result<H256> {
        let block_root = block.hash_tree_root();

        let mut proto_array = self.proto_array.write();

        proto_array.on_block(
            block.slot,
            block_root,
            block.parent_root,
            block.state_root,
            post_state.current_justified_checkpoint().epoch,
            post_state.finalized_checkpoint().epoch,
        )?;

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_proto_array_node_count(proto_array.len());
        }

        Ok(block_root)
    }

    /// Records the votes of all validators in `indexed_attestation`.
    ///
    /// The attestation must already be validated. Votes older than the latest vote of a validator
    /// are ignored.
    pub fn on_attestation(&self, indexed_attestation: &IndexedAttestation) {
        let block_root = indexed_attestation.data.beacon_block_root;
        let target_epoch = indexed_attestation.data.target.epoch;

        let mut votes = self.votes.write();

        let mut updated = 0;

        for validator_index in indexed_attestation.attesting_indices.iter().copied() {
            if let Some(tracker) = votes.get_mut(validator_index) {
                if tracker.update(block_root, target_epoch) {
                    updated += 1;
                }
            }
        }

        if updated < indexed_attestation.attesting_indices.len() {
            debug!(
                "ignored {} stale votes for {block_root:?} in epoch {target_epoch}",
                indexed_attestation.attesting_indices.len() - updated,
            );
        }
    }

    /// Recomputes block weights from votes and justified balances and returns the new head.
    pub fn update_head(&self) -> Result<H256> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.fc_update_head_times.start_timer());

        let mut proto_array = self.proto_array.write();
        let mut votes = self.votes.write();
        let mut balances = self.balances.write();

        let snapshot = Arc::clone(&balances.snapshot);

        let deltas = compute_deltas(
            proto_array.indices(),
            &votes,
            &balances.applied,
            &snapshot.balances,
        )?;

        proto_array.apply_score_changes(
            deltas,
            snapshot.justified_checkpoint.epoch,
            snapshot.finalized_checkpoint.epoch,
        )?;

        // The weights now reflect the new votes and balances even if no head can be found.
        commit_votes(votes.as_mut_slice());
        balances.applied = Arc::clone(&snapshot.balances);

        let head = proto_array.find_head(snapshot.justified_checkpoint.root)?;

        features::log!(
            LogHeadUpdates,
            "head is {head:?} (justified: {:?}, finalized: {:?}, blocks: {})",
            snapshot.justified_checkpoint,
            snapshot.finalized_checkpoint,
            proto_array.len(),
        );

        Ok(head)
    }

    /// Returns the head as of the last call to [`Self::update_head`].
    pub fn head(&self) -> Result<H256> {
        let proto_array = self.proto_array.read();
        let justified_root = self.balances.read().snapshot.justified_checkpoint.root;

        proto_array.find_head(justified_root).map_err(Into::into)
    }

    /// Prunes blocks before `finalized_root` if enough of them have accumulated.
    pub fn update_finalized_block(&self, finalized_root: H256) -> Result<()> {
        let mut proto_array = self.proto_array.write();

        proto_array.maybe_prune(finalized_root)?;

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_proto_array_node_count(proto_array.len());
        }

        Ok(())
    }

    /// Replaces the justified checkpoint and the balances votes are weighed by.
    ///
    /// Balances are obtained before any lock is taken.
    pub fn update_justified_checkpoint(
        &self,
        checkpoint: Checkpoint,
        provider: &impl BalancesProvider,
    ) -> Result<()> {
        let justified_balances = provider.justified_balances(checkpoint)?;

        let mut balances = self.balances.write();
        let snapshot = balances.snapshot.with_justified(checkpoint, justified_balances);
        balances.snapshot = Arc::new(snapshot);

        debug!("justified checkpoint updated to {checkpoint:?}");

        Ok(())
    }

    /// Replaces the finalized checkpoint and prunes blocks before it.
    pub fn update_finalized_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        {
            let mut balances = self.balances.write();
            let snapshot = balances.snapshot.with_finalized(checkpoint);
            balances.snapshot = Arc::new(snapshot);
        }

        self.update_finalized_block(checkpoint.root)
    }

    #[must_use]
    pub fn balances_snapshot(&self) -> Arc<BalancesSnapshot> {
        Arc::clone(&self.balances.read().snapshot)
    }

    #[must_use]
    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.balances.read().snapshot.justified_checkpoint
    }

    #[must_use]
    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.balances.read().snapshot.finalized_checkpoint
    }

    #[must_use]
    pub fn contains_block(&self, block_root: H256) -> bool {
        self.proto_array.read().contains_block(block_root)
    }

    #[must_use]
    pub fn block_slot(&self, block_root: H256) -> Option<Slot> {
        self.proto_array.read().block_slot(block_root)
    }

    #[must_use]
    pub fn block_parent(&self, block_root: H256) -> Option<H256> {
        self.proto_array.read().block_parent(block_root)
    }

    #[must_use]
    pub fn is_descendant(&self, ancestor_root: H256, descendant_root: H256) -> bool {
        self.proto_array
            .read()
            .is_descendant(ancestor_root, descendant_root)
    }

    /// Returns the root of the newest ancestor of `block_root` at or before `slot`.
    #[must_use]
    pub fn ancestor_at_slot(&self, block_root: H256, slot: Slot) -> Option<H256> {
        self.proto_array.read().ancestor_at_slot(block_root, slot)
    }

    #[must_use]
    pub fn block_weight(&self, block_root: H256) -> Option<Gwei> {
        self.proto_array
            .read()
            .node(block_root)
            .map(|node| node.weight)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.proto_array.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proto_array.read().is_empty()
    }

    /// Returns the root and target epoch of the newest vote of a validator.
    #[must_use]
    pub fn latest_message(&self, validator_index: ValidatorIndex) -> Option<(H256, Epoch)> {
        self.votes
            .read()
            .get(validator_index)
            .filter(|tracker| **tracker != VoteTracker::default())
            .map(|tracker| (tracker.next_root, tracker.next_epoch))
    }

    pub fn set_prune_threshold(&self, prune_threshold: usize) {
        self.proto_array.write().set_prune_threshold(prune_threshold);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use itertools::Itertools as _;
    use test_case::test_case;
    use types::phase0::containers::AttestationData;

    use super::*;

    struct Checkpoints {
        justified: Checkpoint,
        finalized: Checkpoint,
    }

    impl PostState for Checkpoints {
        fn current_justified_checkpoint(&self) -> Checkpoint {
            self.justified
        }

        fn finalized_checkpoint(&self) -> Checkpoint {
            self.finalized
        }
    }

    const GENESIS_STATE: Checkpoints = Checkpoints {
        justified: Checkpoint {
            epoch: 0,
            root: H256::zero(),
        },
        finalized: Checkpoint {
            epoch: 0,
            root: H256::zero(),
        },
    };

    fn block(slot: Slot, parent_root: H256, graffiti: u8) -> BeaconBlock {
        BeaconBlock {
            slot,
            parent_root,
            body_root: H256::repeat_byte(graffiti),
            ..BeaconBlock::default()
        }
    }

    fn vote(
        block_root: H256,
        target_epoch: Epoch,
        validators: &[ValidatorIndex],
    ) -> IndexedAttestation {
        IndexedAttestation {
            attesting_indices: validators.to_vec(),
            data: AttestationData {
                beacon_block_root: block_root,
                target: Checkpoint {
                    epoch: target_epoch,
                    root: block_root,
                },
                ..AttestationData::default()
            },
            ..IndexedAttestation::default()
        }
    }

    fn balances(balances: &[Gwei]) -> impl BalancesProvider + '_ {
        move |_: Checkpoint| -> Result<Arc<[Gwei]>> { Ok(balances.into()) }
    }

    // Returns the store and the root of the genesis block.
    fn genesis_store(config: StoreConfig, validator_balances: &[Gwei]) -> Result<(Store, H256)> {
        let genesis_block = block(0, H256::zero(), 0);
        let genesis_root = genesis_block.hash_tree_root();
        let genesis_checkpoint = Checkpoint {
            epoch: 0,
            root: genesis_root,
        };

        let store = Store::new(config, genesis_checkpoint, genesis_checkpoint, None);
        store.on_block(&genesis_block, &GENESIS_STATE)?;
        store.update_justified_checkpoint(genesis_checkpoint, &balances(validator_balances))?;

        Ok((store, genesis_root))
    }

    #[test]
    fn head_moves_to_voted_child() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32])?;

        assert_eq!(store.update_head()?, genesis_root);

        let child_root = store.on_block(&block(1, genesis_root, 1), &GENESIS_STATE)?;
        store.on_attestation(&vote(child_root, 0, &[0]));

        assert_eq!(store.update_head()?, child_root);
        assert_eq!(store.head()?, child_root);
        assert_eq!(store.block_weight(genesis_root), Some(32));

        Ok(())
    }

    #[test]
    fn heavier_competing_block_wins() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32, 64])?;

        let block_a = store.on_block(&block(1, genesis_root, 3), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(1, genesis_root, 4), &GENESIS_STATE)?;

        store.on_attestation(&vote(block_a, 0, &[0]));
        store.on_attestation(&vote(block_b, 0, &[1]));

        assert_eq!(store.update_head()?, block_b);

        // Validator 1 switches sides.
        store.on_attestation(&vote(block_a, 1, &[1]));

        assert_eq!(store.update_head()?, block_a);
        assert_eq!(store.block_weight(block_a), Some(96));
        assert_eq!(store.block_weight(block_b), Some(0));

        Ok(())
    }

    #[test]
    fn stale_votes_are_ignored() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32])?;

        let block_a = store.on_block(&block(1, genesis_root, 1), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(1, genesis_root, 2), &GENESIS_STATE)?;

        store.on_attestation(&vote(block_a, 2, &[0]));
        store.on_attestation(&vote(block_b, 1, &[0]));

        assert_eq!(store.latest_message(0), Some((block_a, 2)));
        assert_eq!(store.latest_message(1), None);

        store.update_head()?;

        assert_eq!(store.block_weight(block_a), Some(32));
        assert_eq!(store.block_weight(block_b), Some(0));

        Ok(())
    }

    #[test]
    fn balance_changes_are_applied() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32, 32])?;
        let justified_checkpoint = store.justified_checkpoint();

        let block_a = store.on_block(&block(1, genesis_root, 1), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(1, genesis_root, 2), &GENESIS_STATE)?;

        store.on_attestation(&vote(block_a, 0, &[0]));
        store.on_attestation(&vote(block_b, 0, &[1]));
        store.update_head()?;

        store.update_justified_checkpoint(justified_checkpoint, &balances(&[32, 16]))?;

        assert_eq!(store.balances_snapshot().version, 2);
        assert_eq!(store.update_head()?, block_a);
        assert_eq!(store.block_weight(block_b), Some(16));
        assert_eq!(store.block_weight(genesis_root), Some(48));

        Ok(())
    }

    #[test]
    fn head_falls_back_to_justified_block_when_children_are_not_viable() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32])?;

        let justifying_state = Checkpoints {
            justified: Checkpoint {
                epoch: 1,
                root: genesis_root,
            },
            finalized: GENESIS_STATE.finalized,
        };

        let justified_root = store.on_block(&block(32, genesis_root, 0), &justifying_state)?;
        let block_a = store.on_block(&block(33, justified_root, 1), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(33, justified_root, 2), &GENESIS_STATE)?;

        store.on_attestation(&vote(block_a, 0, &[0]));

        assert_eq!(store.update_head()?, block_a);

        let justified_checkpoint = Checkpoint {
            epoch: 1,
            root: justified_root,
        };

        store.on_attestation(&vote(block_b, 1, &[0]));
        store.update_justified_checkpoint(justified_checkpoint, &balances(&[32]))?;

        assert_eq!(store.update_head()?, justified_root);
        assert_eq!(store.block_weight(block_b), Some(32));
        assert_eq!(store.block_weight(block_a), Some(0));

        Ok(())
    }

    #[test]
    fn failed_head_update_can_be_retried() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32, 32])?;
        let justified_checkpoint = store.justified_checkpoint();

        let block_a = store.on_block(&block(1, genesis_root, 1), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(1, genesis_root, 2), &GENESIS_STATE)?;

        store.on_attestation(&vote(block_a, 0, &[0]));
        store.on_attestation(&vote(block_b, 0, &[1]));
        store.update_justified_checkpoint(justified_checkpoint, &balances(&[32, Gwei::MAX]))?;

        let error = store.update_head().expect_err("balance does not fit in a delta");

        assert_eq!(
            error.downcast_ref::<proto_array::Error>(),
            Some(&proto_array::Error::DeltaOverflow { index: 2 }),
        );
        assert_eq!(store.block_weight(block_a), Some(0));

        store.update_justified_checkpoint(justified_checkpoint, &balances(&[32, 64]))?;

        assert_eq!(store.update_head()?, block_b);
        assert_eq!(store.block_weight(block_a), Some(32));
        assert_eq!(store.block_weight(block_b), Some(64));
        assert_eq!(store.block_weight(genesis_root), Some(96));

        Ok(())
    }

    #[test]
    fn votes_for_unknown_blocks_have_no_effect() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[32])?;

        store.on_attestation(&vote(H256::repeat_byte(0xff), 0, &[0]));

        assert_eq!(store.update_head()?, genesis_root);
        assert_eq!(store.block_weight(genesis_root), Some(0));

        Ok(())
    }

    #[test]
    fn duplicate_block_is_an_error() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[])?;

        let error = store
            .on_block(&block(0, H256::zero(), 0), &GENESIS_STATE)
            .expect_err("genesis block was already added");

        assert_eq!(
            error.downcast_ref::<proto_array::Error>(),
            Some(&proto_array::Error::BlockAlreadyKnown { root: genesis_root }),
        );

        Ok(())
    }

    #[test]
    fn update_head_fails_for_unknown_justified_root() {
        let checkpoint = Checkpoint {
            epoch: 0,
            root: H256::repeat_byte(1),
        };

        let store = Store::new(StoreConfig::default(), checkpoint, checkpoint, None);

        let error = store.update_head().expect_err("store has no blocks");

        assert_eq!(
            error.downcast_ref::<proto_array::Error>(),
            Some(&proto_array::Error::UnknownJustifiedRoot {
                root: checkpoint.root,
            }),
        );
    }

    #[test]
    fn block_queries() -> Result<()> {
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &[])?;

        let child_root = store.on_block(&block(3, genesis_root, 1), &GENESIS_STATE)?;

        assert!(store.contains_block(child_root));
        assert!(!store.contains_block(H256::repeat_byte(0xff)));
        assert_eq!(store.block_slot(child_root), Some(3));
        assert_eq!(store.block_parent(child_root), Some(genesis_root));
        assert_eq!(store.ancestor_at_slot(child_root, 2), Some(genesis_root));
        assert!(store.is_descendant(genesis_root, child_root));
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());

        Ok(())
    }

    #[test_case(StoreConfig::aggressive() => 3; "aggressive")]
    #[test_case(StoreConfig::default() => 5; "default")]
    fn finalization_prunes_old_blocks(config: StoreConfig) -> usize {
        let (store, genesis_root) =
            genesis_store(config, &[32]).expect("genesis store can be created");

        let roots = (1..=4)
            .scan(genesis_root, |parent_root, slot| {
                let root = store
                    .on_block(&block(slot, *parent_root, 0), &GENESIS_STATE)
                    .expect("block is new");
                *parent_root = root;
                Some(root)
            })
            .collect_vec();

        store.on_attestation(&vote(roots[3], 0, &[0]));
        store.update_head().expect("head can be found");

        let finalized_checkpoint = Checkpoint {
            epoch: 0,
            root: roots[1],
        };

        store
            .update_justified_checkpoint(finalized_checkpoint, &balances(&[32]))
            .expect("balances are available");
        store
            .update_finalized_checkpoint(finalized_checkpoint)
            .expect("finalized block is known");

        assert_eq!(store.update_head().expect("head can be found"), roots[3]);

        store.len()
    }

    #[test]
    fn concurrent_attestations_and_head_updates_agree() -> Result<()> {
        const VALIDATOR_COUNT: u64 = 64;

        let validator_balances = vec![32; VALIDATOR_COUNT as usize];
        let (store, genesis_root) = genesis_store(StoreConfig::default(), &validator_balances)?;

        let block_a = store.on_block(&block(1, genesis_root, 1), &GENESIS_STATE)?;
        let block_b = store.on_block(&block(1, genesis_root, 2), &GENESIS_STATE)?;

        thread::scope(|scope| {
            for validator_index in 0..VALIDATOR_COUNT {
                let store = &store;

                scope.spawn(move || {
                    // Two thirds of the validators vote for `block_b`.
                    let root = if validator_index % 3 == 0 { block_a } else { block_b };
                    store.on_attestation(&vote(root, 1, &[validator_index]));
                });
            }

            scope.spawn(|| store.update_head());
        });

        assert_eq!(store.update_head()?, block_b);
        assert_eq!(store.block_weight(genesis_root), Some(32 * VALIDATOR_COUNT));

        Ok(())
    }
}

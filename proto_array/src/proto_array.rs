use std::collections::HashMap;

use log::debug;
use types::phase0::{
    consts::GENESIS_EPOCH,
    primitives::{Epoch, Gwei, Slot, H256},
};

use crate::{error::Error, votes::Difference};

pub type NodeIndex = usize;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProtoNode {
    pub slot: Slot,
    pub root: H256,
    pub parent_root: H256,
    pub state_root: H256,
    /// `None` for the anchor and for blocks whose parent has been pruned or was never known.
    pub parent: Option<NodeIndex>,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
    pub weight: Gwei,
    pub best_child: Option<NodeIndex>,
    pub best_descendant: Option<NodeIndex>,
}

#[derive(Clone, Default, Debug)]
pub struct ProtoArray {
    prune_threshold: usize,
    justified_epoch: Epoch,
    finalized_epoch: Epoch,
    nodes: Vec<ProtoNode>,
    indices: HashMap<H256, NodeIndex>,
}

impl ProtoArray {
    #[must_use]
    pub fn new(justified_epoch: Epoch, finalized_epoch: Epoch, prune_threshold: usize) -> Self {
        Self {
            prune_threshold,
            justified_epoch,
            finalized_epoch,
            nodes: vec![],
            indices: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn justified_epoch(&self) -> Epoch {
        self.justified_epoch
    }

    #[must_use]
    pub const fn finalized_epoch(&self) -> Epoch {
        self.finalized_epoch
    }

    #[must_use]
    pub const fn prune_threshold(&self) -> usize {
        self.prune_threshold
    }

    pub fn set_prune_threshold(&mut self, prune_threshold: usize) {
        self.prune_threshold = prune_threshold;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub const fn indices(&self) -> &HashMap<H256, NodeIndex> {
        &self.indices
    }

    #[must_use]
    pub fn nodes(&self) -> &[ProtoNode] {
        &self.nodes
    }

    #[must_use]
    pub fn contains_block(&self, root: H256) -> bool {
        self.indices.contains_key(&root)
    }

    #[must_use]
    pub fn node(&self, root: H256) -> Option<&ProtoNode> {
        let index = *self.indices.get(&root)?;
        self.nodes.get(index)
    }

    #[must_use]
    pub fn block_slot(&self, root: H256) -> Option<Slot> {
        self.node(root).map(|node| node.slot)
    }

    #[must_use]
    pub fn block_parent(&self, root: H256) -> Option<H256> {
        self.node(root).map(|node| node.parent_root)
    }

    /// Registers a block.
    ///
    /// The new node has no weight and is not considered by [`Self::find_head`] until the next
    /// call to [`Self::apply_score_changes`]. A block whose parent is not in the array becomes
    /// a root of its own subtree.
    pub fn on_block(
        &mut self,
        slot: Slot,
        root: H256,
        parent_root: H256,
        state_root: H256,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        if self.indices.contains_key(&root) {
            return Err(Error::BlockAlreadyKnown { root });
        }

        let node_index = self.nodes.len();

        self.nodes.push(ProtoNode {
            slot,
            root,
            parent_root,
            state_root,
            parent: self.indices.get(&parent_root).copied(),
            justified_epoch,
            finalized_epoch,
            weight: 0,
            best_child: None,
            best_descendant: None,
        });

        self.indices.insert(root, node_index);

        Ok(())
    }

    /// Applies `deltas` to node weights and recomputes best children and descendants.
    ///
    /// `deltas[i]` is the change in weight of the node at index `i` not counting its descendants.
    pub fn apply_score_changes(
        &mut self,
        mut deltas: Vec<Difference>,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        if deltas.len() != self.nodes.len() {
            return Err(Error::InvalidDeltaLength {
                deltas: deltas.len(),
                nodes: self.nodes.len(),
            });
        }

        // Weights are only written once all of them have been computed.
        let mut weights = vec![0; self.nodes.len()];

        // Children always come after their parents, so by the time a node is reached
        // in reverse order its delta already includes the deltas of all its descendants.
        for node_index in (0..self.nodes.len()).rev() {
            let delta = *deltas
                .get(node_index)
                .ok_or(Error::InvalidNodeDelta { index: node_index })?;

            let node = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex { index: node_index })?;

            weights[node_index] = apply_delta(node.weight, delta)
                .ok_or(Error::DeltaOverflow { index: node_index })?;

            if let Some(parent_index) = node.parent {
                let parent_delta = deltas
                    .get_mut(parent_index)
                    .ok_or(Error::InvalidParentDelta {
                        index: parent_index,
                    })?;

                *parent_delta = parent_delta
                    .checked_add(delta)
                    .ok_or(Error::DeltaOverflow {
                        index: parent_index,
                    })?;
            }
        }

        for (node, weight) in self.nodes.iter_mut().zip(weights) {
            node.weight = weight;
        }

        self.justified_epoch = justified_epoch;
        self.finalized_epoch = finalized_epoch;

        // Best descendants of children are settled before their parents are visited.
        // This has to happen after all weights are final because siblings are compared.
        for node_index in (0..self.nodes.len()).rev() {
            if let Some(parent_index) = self.nodes[node_index].parent {
                self.maybe_update_best_child_and_descendant(parent_index, node_index)?;
            }
        }

        Ok(())
    }

    /// Returns the root of the best descendant of the block with `justified_root`.
    ///
    /// Returns the justified root itself if no descendant leads to a viable head.
    pub fn find_head(&self, justified_root: H256) -> Result<H256, Error> {
        let justified_index = *self
            .indices
            .get(&justified_root)
            .ok_or(Error::UnknownJustifiedRoot {
                root: justified_root,
            })?;

        let justified_node = self
            .nodes
            .get(justified_index)
            .ok_or(Error::InvalidNodeIndex {
                index: justified_index,
            })?;

        let best_descendant_index = justified_node.best_descendant.unwrap_or(justified_index);

        let best_node = self
            .nodes
            .get(best_descendant_index)
            .ok_or(Error::InvalidBestDescendant {
                index: best_descendant_index,
            })?;

        if !self.node_is_viable_for_head(best_node) {
            return Err(Error::InvalidBestNode {
                root: best_node.root,
                node_justified_epoch: best_node.justified_epoch,
                node_finalized_epoch: best_node.finalized_epoch,
                justified_epoch: self.justified_epoch,
                finalized_epoch: self.finalized_epoch,
            });
        }

        Ok(best_node.root)
    }

    /// Drops all nodes inserted before the finalized block once there are enough of them.
    ///
    /// Nodes inserted after the finalized block that do not descend from it are kept.
    /// Their links into the pruned part of the array are severed.
    pub fn maybe_prune(&mut self, finalized_root: H256) -> Result<(), Error> {
        let finalized_index = *self
            .indices
            .get(&finalized_root)
            .ok_or(Error::FinalizedNodeUnknown {
                root: finalized_root,
            })?;

        if finalized_index < self.prune_threshold {
            return Ok(());
        }

        for node in self.nodes.drain(..finalized_index) {
            self.indices.remove(&node.root);
        }

        for index in self.indices.values_mut() {
            *index = index
                .checked_sub(finalized_index)
                .ok_or(Error::IndexUnderflow { index: *index })?;
        }

        for node in &mut self.nodes {
            node.parent = node
                .parent
                .and_then(|parent| parent.checked_sub(finalized_index));

            if let Some(best_child) = node.best_child {
                let shifted = best_child
                    .checked_sub(finalized_index)
                    .ok_or(Error::InvalidBestChild { index: best_child })?;

                node.best_child = Some(shifted);
            }

            if let Some(best_descendant) = node.best_descendant {
                let shifted = best_descendant
                    .checked_sub(finalized_index)
                    .ok_or(Error::InvalidBestDescendant {
                        index: best_descendant,
                    })?;

                node.best_descendant = Some(shifted);
            }
        }

        debug!(
            "pruned {finalized_index} nodes from proto-array \
             (finalized root: {finalized_root:?}, remaining nodes: {})",
            self.nodes.len(),
        );

        Ok(())
    }

    /// Iterates over the block with `root` and its known ancestors, newest first.
    pub fn ancestors(&self, root: H256) -> impl Iterator<Item = &ProtoNode> {
        let mut next = self.indices.get(&root).copied();

        core::iter::from_fn(move || {
            let node = self.nodes.get(next?)?;
            next = node.parent;
            Some(node)
        })
    }

    /// Returns the root of the newest ancestor of `root` (including itself) at or before `slot`.
    #[must_use]
    pub fn ancestor_at_slot(&self, root: H256, slot: Slot) -> Option<H256> {
        self.ancestors(root)
            .find(|node| node.slot <= slot)
            .map(|node| node.root)
    }

    #[must_use]
    pub fn is_descendant(&self, ancestor_root: H256, descendant_root: H256) -> bool {
        let Some(ancestor) = self.node(ancestor_root) else {
            return false;
        };

        self.ancestors(descendant_root)
            .take_while(|node| node.slot >= ancestor.slot)
            .any(|node| node.root == ancestor_root)
    }

    fn maybe_update_best_child_and_descendant(
        &mut self,
        parent_index: NodeIndex,
        child_index: NodeIndex,
    ) -> Result<(), Error> {
        let child = self
            .nodes
            .get(child_index)
            .ok_or(Error::InvalidNodeIndex { index: child_index })?;

        let parent = self
            .nodes
            .get(parent_index)
            .ok_or(Error::InvalidNodeIndex {
                index: parent_index,
            })?;

        let child_leads_to_viable_head = self.node_leads_to_viable_head(child)?;

        let change_to_none = (None, None);
        let change_to_child = (
            Some(child_index),
            Some(child.best_descendant.unwrap_or(child_index)),
        );
        let no_change = (parent.best_child, parent.best_descendant);

        let (best_child, best_descendant) = match parent.best_child {
            Some(best_child_index) if best_child_index == child_index => {
                if child_leads_to_viable_head {
                    change_to_child
                } else {
                    change_to_none
                }
            }
            Some(best_child_index) => {
                let best_child = self
                    .nodes
                    .get(best_child_index)
                    .ok_or(Error::InvalidBestChild {
                        index: best_child_index,
                    })?;

                let best_child_leads_to_viable_head = self.node_leads_to_viable_head(best_child)?;

                match (child_leads_to_viable_head, best_child_leads_to_viable_head) {
                    (true, false) => change_to_child,
                    (false, true) => no_change,
                    // Neither is eligible. Another child visited later may still be.
                    (false, false) => change_to_none,
                    // Ties are broken in favor of the numerically greater root.
                    // `H256` compares its bytes lexicographically, which is the same as
                    // comparing them as big-endian integers.
                    (true, true) if child.weight == best_child.weight => {
                        if child.root >= best_child.root {
                            change_to_child
                        } else {
                            no_change
                        }
                    }
                    (true, true) if child.weight > best_child.weight => change_to_child,
                    (true, true) => no_change,
                }
            }
            None if child_leads_to_viable_head => change_to_child,
            None => no_change,
        };

        let parent = &mut self.nodes[parent_index];
        parent.best_child = best_child;
        parent.best_descendant = best_descendant;

        Ok(())
    }

    fn node_leads_to_viable_head(&self, node: &ProtoNode) -> Result<bool, Error> {
        let best_descendant_is_viable_for_head = match node.best_descendant {
            Some(index) => {
                let best_descendant = self
                    .nodes
                    .get(index)
                    .ok_or(Error::InvalidBestDescendant { index })?;

                self.node_is_viable_for_head(best_descendant)
            }
            None => false,
        };

        Ok(best_descendant_is_viable_for_head || self.node_is_viable_for_head(node))
    }

    // A node is only a head candidate if the state it produced agrees with the store about
    // justification and finality. The genesis epoch acts as a wildcard because nothing has been
    // justified or finalized yet.
    const fn node_is_viable_for_head(&self, node: &ProtoNode) -> bool {
        (node.justified_epoch == self.justified_epoch || self.justified_epoch == GENESIS_EPOCH)
            && (node.finalized_epoch == self.finalized_epoch
                || self.finalized_epoch == GENESIS_EPOCH)
    }
}

fn apply_delta(weight: Gwei, delta: Difference) -> Option<Gwei> {
    if delta < 0 {
        weight.checked_sub(delta.unsigned_abs())
    } else {
        weight.checked_add(delta.unsigned_abs())
    }
}

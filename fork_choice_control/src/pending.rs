use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use log::debug;
use operation_pools::ValidateableAttestation;
use types::{
    phase0::primitives::{Slot, H256},
    preset::Preset,
};

// Entries are ordered by slot first. The sequence number keeps entries from the same slot apart.
type EntryKey = (Slot, u64);

/// Attestations waiting for blocks they depend on.
pub struct PendingAttestations<P: Preset> {
    max_attestations: usize,
    retention_slots: u64,
    next_sequence_number: u64,
    entries: BTreeMap<EntryKey, (H256, Arc<ValidateableAttestation<P>>)>,
    by_block_root: HashMap<H256, BTreeSet<EntryKey>>,
}

impl<P: Preset> PendingAttestations<P> {
    #[must_use]
    pub fn new(max_attestations: usize, retention_slots: u64) -> Self {
        Self {
            max_attestations,
            retention_slots,
            next_sequence_number: 0,
            entries: BTreeMap::new(),
            by_block_root: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks if an equal attestation is waiting for any of the blocks it depends on.
    #[must_use]
    pub fn contains(&self, attestation: &ValidateableAttestation<P>) -> bool {
        let data = attestation.data();

        [data.beacon_block_root, data.target.root]
            .iter()
            .filter_map(|block_root| self.by_block_root.get(block_root))
            .flatten()
            .filter_map(|key| self.entries.get(key))
            .any(|(_, pending)| pending.attestation() == attestation.attestation())
    }

    /// Adds an attestation waiting for the block with root `block_root`.
    ///
    /// The oldest attestation is dropped if the pool is full.
    pub fn add(&mut self, block_root: H256, attestation: Arc<ValidateableAttestation<P>>) {
        if self.max_attestations == 0 || self.contains(&attestation) {
            return;
        }

        if self.entries.len() >= self.max_attestations {
            self.remove_oldest();
        }

        let key = (attestation.data().slot, self.next_sequence_number);
        self.next_sequence_number += 1;

        self.entries.insert(key, (block_root, attestation));
        self.by_block_root.entry(block_root).or_default().insert(key);
    }

    /// Removes and returns attestations waiting for the block with root `block_root`.
    ///
    /// Attestations are returned oldest first.
    pub fn take(&mut self, block_root: H256) -> Vec<Arc<ValidateableAttestation<P>>> {
        self.by_block_root
            .remove(&block_root)
            .into_iter()
            .flatten()
            .filter_map(|key| self.entries.remove(&key))
            .map(|(_, attestation)| attestation)
            .collect()
    }

    /// Drops attestations that have been waiting too long to still be useful at `slot`.
    pub fn prune(&mut self, slot: Slot) {
        let Some(oldest_retained_slot) = slot.checked_sub(self.retention_slots) else {
            return;
        };

        let retained = self.entries.split_off(&(oldest_retained_slot, 0));
        let pruned = core::mem::replace(&mut self.entries, retained);

        if pruned.is_empty() {
            return;
        }

        for (key, (block_root, _)) in &pruned {
            self.remove_key(*block_root, *key);
        }

        debug!(
            "dropped {} attestations waiting for blocks since before slot \
             {oldest_retained_slot}",
            pruned.len(),
        );
    }

    fn remove_oldest(&mut self) {
        let Some((key, (block_root, _))) = self.entries.pop_first() else {
            return;
        };

        self.remove_key(block_root, key);

        debug!(
            "pending attestation pool is full; dropped attestation from slot {} \
             waiting for block {block_root:?}",
            key.0,
        );
    }

    fn remove_key(&mut self, block_root: H256, key: EntryKey) {
        if let Some(keys) = self.by_block_root.get_mut(&block_root) {
            keys.remove(&key);

            if keys.is_empty() {
                self.by_block_root.remove(&block_root);
            }
        }
    }

    #[cfg(test)]
    fn block_roots(&self) -> Vec<H256> {
        let mut block_roots = self.by_block_root.keys().copied().collect::<Vec<_>>();
        block_roots.sort_unstable();
        block_roots
    }
}

/// Attestations that may only be applied to fork choice in a later slot.
pub struct FutureAttestations<P: Preset> {
    by_slot: BTreeMap<Slot, Vec<Arc<ValidateableAttestation<P>>>>,
}

impl<P: Preset> Default for FutureAttestations<P> {
    fn default() -> Self {
        Self {
            by_slot: BTreeMap::new(),
        }
    }
}

impl<P: Preset> FutureAttestations<P> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_slot.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }

    pub fn add(&mut self, attestation: Arc<ValidateableAttestation<P>>) {
        self.by_slot
            .entry(attestation.data().slot)
            .or_default()
            .push(attestation);
    }

    /// Removes and returns attestations from slots before `slot`.
    pub fn take_due(&mut self, slot: Slot) -> Vec<Arc<ValidateableAttestation<P>>> {
        let later = self.by_slot.split_off(&slot);

        core::mem::replace(&mut self.by_slot, later)
            .into_values()
            .flatten()
            .collect()
    }
}

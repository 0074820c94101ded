use std::sync::Arc;

use log::debug;
use operation_pools::ValidateableAttestation;
use types::preset::Preset;

use crate::unbounded_sink::UnboundedSink;

/// Attestations to be published on the network after they were processed.
#[derive(Debug)]
pub enum GossipMessage<P: Preset> {
    PublishAttestation(Arc<ValidateableAttestation<P>>),
    PublishAggregate(Arc<ValidateableAttestation<P>>),
}

impl<P: Preset> GossipMessage<P> {
    pub fn send(self, tx: &impl UnboundedSink<Self>) {
        if tx.unbounded_send(self).is_err() {
            debug!("send to gossip failed because the receiver was dropped");
        }
    }
}

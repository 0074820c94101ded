//! Routing of attestations between fork choice, the aggregation pool and the network.
//!
//! The [`AttestationManager`] delegates classification to an [`AttestationProcessor`] and
//! keeps attestations that cannot be processed yet until the block or slot they wait for.

pub use crate::{
    manager::AttestationManager,
    manager_config::ManagerConfig,
    messages::GossipMessage,
    misc::ProcessingResult,
    pending::{FutureAttestations, PendingAttestations},
    processor::{AttestationProcessor, ForkChoiceAttestationProcessor, StateProvider},
    unbounded_sink::UnboundedSink,
};

mod manager;
mod manager_config;
mod messages;
mod misc;
mod pending;
mod processor;
mod unbounded_sink;

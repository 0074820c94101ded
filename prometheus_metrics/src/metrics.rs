use anyhow::Result;
use log::warn;
use prometheus::{histogram_opts, opts, Histogram, IntCounterVec, IntGauge};

#[derive(Debug)]
pub struct Metrics {
    // Fork choice
    fc_proto_array_nodes: IntGauge,
    pub fc_update_head_times: Histogram,

    // Attestation pool
    attestation_pool_size: IntGauge,
    attestation_pool_groups: IntGauge,
    pub attestation_pool_pack_times: Histogram,

    // Attestation manager
    attestation_manager_outcomes: IntCounterVec,
    pending_attestations: IntGauge,
    future_attestations: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fc_proto_array_nodes: IntGauge::new(
                "FC_PROTO_ARRAY_NODES",
                "Number of blocks in the fork choice proto-array",
            )?,

            fc_update_head_times: Histogram::with_opts(histogram_opts!(
                "FC_UPDATE_HEAD_TIMES",
                "Forkchoice head update times",
            ))?,

            attestation_pool_size: IntGauge::new(
                "ATTESTATION_POOL_SIZE",
                "Number of attestations in the aggregating attestation pool",
            )?,

            attestation_pool_groups: IntGauge::new(
                "ATTESTATION_POOL_GROUPS",
                "Number of distinct attestation data roots in the aggregating attestation pool",
            )?,

            attestation_pool_pack_times: Histogram::with_opts(histogram_opts!(
                "ATTESTATION_POOL_PACK_TIMES",
                "Times spent selecting attestations for a block",
            ))?,

            attestation_manager_outcomes: IntCounterVec::new(
                opts!(
                    "ATTESTATION_MANAGER_OUTCOMES",
                    "Number of attestations processed by the attestation manager by outcome",
                ),
                &["outcome"],
            )?,

            pending_attestations: IntGauge::new(
                "PENDING_ATTESTATIONS",
                "Number of attestations waiting for their block",
            )?,

            future_attestations: IntGauge::new(
                "FUTURE_ATTESTATIONS",
                "Number of attestations waiting for their slot",
            )?,
        })
    }

    pub fn register_with_default_metrics(&self) -> Result<()> {
        let default_registry = prometheus::default_registry();

        default_registry.register(Box::new(self.fc_proto_array_nodes.clone()))?;
        default_registry.register(Box::new(self.fc_update_head_times.clone()))?;
        default_registry.register(Box::new(self.attestation_pool_size.clone()))?;
        default_registry.register(Box::new(self.attestation_pool_groups.clone()))?;
        default_registry.register(Box::new(self.attestation_pool_pack_times.clone()))?;
        default_registry.register(Box::new(self.attestation_manager_outcomes.clone()))?;
        default_registry.register(Box::new(self.pending_attestations.clone()))?;
        default_registry.register(Box::new(self.future_attestations.clone()))?;

        Ok(())
    }

    // Fork choice
    pub fn set_proto_array_node_count(&self, node_count: usize) {
        self.fc_proto_array_nodes.set(saturating_i64(node_count))
    }

    // Attestation pool
    pub fn set_attestation_pool_size(&self, size: usize) {
        self.attestation_pool_size.set(saturating_i64(size))
    }

    pub fn set_attestation_pool_groups(&self, group_count: usize) {
        self.attestation_pool_groups.set(saturating_i64(group_count))
    }

    // Attestation manager
    pub fn register_attestation_outcome(&self, labels: &[&str]) {
        match self
            .attestation_manager_outcomes
            .get_metric_with_label_values(labels)
        {
            Ok(counter) => counter.inc(),
            Err(error) => {
                warn!("unable to register attestation outcome for {labels:?}: {error:?}")
            }
        }
    }

    pub fn set_pending_attestations(&self, count: usize) {
        self.pending_attestations.set(saturating_i64(count))
    }

    pub fn set_future_attestations(&self, count: usize) {
        self.future_attestations.set(saturating_i64(count))
    }

    #[cfg(test)]
    fn attestation_outcome_count(&self, label: &str) -> u64 {
        self.attestation_manager_outcomes
            .get_metric_with_label_values(&[label])
            .map(|counter| counter.get())
            .unwrap_or_default()
    }
}

fn saturating_i64(value: usize) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

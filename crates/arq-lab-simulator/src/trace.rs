use arq_lab_abstract::{Counters, SimConfig};
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub messages_offered: u32,
    pub sender_packet_count: u32,
    pub sender_counters: Counters,
    pub receiver_counters: Counters,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Largest value recorded for a metric, if it was ever recorded.
    pub fn metric_max(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)?
            .iter()
            .map(|(_, value)| *value)
            .reduce(f64::max)
    }
}

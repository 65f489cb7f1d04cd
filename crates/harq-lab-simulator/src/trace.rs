use harq_lab_abstract::{SimConfig, Tick};
use serde::Serialize;

use crate::engine::{DeliveredPdu, LinkEventSummary};
use crate::metrics::MetricSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ticks: Tick,
    pub delivered: Vec<DeliveredPdu>,
    pub delivered_bytes: usize,
    /// Data frames put on the air, retransmissions included.
    pub transmissions: usize,
    pub retransmissions: usize,
    pub discarded: usize,
    pub metrics: Vec<MetricSummary>,
    pub link_events: Vec<LinkEventSummary>,
}

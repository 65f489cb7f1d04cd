use serde::Serialize;
use std::collections::HashMap;

use crate::ids::{Direction, MacNodeId, NodeKind};

/// Read-only view of the registered nodes.
/// Handed to buffers at construction so they can resolve the serving cell
/// and the role of a peer without a global registry.
pub trait NodeDirectory {
    /// Role of a registered node, `None` if unknown (or a multicast group).
    fn node_kind(&self, id: MacNodeId) -> Option<NodeKind>;

    /// eNB serving the given UE. An eNB serves itself.
    fn serving_cell(&self, id: MacNodeId) -> Option<MacNodeId>;

    /// Members of a D2D multicast group. Empty if `group` is not a group.
    fn multicast_members(&self, _group: MacNodeId) -> Vec<MacNodeId> {
        Vec::new()
    }

    fn is_multicast_group(&self, group: MacNodeId) -> bool {
        !self.multicast_members(group).is_empty()
    }
}

/// In-memory directory filled once from the scenario.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    nodes: HashMap<MacNodeId, (NodeKind, Option<MacNodeId>)>,
    groups: HashMap<MacNodeId, Vec<MacNodeId>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_enb(&mut self, id: MacNodeId) {
        self.nodes.insert(id, (NodeKind::Enb, Some(id)));
    }

    pub fn register_ue(&mut self, id: MacNodeId, cell: MacNodeId) {
        self.nodes.insert(id, (NodeKind::Ue, Some(cell)));
    }

    pub fn register_group(&mut self, group: MacNodeId, members: Vec<MacNodeId>) {
        self.groups.insert(group, members);
    }

    /// Forget a node that left the system. Group memberships are updated too.
    pub fn remove(&mut self, id: MacNodeId) -> bool {
        for members in self.groups.values_mut() {
            members.retain(|m| *m != id);
        }
        self.nodes.remove(&id).is_some()
    }

    pub fn contains(&self, id: MacNodeId) -> bool {
        self.nodes.contains_key(&id)
    }
}

impl NodeDirectory for StaticDirectory {
    fn node_kind(&self, id: MacNodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|(kind, _)| *kind)
    }

    fn serving_cell(&self, id: MacNodeId) -> Option<MacNodeId> {
        self.nodes.get(&id).and_then(|(_, cell)| *cell)
    }

    fn multicast_members(&self, group: MacNodeId) -> Vec<MacNodeId> {
        self.groups.get(&group).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricKind {
    /// NACK ratio over all attempts.
    HarqErrorRate,
    /// NACK ratio of the n-th attempt (1-based).
    HarqErrorRateAttempt(u8),
    /// 1 when a PDU was discarded, 0 when it was delivered.
    MacPacketLoss,
    MacCellPacketLoss,
    /// Ticks between PDU creation and extraction at the receiver.
    MacDelay,
    /// Bytes extracted at the receiver.
    MacThroughput,
    MacCellThroughput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub direction: Direction,
}

impl Metric {
    pub fn new(kind: MetricKind, direction: Direction) -> Self {
        Self { kind, direction }
    }

    /// Statistic name, e.g. `harqErrorRate_2nd_Ul` or `macCellThroughputD2D`.
    pub fn name(&self) -> String {
        let dir = self.direction.label();
        match self.kind {
            MetricKind::HarqErrorRate => format!("harqErrorRate{dir}"),
            MetricKind::HarqErrorRateAttempt(n) => {
                format!("harqErrorRate_{}_{dir}", ordinal(n))
            }
            MetricKind::MacPacketLoss => format!("macPacketLoss{dir}"),
            MetricKind::MacCellPacketLoss => format!("macCellPacketLoss{dir}"),
            MetricKind::MacDelay => format!("macDelay{dir}"),
            MetricKind::MacThroughput => format!("macThroughput{dir}"),
            MetricKind::MacCellThroughput => format!("macCellThroughput{dir}"),
        }
    }

    pub fn is_packet_loss(&self) -> bool {
        matches!(self.kind, MetricKind::MacPacketLoss)
    }
}

fn ordinal(n: u8) -> String {
    match n {
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        n => format!("{n}th"),
    }
}

/// One statistic sample, attributed to a node (a UE for per-user metrics,
/// the serving eNB for cell aggregates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSample {
    pub metric: Metric,
    pub node: MacNodeId,
    pub value: f64,
}

/// Receives statistic samples emitted by H-ARQ operations.
pub trait StatsSink {
    fn record(&mut self, sample: StatSample);
}

impl StatsSink for Vec<StatSample> {
    fn record(&mut self, sample: StatSample) {
        self.push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_follow_attempt_ordinals() {
        let m = Metric::new(MetricKind::HarqErrorRateAttempt(2), Direction::Ul);
        assert_eq!(m.name(), "harqErrorRate_2nd_Ul");
        let m = Metric::new(MetricKind::HarqErrorRateAttempt(5), Direction::Dl);
        assert_eq!(m.name(), "harqErrorRate_5th_Dl");
        let m = Metric::new(MetricKind::MacCellThroughput, Direction::D2d);
        assert_eq!(m.name(), "macCellThroughputD2D");
    }

    #[test]
    fn directory_removal_updates_groups() {
        let mut dir = StaticDirectory::new();
        dir.register_enb(MacNodeId(1));
        dir.register_ue(MacNodeId(2), MacNodeId(1));
        dir.register_ue(MacNodeId(3), MacNodeId(1));
        dir.register_group(MacNodeId(100), vec![MacNodeId(2), MacNodeId(3)]);

        assert_eq!(dir.serving_cell(MacNodeId(2)), Some(MacNodeId(1)));
        assert_eq!(dir.serving_cell(MacNodeId(1)), Some(MacNodeId(1)));
        assert!(dir.is_multicast_group(MacNodeId(100)));

        assert!(dir.remove(MacNodeId(3)));
        assert_eq!(dir.multicast_members(MacNodeId(100)), vec![MacNodeId(2)]);
        assert_eq!(dir.node_kind(MacNodeId(3)), None);
    }
}

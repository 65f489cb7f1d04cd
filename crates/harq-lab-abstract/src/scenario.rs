use crate::config::SimConfig;
use crate::ids::{MacNodeId, NodeKind, Tick};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NodeSpec {
    pub id: MacNodeId,
    pub kind: NodeKind,
    /// Serving eNB; required for UEs.
    pub cell: Option<MacNodeId>,
}

/// D2D multicast group.
#[derive(Deserialize, Debug, Clone)]
pub struct GroupSpec {
    pub id: MacNodeId,
    pub members: Vec<MacNodeId>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub processes: Option<u8>,
    pub max_harq_rtx: Option<u8>,
    pub fb_evaluation_interval: Option<Tick>,
    pub bler_dl: Option<f64>,
    pub bler_ul: Option<f64>,
    pub bler_d2d: Option<f64>,
    pub propagation_delay: Option<Tick>,
    pub grants_per_tick: Option<usize>,
    pub grant_bytes: Option<usize>,
    pub max_ticks: Option<Tick>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.processes {
            config.harq.processes = v;
        }
        if let Some(v) = self.max_harq_rtx {
            config.harq.max_harq_rtx = v;
        }
        if let Some(v) = self.fb_evaluation_interval {
            config.harq.fb_evaluation_interval = v;
        }
        if let Some(v) = self.bler_dl {
            config.bler_dl = v;
        }
        if let Some(v) = self.bler_ul {
            config.bler_ul = v;
        }
        if let Some(v) = self.bler_d2d {
            config.bler_d2d = v;
        }
        if let Some(v) = self.propagation_delay {
            config.propagation_delay = v;
        }
        if let Some(v) = self.grants_per_tick {
            config.grants_per_tick = v;
        }
        if let Some(v) = self.grant_bytes {
            config.grant_bytes = v;
        }
        if let Some(v) = self.max_ticks {
            config.max_ticks = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application at `from` hands `bytes` bytes to the MAC for `to` (a node or a multicast group).
    AppSend {
        tick: Tick,
        from: MacNodeId,
        to: MacNodeId,
        bytes: usize,
    },
    /// Deterministically corrupt the next `count` data frames sent from `from` to `to`.
    CorruptNext {
        from: MacNodeId,
        to: MacNodeId,
        count: u32,
    },
    /// Node leaves the system; every peer force-releases its H-ARQ state for it.
    Detach { tick: Tick, node: MacNodeId },
    /// D2D pair switches mode; both sides abort their H-ARQ processes for the pair.
    ModeSwitch {
        tick: Tick,
        tx: MacNodeId,
        rx: MacNodeId,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Number of PDUs delivered to upper layers (optionally only at `to`).
    DeliveredCount {
        to: Option<MacNodeId>,
        min: usize,
        max: Option<usize>,
    },
    /// Bytes delivered to upper layers (optionally only at `to`).
    DeliveredBytes { to: Option<MacNodeId>, min: usize },
    /// PDUs dropped after exhausting the retransmission budget.
    DiscardedCount { min: usize, max: Option<usize> },
    /// Total data frames put on the air, retransmissions included.
    TransmissionCount { min: usize, max: Option<usize> },
    /// Run must drain before the given tick.
    MaxTicks { ticks: Tick },
    /// Mean of a named statistic (e.g. `harqErrorRateDl`).
    MetricMean {
        name: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

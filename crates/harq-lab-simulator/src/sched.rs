use std::collections::{BTreeMap, HashMap};

use harq_lab_abstract::{MacNodeId, SimConfig, UnitId};
use harq_lab_engine::HarqEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Retransmission,
    NewData,
}

/// One scheduling decision: which unit towards which peer, and how many
/// bytes a new PDU may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub peer: MacNodeId,
    pub unit: UnitId,
    pub bytes: usize,
    pub kind: GrantKind,
}

pub trait Scheduler {
    /// Grants for `entity` this tick. `backlog` holds the bytes queued per
    /// destination.
    fn schedule(
        &mut self,
        entity: &HarqEntity,
        backlog: &BTreeMap<MacNodeId, usize>,
        config: &SimConfig,
    ) -> Vec<Grant>;
}

/// Retransmissions first, then new data; peers are served round robin,
/// starting after the one served first last time.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    last_first: HashMap<MacNodeId, MacNodeId>,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn rotate(&self, node: MacNodeId, mut peers: Vec<MacNodeId>) -> Vec<MacNodeId> {
        if let Some(last) = self.last_first.get(&node)
            && let Some(pos) = peers.iter().position(|p| p > last)
        {
            peers.rotate_left(pos);
        }
        peers
    }
}

impl Scheduler for RoundRobinScheduler {
    fn schedule(
        &mut self,
        entity: &HarqEntity,
        backlog: &BTreeMap<MacNodeId, usize>,
        config: &SimConfig,
    ) -> Vec<Grant> {
        let node = entity.node();
        let peers = self.rotate(node, entity.tx_buffers().map(|b| b.peer()).collect());
        let mut grants = Vec::new();

        for peer in &peers {
            let Some(buffer) = entity.tx_buffer(*peer) else {
                continue;
            };
            for unit in buffer.ready_units().retransmit {
                if grants.len() >= config.grants_per_tick {
                    break;
                }
                grants.push(Grant {
                    peer: *peer,
                    unit,
                    bytes: buffer.unit(unit).map_or(0, |u| u.pdu_len()),
                    kind: GrantKind::Retransmission,
                });
            }
        }

        for peer in &peers {
            let Some(buffer) = entity.tx_buffer(*peer) else {
                continue;
            };
            let mut queued = backlog.get(peer).copied().unwrap_or(0);
            for unit in buffer.ready_units().empty {
                if queued == 0 || grants.len() >= config.grants_per_tick {
                    break;
                }
                let bytes = queued.min(config.grant_bytes);
                queued -= bytes;
                grants.push(Grant {
                    peer: *peer,
                    unit,
                    bytes,
                    kind: GrantKind::NewData,
                });
            }
        }

        if let Some(first) = grants.first() {
            self.last_first.insert(node, first.peer);
        }
        grants
    }
}
